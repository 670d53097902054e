mod fts;

#[cfg(test)]
mod tests;

pub use fts::{LiveTextIndex, LiveTextOptions};

use crate::{
    attribute::Schema,
    error::QueryError,
    fts::TextCatalog,
    index::{MatchChange, StandingQueryIndex},
    key::Key,
    query::{Query, QueryFingerprint},
    snapshot::RecordSnapshot,
};
use derive_more::Display;
use std::{collections::BTreeMap, panic::AssertUnwindSafe};
use tracing::{debug, warn};

///
/// LiveDelta
///
/// One subscriber-visible membership change for a live query. Text
/// queries attach scores; standing queries leave them empty.
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum LiveDeltaKind {
    Added,
    Updated,
    Removed,
}

#[derive(Clone, Debug, PartialEq)]
pub struct LiveDelta {
    pub kind: LiveDeltaKind,
    pub key: Key,
    pub score: Option<f32>,
    pub old_score: Option<f32>,
    pub matched_terms: Option<Vec<String>>,
}

impl LiveDelta {
    #[must_use]
    pub fn plain(kind: LiveDeltaKind, key: &Key) -> Self {
        Self {
            kind,
            key: key.clone(),
            score: None,
            old_score: None,
            matched_terms: None,
        }
    }
}

///
/// LiveContext
///
/// Shared collaborators a live index may consult while applying one
/// mutation; the engine passes its text catalog through here so ranked
/// live queries can re-score single documents.
///

pub struct LiveContext<'a, V> {
    pub text: &'a TextCatalog<V>,
}

///
/// LiveQueryIndex
///
/// Contract shared by the two live index kinds. Mutation handlers
/// return the deltas a subscriber should observe; an empty vector means
/// the change was invisible to this query.
///

pub trait LiveQueryIndex<V> {
    fn record_added(&mut self, key: &Key, value: &V, ctx: &LiveContext<'_, V>) -> Vec<LiveDelta>;

    fn record_updated(
        &mut self,
        key: &Key,
        old: &V,
        new: &V,
        ctx: &LiveContext<'_, V>,
    ) -> Vec<LiveDelta>;

    fn record_removed(&mut self, key: &Key, value: &V, ctx: &LiveContext<'_, V>) -> Vec<LiveDelta>;

    /// Current members, ranked for scored queries.
    fn results(&self) -> Vec<Key>;

    fn result_count(&self) -> usize;

    fn contains(&self, key: &Key) -> bool;

    fn build_from_data<'a>(
        &mut self,
        entries: &mut dyn Iterator<Item = (&'a Key, &'a V)>,
        ctx: &LiveContext<'_, V>,
    ) where
        V: 'a;

    fn clear(&mut self);
}

///
/// StandingLiveIndex
///
/// Live wrapper over a materialized standing query.
///

pub struct StandingLiveIndex<V> {
    index: StandingQueryIndex<V>,
}

impl<V> StandingLiveIndex<V> {
    pub fn new(query: Query, schema: Schema<V>) -> Result<Self, QueryError> {
        Ok(Self {
            index: StandingQueryIndex::new(query, schema)?,
        })
    }

    fn apply(&mut self, key: &Key, old: Option<&V>, new: Option<&V>) -> Vec<LiveDelta> {
        let change = self.index.determine_change(old, new);
        self.index.apply_change(key, change);
        match change {
            MatchChange::Added => vec![LiveDelta::plain(LiveDeltaKind::Added, key)],
            MatchChange::Removed => vec![LiveDelta::plain(LiveDeltaKind::Removed, key)],
            MatchChange::Updated => vec![LiveDelta::plain(LiveDeltaKind::Updated, key)],
            MatchChange::Unchanged => Vec::new(),
        }
    }
}

impl<V> LiveQueryIndex<V> for StandingLiveIndex<V> {
    fn record_added(&mut self, key: &Key, value: &V, _ctx: &LiveContext<'_, V>) -> Vec<LiveDelta> {
        self.apply(key, None, Some(value))
    }

    fn record_updated(
        &mut self,
        key: &Key,
        old: &V,
        new: &V,
        _ctx: &LiveContext<'_, V>,
    ) -> Vec<LiveDelta> {
        self.apply(key, Some(old), Some(new))
    }

    fn record_removed(
        &mut self,
        key: &Key,
        value: &V,
        _ctx: &LiveContext<'_, V>,
    ) -> Vec<LiveDelta> {
        self.apply(key, Some(value), None)
    }

    fn results(&self) -> Vec<Key> {
        self.index.keys().iter().cloned().collect()
    }

    fn result_count(&self) -> usize {
        self.index.len()
    }

    fn contains(&self, key: &Key) -> bool {
        self.index.contains(key)
    }

    fn build_from_data<'a>(
        &mut self,
        entries: &mut dyn Iterator<Item = (&'a Key, &'a V)>,
        _ctx: &LiveContext<'_, V>,
    ) where
        V: 'a,
    {
        use crate::index::Index as _;
        self.index.build_from_data(entries);
    }

    fn clear(&mut self) {
        use crate::index::Index as _;
        self.index.clear();
    }
}

///
/// ListenerId
///

#[derive(Clone, Copy, Debug, Display, Eq, Hash, Ord, PartialEq, PartialOrd)]
#[display("listener-{_0}")]
pub struct ListenerId(u64);

pub type LiveListener = Box<dyn Fn(&LiveDelta) + Send + Sync>;

///
/// LiveQueryRegistry
///
/// Unified, refcounted registry of live queries. Index-kind selection:
/// a single atomic text query over an indexed field gets the ranked
/// live text index; everything else gets a standing live index.
/// Subscriber callbacks are isolated, so one panicking listener cannot
/// suppress sibling notifications.
///

pub struct LiveQueryRegistry<V> {
    schema: Schema<V>,
    entries: BTreeMap<QueryFingerprint, LiveEntry<V>>,
    next_listener: u64,
}

struct LiveEntry<V> {
    index: Box<dyn LiveQueryIndex<V>>,
    refcount: usize,
    listeners: Vec<(ListenerId, LiveListener)>,
}

impl<V> LiveQueryRegistry<V> {
    #[must_use]
    pub const fn new(schema: Schema<V>) -> Self {
        Self {
            schema,
            entries: BTreeMap::new(),
            next_listener: 0,
        }
    }

    pub fn register(
        &mut self,
        query: &Query,
        data: &dyn RecordSnapshot<V>,
        text: &TextCatalog<V>,
    ) -> Result<QueryFingerprint, QueryError>
    where
        V: 'static,
    {
        self.register_with(query, LiveTextOptions::default(), data, text)
    }

    /// Register with explicit ranked-query options (ignored for
    /// standing live queries).
    pub fn register_with(
        &mut self,
        query: &Query,
        options: LiveTextOptions,
        data: &dyn RecordSnapshot<V>,
        text: &TextCatalog<V>,
    ) -> Result<QueryFingerprint, QueryError>
    where
        V: 'static,
    {
        let fingerprint = query.fingerprint();
        if let Some(entry) = self.entries.get_mut(&fingerprint) {
            entry.refcount += 1;
            return Ok(fingerprint);
        }

        query.validate()?;
        let mut index: Box<dyn LiveQueryIndex<V>> = match query.as_single_text() {
            Some(text_query) if text.has_field(text_query.field()) => {
                Box::new(LiveTextIndex::new(text_query.clone(), options))
            }
            _ => Box::new(StandingLiveIndex::new(query.clone(), self.schema.clone())?),
        };

        let ctx = LiveContext { text };
        index.build_from_data(&mut data.iter(), &ctx);
        debug!(%fingerprint, size = index.result_count(), "live query registered");

        self.entries.insert(
            fingerprint,
            LiveEntry {
                index,
                refcount: 1,
                listeners: Vec::new(),
            },
        );
        Ok(fingerprint)
    }

    /// Drop one registration; true when the live query was evicted. No
    /// deltas are observable after the final unregister returns.
    pub fn unregister(&mut self, query: &Query) -> bool {
        let fingerprint = query.fingerprint();
        let Some(entry) = self.entries.get_mut(&fingerprint) else {
            return false;
        };

        entry.refcount -= 1;
        if entry.refcount == 0 {
            self.entries.remove(&fingerprint);
            debug!(%fingerprint, "live query evicted");
            return true;
        }
        false
    }

    pub fn subscribe(
        &mut self,
        fingerprint: QueryFingerprint,
        listener: LiveListener,
    ) -> Option<ListenerId> {
        let entry = self.entries.get_mut(&fingerprint)?;
        let id = ListenerId(self.next_listener);
        self.next_listener += 1;
        entry.listeners.push((id, listener));
        Some(id)
    }

    pub fn unsubscribe(&mut self, fingerprint: QueryFingerprint, id: ListenerId) -> bool {
        let Some(entry) = self.entries.get_mut(&fingerprint) else {
            return false;
        };
        let before = entry.listeners.len();
        entry.listeners.retain(|(candidate, _)| *candidate != id);
        entry.listeners.len() != before
    }

    #[must_use]
    pub fn results(&self, fingerprint: QueryFingerprint) -> Option<Vec<Key>> {
        self.entries
            .get(&fingerprint)
            .map(|entry| entry.index.results())
    }

    #[must_use]
    pub fn result_count(&self, fingerprint: QueryFingerprint) -> Option<usize> {
        self.entries
            .get(&fingerprint)
            .map(|entry| entry.index.result_count())
    }

    #[must_use]
    pub fn refcount(&self, fingerprint: QueryFingerprint) -> usize {
        self.entries
            .get(&fingerprint)
            .map_or(0, |entry| entry.refcount)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear_all(&mut self) {
        for entry in self.entries.values_mut() {
            entry.index.clear();
        }
    }

    ///
    /// NOTIFICATIONS
    ///

    pub fn record_added(
        &mut self,
        key: &Key,
        value: &V,
        text: &TextCatalog<V>,
    ) -> BTreeMap<QueryFingerprint, Vec<LiveDelta>> {
        self.apply(text, |index, ctx| index.record_added(key, value, ctx))
    }

    pub fn record_updated(
        &mut self,
        key: &Key,
        old: &V,
        new: &V,
        text: &TextCatalog<V>,
    ) -> BTreeMap<QueryFingerprint, Vec<LiveDelta>> {
        self.apply(text, |index, ctx| index.record_updated(key, old, new, ctx))
    }

    pub fn record_removed(
        &mut self,
        key: &Key,
        value: &V,
        text: &TextCatalog<V>,
    ) -> BTreeMap<QueryFingerprint, Vec<LiveDelta>> {
        self.apply(text, |index, ctx| index.record_removed(key, value, ctx))
    }

    fn apply(
        &mut self,
        text: &TextCatalog<V>,
        mut mutate: impl FnMut(&mut dyn LiveQueryIndex<V>, &LiveContext<'_, V>) -> Vec<LiveDelta>,
    ) -> BTreeMap<QueryFingerprint, Vec<LiveDelta>> {
        let ctx = LiveContext { text };
        let mut changed = BTreeMap::new();

        for (fingerprint, entry) in &mut self.entries {
            let deltas = mutate(entry.index.as_mut(), &ctx);
            if deltas.is_empty() {
                continue;
            }
            dispatch(&entry.listeners, &deltas);
            changed.insert(*fingerprint, deltas);
        }

        changed
    }
}

// One listener panicking must not starve its siblings.
fn dispatch(listeners: &[(ListenerId, LiveListener)], deltas: &[LiveDelta]) {
    for (id, listener) in listeners {
        for delta in deltas {
            let outcome = std::panic::catch_unwind(AssertUnwindSafe(|| listener(delta)));
            if outcome.is_err() {
                warn!(%id, "live listener panicked; continuing with remaining listeners");
            }
        }
    }
}
