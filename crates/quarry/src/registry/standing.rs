use crate::{
    attribute::Schema,
    error::QueryError,
    index::{Index, MatchChange, StandingQueryIndex},
    key::Key,
    query::{Query, QueryFingerprint},
    snapshot::RecordSnapshot,
};
use std::collections::BTreeMap;
use tracing::debug;

///
/// StandingQueryRegistry
///
/// Reference-counted ledger of materialized predicate indexes, keyed by
/// canonical query fingerprint. CRDT notifications fan out to every
/// standing index; callers get back only the queries whose membership
/// actually changed.
///

pub struct StandingQueryRegistry<V> {
    schema: Schema<V>,
    entries: BTreeMap<QueryFingerprint, StandingEntry<V>>,
}

struct StandingEntry<V> {
    index: StandingQueryIndex<V>,
    refcount: usize,
}

impl<V> StandingQueryRegistry<V> {
    #[must_use]
    pub const fn new(schema: Schema<V>) -> Self {
        Self {
            schema,
            entries: BTreeMap::new(),
        }
    }

    /// Register interest in a query. The first registration materializes
    /// the index from `data`; later ones only bump the refcount.
    pub fn register(
        &mut self,
        query: &Query,
        data: &dyn RecordSnapshot<V>,
    ) -> Result<QueryFingerprint, QueryError> {
        let fingerprint = query.fingerprint();

        if let Some(entry) = self.entries.get_mut(&fingerprint) {
            entry.refcount += 1;
            debug!(%fingerprint, refcount = entry.refcount, "standing query retained");
            return Ok(fingerprint);
        }

        let mut index = StandingQueryIndex::new(query.clone(), self.schema.clone())?;
        index.build_from_data(&mut data.iter());
        debug!(%fingerprint, size = index.len(), "standing query materialized");
        self.entries.insert(
            fingerprint,
            StandingEntry {
                index,
                refcount: 1,
            },
        );

        Ok(fingerprint)
    }

    /// Drop one registration; returns true when the final registration
    /// evicted the index.
    pub fn unregister(&mut self, query: &Query) -> bool {
        let fingerprint = query.fingerprint();
        let Some(entry) = self.entries.get_mut(&fingerprint) else {
            return false;
        };

        entry.refcount -= 1;
        if entry.refcount == 0 {
            self.entries.remove(&fingerprint);
            debug!(%fingerprint, "standing query evicted");
            return true;
        }

        debug!(%fingerprint, refcount = entry.refcount, "standing query released");
        false
    }

    #[must_use]
    pub fn lookup(&self, fingerprint: QueryFingerprint) -> Option<&StandingQueryIndex<V>> {
        self.entries.get(&fingerprint).map(|entry| &entry.index)
    }

    #[must_use]
    pub fn contains(&self, query: &Query) -> bool {
        self.entries.contains_key(&query.fingerprint())
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

    /// Clear every index's membership without dropping registrations.
    pub fn clear_all(&mut self) {
        for entry in self.entries.values_mut() {
            entry.index.clear();
        }
    }

    ///
    /// NOTIFICATIONS
    ///

    pub fn record_added(&mut self, key: &Key, value: &V) -> BTreeMap<QueryFingerprint, MatchChange> {
        self.apply(key, None, Some(value))
    }

    pub fn record_updated(
        &mut self,
        key: &Key,
        old: &V,
        new: &V,
    ) -> BTreeMap<QueryFingerprint, MatchChange> {
        self.apply(key, Some(old), Some(new))
    }

    pub fn record_removed(
        &mut self,
        key: &Key,
        value: &V,
    ) -> BTreeMap<QueryFingerprint, MatchChange> {
        self.apply(key, Some(value), None)
    }

    fn apply(
        &mut self,
        key: &Key,
        old: Option<&V>,
        new: Option<&V>,
    ) -> BTreeMap<QueryFingerprint, MatchChange> {
        let mut changes = BTreeMap::new();
        for (fingerprint, entry) in &mut self.entries {
            let change = entry.index.determine_change(old, new);
            entry.index.apply_change(key, change);
            if change != MatchChange::Unchanged {
                changes.insert(*fingerprint, change);
            }
        }
        changes
    }
}
