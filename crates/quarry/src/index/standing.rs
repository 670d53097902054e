use super::{Index, IndexKind, IndexQuery, IndexQueryKind, IndexStats, KeySet};
use crate::{
    attribute::{AttributeName, Schema, WILDCARD_ATTRIBUTE},
    error::QueryError,
    key::Key,
    query::{Evaluator, Query, QueryFingerprint},
};
use std::collections::BTreeSet;

pub const STANDING_INDEX_COST: u32 = 10;

///
/// MatchChange
///
/// Membership transition of one record against a standing predicate:
/// (old match, new match) → F→T added, T→F removed, T→T updated,
/// F→F unchanged.
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum MatchChange {
    Added,
    Removed,
    Updated,
    Unchanged,
}

///
/// StandingQueryIndex
///
/// Materialized predicate: the set of keys currently matching one
/// query, kept in sync by CRDT notifications. Retrieval returns the
/// pre-computed set regardless of the index query passed.
///

pub struct StandingQueryIndex<V> {
    query: Query,
    fingerprint: QueryFingerprint,
    schema: Schema<V>,
    attribute: AttributeName,
    matching: BTreeSet<Key>,
}

impl<V> StandingQueryIndex<V> {
    /// The query is validated up front (shape + pattern compilation) so
    /// the event-time paths stay total.
    pub fn new(query: Query, schema: Schema<V>) -> Result<Self, QueryError> {
        query.validate()?;
        let fingerprint = query.fingerprint();

        Ok(Self {
            query,
            fingerprint,
            schema,
            attribute: AttributeName::new(WILDCARD_ATTRIBUTE),
            matching: BTreeSet::new(),
        })
    }

    #[must_use]
    pub const fn query(&self) -> &Query {
        &self.query
    }

    #[must_use]
    pub const fn fingerprint(&self) -> QueryFingerprint {
        self.fingerprint
    }

    #[must_use]
    pub const fn keys(&self) -> &BTreeSet<Key> {
        &self.matching
    }

    #[must_use]
    pub fn contains(&self, key: &Key) -> bool {
        self.matching.contains(key)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.matching.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.matching.is_empty()
    }

    // Total: the query was validated at construction, so residual
    // evaluation failures degrade to "does not match".
    fn matches(&self, record: &V) -> bool {
        Evaluator::new(&self.schema)
            .matches(&self.query, record)
            .unwrap_or(false)
    }

    /// Membership transition for one record version change.
    #[must_use]
    pub fn determine_change(&self, old: Option<&V>, new: Option<&V>) -> MatchChange {
        let old_match = old.is_some_and(|v| self.matches(v));
        let new_match = new.is_some_and(|v| self.matches(v));

        match (old_match, new_match) {
            (false, true) => MatchChange::Added,
            (true, false) => MatchChange::Removed,
            (true, true) => MatchChange::Updated,
            (false, false) => MatchChange::Unchanged,
        }
    }

    /// Apply a previously computed transition.
    pub fn apply_change(&mut self, key: &Key, change: MatchChange) {
        match change {
            MatchChange::Added => {
                self.matching.insert(key.clone());
            }
            MatchChange::Removed => {
                self.matching.remove(key);
            }
            MatchChange::Updated | MatchChange::Unchanged => {}
        }
    }
}

impl<V> Index<V> for StandingQueryIndex<V> {
    fn kind(&self) -> IndexKind {
        IndexKind::Standing
    }

    fn attribute(&self) -> &AttributeName {
        &self.attribute
    }

    fn supports(&self, _kind: IndexQueryKind) -> bool {
        true
    }

    fn retrieval_cost(&self) -> u32 {
        STANDING_INDEX_COST
    }

    fn retrieve(&self, _query: &IndexQuery) -> Result<KeySet, QueryError> {
        Ok(KeySet::from(self.matching.clone()))
    }

    fn record_added(&mut self, key: &Key, value: &V) {
        let change = self.determine_change(None, Some(value));
        self.apply_change(key, change);
    }

    fn record_updated(&mut self, key: &Key, old: &V, new: &V) {
        let change = self.determine_change(Some(old), Some(new));
        self.apply_change(key, change);
    }

    fn record_removed(&mut self, key: &Key, value: &V) {
        let change = self.determine_change(Some(value), None);
        self.apply_change(key, change);
    }

    fn build_from_data<'a>(&mut self, entries: &mut dyn Iterator<Item = (&'a Key, &'a V)>)
    where
        V: 'a,
    {
        self.matching.clear();
        for (key, value) in entries {
            if self.matches(value) {
                self.matching.insert(key.clone());
            }
        }
    }

    fn clear(&mut self) {
        self.matching.clear();
    }

    fn stats(&self) -> IndexStats {
        IndexStats::of(1, self.matching.len())
    }
}
