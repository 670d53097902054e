mod standing;


pub use standing::StandingQueryRegistry;

use crate::{
    attribute::AttributeName,
    error::QueryError,
    index::{CompoundIndex, Index, IndexKind, IndexQueryKind, IndexStats},
    key::Key,
    snapshot::RecordSnapshot,
};
use derive_more::Display;
use std::collections::BTreeMap;
use tracing::debug;

///
/// IndexId
///
/// Stable handle for a registered index; plans reference indexes by id
/// so a plan tree never borrows registry internals.
///

#[derive(Clone, Copy, Debug, Display, Eq, Hash, Ord, PartialEq, PartialOrd)]
#[display("idx-{_0}")]
pub struct IndexId(u32);

///
/// RegistryStats
///

#[derive(Clone, Debug, Default)]
pub struct RegistryStats {
    pub indexes: Vec<IndexStatsEntry>,
}

#[derive(Clone, Debug)]
pub struct IndexStatsEntry {
    pub attribute: AttributeName,
    pub kind: IndexKind,
    pub stats: IndexStats,
}

///
/// IndexRegistry
///
/// Owns every secondary index of one collection: per-attribute index
/// lists (wildcard `*` acts as the fallback attribute), plus compound
/// indexes keyed by their declared attribute order — the same set in a
/// different order is a distinct index. Routes CRDT notifications to
/// all of them and answers cheapest-index lookups for the optimizer.
///

pub struct IndexRegistry<V> {
    next_id: u32,
    by_attribute: BTreeMap<AttributeName, Vec<IndexId>>,
    indexes: BTreeMap<IndexId, Box<dyn Index<V>>>,
    compound: BTreeMap<Vec<AttributeName>, CompoundIndex<V>>,
}

impl<V> Default for IndexRegistry<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> IndexRegistry<V> {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            next_id: 0,
            by_attribute: BTreeMap::new(),
            indexes: BTreeMap::new(),
            compound: BTreeMap::new(),
        }
    }

    ///
    /// REGISTRATION
    ///

    /// Register a single-attribute (or wildcard) index. A second index
    /// of the same kind on the same attribute is rejected.
    pub fn register(&mut self, index: Box<dyn Index<V>>) -> Result<IndexId, QueryError> {
        let attribute = index.attribute().clone();
        let kind = index.kind();

        let duplicate = self
            .by_attribute
            .get(&attribute)
            .is_some_and(|ids| ids.iter().any(|id| self.indexes[id].kind() == kind));
        if duplicate {
            return Err(QueryError::DuplicateIndex { kind, attribute });
        }

        let id = IndexId(self.next_id);
        self.next_id += 1;
        self.by_attribute
            .entry(attribute.clone())
            .or_default()
            .push(id);
        self.indexes.insert(id, index);

        debug!(%id, %attribute, %kind, "index registered");
        Ok(id)
    }

    /// Register a compound index under its declared attribute order.
    /// Only an identical declaration is a duplicate; the same set in
    /// another order registers as its own index.
    pub fn register_compound(&mut self, index: CompoundIndex<V>) -> Result<(), QueryError> {
        let key = index.attribute_names().to_vec();
        if self.compound.contains_key(&key) {
            return Err(QueryError::DuplicateCompoundIndex {
                attributes: index.attribute().to_string(),
            });
        }

        debug!(attributes = %index.attribute(), "compound index registered");
        self.compound.insert(key, index);
        Ok(())
    }

    /// Unregister and drop an index.
    pub fn remove(&mut self, id: IndexId) -> bool {
        let Some(index) = self.indexes.remove(&id) else {
            return false;
        };
        let attribute = index.attribute();
        if let Some(ids) = self.by_attribute.get_mut(attribute) {
            ids.retain(|candidate| *candidate != id);
            if ids.is_empty() {
                self.by_attribute.remove(attribute);
            }
        }
        true
    }

    /// Clear the contents of every index without unregistering any.
    pub fn clear_all(&mut self) {
        for index in self.indexes.values_mut() {
            index.clear();
        }
        for index in self.compound.values_mut() {
            index.clear();
        }
    }

    ///
    /// LOOKUP
    ///

    #[must_use]
    pub fn index(&self, id: IndexId) -> Option<&dyn Index<V>> {
        self.indexes.get(&id).map(Box::as_ref)
    }

    /// Cheapest supporting index for `(attribute, kind)`, falling back
    /// to a wildcard index when the attribute has none.
    #[must_use]
    pub fn find_best_index(
        &self,
        attribute: &AttributeName,
        kind: IndexQueryKind,
    ) -> Option<(IndexId, &dyn Index<V>)> {
        let wildcard = AttributeName::new(crate::attribute::WILDCARD_ATTRIBUTE);
        let candidates = self
            .by_attribute
            .get(attribute)
            .into_iter()
            .chain(self.by_attribute.get(&wildcard))
            .flatten();

        candidates
            .filter_map(|id| self.indexes.get(id).map(|index| (*id, index.as_ref())))
            .filter(|(_, index)| index.supports(kind))
            .min_by_key(|(_, index)| index.retrieval_cost())
    }

    /// Compound index over exactly this attribute set. An exact
    /// declared-order match wins; otherwise the first registered index
    /// covering the same set answers. No prefix matching.
    #[must_use]
    pub fn find_compound(&self, attributes: &[AttributeName]) -> Option<&CompoundIndex<V>> {
        if let Some(index) = self.compound.get(attributes) {
            return Some(index);
        }

        let requested = sorted_names(attributes);
        self.compound
            .values()
            .find(|index| sorted_names(index.attribute_names()) == requested)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.indexes.len() + self.compound.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.indexes.is_empty() && self.compound.is_empty()
    }

    ///
    /// NOTIFICATIONS
    ///

    pub fn record_added(&mut self, key: &Key, value: &V) {
        for index in self.indexes.values_mut() {
            index.record_added(key, value);
        }
        for index in self.compound.values_mut() {
            index.record_added(key, value);
        }
    }

    pub fn record_updated(&mut self, key: &Key, old: &V, new: &V) {
        for index in self.indexes.values_mut() {
            index.record_updated(key, old, new);
        }
        for index in self.compound.values_mut() {
            index.record_updated(key, old, new);
        }
    }

    pub fn record_removed(&mut self, key: &Key, value: &V) {
        for index in self.indexes.values_mut() {
            index.record_removed(key, value);
        }
        for index in self.compound.values_mut() {
            index.record_removed(key, value);
        }
    }

    /// Rebuild every index from a snapshot.
    pub fn build_from_data(&mut self, data: &dyn RecordSnapshot<V>) {
        for index in self.indexes.values_mut() {
            index.build_from_data(&mut data.iter());
        }
        for index in self.compound.values_mut() {
            index.build_from_data(&mut data.iter());
        }
    }

    ///
    /// OBSERVABILITY
    ///

    #[must_use]
    pub fn stats(&self) -> RegistryStats {
        let mut entries: Vec<IndexStatsEntry> = self
            .indexes
            .values()
            .map(|index| IndexStatsEntry {
                attribute: index.attribute().clone(),
                kind: index.kind(),
                stats: index.stats(),
            })
            .collect();
        entries.extend(self.compound.values().map(|index| IndexStatsEntry {
            attribute: index.attribute().clone(),
            kind: IndexKind::Compound,
            stats: index.stats(),
        }));

        RegistryStats { indexes: entries }
    }
}

fn sorted_names(names: &[AttributeName]) -> Vec<AttributeName> {
    let mut sorted = names.to_vec();
    sorted.sort();
    sorted
}
