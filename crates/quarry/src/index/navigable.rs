use super::{
    Index, IndexKind, IndexQuery, IndexQueryKind, IndexStats, KeySet, bound_ref,
    hash::same_value_set, unsupported,
};
use crate::{
    attribute::{Attribute, AttributeName},
    error::QueryError,
    key::Key,
    ordered::{CanonicalOrder, OrderedMap},
    value::Value,
};
use std::{collections::BTreeSet, ops::Bound};

pub const NAVIGABLE_INDEX_COST: u32 = 40;

///
/// NavigableIndex
///
/// Ordered attribute value → key set, backed by the comparator-ordered
/// map. Answers every hash-index shape plus range queries; range
/// retrieval walks the backing map under the requested inclusivity.
///

pub struct NavigableIndex<V> {
    attribute: Attribute<V>,
    map: OrderedMap<Value, BTreeSet<Key>, CanonicalOrder>,
}

impl<V> NavigableIndex<V> {
    #[must_use]
    pub fn new(attribute: Attribute<V>) -> Self {
        Self {
            attribute,
            map: OrderedMap::new(),
        }
    }

    fn insert(&mut self, key: &Key, value: &V) {
        for extracted in self.attribute.values(value) {
            self.map
                .get_or_set(&extracted, BTreeSet::new)
                .insert(key.clone());
        }
    }

    fn remove(&mut self, key: &Key, value: &V) {
        for extracted in self.attribute.values(value) {
            let emptied = match self.map.get_mut(&extracted) {
                Some(bucket) => {
                    bucket.remove(key);
                    bucket.is_empty()
                }
                None => false,
            };
            if emptied {
                self.map.delete(&extracted);
            }
        }
    }

    fn range(&self, lower: Bound<&Value>, upper: Bound<&Value>) -> KeySet {
        let mut keys = BTreeSet::new();
        for (_, bucket) in self.map.range(lower, upper) {
            keys.extend(bucket.iter().cloned());
        }
        KeySet::from(keys)
    }
}

impl<V> Index<V> for NavigableIndex<V> {
    fn kind(&self) -> IndexKind {
        IndexKind::Navigable
    }

    fn attribute(&self) -> &AttributeName {
        self.attribute.name()
    }

    fn supports(&self, kind: IndexQueryKind) -> bool {
        matches!(
            kind,
            IndexQueryKind::Equal
                | IndexQueryKind::In
                | IndexQueryKind::Has
                | IndexQueryKind::GreaterThan
                | IndexQueryKind::GreaterThanOrEqual
                | IndexQueryKind::LessThan
                | IndexQueryKind::LessThanOrEqual
                | IndexQueryKind::Between
        )
    }

    fn retrieval_cost(&self) -> u32 {
        NAVIGABLE_INDEX_COST
    }

    fn retrieve(&self, query: &IndexQuery) -> Result<KeySet, QueryError> {
        match query {
            IndexQuery::Equal(value) => Ok(self
                .map
                .get(value)
                .map(|bucket| KeySet::from(bucket.clone()))
                .unwrap_or_default()),
            IndexQuery::In(values) => {
                let mut keys = BTreeSet::new();
                for value in values {
                    if let Some(bucket) = self.map.get(value) {
                        keys.extend(bucket.iter().cloned());
                    }
                }
                Ok(KeySet::from(keys))
            }
            IndexQuery::Has => {
                let mut keys = BTreeSet::new();
                for (value, bucket) in self.map.entries() {
                    if !value.is_null() {
                        keys.extend(bucket.iter().cloned());
                    }
                }
                Ok(KeySet::from(keys))
            }
            IndexQuery::Range { lower, upper } => Ok(self.range(bound_ref(lower), bound_ref(upper))),
            other => Err(unsupported(self, other)),
        }
    }

    fn record_added(&mut self, key: &Key, value: &V) {
        self.insert(key, value);
    }

    fn record_updated(&mut self, key: &Key, old: &V, new: &V) {
        if same_value_set(&self.attribute, old, new) {
            return;
        }
        self.remove(key, old);
        self.insert(key, new);
    }

    fn record_removed(&mut self, key: &Key, value: &V) {
        self.remove(key, value);
    }

    fn build_from_data<'a>(&mut self, entries: &mut dyn Iterator<Item = (&'a Key, &'a V)>)
    where
        V: 'a,
    {
        self.map.clear();
        for (key, value) in entries {
            self.insert(key, value);
        }
    }

    fn clear(&mut self) {
        self.map.clear();
    }

    fn stats(&self) -> IndexStats {
        IndexStats::of(self.map.len(), self.map.values().map(BTreeSet::len).sum())
    }
}
