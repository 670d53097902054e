use super::{Index, IndexKind, IndexQuery, IndexQueryKind, IndexStats, KeySet, unsupported};
use crate::{
    attribute::{Attribute, AttributeName},
    error::QueryError,
    key::Key,
    value::Value,
};
use std::collections::{BTreeSet, HashMap};

pub const HASH_INDEX_COST: u32 = 30;

///
/// HashIndex
///
/// Attribute value → key set. Answers equality-shaped queries only.
/// Multi-value attributes contribute the key once per extracted value.
///

pub struct HashIndex<V> {
    attribute: Attribute<V>,
    buckets: HashMap<Value, BTreeSet<Key>>,
}

impl<V> HashIndex<V> {
    #[must_use]
    pub fn new(attribute: Attribute<V>) -> Self {
        Self {
            attribute,
            buckets: HashMap::new(),
        }
    }

    fn insert(&mut self, key: &Key, value: &V) {
        for extracted in self.attribute.values(value) {
            self.buckets
                .entry(extracted)
                .or_default()
                .insert(key.clone());
        }
    }

    fn remove(&mut self, key: &Key, value: &V) {
        for extracted in self.attribute.values(value) {
            if let Some(bucket) = self.buckets.get_mut(&extracted) {
                bucket.remove(key);
                if bucket.is_empty() {
                    self.buckets.remove(&extracted);
                }
            }
        }
    }

    fn union(&self, values: &[Value]) -> KeySet {
        let mut keys = BTreeSet::new();
        for value in values {
            if let Some(bucket) = self.buckets.get(value) {
                keys.extend(bucket.iter().cloned());
            }
        }
        KeySet::from(keys)
    }

    // Presence retrieval skips the explicit-null bucket.
    fn present(&self) -> KeySet {
        let mut keys = BTreeSet::new();
        for (value, bucket) in &self.buckets {
            if !value.is_null() {
                keys.extend(bucket.iter().cloned());
            }
        }
        KeySet::from(keys)
    }
}

impl<V> Index<V> for HashIndex<V> {
    fn kind(&self) -> IndexKind {
        IndexKind::Hash
    }

    fn attribute(&self) -> &AttributeName {
        self.attribute.name()
    }

    fn supports(&self, kind: IndexQueryKind) -> bool {
        matches!(
            kind,
            IndexQueryKind::Equal | IndexQueryKind::In | IndexQueryKind::Has
        )
    }

    fn retrieval_cost(&self) -> u32 {
        HASH_INDEX_COST
    }

    fn retrieve(&self, query: &IndexQuery) -> Result<KeySet, QueryError> {
        match query {
            IndexQuery::Equal(value) => Ok(self.union(std::slice::from_ref(value))),
            IndexQuery::In(values) => Ok(self.union(values)),
            IndexQuery::Has => Ok(self.present()),
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
        self.buckets.clear();
        for (key, value) in entries {
            self.insert(key, value);
        }
    }

    fn clear(&mut self) {
        self.buckets.clear();
    }

    fn stats(&self) -> IndexStats {
        IndexStats::of(
            self.buckets.len(),
            self.buckets.values().map(BTreeSet::len).sum(),
        )
    }
}

/// Extracted value sets compare order-insensitively so a reordered
/// multi-value extraction does not churn buckets.
pub(super) fn same_value_set<V>(attribute: &Attribute<V>, old: &V, new: &V) -> bool {
    let mut old_values = attribute.values(old);
    let mut new_values = attribute.values(new);
    if old_values.len() != new_values.len() {
        return false;
    }
    old_values.sort_by(Value::canonical_cmp);
    new_values.sort_by(Value::canonical_cmp);
    old_values == new_values
}
