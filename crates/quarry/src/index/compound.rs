use super::{Index, IndexKind, IndexQuery, IndexQueryKind, IndexStats, KeySet, unsupported};
use crate::{
    attribute::{Attribute, AttributeName},
    error::QueryError,
    key::Key,
    value::{Value, canonical_float_bits},
};
use std::collections::{BTreeSet, HashMap};

pub const COMPOUND_INDEX_COST: u32 = 20;

///
/// CompoundIndex
///
/// Equality index over a fixed, ordered tuple of attributes. The
/// composite key is a length-prefixed binary encoding of the extracted
/// values in declared order, so values containing arbitrary bytes never
/// collide and `Null` stays distinct from missing. A record with any
/// absent attribute is not indexed at all.
///

pub struct CompoundIndex<V> {
    attributes: Vec<Attribute<V>>,
    names: Vec<AttributeName>,
    joined: AttributeName,
    entries: HashMap<Vec<u8>, BTreeSet<Key>>,
}

impl<V> CompoundIndex<V> {
    pub fn new(attributes: Vec<Attribute<V>>) -> Result<Self, QueryError> {
        if attributes.len() < 2 {
            return Err(QueryError::CompoundArity {
                got: attributes.len(),
            });
        }

        let names: Vec<AttributeName> = attributes.iter().map(|a| a.name().clone()).collect();
        let joined = AttributeName::new(
            names
                .iter()
                .map(AttributeName::as_str)
                .collect::<Vec<_>>()
                .join("+"),
        );

        Ok(Self {
            attributes,
            names,
            joined,
            entries: HashMap::new(),
        })
    }

    /// Attribute tuple in declared order.
    #[must_use]
    pub fn attribute_names(&self) -> &[AttributeName] {
        &self.names
    }

    /// Exact-order match only: two compound indexes over the same
    /// attribute set in different orders are distinct indexes.
    #[must_use]
    pub fn can_answer(&self, names: &[AttributeName]) -> bool {
        self.names == names
    }

    /// Encode a lookup tuple given in declared attribute order.
    pub(crate) fn encode_values(&self, values: &[Value]) -> Result<Vec<u8>, QueryError> {
        if values.len() != self.names.len() {
            return Err(QueryError::CompoundValueCount {
                expected: self.names.len(),
                got: values.len(),
            });
        }

        let mut out = Vec::with_capacity(values.len() * 16);
        for value in values {
            encode_component(&mut out, value);
        }
        Ok(out)
    }

    // Composite key for a record; `None` when any attribute is absent.
    // Multi-value attributes participate through their first value.
    fn composite_of(&self, record: &V) -> Option<Vec<u8>> {
        let mut out = Vec::with_capacity(self.attributes.len() * 16);
        for attribute in &self.attributes {
            encode_component(&mut out, &attribute.value(record)?);
        }
        Some(out)
    }

    fn insert(&mut self, key: &Key, value: &V) {
        if let Some(composite) = self.composite_of(value) {
            self.entries.entry(composite).or_default().insert(key.clone());
        }
    }

    fn remove(&mut self, key: &Key, value: &V) {
        if let Some(composite) = self.composite_of(value) {
            if let Some(bucket) = self.entries.get_mut(&composite) {
                bucket.remove(key);
                if bucket.is_empty() {
                    self.entries.remove(&composite);
                }
            }
        }
    }
}

// Tagged, length-prefixed component encoding. No separator byte exists,
// so no escaping is required; lists recurse with an element count.
fn encode_component(out: &mut Vec<u8>, value: &Value) {
    match value {
        Value::Null => out.push(0x00),
        Value::Bool(b) => {
            out.push(0x01);
            out.push(u8::from(*b));
        }
        Value::Int(i) => {
            out.push(0x02);
            out.extend_from_slice(&i.to_be_bytes());
        }
        Value::Uint(u) => {
            out.push(0x03);
            out.extend_from_slice(&u.to_be_bytes());
        }
        Value::Float(f) => {
            out.push(0x04);
            out.extend_from_slice(&canonical_float_bits(*f).to_be_bytes());
        }
        Value::Text(s) => {
            out.push(0x05);
            out.extend_from_slice(&(s.len() as u32).to_be_bytes());
            out.extend_from_slice(s.as_bytes());
        }
        Value::Bytes(b) => {
            out.push(0x06);
            out.extend_from_slice(&(b.len() as u32).to_be_bytes());
            out.extend_from_slice(b);
        }
        Value::List(items) => {
            out.push(0x07);
            out.extend_from_slice(&(items.len() as u32).to_be_bytes());
            for item in items {
                encode_component(out, item);
            }
        }
    }
}

impl<V> Index<V> for CompoundIndex<V> {
    fn kind(&self) -> IndexKind {
        IndexKind::Compound
    }

    fn attribute(&self) -> &AttributeName {
        &self.joined
    }

    fn supports(&self, kind: IndexQueryKind) -> bool {
        kind == IndexQueryKind::Compound
    }

    fn retrieval_cost(&self) -> u32 {
        COMPOUND_INDEX_COST
    }

    fn retrieve(&self, query: &IndexQuery) -> Result<KeySet, QueryError> {
        match query {
            IndexQuery::Compound(values) => {
                let composite = self.encode_values(values)?;
                Ok(self
                    .entries
                    .get(&composite)
                    .map(|bucket| KeySet::from(bucket.clone()))
                    .unwrap_or_default())
            }
            other => Err(unsupported(self, other)),
        }
    }

    fn record_added(&mut self, key: &Key, value: &V) {
        self.insert(key, value);
    }

    fn record_updated(&mut self, key: &Key, old: &V, new: &V) {
        let old_composite = self.composite_of(old);
        let new_composite = self.composite_of(new);
        if old_composite == new_composite {
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
        self.entries.clear();
        for (key, value) in entries {
            self.insert(key, value);
        }
    }

    fn clear(&mut self) {
        self.entries.clear();
    }

    fn stats(&self) -> IndexStats {
        IndexStats::of(
            self.entries.len(),
            self.entries.values().map(BTreeSet::len).sum(),
        )
    }
}
