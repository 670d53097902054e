use crate::value::{PathValue, Value};
use derive_more::Display;
use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, sync::Arc};

/// Wildcard attribute name used by fallback and standing indexes.
pub const WILDCARD_ATTRIBUTE: &str = "*";

///
/// AttributeName
///
/// Immutable attribute identifier. Dotted paths are allowed
/// (`profile.settings.theme`); `*` is reserved for wildcard indexes.
///

#[derive(
    Clone, Debug, Display, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct AttributeName(String);

impl AttributeName {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn is_wildcard(&self) -> bool {
        self.0 == WILDCARD_ATTRIBUTE
    }
}

impl From<&str> for AttributeName {
    fn from(name: &str) -> Self {
        Self(name.to_string())
    }
}

impl From<String> for AttributeName {
    fn from(name: String) -> Self {
        Self(name)
    }
}

///
/// Attribute
///
/// Pure extractor from an opaque record to attribute values. Extraction
/// must be observationally stable per record version: the same record
/// always yields the same values.
///
/// Simple      → zero-or-one value; `None` means the record does not
///               participate in this attribute's indexes.
/// Multi-value → a sequence; empty is equivalent to missing.
///

pub struct Attribute<V> {
    name: AttributeName,
    extractor: Extractor<V>,
}

enum Extractor<V> {
    Simple(Arc<dyn Fn(&V) -> Option<Value> + Send + Sync>),
    Multi(Arc<dyn Fn(&V) -> Vec<Value> + Send + Sync>),
}

impl<V> Clone for Attribute<V> {
    fn clone(&self) -> Self {
        let extractor = match &self.extractor {
            Extractor::Simple(f) => Extractor::Simple(Arc::clone(f)),
            Extractor::Multi(f) => Extractor::Multi(Arc::clone(f)),
        };
        Self {
            name: self.name.clone(),
            extractor,
        }
    }
}

impl<V> std::fmt::Debug for Attribute<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Attribute")
            .field("name", &self.name)
            .field("multi", &self.is_multi())
            .finish()
    }
}

impl<V> Attribute<V> {
    pub fn simple(
        name: impl Into<AttributeName>,
        extract: impl Fn(&V) -> Option<Value> + Send + Sync + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            extractor: Extractor::Simple(Arc::new(extract)),
        }
    }

    pub fn multi(
        name: impl Into<AttributeName>,
        extract: impl Fn(&V) -> Vec<Value> + Send + Sync + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            extractor: Extractor::Multi(Arc::new(extract)),
        }
    }

    /// Dotted-path factory for records with runtime path resolution.
    /// The attribute name doubles as the path.
    pub fn path(name: impl Into<AttributeName>) -> Self
    where
        V: PathValue + 'static,
    {
        let name = name.into();
        let path = name.as_str().to_string();
        Self::simple(name, move |record: &V| record.path_value(&path))
    }

    #[must_use]
    pub const fn name(&self) -> &AttributeName {
        &self.name
    }

    #[must_use]
    pub const fn is_multi(&self) -> bool {
        matches!(self.extractor, Extractor::Multi(_))
    }

    /// Single extracted value; multi-value attributes yield their first.
    #[must_use]
    pub fn value(&self, record: &V) -> Option<Value> {
        match &self.extractor {
            Extractor::Simple(f) => f(record),
            Extractor::Multi(f) => f(record).into_iter().next(),
        }
    }

    /// All extracted values. Empty means the record does not
    /// participate in this attribute.
    #[must_use]
    pub fn values(&self, record: &V) -> Vec<Value> {
        match &self.extractor {
            Extractor::Simple(f) => f(record).into_iter().collect(),
            Extractor::Multi(f) => f(record),
        }
    }
}

///
/// Schema
///
/// Composed attribute set for one collection; cheap to clone and share
/// across registries. Built once by the host via `SchemaBuilder`.
///

pub struct Schema<V> {
    attributes: Arc<BTreeMap<AttributeName, Attribute<V>>>,
}

impl<V> Clone for Schema<V> {
    fn clone(&self) -> Self {
        Self {
            attributes: Arc::clone(&self.attributes),
        }
    }
}

impl<V> std::fmt::Debug for Schema<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Schema")
            .field("attributes", &self.attributes.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl<V> Schema<V> {
    #[must_use]
    pub fn builder() -> SchemaBuilder<V> {
        SchemaBuilder {
            attributes: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn attribute(&self, name: &AttributeName) -> Option<&Attribute<V>> {
        self.attributes.get(name)
    }

    #[must_use]
    pub fn contains(&self, name: &AttributeName) -> bool {
        self.attributes.contains_key(name)
    }

    /// Single value of `name` on `record`; `None` when the attribute is
    /// unknown or the record does not participate.
    #[must_use]
    pub fn value(&self, name: &AttributeName, record: &V) -> Option<Value> {
        self.attributes.get(name).and_then(|a| a.value(record))
    }

    /// All values of `name` on `record`; empty when unknown or absent.
    #[must_use]
    pub fn values(&self, name: &AttributeName, record: &V) -> Vec<Value> {
        self.attributes
            .get(name)
            .map_or_else(Vec::new, |a| a.values(record))
    }

    pub fn names(&self) -> impl Iterator<Item = &AttributeName> {
        self.attributes.keys()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.attributes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty()
    }
}

///
/// SchemaBuilder
///

pub struct SchemaBuilder<V> {
    attributes: BTreeMap<AttributeName, Attribute<V>>,
}

impl<V> SchemaBuilder<V> {
    /// Register a prebuilt attribute; the last registration of a name wins.
    #[must_use]
    pub fn attribute(mut self, attribute: Attribute<V>) -> Self {
        self.attributes
            .insert(attribute.name().clone(), attribute);
        self
    }

    #[must_use]
    pub fn simple(
        self,
        name: impl Into<AttributeName>,
        extract: impl Fn(&V) -> Option<Value> + Send + Sync + 'static,
    ) -> Self {
        self.attribute(Attribute::simple(name, extract))
    }

    #[must_use]
    pub fn multi(
        self,
        name: impl Into<AttributeName>,
        extract: impl Fn(&V) -> Vec<Value> + Send + Sync + 'static,
    ) -> Self {
        self.attribute(Attribute::multi(name, extract))
    }

    /// Typed convenience: text attribute.
    #[must_use]
    pub fn text(
        self,
        name: impl Into<AttributeName>,
        extract: impl Fn(&V) -> Option<String> + Send + Sync + 'static,
    ) -> Self {
        self.simple(name, move |record| extract(record).map(Value::Text))
    }

    /// Typed convenience: signed integer attribute.
    #[must_use]
    pub fn integer(
        self,
        name: impl Into<AttributeName>,
        extract: impl Fn(&V) -> Option<i64> + Send + Sync + 'static,
    ) -> Self {
        self.simple(name, move |record| extract(record).map(Value::Int))
    }

    /// Typed convenience: float attribute.
    #[must_use]
    pub fn float(
        self,
        name: impl Into<AttributeName>,
        extract: impl Fn(&V) -> Option<f64> + Send + Sync + 'static,
    ) -> Self {
        self.simple(name, move |record| extract(record).map(Value::Float))
    }

    /// Typed convenience: boolean attribute.
    #[must_use]
    pub fn boolean(
        self,
        name: impl Into<AttributeName>,
        extract: impl Fn(&V) -> Option<bool> + Send + Sync + 'static,
    ) -> Self {
        self.simple(name, move |record| extract(record).map(Value::Bool))
    }

    /// Typed convenience: multi-value text attribute (array-of-string).
    #[must_use]
    pub fn text_list(
        self,
        name: impl Into<AttributeName>,
        extract: impl Fn(&V) -> Vec<String> + Send + Sync + 'static,
    ) -> Self {
        self.multi(name, move |record| {
            extract(record).into_iter().map(Value::Text).collect()
        })
    }

    /// Dotted-path attribute for `PathValue` records.
    #[must_use]
    pub fn path(self, name: impl Into<AttributeName>) -> Self
    where
        V: PathValue + 'static,
    {
        self.attribute(Attribute::path(name))
    }

    #[must_use]
    pub fn build(self) -> Schema<V> {
        Schema {
            attributes: Arc::new(self.attributes),
        }
    }
}
