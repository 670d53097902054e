mod compound;
mod hash;
mod navigable;
mod result;
mod standing;

#[cfg(test)]
mod tests;

pub use compound::{COMPOUND_INDEX_COST, CompoundIndex};
pub use hash::{HASH_INDEX_COST, HashIndex};
pub use navigable::{NAVIGABLE_INDEX_COST, NavigableIndex};
pub use result::KeySet;
pub use standing::{MatchChange, STANDING_INDEX_COST, StandingQueryIndex};

use crate::{attribute::AttributeName, error::QueryError, key::Key, value::Value};
use std::{fmt, ops::Bound};

///
/// IndexKind
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum IndexKind {
    Hash,
    Navigable,
    Compound,
    Inverted,
    Standing,
}

impl fmt::Display for IndexKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Hash => "hash",
            Self::Navigable => "navigable",
            Self::Compound => "compound",
            Self::Inverted => "inverted",
            Self::Standing => "standing",
        };
        write!(f, "{label}")
    }
}

///
/// IndexQueryKind
///
/// The query shapes an index can be asked to answer. The optimizer maps
/// predicate operators onto these before consulting the registry.
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum IndexQueryKind {
    Equal,
    In,
    Has,
    GreaterThan,
    GreaterThanOrEqual,
    LessThan,
    LessThanOrEqual,
    Between,
    Compound,
    Any,
}

impl fmt::Display for IndexQueryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Equal => "equal",
            Self::In => "in",
            Self::Has => "has",
            Self::GreaterThan => "gt",
            Self::GreaterThanOrEqual => "gte",
            Self::LessThan => "lt",
            Self::LessThanOrEqual => "lte",
            Self::Between => "between",
            Self::Compound => "compound",
            Self::Any => "any",
        };
        write!(f, "{label}")
    }
}

///
/// IndexQuery
///
/// Concrete retrieval request built by the optimizer. Range bounds
/// carry their inclusivity; a one-sided range leaves the other bound
/// unbounded.
///

#[derive(Clone, Debug, PartialEq)]
pub enum IndexQuery {
    Equal(Value),
    In(Vec<Value>),
    Has,
    Range {
        lower: Bound<Value>,
        upper: Bound<Value>,
    },
    Compound(Vec<Value>),
    All,
}

/// Borrow a bound's key without consuming the bound.
pub(crate) const fn bound_ref<T>(bound: &Bound<T>) -> Bound<&T> {
    match bound {
        Bound::Included(value) => Bound::Included(value),
        Bound::Excluded(value) => Bound::Excluded(value),
        Bound::Unbounded => Bound::Unbounded,
    }
}

impl IndexQuery {
    #[must_use]
    pub const fn kind(&self) -> IndexQueryKind {
        match self {
            Self::Equal(_) => IndexQueryKind::Equal,
            Self::In(_) => IndexQueryKind::In,
            Self::Has => IndexQueryKind::Has,
            Self::Range { .. } => IndexQueryKind::Between,
            Self::Compound(_) => IndexQueryKind::Compound,
            Self::All => IndexQueryKind::Any,
        }
    }
}

///
/// IndexStats
///

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct IndexStats {
    pub distinct_values: usize,
    pub total_entries: usize,
    pub avg_entries_per_value: f64,
}

impl IndexStats {
    #[must_use]
    pub fn of(distinct_values: usize, total_entries: usize) -> Self {
        let avg_entries_per_value = if distinct_values == 0 {
            0.0
        } else {
            total_entries as f64 / distinct_values as f64
        };
        Self {
            distinct_values,
            total_entries,
            avg_entries_per_value,
        }
    }
}

///
/// Index
///
/// Uniform contract over the local index variants. Mutation paths are
/// total: records whose attributes are absent simply do not participate.
/// `retrieve` may return keys that have since left the snapshot; the
/// executor filters stale references before hydration.
///

pub trait Index<V> {
    fn kind(&self) -> IndexKind;

    /// Indexed attribute; `*` for wildcard/standing indexes.
    fn attribute(&self) -> &AttributeName;

    fn supports(&self, kind: IndexQueryKind) -> bool;

    fn retrieval_cost(&self) -> u32;

    fn retrieve(&self, query: &IndexQuery) -> Result<KeySet, QueryError>;

    fn record_added(&mut self, key: &Key, value: &V);

    fn record_updated(&mut self, key: &Key, old: &V, new: &V);

    fn record_removed(&mut self, key: &Key, value: &V);

    /// Seed from an existing snapshot, clearing prior state.
    fn build_from_data<'a>(&mut self, entries: &mut dyn Iterator<Item = (&'a Key, &'a V)>)
    where
        V: 'a;

    fn clear(&mut self);

    fn stats(&self) -> IndexStats;
}

pub(crate) fn unsupported<V>(index: &dyn Index<V>, query: &IndexQuery) -> QueryError {
    QueryError::UnsupportedIndexQuery {
        attribute: index.attribute().to_string(),
        kind: index.kind(),
        query: query.kind(),
    }
}
