mod compare;
mod hash;
mod path;
mod rank;


use serde::{Deserialize, Serialize};
use std::{borrow::Cow, cmp::Ordering, hash::Hash};

pub use hash::ValueDigest;
pub(crate) use hash::write_value;
pub use path::PathValue;

///
/// TextMode
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum TextMode {
    Cs, // case-sensitive
    Ci, // case-insensitive
}

///
/// Value
///
/// Attribute value extracted from an opaque record. The engine compares,
/// hashes, and buckets these; it never mutates them.
///
/// Null → the attribute is present with an explicit null.
/// Absence is represented outside this type (`Option<Value>` / empty seq).
///

#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Uint(u64),
    Float(f64),
    Text(String),
    Bytes(Vec<u8>),
    List(Vec<Self>),
}

impl Value {
    ///
    /// CONSTRUCTION
    ///

    /// Build a `Value::List` from a list literal.
    ///
    /// Intended for tests and inline construction.
    /// Requires `Clone` because items are borrowed.
    pub fn from_slice<T>(items: &[T]) -> Self
    where
        T: Into<Self> + Clone,
    {
        Self::List(items.iter().cloned().map(Into::into).collect())
    }

    /// Build a `Value::List` from owned items.
    pub fn from_list<T>(items: Vec<T>) -> Self
    where
        T: Into<Self>,
    {
        Self::List(items.into_iter().map(Into::into).collect())
    }

    ///
    /// TYPES
    ///

    /// Returns true if the value is one of the numeric variants.
    #[must_use]
    pub const fn is_numeric(&self) -> bool {
        matches!(self, Self::Int(_) | Self::Uint(_) | Self::Float(_))
    }

    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    #[must_use]
    pub const fn is_text(&self) -> bool {
        matches!(self, Self::Text(_))
    }

    #[must_use]
    pub const fn is_scalar(&self) -> bool {
        !matches!(self, Self::List(_))
    }

    /// Stable cross-variant rank used by the canonical comparator.
    #[must_use]
    pub(crate) const fn canonical_rank(&self) -> u8 {
        rank::canonical_rank(self)
    }

    /// Total canonical comparator. Ranks across variants, coerces within
    /// the numeric family. Used by navigable indexes, ordering, and
    /// cursor boundaries.
    #[must_use]
    pub fn canonical_cmp(left: &Self, right: &Self) -> Ordering {
        compare::canonical_cmp(left, right)
    }

    /// Strict comparator for predicate evaluation: numeric family
    /// coerces, otherwise both sides must share a variant. Returns
    /// `None` for incomparable pairs (the predicate does not match).
    #[must_use]
    pub fn compare(left: &Self, right: &Self) -> Option<Ordering> {
        compare::strict_cmp(left, right)
    }

    /// Canonical 128-bit digest; equal values digest equal.
    #[must_use]
    pub fn digest(&self) -> ValueDigest {
        hash::digest(self)
    }

    ///
    /// CONVERSION
    ///

    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        if let Self::Text(s) = self { Some(s) } else { None }
    }

    #[must_use]
    pub fn as_list(&self) -> Option<&[Self]> {
        if let Self::List(items) = self {
            Some(items.as_slice())
        } else {
            None
        }
    }

    #[must_use]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Int(i) => Some(*i as f64),
            Self::Uint(u) => Some(*u as f64),
            Self::Float(f) => Some(*f),
            _ => None,
        }
    }

    ///
    /// TEXT COMPARISON
    ///

    pub(crate) fn fold_ci(s: &str) -> Cow<'_, str> {
        if s.is_ascii() {
            Cow::Owned(s.to_ascii_lowercase())
        } else {
            Cow::Owned(s.to_lowercase())
        }
    }

    fn text_op(&self, other: &Self, mode: TextMode, f: impl Fn(&str, &str) -> bool) -> Option<bool> {
        let (a, b) = (self.as_text()?, other.as_text()?);
        match mode {
            TextMode::Cs => Some(f(a, b)),
            TextMode::Ci => Some(f(&Self::fold_ci(a), &Self::fold_ci(b))),
        }
    }

    #[must_use]
    pub fn text_eq(&self, other: &Self, mode: TextMode) -> Option<bool> {
        self.text_op(other, mode, |a, b| a == b)
    }

    #[must_use]
    pub fn text_contains(&self, needle: &Self, mode: TextMode) -> Option<bool> {
        self.text_op(needle, mode, |a, b| a.contains(b))
    }

    #[must_use]
    pub fn text_starts_with(&self, needle: &Self, mode: TextMode) -> Option<bool> {
        self.text_op(needle, mode, |a, b| a.starts_with(b))
    }

    ///
    /// COLLECTIONS
    ///

    fn normalize_list_ref(v: &Self) -> Vec<&Self> {
        match v {
            Self::List(items) => items.iter().collect(),
            scalar => vec![scalar],
        }
    }

    /// Returns true if `self` is a list containing `needle`.
    #[must_use]
    pub fn contains(&self, needle: &Self) -> Option<bool> {
        self.as_list()
            .map(|items| items.iter().any(|item| item == needle))
    }

    /// Returns true if any item in `needles` matches a member of `self`.
    #[must_use]
    pub fn contains_any(&self, needles: &Self) -> Option<bool> {
        let needles = Self::normalize_list_ref(needles);
        match self {
            Self::List(items) => Some(needles.iter().any(|n| items.iter().any(|v| v == *n))),
            scalar => Some(needles.iter().any(|n| scalar == *n)),
        }
    }

    /// Returns true if every item in `needles` matches a member of `self`.
    #[must_use]
    pub fn contains_all(&self, needles: &Self) -> Option<bool> {
        let needles = Self::normalize_list_ref(needles);
        match self {
            Self::List(items) => Some(needles.iter().all(|n| items.iter().any(|v| v == *n))),
            scalar => Some(needles.len() == 1 && scalar == needles[0]),
        }
    }

    /// Returns true if `self` exists inside the provided list literal.
    #[must_use]
    pub fn in_list(&self, haystack: &Self) -> Option<bool> {
        if let Self::List(items) = haystack {
            Some(items.iter().any(|h| h == self))
        } else {
            None
        }
    }
}

// Float payloads participate in Eq/Hash by canonical bit pattern:
// -0.0 folds to 0.0 and every NaN folds to one canonical NaN, matching
// the canonical comparator's total order.
pub(crate) fn canonical_float_bits(f: f64) -> u64 {
    if f.is_nan() {
        f64::NAN.to_bits()
    } else if f == 0.0 {
        0.0f64.to_bits()
    } else {
        f.to_bits()
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Null, Self::Null) => true,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Int(a), Self::Int(b)) => a == b,
            (Self::Uint(a), Self::Uint(b)) => a == b,
            (Self::Float(a), Self::Float(b)) => canonical_float_bits(*a) == canonical_float_bits(*b),
            (Self::Text(a), Self::Text(b)) => a == b,
            (Self::Bytes(a), Self::Bytes(b)) => a == b,
            (Self::List(a), Self::List(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Value {}

impl Hash for Value {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        state.write_u8(self.canonical_rank());
        match self {
            Self::Null => {}
            Self::Bool(b) => b.hash(state),
            Self::Int(i) => state.write_i64(*i),
            Self::Uint(u) => {
                // Variant tag differs from Int, so raw bits cannot collide
                // across signedness.
                state.write_u8(1);
                state.write_u64(*u);
            }
            Self::Float(f) => state.write_u64(canonical_float_bits(*f)),
            Self::Text(s) => s.hash(state),
            Self::Bytes(b) => b.hash(state),
            Self::List(items) => {
                state.write_usize(items.len());
                for item in items {
                    item.hash(state);
                }
            }
        }
    }
}

// NOTE: Value::partial_cmp is the strict predicate-evaluation order, not
// the canonical total order. Use canonical_cmp for ORDER BY, navigable
// keys, and cursor boundaries.
impl PartialOrd for Value {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        compare::strict_cmp(self, other)
    }
}

macro_rules! impl_from_for {
    ( $( $type:ty => $variant:ident ),* $(,)? ) => {
        $(
            impl From<$type> for Value {
                fn from(v: $type) -> Self {
                    Self::$variant(v.into())
                }
            }
        )*
    };
}

impl_from_for! {
    bool     => Bool,
    i8       => Int,
    i16      => Int,
    i32      => Int,
    i64      => Int,
    u8       => Uint,
    u16      => Uint,
    u32      => Uint,
    u64      => Uint,
    f32      => Float,
    f64      => Float,
    &str     => Text,
    String   => Text,
    Vec<u8>  => Bytes,
}

impl From<Vec<Self>> for Value {
    fn from(items: Vec<Self>) -> Self {
        Self::List(items)
    }
}

impl<T: Into<Self>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Self::Null, Into::into)
    }
}
