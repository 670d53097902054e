use crate::value::Value;
use std::cmp::Ordering;

///
/// Comparator
///
/// Key ordering strategy for `OrderedMap`. Comparators are small value
/// objects so a map can carry its ordering without generic-function
/// plumbing at every call site.
///

pub trait Comparator<K> {
    fn cmp(&self, left: &K, right: &K) -> Ordering;
}

///
/// Natural
///

#[derive(Clone, Copy, Debug, Default)]
pub struct Natural;

impl<K: Ord> Comparator<K> for Natural {
    fn cmp(&self, left: &K, right: &K) -> Ordering {
        left.cmp(right)
    }
}

///
/// CanonicalOrder
///
/// Total order over `Value` keys: rank across variants, numeric
/// coercion inside the numeric family. Default for navigable indexes.
///

#[derive(Clone, Copy, Debug, Default)]
pub struct CanonicalOrder;

impl Comparator<Value> for CanonicalOrder {
    fn cmp(&self, left: &Value, right: &Value) -> Ordering {
        Value::canonical_cmp(left, right)
    }
}

///
/// NumericOrder
///
/// Orders numeric values by magnitude; non-numeric keys fall back to
/// the canonical order and sort after every number.
///

#[derive(Clone, Copy, Debug, Default)]
pub struct NumericOrder;

impl Comparator<Value> for NumericOrder {
    fn cmp(&self, left: &Value, right: &Value) -> Ordering {
        match (left.as_f64(), right.as_f64()) {
            (Some(a), Some(b)) => a.total_cmp(&b),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Value::canonical_cmp(left, right),
        }
    }
}

///
/// LocaleTextOrder
///
/// Case-folded ordering for text keys; the original text breaks folded
/// ties so distinct keys never compare equal. Non-text keys fall back
/// to the canonical order.
///

#[derive(Clone, Copy, Debug, Default)]
pub struct LocaleTextOrder;

impl Comparator<Value> for LocaleTextOrder {
    fn cmp(&self, left: &Value, right: &Value) -> Ordering {
        match (left.as_text(), right.as_text()) {
            (Some(a), Some(b)) => Value::fold_ci(a)
                .cmp(&Value::fold_ci(b))
                .then_with(|| a.cmp(b)),
            _ => Value::canonical_cmp(left, right),
        }
    }
}

///
/// ReverseOf
///

#[derive(Clone, Copy, Debug, Default)]
pub struct ReverseOf<C>(pub C);

impl<K, C: Comparator<K>> Comparator<K> for ReverseOf<C> {
    fn cmp(&self, left: &K, right: &K) -> Ordering {
        self.0.cmp(left, right).reverse()
    }
}
