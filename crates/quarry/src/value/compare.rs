use super::Value;
use std::cmp::Ordering;

// Numeric comparison within the numeric family. Integer/integer pairs
// compare exactly through i128; any pair involving a float compares
// through f64 total order (NaN sorts above all numbers).
fn numeric_cmp(left: &Value, right: &Value) -> Option<Ordering> {
    match (left, right) {
        (Value::Int(a), Value::Int(b)) => Some(a.cmp(b)),
        (Value::Uint(a), Value::Uint(b)) => Some(a.cmp(b)),
        (Value::Int(a), Value::Uint(b)) => Some(i128::from(*a).cmp(&i128::from(*b))),
        (Value::Uint(a), Value::Int(b)) => Some(i128::from(*a).cmp(&i128::from(*b))),
        _ => {
            let (a, b) = (left.as_f64()?, right.as_f64()?);
            Some(a.total_cmp(&b))
        }
    }
}

/// Total canonical comparator: rank across variants, numeric coercion
/// within the numeric family, lexicographic within text/bytes/lists.
pub(super) fn canonical_cmp(left: &Value, right: &Value) -> Ordering {
    let rank = left.canonical_rank().cmp(&right.canonical_rank());
    if rank != Ordering::Equal {
        return rank;
    }

    match (left, right) {
        (Value::Null, Value::Null) => Ordering::Equal,
        (Value::Bool(a), Value::Bool(b)) => a.cmp(b),
        (Value::Text(a), Value::Text(b)) => a.cmp(b),
        (Value::Bytes(a), Value::Bytes(b)) => a.cmp(b),
        (Value::List(a), Value::List(b)) => {
            for (left_item, right_item) in a.iter().zip(b.iter()) {
                let cmp = canonical_cmp(left_item, right_item);
                if cmp != Ordering::Equal {
                    return cmp;
                }
            }
            a.len().cmp(&b.len())
        }
        // Same rank, not a listed pair: the shared numeric rank.
        _ => numeric_cmp(left, right).unwrap_or(Ordering::Equal),
    }
}

/// Strict comparator for predicate evaluation. Numeric pairs coerce;
/// every other pair must share a variant. `None` means "incomparable"
/// and the enclosing predicate does not match.
pub(super) fn strict_cmp(left: &Value, right: &Value) -> Option<Ordering> {
    if left.is_numeric() && right.is_numeric() {
        return numeric_cmp(left, right);
    }

    match (left, right) {
        (Value::Null, Value::Null) => Some(Ordering::Equal),
        (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
        (Value::Text(a), Value::Text(b)) => Some(a.cmp(b)),
        (Value::Bytes(a), Value::Bytes(b)) => Some(a.cmp(b)),
        (Value::List(a), Value::List(b)) => {
            for (left_item, right_item) in a.iter().zip(b.iter()) {
                match strict_cmp(left_item, right_item) {
                    Some(Ordering::Equal) => {}
                    other => return other,
                }
            }
            Some(a.len().cmp(&b.len()))
        }
        _ => None,
    }
}
