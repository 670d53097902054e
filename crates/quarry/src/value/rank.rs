use super::Value;

/// Stable cross-variant rank for the canonical total order.
///
/// The numeric variants share one rank so the canonical comparator can
/// order them numerically instead of by variant.
pub(super) const fn canonical_rank(value: &Value) -> u8 {
    match value {
        Value::Null => 0,
        Value::Bool(_) => 1,
        Value::Int(_) | Value::Uint(_) | Value::Float(_) => 2,
        Value::Text(_) => 3,
        Value::Bytes(_) => 4,
        Value::List(_) => 5,
    }
}
