use crate::{
    attribute::{AttributeName, Schema},
    key::Key,
    value::Value,
};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use xxhash_rust::xxh3::Xxh3;

/// Pseudo-field that sorts by attached relevance scores.
pub const SCORE_FIELD: &str = "_score";

/// Pseudo-field that sorts by record key.
pub const KEY_FIELD: &str = "_key";

///
/// SortDirection
///

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

///
/// OrderingOpts
///
/// Stable multi-key ordering. The comparator is type-aware through the
/// canonical value order (null first, numeric, text, boolean), and a
/// final ascending key tiebreak keeps pagination deterministic.
///

#[derive(Clone, Debug, Default, PartialEq)]
pub struct OrderingOpts {
    pub keys: Vec<OrderingKey>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct OrderingKey {
    pub field: String,
    pub direction: SortDirection,
}

impl OrderingOpts {
    #[must_use]
    pub fn asc(field: impl Into<String>) -> Self {
        Self {
            keys: vec![OrderingKey {
                field: field.into(),
                direction: SortDirection::Asc,
            }],
        }
    }

    #[must_use]
    pub fn desc(field: impl Into<String>) -> Self {
        Self {
            keys: vec![OrderingKey {
                field: field.into(),
                direction: SortDirection::Desc,
            }],
        }
    }

    /// Append a secondary sort key.
    #[must_use]
    pub fn then(mut self, field: impl Into<String>, direction: SortDirection) -> Self {
        self.keys.push(OrderingKey {
            field: field.into(),
            direction,
        });
        self
    }

    /// Default ranking for scored result sets.
    #[must_use]
    pub fn score_desc() -> Self {
        Self::desc(SCORE_FIELD)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Leading sort key; pagination anchors on this field.
    #[must_use]
    pub fn primary(&self) -> (&str, SortDirection) {
        self.keys
            .first()
            .map_or((KEY_FIELD, SortDirection::Asc), |key| {
                (key.field.as_str(), key.direction)
            })
    }

    /// Canonical signature over fields and directions; map iteration
    /// order never feeds this.
    #[must_use]
    pub fn signature(&self) -> String {
        let mut hasher = Xxh3::with_seed(0);
        hasher.update(&[1u8]); // version
        hasher.update(&(self.keys.len() as u32).to_be_bytes());
        for key in &self.keys {
            hasher.update(&(key.field.len() as u32).to_be_bytes());
            hasher.update(key.field.as_bytes());
            hasher.update(&[match key.direction {
                SortDirection::Asc => 0u8,
                SortDirection::Desc => 1u8,
            }]);
        }
        format!("{:016x}", hasher.digest())
    }
}

/// Sort-key value of one result row for `field`.
pub(super) fn sort_value<V>(
    schema: &Schema<V>,
    field: &str,
    key: &Key,
    value: &V,
    score: Option<f32>,
) -> Value {
    match field {
        SCORE_FIELD => Value::Float(f64::from(score.unwrap_or(0.0))),
        KEY_FIELD => Value::Text(key.as_str().to_string()),
        attribute => schema
            .value(&AttributeName::from(attribute), value)
            .unwrap_or(Value::Null),
    }
}

pub(super) fn compare_rows<V>(
    schema: &Schema<V>,
    ordering: &OrderingOpts,
    left: (&Key, &V, Option<f32>),
    right: (&Key, &V, Option<f32>),
) -> Ordering {
    for key in &ordering.keys {
        let lv = sort_value(schema, &key.field, left.0, left.1, left.2);
        let rv = sort_value(schema, &key.field, right.0, right.1, right.2);
        let mut cmp = Value::canonical_cmp(&lv, &rv);
        if key.direction == SortDirection::Desc {
            cmp = cmp.reverse();
        }
        if cmp != Ordering::Equal {
            return cmp;
        }
    }

    // Deterministic final tiebreak, always ascending by key.
    left.0.cmp(right.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signature_is_order_sensitive_and_stable() {
        let a = OrderingOpts::asc("price").then("name", SortDirection::Desc);
        let b = OrderingOpts::asc("price").then("name", SortDirection::Desc);
        assert_eq!(a.signature(), b.signature());

        let c = OrderingOpts::desc("price").then("name", SortDirection::Desc);
        assert_ne!(a.signature(), c.signature());

        let d = OrderingOpts::asc("name").then("price", SortDirection::Desc);
        assert_ne!(a.signature(), d.signature());
    }

    #[test]
    fn primary_defaults_to_key_order() {
        let none = OrderingOpts::default();
        assert_eq!(none.primary(), (KEY_FIELD, SortDirection::Asc));
        let by_price = OrderingOpts::desc("price");
        assert_eq!(by_price.primary(), ("price", SortDirection::Desc));
    }
}
