use crate::{error::CursorDecodeError, executor::SortDirection, key::Key, value::Value};
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use serde::{Deserialize, Serialize};
use std::{cmp::Ordering, collections::BTreeMap};

/// Default cursor expiry.
pub const DEFAULT_CURSOR_MAX_AGE_MS: u64 = 600_000;

/// Hard cap on incoming token size; anything larger is invalid.
pub const MAX_CURSOR_TOKEN_BYTES: usize = 8 * 1024;

/// Node id recorded for positions produced by this process.
pub const LOCAL_NODE_ID: &str = "local";

///
/// CursorStatus
///

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CursorStatus {
    Valid,
    Expired,
    Invalid,
    None,
}

///
/// CursorConfig
///

#[derive(Clone, Copy, Debug)]
pub struct CursorConfig {
    pub max_age_ms: u64,
}

impl Default for CursorConfig {
    fn default() -> Self {
        Self {
            max_age_ms: DEFAULT_CURSOR_MAX_AGE_MS,
        }
    }
}

///
/// CursorPosition
///
/// One node's last-seen position in sort order.
///

#[derive(Clone, Debug, PartialEq)]
pub struct CursorPosition {
    pub node_id: String,
    pub sort_value: Value,
    pub key: Key,
}

///
/// QueryCursor
///
/// Opaque pagination token: base64url over a UTF-8 JSON document.
/// Unknown fields are ignored on decode; missing required fields fail
/// decode. The predicate/sort signatures pin the token to one query
/// shape, and the per-node positions support distributed pagination.
///

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct QueryCursor {
    pub node_values: BTreeMap<String, Value>,
    pub node_keys: BTreeMap<String, String>,
    pub sort_field: String,
    pub sort_direction: SortDirection,
    pub predicate_hash: String,
    pub sort_hash: String,
    pub timestamp: u64,
}

impl QueryCursor {
    ///
    /// WIRE
    ///

    #[must_use]
    pub fn encode(&self) -> String {
        let bytes = serde_json::to_vec(self).unwrap_or_default();
        URL_SAFE_NO_PAD.encode(bytes)
    }

    pub fn decode(token: &str) -> Result<Self, CursorDecodeError> {
        if token.len() > MAX_CURSOR_TOKEN_BYTES {
            return Err(CursorDecodeError::TooLarge {
                max: MAX_CURSOR_TOKEN_BYTES,
            });
        }
        let bytes = URL_SAFE_NO_PAD.decode(token)?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    ///
    /// CONSTRUCTION
    ///

    /// Record the last position per node from results already in sort
    /// order. `None` when there is nothing to anchor on.
    #[must_use]
    pub fn from_positions(
        positions: &[CursorPosition],
        sort_field: impl Into<String>,
        sort_direction: SortDirection,
        predicate_hash: impl Into<String>,
        sort_hash: impl Into<String>,
        timestamp: u64,
    ) -> Option<Self> {
        if positions.is_empty() {
            return None;
        }

        let mut node_values = BTreeMap::new();
        let mut node_keys = BTreeMap::new();
        for position in positions {
            node_values.insert(position.node_id.clone(), position.sort_value.clone());
            node_keys.insert(position.node_id.clone(), position.key.as_str().to_string());
        }

        Some(Self {
            node_values,
            node_keys,
            sort_field: sort_field.into(),
            sort_direction,
            predicate_hash: predicate_hash.into(),
            sort_hash: sort_hash.into(),
            timestamp,
        })
    }

    /// Merge per-node cursors, keeping the furthest position per node
    /// under the sort direction. `None` for an empty input.
    #[must_use]
    pub fn merge(cursors: &[Self]) -> Option<Self> {
        let (first, rest) = cursors.split_first()?;
        let mut merged = first.clone();

        for cursor in rest {
            merged.timestamp = merged.timestamp.max(cursor.timestamp);
            for (node, value) in &cursor.node_values {
                let key = cursor.node_keys.get(node).cloned().unwrap_or_default();
                match merged.node_values.get(node) {
                    None => {
                        merged.node_values.insert(node.clone(), value.clone());
                        merged.node_keys.insert(node.clone(), key);
                    }
                    Some(current) => {
                        let current_key = merged.node_keys.get(node).cloned().unwrap_or_default();
                        if further(
                            merged.sort_direction,
                            (value, &key),
                            (current, &current_key),
                        ) {
                            merged.node_values.insert(node.clone(), value.clone());
                            merged.node_keys.insert(node.clone(), key);
                        }
                    }
                }
            }
        }

        Some(merged)
    }

    ///
    /// VALIDATION
    ///

    /// Expiry dominates: a stale token reports `Expired` even when the
    /// signatures also disagree.
    #[must_use]
    pub fn validate(
        &self,
        predicate_hash: &str,
        sort_hash: &str,
        now_ms: u64,
        max_age_ms: u64,
    ) -> CursorStatus {
        let age = now_ms.saturating_sub(self.timestamp);
        if age > max_age_ms {
            return CursorStatus::Expired;
        }
        if self.predicate_hash != predicate_hash || self.sort_hash != sort_hash {
            return CursorStatus::Invalid;
        }

        CursorStatus::Valid
    }

    ///
    /// FILTERING
    ///

    /// Recorded position for a node; results from unrecorded nodes pass
    /// the cursor window unfiltered.
    #[must_use]
    pub fn position_for(&self, node_id: &str) -> Option<(&Value, &str)> {
        let value = self.node_values.get(node_id)?;
        let key = self.node_keys.get(node_id)?;
        Some((value, key.as_str()))
    }

    /// Strictly-after test under the cursor's sort direction:
    /// ascending keeps values above the anchor, descending below, and
    /// equal values advance by key.
    #[must_use]
    pub fn is_after(&self, node_id: &str, sort_value: &Value, key: &Key) -> bool {
        let Some((anchor_value, anchor_key)) = self.position_for(node_id) else {
            return true;
        };

        match Value::canonical_cmp(sort_value, anchor_value) {
            Ordering::Equal => key.as_str() > anchor_key,
            Ordering::Greater => self.sort_direction == SortDirection::Asc,
            Ordering::Less => self.sort_direction == SortDirection::Desc,
        }
    }
}

// "Further along the page sequence" for merge: past the other position
// in sort order, with the key breaking ties forward.
fn further(
    direction: SortDirection,
    (value, key): (&Value, &str),
    (other_value, other_key): (&Value, &str),
) -> bool {
    match Value::canonical_cmp(value, other_value) {
        Ordering::Equal => key > other_key,
        Ordering::Greater => direction == SortDirection::Asc,
        Ordering::Less => direction == SortDirection::Desc,
    }
}
