use crate::{
    attribute::AttributeName,
    index::{IndexKind, IndexQueryKind},
};
use thiserror::Error as ThisError;

///
/// QueryError
///
/// Typed errors surfaced by the query core. Each variant names the
/// invariant or contract that was violated; recoverable conditions
/// (cursor decode failures, absent attributes during evaluation) are
/// handled locally and never reach this type.
///

#[derive(Debug, ThisError)]
pub enum QueryError {
    /// AND/OR constructed with zero children.
    #[error("logical operator `{op}` requires at least one child")]
    EmptyLogical { op: &'static str },

    /// Compound index constructed with fewer than two attributes.
    #[error("compound index requires at least two attributes, got {got}")]
    CompoundArity { got: usize },

    /// Compound lookup with the wrong number of values.
    #[error("compound index over {expected} attributes received {got} values")]
    CompoundValueCount { expected: usize, got: usize },

    /// `retrieve` called with a query kind the index does not answer.
    #[error("{kind} index on `{attribute}` does not support `{query}` queries")]
    UnsupportedIndexQuery {
        attribute: String,
        kind: IndexKind,
        query: IndexQueryKind,
    },

    /// Attribute required by an index build is absent from the schema.
    #[error("attribute `{name}` is not defined in the schema")]
    UnknownAttribute { name: AttributeName },

    /// A `like` or `regex` predicate failed to compile.
    #[error("invalid pattern {pattern:?}: {source}")]
    InvalidRegex {
        pattern: String,
        #[source]
        source: Box<regex::Error>,
    },

    /// Same-shape index registered twice on one attribute.
    #[error("duplicate {kind} index on `{attribute}`")]
    DuplicateIndex {
        kind: IndexKind,
        attribute: AttributeName,
    },

    /// Compound index registered twice over one attribute set.
    #[error("duplicate compound index over `{attributes}`")]
    DuplicateCompoundIndex { attributes: String },

    /// `in` / `contains_all` / `contains_any` given a non-list literal.
    #[error("operator `{op}` requires a list literal")]
    NonListLiteral { op: &'static str },

    /// Weighted fusion with a weight count that does not match the lists.
    #[error("weighted fusion requires one weight per list ({lists} lists, {weights} weights)")]
    FusionWeightMismatch { lists: usize, weights: usize },

    /// Plan referenced an index that has since been unregistered.
    #[error("plan references unknown index `{reference}`")]
    UnknownIndexReference { reference: String },

    /// Text query against a field with no registered full-text index.
    #[error("no full-text index registered for field `{field}`")]
    UnknownTextField { field: String },
}

///
/// CursorDecodeError
///
/// Reasons an opaque cursor token failed to decode. Never fatal for a
/// query: the executor degrades these into a `CursorStatus` instead of
/// propagating them.
///

#[derive(Debug, ThisError)]
pub enum CursorDecodeError {
    #[error("cursor token exceeds {max} bytes")]
    TooLarge { max: usize },

    #[error("cursor token is not valid base64url: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("cursor token payload is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
}
