//! Quarry: an embeddable query engine for CRDT-managed collections.
//!
//! The host CRDT owns the records; quarry owns everything needed to
//! answer one-shot and live queries over them: secondary indexes
//! (hash, navigable, compound, standing), an inverted full-text index
//! contract, a cost-based optimizer, an executor with score-aware
//! fusion and cursor pagination, and a live-query registry fed by CRDT
//! add/update/remove notifications.

pub mod attribute;
pub mod cursor;
pub mod engine;
pub mod error;
pub mod executor;
pub mod fts;
pub mod index;
pub mod key;
pub mod live;
pub mod optimizer;
pub mod ordered;
pub mod plan;
pub mod query;
pub mod registry;
pub mod snapshot;
pub mod value;

///
/// Prelude
///
/// Domain vocabulary only; registries, executors, and helpers are
/// reached through their modules.
///

pub mod prelude {
    pub use crate::{
        attribute::{Attribute, AttributeName, Schema},
        engine::QueryEngine,
        error::QueryError,
        executor::{OrderingOpts, QueryOptions, QueryOutput, QueryResult, SortDirection},
        key::Key,
        query::{Query, QueryFingerprint},
        snapshot::RecordSnapshot,
        value::Value,
    };
}
