use crate::{
    attribute::Schema,
    error::QueryError,
    executor::{ExecutorConfig, QueryExecutor, QueryOptions, QueryOutput},
    fts::{FullTextIndex, TextCatalog},
    index::{CompoundIndex, Index, MatchChange},
    key::Key,
    live::{LiveDelta, LiveListener, LiveQueryRegistry, LiveTextOptions, ListenerId},
    optimizer::QueryOptimizer,
    plan::{Plan, QueryContext, total_distributed_cost},
    query::{Query, QueryFingerprint},
    registry::{IndexId, IndexRegistry, RegistryStats, StandingQueryRegistry},
    snapshot::RecordSnapshot,
};
use std::collections::BTreeMap;

///
/// MutationOutcome
///
/// Everything observable from applying one CRDT event: standing-query
/// membership transitions and live-query deltas, both keyed by query
/// fingerprint. The host forwards these to its subscription layer.
///

#[derive(Debug, Default)]
pub struct MutationOutcome {
    pub standing: BTreeMap<QueryFingerprint, MatchChange>,
    pub live: BTreeMap<QueryFingerprint, Vec<LiveDelta>>,
}

///
/// QueryEngine
///
/// Per-collection facade owning the schema, secondary indexes, standing
/// and live registries, and the full-text catalog. The host CRDT calls
/// the `record_*` methods after each applied mutation and passes a
/// snapshot into `query`; the engine never retains record references
/// across an event boundary.
///
/// Single-threaded cooperative: the host serializes mutations and
/// queries per collection. Mutating indexes and reading them never
/// interleave within one call.
///

pub struct QueryEngine<V> {
    schema: Schema<V>,
    indexes: IndexRegistry<V>,
    standing: StandingQueryRegistry<V>,
    text: TextCatalog<V>,
    live: LiveQueryRegistry<V>,
    config: ExecutorConfig,
}

impl<V> QueryEngine<V> {
    #[must_use]
    pub fn new(schema: Schema<V>) -> Self {
        Self::with_config(schema, ExecutorConfig::default())
    }

    #[must_use]
    pub fn with_config(schema: Schema<V>, config: ExecutorConfig) -> Self {
        Self {
            indexes: IndexRegistry::new(),
            standing: StandingQueryRegistry::new(schema.clone()),
            text: TextCatalog::new(),
            live: LiveQueryRegistry::new(schema.clone()),
            schema,
            config,
        }
    }

    #[must_use]
    pub const fn schema(&self) -> &Schema<V> {
        &self.schema
    }

    ///
    /// INDEX MANAGEMENT
    ///

    pub fn register_index(&mut self, index: Box<dyn Index<V>>) -> Result<IndexId, QueryError> {
        self.indexes.register(index)
    }

    pub fn register_compound_index(&mut self, index: CompoundIndex<V>) -> Result<(), QueryError> {
        self.indexes.register_compound(index)
    }

    pub fn register_text_index(&mut self, index: Box<dyn FullTextIndex<V>>) {
        self.text.register(index);
    }

    pub fn remove_index(&mut self, id: IndexId) -> bool {
        self.indexes.remove(id)
    }

    /// Seed every index (secondary and full-text) from a snapshot.
    pub fn build_from_data(&mut self, data: &dyn RecordSnapshot<V>) {
        self.indexes.build_from_data(data);
        self.text.build_from_data(data);
    }

    /// Clear all index contents; registrations and subscriptions stay.
    pub fn clear(&mut self) {
        self.indexes.clear_all();
        self.standing.clear_all();
        self.live.clear_all();
        self.text.clear();
    }

    #[must_use]
    pub fn stats(&self) -> RegistryStats {
        self.indexes.stats()
    }

    ///
    /// CRDT EVENTS
    ///
    /// Ordering within one event: secondary indexes, then the text
    /// catalog, then standing queries, then live queries (which may
    /// re-score against the already-updated text catalog).
    ///

    pub fn record_added(&mut self, key: &Key, value: &V) -> MutationOutcome {
        self.indexes.record_added(key, value);
        self.text.on_set(key, value);
        MutationOutcome {
            standing: self.standing.record_added(key, value),
            live: self.live.record_added(key, value, &self.text),
        }
    }

    pub fn record_updated(&mut self, key: &Key, old: &V, new: &V) -> MutationOutcome {
        self.indexes.record_updated(key, old, new);
        self.text.on_set(key, new);
        MutationOutcome {
            standing: self.standing.record_updated(key, old, new),
            live: self.live.record_updated(key, old, new, &self.text),
        }
    }

    /// Tombstone/removal; idempotent like the underlying indexes.
    pub fn record_removed(&mut self, key: &Key, value: &V) -> MutationOutcome {
        self.indexes.record_removed(key, value);
        let outcome = MutationOutcome {
            standing: self.standing.record_removed(key, value),
            live: self.live.record_removed(key, value, &self.text),
        };
        self.text.on_remove(key);
        outcome
    }

    ///
    /// QUERIES
    ///

    pub fn query(
        &self,
        query: &Query,
        data: &dyn RecordSnapshot<V>,
        options: &QueryOptions,
    ) -> Result<QueryOutput<V>, QueryError>
    where
        V: Clone,
    {
        let optimizer =
            QueryOptimizer::new(&self.schema, &self.indexes, Some(&self.standing), &self.text);
        let executor = QueryExecutor::with_config(&optimizer, self.config);
        executor.run(query, data, options)
    }

    /// Plan without executing (explain surface).
    pub fn plan(&self, query: &Query) -> Result<Plan, QueryError> {
        QueryOptimizer::new(&self.schema, &self.indexes, Some(&self.standing), &self.text)
            .optimize(query)
    }

    /// Distributed cost hint for an external router.
    pub fn distributed_cost(
        &self,
        query: &Query,
        ctx: &QueryContext,
    ) -> Result<f64, QueryError> {
        Ok(total_distributed_cost(&self.plan(query)?, ctx))
    }

    ///
    /// STANDING QUERIES
    ///

    pub fn register_standing(
        &mut self,
        query: &Query,
        data: &dyn RecordSnapshot<V>,
    ) -> Result<QueryFingerprint, QueryError> {
        self.standing.register(query, data)
    }

    pub fn unregister_standing(&mut self, query: &Query) -> bool {
        self.standing.unregister(query)
    }

    ///
    /// LIVE QUERIES
    ///

    pub fn register_live(
        &mut self,
        query: &Query,
        data: &dyn RecordSnapshot<V>,
    ) -> Result<QueryFingerprint, QueryError>
    where
        V: 'static,
    {
        self.live.register(query, data, &self.text)
    }

    pub fn register_live_with(
        &mut self,
        query: &Query,
        options: LiveTextOptions,
        data: &dyn RecordSnapshot<V>,
    ) -> Result<QueryFingerprint, QueryError>
    where
        V: 'static,
    {
        self.live.register_with(query, options, data, &self.text)
    }

    pub fn unregister_live(&mut self, query: &Query) -> bool {
        self.live.unregister(query)
    }

    pub fn subscribe(
        &mut self,
        fingerprint: QueryFingerprint,
        listener: LiveListener,
    ) -> Option<ListenerId> {
        self.live.subscribe(fingerprint, listener)
    }

    pub fn unsubscribe(&mut self, fingerprint: QueryFingerprint, id: ListenerId) -> bool {
        self.live.unsubscribe(fingerprint, id)
    }

    #[must_use]
    pub fn live_results(&self, fingerprint: QueryFingerprint) -> Option<Vec<Key>> {
        self.live.results(fingerprint)
    }
}
