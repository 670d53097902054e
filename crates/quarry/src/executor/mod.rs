mod fuse;
mod order;


pub use fuse::{
    DEFAULT_RRF_K, FusedHit, RankedList, reciprocal_rank_fusion, weighted_reciprocal_rank_fusion,
};
pub use order::{KEY_FIELD, OrderingKey, OrderingOpts, SCORE_FIELD, SortDirection};

use crate::{
    cursor::{CursorConfig, CursorPosition, CursorStatus, LOCAL_NODE_ID, QueryCursor},
    error::QueryError,
    fts::SearchOptions,
    index::{Index, IndexQuery},
    key::Key,
    optimizer::QueryOptimizer,
    plan::{FusionStrategy, IndexRef, Plan},
    query::{Evaluator, Query, TextQuery},
    snapshot::RecordSnapshot,
};
use std::{
    collections::{HashMap, HashSet},
    time::{SystemTime, UNIX_EPOCH},
};
use tracing::trace;

///
/// ExecutorConfig
///

#[derive(Clone, Copy, Debug)]
pub struct ExecutorConfig {
    pub rrf_k: f32,
    pub cursor: CursorConfig,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            rrf_k: DEFAULT_RRF_K,
            cursor: CursorConfig::default(),
        }
    }
}

///
/// QueryOptions
///

#[derive(Clone, Debug)]
pub struct QueryOptions {
    pub ordering: Option<OrderingOpts>,
    pub limit: Option<usize>,
    pub cursor: Option<String>,
    pub node_id: String,
    /// Wall-clock override for cursor validation; tests pin this.
    pub now_ms: Option<u64>,
}

impl Default for QueryOptions {
    fn default() -> Self {
        Self {
            ordering: None,
            limit: None,
            cursor: None,
            node_id: LOCAL_NODE_ID.to_string(),
            now_ms: None,
        }
    }
}

impl QueryOptions {
    #[must_use]
    pub fn ordered(mut self, ordering: OrderingOpts) -> Self {
        self.ordering = Some(ordering);
        self
    }

    #[must_use]
    pub fn limited(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    #[must_use]
    pub fn after(mut self, cursor: impl Into<String>) -> Self {
        self.cursor = Some(cursor.into());
        self
    }
}

///
/// QueryResult / QueryOutput
///

#[derive(Clone, Debug, PartialEq)]
pub struct QueryResult<V> {
    pub key: Key,
    pub value: V,
    pub score: Option<f32>,
    pub matched_terms: Option<Vec<String>>,
}

#[derive(Clone, Debug)]
pub struct QueryOutput<V> {
    pub results: Vec<QueryResult<V>>,
    pub next_cursor: Option<String>,
    pub has_more: bool,
    pub cursor_status: CursorStatus,
}

// Intermediate key resolution: distinct keys in retrieval order plus
// per-key score/term attachments.
#[derive(Debug, Default)]
struct KeyedSet {
    keys: Vec<Key>,
    scores: HashMap<Key, f32>,
    terms: HashMap<Key, Vec<String>>,
}

impl KeyedSet {
    fn unscored(keys: Vec<Key>) -> Self {
        Self {
            keys,
            ..Self::default()
        }
    }

    fn merge_attachments_for(&mut self, key: &Key, other: &Self) {
        if let Some(score) = other.scores.get(key) {
            self.scores
                .entry(key.clone())
                .and_modify(|current| *current = current.max(*score))
                .or_insert(*score);
        }
        if let Some(terms) = other.terms.get(key) {
            let entry = self.terms.entry(key.clone()).or_default();
            for term in terms {
                if !entry.contains(term) {
                    entry.push(term.clone());
                }
            }
        }
    }
}

///
/// QueryExecutor
///
/// Walks a plan tree against one record snapshot, then applies
/// ordering, cursor windowing, and limits. Reads indexes through the
/// optimizer's registries so plan references resolve against the same
/// state that produced them.
///

pub struct QueryExecutor<'a, V> {
    optimizer: &'a QueryOptimizer<'a, V>,
    config: ExecutorConfig,
}

impl<'a, V> QueryExecutor<'a, V> {
    #[must_use]
    pub fn new(optimizer: &'a QueryOptimizer<'a, V>) -> Self {
        Self {
            optimizer,
            config: ExecutorConfig::default(),
        }
    }

    #[must_use]
    pub const fn with_config(optimizer: &'a QueryOptimizer<'a, V>, config: ExecutorConfig) -> Self {
        Self { optimizer, config }
    }

    /// Plan and execute a query in one step.
    pub fn run(
        &self,
        query: &Query,
        data: &dyn RecordSnapshot<V>,
        options: &QueryOptions,
    ) -> Result<QueryOutput<V>, QueryError>
    where
        V: Clone,
    {
        let plan = self.optimizer.optimize(query)?;
        self.execute(&plan, &query.fingerprint().to_hex(), data, options)
    }

    /// Execute a prebuilt plan. `predicate_hash` pins cursors to the
    /// originating query shape.
    pub fn execute(
        &self,
        plan: &Plan,
        predicate_hash: &str,
        data: &dyn RecordSnapshot<V>,
        options: &QueryOptions,
    ) -> Result<QueryOutput<V>, QueryError>
    where
        V: Clone,
    {
        let resolved = self.execute_node(plan, data)?;
        trace!(keys = resolved.keys.len(), "plan resolved");

        // Hydrate, dropping references that left the snapshot.
        let mut results: Vec<QueryResult<V>> = Vec::with_capacity(resolved.keys.len());
        for key in &resolved.keys {
            if let Some(value) = data.get(key) {
                results.push(QueryResult {
                    key: key.clone(),
                    value: value.clone(),
                    score: resolved.scores.get(key).copied(),
                    matched_terms: resolved.terms.get(key).cloned(),
                });
            }
        }

        let has_scores = results.iter().any(|result| result.score.is_some());
        let ordering = match &options.ordering {
            Some(ordering) => ordering.clone(),
            None if has_scores => OrderingOpts::score_desc(),
            None => OrderingOpts::default(),
        };
        let schema = self.optimizer.schema();
        results.sort_by(|a, b| {
            order::compare_rows(
                schema,
                &ordering,
                (&a.key, &a.value, a.score),
                (&b.key, &b.value, b.score),
            )
        });

        let sort_hash = ordering.signature();
        let (sort_field, sort_direction) = ordering.primary();
        let now = options.now_ms.unwrap_or_else(unix_millis);

        let mut cursor_status = CursorStatus::None;
        if let Some(token) = &options.cursor {
            match QueryCursor::decode(token) {
                Err(_) => cursor_status = CursorStatus::Invalid,
                Ok(cursor) => {
                    cursor_status = cursor.validate(
                        predicate_hash,
                        &sort_hash,
                        now,
                        self.config.cursor.max_age_ms,
                    );
                    if cursor_status == CursorStatus::Valid {
                        results.retain(|result| {
                            let value = order::sort_value(
                                schema,
                                sort_field,
                                &result.key,
                                &result.value,
                                result.score,
                            );
                            cursor.is_after(&options.node_id, &value, &result.key)
                        });
                    }
                }
            }
        }

        let total = results.len();
        let limit = options.limit.unwrap_or(total);
        let has_more = limit < total;
        if has_more {
            results.truncate(limit);
        }

        let next_cursor = if has_more {
            results.last().and_then(|last| {
                let position = CursorPosition {
                    node_id: options.node_id.clone(),
                    sort_value: order::sort_value(
                        schema,
                        sort_field,
                        &last.key,
                        &last.value,
                        last.score,
                    ),
                    key: last.key.clone(),
                };
                QueryCursor::from_positions(
                    &[position],
                    sort_field,
                    sort_direction,
                    predicate_hash,
                    sort_hash.clone(),
                    now,
                )
                .map(|cursor| cursor.encode())
            })
        } else {
            None
        };

        Ok(QueryOutput {
            results,
            next_cursor,
            has_more,
            cursor_status,
        })
    }

    ///
    /// PLAN WALK
    ///

    fn execute_node(
        &self,
        plan: &Plan,
        data: &dyn RecordSnapshot<V>,
    ) -> Result<KeyedSet, QueryError> {
        match plan {
            Plan::PointLookup { key } => Ok(KeyedSet::unscored(
                data.contains(key).then(|| key.clone()).into_iter().collect(),
            )),
            Plan::MultiPointLookup { keys } => Ok(KeyedSet::unscored(
                keys.iter().filter(|key| data.contains(key)).cloned().collect(),
            )),
            Plan::IndexScan { index, query, .. } => self.index_scan(index, query),
            Plan::FullScan { predicate } => self.full_scan(predicate, data),
            Plan::Intersection { steps } => self.intersection(steps, data),
            Plan::Union { steps } => self.union(steps, data),
            Plan::Filter { source, predicate } => self.filter(source, predicate, data),
            Plan::Not { source } => self.complement(source, data),
            Plan::TextScan { query, .. } => self.text_scan(query),
            Plan::Fusion { steps, strategy } => self.fusion(steps, *strategy, data),
        }
    }

    fn index_scan(&self, index: &IndexRef, query: &IndexQuery) -> Result<KeyedSet, QueryError> {
        let registry = self.optimizer.registry();
        let keys = match index {
            IndexRef::Attribute { id, attribute } => registry
                .index(*id)
                .ok_or_else(|| QueryError::UnknownIndexReference {
                    reference: attribute.to_string(),
                })?
                .retrieve(query)?,
            IndexRef::Compound { attributes } => registry
                .find_compound(attributes)
                .ok_or_else(|| QueryError::UnknownIndexReference {
                    reference: attributes
                        .iter()
                        .map(crate::attribute::AttributeName::as_str)
                        .collect::<Vec<_>>()
                        .join("+"),
                })?
                .retrieve(query)?,
            IndexRef::Standing { fingerprint } => self
                .optimizer
                .standing_registry()
                .and_then(|standing| standing.lookup(*fingerprint))
                .ok_or_else(|| QueryError::UnknownIndexReference {
                    reference: fingerprint.to_string(),
                })?
                .retrieve(query)?,
        };

        Ok(KeyedSet::unscored(keys.into_keys()))
    }

    fn full_scan(
        &self,
        predicate: &Query,
        data: &dyn RecordSnapshot<V>,
    ) -> Result<KeyedSet, QueryError> {
        let mut evaluator = Evaluator::new(self.optimizer.schema());
        let mut keys = Vec::new();
        for (key, value) in data.iter() {
            if evaluator.matches(predicate, value)? {
                keys.push(key.clone());
            }
        }
        Ok(KeyedSet::unscored(keys))
    }

    fn intersection(
        &self,
        steps: &[Plan],
        data: &dyn RecordSnapshot<V>,
    ) -> Result<KeyedSet, QueryError> {
        let sets = self.execute_steps(steps, data)?;
        Ok(intersect(sets))
    }

    fn union(&self, steps: &[Plan], data: &dyn RecordSnapshot<V>) -> Result<KeyedSet, QueryError> {
        let sets = self.execute_steps(steps, data)?;

        let mut out = KeyedSet::default();
        let mut seen: HashSet<Key> = HashSet::new();
        for set in &sets {
            for key in &set.keys {
                if seen.insert(key.clone()) {
                    out.keys.push(key.clone());
                }
            }
        }
        for key in out.keys.clone() {
            for set in &sets {
                out.merge_attachments_for(&key, set);
            }
        }

        Ok(out)
    }

    fn filter(
        &self,
        source: &Plan,
        predicate: &Query,
        data: &dyn RecordSnapshot<V>,
    ) -> Result<KeyedSet, QueryError> {
        let mut resolved = self.execute_node(source, data)?;
        let mut evaluator = Evaluator::new(self.optimizer.schema());

        let mut keys = Vec::with_capacity(resolved.keys.len());
        for key in &resolved.keys {
            let Some(value) = data.get(key) else {
                continue;
            };
            if evaluator.matches(predicate, value)? {
                keys.push(key.clone());
            }
        }

        // Score and matched-term attachments survive for the keys that
        // passed the predicate.
        resolved.scores.retain(|key, _| keys.contains(key));
        resolved.terms.retain(|key, _| keys.contains(key));
        resolved.keys = keys;
        Ok(resolved)
    }

    fn complement(
        &self,
        source: &Plan,
        data: &dyn RecordSnapshot<V>,
    ) -> Result<KeyedSet, QueryError> {
        let resolved = self.execute_node(source, data)?;
        let excluded: HashSet<&Key> = resolved.keys.iter().collect();

        Ok(KeyedSet::unscored(
            data.keys()
                .filter(|key| !excluded.contains(*key))
                .cloned()
                .collect(),
        ))
    }

    fn text_scan(&self, query: &TextQuery) -> Result<KeyedSet, QueryError> {
        let index = self
            .optimizer
            .text_catalog()
            .for_field(query.field())
            .ok_or_else(|| QueryError::UnknownTextField {
                field: query.field().to_string(),
            })?;

        let hits = index.search(query, &SearchOptions::default());
        let mut out = KeyedSet::default();
        for hit in hits {
            out.scores.insert(hit.key.clone(), hit.score);
            out.terms.insert(hit.key.clone(), hit.matched_terms);
            out.keys.push(hit.key);
        }
        Ok(out)
    }

    fn fusion(
        &self,
        steps: &[Plan],
        strategy: FusionStrategy,
        data: &dyn RecordSnapshot<V>,
    ) -> Result<KeyedSet, QueryError> {
        match strategy {
            FusionStrategy::Intersection => self.intersection(steps, data),
            FusionStrategy::ScoreFilter => {
                let sets = self.execute_steps(steps, data)?;
                let mut out = intersect_keys_only(&sets);
                // Combine by score sum across the contributing steps.
                for key in out.keys.clone() {
                    let mut total = 0.0f32;
                    let mut scored = false;
                    for set in &sets {
                        if let Some(score) = set.scores.get(&key) {
                            total += score;
                            scored = true;
                        }
                        out.merge_attachments_for(&key, set);
                    }
                    if scored {
                        out.scores.insert(key, total);
                    }
                }
                Ok(out)
            }
            FusionStrategy::ReciprocalRankFusion => {
                let sets = self.execute_steps(steps, data)?;
                let lists: Vec<RankedList> = steps
                    .iter()
                    .zip(&sets)
                    .map(|(step, set)| RankedList {
                        source: step_source(step),
                        hits: set
                            .keys
                            .iter()
                            .map(|key| (key.clone(), set.scores.get(key).copied().unwrap_or(0.0)))
                            .collect(),
                    })
                    .collect();

                let fused = reciprocal_rank_fusion(&lists, self.config.rrf_k);
                let mut out = KeyedSet::default();
                for hit in fused {
                    out.scores.insert(hit.key.clone(), hit.score);
                    out.keys.push(hit.key);
                }
                for key in out.keys.clone() {
                    for set in &sets {
                        if let Some(terms) = set.terms.get(&key) {
                            let entry = out.terms.entry(key.clone()).or_default();
                            for term in terms {
                                if !entry.contains(term) {
                                    entry.push(term.clone());
                                }
                            }
                        }
                    }
                }
                Ok(out)
            }
        }
    }

    fn execute_steps(
        &self,
        steps: &[Plan],
        data: &dyn RecordSnapshot<V>,
    ) -> Result<Vec<KeyedSet>, QueryError> {
        steps
            .iter()
            .map(|step| self.execute_node(step, data))
            .collect()
    }
}

// Seed with the smallest set, then drop keys absent from any sibling.
fn intersect(mut sets: Vec<KeyedSet>) -> KeyedSet {
    if sets.is_empty() {
        return KeyedSet::default();
    }
    sets.sort_by_key(|set| set.keys.len());

    let mut out = intersect_keys_only(&sets);
    for key in out.keys.clone() {
        for set in &sets {
            out.merge_attachments_for(&key, set);
        }
    }
    out
}

fn intersect_keys_only(sets: &[KeyedSet]) -> KeyedSet {
    let Some((seed, rest)) = sets.split_first() else {
        return KeyedSet::default();
    };
    let rest_sets: Vec<HashSet<&Key>> = rest
        .iter()
        .map(|set| set.keys.iter().collect())
        .collect();

    KeyedSet::unscored(
        seed.keys
            .iter()
            .filter(|key| rest_sets.iter().all(|set| set.contains(*key)))
            .cloned()
            .collect(),
    )
}

// Stable fusion source labels derived from what a step reads.
fn step_source(step: &Plan) -> String {
    match step {
        Plan::TextScan { query, .. } => format!("fts:{}", query.field()),
        Plan::IndexScan { index, .. } => match index {
            IndexRef::Attribute { attribute, .. } => format!("index:{attribute}"),
            IndexRef::Compound { attributes } => format!(
                "index:{}",
                attributes
                    .iter()
                    .map(crate::attribute::AttributeName::as_str)
                    .collect::<Vec<_>>()
                    .join("+")
            ),
            IndexRef::Standing { fingerprint } => format!("standing:{fingerprint}"),
        },
        Plan::PointLookup { .. } | Plan::MultiPointLookup { .. } => "keys".to_string(),
        Plan::FullScan { .. } => "scan".to_string(),
        Plan::Intersection { .. } => "intersection".to_string(),
        Plan::Union { .. } => "union".to_string(),
        Plan::Filter { .. } => "filter".to_string(),
        Plan::Not { .. } => "not".to_string(),
        Plan::Fusion { .. } => "fusion".to_string(),
    }
}

fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |elapsed| elapsed.as_millis() as u64)
}
