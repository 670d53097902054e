use crate::{
    attribute::{AttributeName, Schema},
    error::QueryError,
    fts::TextCatalog,
    index::{IndexQuery, IndexQueryKind, STANDING_INDEX_COST},
    key::Key,
    plan::{FusionStrategy, IndexRef, Plan},
    query::{CompareOp, Query, TextQuery},
    registry::{IndexRegistry, StandingQueryRegistry},
    value::Value,
};
use std::ops::Bound;
use tracing::debug;

/// Attribute names treated as the primary key for point-lookup planning.
pub const PRIMARY_KEY_ATTRIBUTES: [&str; 3] = ["_key", "key", "id"];

/// Base cost of a full-text scan before the corpus-size term.
pub const TEXT_SCAN_BASE_COST: u32 = 50;

///
/// QueryOptimizer
///
/// Cost-based planner. Works most-specific first: primary-key point
/// lookups, then registered standing queries, then per-node planning
/// over the index registry, assembling intersections/unions/fusions
/// from the cheapest supporting indexes.
///

pub struct QueryOptimizer<'a, V> {
    schema: &'a Schema<V>,
    indexes: &'a IndexRegistry<V>,
    standing: Option<&'a StandingQueryRegistry<V>>,
    text: &'a TextCatalog<V>,
}

impl<'a, V> QueryOptimizer<'a, V> {
    #[must_use]
    pub const fn new(
        schema: &'a Schema<V>,
        indexes: &'a IndexRegistry<V>,
        standing: Option<&'a StandingQueryRegistry<V>>,
        text: &'a TextCatalog<V>,
    ) -> Self {
        Self {
            schema,
            indexes,
            standing,
            text,
        }
    }

    #[must_use]
    pub const fn schema(&self) -> &Schema<V> {
        self.schema
    }

    #[must_use]
    pub const fn registry(&self) -> &IndexRegistry<V> {
        self.indexes
    }

    #[must_use]
    pub const fn standing_registry(&self) -> Option<&StandingQueryRegistry<V>> {
        self.standing
    }

    #[must_use]
    pub const fn text_catalog(&self) -> &TextCatalog<V> {
        self.text
    }

    pub fn optimize(&self, query: &Query) -> Result<Plan, QueryError> {
        query.validate()?;
        let plan = self.optimize_node(query)?;
        debug!(cost = plan.estimated_cost(), "plan selected");

        Ok(plan)
    }

    // Every node gets the most-specific treatment first; recursion for
    // logical nodes re-enters here so inner standing registrations and
    // primary-key predicates still short-circuit.
    fn optimize_node(&self, query: &Query) -> Result<Plan, QueryError> {
        if let Some(plan) = self.point_lookup(query) {
            return Ok(plan);
        }
        if let Some(plan) = self.standing_lookup(query) {
            return Ok(plan);
        }

        match query {
            Query::Compare(_) | Query::Between(_) | Query::Has { .. } => Ok(self.simple(query)),
            Query::Text(text) => Ok(self.text_scan(text)),
            Query::And(children) => self.and(children),
            Query::Or(children) => self.or(children),
            Query::Not(child) => Ok(Plan::Not {
                source: Box::new(self.optimize_node(child)?),
            }),
        }
    }

    ///
    /// POINT LOOKUP
    ///

    fn point_lookup(&self, query: &Query) -> Option<Plan> {
        let Query::Compare(cmp) = query else {
            return None;
        };
        if !PRIMARY_KEY_ATTRIBUTES.contains(&cmp.attribute.as_str()) {
            return None;
        }

        match cmp.op {
            CompareOp::Eq => cmp
                .value
                .as_text()
                .map(|key| Plan::PointLookup { key: Key::from(key) }),
            CompareOp::In => {
                let Value::List(items) = &cmp.value else {
                    return None;
                };
                let keys: Vec<Key> = items
                    .iter()
                    .map(|item| item.as_text().map(Key::from))
                    .collect::<Option<_>>()?;
                Some(Plan::MultiPointLookup { keys })
            }
            _ => None,
        }
    }

    ///
    /// STANDING LOOKUP
    ///

    fn standing_lookup(&self, query: &Query) -> Option<Plan> {
        let standing = self.standing?;
        let fingerprint = query.fingerprint();
        standing.lookup(fingerprint)?;

        Some(Plan::IndexScan {
            index: IndexRef::Standing { fingerprint },
            query: IndexQuery::All,
            cost: STANDING_INDEX_COST,
        })
    }

    ///
    /// SIMPLE PREDICATES
    ///

    fn simple(&self, query: &Query) -> Plan {
        let Some((attribute, kind, index_query)) = index_request(query) else {
            return full_scan(query.clone());
        };

        match self.indexes.find_best_index(&attribute, kind) {
            Some((id, index)) => Plan::IndexScan {
                index: IndexRef::Attribute {
                    id,
                    attribute,
                },
                query: index_query,
                cost: index.retrieval_cost(),
            },
            None => full_scan(query.clone()),
        }
    }

    ///
    /// TEXT
    ///

    fn text_scan(&self, text: &TextQuery) -> Plan {
        if !self.text.has_field(text.field()) {
            return full_scan(Query::Text(text.clone()));
        }

        let doc_count = self.text.doc_count(text.field());
        Plan::TextScan {
            query: text.clone(),
            cost: text_scan_cost(doc_count),
        }
    }

    ///
    /// AND
    ///

    fn and(&self, children: &[Query]) -> Result<Plan, QueryError> {
        if children.len() == 1 {
            return self.optimize_node(&children[0]);
        }

        if let Some(plan) = self.compound_fast_path(children) {
            return Ok(plan);
        }

        let mut optimized: Vec<(Plan, &Query)> = Vec::with_capacity(children.len());
        for child in children {
            optimized.push((self.optimize_node(child)?, child));
        }
        optimized.sort_by_key(|(plan, _)| plan.estimated_cost());

        let mut indexed: Vec<Plan> = Vec::new();
        let mut residual: Vec<Query> = Vec::new();
        for (plan, child) in optimized {
            if plan.uses_indexes() {
                indexed.push(plan);
            } else {
                residual.push(child.clone());
            }
        }

        match indexed.len() {
            0 => Ok(full_scan(Query::And(children.to_vec()))),
            1 => {
                let source = indexed.remove(0);
                Ok(wrap_filter(source, residual))
            }
            _ => {
                let combined = fuse(indexed);
                Ok(wrap_filter(combined, residual))
            }
        }
    }

    // All-eq subsets can resolve through a compound index when one is
    // declared over exactly that attribute set; any leftover children
    // become a filter over the compound scan.
    fn compound_fast_path(&self, children: &[Query]) -> Option<Plan> {
        let mut equalities: Vec<(&AttributeName, &Value)> = Vec::new();
        let mut residual: Vec<Query> = Vec::new();
        for child in children {
            match child {
                Query::Compare(cmp) if cmp.op == CompareOp::Eq => {
                    equalities.push((&cmp.attribute, &cmp.value));
                }
                other => residual.push(other.clone()),
            }
        }
        if equalities.len() < 2 {
            return None;
        }

        let names: Vec<AttributeName> =
            equalities.iter().map(|(name, _)| (*name).clone()).collect();
        let compound = self.indexes.find_compound(&names)?;

        // Values must line up with the declared attribute order.
        let mut values = Vec::with_capacity(names.len());
        for attribute in compound.attribute_names() {
            let (_, value) = equalities
                .iter()
                .find(|(name, _)| *name == attribute)?;
            values.push((*value).clone());
        }

        let scan = Plan::IndexScan {
            index: IndexRef::Compound {
                attributes: compound.attribute_names().to_vec(),
            },
            query: IndexQuery::Compound(values),
            cost: crate::index::COMPOUND_INDEX_COST,
        };

        Some(wrap_filter(scan, residual))
    }

    ///
    /// OR
    ///

    fn or(&self, children: &[Query]) -> Result<Plan, QueryError> {
        if children.len() == 1 {
            return self.optimize_node(&children[0]);
        }

        let mut plans = Vec::with_capacity(children.len());
        for child in children {
            plans.push(self.optimize_node(child)?);
        }

        if plans.iter().all(|plan| !plan.uses_indexes()) {
            return Ok(full_scan(Query::Or(children.to_vec())));
        }

        Ok(Plan::Union { steps: plans })
    }
}

///
/// HELPERS
///

fn full_scan(predicate: Query) -> Plan {
    Plan::FullScan { predicate }
}

fn wrap_filter(source: Plan, mut residual: Vec<Query>) -> Plan {
    match residual.len() {
        0 => source,
        1 => Plan::Filter {
            source: Box::new(source),
            predicate: residual.remove(0),
        },
        _ => Plan::Filter {
            source: Box::new(source),
            predicate: Query::And(residual),
        },
    }
}

// Promote a multi-step AND to the fusion strategy its steps call for:
// unscored steps intersect, all-scored steps combine by score sum, and
// mixed steps merge through reciprocal rank fusion.
fn fuse(steps: Vec<Plan>) -> Plan {
    let scored = steps.iter().filter(|step| step.returns_scored()).count();
    if scored == 0 {
        Plan::Intersection { steps }
    } else if scored == steps.len() {
        Plan::Fusion {
            steps,
            strategy: FusionStrategy::ScoreFilter,
        }
    } else {
        Plan::Fusion {
            steps,
            strategy: FusionStrategy::ReciprocalRankFusion,
        }
    }
}

// Map a simple predicate onto an index request; `None` means the shape
// is not index-answerable and must scan.
fn index_request(query: &Query) -> Option<(AttributeName, IndexQueryKind, IndexQuery)> {
    match query {
        Query::Compare(cmp) => {
            let (kind, index_query) = match cmp.op {
                CompareOp::Eq => (IndexQueryKind::Equal, IndexQuery::Equal(cmp.value.clone())),
                CompareOp::In => {
                    let Value::List(items) = &cmp.value else {
                        return None;
                    };
                    (IndexQueryKind::In, IndexQuery::In(items.clone()))
                }
                CompareOp::Gt => (
                    IndexQueryKind::GreaterThan,
                    IndexQuery::Range {
                        lower: Bound::Excluded(cmp.value.clone()),
                        upper: Bound::Unbounded,
                    },
                ),
                CompareOp::Gte => (
                    IndexQueryKind::GreaterThanOrEqual,
                    IndexQuery::Range {
                        lower: Bound::Included(cmp.value.clone()),
                        upper: Bound::Unbounded,
                    },
                ),
                CompareOp::Lt => (
                    IndexQueryKind::LessThan,
                    IndexQuery::Range {
                        lower: Bound::Unbounded,
                        upper: Bound::Excluded(cmp.value.clone()),
                    },
                ),
                CompareOp::Lte => (
                    IndexQueryKind::LessThanOrEqual,
                    IndexQuery::Range {
                        lower: Bound::Unbounded,
                        upper: Bound::Included(cmp.value.clone()),
                    },
                ),
                // Inequality and pattern shapes have no index mapping.
                CompareOp::Ne
                | CompareOp::Like
                | CompareOp::Regex
                | CompareOp::Contains
                | CompareOp::ContainsAll
                | CompareOp::ContainsAny => return None,
            };
            Some((cmp.attribute.clone(), kind, index_query))
        }
        Query::Between(between) => {
            let lower = if between.lower_inclusive {
                Bound::Included(between.lower.clone())
            } else {
                Bound::Excluded(between.lower.clone())
            };
            let upper = if between.upper_inclusive {
                Bound::Included(between.upper.clone())
            } else {
                Bound::Excluded(between.upper.clone())
            };
            Some((
                between.attribute.clone(),
                IndexQueryKind::Between,
                IndexQuery::Range { lower, upper },
            ))
        }
        Query::Has { attribute } => {
            Some((attribute.clone(), IndexQueryKind::Has, IndexQuery::Has))
        }
        _ => None,
    }
}

/// Full-text scan cost: base plus a log term in corpus size.
#[must_use]
pub fn text_scan_cost(doc_count: usize) -> u32 {
    TEXT_SCAN_BASE_COST + (((doc_count as f64) + 1.0).log2() * 10.0) as u32
}
