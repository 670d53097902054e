mod cost;

#[cfg(test)]
mod tests;

pub use cost::{QueryContext, total_distributed_cost};

use crate::{
    attribute::AttributeName,
    index::IndexQuery,
    key::Key,
    query::{Query, QueryFingerprint, TextQuery},
    registry::IndexId,
};
use std::fmt::Write as _;

/// Cost of resolving one primary key.
pub const POINT_LOOKUP_COST: u32 = 1;

/// Cost added by a filter step on top of its source.
pub const FILTER_COST: u32 = 10;

/// Cost added by a complement step on top of its source.
pub const NOT_COST: u32 = 100;

/// Fixed overhead of a fusion step.
pub const FUSION_COST: u32 = 20;

///
/// IndexRef
///
/// How a plan names an index without borrowing the registry: attribute
/// indexes by id, compound indexes by declared attribute order, standing
/// indexes by query fingerprint.
///

#[derive(Clone, Debug, PartialEq)]
pub enum IndexRef {
    Attribute {
        id: IndexId,
        attribute: AttributeName,
    },
    Compound {
        attributes: Vec<AttributeName>,
    },
    Standing {
        fingerprint: QueryFingerprint,
    },
}

///
/// FusionStrategy
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum FusionStrategy {
    /// Unscored steps: plain set intersection.
    Intersection,
    /// Mixed scored/unscored steps: reciprocal rank fusion.
    ReciprocalRankFusion,
    /// All-scored steps: intersect and combine by score sum.
    ScoreFilter,
}

///
/// Plan
///
/// Immutable execution tree produced by the optimizer. Costs of leaf
/// scans are computed at planning time; composite costs derive
/// bottom-up.
///

#[derive(Clone, Debug, PartialEq)]
pub enum Plan {
    PointLookup {
        key: Key,
    },
    MultiPointLookup {
        keys: Vec<Key>,
    },
    IndexScan {
        index: IndexRef,
        query: IndexQuery,
        cost: u32,
    },
    FullScan {
        predicate: Query,
    },
    Intersection {
        steps: Vec<Plan>,
    },
    Union {
        steps: Vec<Plan>,
    },
    Filter {
        source: Box<Plan>,
        predicate: Query,
    },
    Not {
        source: Box<Plan>,
    },
    TextScan {
        query: TextQuery,
        cost: u32,
    },
    Fusion {
        steps: Vec<Plan>,
        strategy: FusionStrategy,
    },
}

impl Plan {
    /// Bottom-up local cost estimate; full scans are unbounded and all
    /// arithmetic saturates.
    #[must_use]
    pub fn estimated_cost(&self) -> u32 {
        match self {
            Self::PointLookup { .. } => POINT_LOOKUP_COST,
            Self::MultiPointLookup { keys } => keys.len() as u32,
            Self::IndexScan { cost, .. } | Self::TextScan { cost, .. } => *cost,
            Self::FullScan { .. } => u32::MAX,
            Self::Intersection { steps } => steps
                .iter()
                .map(Self::estimated_cost)
                .min()
                .unwrap_or(u32::MAX),
            Self::Union { steps } => steps
                .iter()
                .map(Self::estimated_cost)
                .fold(0u32, u32::saturating_add),
            Self::Filter { source, .. } => source.estimated_cost().saturating_add(FILTER_COST),
            Self::Not { source } => source.estimated_cost().saturating_add(NOT_COST),
            Self::Fusion { steps, .. } => steps
                .iter()
                .map(Self::estimated_cost)
                .fold(0u32, u32::saturating_add)
                .saturating_add(FUSION_COST),
        }
    }

    /// True when any leaf reads an index instead of scanning records.
    #[must_use]
    pub fn uses_indexes(&self) -> bool {
        match self {
            Self::PointLookup { .. }
            | Self::MultiPointLookup { .. }
            | Self::IndexScan { .. }
            | Self::TextScan { .. } => true,
            Self::FullScan { .. } => false,
            Self::Intersection { steps } | Self::Union { steps } | Self::Fusion { steps, .. } => {
                steps.iter().any(Self::uses_indexes)
            }
            Self::Filter { source, .. } | Self::Not { source } => source.uses_indexes(),
        }
    }

    /// True when executing this node attaches relevance scores.
    #[must_use]
    pub fn returns_scored(&self) -> bool {
        match self {
            Self::TextScan { .. } => true,
            Self::Fusion { strategy, .. } => *strategy != FusionStrategy::Intersection,
            Self::Filter { source, .. } => source.returns_scored(),
            _ => false,
        }
    }

    /// Compact human-readable plan tree for logs and tests.
    #[must_use]
    pub fn describe(&self) -> String {
        let mut out = String::new();
        self.describe_into(&mut out, 0);
        out
    }

    fn describe_into(&self, out: &mut String, depth: usize) {
        let pad = "  ".repeat(depth);
        match self {
            Self::PointLookup { key } => {
                let _ = writeln!(out, "{pad}point-lookup({key})");
            }
            Self::MultiPointLookup { keys } => {
                let _ = writeln!(out, "{pad}multi-point-lookup({} keys)", keys.len());
            }
            Self::IndexScan { index, query, cost } => {
                let target = match index {
                    IndexRef::Attribute { attribute, .. } => attribute.to_string(),
                    IndexRef::Compound { attributes } => attributes
                        .iter()
                        .map(AttributeName::as_str)
                        .collect::<Vec<_>>()
                        .join("+"),
                    IndexRef::Standing { fingerprint } => format!("standing:{fingerprint}"),
                };
                let _ = writeln!(out, "{pad}index-scan({target}, {:?}, cost={cost})", query.kind());
            }
            Self::FullScan { .. } => {
                let _ = writeln!(out, "{pad}full-scan");
            }
            Self::Intersection { steps } => {
                let _ = writeln!(out, "{pad}intersection");
                for step in steps {
                    step.describe_into(out, depth + 1);
                }
            }
            Self::Union { steps } => {
                let _ = writeln!(out, "{pad}union");
                for step in steps {
                    step.describe_into(out, depth + 1);
                }
            }
            Self::Filter { source, .. } => {
                let _ = writeln!(out, "{pad}filter");
                source.describe_into(out, depth + 1);
            }
            Self::Not { source } => {
                let _ = writeln!(out, "{pad}not");
                source.describe_into(out, depth + 1);
            }
            Self::TextScan { query, cost } => {
                let _ = writeln!(out, "{pad}fts-scan({}, cost={cost})", query.field());
            }
            Self::Fusion { steps, strategy } => {
                let _ = writeln!(out, "{pad}fusion({strategy:?})");
                for step in steps {
                    step.describe_into(out, depth + 1);
                }
            }
        }
    }
}
