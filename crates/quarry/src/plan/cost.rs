use super::Plan;

// Estimated row count a full scan contributes when no statistics are
// available; keeps the distributed hint deterministic.
const FULL_SCAN_ROW_ESTIMATE: u32 = 1_000;

///
/// QueryContext
///
/// Execution environment facts an external router feeds the cost hint.
///

#[derive(Clone, Copy, Debug, Default)]
pub struct QueryContext {
    pub is_distributed: bool,
    pub node_count: u32,
    pub uses_storage: bool,
}

/// Pure distributed-cost hint for an external router:
/// `rows·0.001 + cpu·1 + network·10 + io·5`, io charged at half the cpu
/// when the deployment touches storage.
#[must_use]
pub fn total_distributed_cost(plan: &Plan, ctx: &QueryContext) -> f64 {
    let rows = f64::from(estimated_rows(plan));
    let cpu = f64::from(saturating_cost(plan));
    let network = if ctx.is_distributed {
        f64::from(network_cost(plan, ctx))
    } else {
        0.0
    };
    let io = if ctx.uses_storage { cpu * 0.5 } else { 0.0 };

    rows.mul_add(0.001, cpu) + network * 10.0 + io * 5.0
}

// Local cost with the unbounded full-scan clamped so the hint stays in
// a comparable range.
fn saturating_cost(plan: &Plan) -> u32 {
    match plan {
        Plan::FullScan { .. } => FULL_SCAN_ROW_ESTIMATE,
        Plan::Intersection { steps } => steps
            .iter()
            .map(saturating_cost)
            .min()
            .unwrap_or(FULL_SCAN_ROW_ESTIMATE),
        Plan::Union { steps } | Plan::Fusion { steps, .. } => {
            steps.iter().map(saturating_cost).fold(0, u32::saturating_add)
        }
        Plan::Filter { source, .. } => saturating_cost(source).saturating_add(super::FILTER_COST),
        Plan::Not { source } => saturating_cost(source).saturating_add(super::NOT_COST),
        other => other.estimated_cost(),
    }
}

fn estimated_rows(plan: &Plan) -> u32 {
    match plan {
        Plan::PointLookup { .. } => 1,
        Plan::MultiPointLookup { keys } => keys.len() as u32,
        Plan::IndexScan { cost, .. } | Plan::TextScan { cost, .. } => *cost,
        Plan::FullScan { .. } => FULL_SCAN_ROW_ESTIMATE,
        Plan::Intersection { steps } => {
            steps.iter().map(estimated_rows).min().unwrap_or(0)
        }
        Plan::Union { steps } | Plan::Fusion { steps, .. } => {
            steps.iter().map(estimated_rows).fold(0, u32::saturating_add)
        }
        // A filter halves its source as a neutral selectivity guess.
        Plan::Filter { source, .. } => estimated_rows(source) / 2,
        Plan::Not { source } => FULL_SCAN_ROW_ESTIMATE.saturating_sub(estimated_rows(source)),
    }
}

fn network_cost(plan: &Plan, ctx: &QueryContext) -> u32 {
    match plan {
        Plan::FullScan { .. } => ctx.node_count.saturating_mul(10),
        Plan::IndexScan { .. } | Plan::PointLookup { .. } => 5,
        Plan::MultiPointLookup { keys } => {
            (keys.len() as u32).min(ctx.node_count).saturating_mul(5)
        }
        Plan::Intersection { steps } | Plan::Union { steps } => {
            (steps.len() as u32).saturating_mul(5)
        }
        Plan::Not { source: _ } => ctx.node_count.saturating_mul(5),
        Plan::TextScan { .. } => ctx.node_count.div_ceil(2).saturating_mul(5),
        Plan::Fusion { steps, .. } => steps
            .iter()
            .map(|step| network_cost(step, ctx))
            .fold(0, u32::saturating_add),
        Plan::Filter { source, .. } => network_cost(source, ctx),
    }
}
