use super::*;
use crate::{index::IndexQuery, query::Query, value::Value};

fn scan(cost: u32) -> Plan {
    Plan::IndexScan {
        index: IndexRef::Standing {
            fingerprint: Query::eq("status", "active").fingerprint(),
        },
        query: IndexQuery::All,
        cost,
    }
}

fn full_scan() -> Plan {
    Plan::FullScan {
        predicate: Query::eq("status", "active"),
    }
}

#[test]
fn leaf_costs() {
    assert_eq!(Plan::PointLookup { key: "k".into() }.estimated_cost(), 1);
    assert_eq!(
        Plan::MultiPointLookup {
            keys: vec!["a".into(), "b".into(), "c".into()]
        }
        .estimated_cost(),
        3
    );
    assert_eq!(scan(30).estimated_cost(), 30);
    assert_eq!(full_scan().estimated_cost(), u32::MAX);
}

#[test]
fn composite_costs_are_monotonic() {
    let source = scan(30);

    let filtered = Plan::Filter {
        source: Box::new(source.clone()),
        predicate: Query::eq("x", 1),
    };
    assert!(filtered.estimated_cost() > source.estimated_cost());

    let negated = Plan::Not {
        source: Box::new(source.clone()),
    };
    assert!(negated.estimated_cost() > source.estimated_cost());

    let intersection = Plan::Intersection {
        steps: vec![scan(30), scan(40), full_scan()],
    };
    assert_eq!(intersection.estimated_cost(), 30);

    let union = Plan::Union {
        steps: vec![scan(30), scan(40)],
    };
    assert_eq!(union.estimated_cost(), 70);

    // Saturation: unions over full scans never wrap.
    let saturated = Plan::Union {
        steps: vec![full_scan(), full_scan()],
    };
    assert_eq!(saturated.estimated_cost(), u32::MAX);

    let fusion = Plan::Fusion {
        steps: vec![scan(30), scan(40)],
        strategy: FusionStrategy::ReciprocalRankFusion,
    };
    assert_eq!(fusion.estimated_cost(), 90);
}

#[test]
fn uses_indexes_and_scoring_flags() {
    assert!(scan(30).uses_indexes());
    assert!(!full_scan().uses_indexes());
    assert!(
        Plan::Filter {
            source: Box::new(scan(30)),
            predicate: Query::eq("x", 1),
        }
        .uses_indexes()
    );

    let text = Plan::TextScan {
        query: match Query::matches("body", "rust") {
            Query::Text(t) => t,
            _ => unreachable!(),
        },
        cost: 60,
    };
    assert!(text.returns_scored());
    assert!(text.uses_indexes());

    // Scores survive a filter wrapper.
    let filtered_text = Plan::Filter {
        source: Box::new(text),
        predicate: Query::eq("status", "published"),
    };
    assert!(filtered_text.returns_scored());

    assert!(!scan(30).returns_scored());
    assert!(
        !Plan::Fusion {
            steps: vec![scan(30)],
            strategy: FusionStrategy::Intersection,
        }
        .returns_scored()
    );
    assert!(
        Plan::Fusion {
            steps: vec![scan(30)],
            strategy: FusionStrategy::ScoreFilter,
        }
        .returns_scored()
    );
}

#[test]
fn distributed_cost_is_pure_and_scales_with_nodes() {
    let plan = Plan::Intersection {
        steps: vec![scan(30), scan(40)],
    };

    let local = total_distributed_cost(
        &plan,
        &QueryContext {
            is_distributed: false,
            node_count: 1,
            uses_storage: false,
        },
    );
    let distributed = total_distributed_cost(
        &plan,
        &QueryContext {
            is_distributed: true,
            node_count: 8,
            uses_storage: false,
        },
    );
    assert!(distributed > local);

    let with_storage = total_distributed_cost(
        &plan,
        &QueryContext {
            is_distributed: true,
            node_count: 8,
            uses_storage: true,
        },
    );
    assert!(with_storage > distributed);

    // Purity: identical inputs, identical output.
    assert_eq!(
        distributed,
        total_distributed_cost(
            &plan,
            &QueryContext {
                is_distributed: true,
                node_count: 8,
                uses_storage: false,
            },
        )
    );
}

#[test]
fn describe_renders_the_tree() {
    let plan = Plan::Filter {
        source: Box::new(Plan::Intersection {
            steps: vec![scan(30), scan(10)],
        }),
        predicate: Query::eq("status", Value::Text("active".into())),
    };

    let rendered = plan.describe();
    assert!(rendered.starts_with("filter"));
    assert!(rendered.contains("intersection"));
    assert!(rendered.contains("index-scan"));
}
