//! End-to-end scenarios against the per-collection engine facade, with
//! a `BTreeMap` standing in for the host CRDT's record store.

use quarry::{
    attribute::Attribute,
    fts::MemoryTextIndex,
    index::{HashIndex, MatchChange, NavigableIndex},
    live::LiveDeltaKind,
    prelude::*,
};
use std::collections::BTreeMap;

type Record = serde_json::Value;
type Store = BTreeMap<Key, Record>;

fn product_schema() -> Schema<Record> {
    Schema::builder()
        .path("category")
        .path("price")
        .path("status")
        .path("title")
        .path("body")
        .build()
}

fn insert(engine: &mut QueryEngine<Record>, store: &mut Store, key: &str, value: Record) {
    let key = Key::from(key);
    match store.get(&key).cloned() {
        Some(old) => {
            engine.record_updated(&key, &old, &value);
        }
        None => {
            engine.record_added(&key, &value);
        }
    }
    store.insert(key, value);
}

fn product_fixture() -> (QueryEngine<Record>, Store) {
    let mut engine = QueryEngine::new(product_schema());
    engine
        .register_index(Box::new(HashIndex::new(Attribute::path("category"))))
        .unwrap();

    let mut store = Store::new();
    for (key, category, price) in [
        ("p1", "Electronics", 700),
        ("p2", "Electronics", 950),
        ("p3", "Appliances", 150),
        ("p4", "Appliances", 300),
        ("p5", "Furniture", 800),
    ] {
        insert(
            &mut engine,
            &mut store,
            key,
            serde_json::json!({ "category": category, "price": price }),
        );
    }

    (engine, store)
}

#[test]
fn scenario_1_category_and_price() {
    let (engine, store) = product_fixture();

    let query = Query::and(vec![
        Query::eq("category", "Electronics"),
        Query::lte("price", 800),
    ]);

    // Hash on category drives the scan; price filters on top.
    let plan = engine.plan(&query).unwrap().describe();
    assert!(plan.starts_with("filter"), "unexpected plan:\n{plan}");
    assert!(plan.contains("index-scan(category"), "unexpected plan:\n{plan}");

    let output = engine.query(&query, &store, &QueryOptions::default()).unwrap();
    assert_eq!(output.results.len(), 1);
    assert_eq!(output.results[0].key, Key::from("p1"));
}

#[test]
fn scenario_2_standing_query_lifecycle() {
    let schema: Schema<Record> = Schema::builder().path("status").build();
    let mut engine = QueryEngine::new(schema);
    let mut store = Store::new();

    let query = Query::eq("status", "active");
    let fingerprint = engine.register_standing(&query, &store).unwrap();

    let outcome = {
        insert(
            &mut engine,
            &mut store,
            "u1",
            serde_json::json!({ "status": "active" }),
        );
        // Re-derive via a query: the standing index now answers it.
        engine.query(&query, &store, &QueryOptions::default()).unwrap()
    };
    assert_eq!(outcome.results.len(), 1);

    // The optimizer actually uses the standing index.
    let plan = engine.plan(&query).unwrap().describe();
    assert!(plan.contains(&format!("standing:{fingerprint}")), "plan:\n{plan}");

    // Flipping the status produces a `removed` transition.
    let old = store[&Key::from("u1")].clone();
    let new = serde_json::json!({ "status": "inactive" });
    let outcome = engine.record_updated(&Key::from("u1"), &old, &new);
    store.insert(Key::from("u1"), new);
    assert_eq!(outcome.standing[&fingerprint], MatchChange::Removed);

    assert!(engine.unregister_standing(&query));
    assert!(!engine.unregister_standing(&query));
}

#[test]
fn scenario_3_full_text_search() {
    let mut engine = QueryEngine::new(product_schema());
    engine.register_text_index(Box::new(
        MemoryTextIndex::new()
            .field("title", Attribute::path("title"))
            .field("body", Attribute::path("body")),
    ));

    let mut store = Store::new();
    insert(
        &mut engine,
        &mut store,
        "doc1",
        serde_json::json!({
            "title": "Machine Learning Basics",
            "body": "A gentle look at machine learning.",
        }),
    );
    insert(
        &mut engine,
        &mut store,
        "doc2",
        serde_json::json!({
            "title": "Databases",
            "body": "Machine learning shows up in machine learning query planners.",
        }),
    );

    let output = engine
        .query(
            &Query::matches("body", "machine learning"),
            &store,
            &QueryOptions::default(),
        )
        .unwrap();
    assert_eq!(output.results.len(), 2);
    assert!(output.results[0].score.unwrap() >= output.results[1].score.unwrap());

    let output = engine
        .query(
            &Query::match_prefix("title", "mach", None),
            &store,
            &QueryOptions::default(),
        )
        .unwrap();
    assert_eq!(output.results.len(), 1);
    assert_eq!(output.results[0].key, Key::from("doc1"));
}

#[test]
fn scenario_4_cursor_round_trip() {
    let schema: Schema<Record> = Schema::builder().path("price").build();
    let mut engine = QueryEngine::new(schema);
    engine
        .register_index(Box::new(NavigableIndex::new(Attribute::path("price"))))
        .unwrap();

    let mut store = Store::new();
    for (key, price) in [("a", 10), ("b", 20), ("c", 30), ("d", 40), ("e", 50), ("f", 60), ("g", 70), ("h", 80)] {
        insert(
            &mut engine,
            &mut store,
            key,
            serde_json::json!({ "price": price }),
        );
    }

    let query = Query::gte("price", 0);
    let ordering = OrderingOpts::asc("price");

    let mut pages = Vec::new();
    let mut cursor: Option<String> = None;
    for _ in 0..5 {
        let mut options = QueryOptions::default().ordered(ordering.clone()).limited(2);
        if let Some(token) = cursor.take() {
            options = options.after(token);
        }
        let output = engine.query(&query, &store, &options).unwrap();
        pages.push(output.results.iter().map(|r| r.key.as_str().to_string()).collect::<Vec<_>>());
        if !output.has_more {
            break;
        }
        cursor = output.next_cursor;
    }

    assert_eq!(
        pages,
        vec![
            vec!["a".to_string(), "b".to_string()],
            vec!["c".to_string(), "d".to_string()],
            vec!["e".to_string(), "f".to_string()],
            vec!["g".to_string(), "h".to_string()],
        ]
    );
}

#[test]
fn scenario_5_counter_records_are_ignored() {
    // PN-counter-style records carry none of the schema attributes:
    // they never enter indexes and never match predicates.
    let (mut engine, mut store) = product_fixture();
    insert(
        &mut engine,
        &mut store,
        "counter:visits",
        serde_json::json!({ "increments": [1, 2], "decrements": [1] }),
    );

    let output = engine
        .query(
            &Query::eq("category", "Electronics"),
            &store,
            &QueryOptions::default(),
        )
        .unwrap();
    assert_eq!(output.results.len(), 2);

    let everything = engine
        .query(&Query::has("category"), &store, &QueryOptions::default())
        .unwrap();
    assert_eq!(everything.results.len(), 5);
}

#[test]
fn scenario_6_hybrid_query_preserves_scores_through_filter() {
    let mut engine = QueryEngine::new(product_schema());
    engine.register_text_index(Box::new(
        MemoryTextIndex::new().field("body", Attribute::path("body")),
    ));

    let mut store = Store::new();
    insert(
        &mut engine,
        &mut store,
        "d1",
        serde_json::json!({ "status": "published", "body": "machine learning in practice" }),
    );
    insert(
        &mut engine,
        &mut store,
        "d2",
        serde_json::json!({ "status": "draft", "body": "machine learning drafts" }),
    );

    let query = Query::and(vec![
        Query::eq("status", "published"),
        Query::matches("body", "machine learning"),
    ]);

    let plan = engine.plan(&query).unwrap().describe();
    assert!(plan.starts_with("filter"), "plan:\n{plan}");
    assert!(plan.contains("fts-scan(body"), "plan:\n{plan}");

    let output = engine.query(&query, &store, &QueryOptions::default()).unwrap();
    assert_eq!(output.results.len(), 1);
    assert_eq!(output.results[0].key, Key::from("d1"));
    assert!(output.results[0].score.is_some());
    assert!(output.results[0].matched_terms.is_some());
}

#[test]
fn live_query_over_crdt_events() {
    let schema: Schema<Record> = Schema::builder().path("status").build();
    let mut engine = QueryEngine::new(schema);
    let mut store = Store::new();

    let query = Query::eq("status", "active");
    let fingerprint = engine.register_live(&query, &store).unwrap();

    insert(
        &mut engine,
        &mut store,
        "u1",
        serde_json::json!({ "status": "active" }),
    );
    assert_eq!(engine.live_results(fingerprint).unwrap(), vec![Key::from("u1")]);

    let old = store[&Key::from("u1")].clone();
    let outcome = engine.record_removed(&Key::from("u1"), &old);
    store.remove(&Key::from("u1"));
    assert_eq!(outcome.live[&fingerprint][0].kind, LiveDeltaKind::Removed);
    assert!(engine.live_results(fingerprint).unwrap().is_empty());

    assert!(engine.unregister_live(&query));
}

#[test]
fn removal_is_idempotent_and_indexes_stay_clean() {
    let (mut engine, mut store) = product_fixture();

    let value = store[&Key::from("p1")].clone();
    engine.record_removed(&Key::from("p1"), &value);
    engine.record_removed(&Key::from("p1"), &value);
    store.remove(&Key::from("p1"));

    let output = engine
        .query(
            &Query::eq("category", "Electronics"),
            &store,
            &QueryOptions::default(),
        )
        .unwrap();
    assert_eq!(output.results.len(), 1);
    assert_eq!(output.results[0].key, Key::from("p2"));
}
