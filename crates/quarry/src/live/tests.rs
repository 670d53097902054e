use super::*;
use crate::{
    attribute::{Attribute, Schema},
    fts::{FullTextIndex, MemoryTextIndex, TextCatalog},
    key::Key,
    query::Query,
};
use std::{
    collections::BTreeMap,
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
};

type Record = serde_json::Value;

fn schema() -> Schema<Record> {
    Schema::builder().path("status").path("body").build()
}

fn empty_data() -> BTreeMap<Key, Record> {
    BTreeMap::new()
}

fn text_catalog(data: &BTreeMap<Key, Record>) -> TextCatalog<Record> {
    let mut index = MemoryTextIndex::new().field("body", Attribute::path("body"));
    for (key, value) in data {
        index.on_set(key, value);
    }
    let mut catalog = TextCatalog::new();
    catalog.register(Box::new(index));
    catalog
}

#[test]
fn standing_live_query_emits_membership_deltas() {
    let data = empty_data();
    let text = TextCatalog::new();
    let mut registry = LiveQueryRegistry::new(schema());
    let query = Query::eq("status", "active");
    let fp = registry.register(&query, &data, &text).unwrap();

    let active = serde_json::json!({ "status": "active" });
    let inactive = serde_json::json!({ "status": "inactive" });

    let deltas = registry.record_added(&Key::from("u1"), &active, &text);
    assert_eq!(
        deltas[&fp],
        vec![LiveDelta::plain(LiveDeltaKind::Added, &Key::from("u1"))]
    );
    assert!(registry.results(fp).unwrap().contains(&Key::from("u1")));

    let deltas = registry.record_updated(&Key::from("u1"), &active, &inactive, &text);
    assert_eq!(
        deltas[&fp],
        vec![LiveDelta::plain(LiveDeltaKind::Removed, &Key::from("u1"))]
    );
    assert!(registry.results(fp).unwrap().is_empty());

    // Irrelevant records produce no deltas at all.
    let deltas = registry.record_added(&Key::from("u2"), &inactive, &text);
    assert!(deltas.is_empty());
}

#[test]
fn refcounting_matches_standing_semantics() {
    let data = empty_data();
    let text = TextCatalog::new();
    let mut registry = LiveQueryRegistry::new(schema());
    let query = Query::eq("status", "active");

    let fp = registry.register(&query, &data, &text).unwrap();
    registry.register(&query, &data, &text).unwrap();
    assert_eq!(registry.refcount(fp), 2);
    assert_eq!(registry.len(), 1);

    assert!(!registry.unregister(&query));
    assert!(registry.unregister(&query));
    assert!(registry.is_empty());

    // After the final unregister nothing is observable.
    let deltas = registry.record_added(
        &Key::from("u1"),
        &serde_json::json!({ "status": "active" }),
        &text,
    );
    assert!(deltas.is_empty());
}

#[test]
fn selection_picks_text_index_only_for_atomic_text_queries() {
    let data = empty_data();
    let text = text_catalog(&data);
    let mut registry = LiveQueryRegistry::new(schema());

    // Atomic match over an indexed field: ranked live query. A score
    // shows up on the delta.
    let match_query = Query::matches("body", "machine learning");
    let fp = registry.register(&match_query, &data, &text).unwrap();

    // Composite queries and unindexed fields stay standing.
    let composite = Query::and(vec![
        Query::eq("status", "published"),
        Query::matches("body", "machine learning"),
    ]);
    let composite_fp = registry.register(&composite, &data, &text).unwrap();
    let unindexed = Query::matches("title", "machine");
    registry.register(&unindexed, &data, &text).unwrap();

    let mut catalog_data = empty_data();
    catalog_data.insert(
        Key::from("d1"),
        serde_json::json!({ "status": "published", "body": "machine learning notes" }),
    );
    let text = text_catalog(&catalog_data);

    let record = &catalog_data[&Key::from("d1")];
    let deltas = registry.record_added(&Key::from("d1"), record, &text);

    let ranked = &deltas[&fp][0];
    assert_eq!(ranked.kind, LiveDeltaKind::Added);
    assert!(ranked.score.is_some());
    assert!(ranked.matched_terms.is_some());

    // The composite query matched too, through the standing path.
    let standing = &deltas[&composite_fp][0];
    assert_eq!(standing.kind, LiveDeltaKind::Added);
    assert!(standing.score.is_none());
}

#[test]
fn live_text_index_updates_and_evicts_lowest_scores() {
    let mut data = empty_data();
    for (key, body) in [
        ("d1", "machine learning"),
        ("d2", "machine learning machine learning"),
        ("d3", "machine learning machine learning machine learning"),
    ] {
        data.insert(Key::from(key), serde_json::json!({ "body": body }));
    }
    let text = text_catalog(&data);

    let mut registry = LiveQueryRegistry::new(schema());
    let query = Query::matches("body", "machine learning");
    let fp = registry
        .register_with(
            &query,
            LiveTextOptions {
                max_results: Some(2),
                min_score: None,
            },
            &empty_data(),
            &text,
        )
        .unwrap();

    // d1, d2 fill the top-2.
    for key in ["d1", "d2"] {
        let deltas = registry.record_added(&Key::from(key), &data[&Key::from(key)], &text);
        assert_eq!(deltas[&fp][0].kind, LiveDeltaKind::Added);
    }

    // d3 scores highest: it enters and the lowest (d1) is evicted.
    let deltas = registry.record_added(&Key::from("d3"), &data[&Key::from("d3")], &text);
    let batch = &deltas[&fp];
    assert_eq!(batch.len(), 2);
    assert_eq!(batch[0].kind, LiveDeltaKind::Added);
    assert_eq!(batch[0].key, Key::from("d3"));
    assert_eq!(batch[1].kind, LiveDeltaKind::Removed);
    assert_eq!(batch[1].key, Key::from("d1"));

    // Ranked results lead with the best score.
    assert_eq!(
        registry.results(fp).unwrap(),
        vec![Key::from("d3"), Key::from("d2")]
    );

    // Update carries the old score; removal reports it too.
    let deltas = registry.record_updated(
        &Key::from("d2"),
        &data[&Key::from("d2")],
        &data[&Key::from("d2")],
        &text,
    );
    let updated = &deltas[&fp][0];
    assert_eq!(updated.kind, LiveDeltaKind::Updated);
    assert!(updated.old_score.is_some());
}

#[test]
fn panicking_listener_does_not_starve_siblings() {
    let data = empty_data();
    let text = TextCatalog::new();
    let mut registry = LiveQueryRegistry::new(schema());
    let query = Query::eq("status", "active");
    let fp = registry.register(&query, &data, &text).unwrap();

    let observed = Arc::new(AtomicUsize::new(0));

    registry
        .subscribe(fp, Box::new(|_| panic!("listener failure")))
        .unwrap();
    let counter = Arc::clone(&observed);
    let healthy = registry
        .subscribe(fp, Box::new(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        }))
        .unwrap();

    registry.record_added(
        &Key::from("u1"),
        &serde_json::json!({ "status": "active" }),
        &text,
    );
    assert_eq!(observed.load(Ordering::SeqCst), 1);

    // Unsubscribed listeners stop observing.
    assert!(registry.unsubscribe(fp, healthy));
    registry.record_added(
        &Key::from("u2"),
        &serde_json::json!({ "status": "active" }),
        &text,
    );
    assert_eq!(observed.load(Ordering::SeqCst), 1);
}
