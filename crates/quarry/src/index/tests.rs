use super::*;
use crate::{attribute::Attribute, query::Query, value::Value};
use std::ops::Bound;

type Record = serde_json::Value;

fn status_attr() -> Attribute<Record> {
    Attribute::path("status")
}

fn price_attr() -> Attribute<Record> {
    Attribute::path("price")
}

fn tags_attr() -> Attribute<Record> {
    Attribute::multi("tags", |record: &Record| {
        record["tags"]
            .as_array()
            .map(|items| {
                items
                    .iter()
                    .filter_map(|v| v.as_str().map(|s| Value::Text(s.into())))
                    .collect()
            })
            .unwrap_or_default()
    })
}

fn key(k: &str) -> Key {
    Key::from(k)
}

fn keys_of(set: &KeySet) -> Vec<String> {
    let mut keys: Vec<String> = set.iter().map(|k| k.as_str().to_string()).collect();
    keys.sort();
    keys
}

#[test]
fn hash_index_equal_in_has() {
    let mut index = HashIndex::new(status_attr());
    index.record_added(&key("a"), &serde_json::json!({ "status": "active" }));
    index.record_added(&key("b"), &serde_json::json!({ "status": "inactive" }));
    index.record_added(&key("c"), &serde_json::json!({ "status": "active" }));
    index.record_added(&key("d"), &serde_json::json!({ "status": null }));
    index.record_added(&key("e"), &serde_json::json!({}));

    let active = index
        .retrieve(&IndexQuery::Equal(Value::Text("active".into())))
        .unwrap();
    assert_eq!(keys_of(&active), vec!["a", "c"]);

    let either = index
        .retrieve(&IndexQuery::In(vec![
            Value::Text("active".into()),
            Value::Text("inactive".into()),
        ]))
        .unwrap();
    assert_eq!(keys_of(&either), vec!["a", "b", "c"]);

    // `has` excludes explicit nulls and absent attributes.
    let present = index.retrieve(&IndexQuery::Has).unwrap();
    assert_eq!(keys_of(&present), vec!["a", "b", "c"]);

    // Unsupported kind is a typed error.
    assert!(matches!(
        index.retrieve(&IndexQuery::Range {
            lower: Bound::Unbounded,
            upper: Bound::Unbounded
        }),
        Err(crate::error::QueryError::UnsupportedIndexQuery { .. })
    ));
}

#[test]
fn hash_index_update_and_remove_are_consistent() {
    let mut index = HashIndex::new(status_attr());
    let old = serde_json::json!({ "status": "active" });
    let new = serde_json::json!({ "status": "inactive" });

    index.record_added(&key("a"), &old);
    index.record_updated(&key("a"), &old, &new);

    let active = index
        .retrieve(&IndexQuery::Equal(Value::Text("active".into())))
        .unwrap();
    assert!(active.is_empty());
    let inactive = index
        .retrieve(&IndexQuery::Equal(Value::Text("inactive".into())))
        .unwrap();
    assert_eq!(keys_of(&inactive), vec!["a"]);

    // Removal is idempotent.
    index.record_removed(&key("a"), &new);
    index.record_removed(&key("a"), &new);
    assert_eq!(index.stats().total_entries, 0);
}

#[test]
fn multi_value_attribute_indexes_once_per_value() {
    let mut index = HashIndex::new(tags_attr());
    index.record_added(&key("a"), &serde_json::json!({ "tags": ["x", "y"] }));

    let stats = index.stats();
    assert_eq!(stats.distinct_values, 2);
    assert_eq!(stats.total_entries, 2);

    let x = index
        .retrieve(&IndexQuery::Equal(Value::Text("x".into())))
        .unwrap();
    assert_eq!(keys_of(&x), vec!["a"]);
}

#[test]
fn navigable_index_ranges() {
    let mut index = NavigableIndex::new(price_attr());
    for (k, price) in [("a", 100), ("b", 500), ("c", 800), ("d", 1200)] {
        index.record_added(&key(k), &serde_json::json!({ "price": price }));
    }

    let le_800 = index
        .retrieve(&IndexQuery::Range {
            lower: Bound::Unbounded,
            upper: Bound::Included(Value::Int(800)),
        })
        .unwrap();
    assert_eq!(keys_of(&le_800), vec!["a", "b", "c"]);

    let mid = index
        .retrieve(&IndexQuery::Range {
            lower: Bound::Excluded(Value::Int(100)),
            upper: Bound::Excluded(Value::Int(1200)),
        })
        .unwrap();
    assert_eq!(keys_of(&mid), vec!["b", "c"]);

    let eq = index
        .retrieve(&IndexQuery::Equal(Value::Int(500)))
        .unwrap();
    assert_eq!(keys_of(&eq), vec!["b"]);
}

#[test]
fn navigable_build_from_data_clears_prior_state() {
    let mut index = NavigableIndex::new(price_attr());
    index.record_added(&key("stale"), &serde_json::json!({ "price": 1 }));

    let data = vec![
        (key("a"), serde_json::json!({ "price": 10 })),
        (key("b"), serde_json::json!({ "price": 20 })),
    ];
    index.build_from_data(&mut data.iter().map(|(k, v)| (k, v)));

    let all = index
        .retrieve(&IndexQuery::Range {
            lower: Bound::Unbounded,
            upper: Bound::Unbounded,
        })
        .unwrap();
    assert_eq!(keys_of(&all), vec!["a", "b"]);
}

#[test]
fn compound_index_requires_arity_and_exact_order() {
    assert!(matches!(
        CompoundIndex::<Record>::new(vec![status_attr()]),
        Err(crate::error::QueryError::CompoundArity { got: 1 })
    ));

    let index = CompoundIndex::new(vec![status_attr(), price_attr()]).unwrap();
    assert!(index.can_answer(&["status".into(), "price".into()]));
    assert!(!index.can_answer(&["price".into(), "status".into()]));
    assert!(!index.can_answer(&["status".into()]));
    assert!(!index.can_answer(&["status".into(), "price".into(), "x".into()]));
}

#[test]
fn compound_index_lookup() {
    let mut index = CompoundIndex::new(vec![status_attr(), price_attr()]).unwrap();
    index.record_added(&key("a"), &serde_json::json!({ "status": "active", "price": 10 }));
    index.record_added(&key("b"), &serde_json::json!({ "status": "active", "price": 20 }));
    // Missing attribute: not indexed.
    index.record_added(&key("c"), &serde_json::json!({ "status": "active" }));

    let hit = index
        .retrieve(&IndexQuery::Compound(vec![
            Value::Text("active".into()),
            Value::Int(10),
        ]))
        .unwrap();
    assert_eq!(keys_of(&hit), vec!["a"]);
    assert_eq!(index.stats().total_entries, 2);

    assert!(matches!(
        index.retrieve(&IndexQuery::Compound(vec![Value::Text("active".into())])),
        Err(crate::error::QueryError::CompoundValueCount {
            expected: 2,
            got: 1
        })
    ));
}

#[test]
fn compound_null_is_distinct_from_missing() {
    let mut index = CompoundIndex::new(vec![status_attr(), price_attr()]).unwrap();
    index.record_added(&key("null"), &serde_json::json!({ "status": null, "price": 1 }));

    let hit = index
        .retrieve(&IndexQuery::Compound(vec![Value::Null, Value::Int(1)]))
        .unwrap();
    assert_eq!(keys_of(&hit), vec!["null"]);
}

#[test]
fn compound_values_containing_joiner_bytes_do_not_collide() {
    let mut index = CompoundIndex::new(vec![status_attr(), price_attr()]).unwrap();
    index.record_added(
        &key("a"),
        &serde_json::json!({ "status": "x+y", "price": "z" }),
    );

    // A tuple that would collide under naive string joining.
    let miss = index
        .retrieve(&IndexQuery::Compound(vec![
            Value::Text("x".into()),
            Value::Text("y+z".into()),
        ]))
        .unwrap();
    assert!(miss.is_empty());
}

#[test]
fn standing_index_transitions() {
    let schema = crate::attribute::Schema::builder().path("status").build();
    let query = Query::eq("status", "active");
    let mut index = StandingQueryIndex::new(query, schema).unwrap();

    let active = serde_json::json!({ "status": "active" });
    let inactive = serde_json::json!({ "status": "inactive" });

    assert_eq!(
        index.determine_change(None, Some(&active)),
        MatchChange::Added
    );
    assert_eq!(
        index.determine_change(Some(&active), Some(&inactive)),
        MatchChange::Removed
    );
    assert_eq!(
        index.determine_change(Some(&active), Some(&active)),
        MatchChange::Updated
    );
    assert_eq!(
        index.determine_change(None, Some(&inactive)),
        MatchChange::Unchanged
    );

    index.record_added(&key("u1"), &active);
    assert!(index.contains(&key("u1")));

    index.record_updated(&key("u1"), &active, &inactive);
    assert!(!index.contains(&key("u1")));

    // Retrieval ignores the query argument and returns the full set.
    index.record_added(&key("u2"), &active);
    let set = index.retrieve(&IndexQuery::Has).unwrap();
    assert_eq!(keys_of(&set), vec!["u2"]);
}
