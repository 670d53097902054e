use super::*;
use crate::value::Value;
use std::ops::Bound;

fn seeded(n: u64) -> OrderedMap<u64, u64> {
    let mut map = OrderedMap::new();
    // Insert in a scrambled order so chunk splits actually occur.
    let mut k = 7u64;
    for _ in 0..n {
        map.set(k, k * 10);
        k = (k * 31 + 11) % n.max(1);
    }
    for i in 0..n {
        map.set(i, i * 10);
    }
    map
}

#[test]
fn set_get_delete_roundtrip() {
    let mut map: OrderedMap<u64, i32> = OrderedMap::new();
    assert_eq!(map.set(3u64, 30), None);
    assert_eq!(map.set(3, 33), Some(30));
    assert_eq!(map.get(&3), Some(&33));
    assert!(map.has(&3));
    assert_eq!(map.delete(&3), Some(33));
    assert_eq!(map.delete(&3), None);
    assert!(map.is_empty());
}

#[test]
fn iteration_matches_comparator_order() {
    let map = seeded(1000);
    let keys: Vec<u64> = map.keys().copied().collect();
    let mut sorted = keys.clone();
    sorted.sort_unstable();
    assert_eq!(keys, sorted);
    assert_eq!(map.len(), 1000);

    let rev: Vec<u64> = map.entries_reversed().map(|(k, _)| *k).collect();
    let mut expected = sorted;
    expected.reverse();
    assert_eq!(rev, expected);
}

#[test]
fn range_inclusivity() {
    let map = seeded(100);

    let inc_exc: Vec<u64> = map
        .range(Bound::Included(&10), Bound::Excluded(&15))
        .map(|(k, _)| *k)
        .collect();
    assert_eq!(inc_exc, vec![10, 11, 12, 13, 14]);

    let exc_inc: Vec<u64> = map
        .range(Bound::Excluded(&10), Bound::Included(&12))
        .map(|(k, _)| *k)
        .collect();
    assert_eq!(exc_inc, vec![11, 12]);

    // Crossed bounds yield nothing.
    assert_eq!(
        map.range(Bound::Included(&50), Bound::Excluded(&10)).count(),
        0
    );
}

#[test]
fn greater_and_less_than() {
    let map = seeded(20);
    let above: Vec<u64> = map.greater_than(&17, false).map(|(k, _)| *k).collect();
    assert_eq!(above, vec![18, 19]);
    let above_inc: Vec<u64> = map.greater_than(&17, true).map(|(k, _)| *k).collect();
    assert_eq!(above_inc, vec![17, 18, 19]);

    let below: Vec<u64> = map.less_than(&3, false).map(|(k, _)| *k).collect();
    assert_eq!(below, vec![0, 1, 2]);
    let below_inc: Vec<u64> = map.less_than(&3, true).map(|(k, _)| *k).collect();
    assert_eq!(below_inc, vec![0, 1, 2, 3]);
}

#[test]
fn navigation_keys() {
    let mut map: OrderedMap<u64, ()> = OrderedMap::new();
    for k in [10u64, 20, 30] {
        map.set(k, ());
    }

    assert_eq!(map.min_key(), Some(&10));
    assert_eq!(map.max_key(), Some(&30));
    assert_eq!(map.floor_key(&20), Some(&20));
    assert_eq!(map.floor_key(&25), Some(&20));
    assert_eq!(map.lower_key(&20), Some(&10));
    assert_eq!(map.ceiling_key(&20), Some(&20));
    assert_eq!(map.ceiling_key(&21), Some(&30));
    assert_eq!(map.higher_key(&20), Some(&30));
    assert_eq!(map.higher_key(&30), None);
    assert_eq!(map.lower_key(&10), None);
}

#[test]
fn positional_access() {
    let map = seeded(500);
    assert_eq!(map.at(0), Some((&0, &0)));
    assert_eq!(map.at(499), Some((&499, &4990)));
    assert_eq!(map.at(250).map(|(k, _)| *k), Some(250));
    assert_eq!(map.at(500), None);
}

#[test]
fn positional_access_survives_splits_and_merges() {
    let mut map = seeded(1000);
    for k in (0..1000u64).filter(|k| k % 2 == 0) {
        assert!(map.delete(&k).is_some());
    }

    // Odd keys remain, so position i holds key 2i+1.
    assert_eq!(map.len(), 500);
    assert_eq!(map.at(0).map(|(k, _)| *k), Some(1));
    assert_eq!(map.at(250).map(|(k, _)| *k), Some(501));
    assert_eq!(map.at(499).map(|(k, _)| *k), Some(999));
    assert_eq!(map.at(500), None);

    // Re-inserting splits chunks again; positions stay consistent.
    for k in 0..1000u64 {
        map.set(k, k * 10);
    }
    assert_eq!(map.at(42), Some((&42, &420)));
    assert_eq!(map.at(999).map(|(k, _)| *k), Some(999));
}

#[test]
fn get_or_set_and_update() {
    let mut map: OrderedMap<u64, Vec<u64>> = OrderedMap::new();
    map.get_or_set(&1, Vec::new).push(10);
    map.get_or_set(&1, Vec::new).push(11);
    assert_eq!(map.get(&1), Some(&vec![10, 11]));

    map.update(&1, |v| v.push(12));
    map.update(&2, |v| v.push(99)); // missing key: no-op
    assert_eq!(map.get(&1), Some(&vec![10, 11, 12]));
    assert_eq!(map.get(&2), None);
}

#[test]
fn delete_heavy_keeps_order() {
    let mut map = seeded(1000);
    for k in (0..1000u64).filter(|k| k % 3 != 0) {
        assert!(map.delete(&k).is_some());
    }
    let keys: Vec<u64> = map.keys().copied().collect();
    let expected: Vec<u64> = (0..1000).filter(|k| k % 3 == 0).collect();
    assert_eq!(keys, expected);
}

#[test]
fn reverse_comparator() {
    let mut map: OrderedMap<u64, (), ReverseOf<Natural>> = OrderedMap::new();
    for k in [1u64, 2, 3] {
        map.set(k, ());
    }
    let keys: Vec<u64> = map.keys().copied().collect();
    assert_eq!(keys, vec![3, 2, 1]);
    assert_eq!(map.min_key(), Some(&3));
}

#[test]
fn locale_text_comparator_folds_case() {
    let mut map: OrderedMap<Value, u32, LocaleTextOrder> = OrderedMap::new();
    map.set(Value::Text("banana".into()), 1);
    map.set(Value::Text("Apple".into()), 2);
    map.set(Value::Text("cherry".into()), 3);

    let keys: Vec<&Value> = map.keys().collect();
    assert_eq!(keys[0], &Value::Text("Apple".into()));
    assert_eq!(keys[1], &Value::Text("banana".into()));
    assert_eq!(keys[2], &Value::Text("cherry".into()));
}

#[test]
fn numeric_comparator_orders_mixed_numerics() {
    let mut map: OrderedMap<Value, (), NumericOrder> = OrderedMap::new();
    map.set(Value::Float(2.5), ());
    map.set(Value::Int(-3), ());
    map.set(Value::Uint(7), ());

    let keys: Vec<&Value> = map.keys().collect();
    assert_eq!(keys[0], &Value::Int(-3));
    assert_eq!(keys[1], &Value::Float(2.5));
    assert_eq!(keys[2], &Value::Uint(7));
}
