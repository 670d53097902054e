use crate::key::Key;
use std::collections::{BTreeMap, HashMap};

///
/// RecordSnapshot
///
/// Read-only view of a collection's current records, owned by the host
/// CRDT. The executor reads data and indexes under the same critical
/// section, so one snapshot observes one consistent mutation prefix.
/// The NOT plan node draws its key universe from here.
///

pub trait RecordSnapshot<V> {
    fn get(&self, key: &Key) -> Option<&V>;

    fn len(&self) -> usize;

    fn iter<'a>(&'a self) -> Box<dyn Iterator<Item = (&'a Key, &'a V)> + 'a>;

    fn contains(&self, key: &Key) -> bool {
        self.get(key).is_some()
    }

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Live key universe, used as the complement base for NOT.
    fn keys<'a>(&'a self) -> Box<dyn Iterator<Item = &'a Key> + 'a>
    where
        V: 'a,
    {
        Box::new(self.iter().map(|(key, _)| key))
    }
}

impl<V> RecordSnapshot<V> for BTreeMap<Key, V> {
    fn get(&self, key: &Key) -> Option<&V> {
        Self::get(self, key)
    }

    fn len(&self) -> usize {
        Self::len(self)
    }

    fn iter<'a>(&'a self) -> Box<dyn Iterator<Item = (&'a Key, &'a V)> + 'a> {
        Box::new(Self::iter(self))
    }
}

impl<V> RecordSnapshot<V> for HashMap<Key, V> {
    fn get(&self, key: &Key) -> Option<&V> {
        Self::get(self, key)
    }

    fn len(&self) -> usize {
        Self::len(self)
    }

    fn iter<'a>(&'a self) -> Box<dyn Iterator<Item = (&'a Key, &'a V)> + 'a> {
        Box::new(Self::iter(self))
    }
}
