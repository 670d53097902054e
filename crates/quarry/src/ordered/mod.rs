mod comparator;
mod counts;
mod iter;

#[cfg(test)]
mod tests;

pub use comparator::{CanonicalOrder, Comparator, LocaleTextOrder, Natural, NumericOrder, ReverseOf};
pub use iter::{Entries, EntriesRev, Range};

use counts::ChunkCounts;
use std::{cmp::Ordering, ops::Bound};

// Leaf sizing for the chunked backbone. 128-entry chunks keep the chunk
// directory short enough for six-figure key counts while inserts stay
// memmove-bounded.
const CHUNK_MAX: usize = 128;
const CHUNK_MIN: usize = CHUNK_MAX / 4;

///
/// OrderedMap
///
/// Sorted key→value container parameterized by a comparator. Two-level
/// chunked layout: a directory of leaf chunks, each a sorted vector,
/// plus a binary-indexed tree over chunk lengths for positional access.
/// Iteration order strictly follows the comparator.
///

pub struct OrderedMap<K, V, C = Natural> {
    cmp: C,
    chunks: Vec<Chunk<K, V>>,
    counts: ChunkCounts,
    len: usize,
}

#[derive(Debug)]
struct Chunk<K, V> {
    entries: Vec<(K, V)>,
}

impl<K, V> Chunk<K, V> {
    fn last_key(&self) -> &K {
        // Chunks are never kept empty.
        &self.entries[self.entries.len() - 1].0
    }
}

impl<K, V, C: Comparator<K> + Default> Default for OrderedMap<K, V, C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V, C: Comparator<K> + Default> OrderedMap<K, V, C> {
    #[must_use]
    pub fn new() -> Self {
        Self::with_comparator(C::default())
    }
}

impl<K, V, C: Comparator<K>> OrderedMap<K, V, C> {
    #[must_use]
    pub const fn with_comparator(cmp: C) -> Self {
        Self {
            cmp,
            chunks: Vec::new(),
            counts: ChunkCounts::new(),
            len: 0,
        }
    }

    #[must_use]
    pub const fn len(&self) -> usize {
        self.len
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn clear(&mut self) {
        self.chunks.clear();
        self.counts.clear();
        self.len = 0;
    }

    #[must_use]
    pub const fn comparator(&self) -> &C {
        &self.cmp
    }

    ///
    /// POINT OPERATIONS
    ///

    /// Upsert. Returns the previous value when the key was present.
    pub fn set(&mut self, key: K, value: V) -> Option<V> {
        if self.chunks.is_empty() {
            self.chunks.push(Chunk {
                entries: vec![(key, value)],
            });
            self.len = 1;
            self.rebuild_counts();
            return None;
        }

        let mut ci = self.chunk_for(&key, true);
        if ci == self.chunks.len() {
            // Past every chunk: append into the last one.
            ci -= 1;
        }

        let cmp = &self.cmp;
        let chunk = &mut self.chunks[ci];
        let ei = chunk
            .entries
            .partition_point(|(k, _)| cmp.cmp(k, &key) == Ordering::Less);

        if ei < chunk.entries.len() && cmp.cmp(&chunk.entries[ei].0, &key) == Ordering::Equal {
            return Some(std::mem::replace(&mut chunk.entries[ei].1, value));
        }

        chunk.entries.insert(ei, (key, value));
        self.len += 1;

        if chunk.entries.len() > CHUNK_MAX {
            let right = chunk.entries.split_off(CHUNK_MAX / 2);
            self.chunks.insert(ci + 1, Chunk { entries: right });
            self.rebuild_counts();
        } else {
            self.counts.add(ci, 1);
        }

        None
    }

    #[must_use]
    pub fn get(&self, key: &K) -> Option<&V> {
        let (ci, ei) = self.locate(key)?;
        Some(&self.chunks[ci].entries[ei].1)
    }

    #[must_use]
    pub fn get_mut(&mut self, key: &K) -> Option<&mut V> {
        let (ci, ei) = self.locate(key)?;
        Some(&mut self.chunks[ci].entries[ei].1)
    }

    #[must_use]
    pub fn has(&self, key: &K) -> bool {
        self.locate(key).is_some()
    }

    pub fn delete(&mut self, key: &K) -> Option<V> {
        let (ci, ei) = self.locate(key)?;
        let (_, value) = self.chunks[ci].entries.remove(ei);
        self.len -= 1;
        self.counts.subtract(ci, 1);
        self.rebalance(ci);
        Some(value)
    }

    /// Fetch the value, inserting one from `factory` when absent.
    pub fn get_or_set(&mut self, key: &K, factory: impl FnOnce() -> V) -> &mut V
    where
        K: Clone,
    {
        if self.locate(key).is_none() {
            self.set(key.clone(), factory());
        }
        match self.locate(key) {
            Some((ci, ei)) => &mut self.chunks[ci].entries[ei].1,
            None => unreachable!("key was just inserted"),
        }
    }

    /// Apply `f` to the value when present; no-op on a missing key.
    pub fn update(&mut self, key: &K, f: impl FnOnce(&mut V)) {
        if let Some(value) = self.get_mut(key) {
            f(value);
        }
    }

    ///
    /// NAVIGATION
    ///

    #[must_use]
    pub fn min_key(&self) -> Option<&K> {
        self.chunks.first().map(|c| &c.entries[0].0)
    }

    #[must_use]
    pub fn max_key(&self) -> Option<&K> {
        self.chunks.last().map(|c| c.last_key())
    }

    /// Least key `>= key`.
    #[must_use]
    pub fn ceiling_key(&self, key: &K) -> Option<&K> {
        self.key_at(self.position_from(Bound::Included(key)))
    }

    /// Least key `> key`.
    #[must_use]
    pub fn higher_key(&self, key: &K) -> Option<&K> {
        self.key_at(self.position_from(Bound::Excluded(key)))
    }

    /// Greatest key `<= key`.
    #[must_use]
    pub fn floor_key(&self, key: &K) -> Option<&K> {
        self.key_at(self.predecessor(self.position_from(Bound::Excluded(key)))?)
    }

    /// Greatest key `< key`.
    #[must_use]
    pub fn lower_key(&self, key: &K) -> Option<&K> {
        self.key_at(self.predecessor(self.position_from(Bound::Included(key)))?)
    }

    /// Positional access in comparator order; out of range yields
    /// `None`. Descends the chunk-count tree, so cost stays
    /// logarithmic in the key count.
    #[must_use]
    pub fn at(&self, index: usize) -> Option<(&K, &V)> {
        if index >= self.len {
            return None;
        }
        let (ci, offset) = self.counts.locate(index);
        let (k, v) = self.chunks.get(ci)?.entries.get(offset)?;
        Some((k, v))
    }

    ///
    /// ITERATION
    ///

    #[must_use]
    pub fn entries(&self) -> Entries<'_, K, V> {
        Entries::new(&self.chunks)
    }

    pub fn keys(&self) -> impl Iterator<Item = &K> {
        self.entries().map(|(k, _)| k)
    }

    pub fn values(&self) -> impl Iterator<Item = &V> {
        self.entries().map(|(_, v)| v)
    }

    #[must_use]
    pub fn entries_reversed(&self) -> EntriesRev<'_, K, V> {
        EntriesRev::new(&self.chunks)
    }

    /// Lazy ordered sequence over `[lower, upper]` under the given
    /// bound inclusivities. Empty when the bounds cross.
    #[must_use]
    pub fn range<'m, 'k>(
        &'m self,
        lower: Bound<&'k K>,
        upper: Bound<&'k K>,
    ) -> Range<'m, 'k, K, V, C> {
        let (chunk, idx) = self.position_from(lower);
        Range::new(self, chunk, idx, upper)
    }

    /// Lazy ordered sequence of entries above `key`.
    #[must_use]
    pub fn greater_than<'m, 'k>(&'m self, key: &'k K, inclusive: bool) -> Range<'m, 'k, K, V, C> {
        let lower = if inclusive {
            Bound::Included(key)
        } else {
            Bound::Excluded(key)
        };
        self.range(lower, Bound::Unbounded)
    }

    /// Lazy ordered sequence of entries below `key`.
    #[must_use]
    pub fn less_than<'m, 'k>(&'m self, key: &'k K, inclusive: bool) -> Range<'m, 'k, K, V, C> {
        let upper = if inclusive {
            Bound::Included(key)
        } else {
            Bound::Excluded(key)
        };
        self.range(Bound::Unbounded, upper)
    }

    ///
    /// INTERNALS
    ///

    fn upper_allows(&self, key: &K, upper: Bound<&K>) -> bool {
        match upper {
            Bound::Unbounded => true,
            Bound::Included(u) => self.cmp.cmp(key, u) != Ordering::Greater,
            Bound::Excluded(u) => self.cmp.cmp(key, u) == Ordering::Less,
        }
    }

    // First chunk that could hold a key `>=` (ge) or `>` (gt) the probe.
    fn chunk_for(&self, key: &K, inclusive: bool) -> usize {
        self.chunks.partition_point(|chunk| {
            let ord = self.cmp.cmp(chunk.last_key(), key);
            if inclusive {
                ord == Ordering::Less
            } else {
                ord != Ordering::Greater
            }
        })
    }

    fn locate(&self, key: &K) -> Option<(usize, usize)> {
        let (ci, ei) = self.position_from(Bound::Included(key));
        if ci == self.chunks.len() {
            return None;
        }
        let (candidate, _) = &self.chunks[ci].entries[ei];
        (self.cmp.cmp(candidate, key) == Ordering::Equal).then_some((ci, ei))
    }

    // First position whose key satisfies the lower bound; the end
    // position is `(chunks.len(), 0)`.
    fn position_from(&self, lower: Bound<&K>) -> (usize, usize) {
        let (key, inclusive) = match lower {
            Bound::Unbounded => return (0, 0),
            Bound::Included(key) => (key, true),
            Bound::Excluded(key) => (key, false),
        };

        let ci = self.chunk_for(key, inclusive);
        if ci == self.chunks.len() {
            return (ci, 0);
        }

        let ei = self.chunks[ci].entries.partition_point(|(k, _)| {
            let ord = self.cmp.cmp(k, key);
            if inclusive {
                ord == Ordering::Less
            } else {
                ord != Ordering::Greater
            }
        });

        (ci, ei)
    }

    fn predecessor(&self, (ci, ei): (usize, usize)) -> Option<(usize, usize)> {
        if ei > 0 {
            return Some((ci, ei - 1));
        }
        if ci > 0 {
            let prev = ci - 1;
            return Some((prev, self.chunks[prev].entries.len() - 1));
        }
        None
    }

    fn key_at(&self, (ci, ei): (usize, usize)) -> Option<&K> {
        self.chunks
            .get(ci)
            .and_then(|chunk| chunk.entries.get(ei))
            .map(|(k, _)| k)
    }

    fn rebalance(&mut self, ci: usize) {
        if self.chunks[ci].entries.is_empty() {
            self.chunks.remove(ci);
            self.rebuild_counts();
            return;
        }
        if self.chunks[ci].entries.len() >= CHUNK_MIN {
            return;
        }

        if ci > 0
            && self.chunks[ci - 1].entries.len() + self.chunks[ci].entries.len() <= CHUNK_MAX
        {
            let chunk = self.chunks.remove(ci);
            self.chunks[ci - 1].entries.extend(chunk.entries);
            self.rebuild_counts();
        } else if ci + 1 < self.chunks.len()
            && self.chunks[ci].entries.len() + self.chunks[ci + 1].entries.len() <= CHUNK_MAX
        {
            let next = self.chunks.remove(ci + 1);
            self.chunks[ci].entries.extend(next.entries);
            self.rebuild_counts();
        }
    }

    // Directory shape changed: recompute the count tree in one pass.
    fn rebuild_counts(&mut self) {
        self.counts
            .rebuild(self.chunks.iter().map(|chunk| chunk.entries.len()));
    }
}

impl<K, V, C> std::fmt::Debug for OrderedMap<K, V, C>
where
    K: std::fmt::Debug,
    V: std::fmt::Debug,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_map()
            .entries(self.chunks.iter().flat_map(|c| c.entries.iter().map(|(k, v)| (k, v))))
            .finish()
    }
}
