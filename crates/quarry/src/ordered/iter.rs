use super::{Chunk, Comparator, OrderedMap};
use std::ops::Bound;

///
/// Entries
///
/// Forward iteration in comparator order.
///

pub struct Entries<'a, K, V> {
    chunks: &'a [Chunk<K, V>],
    chunk: usize,
    idx: usize,
}

impl<'a, K, V> Entries<'a, K, V> {
    pub(in crate::ordered) const fn new(chunks: &'a [Chunk<K, V>]) -> Self {
        Self {
            chunks,
            chunk: 0,
            idx: 0,
        }
    }
}

impl<'a, K, V> Iterator for Entries<'a, K, V> {
    type Item = (&'a K, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        let chunk = self.chunks.get(self.chunk)?;
        let (k, v) = &chunk.entries[self.idx];

        self.idx += 1;
        if self.idx == chunk.entries.len() {
            self.chunk += 1;
            self.idx = 0;
        }

        Some((k, v))
    }
}

///
/// EntriesRev
///
/// Reverse iteration in comparator order.
///

pub struct EntriesRev<'a, K, V> {
    chunks: &'a [Chunk<K, V>],
    // Position one past the next entry to yield; zero means exhausted.
    chunk: usize,
    idx: usize,
}

impl<'a, K, V> EntriesRev<'a, K, V> {
    pub(in crate::ordered) fn new(chunks: &'a [Chunk<K, V>]) -> Self {
        let chunk = chunks.len();
        let idx = chunks.last().map_or(0, |c| c.entries.len());
        Self { chunks, chunk, idx }
    }
}

impl<'a, K, V> Iterator for EntriesRev<'a, K, V> {
    type Item = (&'a K, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        if self.chunk == 0 {
            return None;
        }

        if self.idx == 0 {
            self.chunk -= 1;
            if self.chunk == 0 {
                return None;
            }
            self.idx = self.chunks[self.chunk - 1].entries.len();
        }

        self.idx -= 1;
        let (k, v) = &self.chunks[self.chunk - 1].entries[self.idx];
        Some((k, v))
    }
}

///
/// Range
///
/// Lazy ordered sequence between two bounds. The lower bound is
/// resolved to a start position at construction; the upper bound is
/// checked per step.
///

pub struct Range<'m, 'k, K, V, C> {
    map: &'m OrderedMap<K, V, C>,
    chunk: usize,
    idx: usize,
    upper: Bound<&'k K>,
    done: bool,
}

impl<'m, 'k, K, V, C: Comparator<K>> Range<'m, 'k, K, V, C> {
    pub(in crate::ordered) const fn new(
        map: &'m OrderedMap<K, V, C>,
        chunk: usize,
        idx: usize,
        upper: Bound<&'k K>,
    ) -> Self {
        Self {
            map,
            chunk,
            idx,
            upper,
            done: false,
        }
    }
}

impl<'m, K, V, C: Comparator<K>> Iterator for Range<'m, '_, K, V, C> {
    type Item = (&'m K, &'m V);

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        let chunk = match self.map.chunks.get(self.chunk) {
            Some(chunk) => chunk,
            None => {
                self.done = true;
                return None;
            }
        };

        let (k, v) = &chunk.entries[self.idx];
        if !self.map.upper_allows(k, self.upper) {
            self.done = true;
            return None;
        }

        self.idx += 1;
        if self.idx == chunk.entries.len() {
            self.chunk += 1;
            self.idx = 0;
        }

        Some((k, v))
    }
}
