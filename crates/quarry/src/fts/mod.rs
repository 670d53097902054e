mod analyzer;
mod index;
mod scorer;

pub use analyzer::{Analyzer, AlphanumericTokenizer, LowercaseFilter, Token, TokenFilter, Tokenizer};
pub use index::MemoryTextIndex;
pub use scorer::{RelevanceScorer, TermStats, TfIdfScorer};

use crate::{key::Key, query::TextQuery, snapshot::RecordSnapshot};
use std::collections::BTreeMap;

///
/// ScoredHit
///

#[derive(Clone, Debug, PartialEq)]
pub struct ScoredHit {
    pub key: Key,
    pub score: f32,
    pub matched_terms: Vec<String>,
}

///
/// SearchOptions
///

#[derive(Clone, Copy, Debug, Default)]
pub struct SearchOptions {
    pub limit: Option<usize>,
    pub min_score: Option<f32>,
}

///
/// FullTextIndex
///
/// Contract of the inverted index the engine integrates with. The
/// optimizer costs it, the executor's fts-scan delegates to `search`,
/// and live text queries use `score_single_document` for incremental
/// re-scoring.
///

pub trait FullTextIndex<V> {
    /// Field names this index answers for.
    fn fields(&self) -> Vec<String>;

    fn on_set(&mut self, key: &Key, record: &V);

    fn on_remove(&mut self, key: &Key);

    /// Ranked search; unknown fields yield no hits.
    fn search(&self, query: &TextQuery, options: &SearchOptions) -> Vec<ScoredHit>;

    /// Score one document against the query; `None` when it does not match.
    fn score_single_document(&self, key: &Key, query: &TextQuery) -> Option<ScoredHit>;

    fn doc_count(&self) -> usize;

    fn build_from_data<'a>(&mut self, entries: &mut dyn Iterator<Item = (&'a Key, &'a V)>)
    where
        V: 'a;

    fn clear(&mut self);
}

///
/// TextCatalog
///
/// Field → full-text index routing for one collection. Owned by the
/// engine; the optimizer, executor, and live registry all read through
/// it so the whole query path shares one set of postings.
///

pub struct TextCatalog<V> {
    indexes: Vec<Box<dyn FullTextIndex<V>>>,
    by_field: BTreeMap<String, usize>,
}

impl<V> Default for TextCatalog<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> TextCatalog<V> {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            indexes: Vec::new(),
            by_field: BTreeMap::new(),
        }
    }

    /// Register an index under every field it serves; the latest
    /// registration of a field wins.
    pub fn register(&mut self, index: Box<dyn FullTextIndex<V>>) {
        let slot = self.indexes.len();
        for field in index.fields() {
            self.by_field.insert(field, slot);
        }
        self.indexes.push(index);
    }

    #[must_use]
    pub fn for_field(&self, field: &str) -> Option<&dyn FullTextIndex<V>> {
        self.by_field
            .get(field)
            .map(|slot| self.indexes[*slot].as_ref())
    }

    #[must_use]
    pub fn has_field(&self, field: &str) -> bool {
        self.by_field.contains_key(field)
    }

    /// Document count of the index serving `field`; zero when unmapped.
    #[must_use]
    pub fn doc_count(&self, field: &str) -> usize {
        self.for_field(field).map_or(0, FullTextIndex::doc_count)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.indexes.is_empty()
    }

    pub fn on_set(&mut self, key: &Key, record: &V) {
        for index in &mut self.indexes {
            index.on_set(key, record);
        }
    }

    pub fn on_remove(&mut self, key: &Key) {
        for index in &mut self.indexes {
            index.on_remove(key);
        }
    }

    /// Rebuild every registered index from a snapshot.
    pub fn build_from_data(&mut self, data: &dyn RecordSnapshot<V>) {
        for index in &mut self.indexes {
            index.build_from_data(&mut data.iter());
        }
    }

    pub fn clear(&mut self) {
        for index in &mut self.indexes {
            index.clear();
        }
    }
}
