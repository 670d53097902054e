use super::{
    Analyzer, FullTextIndex, RelevanceScorer, ScoredHit, SearchOptions, TermStats, TfIdfScorer,
};
use crate::{
    attribute::Attribute,
    key::Key,
    query::{PhraseQuery, TextQuery},
    value::Value,
};
use std::collections::{BTreeMap, BTreeSet, HashMap};

///
/// MemoryTextIndex
///
/// In-memory inverted index: per-field postings of term → document →
/// positions, plus document lengths for scoring. Tokenization and
/// scoring are both pluggable; this type only maintains postings and
/// aggregates statistics.
///

pub struct MemoryTextIndex<V> {
    analyzer: Analyzer,
    scorer: Box<dyn RelevanceScorer>,
    attributes: BTreeMap<String, Attribute<V>>,
    postings: BTreeMap<String, FieldPostings>,
    docs: BTreeSet<Key>,
}

#[derive(Default)]
struct FieldPostings {
    terms: HashMap<String, HashMap<Key, Vec<u32>>>,
    doc_lengths: HashMap<Key, u32>,
    total_length: u64,
}

impl FieldPostings {
    fn remove_doc(&mut self, key: &Key) {
        if let Some(length) = self.doc_lengths.remove(key) {
            self.total_length -= u64::from(length);
        }
        self.terms.retain(|_, docs| {
            docs.remove(key);
            !docs.is_empty()
        });
    }

    fn average_doc_length(&self) -> f32 {
        if self.doc_lengths.is_empty() {
            0.0
        } else {
            self.total_length as f32 / self.doc_lengths.len() as f32
        }
    }
}

impl<V> MemoryTextIndex<V> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            analyzer: Analyzer::default(),
            scorer: Box::new(TfIdfScorer),
            attributes: BTreeMap::new(),
            postings: BTreeMap::new(),
            docs: BTreeSet::new(),
        }
    }

    #[must_use]
    pub fn with_analyzer(mut self, analyzer: Analyzer) -> Self {
        self.analyzer = analyzer;
        self
    }

    #[must_use]
    pub fn with_scorer(mut self, scorer: Box<dyn RelevanceScorer>) -> Self {
        self.scorer = scorer;
        self
    }

    /// Add an indexed field backed by a text attribute.
    #[must_use]
    pub fn field(mut self, name: impl Into<String>, attribute: Attribute<V>) -> Self {
        let name = name.into();
        self.attributes.insert(name.clone(), attribute);
        self.postings.insert(name, FieldPostings::default());
        self
    }

    fn field_text(attribute: &Attribute<V>, record: &V) -> String {
        attribute
            .values(record)
            .iter()
            .filter_map(Value::as_text)
            .collect::<Vec<_>>()
            .join(" ")
    }

    fn index_document(&mut self, key: &Key, record: &V) {
        for (field, attribute) in &self.attributes {
            let text = Self::field_text(attribute, record);
            let tokens = self.analyzer.analyze(&text);
            let Some(postings) = self.postings.get_mut(field) else {
                continue;
            };

            postings.doc_lengths.insert(key.clone(), tokens.len() as u32);
            postings.total_length += tokens.len() as u64;
            for token in tokens {
                postings
                    .terms
                    .entry(token.term)
                    .or_default()
                    .entry(key.clone())
                    .or_default()
                    .push(token.position);
            }
        }
        self.docs.insert(key.clone());
    }

    // Expand a prefix into concrete index terms, alphabetically, up to
    // the expansion cap.
    fn expand_prefix(postings: &FieldPostings, prefix: &str, max_expansions: usize) -> Vec<String> {
        let mut terms: Vec<String> = postings
            .terms
            .keys()
            .filter(|term| term.starts_with(prefix))
            .cloned()
            .collect();
        terms.sort();
        terms.truncate(max_expansions);
        terms
    }

    fn query_terms(&self, query: &TextQuery) -> Option<(String, Vec<String>)> {
        let field = query.field().to_string();
        let postings = self.postings.get(&field)?;

        let terms = match query {
            TextQuery::Match(m) => self
                .analyzer
                .analyze(&m.text)
                .into_iter()
                .map(|t| t.term)
                .collect(),
            TextQuery::Phrase(p) => self
                .analyzer
                .analyze(&p.text)
                .into_iter()
                .map(|t| t.term)
                .collect(),
            TextQuery::Prefix(p) => {
                let prefix = p.prefix.to_lowercase();
                Self::expand_prefix(postings, &prefix, p.max_expansions)
            }
        };

        Some((field, terms))
    }

    fn score_document(
        &self,
        postings: &FieldPostings,
        key: &Key,
        terms: &[String],
        phrase: Option<&PhraseQuery>,
    ) -> Option<ScoredHit> {
        if let Some(phrase) = phrase {
            let mut position_lists = Vec::with_capacity(terms.len());
            for term in terms {
                position_lists.push(postings.terms.get(term)?.get(key)?);
            }
            if !phrase_window_matches(&position_lists, phrase.slop) {
                return None;
            }
        }

        let doc_length = postings.doc_lengths.get(key).copied().unwrap_or(0) as f32;
        let doc_count = postings.doc_lengths.len() as f32;
        let average_doc_length = postings.average_doc_length();

        let mut score = 0.0f32;
        let mut matched_terms = Vec::new();
        for term in terms {
            let Some(docs) = postings.terms.get(term) else {
                continue;
            };
            let Some(positions) = docs.get(key) else {
                continue;
            };

            score += self.scorer.score(&TermStats {
                term_frequency: positions.len() as f32,
                doc_frequency: docs.len() as f32,
                doc_count,
                doc_length,
                average_doc_length,
            });
            if !matched_terms.contains(term) {
                matched_terms.push(term.clone());
            }
        }

        if matched_terms.is_empty() {
            return None;
        }

        Some(ScoredHit {
            key: key.clone(),
            score,
            matched_terms,
        })
    }

    fn candidates(
        postings: &FieldPostings,
        terms: &[String],
        require_all: bool,
    ) -> BTreeSet<Key> {
        let mut out: BTreeSet<Key> = BTreeSet::new();
        for (i, term) in terms.iter().enumerate() {
            let docs: BTreeSet<Key> = postings
                .terms
                .get(term)
                .map(|docs| docs.keys().cloned().collect())
                .unwrap_or_default();

            if require_all {
                if docs.is_empty() {
                    return BTreeSet::new();
                }
                if i == 0 {
                    out = docs;
                } else {
                    out.retain(|key| docs.contains(key));
                }
            } else {
                out.extend(docs);
            }
        }
        out
    }
}

impl<V> Default for MemoryTextIndex<V> {
    fn default() -> Self {
        Self::new()
    }
}

// An ordered occurrence of every phrase term whose total stretch stays
// within `slop` extra positions. Greedy smallest-next scan per start.
fn phrase_window_matches(position_lists: &[&Vec<u32>], slop: u32) -> bool {
    let Some(first) = position_lists.first() else {
        return false;
    };

    'starts: for &start in first.iter() {
        let mut prev = start;
        for positions in &position_lists[1..] {
            match positions.iter().find(|&&p| p > prev) {
                Some(&next) => prev = next,
                None => continue 'starts,
            }
        }
        let stretch = prev - start;
        if stretch <= slop + (position_lists.len() as u32 - 1) {
            return true;
        }
    }

    false
}

impl<V> FullTextIndex<V> for MemoryTextIndex<V> {
    fn fields(&self) -> Vec<String> {
        self.attributes.keys().cloned().collect()
    }

    fn on_set(&mut self, key: &Key, record: &V) {
        self.on_remove(key);
        self.index_document(key, record);
    }

    fn on_remove(&mut self, key: &Key) {
        for postings in self.postings.values_mut() {
            postings.remove_doc(key);
        }
        self.docs.remove(key);
    }

    fn search(&self, query: &TextQuery, options: &SearchOptions) -> Vec<ScoredHit> {
        let Some((field, terms)) = self.query_terms(query) else {
            return Vec::new();
        };
        let Some(postings) = self.postings.get(&field) else {
            return Vec::new();
        };

        let phrase = match query {
            TextQuery::Phrase(p) => Some(p),
            _ => None,
        };
        let candidates = Self::candidates(postings, &terms, phrase.is_some());

        let mut hits: Vec<ScoredHit> = candidates
            .iter()
            .filter_map(|key| self.score_document(postings, key, &terms, phrase))
            .collect();

        if let Some(min_score) = options.min_score {
            hits.retain(|hit| hit.score >= min_score);
        }

        hits.sort_by(|a, b| {
            b.score
                .total_cmp(&a.score)
                .then_with(|| a.key.cmp(&b.key))
        });
        if let Some(limit) = options.limit {
            hits.truncate(limit);
        }

        hits
    }

    fn score_single_document(&self, key: &Key, query: &TextQuery) -> Option<ScoredHit> {
        let (field, terms) = self.query_terms(query)?;
        let postings = self.postings.get(&field)?;
        let phrase = match query {
            TextQuery::Phrase(p) => Some(p),
            _ => None,
        };

        self.score_document(postings, key, &terms, phrase)
    }

    fn doc_count(&self) -> usize {
        self.docs.len()
    }

    fn build_from_data<'a>(&mut self, entries: &mut dyn Iterator<Item = (&'a Key, &'a V)>)
    where
        V: 'a,
    {
        self.clear();
        for (key, record) in entries {
            self.index_document(key, record);
        }
    }

    fn clear(&mut self) {
        for postings in self.postings.values_mut() {
            *postings = FieldPostings::default();
        }
        self.docs.clear();
    }
}
