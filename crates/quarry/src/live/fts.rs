use super::{LiveContext, LiveDelta, LiveDeltaKind, LiveQueryIndex};
use crate::{key::Key, query::TextQuery};
use std::{collections::BTreeMap, marker::PhantomData};

///
/// LiveTextOptions
///

#[derive(Clone, Copy, Debug, Default)]
pub struct LiveTextOptions {
    /// Ranked top-K cap; unbounded when absent.
    pub max_results: Option<usize>,
    pub min_score: Option<f32>,
}

///
/// LiveTextIndex
///
/// Ranked live query over one atomic text query. Holds the current
/// top-K with scores and matched terms; every relevant mutation
/// re-scores the single affected document through the shared full-text
/// index. When the cap is exceeded the lowest-scored member is evicted.
///

pub struct LiveTextIndex<V> {
    query: TextQuery,
    options: LiveTextOptions,
    ranked: BTreeMap<Key, RankedDoc>,
    _marker: PhantomData<fn(&V)>,
}

#[derive(Clone, Debug)]
struct RankedDoc {
    score: f32,
    matched_terms: Vec<String>,
}

impl<V> LiveTextIndex<V> {
    #[must_use]
    pub const fn new(query: TextQuery, options: LiveTextOptions) -> Self {
        Self {
            query,
            options,
            ranked: BTreeMap::new(),
            _marker: PhantomData,
        }
    }

    #[must_use]
    pub const fn query(&self) -> &TextQuery {
        &self.query
    }

    fn score_of(&self, key: &Key, ctx: &LiveContext<'_, V>) -> Option<RankedDoc> {
        let hit = ctx
            .text
            .for_field(self.query.field())?
            .score_single_document(key, &self.query)?;
        if let Some(min_score) = self.options.min_score
            && hit.score < min_score
        {
            return None;
        }
        Some(RankedDoc {
            score: hit.score,
            matched_terms: hit.matched_terms,
        })
    }

    // Lowest score leaves first; among equals the greatest key goes, so
    // earlier members win ties.
    fn evict_if_over(&mut self) -> Option<(Key, RankedDoc)> {
        let cap = self.options.max_results?;
        if self.ranked.len() <= cap {
            return None;
        }

        let victim = self
            .ranked
            .iter()
            .min_by(|(left_key, left), (right_key, right)| {
                left.score
                    .total_cmp(&right.score)
                    .then_with(|| right_key.cmp(left_key))
            })
            .map(|(key, _)| key.clone())?;

        let doc = self.ranked.remove(&victim)?;
        Some((victim, doc))
    }

    fn rescore(&mut self, key: &Key, ctx: &LiveContext<'_, V>) -> Vec<LiveDelta> {
        let scored = self.score_of(key, ctx);
        let previous = self.ranked.get(key).cloned();

        match (previous, scored) {
            (None, Some(doc)) => {
                self.ranked.insert(key.clone(), doc.clone());
                let mut deltas = Vec::new();
                match self.evict_if_over() {
                    // The newcomer itself fell off the bottom: no
                    // observable change.
                    Some((evicted, _)) if evicted == *key => {}
                    Some((evicted, old)) => {
                        deltas.push(LiveDelta {
                            kind: LiveDeltaKind::Added,
                            key: key.clone(),
                            score: Some(doc.score),
                            old_score: None,
                            matched_terms: Some(doc.matched_terms),
                        });
                        deltas.push(LiveDelta {
                            kind: LiveDeltaKind::Removed,
                            key: evicted,
                            score: None,
                            old_score: Some(old.score),
                            matched_terms: None,
                        });
                    }
                    None => {
                        deltas.push(LiveDelta {
                            kind: LiveDeltaKind::Added,
                            key: key.clone(),
                            score: Some(doc.score),
                            old_score: None,
                            matched_terms: Some(doc.matched_terms),
                        });
                    }
                }
                deltas
            }
            (Some(old), Some(doc)) => {
                self.ranked.insert(key.clone(), doc.clone());
                vec![LiveDelta {
                    kind: LiveDeltaKind::Updated,
                    key: key.clone(),
                    score: Some(doc.score),
                    old_score: Some(old.score),
                    matched_terms: Some(doc.matched_terms),
                }]
            }
            (Some(old), None) => {
                self.ranked.remove(key);
                vec![LiveDelta {
                    kind: LiveDeltaKind::Removed,
                    key: key.clone(),
                    score: None,
                    old_score: Some(old.score),
                    matched_terms: None,
                }]
            }
            (None, None) => Vec::new(),
        }
    }
}

impl<V> LiveQueryIndex<V> for LiveTextIndex<V> {
    fn record_added(&mut self, key: &Key, _value: &V, ctx: &LiveContext<'_, V>) -> Vec<LiveDelta> {
        self.rescore(key, ctx)
    }

    fn record_updated(
        &mut self,
        key: &Key,
        _old: &V,
        _new: &V,
        ctx: &LiveContext<'_, V>,
    ) -> Vec<LiveDelta> {
        self.rescore(key, ctx)
    }

    fn record_removed(
        &mut self,
        key: &Key,
        _value: &V,
        _ctx: &LiveContext<'_, V>,
    ) -> Vec<LiveDelta> {
        match self.ranked.remove(key) {
            Some(old) => vec![LiveDelta {
                kind: LiveDeltaKind::Removed,
                key: key.clone(),
                score: None,
                old_score: Some(old.score),
                matched_terms: None,
            }],
            None => Vec::new(),
        }
    }

    fn results(&self) -> Vec<Key> {
        let mut members: Vec<(&Key, &RankedDoc)> = self.ranked.iter().collect();
        members.sort_by(|(left_key, left), (right_key, right)| {
            right
                .score
                .total_cmp(&left.score)
                .then_with(|| left_key.cmp(right_key))
        });
        members.into_iter().map(|(key, _)| key.clone()).collect()
    }

    fn result_count(&self) -> usize {
        self.ranked.len()
    }

    fn contains(&self, key: &Key) -> bool {
        self.ranked.contains_key(key)
    }

    fn build_from_data<'a>(
        &mut self,
        entries: &mut dyn Iterator<Item = (&'a Key, &'a V)>,
        ctx: &LiveContext<'_, V>,
    ) where
        V: 'a,
    {
        self.ranked.clear();
        for (key, _) in entries {
            if let Some(doc) = self.score_of(key, ctx) {
                self.ranked.insert(key.clone(), doc);
            }
        }
        while self.evict_if_over().is_some() {}
    }

    fn clear(&mut self) {
        self.ranked.clear();
    }
}
