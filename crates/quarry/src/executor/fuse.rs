use crate::{error::QueryError, key::Key};
use std::collections::{BTreeMap, HashMap};

/// Rank-fusion smoothing constant.
pub const DEFAULT_RRF_K: f32 = 60.0;

///
/// Reciprocal Rank Fusion
///
/// Pure merge of ranked result lists: each appearance of a document at
/// 0-based `rank` contributes `weight / (k + rank + 1)`. Duplicate
/// appearances within a list each contribute independently.
///

#[derive(Clone, Debug)]
pub struct RankedList {
    pub source: String,
    pub hits: Vec<(Key, f32)>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct FusedHit {
    pub key: Key,
    pub score: f32,
    /// Alphabetical join of the sources the document appeared in.
    pub source: String,
    pub original_scores: BTreeMap<String, f32>,
}

#[must_use]
pub fn reciprocal_rank_fusion(lists: &[RankedList], k: f32) -> Vec<FusedHit> {
    let weights = vec![1.0; lists.len()];
    fuse(lists, &weights, k)
}

/// Weighted variant; requires one weight per list.
pub fn weighted_reciprocal_rank_fusion(
    lists: &[RankedList],
    weights: &[f32],
    k: f32,
) -> Result<Vec<FusedHit>, QueryError> {
    if weights.len() != lists.len() {
        return Err(QueryError::FusionWeightMismatch {
            lists: lists.len(),
            weights: weights.len(),
        });
    }
    Ok(fuse(lists, weights, k))
}

fn fuse(lists: &[RankedList], weights: &[f32], k: f32) -> Vec<FusedHit> {
    struct Accumulated {
        score: f32,
        sources: Vec<String>,
        original_scores: BTreeMap<String, f32>,
    }

    let mut accumulated: HashMap<Key, Accumulated> = HashMap::new();
    for (list, weight) in lists.iter().zip(weights) {
        for (rank, (key, original)) in list.hits.iter().enumerate() {
            let contribution = weight / (k + rank as f32 + 1.0);
            let entry = accumulated.entry(key.clone()).or_insert_with(|| Accumulated {
                score: 0.0,
                sources: Vec::new(),
                original_scores: BTreeMap::new(),
            });
            entry.score += contribution;
            if !entry.sources.contains(&list.source) {
                entry.sources.push(list.source.clone());
            }
            entry
                .original_scores
                .entry(list.source.clone())
                .or_insert(*original);
        }
    }

    let mut fused: Vec<FusedHit> = accumulated
        .into_iter()
        .map(|(key, mut acc)| {
            acc.sources.sort();
            FusedHit {
                key,
                score: acc.score,
                source: acc.sources.join(","),
                original_scores: acc.original_scores,
            }
        })
        .collect();

    fused.sort_by(|a, b| b.score.total_cmp(&a.score).then_with(|| a.key.cmp(&b.key)));
    fused
}
