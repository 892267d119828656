//! History retrieval — picks the slice of a user's history shown to the oracle.
//!
//! Every strategy returns at most `top_k` entries, never pads, and ranks with
//! a stable sort so equal scores keep their history order.
//!
//! | strategy     | ranking                                               |
//! |--------------|-------------------------------------------------------|
//! | `recency`    | `step_index`, most recent first                       |
//! | `similarity` | tag overlap + vote closeness (see [`scoring`])        |
//! | `embedding`  | cosine similarity of one embedding field              |
//! | `best_worst` | highest- and lowest-rated watched items               |
//! | `none`       | always empty                                          |

pub mod scoring;

use std::cmp::Reverse;
use std::fmt;

use crate::config::{RetrievalConfig, SimilarityWeights};
use crate::error::{Result, SimError};
use crate::types::{ContextEntry, Item, RetrievalScore};

/// Selects a bounded, ordered subset of a user's history for one rating query.
pub trait RetrievalPolicy: fmt::Debug + Send {
    /// Rank `candidates` against `current` and keep the best ones.
    fn retrieve(&self, current: &Item, candidates: &[ContextEntry]) -> Vec<ContextEntry>;
}

/// Build the retrieval policy described by `config`.
///
/// # Errors
/// `Config` if the similarity weights cannot produce a score.
pub fn build(config: &RetrievalConfig) -> Result<Box<dyn RetrievalPolicy>> {
    Ok(match config {
        RetrievalConfig::Recency { top_k } => Box::new(RecencyRetrieval { top_k: *top_k }),
        RetrievalConfig::Similarity { top_k, weights } => {
            Box::new(SimilarityRetrieval::new(*top_k, weights.clone())?)
        }
        RetrievalConfig::Embedding { top_k, field } => Box::new(EmbeddingRetrieval {
            top_k: *top_k,
            field: field.clone(),
        }),
        RetrievalConfig::BestWorst => Box::new(BestWorstRetrieval),
        RetrievalConfig::None => Box::new(NullRetrieval),
    })
}

/// Stable descending sort by `score`, truncated to `top_k`.
fn rank_by<F>(candidates: &[ContextEntry], top_k: usize, mut score: F) -> Vec<ContextEntry>
where
    F: FnMut(&ContextEntry) -> RetrievalScore,
{
    let mut scored: Vec<(RetrievalScore, &ContextEntry)> =
        candidates.iter().map(|entry| (score(entry), entry)).collect();
    scored.sort_by_key(|(s, _)| Reverse(*s));
    scored
        .into_iter()
        .take(top_k)
        .map(|(_, entry)| entry.clone())
        .collect()
}

/// The `top_k` most recently consumed items.
#[derive(Debug, Clone)]
pub struct RecencyRetrieval {
    /// Maximum number of entries returned.
    pub top_k: usize,
}

impl RetrievalPolicy for RecencyRetrieval {
    fn retrieve(&self, _current: &Item, candidates: &[ContextEntry]) -> Vec<ContextEntry> {
        let mut ranked: Vec<&ContextEntry> = candidates.iter().collect();
        ranked.sort_by_key(|entry| Reverse(entry.interaction.step_index));
        ranked.into_iter().take(self.top_k).cloned().collect()
    }
}

/// The `top_k` items most similar to the current one.
#[derive(Debug, Clone)]
pub struct SimilarityRetrieval {
    top_k: usize,
    weights: SimilarityWeights,
}

impl SimilarityRetrieval {
    /// Create the strategy.
    ///
    /// # Errors
    /// `Config` for a non-positive `vote_scale` or a non-positive weight sum.
    pub fn new(top_k: usize, weights: SimilarityWeights) -> Result<Self> {
        let total: f64 = weights.groups.values().sum::<f64>() + weights.vote;
        if weights.vote_scale <= 0.0 || total <= 0.0 {
            return Err(SimError::Config(
                "similarity retrieval needs a positive vote_scale and weight sum".into(),
            ));
        }
        Ok(Self { top_k, weights })
    }
}

impl RetrievalPolicy for SimilarityRetrieval {
    fn retrieve(&self, current: &Item, candidates: &[ContextEntry]) -> Vec<ContextEntry> {
        rank_by(candidates, self.top_k, |entry| {
            RetrievalScore::new(scoring::similarity(current, &entry.item, &self.weights))
        })
    }
}

/// The `top_k` items whose `field` embedding is closest to the current one.
#[derive(Debug, Clone)]
pub struct EmbeddingRetrieval {
    /// Maximum number of entries returned.
    pub top_k: usize,
    /// Embedding field compared.
    pub field: String,
}

impl RetrievalPolicy for EmbeddingRetrieval {
    fn retrieve(&self, current: &Item, candidates: &[ContextEntry]) -> Vec<ContextEntry> {
        rank_by(candidates, self.top_k, |entry| {
            RetrievalScore::new(scoring::embedding_similarity(
                current,
                &entry.item,
                &self.field,
            ))
        })
    }
}

/// The best- and the worst-rated watched item, in that order.
///
/// Unrated (0) entries are ignored. When only one item qualifies, or the best
/// and worst are the same entry, a single entry is returned. Ties go to the
/// earliest entry in history order.
#[derive(Debug, Clone, Copy)]
pub struct BestWorstRetrieval;

impl RetrievalPolicy for BestWorstRetrieval {
    fn retrieve(&self, _current: &Item, candidates: &[ContextEntry]) -> Vec<ContextEntry> {
        let mut best: Option<usize> = None;
        let mut worst: Option<usize> = None;
        for (i, entry) in candidates.iter().enumerate() {
            let rating = entry.interaction.rating;
            if rating <= 0.0 {
                continue;
            }
            if best.is_none_or(|b| rating > candidates[b].interaction.rating) {
                best = Some(i);
            }
            if worst.is_none_or(|w| rating < candidates[w].interaction.rating) {
                worst = Some(i);
            }
        }
        match (best, worst) {
            (Some(b), Some(w)) if b != w => vec![candidates[b].clone(), candidates[w].clone()],
            (Some(b), _) => vec![candidates[b].clone()],
            _ => Vec::new(),
        }
    }
}

/// Passes no history to the oracle.
#[derive(Debug, Clone, Copy)]
pub struct NullRetrieval;

impl RetrievalPolicy for NullRetrieval {
    fn retrieve(&self, _current: &Item, _candidates: &[ContextEntry]) -> Vec<ContextEntry> {
        Vec::new()
    }
}
