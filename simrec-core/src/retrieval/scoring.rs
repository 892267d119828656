//! Per-factor scoring functions for history retrieval.
//!
//! Similarity(a, b) = Σ w_g · Overlap_g(a, b) + w_v · Closeness(a, b)
//!                    ─────────────────────────────────────────────────
//!                                  Σ w_g + w_v
//!
//! Where:
//!   Overlap_g(a, b) = 2|A∩B| / (|A| + |B|)   (Dice coefficient of tag group g)
//!   Closeness(a, b) = 1 - |va - vb| / vote_scale

use std::collections::BTreeSet;

use crate::config::SimilarityWeights;
use crate::types::Item;

/// Dice coefficient of two tag lists, compared as sets.
///
/// Two empty lists are identical (1.0); exactly one empty list shares
/// nothing (0.0).
#[must_use]
pub fn overlap_score(a: &[String], b: &[String]) -> f64 {
    let a: BTreeSet<&str> = a.iter().map(String::as_str).collect();
    let b: BTreeSet<&str> = b.iter().map(String::as_str).collect();
    match (a.is_empty(), b.is_empty()) {
        (true, true) => 1.0,
        (true, false) | (false, true) => 0.0,
        (false, false) => {
            let shared = a.intersection(&b).count();
            2.0 * shared as f64 / (a.len() + b.len()) as f64
        }
    }
}

/// Closeness of two vote averages, clamped to `[0, 1]`.
#[must_use]
pub fn closeness_score(a: f64, b: f64, vote_scale: f64) -> f64 {
    (1.0 - (a - b).abs() / vote_scale).clamp(0.0, 1.0)
}

/// Weighted mean of the per-group overlaps and the vote closeness.
#[must_use]
pub fn similarity(current: &Item, other: &Item, weights: &SimilarityWeights) -> f64 {
    let mut total = weights.vote;
    let mut score = weights.vote
        * closeness_score(current.vote_average, other.vote_average, weights.vote_scale);

    for (group, weight) in &weights.groups {
        total += weight;
        score += weight * overlap_score(current.tag_values(group), other.tag_values(group));
    }

    if total <= 0.0 { 0.0 } else { score / total }
}

/// Cosine similarity of one embedding field; 0 when either item lacks it.
#[must_use]
pub fn embedding_similarity(current: &Item, other: &Item, field: &str) -> f64 {
    match (current.embeddings.get(field), other.embeddings.get(field)) {
        (Some(a), Some(b)) => f64::from(a.cosine_similarity(b)),
        _ => 0.0,
    }
}
