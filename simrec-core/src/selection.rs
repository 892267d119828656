//! Watched-item selection.
//!
//! Given every rated candidate of a slate, decide which single item the user
//! actually consumes. All other candidates leave the step with rating 0.

use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

use crate::config::SelectionConfig;
use crate::error::{Result, SimError};
use crate::types::Item;

/// One recommended item together with the rating the oracle predicted for it.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    /// Action that recommended the item.
    pub action: usize,
    /// The recommended item.
    pub item: Arc<Item>,
    /// Rating of the item; after selection, 0 for everything but the watched one.
    pub rating: f64,
}

/// The outcome of a selection.
#[derive(Debug, Clone, PartialEq)]
pub struct Selection {
    /// All candidates, possibly reordered, carrying their selected ratings.
    pub candidates: Vec<Candidate>,
    /// Position of the watched candidate in `candidates`.
    pub watched: usize,
}

impl Selection {
    /// The candidate the user consumed.
    #[must_use]
    pub fn watched(&self) -> &Candidate {
        &self.candidates[self.watched]
    }
}

/// Picks exactly one watched item out of a non-empty slate.
pub trait SelectionPolicy: fmt::Debug + Send {
    /// Choose the watched candidate.
    ///
    /// # Errors
    /// `EmptySlate` when `candidates` is empty.
    fn select(&mut self, candidates: Vec<Candidate>) -> Result<Selection>;
}

/// Build the selection policy described by `config`.
#[must_use]
pub fn build(config: &SelectionConfig) -> Box<dyn SelectionPolicy> {
    match config {
        SelectionConfig::Greedy => Box::new(GreedySelection),
    }
}

/// Highest rating wins; ties go to the more popular item, then the smaller id.
#[derive(Debug, Clone, Copy, Default)]
pub struct GreedySelection;

fn greedy_order(a: &Candidate, b: &Candidate) -> Ordering {
    b.rating
        .total_cmp(&a.rating)
        .then_with(|| b.item.popularity.total_cmp(&a.item.popularity))
        .then_with(|| a.item.id.cmp(&b.item.id))
}

impl SelectionPolicy for GreedySelection {
    fn select(&mut self, mut candidates: Vec<Candidate>) -> Result<Selection> {
        if candidates.is_empty() {
            return Err(SimError::EmptySlate);
        }
        candidates.sort_by(greedy_order);
        for candidate in candidates.iter_mut().skip(1) {
            candidate.rating = 0.0;
        }
        Ok(Selection {
            candidates,
            watched: 0,
        })
    }
}
