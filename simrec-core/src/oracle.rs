//! The rating oracle: the external backend that predicts how a user would
//! rate an item.
//!
//! The engine only depends on the [`RatingOracle`] contract. Any
//! `FnMut(&RatingRequest) -> Result<OracleResponse, OracleError>` closure is
//! an oracle too, which keeps test doubles and benchmarks short.

use thiserror::Error;

use crate::types::{ContextEntry, Item, User};

/// Everything an oracle is given to rate one item.
#[derive(Debug, Clone, Copy)]
pub struct RatingRequest<'a> {
    /// The rating user.
    pub user: &'a User,
    /// The item to rate.
    pub item: &'a Item,
    /// How many times the user has already consumed `item`.
    pub watch_count: u32,
    /// Retrieved history, each item paired with its latest interaction.
    pub context: &'a [ContextEntry],
    /// Per-query seed; increments by one for every query of an engine.
    pub seed: u64,
}

/// A rating plus whatever the backend produced alongside it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OracleResponse {
    /// Predicted rating on the engine's scale.
    pub rating: f64,
    /// Free-text explanation of the rating, possibly empty.
    pub explanation: String,
    /// Raw backend output kept for debugging, possibly empty.
    pub trace: String,
}

impl OracleResponse {
    /// A response carrying only a rating.
    #[must_use]
    pub fn rating(rating: f64) -> Self {
        Self {
            rating,
            ..Self::default()
        }
    }
}

/// Failure modes of an oracle query.
#[derive(Error, Debug)]
pub enum OracleError {
    /// The backend answered but no rating could be extracted. The engine
    /// recovers by recording a rating of 0.
    #[error("Unparseable oracle output: {0}")]
    Parse(String),

    /// The backend could not be reached or failed outright. Fatal to the step.
    #[error("Oracle transport failure: {0}")]
    Transport(String),
}

/// Predicts the rating a user would give an item.
pub trait RatingOracle {
    /// Rate `request.item` for `request.user`.
    ///
    /// # Errors
    /// `Parse` when the backend output holds no usable rating, `Transport`
    /// when the backend is unreachable.
    fn query(&mut self, request: &RatingRequest<'_>) -> Result<OracleResponse, OracleError>;
}

impl<F> RatingOracle for F
where
    F: FnMut(&RatingRequest<'_>) -> Result<OracleResponse, OracleError>,
{
    fn query(&mut self, request: &RatingRequest<'_>) -> Result<OracleResponse, OracleError> {
        self(request)
    }
}
