//! Error types for the simulation core.

use thiserror::Error;

use crate::types::{ItemId, UserId};

/// Top-level error type for all simulation operations.
#[derive(Error, Debug)]
pub enum SimError {
    /// An action outside `[0, num_items)` was requested.
    #[error("Invalid action: {action} (action space: 0..{num_items})")]
    InvalidAction {
        /// The offending action.
        action: usize,
        /// Size of the action space.
        num_items: usize,
    },

    /// A user id outside `[0, num_users)` was requested.
    #[error("Invalid user id: {user_id} (users: 0..{num_users})")]
    InvalidUserId {
        /// The offending user id.
        user_id: UserId,
        /// Number of loaded users.
        num_users: usize,
    },

    /// A memory edit targeted a (user, item) pair with no recorded interactions.
    #[error("No interaction recorded for user {user_id} and item {item_id}")]
    UnknownInteraction {
        /// User of the pair.
        user_id: UserId,
        /// Item of the pair.
        item_id: ItemId,
    },

    /// The rating oracle failed in a way it could not recover from.
    #[error("Rating oracle transport failure: {0}")]
    OracleTransport(String),

    /// `step` was called before `reset` or after the episode ended.
    #[error("No active episode: call reset() before step()")]
    EpisodeNotActive,

    /// A slate step was requested with no actions.
    #[error("Empty slate: at least one action is required")]
    EmptySlate,

    /// A slate contained the same action twice.
    #[error("Duplicate action in slate: {0}")]
    DuplicateAction(usize),

    /// The items loader returned the same id twice.
    #[error("Duplicate item id in catalog: {0}")]
    DuplicateItem(ItemId),

    /// The items loader does not know an id it was asked for.
    #[error("Item not found in catalog: {0}")]
    UnknownItem(ItemId),

    /// The items loader returned no ids.
    #[error("Catalog is empty")]
    EmptyCatalog,

    /// The users loader returned no users.
    #[error("No users loaded")]
    NoUsers,

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Serialization or deserialization failure.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Generic I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serde_json::Error> for SimError {
    fn from(err: serde_json::Error) -> Self {
        SimError::Serialization(err.to_string())
    }
}

impl From<csv::Error> for SimError {
    fn from(err: csv::Error) -> Self {
        SimError::Serialization(err.to_string())
    }
}

/// Convenience Result type alias.
pub type Result<T> = std::result::Result<T, SimError>;
