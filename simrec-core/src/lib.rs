//! # simrec Core Library
//!
//! Seeded simulation of recommendation episodes between synthetic users and
//! an item catalog, used to evaluate rating-prediction backends.
//!
//! A [`SimulationEngine`] turns every recommendation action into a reward by
//! running a pipeline of pluggable policies:
//!
//! - **Retrieval** — which past interactions the rater gets to see
//! - **Rating** — the external [`RatingOracle`] (an LLM, a model, a table)
//! - **Selection** — which recommended item the user actually watches
//! - **Perturbation** — bounded noise on the watched rating
//! - **Shaping** — how repeat consumption changes the reward
//!
//! ## Reproducibility Contract
//!
//! Each stochastic subsystem draws from its own seeded ChaCha stream, and the
//! oracle receives a per-query seed. Two engines built from the same
//! configuration, reset with the same seed and driven by the same actions
//! against a deterministic oracle produce identical episodes.

#![deny(clippy::unwrap_used)]
#![deny(missing_docs)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod engine;
pub mod error;
pub mod index;
pub mod loader;
pub mod memory;
pub mod oracle;
pub mod perturbation;
pub mod render;
pub mod retrieval;
pub mod rng;
pub mod selection;
pub mod shaping;
pub mod telemetry;
pub mod types;

pub use config::SimConfig;
pub use engine::{EngineStats, Phase, Policies, SimulationEngine, StepInfo, StepOutcome};
pub use error::SimError;
pub use index::ActionItemIndex;
pub use loader::{InMemoryCatalog, ItemsLoader, UserList, UsersLoader};
pub use memory::{InteractionMemory, InteractionRecord};
pub use oracle::{OracleError, OracleResponse, RatingOracle, RatingRequest};
pub use types::*;
