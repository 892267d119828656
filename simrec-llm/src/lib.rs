//! # simrec-llm — LLM Rating Oracle for simrec
//!
//! Implements [`simrec_core::RatingOracle`] on top of a language model:
//!   - **Ollama** (local, default)
//!   - **OpenAI-compatible API** (OpenAI, vLLM, llama.cpp server, …)
//!
//! Every query goes through the same pipeline:
//!
//! ```text
//! RatingRequest ─▶ prompt (persona, history, item) ─▶ LlmClient (seeded, retried)
//!               ◀─ parse (scale-aware)             ◀─ model text
//! ```
//!
//! Unreadable answers surface as `OracleError::Parse` (the engine records a 0
//! and continues); unreachable backends as `OracleError::Transport`.

#![deny(clippy::unwrap_used)]

pub mod client;
pub mod config;
pub mod error;
pub mod parse;
pub mod prompt;
pub mod rater;
pub mod types;

pub use client::{LlmClient, LlmProvider};
pub use config::{PromptConfig, ProviderConfig, RaterConfig};
pub use error::LlmError;
pub use prompt::{PromptScale, PromptTemplates, RatingPrompt};
pub use rater::LlmRater;
pub use types::{ChatMessage, LlmRequest, LlmResponse, Role};
