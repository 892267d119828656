//! Configuration for the simulation engine.
//!
//! Maps directly to `simrec.toml`. Every field has a default, so an empty
//! document yields the reference setup: recency-3 retrieval, greedy
//! selection, no perturbation, exponential re-watch decay, a 2.5% per-step
//! stop probability and a `1..=10` rating grid with unit steps.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::SimError;
use crate::types::RatingScale;

/// Top-level simulation configuration, loadable from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SimConfig {
    /// General settings.
    #[serde(default)]
    pub general: GeneralConfig,
    /// Episode length and evaluation mode.
    #[serde(default)]
    pub episode: EpisodeConfig,
    /// The feasible rating grid.
    #[serde(default)]
    pub rating: RatingScale,
    /// History retrieval strategy.
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    /// Watched-item selection strategy.
    #[serde(default)]
    pub selection: SelectionConfig,
    /// Rating perturbation strategy.
    #[serde(default)]
    pub perturbation: PerturbationConfig,
    /// Reward shaping strategy.
    #[serde(default)]
    pub shaping: ShapingConfig,
    /// Render target.
    #[serde(default)]
    pub render: RenderConfig,
}

impl SimConfig {
    /// Load configuration from a TOML string.
    ///
    /// # Errors
    /// Returns `SimError::Config` if the TOML is invalid or fails validation.
    pub fn from_toml(toml_str: &str) -> crate::error::Result<Self> {
        let config: Self =
            toml::from_str(toml_str).map_err(|e| SimError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &std::path::Path) -> crate::error::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Check cross-field constraints that serde cannot express.
    ///
    /// # Errors
    /// Returns `SimError::Config` describing the first violated constraint.
    pub fn validate(&self) -> crate::error::Result<()> {
        let p = self.episode.stop_probability;
        if !(0.0..=1.0).contains(&p) {
            return Err(SimError::Config(format!(
                "episode.stop_probability must be in [0, 1], got {p}"
            )));
        }
        if self.episode.evaluation && self.episode.evaluation_budget == 0 {
            return Err(SimError::Config(
                "episode.evaluation_budget must be at least 1".into(),
            ));
        }
        if self.episode.max_episode_steps == Some(0) {
            return Err(SimError::Config(
                "episode.max_episode_steps must be at least 1 when set".into(),
            ));
        }

        let scale = &self.rating;
        if scale.step <= 0.0 || !scale.step.is_finite() {
            return Err(SimError::Config(format!(
                "rating.step must be positive, got {}",
                scale.step
            )));
        }
        if scale.min > scale.max {
            return Err(SimError::Config(format!(
                "rating.min ({}) must not exceed rating.max ({})",
                scale.min, scale.max
            )));
        }

        if let RetrievalConfig::Similarity { weights, .. } = &self.retrieval {
            if weights.vote_scale <= 0.0 {
                return Err(SimError::Config(
                    "retrieval.weights.vote_scale must be positive".into(),
                ));
            }
            let total: f64 = weights.groups.values().sum::<f64>() + weights.vote;
            if weights.groups.values().any(|w| *w < 0.0) || weights.vote < 0.0 || total <= 0.0
            {
                return Err(SimError::Config(
                    "retrieval.weights must be non-negative with a positive sum".into(),
                ));
            }
        }

        match &self.perturbation {
            PerturbationConfig::Jitter { probabilities } => {
                let sum: f64 = probabilities.iter().sum();
                if probabilities.iter().any(|p| *p < 0.0) || sum <= 0.0 {
                    return Err(SimError::Config(
                        "perturbation.probabilities must be non-negative with a positive sum"
                            .into(),
                    ));
                }
            }
            PerturbationConfig::Gaussian { std, .. } => {
                if *std < 0.0 || !std.is_finite() {
                    return Err(SimError::Config(format!(
                        "perturbation.std must be finite and non-negative, got {std}"
                    )));
                }
            }
            PerturbationConfig::None => {}
        }

        match &self.shaping {
            ShapingConfig::ExpDecay { q } | ShapingConfig::RandomRewatch { q } => {
                if !(0.0..=1.0).contains(q) {
                    return Err(SimError::Config(format!(
                        "shaping.q must be in [0, 1], got {q}"
                    )));
                }
            }
            ShapingConfig::Identity | ShapingConfig::TerminateOnRepeat => {}
        }

        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Sub-configs
// ---------------------------------------------------------------------------

/// General settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Log level: trace, debug, info, warn, error. `RUST_LOG` takes precedence.
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Emit logs as JSON lines instead of human-readable text.
    #[serde(default)]
    pub json_logs: bool,
    /// Seed used to initialize every stream at construction time.
    #[serde(default = "default_seed")]
    pub seed: u64,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            json_logs: false,
            seed: default_seed(),
        }
    }
}

/// Episode length model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EpisodeConfig {
    /// Per-step probability that the user stops browsing.
    #[serde(default = "default_stop_probability")]
    pub stop_probability: f64,
    /// Evaluation mode: round-robin users with a fixed per-user budget.
    #[serde(default)]
    pub evaluation: bool,
    /// Steps per user in evaluation mode.
    #[serde(default = "default_evaluation_budget")]
    pub evaluation_budget: usize,
    /// Truncate episodes after this many steps.
    #[serde(default)]
    pub max_episode_steps: Option<usize>,
}

impl Default for EpisodeConfig {
    fn default() -> Self {
        Self {
            stop_probability: default_stop_probability(),
            evaluation: false,
            evaluation_budget: default_evaluation_budget(),
            max_episode_steps: None,
        }
    }
}

/// History retrieval strategy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "strategy", rename_all = "snake_case")]
pub enum RetrievalConfig {
    /// The `top_k` most recently watched items.
    Recency {
        /// Maximum number of items passed to the oracle.
        #[serde(default = "default_top_k")]
        top_k: usize,
    },
    /// The `top_k` items most similar by categorical overlap and vote closeness.
    Similarity {
        /// Maximum number of items passed to the oracle.
        #[serde(default = "default_top_k")]
        top_k: usize,
        /// Per-feature weights.
        #[serde(default)]
        weights: SimilarityWeights,
    },
    /// The `top_k` items closest by cosine similarity of an embedding field.
    Embedding {
        /// Maximum number of items passed to the oracle.
        #[serde(default = "default_top_k")]
        top_k: usize,
        /// Which embedding of the item to compare.
        #[serde(default = "default_embedding_field")]
        field: String,
    },
    /// The best- and worst-rated watched items.
    BestWorst,
    /// No history is passed to the oracle.
    None,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self::Recency {
            top_k: default_top_k(),
        }
    }
}

/// Weights of the similarity strategy. The score is the weighted mean of
/// one overlap score per tag group plus the vote-closeness score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimilarityWeights {
    /// Weight per categorical tag group.
    #[serde(default = "default_group_weights")]
    pub groups: BTreeMap<String, f64>,
    /// Weight of the vote-closeness score.
    #[serde(default = "default_1_0")]
    pub vote: f64,
    /// Range of `vote_average`, used to normalize the closeness score.
    #[serde(default = "default_vote_scale")]
    pub vote_scale: f64,
}

impl Default for SimilarityWeights {
    fn default() -> Self {
        Self {
            groups: default_group_weights(),
            vote: 1.0,
            vote_scale: default_vote_scale(),
        }
    }
}

/// Watched-item selection strategy.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "strategy", rename_all = "snake_case")]
pub enum SelectionConfig {
    /// Highest rating wins; popularity then item id break ties.
    #[default]
    Greedy,
}

/// Rating perturbation strategy.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "strategy", rename_all = "snake_case")]
pub enum PerturbationConfig {
    /// Ratings pass through unchanged.
    #[default]
    None,
    /// Add −1, 0 or +1 with the given probabilities.
    Jitter {
        /// Weights of −1, 0 and +1.
        #[serde(default = "default_jitter_probabilities")]
        probabilities: [f64; 3],
    },
    /// Add Gaussian noise.
    Gaussian {
        /// Noise mean.
        #[serde(default)]
        mean: f64,
        /// Noise standard deviation.
        #[serde(default = "default_0_5")]
        std: f64,
    },
}

/// Reward shaping strategy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "strategy", rename_all = "snake_case")]
pub enum ShapingConfig {
    /// Reward equals the selected rating.
    Identity,
    /// Repeat watches are scaled by `q^(watch_count / elapsed_steps)`.
    ExpDecay {
        /// Decay base.
        #[serde(default = "default_q")]
        q: f64,
    },
    /// Repeat watches are kept with probability `q^(watch_count / elapsed_steps)`.
    RandomRewatch {
        /// Decay base.
        #[serde(default = "default_q")]
        q: f64,
    },
    /// Any repeat watch ends the episode with zero reward.
    TerminateOnRepeat,
}

impl Default for ShapingConfig {
    fn default() -> Self {
        Self::ExpDecay { q: default_q() }
    }
}

/// Where `render()` writes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum RenderConfig {
    /// Rendering is a no-op.
    #[default]
    None,
    /// One human-readable line on stdout per call.
    Human,
    /// Append one CSV row per call.
    Csv {
        /// Target file; parent directories are created on first write.
        #[serde(default = "default_render_path")]
        path: PathBuf,
    },
}

// ---------------------------------------------------------------------------
// Serde default helpers
// ---------------------------------------------------------------------------

fn default_log_level() -> String { "info".to_string() }
fn default_embedding_field() -> String { "overview".to_string() }
fn default_render_path() -> PathBuf { PathBuf::from("./tmp/render/interactions.csv") }
fn default_group_weights() -> BTreeMap<String, f64> {
    ["genres", "actors", "director"]
        .into_iter()
        .map(|group| (group.to_string(), 1.0))
        .collect()
}
fn default_jitter_probabilities() -> [f64; 3] { [0.1, 0.8, 0.1] }
fn default_stop_probability() -> f64 { 0.025 }
fn default_q() -> f64 { 0.1 }
fn default_0_5() -> f64 { 0.5 }
fn default_1_0() -> f64 { 1.0 }
fn default_vote_scale() -> f64 { 10.0 }
fn default_seed() -> u64 { 42 }
fn default_top_k() -> usize { 3 }
fn default_evaluation_budget() -> usize { 11 }

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_yields_defaults() {
        let config = SimConfig::from_toml("").expect("empty config");
        assert_eq!(config.general.seed, 42);
        assert!(
            (config.episode.stop_probability - 0.025).abs() < f64::EPSILON
        );
        assert_eq!(config.retrieval, RetrievalConfig::Recency { top_k: 3 });
        assert_eq!(config.shaping, ShapingConfig::ExpDecay { q: 0.1 });
        assert_eq!(config.rating, RatingScale::default());
    }

    #[test]
    fn tagged_strategies_parse() {
        let config = SimConfig::from_toml(
            r#"
            [retrieval]
            strategy = "similarity"
            top_k = 5
            [retrieval.weights]
            groups = { authors = 1.0, categories = 2.0 }
            vote_scale = 5.0

            [perturbation]
            strategy = "gaussian"
            std = 0.25

            [shaping]
            strategy = "terminate_on_repeat"

            [render]
            mode = "csv"
            path = "out/run.csv"
            "#,
        )
        .expect("valid config");

        match config.retrieval {
            RetrievalConfig::Similarity { top_k, weights } => {
                assert_eq!(top_k, 5);
                assert_eq!(weights.groups.len(), 2);
                assert!((weights.vote - 1.0).abs() < f64::EPSILON);
                assert!((weights.vote_scale - 5.0).abs() < f64::EPSILON);
            }
            other => panic!("unexpected retrieval config: {other:?}"),
        }
        assert_eq!(
            config.perturbation,
            PerturbationConfig::Gaussian {
                mean: 0.0,
                std: 0.25,
            }
        );
        assert_eq!(config.shaping, ShapingConfig::TerminateOnRepeat);
        assert_eq!(
            config.render,
            RenderConfig::Csv {
                path: PathBuf::from("out/run.csv")
            }
        );
    }

    #[test]
    fn rejects_out_of_range_stop_probability() {
        let err = SimConfig::from_toml("[episode]\nstop_probability = 1.5\n")
            .expect_err("must reject");
        assert!(matches!(err, SimError::Config(_)));
    }

    #[test]
    fn rejects_inverted_rating_scale() {
        let err = SimConfig::from_toml("[rating]\nmin = 5.0\nmax = 1.0\n")
            .expect_err("must reject");
        assert!(matches!(err, SimError::Config(_)));
    }

    #[test]
    fn rejects_unknown_strategy() {
        let err = SimConfig::from_toml("[shaping]\nstrategy = \"sometimes\"\n")
            .expect_err("must reject");
        assert!(matches!(err, SimError::Config(_)));
    }

    #[test]
    fn loads_from_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("simrec.toml");
        std::fs::write(&path, "[general]\nseed = 7\n").expect("write");
        let config = SimConfig::from_file(&path).expect("load");
        assert_eq!(config.general.seed, 7);
    }
}
