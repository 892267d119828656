//! Rater configuration, loaded from TOML.
//!
//! ```toml
//! model = "llama3:8b-instruct"
//! max_retries = 2
//! explain = true
//!
//! [provider]
//! kind = "ollama"
//! base_url = "http://localhost:11434"
//!
//! [prompt]
//! scale = "0-9"
//! few_shot = true
//! item_features = ["genres", "actors", "vote_average"]
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::LlmError;
use crate::prompt::PromptScale;

/// Where rating queries are sent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ProviderConfig {
    /// A local Ollama server.
    Ollama {
        /// Server root.
        #[serde(default = "default_ollama_url")]
        base_url: String,
    },
    /// Any OpenAI-compatible chat completions API.
    #[serde(rename = "openai")]
    OpenAi {
        /// API root, without `/v1`.
        #[serde(default = "default_openai_url")]
        base_url: String,
        /// Environment variable holding the API key.
        #[serde(default = "default_api_key_env")]
        api_key_env: String,
    },
    /// No backend; every query fails with a transport error.
    None,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self::Ollama {
            base_url: default_ollama_url(),
        }
    }
}

/// Prompt wording settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromptConfig {
    /// Scale the model answers on.
    #[serde(default)]
    pub scale: PromptScale,
    /// Prepend worked examples.
    #[serde(default)]
    pub few_shot: bool,
    /// What an item is called ("movie", "book", …).
    #[serde(default = "default_item_noun")]
    pub item_noun: String,
    /// Present-tense verb for consuming an item.
    #[serde(default = "default_action_verb")]
    pub action_verb: String,
    /// Past participle of `action_verb`.
    #[serde(default = "default_action_verb_past")]
    pub action_verb_past: String,
    /// Item attributes described to the model: tag groups or `vote_average`.
    #[serde(default = "default_item_features")]
    pub item_features: Vec<String>,
    /// Optional TOML file replacing the built-in templates.
    #[serde(default)]
    pub templates_path: Option<PathBuf>,
}

impl Default for PromptConfig {
    fn default() -> Self {
        Self {
            scale: PromptScale::default(),
            few_shot: false,
            item_noun: default_item_noun(),
            action_verb: default_action_verb(),
            action_verb_past: default_action_verb_past(),
            item_features: default_item_features(),
            templates_path: None,
        }
    }
}

/// Everything needed to build an `LlmRater`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RaterConfig {
    /// Backend.
    #[serde(default)]
    pub provider: ProviderConfig,
    /// Model name passed to the provider.
    #[serde(default = "default_model")]
    pub model: String,
    /// Retries after the first failed attempt.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Pause before retry `n` is `n * retry_backoff_ms`.
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,
    /// Hard timeout for one HTTP call in milliseconds.
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    /// Ask a second question for a free-text explanation of each rating.
    #[serde(default)]
    pub explain: bool,
    /// Prompt wording.
    #[serde(default)]
    pub prompt: PromptConfig,
}

impl Default for RaterConfig {
    fn default() -> Self {
        Self {
            provider: ProviderConfig::default(),
            model: default_model(),
            max_retries: default_max_retries(),
            retry_backoff_ms: default_retry_backoff_ms(),
            request_timeout_ms: default_request_timeout_ms(),
            explain: false,
            prompt: PromptConfig::default(),
        }
    }
}

impl RaterConfig {
    /// Parse from a TOML string.
    ///
    /// # Errors
    ///
    /// `ConfigError` on malformed TOML or a zero timeout.
    pub fn from_toml(text: &str) -> Result<Self, LlmError> {
        let config: Self =
            toml::from_str(text).map_err(|e| LlmError::ConfigError(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Read and parse a TOML file.
    ///
    /// # Errors
    ///
    /// `ConfigError` if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self, LlmError> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            LlmError::ConfigError(format!("failed to read {}: {e}", path.display()))
        })?;
        Self::from_toml(&text)
    }

    /// Reject settings no request could succeed with.
    ///
    /// # Errors
    ///
    /// `ConfigError` naming the offending field.
    pub fn validate(&self) -> Result<(), LlmError> {
        if self.request_timeout_ms == 0 {
            return Err(LlmError::ConfigError("request_timeout_ms must be positive".into()));
        }
        if self.model.trim().is_empty() && self.provider != ProviderConfig::None {
            return Err(LlmError::ConfigError("model must not be empty".into()));
        }
        Ok(())
    }
}

fn default_ollama_url() -> String {
    "http://localhost:11434".into()
}
fn default_openai_url() -> String {
    "https://api.openai.com".into()
}
fn default_api_key_env() -> String {
    "OPENAI_API_KEY".into()
}
fn default_model() -> String {
    "llama3:8b-instruct-q4_0".into()
}
fn default_max_retries() -> u32 {
    2
}
fn default_retry_backoff_ms() -> u64 {
    1000
}
fn default_request_timeout_ms() -> u64 {
    30_000
}
fn default_item_noun() -> String {
    "movie".into()
}
fn default_action_verb() -> String {
    "watches".into()
}
fn default_action_verb_past() -> String {
    "watched".into()
}
fn default_item_features() -> Vec<String> {
    vec!["genres".into(), "vote_average".into()]
}
