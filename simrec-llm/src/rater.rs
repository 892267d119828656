//! `LlmRater` — a [`RatingOracle`] answered by a language model.
//!
//! The simulation engine is synchronous, so the rater owns a single-threaded
//! tokio runtime and blocks on each HTTP call. One engine query is one rating
//! request, plus one explanation request when `explain` is enabled.

use std::time::Duration;

use tokio::runtime::{Builder, Runtime};
use tracing::debug;

use simrec_core::{OracleError, OracleResponse, RatingOracle, RatingRequest};

use crate::client::{LlmClient, LlmProvider};
use crate::config::RaterConfig;
use crate::error::LlmError;
use crate::parse::parse_rating;
use crate::prompt::RatingPrompt;
use crate::types::LlmRequest;

/// Rates items by prompting an LLM.
#[derive(Debug)]
pub struct LlmRater {
    client: LlmClient,
    prompt: RatingPrompt,
    runtime: Runtime,
    explain: bool,
    timeout_ms: u64,
}

impl LlmRater {
    /// Wrap a client and a prompt.
    ///
    /// # Errors
    ///
    /// `ConfigError` if the tokio runtime cannot be created.
    pub fn new(client: LlmClient, prompt: RatingPrompt) -> Result<Self, LlmError> {
        let runtime = Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| LlmError::ConfigError(format!("failed to start tokio runtime: {e}")))?;
        Ok(Self {
            client,
            prompt,
            runtime,
            explain: false,
            timeout_ms: 30_000,
        })
    }

    /// Build everything from a [`RaterConfig`].
    ///
    /// # Errors
    ///
    /// `ConfigError` for invalid settings, a missing API key, unreadable
    /// templates or a runtime that fails to start.
    pub fn from_config(config: &RaterConfig) -> Result<Self, LlmError> {
        config.validate()?;
        let provider = LlmProvider::from_config(&config.provider)?;
        let client = LlmClient::new(provider, config.model.clone(), config.max_retries)
            .with_retry_backoff(Duration::from_millis(config.retry_backoff_ms));
        let prompt = RatingPrompt::from_config(&config.prompt)?;
        let mut rater = Self::new(client, prompt)?;
        rater.explain = config.explain;
        rater.timeout_ms = config.request_timeout_ms;
        Ok(rater)
    }

    /// Also ask for a free-text explanation of every rating.
    #[must_use]
    pub fn with_explanation(mut self, explain: bool) -> Self {
        self.explain = explain;
        self
    }

    /// The prompt builder in use.
    #[must_use]
    pub fn prompt(&self) -> &RatingPrompt {
        &self.prompt
    }

    /// The rating request sent for `request`, without calling the backend.
    #[must_use]
    pub fn rating_request(&self, request: &RatingRequest<'_>) -> LlmRequest {
        LlmRequest::rating(self.prompt.rating_messages(request))
            .with_seed(request.seed)
            .with_timeout(self.timeout_ms)
    }

    fn run(&self, request: &LlmRequest) -> Result<String, LlmError> {
        let response = self.runtime.block_on(self.client.generate(request))?;
        debug!(
            model = %response.model,
            latency_ms = response.latency_ms,
            tokens = response.tokens_generated,
            "LLM answered"
        );
        Ok(response.text)
    }
}

impl RatingOracle for LlmRater {
    fn query(&mut self, request: &RatingRequest<'_>) -> Result<OracleResponse, OracleError> {
        let rating_request = self.rating_request(request);
        let answer = self.run(&rating_request)?;
        let rating = parse_rating(&answer, self.prompt.scale())?;
        debug!(
            user = %request.user.id,
            item = %request.item.id,
            seed = request.seed,
            rating,
            "LLM rating parsed"
        );

        let mut trace = format!("{}{answer}", rating_request.flattened());
        let mut explanation = String::new();
        if self.explain {
            let messages = self
                .prompt
                .explanation_messages(rating_request.messages, rating);
            let explain_request = LlmRequest::explanation(messages)
                .with_seed(request.seed)
                .with_timeout(self.timeout_ms);
            explanation = self.run(&explain_request)?.trim().to_string();
            trace = format!("{}{explanation}", explain_request.flattened());
        }

        Ok(OracleResponse {
            rating,
            explanation,
            trace,
        })
    }
}

#[cfg(test)]
mod tests {
    use simrec_core::{Gender, Item, User};

    use super::*;

    #[test]
    fn rating_request_carries_seed_and_prompt() {
        let rater = LlmRater::new(LlmClient::none(), RatingPrompt::default()).expect("rater");
        let user = User::new("Bo", Gender::Male, 61, "only enjoys romantic comedies.");
        let item = Item::new(15602_u64, "Grumpier Old Men");
        let request = RatingRequest {
            user: &user,
            item: &item,
            watch_count: 2,
            context: &[],
            seed: 77,
        };

        let llm = rater.rating_request(&request);
        assert_eq!(llm.seed, Some(77));
        assert!(llm.flattened().contains("for the 3rd time"));
        assert!(llm.flattened().ends_with("he will assign a rating of "));
    }

    #[test]
    fn missing_backend_is_a_transport_failure() {
        let mut rater = LlmRater::new(LlmClient::none(), RatingPrompt::default()).expect("rater");
        let user = User::new("Bo", Gender::Male, 61, "only enjoys romantic comedies.");
        let item = Item::new(15602_u64, "Grumpier Old Men");
        let request = RatingRequest {
            user: &user,
            item: &item,
            watch_count: 0,
            context: &[],
            seed: 1,
        };
        assert!(matches!(
            rater.query(&request),
            Err(OracleError::Transport(_))
        ));
    }

    #[test]
    fn from_config_without_provider_builds() {
        let config = RaterConfig::from_toml("[provider]\nkind = \"none\"").expect("config");
        let rater = LlmRater::from_config(&config).expect("rater");
        assert!(!rater.client.is_available());
    }
}
