//! LLM Client — unified interface for Ollama and OpenAI-compatible backends.

use std::time::{Duration, Instant};

use reqwest::Client;
use serde_json::{Value, json};
use tracing::{debug, warn};

use crate::config::ProviderConfig;
use crate::error::LlmError;
use crate::types::{LlmRequest, LlmResponse};

/// Provider backend for LLM inference.
#[derive(Debug, Clone)]
pub enum LlmProvider {
    /// Ollama running locally.
    Ollama {
        /// Server root.
        base_url: String,
    },
    /// OpenAI-compatible API.
    OpenAiCompatible {
        /// API root, without `/v1`.
        base_url: String,
        /// Bearer token.
        api_key: String,
    },
    /// No LLM available; all calls fail.
    None,
}

impl LlmProvider {
    /// Resolve a configured provider, reading the API key from the environment.
    ///
    /// # Errors
    ///
    /// `ConfigError` if the OpenAI key variable is unset.
    pub fn from_config(config: &ProviderConfig) -> Result<Self, LlmError> {
        Ok(match config {
            ProviderConfig::Ollama { base_url } => Self::Ollama {
                base_url: base_url.trim_end_matches('/').to_string(),
            },
            ProviderConfig::OpenAi {
                base_url,
                api_key_env,
            } => Self::OpenAiCompatible {
                base_url: base_url.trim_end_matches('/').to_string(),
                api_key: std::env::var(api_key_env).map_err(|_| {
                    LlmError::ConfigError(format!("environment variable {api_key_env} is not set"))
                })?,
            },
            ProviderConfig::None => Self::None,
        })
    }
}

/// The LLM client that routes requests to the configured backend.
#[derive(Debug)]
pub struct LlmClient {
    provider: LlmProvider,
    http: Client,
    model: String,
    max_retries: u32,
    retry_backoff: Duration,
}

impl LlmClient {
    /// Create a new LLM client.
    #[must_use]
    pub fn new(provider: LlmProvider, model: impl Into<String>, max_retries: u32) -> Self {
        Self {
            provider,
            http: Client::new(),
            model: model.into(),
            max_retries,
            retry_backoff: Duration::ZERO,
        }
    }

    /// Create a client with no LLM backend (all calls fail).
    #[must_use]
    pub fn none() -> Self {
        Self::new(LlmProvider::None, String::new(), 0)
    }

    /// Pause `n * backoff` before the `n`-th retry.
    #[must_use]
    pub fn with_retry_backoff(mut self, backoff: Duration) -> Self {
        self.retry_backoff = backoff;
        self
    }

    /// Model name sent with every request.
    #[must_use]
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Check if the LLM client has a backend configured.
    #[must_use]
    pub fn is_available(&self) -> bool {
        !matches!(self.provider, LlmProvider::None)
    }

    /// Generate a completion of `request.messages`.
    ///
    /// # Errors
    ///
    /// `Unavailable` without a provider, `RetriesExhausted` once every attempt
    /// failed, `RequestFailed` when a successful response has no readable body.
    pub async fn generate(&self, request: &LlmRequest) -> Result<LlmResponse, LlmError> {
        match &self.provider {
            LlmProvider::None => Err(LlmError::Unavailable("No LLM provider configured".into())),
            LlmProvider::Ollama { base_url } => self.generate_ollama(base_url, request).await,
            LlmProvider::OpenAiCompatible { base_url, api_key } => {
                self.generate_openai(base_url, api_key, request).await
            }
        }
    }

    /// Ollama's raw completion endpoint, so the trailing assistant prefix is
    /// continued rather than answered.
    async fn generate_ollama(
        &self,
        base_url: &str,
        request: &LlmRequest,
    ) -> Result<LlmResponse, LlmError> {
        let url = format!("{base_url}/api/generate");
        let mut body = json!({
            "model": self.model,
            "prompt": request.flattened(),
            "raw": true,
            "stream": false,
            "options": {
                "temperature": request.temperature,
                "num_predict": request.max_tokens,
            }
        });
        if let Some(seed) = request.seed {
            body["options"]["seed"] = json!(seed);
        }

        let (json, latency_ms) = self
            .post_with_retries("Ollama", &url, None, &body, request)
            .await?;
        Ok(LlmResponse {
            text: json["response"].as_str().unwrap_or("").to_string(),
            tokens_generated: u32::try_from(json["eval_count"].as_u64().unwrap_or(0))
                .unwrap_or(u32::MAX),
            latency_ms,
            model: self.model.clone(),
        })
    }

    /// OpenAI-compatible chat completions.
    async fn generate_openai(
        &self,
        base_url: &str,
        api_key: &str,
        request: &LlmRequest,
    ) -> Result<LlmResponse, LlmError> {
        let url = format!("{base_url}/v1/chat/completions");
        let mut body = json!({
            "model": self.model,
            "messages": request.messages,
            "max_tokens": request.max_tokens,
            "temperature": request.temperature,
        });
        if let Some(seed) = request.seed {
            body["seed"] = json!(seed);
        }

        let (json, latency_ms) = self
            .post_with_retries("OpenAI", &url, Some(api_key), &body, request)
            .await?;
        Ok(LlmResponse {
            text: json["choices"][0]["message"]["content"]
                .as_str()
                .unwrap_or("")
                .to_string(),
            tokens_generated: u32::try_from(
                json["usage"]["completion_tokens"].as_u64().unwrap_or(0),
            )
            .unwrap_or(u32::MAX),
            latency_ms,
            model: self.model.clone(),
        })
    }

    /// POST `body` until a 2xx arrives or the retry budget is spent.
    async fn post_with_retries(
        &self,
        backend: &str,
        url: &str,
        bearer: Option<&str>,
        body: &Value,
        request: &LlmRequest,
    ) -> Result<(Value, u64), LlmError> {
        let mut last_error = String::new();
        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                debug!(
                    backend,
                    "Retrying LLM call (attempt {}/{})",
                    attempt + 1,
                    self.max_retries + 1
                );
                if !self.retry_backoff.is_zero() {
                    tokio::time::sleep(self.retry_backoff * attempt).await;
                }
            }

            let start = Instant::now();
            let mut builder = self
                .http
                .post(url)
                .json(body)
                .timeout(Duration::from_millis(request.timeout_ms));
            if let Some(key) = bearer {
                builder = builder.bearer_auth(key);
            }
            let result = builder.send().await;
            let latency_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX);

            match result {
                Ok(resp) if resp.status().is_success() => {
                    let json: Value = resp.json().await.map_err(|e| {
                        LlmError::RequestFailed(format!("unreadable {backend} body: {e}"))
                    })?;
                    return Ok((json, latency_ms));
                }
                Ok(resp) => {
                    let status = resp.status();
                    let text = resp.text().await.unwrap_or_default();
                    last_error = format!("HTTP {status}: {text}");
                    warn!(backend, "LLM backend returned error: {}", last_error);
                }
                Err(e) => {
                    let err = match LlmError::from(e) {
                        LlmError::Timeout(_) => LlmError::Timeout(request.timeout_ms),
                        other => other,
                    };
                    warn!(backend, "{err}");
                    last_error = err.to_string();
                }
            }
        }

        Err(LlmError::RetriesExhausted {
            attempts: self.max_retries + 1,
            last_error,
        })
    }
}
