//! Core types for LLM requests and responses.

use serde::{Deserialize, Serialize};

/// Speaker of a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Instructions framing the whole conversation.
    System,
    /// The question side.
    User,
    /// The model side; a trailing assistant message is a prefix to continue.
    Assistant,
}

/// One message of a chat prompt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Who is speaking.
    pub role: Role,
    /// Message text.
    pub content: String,
}

impl ChatMessage {
    /// A system message.
    #[must_use]
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    /// A user message.
    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    /// An assistant message.
    #[must_use]
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// A request to the LLM.
#[derive(Debug, Clone, Serialize)]
pub struct LlmRequest {
    /// Conversation so far, ending with the assistant prefix to complete.
    pub messages: Vec<ChatMessage>,
    /// Maximum tokens to generate.
    pub max_tokens: u32,
    /// Temperature (0.0 = deterministic).
    pub temperature: f32,
    /// Sampling seed forwarded to the provider.
    pub seed: Option<u64>,
    /// Request timeout in milliseconds.
    pub timeout_ms: u64,
}

impl LlmRequest {
    /// A short, greedy completion that should hold just the rating.
    #[must_use]
    pub fn rating(messages: Vec<ChatMessage>) -> Self {
        Self {
            messages,
            max_tokens: 4,
            temperature: 0.0,
            seed: None,
            timeout_ms: 30_000,
        }
    }

    /// A longer completion explaining an already given rating.
    #[must_use]
    pub fn explanation(messages: Vec<ChatMessage>) -> Self {
        Self {
            messages,
            max_tokens: 200,
            temperature: 0.0,
            seed: None,
            timeout_ms: 30_000,
        }
    }

    /// Set the sampling seed.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Set the timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    /// The conversation flattened to plain text, for completion-style
    /// endpoints and for traces.
    #[must_use]
    pub fn flattened(&self) -> String {
        let mut text = String::new();
        for message in &self.messages {
            if !text.is_empty() {
                text.push_str("\n\n");
            }
            text.push_str(&message.content);
        }
        text
    }
}

/// A response from the LLM.
#[derive(Debug, Clone, Deserialize)]
pub struct LlmResponse {
    /// The generated text.
    pub text: String,
    /// How many tokens were generated.
    pub tokens_generated: u32,
    /// Latency in milliseconds.
    pub latency_ms: u64,
    /// Which model was used.
    pub model: String,
}
