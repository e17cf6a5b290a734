//! LLM client abstraction and request/response types.
//!
//! This module defines the core abstractions for interacting with LLM providers.

use lingua_core::AppResult;
use serde::{Deserialize, Serialize};

/// Author of a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

/// A single chat message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LlmMessage {
    pub role: Role,
    pub content: String,
}

impl LlmMessage {
    /// Create a user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

/// LLM completion request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmRequest {
    /// Model identifier (e.g., "claude-3-5-sonnet-20241022", "llama3.2")
    pub model: String,

    /// Conversation, oldest first
    pub messages: Vec<LlmMessage>,

    /// System instructions (optional)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,

    /// Maximum tokens to generate
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,

    /// Temperature for sampling (0.0 - 1.0 for Claude)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
}

impl LlmRequest {
    /// Create a new request with a single user message.
    pub fn new(prompt: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            messages: vec![LlmMessage::user(prompt)],
            system: None,
            max_tokens: None,
            temperature: None,
        }
    }

    /// Set the maximum tokens to generate.
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    /// Set the temperature for sampling.
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Set the system prompt.
    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }
}

/// LLM completion response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmResponse {
    /// The generated text
    pub content: String,

    /// Model that generated the response
    pub model: String,

    /// Usage statistics
    pub usage: LlmUsage,
}

/// Token usage statistics.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct LlmUsage {
    /// Tokens in the prompt
    #[serde(default)]
    pub prompt_tokens: u32,

    /// Tokens in the completion
    #[serde(default)]
    pub completion_tokens: u32,

    /// Total tokens used
    #[serde(default)]
    pub total_tokens: u32,
}

impl LlmUsage {
    /// Create usage stats from prompt and completion token counts.
    pub fn new(prompt_tokens: u32, completion_tokens: u32) -> Self {
        Self {
            prompt_tokens,
            completion_tokens,
            total_tokens: prompt_tokens.saturating_add(completion_tokens),
        }
    }
}

/// Trait for answer-generation providers.
///
/// One blocking request per call: no streaming, no retries, no caching.
#[async_trait::async_trait]
pub trait LlmClient: Send + Sync {
    /// Get the provider name (e.g., "claude", "ollama").
    fn provider_name(&self) -> &str;

    /// Perform a completion.
    async fn complete(&self, request: &LlmRequest) -> AppResult<LlmResponse>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_builder() {
        let request = LlmRequest::new("question", "model-x")
            .with_system("be kind")
            .with_max_tokens(8192)
            .with_temperature(0.6);

        assert_eq!(request.messages, vec![LlmMessage::user("question")]);
        assert_eq!(request.system.as_deref(), Some("be kind"));
        assert_eq!(request.max_tokens, Some(8192));
        assert_eq!(request.temperature, Some(0.6));
    }

    #[test]
    fn test_role_serialization() {
        let json = serde_json::to_string(&LlmMessage::user("hi")).unwrap();
        assert_eq!(json, r#"{"role":"user","content":"hi"}"#);
    }

    #[test]
    fn test_usage_totals() {
        let usage = LlmUsage::new(10, 5);
        assert_eq!(usage.total_tokens, 15);
    }
}
