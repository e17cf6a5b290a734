//! Ollama chat provider.
//!
//! Uses the non-streaming `/api/chat` endpoint so the system instructions and
//! the rendered user message travel as separate chat turns.

use crate::client::{LlmClient, LlmRequest, LlmResponse, LlmUsage};
use lingua_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use std::time::Duration;

const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    options: ChatOptions,
    stream: bool,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ChatOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    num_predict: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    model: String,
    message: ChatReply,
    #[serde(default)]
    prompt_eval_count: Option<u32>,
    #[serde(default)]
    eval_count: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct ChatReply {
    content: String,
}

impl From<ChatResponse> for LlmResponse {
    fn from(response: ChatResponse) -> Self {
        LlmResponse {
            content: response.message.content,
            model: response.model,
            usage: LlmUsage::new(
                response.prompt_eval_count.unwrap_or(0),
                response.eval_count.unwrap_or(0),
            ),
        }
    }
}

/// Client for a local Ollama runtime.
pub struct OllamaClient {
    base_url: String,
    client: reqwest::Client,
}

impl OllamaClient {
    /// Client for `http://localhost:11434` without a request timeout.
    pub fn new() -> Self {
        Self {
            base_url: DEFAULT_OLLAMA_URL.to_string(),
            client: reqwest::Client::new(),
        }
    }

    /// Client whose requests fail after `timeout`.
    pub fn with_timeout(base_url: impl Into<String>, timeout: Duration) -> AppResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::Llm(format!("Failed to build Ollama HTTP client: {}", e)))?;

        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
        })
    }

    fn to_chat_request<'a>(&self, request: &'a LlmRequest) -> ChatRequest<'a> {
        let system = request.system.as_deref().map(|content| ChatMessage {
            role: "system",
            content,
        });
        let turns = request.messages.iter().map(|m| ChatMessage {
            role: m.role.as_str(),
            content: &m.content,
        });

        ChatRequest {
            model: &request.model,
            messages: system.into_iter().chain(turns).collect(),
            options: ChatOptions {
                temperature: request.temperature,
                num_predict: request.max_tokens,
            },
            stream: false,
        }
    }
}

impl Default for OllamaClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl LlmClient for OllamaClient {
    fn provider_name(&self) -> &str {
        "ollama"
    }

    async fn complete(&self, request: &LlmRequest) -> AppResult<LlmResponse> {
        tracing::debug!(
            "Sending chat request to Ollama ({} messages, model {})",
            request.messages.len(),
            request.model
        );

        let url = format!("{}/api/chat", self.base_url);
        let response = self
            .client
            .post(&url)
            .json(&self.to_chat_request(request))
            .send()
            .await
            .map_err(|e| AppError::Llm(format!("Failed to reach Ollama at {}: {}", url, e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::Llm(format!("Ollama returned {}: {}", status, body)));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| AppError::Llm(format!("Failed to parse Ollama response: {}", e)))?;

        Ok(parsed.into())
    }
}
