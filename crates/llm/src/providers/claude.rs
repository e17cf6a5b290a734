//! Anthropic Claude provider (Messages API).

use crate::client::{LlmClient, LlmRequest, LlmResponse, LlmUsage};
use lingua_core::{AppError, AppResult};
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use serde::{Deserialize, Serialize};
use std::time::Duration;

const DEFAULT_CLAUDE_URL: &str = "https://api.anthropic.com";
const API_VERSION: &str = "2023-06-01";
const MESSAGES_ENDPOINT: &str = "/v1/messages";

/// Anthropic requires `max_tokens`; used when the request leaves it unset.
const FALLBACK_MAX_TOKENS: u32 = 4096;

/// Claude client.
pub struct ClaudeClient {
    api_key: String,
    base_url: String,
    client: reqwest::Client,
}

impl ClaudeClient {
    /// Create a client against the public Anthropic endpoint.
    pub fn new(api_key: impl Into<String>, timeout: Duration) -> AppResult<Self> {
        Self::with_base_url(api_key, DEFAULT_CLAUDE_URL, timeout)
    }

    /// Create a client against a custom endpoint (proxies, gateways).
    pub fn with_base_url(
        api_key: impl Into<String>,
        base_url: impl Into<String>,
        timeout: Duration,
    ) -> AppResult<Self> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(AppError::Config(
                "Claude provider requires a non-empty API key".to_string(),
            ));
        }

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::Llm(format!("Failed to build Claude HTTP client: {}", e)))?;

        Ok(Self {
            api_key,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
        })
    }

    fn headers(&self) -> AppResult<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-api-key",
            HeaderValue::from_str(self.api_key.trim())
                .map_err(|_| AppError::Config("Invalid Claude API key".to_string()))?,
        );
        headers.insert("anthropic-version", HeaderValue::from_static(API_VERSION));
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        Ok(headers)
    }

    fn to_claude_request<'a>(&self, request: &'a LlmRequest) -> ClaudeRequest<'a> {
        ClaudeRequest {
            model: &request.model,
            max_tokens: request.max_tokens.unwrap_or(FALLBACK_MAX_TOKENS),
            temperature: request.temperature,
            system: request.system.as_deref(),
            messages: request
                .messages
                .iter()
                .map(|m| ClaudeMessage {
                    role: m.role.as_str(),
                    content: &m.content,
                })
                .collect(),
        }
    }
}

#[async_trait::async_trait]
impl LlmClient for ClaudeClient {
    fn provider_name(&self) -> &str {
        "claude"
    }

    async fn complete(&self, request: &LlmRequest) -> AppResult<LlmResponse> {
        tracing::info!(model = %request.model, "Sending completion request to Claude");

        let body = self.to_claude_request(request);
        let url = format!("{}{}", self.base_url, MESSAGES_ENDPOINT);

        let response = self
            .client
            .post(&url)
            .headers(self.headers()?)
            .json(&body)
            .send()
            .await
            .map_err(|e| AppError::Llm(format!("Failed to call Claude messages API: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response
                .text()
                .await
                .unwrap_or_else(|_| "<body unavailable>".to_string());
            return Err(AppError::Llm(format!("Claude returned {}: {}", status, text)));
        }

        let parsed: ClaudeResponse = response
            .json()
            .await
            .map_err(|e| AppError::Llm(format!("Failed to parse Claude response: {}", e)))?;

        let llm_response = parsed.into_llm_response()?;
        tracing::info!(
            completion_tokens = llm_response.usage.completion_tokens,
            "Received completion from Claude"
        );
        Ok(llm_response)
    }
}

#[derive(Debug, Serialize)]
struct ClaudeRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<&'a str>,
    messages: Vec<ClaudeMessage<'a>>,
}

#[derive(Debug, Serialize)]
struct ClaudeMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ClaudeResponse {
    model: String,
    content: Vec<ClaudeContentBlock>,
    #[serde(default)]
    usage: ClaudeUsage,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ClaudeContentBlock {
    Text {
        text: String,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Default, Deserialize)]
struct ClaudeUsage {
    #[serde(default)]
    input_tokens: u32,
    #[serde(default)]
    output_tokens: u32,
}

impl ClaudeResponse {
    fn into_llm_response(self) -> AppResult<LlmResponse> {
        let content = self
            .content
            .into_iter()
            .filter_map(|block| match block {
                ClaudeContentBlock::Text { text } => Some(text),
                ClaudeContentBlock::Other => None,
            })
            .collect::<Vec<_>>()
            .join("\n");

        if content.is_empty() {
            return Err(AppError::Llm(
                "Claude response missing text content".to_string(),
            ));
        }

        Ok(LlmResponse {
            content,
            model: self.model,
            usage: LlmUsage::new(self.usage.input_tokens, self.usage.output_tokens),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> ClaudeClient {
        ClaudeClient::new("sk-test", Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn test_rejects_empty_key() {
        assert!(ClaudeClient::new("  ", Duration::from_secs(5)).is_err());
    }

    #[test]
    fn test_request_shape() {
        let request = LlmRequest::new("What is RAG?", "claude-3-5-sonnet-20241022")
            .with_system("You are helpful")
            .with_temperature(0.6)
            .with_max_tokens(8192);

        let client = client();
        let body = serde_json::to_value(client.to_claude_request(&request)).unwrap();
        assert_eq!(body["model"], "claude-3-5-sonnet-20241022");
        assert_eq!(body["max_tokens"], 8192);
        assert_eq!(body["system"], "You are helpful");
        assert_eq!(body["messages"][0]["role"], "user");
        assert_eq!(body["messages"][0]["content"], "What is RAG?");
    }

    #[test]
    fn test_request_defaults_max_tokens() {
        let request = LlmRequest::new("q", "m");
        let client = client();
        let body = serde_json::to_value(client.to_claude_request(&request)).unwrap();
        assert_eq!(body["max_tokens"], FALLBACK_MAX_TOKENS);
        assert!(body.get("system").is_none());
    }

    #[test]
    fn test_response_parsing_joins_text_blocks() {
        let raw = r#"{
            "model": "claude-3-5-sonnet-20241022",
            "content": [
                {"type": "text", "text": "first"},
                {"type": "tool_use", "id": "x", "name": "y", "input": {}},
                {"type": "text", "text": "second"}
            ],
            "usage": {"input_tokens": 12, "output_tokens": 3}
        }"#;

        let parsed: ClaudeResponse = serde_json::from_str(raw).unwrap();
        let response = parsed.into_llm_response().unwrap();
        assert_eq!(response.content, "first\nsecond");
        assert_eq!(response.usage.total_tokens, 15);
    }

    #[test]
    fn test_response_without_text_is_error() {
        let raw = r#"{"model": "m", "content": []}"#;
        let parsed: ClaudeResponse = serde_json::from_str(raw).unwrap();
        assert!(parsed.into_llm_response().is_err());
    }
}
