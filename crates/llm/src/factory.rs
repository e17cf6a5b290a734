//! LLM provider factory.
//!
//! Resolves a provider name plus endpoint and secret into a client.

use crate::client::LlmClient;
use crate::providers::{ClaudeClient, OllamaClient};
use crate::types::ProviderType;
use lingua_core::{AppError, AppResult};
use std::sync::Arc;
use std::time::Duration;

/// Create an LLM client based on the provider name.
///
/// # Arguments
/// * `provider` - Provider identifier ("claude", "anthropic", "ollama")
/// * `endpoint` - Optional custom endpoint URL
/// * `api_key` - API key (required for Claude)
/// * `timeout` - Per-request timeout applied by the HTTP client
///
/// # Errors
/// Returns `AppError::Config` if the provider is unknown or a required secret
/// is missing.
pub fn create_client(
    provider: &str,
    endpoint: Option<&str>,
    api_key: Option<&str>,
    timeout: Duration,
) -> AppResult<Arc<dyn LlmClient>> {
    let provider_type = ProviderType::parse(provider)
        .ok_or_else(|| AppError::Config(format!("Unknown provider: {}", provider)))?;

    match provider_type {
        ProviderType::Ollama => {
            let base_url = endpoint.unwrap_or("http://localhost:11434");
            Ok(Arc::new(OllamaClient::with_timeout(base_url, timeout)?))
        }
        ProviderType::Claude => {
            let api_key = api_key.ok_or_else(|| {
                AppError::Config("Claude provider requires API key".to_string())
            })?;
            let client = match endpoint {
                Some(url) => ClaudeClient::with_base_url(api_key, url, timeout)?,
                None => ClaudeClient::new(api_key, timeout)?,
            };
            Ok(Arc::new(client))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TIMEOUT: Duration = Duration::from_secs(30);

    #[test]
    fn test_create_ollama_client() {
        let client = create_client("ollama", None, None, TIMEOUT).unwrap();
        assert_eq!(client.provider_name(), "ollama");
    }

    #[test]
    fn test_create_claude_client() {
        let client = create_client("anthropic", None, Some("sk-test"), TIMEOUT).unwrap();
        assert_eq!(client.provider_name(), "claude");
    }

    #[test]
    fn test_claude_requires_api_key() {
        match create_client("claude", None, None, TIMEOUT) {
            Err(err) => assert!(err.to_string().contains("requires API key")),
            Ok(_) => panic!("Expected error for Claude without API key"),
        }
    }

    #[test]
    fn test_unknown_provider() {
        match create_client("unknown", None, None, TIMEOUT) {
            Err(err) => assert!(err.to_string().contains("Unknown provider")),
            Ok(_) => panic!("Expected error for unknown provider"),
        }
    }
}
