//! Ollama embedding provider.
//!
//! Uses the batch `/api/embed` endpoint of a local Ollama runtime with models
//! like `nomic-embed-text` or `bge-m3` (multilingual).

use crate::embeddings::{EmbeddingConfig, EmbeddingProvider};
use crate::types::Embedding;
use lingua_core::{AppError, AppResult};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, instrument};

const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";
const EMBED_ENDPOINT: &str = "/api/embed";

/// Request timeout in seconds
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Ollama embedding provider using the local API
#[derive(Debug, Clone)]
pub struct OllamaProvider {
    client: Client,
    base_url: String,
    model: String,
    dimensions: usize,
}

#[derive(Debug, Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Debug, Deserialize)]
struct EmbedResponse {
    embeddings: Vec<Vec<f64>>,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: String,
}

impl OllamaProvider {
    /// Create a provider from configuration.
    ///
    /// The base URL is `embedding.endpoint`, then `OLLAMA_URL`, then the default.
    pub fn new(config: &EmbeddingConfig) -> AppResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| {
                AppError::Config(format!("Failed to create HTTP client for Ollama: {}", e))
            })?;

        let base_url = config
            .endpoint
            .clone()
            .or_else(|| std::env::var("OLLAMA_URL").ok())
            .unwrap_or_else(|| DEFAULT_OLLAMA_URL.to_string());

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            dimensions: config.dimensions,
        })
    }
}

#[async_trait::async_trait]
impl EmbeddingProvider for OllamaProvider {
    fn provider_name(&self) -> &str {
        "ollama"
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    #[instrument(skip(self, texts), fields(batch_size = texts.len(), provider = "ollama", model = %self.model))]
    async fn embed_batch(&self, texts: &[String]) -> AppResult<Vec<Embedding>> {
        let url = format!("{}{}", self.base_url, EMBED_ENDPOINT);
        let request = EmbedRequest {
            model: &self.model,
            input: texts,
        };

        debug!("Sending embedding request to {}", url);

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                AppError::EmbeddingService(format!("Failed to send request to Ollama: {}", e))
            })?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            let message = serde_json::from_str::<ErrorResponse>(&error_text)
                .map(|e| e.error)
                .unwrap_or(error_text);
            return Err(AppError::EmbeddingService(format!(
                "Ollama API error ({}): {}",
                status, message
            )));
        }

        let body: EmbedResponse = response.json().await.map_err(|e| {
            AppError::EmbeddingService(format!("Failed to parse Ollama response: {}", e))
        })?;

        debug!("Received {} embeddings", body.embeddings.len());

        Ok(body.embeddings.into_iter().map(Embedding::new).collect())
    }
}
