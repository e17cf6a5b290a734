//! Embedding configuration.

use lingua_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};

/// Largest batch any supported provider accepts in one request.
pub const PROVIDER_BATCH_CEILING: usize = 250;

/// Embedding configuration, the `rag.embedding` section.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EmbeddingConfig {
    /// Provider name: "vertex", "ollama", "mock"
    #[serde(default = "default_provider")]
    pub provider: String,

    /// Model identifier (provider-specific)
    #[serde(default = "default_model")]
    pub model: String,

    /// Embedding vector dimensions
    #[serde(default = "default_dimensions")]
    pub dimensions: usize,

    /// Maximum number of texts per outbound request
    #[serde(default = "default_max_batch_size")]
    pub max_batch_size: usize,

    /// Retries with exponential backoff around each batch (0 disables)
    #[serde(default)]
    pub max_retries: u32,

    /// Custom endpoint (Ollama base URL, Vertex regional host)
    #[serde(default)]
    pub endpoint: Option<String>,

    /// Cloud project that hosts the model (Vertex)
    #[serde(default)]
    pub project_id: Option<String>,

    /// Cloud region (Vertex)
    #[serde(default = "default_location")]
    pub location: String,

    /// Environment variable holding the bearer token (Vertex)
    #[serde(default = "default_token_env")]
    pub access_token_env: String,
}

fn default_provider() -> String {
    "vertex".to_string()
}

fn default_model() -> String {
    "text-multilingual-embedding-002".to_string()
}

fn default_dimensions() -> usize {
    768
}

fn default_max_batch_size() -> usize {
    5
}

fn default_location() -> String {
    "us-central1".to_string()
}

fn default_token_env() -> String {
    "GOOGLE_ACCESS_TOKEN".to_string()
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: default_model(),
            dimensions: default_dimensions(),
            max_batch_size: default_max_batch_size(),
            max_retries: 0,
            endpoint: None,
            project_id: None,
            location: default_location(),
            access_token_env: default_token_env(),
        }
    }
}

impl EmbeddingConfig {
    /// Offline configuration backed by the deterministic mock provider.
    pub fn mock(dimensions: usize) -> Self {
        Self {
            provider: "mock".to_string(),
            model: "trigram-v1".to_string(),
            dimensions,
            ..Default::default()
        }
    }

    /// Check ranges before any provider is built.
    pub fn validate(&self) -> AppResult<()> {
        if self.dimensions == 0 {
            return Err(AppError::Config(
                "embedding.dimensions must be at least 1".to_string(),
            ));
        }

        if self.max_batch_size == 0 || self.max_batch_size > PROVIDER_BATCH_CEILING {
            return Err(AppError::Config(format!(
                "embedding.max_batch_size must be between 1 and {}, got {}",
                PROVIDER_BATCH_CEILING, self.max_batch_size
            )));
        }

        Ok(())
    }
}
