//! Embedding provider trait and factory.

use crate::embeddings::config::EmbeddingConfig;
use crate::types::Embedding;
use lingua_core::{AppError, AppResult};
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

/// Trait for embedding providers.
///
/// One call is one outbound request; callers are responsible for batching.
#[async_trait::async_trait]
pub trait EmbeddingProvider: Send + Sync + std::fmt::Debug {
    /// Get provider name (e.g., "mock", "vertex", "ollama")
    fn provider_name(&self) -> &str;

    /// Get model identifier
    fn model_name(&self) -> &str;

    /// Get embedding dimensions
    fn dimensions(&self) -> usize;

    /// Generate embeddings for a batch of texts, in input order.
    async fn embed_batch(&self, texts: &[String]) -> AppResult<Vec<Embedding>>;
}

/// Initial backoff duration in milliseconds
const INITIAL_BACKOFF_MS: u64 = 200;

/// Wraps any provider with bounded exponential backoff on transient errors.
#[derive(Debug)]
pub struct RetryingProvider {
    inner: Arc<dyn EmbeddingProvider>,
    max_retries: u32,
    initial_backoff: Duration,
}

impl RetryingProvider {
    pub fn new(inner: Arc<dyn EmbeddingProvider>, max_retries: u32) -> Self {
        Self {
            inner,
            max_retries,
            initial_backoff: Duration::from_millis(INITIAL_BACKOFF_MS),
        }
    }

    /// Override the first backoff delay.
    pub fn with_initial_backoff(mut self, initial_backoff: Duration) -> Self {
        self.initial_backoff = initial_backoff;
        self
    }
}

#[async_trait::async_trait]
impl EmbeddingProvider for RetryingProvider {
    fn provider_name(&self) -> &str {
        self.inner.provider_name()
    }

    fn model_name(&self) -> &str {
        self.inner.model_name()
    }

    fn dimensions(&self) -> usize {
        self.inner.dimensions()
    }

    async fn embed_batch(&self, texts: &[String]) -> AppResult<Vec<Embedding>> {
        let mut attempt = 0;
        loop {
            match self.inner.embed_batch(texts).await {
                Ok(embeddings) => return Ok(embeddings),
                Err(e) if e.is_transient() && attempt < self.max_retries => {
                    attempt += 1;
                    let backoff = self.initial_backoff * 2_u32.saturating_pow(attempt - 1);
                    warn!(
                        "Embedding failed (attempt {}/{}), retrying in {}ms: {}",
                        attempt,
                        self.max_retries,
                        backoff.as_millis(),
                        e
                    );
                    tokio::time::sleep(backoff).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

/// Create an embedding provider based on configuration.
///
/// Wraps the provider in [`RetryingProvider`] when `max_retries > 0`.
pub fn create_provider(config: &EmbeddingConfig) -> AppResult<Arc<dyn EmbeddingProvider>> {
    config.validate()?;

    let provider: Arc<dyn EmbeddingProvider> = match config.provider.as_str() {
        "mock" => Arc::new(super::providers::mock::MockProvider::new(config.dimensions)),

        "ollama" => Arc::new(super::providers::ollama::OllamaProvider::new(config)?),

        "vertex" => Arc::new(super::providers::vertex::VertexProvider::new(config)?),

        _ => {
            return Err(AppError::Config(format!(
                "Unknown embedding provider: '{}'. Supported providers: vertex, ollama, mock",
                config.provider
            )))
        }
    };

    if config.max_retries > 0 {
        Ok(Arc::new(RetryingProvider::new(provider, config.max_retries)))
    } else {
        Ok(provider)
    }
}
