//! Embedding client.
//!
//! Turns batches of texts into typed [`Embedding`] vectors through a
//! provider-agnostic seam. The client owns batching and output validation;
//! providers only speak their wire format.

pub mod config;
pub mod provider;
pub mod providers;

pub use config::{EmbeddingConfig, PROVIDER_BATCH_CEILING};
pub use provider::{create_provider, EmbeddingProvider, RetryingProvider};

use crate::types::Embedding;
use lingua_core::{AppError, AppResult};
use std::sync::Arc;
use tracing::{debug, instrument};

/// Batching front end over an [`EmbeddingProvider`].
#[derive(Debug, Clone)]
pub struct EmbeddingClient {
    provider: Arc<dyn EmbeddingProvider>,
    max_batch_size: usize,
    dimensions: usize,
}

impl EmbeddingClient {
    /// Build the configured provider and wrap it.
    pub fn from_config(config: &EmbeddingConfig) -> AppResult<Self> {
        let provider = create_provider(config)?;
        Self::new(provider, config.max_batch_size, config.dimensions)
    }

    pub fn new(
        provider: Arc<dyn EmbeddingProvider>,
        max_batch_size: usize,
        dimensions: usize,
    ) -> AppResult<Self> {
        if max_batch_size == 0 || max_batch_size > PROVIDER_BATCH_CEILING {
            return Err(AppError::Config(format!(
                "max_batch_size must be between 1 and {}, got {}",
                PROVIDER_BATCH_CEILING, max_batch_size
            )));
        }

        Ok(Self {
            provider,
            max_batch_size,
            dimensions,
        })
    }

    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    pub fn model_name(&self) -> &str {
        self.provider.model_name()
    }

    /// Embed texts in order, one provider call per batch.
    ///
    /// Empty or whitespace-only texts are rejected before anything is sent.
    #[instrument(skip(self, texts), fields(count = texts.len(), provider = self.provider.provider_name()))]
    pub async fn embed(&self, texts: &[String]) -> AppResult<Vec<Embedding>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        if let Some(index) = texts.iter().position(|t| t.trim().is_empty()) {
            return Err(AppError::InvalidArgument(format!(
                "cannot embed empty text (input #{})",
                index
            )));
        }

        let mut embeddings = Vec::with_capacity(texts.len());

        for (batch_index, batch) in texts.chunks(self.max_batch_size).enumerate() {
            debug!("Embedding batch {} ({} texts)", batch_index, batch.len());

            let vectors = self.provider.embed_batch(batch).await.map_err(|e| match e {
                AppError::EmbeddingService(_) | AppError::Timeout { .. } => e,
                other => AppError::EmbeddingService(other.to_string()),
            })?;

            if vectors.len() != batch.len() {
                return Err(AppError::EmbeddingService(format!(
                    "provider returned {} vectors for {} texts",
                    vectors.len(),
                    batch.len()
                )));
            }

            if let Some(bad) = vectors.iter().find(|v| v.dimensions() != self.dimensions) {
                return Err(AppError::EmbeddingService(format!(
                    "expected {}-dimensional embeddings, provider returned {}",
                    self.dimensions,
                    bad.dimensions()
                )));
            }

            embeddings.extend(vectors);
        }

        Ok(embeddings)
    }

    /// Embed a single text.
    pub async fn embed_one(&self, text: &str) -> AppResult<Embedding> {
        let mut vectors = self.embed(&[text.to_string()]).await?;
        vectors
            .pop()
            .ok_or_else(|| AppError::EmbeddingService("provider returned no vectors".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::providers::mock::MockProvider;
    use std::sync::Mutex;

    /// Records batch sizes and echoes the first character code as a vector.
    #[derive(Debug, Default)]
    struct RecordingProvider {
        batches: Mutex<Vec<usize>>,
        wrong_dimensions: bool,
    }

    #[async_trait::async_trait]
    impl EmbeddingProvider for RecordingProvider {
        fn provider_name(&self) -> &str {
            "recording"
        }

        fn model_name(&self) -> &str {
            "recording-v1"
        }

        fn dimensions(&self) -> usize {
            2
        }

        async fn embed_batch(&self, texts: &[String]) -> AppResult<Vec<Embedding>> {
            self.batches.lock().unwrap().push(texts.len());
            Ok(texts
                .iter()
                .map(|t| {
                    let code = t.chars().next().map(|c| c as u32).unwrap_or(0);
                    if self.wrong_dimensions {
                        Embedding::new(vec![f64::from(code)])
                    } else {
                        Embedding::new(vec![f64::from(code), 1.0])
                    }
                })
                .collect())
        }
    }

    fn texts(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn test_seven_texts_with_batch_five_makes_two_calls() {
        let provider = Arc::new(RecordingProvider::default());
        let client = EmbeddingClient::new(provider.clone(), 5, 2).unwrap();

        let input = texts(&["a", "b", "c", "d", "e", "f", "g"]);
        let output = client.embed(&input).await.unwrap();

        assert_eq!(*provider.batches.lock().unwrap(), vec![5, 2]);
        assert_eq!(output.len(), 7);
        let firsts: Vec<f64> = output.iter().map(|e| e.values()[0]).collect();
        let expected: Vec<f64> = "abcdefg".chars().map(|c| f64::from(c as u32)).collect();
        assert_eq!(firsts, expected);
    }

    #[tokio::test]
    async fn test_empty_slice_makes_no_calls() {
        let provider = Arc::new(MockProvider::new(8));
        let client = EmbeddingClient::new(provider.clone(), 5, 8).unwrap();

        assert!(client.embed(&[]).await.unwrap().is_empty());
        assert_eq!(provider.call_count(), 0);
    }

    #[tokio::test]
    async fn test_blank_text_rejected_before_any_call() {
        let provider = Arc::new(MockProvider::new(8));
        let client = EmbeddingClient::new(provider.clone(), 5, 8).unwrap();

        let err = client.embed(&texts(&["ok", "   "])).await.unwrap_err();
        assert!(matches!(err, AppError::InvalidArgument(_)));
        assert_eq!(provider.call_count(), 0);
    }

    #[tokio::test]
    async fn test_dimension_mismatch_is_service_error() {
        let provider = Arc::new(RecordingProvider {
            wrong_dimensions: true,
            ..Default::default()
        });
        let client = EmbeddingClient::new(provider, 5, 2).unwrap();

        let err = client.embed(&texts(&["a"])).await.unwrap_err();
        assert!(matches!(err, AppError::EmbeddingService(_)));
    }

    #[tokio::test]
    async fn test_embed_one_with_mock_config() {
        let client = EmbeddingClient::from_config(&EmbeddingConfig::mock(16)).unwrap();
        let embedding = client.embed_one("經期 疼痛").await.unwrap();
        assert_eq!(embedding.dimensions(), 16);
        assert_eq!(client.model_name(), "trigram-v1");
    }

    #[test]
    fn test_rejects_out_of_range_batch_size() {
        let provider = Arc::new(MockProvider::new(8));
        assert!(EmbeddingClient::new(provider.clone(), 0, 8).is_err());
        assert!(EmbeddingClient::new(provider, PROVIDER_BATCH_CEILING + 1, 8).is_err());
    }
}
