//! Mock embedding provider using trigram-based content-aware embeddings.

use crate::embeddings::provider::EmbeddingProvider;
use crate::types::Embedding;
use lingua_core::AppResult;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Mock provider for tests and offline runs.
///
/// Generates deterministic embeddings from character trigrams and word
/// frequencies. Not semantically meaningful, but consistent and
/// content-dependent. Works on CJK text because words shorter than three
/// characters still hash as a whole.
#[derive(Debug)]
pub struct MockProvider {
    dimensions: usize,
    calls: AtomicUsize,
}

impl MockProvider {
    /// Create a new mock provider with specified dimensions.
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions,
            calls: AtomicUsize::new(0),
        }
    }

    /// Number of `embed_batch` calls served so far.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn generate_mock_embedding(&self, text: &str) -> Embedding {
        let mut embedding = vec![0.0_f64; self.dimensions];
        let lower = text.to_lowercase();

        let mut word_freq: BTreeMap<&str, u32> = BTreeMap::new();
        for word in lower.split_whitespace() {
            *word_freq.entry(word).or_insert(0) += 1;
        }

        for (word, freq) in word_freq.iter() {
            let chars: Vec<char> = word.chars().collect();
            for window in chars.windows(3) {
                let trigram: String = window.iter().collect();
                let dim_idx = hash_bytes(trigram.as_bytes(), 37) % self.dimensions;
                embedding[dim_idx] += f64::from(*freq).sqrt();
            }

            let base_dim = hash_bytes(word.as_bytes(), 31) % self.dimensions;
            embedding[base_dim] += f64::from(*freq);
        }

        let norm: f64 = embedding.iter().map(|x| x * x).sum::<f64>().sqrt();
        if norm > 0.0 {
            for v in &mut embedding {
                *v /= norm;
            }
        }

        Embedding::new(embedding)
    }
}

fn hash_bytes(bytes: &[u8], multiplier: u64) -> usize {
    bytes
        .iter()
        .fold(0u64, |acc, b| acc.wrapping_mul(multiplier).wrapping_add(u64::from(*b))) as usize
}

#[async_trait::async_trait]
impl EmbeddingProvider for MockProvider {
    fn provider_name(&self) -> &str {
        "mock"
    }

    fn model_name(&self) -> &str {
        "trigram-v1"
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    async fn embed_batch(&self, texts: &[String]) -> AppResult<Vec<Embedding>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(texts
            .iter()
            .map(|text| self.generate_mock_embedding(text))
            .collect())
    }
}
