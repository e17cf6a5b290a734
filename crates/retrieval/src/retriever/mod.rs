//! Similarity retrieval.
//!
//! Two interchangeable backends answer the same question, "which documents
//! are nearest to this query vector": an exact cosine scan computed in SQL
//! over the corpus store, and a call to a hosted approximate-nearest-neighbor
//! index. Which one runs is a configuration choice made in one place,
//! [`create_retriever`].

pub mod approximate;
pub mod exact;

pub use approximate::ApproximateRetriever;
pub use exact::ExactRetriever;

use crate::config::{RagConfig, RetrieverKind};
use crate::store::CorpusStore;
use crate::types::{Candidate, QueryVector};
use lingua_core::{AppError, AppResult};
use std::sync::Arc;

/// Nearest-neighbor search over the corpus.
#[async_trait::async_trait]
pub trait Retriever: Send + Sync {
    /// Backend name for logs ("exact", "approximate").
    fn name(&self) -> &str;

    /// Up to `n` candidates, best first.
    ///
    /// Fails with `InvalidArgument` when `n` is zero or the query
    /// dimensionality disagrees with the corpus.
    async fn find_top_n(&self, query: &QueryVector, n: usize) -> AppResult<Vec<Candidate>>;
}

/// Build the configured retriever.
pub fn create_retriever(config: &RagConfig, store: CorpusStore) -> AppResult<Arc<dyn Retriever>> {
    let retriever: Arc<dyn Retriever> = match config.retriever.kind {
        RetrieverKind::Exact => Arc::new(ExactRetriever::new(store)?),
        RetrieverKind::Approximate => Arc::new(ApproximateRetriever::new(
            &config.retriever,
            config.embedding.dimensions,
        )?),
    };

    tracing::debug!("Using {} retriever", retriever.name());
    Ok(retriever)
}

/// Shared argument checks for every backend.
pub(crate) fn validate_request(
    query: &QueryVector,
    n: usize,
    corpus_dimensions: Option<usize>,
) -> AppResult<()> {
    if n < 1 {
        return Err(AppError::InvalidArgument(
            "n must be at least 1".to_string(),
        ));
    }

    if let Some(expected) = corpus_dimensions {
        let actual = query.embedding.dimensions();
        if actual != expected {
            return Err(AppError::InvalidArgument(format!(
                "query has {} dimensions, corpus has {}",
                actual, expected
            )));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Embedding, Language};

    fn query(values: Vec<f64>) -> QueryVector {
        QueryVector {
            text: "q".to_string(),
            language: Language::English,
            embedding: Embedding::new(values),
        }
    }

    #[test]
    fn test_validate_request() {
        assert!(validate_request(&query(vec![1.0, 0.0]), 1, Some(2)).is_ok());
        assert!(validate_request(&query(vec![1.0, 0.0]), 3, None).is_ok());
        assert!(matches!(
            validate_request(&query(vec![1.0, 0.0]), 0, Some(2)),
            Err(AppError::InvalidArgument(_))
        ));
        assert!(matches!(
            validate_request(&query(vec![1.0]), 1, Some(2)),
            Err(AppError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_factory_selects_backend() {
        let store = CorpusStore::open_in_memory().unwrap();
        let exact = create_retriever(&RagConfig::default(), store.clone()).unwrap();
        assert_eq!(exact.name(), "exact");

        let mut config = RagConfig::default();
        config.retriever.kind = RetrieverKind::Approximate;
        config.retriever.index_endpoint = Some("https://index.example.test".to_string());
        config.retriever.index_endpoint_id =
            Some("projects/p/locations/us-central1/indexEndpoints/42".to_string());
        config.retriever.deployed_index_id = Some("articles".to_string());
        let approximate = create_retriever(&config, store).unwrap();
        assert_eq!(approximate.name(), "approximate");
    }
}
