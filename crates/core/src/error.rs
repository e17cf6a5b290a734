//! Error types for Lingua RAG.
//!
//! One enum covers every failure category of the pipeline: invalid input,
//! the external services the pipeline calls (embedding, retrieval index,
//! translation, generation), timeouts, storage and configuration.

use std::time::Duration;
use thiserror::Error;

/// Unified error type for Lingua RAG.
///
/// All library functions return `Result<T, AppError>`.
#[derive(Error, Debug)]
pub enum AppError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O and filesystem errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed query vector, `n < 1`, dimensionality mismatch, empty text.
    /// Never retried.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Embedding provider failure
    #[error("Embedding service error: {0}")]
    EmbeddingService(String),

    /// Similarity backend unreachable or failing
    #[error("Retriever unavailable: {0}")]
    RetrieverUnavailable(String),

    /// Translation service failure
    #[error("Translation error: {0}")]
    Translation(String),

    /// Answer generation failure
    #[error("Generation service error: {0}")]
    GenerationService(String),

    /// An external call exceeded its deadline
    #[error("{operation} timed out after {}s", .elapsed.as_secs())]
    Timeout {
        operation: String,
        elapsed: Duration,
    },

    /// Corpus store errors
    #[error("Storage error: {0}")]
    Storage(String),

    /// LLM provider errors
    #[error("LLM error: {0}")]
    Llm(String),

    /// Prompt system errors
    #[error("Prompt error: {0}")]
    Prompt(String),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Generic errors
    #[error("{0}")]
    Other(String),
}

impl AppError {
    /// Create a timeout error for the named operation.
    pub fn timeout(operation: impl Into<String>, elapsed: Duration) -> Self {
        AppError::Timeout {
            operation: operation.into(),
            elapsed,
        }
    }

    /// Whether a bounded retry at a service boundary may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            AppError::EmbeddingService(_)
                | AppError::RetrieverUnavailable(_)
                | AppError::GenerationService(_)
                | AppError::Timeout { .. }
        )
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

impl From<serde_yaml::Error> for AppError {
    fn from(err: serde_yaml::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

/// Convenience type alias for Results with AppError.
pub type AppResult<T> = Result<T, AppError>;
