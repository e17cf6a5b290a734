//! Embedding provider implementations.

pub mod mock;
pub mod ollama;
pub mod vertex;
