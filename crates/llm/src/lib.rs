//! Answer-generation client crate for Lingua RAG.
//!
//! This crate provides a provider-agnostic abstraction over the LLM that
//! writes the final answer. Providers are selected by name through
//! [`create_client`].
//!
//! # Providers
//! - **Claude**: Anthropic Messages API (default)
//! - **Ollama**: local LLM runtime
//!
//! # Example
//! ```no_run
//! use lingua_llm::{LlmClient, LlmRequest, providers::OllamaClient};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = OllamaClient::new();
//! let request = LlmRequest::new("Hello, world!", "llama3.2");
//! let response = client.complete(&request).await?;
//! println!("{}", response.content);
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod factory;
pub mod providers;
pub mod types;

// Re-export main types
pub use client::{LlmClient, LlmMessage, LlmRequest, LlmResponse, LlmUsage, Role};
pub use factory::create_client;
pub use providers::{ClaudeClient, OllamaClient};
pub use types::ProviderType;
