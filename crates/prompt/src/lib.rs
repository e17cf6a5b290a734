//! Prompt system for Lingua RAG answer generation.
//!
//! This crate provides:
//! - YAML-based prompt definitions (system instructions + user template)
//! - A built-in default used when the workspace defines none
//! - Handlebars rendering of the assembled context and the user question

pub mod builder;
pub mod loader;
pub mod types;

// Re-export main types
pub use builder::build_prompt;
pub use loader::{list_prompts, load_prompt, load_prompt_or_default, DEFAULT_PROMPT_ID};
pub use types::{BuiltPrompt, BuiltPromptMetadata, PromptDefinition, PromptOutputSpec};
