//! Prompt types for answer generation.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A prompt definition loaded from YAML.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptDefinition {
    /// Unique prompt identifier
    pub id: String,

    /// Human-readable title
    pub title: String,

    /// API version for schema evolution
    #[serde(rename = "apiVersion")]
    pub api_version: String,

    /// Creator identifier
    #[serde(rename = "createdBy", default)]
    pub created_by: String,

    /// System instructions sent alongside the rendered template
    #[serde(default)]
    pub system: Option<String>,

    /// User-message template with Handlebars syntax.
    /// Available variables: `context`, `question`.
    pub template: String,

    /// Output settings
    #[serde(default)]
    pub output: PromptOutputSpec,
}

impl PromptDefinition {
    /// The built-in answer prompt.
    pub fn builtin_default() -> Self {
        Self {
            id: crate::loader::DEFAULT_PROMPT_ID.to_string(),
            title: "Answer from retrieved context".to_string(),
            api_version: "1.0".to_string(),
            created_by: "lingua".to_string(),
            system: Some(
                "You are a knowledgeable expert who chats sincerely with the user. \
                 Stay warm, friendly and empathetic throughout the conversation. \
                 Answer in the language of the user's question."
                    .to_string(),
            ),
            template: "Context:\n{{context}}\n\nQuestion:\n{{question}}\n\nAnswer:".to_string(),
            output: PromptOutputSpec::default(),
        }
    }
}

/// Output settings for the prompt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptOutputSpec {
    /// Output format (e.g., "text", "markdown")
    pub format: String,
}

impl Default for PromptOutputSpec {
    fn default() -> Self {
        Self {
            format: "markdown".to_string(),
        }
    }
}

/// A fully built prompt ready for LLM execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuiltPrompt {
    /// System message (optional)
    pub system: Option<String>,

    /// User message (required)
    pub user: String,

    /// Metadata about the built prompt
    pub metadata: BuiltPromptMetadata,
}

/// Metadata about a built prompt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuiltPromptMetadata {
    /// Source prompt ID
    #[serde(rename = "sourcePromptId")]
    pub source_prompt_id: String,

    /// Size of the injected context block in characters
    #[serde(rename = "contextChars")]
    pub context_chars: usize,

    /// Template variables that were resolved
    #[serde(rename = "resolvedVariables")]
    pub resolved_variables: HashMap<String, String>,
}
