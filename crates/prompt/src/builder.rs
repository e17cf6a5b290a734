//! Prompt builder for rendering the answer-generation template.

use crate::types::{BuiltPrompt, BuiltPromptMetadata, PromptDefinition};
use handlebars::Handlebars;
use lingua_core::{AppError, AppResult};
use std::collections::HashMap;

/// Build a prompt from a definition, the assembled context block and the
/// user's question.
///
/// # Example
/// ```no_run
/// use lingua_prompt::{build_prompt, PromptDefinition};
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let def = PromptDefinition::builtin_default();
/// let built = build_prompt(&def, "What is a context block?", "Title: ...")?;
/// println!("User prompt: {}", built.user);
/// # Ok(())
/// # }
/// ```
pub fn build_prompt(
    definition: &PromptDefinition,
    question: &str,
    context: &str,
) -> AppResult<BuiltPrompt> {
    tracing::debug!("Building prompt: {}", definition.id);

    let mut variables = HashMap::new();
    variables.insert("context".to_string(), context.to_string());
    variables.insert("question".to_string(), question.to_string());

    let user = render_template(&definition.template, &variables)?;

    Ok(BuiltPrompt {
        system: definition.system.clone(),
        user,
        metadata: BuiltPromptMetadata {
            source_prompt_id: definition.id.clone(),
            context_chars: context.chars().count(),
            resolved_variables: variables,
        },
    })
}

/// Render a Handlebars template with variables.
fn render_template(template: &str, variables: &HashMap<String, String>) -> AppResult<String> {
    let mut handlebars = Handlebars::new();

    // Plain text prompts: document bodies may contain HTML
    handlebars.register_escape_fn(handlebars::no_escape);

    handlebars
        .register_template_string("prompt", template)
        .map_err(|e| AppError::Prompt(format!("Failed to register template: {}", e)))?;

    handlebars
        .render("prompt", variables)
        .map_err(|e| AppError::Prompt(format!("Failed to render template: {}", e)))
}
