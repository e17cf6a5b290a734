//! Answer generation boundary.
//!
//! Renders the prompt template around the context block and makes one
//! completion call with fixed sampling settings.

use crate::config::GenerationConfig;
use lingua_core::{AppError, AppResult};
use lingua_llm::{LlmClient, LlmRequest};
use lingua_prompt::{build_prompt, PromptDefinition};
use std::sync::Arc;
use tracing::{debug, instrument};

/// Produced answer plus what it cost.
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedAnswer {
    pub text: String,
    pub model: String,
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
}

pub struct AnswerGenerator {
    client: Arc<dyn LlmClient>,
    model: String,
    prompt: PromptDefinition,
    max_output_tokens: u32,
    temperature: f32,
}

impl AnswerGenerator {
    pub fn new(
        client: Arc<dyn LlmClient>,
        model: impl Into<String>,
        prompt: PromptDefinition,
        config: &GenerationConfig,
    ) -> Self {
        Self {
            client,
            model: model.into(),
            prompt,
            max_output_tokens: config.max_output_tokens,
            temperature: config.temperature,
        }
    }

    pub fn provider_name(&self) -> &str {
        self.client.provider_name()
    }

    /// Build the request without sending it.
    pub fn build_request(&self, context_block: &str, question: &str) -> AppResult<LlmRequest> {
        let built = build_prompt(&self.prompt, question, context_block)?;
        debug!(
            "Prompt '{}' rendered with {} context chars",
            built.metadata.source_prompt_id, built.metadata.context_chars
        );

        let mut request = LlmRequest::new(built.user, self.model.clone())
            .with_max_tokens(self.max_output_tokens)
            .with_temperature(self.temperature);
        if let Some(system) = built.system {
            request = request.with_system(system);
        }
        Ok(request)
    }

    #[instrument(skip(self, context_block, question), fields(provider = self.client.provider_name(), model = %self.model))]
    pub async fn generate(&self, context_block: &str, question: &str) -> AppResult<GeneratedAnswer> {
        let request = self.build_request(context_block, question)?;

        let response = self
            .client
            .complete(&request)
            .await
            .map_err(|e| AppError::GenerationService(e.to_string()))?;

        Ok(GeneratedAnswer {
            text: response.content,
            model: response.model,
            prompt_tokens: response.usage.prompt_tokens,
            completion_tokens: response.usage.completion_tokens,
        })
    }
}
