//! Retrieval pipeline configuration.
//!
//! Read from the `rag:` key of `.lingua/config.yaml`. Every section and field
//! has a default; endpoints that have no sensible default are checked only
//! when the component that needs them is built.

use crate::embeddings::EmbeddingConfig;
use lingua_core::{AppConfig, AppError, AppResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// File name of the SQLite corpus store inside `.lingua/`.
pub const CORPUS_FILE: &str = "corpus.sqlite";

/// Complete retrieval configuration, one field per YAML section.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RagConfig {
    #[serde(default)]
    pub embedding: EmbeddingConfig,

    #[serde(default)]
    pub retriever: RetrieverConfig,

    #[serde(default)]
    pub translation: TranslationConfig,

    #[serde(default)]
    pub merge: MergeConfig,

    #[serde(default)]
    pub context: ContextConfig,

    #[serde(default)]
    pub generation: GenerationConfig,

    #[serde(default)]
    pub pipeline: PipelineConfig,
}

/// Which similarity backend answers `find_top_n`.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RetrieverKind {
    #[default]
    Exact,
    Approximate,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RetrieverConfig {
    #[serde(default)]
    pub kind: RetrieverKind,

    /// Corpus store path; relative paths resolve against the workspace.
    /// Defaults to `.lingua/corpus.sqlite`.
    #[serde(default)]
    pub store_path: Option<PathBuf>,

    /// Public endpoint host of the nearest-neighbor index
    #[serde(default)]
    pub index_endpoint: Option<String>,

    /// Resource path `projects/<p>/locations/<l>/indexEndpoints/<id>`
    #[serde(default)]
    pub index_endpoint_id: Option<String>,

    #[serde(default)]
    pub deployed_index_id: Option<String>,

    /// Environment variable holding the bearer token for the index
    #[serde(default = "default_token_env")]
    pub access_token_env: String,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TranslationProvider {
    #[default]
    Google,
    /// Disable translation; only the primary pass runs.
    None,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TranslationConfig {
    #[serde(default)]
    pub provider: TranslationProvider,

    /// Language the query is translated into for the secondary pass
    #[serde(default = "default_target_language")]
    pub target_language: String,

    #[serde(default = "default_translate_key_env")]
    pub api_key_env: String,

    #[serde(default)]
    pub endpoint: Option<String>,
}

impl Default for TranslationConfig {
    fn default() -> Self {
        Self {
            provider: TranslationProvider::default(),
            target_language: default_target_language(),
            api_key_env: default_translate_key_env(),
            endpoint: None,
        }
    }
}

/// How primary and secondary candidates are combined.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MergePolicy {
    /// Primary hits first, then new secondary hits, raw scores
    #[default]
    Grouped,
    /// Per-pass min-max normalization, then one global ordering
    Normalized,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MergeConfig {
    #[serde(default = "default_n_primary")]
    pub n_primary: usize,

    #[serde(default = "default_n_secondary")]
    pub n_secondary: usize,

    #[serde(default)]
    pub policy: MergePolicy,
}

impl Default for MergeConfig {
    fn default() -> Self {
        Self {
            n_primary: default_n_primary(),
            n_secondary: default_n_secondary(),
            policy: MergePolicy::default(),
        }
    }
}

/// What happens to the document that crosses the context budget.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum OverflowPolicy {
    #[default]
    Truncate,
    Drop,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ContextConfig {
    /// Budget in Unicode scalar values; `null` disables the bound.
    #[serde(default = "default_max_chars")]
    pub max_chars: Option<usize>,

    #[serde(default)]
    pub overflow: OverflowPolicy,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            max_chars: default_max_chars(),
            overflow: OverflowPolicy::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GenerationConfig {
    #[serde(default = "default_prompt_id")]
    pub prompt_id: String,

    #[serde(default = "default_max_output_tokens")]
    pub max_output_tokens: u32,

    #[serde(default = "default_temperature")]
    pub temperature: f32,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            prompt_id: default_prompt_id(),
            max_output_tokens: default_max_output_tokens(),
            temperature: default_temperature(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PipelineConfig {
    /// Deadline applied to every external call
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl PipelineConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

fn default_token_env() -> String {
    "GOOGLE_ACCESS_TOKEN".to_string()
}

fn default_target_language() -> String {
    "en".to_string()
}

fn default_translate_key_env() -> String {
    "GOOGLE_TRANSLATE_API_KEY".to_string()
}

fn default_n_primary() -> usize {
    2
}

fn default_n_secondary() -> usize {
    3
}

fn default_max_chars() -> Option<usize> {
    Some(24_000)
}

fn default_prompt_id() -> String {
    lingua_prompt::DEFAULT_PROMPT_ID.to_string()
}

fn default_max_output_tokens() -> u32 {
    8192
}

fn default_temperature() -> f32 {
    0.6
}

fn default_timeout_secs() -> u64 {
    45
}

impl RagConfig {
    /// Parse the `rag:` section carried by the application config.
    pub fn from_app(app: &AppConfig) -> AppResult<Self> {
        let config = match &app.rag {
            Some(value) => serde_yaml::from_value(value.clone()).map_err(|e| {
                AppError::Config(format!("Invalid rag configuration: {}", e))
            })?,
            None => {
                tracing::debug!("No rag section in config, using defaults");
                RagConfig::default()
            }
        };

        config.validate()?;
        Ok(config)
    }

    /// Parse a standalone YAML document shaped like the `rag:` section.
    pub fn from_yaml_str(yaml: &str) -> AppResult<Self> {
        let config: RagConfig = serde_yaml::from_str(yaml)
            .map_err(|e| AppError::Config(format!("Invalid rag configuration: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> AppResult<()> {
        self.embedding.validate()?;

        if self.merge.n_primary == 0 {
            return Err(AppError::Config(
                "merge.n_primary must be at least 1".to_string(),
            ));
        }

        if self.pipeline.timeout_secs == 0 {
            return Err(AppError::Config(
                "pipeline.timeout_secs must be at least 1".to_string(),
            ));
        }

        if !(0.0..=2.0).contains(&self.generation.temperature) {
            return Err(AppError::Config(format!(
                "generation.temperature must be within [0, 2], got {}",
                self.generation.temperature
            )));
        }

        Ok(())
    }

    /// Resolve the corpus store path against a workspace root.
    pub fn store_path(&self, workspace: &Path) -> PathBuf {
        match &self.retriever.store_path {
            Some(path) if path.is_absolute() => path.clone(),
            Some(path) => workspace.join(path),
            None => workspace.join(".lingua").join(CORPUS_FILE),
        }
    }
}
