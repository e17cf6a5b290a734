//! Configuration management for Lingua RAG.
//!
//! This module handles loading and merging configuration from multiple sources:
//! - Environment variables
//! - Command-line flags
//! - Config files (.lingua/config.yaml)
//!
//! The `rag:` section of the config file is kept as raw YAML here and parsed
//! by the retrieval crate, which owns the pipeline settings.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::error::{AppError, AppResult};

/// Main application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Path to the workspace root (contains .lingua/)
    pub workspace: PathBuf,

    /// Optional config file path
    pub config_file: Option<PathBuf>,

    /// Answer-generation provider (e.g., "claude", "ollama")
    pub provider: String,

    /// Answer-generation model identifier
    pub model: String,

    /// API key for the generation provider
    pub api_key: Option<String>,

    /// Log level override
    pub log_level: Option<String>,

    /// Verbose mode (enables debug logging)
    pub verbose: bool,

    /// Disable colored output
    pub no_color: bool,

    /// LLM provider configurations
    pub llm: Option<LlmConfig>,

    /// Raw `rag:` section, parsed by `lingua-retrieval`
    #[serde(default)]
    pub rag: Option<serde_yaml::Value>,
}

/// LLM configuration from config.yaml.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    #[serde(rename = "activeProvider")]
    pub active_provider: String,

    pub providers: HashMap<String, ProviderConfig>,
}

/// Provider-specific configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ProviderConfig {
    Claude {
        #[serde(rename = "apiKeyEnv")]
        api_key_env: String,
        model: String,
        endpoint: Option<String>,
    },
    Ollama { endpoint: String, model: String },
}

impl ProviderConfig {
    /// Custom endpoint for this provider, if any.
    pub fn endpoint(&self) -> Option<&str> {
        match self {
            ProviderConfig::Claude { endpoint, .. } => endpoint.as_deref(),
            ProviderConfig::Ollama { endpoint, .. } => Some(endpoint.as_str()),
        }
    }
}

/// Values given on the command line.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub workspace: Option<PathBuf>,
    pub config_file: Option<PathBuf>,
    pub provider: Option<String>,
    pub model: Option<String>,
    pub log_level: Option<String>,
    /// Implies `debug` logging unless a level is set
    pub verbose: bool,
    pub no_color: bool,
}

/// Full configuration file structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct ConfigFile {
    llm: Option<LlmConfig>,
    workspace: Option<WorkspaceConfig>,
    logging: Option<LoggingConfig>,
    rag: Option<serde_yaml::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct WorkspaceConfig {
    path: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct LoggingConfig {
    level: Option<String>,
    color: Option<bool>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            workspace: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            config_file: None,
            provider: "claude".to_string(),
            model: "claude-3-5-sonnet-20241022".to_string(),
            api_key: None,
            log_level: None,
            verbose: false,
            no_color: false,
            llm: None,
            rag: None,
        }
    }
}

impl AppConfig {
    /// Load configuration from environment variables and defaults.
    ///
    /// Environment variables:
    /// - `LINGUA_WORKSPACE`: Override workspace path
    /// - `LINGUA_CONFIG`: Path to config file
    /// - `LINGUA_PROVIDER`: Generation provider
    /// - `LINGUA_MODEL`: Generation model identifier
    /// - `LINGUA_API_KEY`: API key
    /// - `RUST_LOG`: Log level
    /// - `NO_COLOR`: Disable colored output
    ///
    /// Workspace and config-file flags in `overrides` pick the YAML file that
    /// is read; the remaining flags are applied last.
    pub fn load(overrides: Overrides) -> AppResult<Self> {
        let mut config = Self::default();

        if let Ok(workspace) = std::env::var("LINGUA_WORKSPACE") {
            config.workspace = PathBuf::from(workspace);
        }

        if let Ok(config_file) = std::env::var("LINGUA_CONFIG") {
            config.config_file = Some(PathBuf::from(config_file));
        }

        if let Some(ref workspace) = overrides.workspace {
            config.workspace = workspace.clone();
        }
        if let Some(ref config_file) = overrides.config_file {
            config.config_file = Some(config_file.clone());
        }

        if !config.workspace.exists() {
            return Err(AppError::Config(format!(
                "Workspace directory does not exist: {:?}",
                config.workspace
            )));
        }

        let config_path = config.config_path();
        if config_path.exists() {
            config = config.merge_yaml(&config_path)?;
        }

        // Environment variables override YAML config
        if let Ok(provider) = std::env::var("LINGUA_PROVIDER") {
            config.provider = provider;
        }

        if let Ok(model) = std::env::var("LINGUA_MODEL") {
            config.model = model;
        }

        config.api_key = std::env::var("LINGUA_API_KEY").ok();
        config.log_level = std::env::var("RUST_LOG").ok();

        if std::env::var("NO_COLOR").is_ok() {
            config.no_color = true;
        }

        Ok(config.with_overrides(overrides))
    }

    /// Path of the YAML config file in effect.
    pub fn config_path(&self) -> PathBuf {
        match self.config_file {
            Some(ref cf) => cf.clone(),
            None => self.lingua_dir().join("config.yaml"),
        }
    }

    /// Merge YAML configuration file into this config.
    fn merge_yaml(&self, path: &Path) -> AppResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            AppError::Config(format!("Failed to read config file {:?}: {}", path, e))
        })?;

        let config_file: ConfigFile = serde_yaml::from_str(&contents).map_err(|e| {
            AppError::Config(format!("Failed to parse config file {:?}: {}", path, e))
        })?;

        let mut result = self.clone();

        if let Some(path) = config_file.workspace.and_then(|ws| ws.path) {
            result.workspace = PathBuf::from(path);
        }

        if let Some(logging) = config_file.logging {
            if let Some(level) = logging.level {
                result.log_level = Some(level);
            }
            if let Some(color) = logging.color {
                result.no_color = !color;
            }
        }

        if let Some(llm) = config_file.llm {
            result.provider = llm.active_provider.clone();

            if let Some(provider_config) = llm.providers.get(&llm.active_provider) {
                result.model = match provider_config {
                    ProviderConfig::Claude { model, .. } => model.clone(),
                    ProviderConfig::Ollama { model, .. } => model.clone(),
                };
            }

            result.llm = Some(llm);
        }

        result.rag = config_file.rag;

        Ok(result)
    }

    /// Apply command-line overrides. Flags win over the environment and the
    /// config file.
    pub fn with_overrides(mut self, overrides: Overrides) -> Self {
        let Overrides {
            workspace,
            config_file,
            provider,
            model,
            log_level,
            verbose,
            no_color,
        } = overrides;

        self.workspace = workspace.unwrap_or(self.workspace);
        self.config_file = config_file.or(self.config_file);
        self.provider = provider.unwrap_or(self.provider);
        self.model = model.unwrap_or(self.model);
        self.log_level = log_level.or(self.log_level);

        if verbose {
            self.verbose = true;
            self.log_level.get_or_insert_with(|| "debug".to_string());
        }
        self.no_color |= no_color;

        self
    }

    /// Get the path to the .lingua directory.
    pub fn lingua_dir(&self) -> PathBuf {
        self.workspace.join(".lingua")
    }

    /// Ensure the .lingua directory exists.
    pub fn ensure_lingua_dir(&self) -> AppResult<()> {
        let lingua_dir = self.lingua_dir();
        if !lingua_dir.exists() {
            std::fs::create_dir_all(&lingua_dir).map_err(|e| {
                AppError::Config(format!("Failed to create .lingua directory: {}", e))
            })?;
        }
        Ok(())
    }

    /// Get the configuration for a named provider.
    pub fn get_provider_config(&self, provider: &str) -> Option<ProviderConfig> {
        self.llm
            .as_ref()
            .and_then(|llm| llm.providers.get(provider).cloned())
    }

    /// Resolve the API key for a provider.
    ///
    /// `LINGUA_API_KEY` wins; otherwise the env var named by the provider config,
    /// then `ANTHROPIC_API_KEY` for Claude.
    pub fn resolve_api_key(&self, provider: &str) -> Option<String> {
        if let Some(ref key) = self.api_key {
            return Some(key.clone());
        }

        if let Some(ProviderConfig::Claude { api_key_env, .. }) = self.get_provider_config(provider)
        {
            if let Ok(key) = std::env::var(&api_key_env) {
                return Some(key);
            }
        }

        if matches!(provider, "claude" | "anthropic") {
            return std::env::var("ANTHROPIC_API_KEY").ok();
        }

        None
    }

    /// Validate configuration for the active provider.
    pub fn validate(&self) -> AppResult<()> {
        let provider = &self.provider;
        let known_providers = ["claude", "anthropic", "ollama"];

        if !known_providers.contains(&provider.as_str()) {
            return Err(AppError::Config(format!(
                "Unknown provider: {}. Supported: {}",
                provider,
                known_providers.join(", ")
            )));
        }

        if matches!(provider.as_str(), "claude" | "anthropic")
            && self.resolve_api_key(provider).is_none()
        {
            return Err(AppError::Config(
                "Claude provider requires an API key (LINGUA_API_KEY, ANTHROPIC_API_KEY or apiKeyEnv)"
                    .to_string(),
            ));
        }

        Ok(())
    }
}
