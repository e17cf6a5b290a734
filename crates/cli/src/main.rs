//! Lingua CLI
//!
//! Cross-lingual question answering over a bilingual corpus.

mod commands;

use clap::{Parser, Subcommand};
use commands::{AskCommand, CorpusCommand};
use lingua_core::{config::AppConfig, logging, AppResult, Overrides};
use std::path::PathBuf;

/// Lingua - cross-lingual retrieval-augmented answers
#[derive(Parser, Debug)]
#[command(name = "lingua")]
#[command(about = "Answer questions from a bilingual corpus", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to workspace directory (default: current directory)
    #[arg(short, long, global = true, env = "LINGUA_WORKSPACE")]
    workspace: Option<PathBuf>,

    /// Path to config file
    #[arg(short, long, global = true, env = "LINGUA_CONFIG")]
    config: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, global = true, env = "RUST_LOG")]
    log_level: Option<String>,

    /// Enable verbose output (sets log level to debug)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Disable colored output
    #[arg(long, global = true, env = "NO_COLOR")]
    no_color: bool,

    /// Generation provider (claude, ollama)
    #[arg(short, long, global = true, env = "LINGUA_PROVIDER")]
    provider: Option<String>,

    /// Generation model identifier
    #[arg(short, long, global = true, env = "LINGUA_MODEL")]
    model: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Ask a question against the corpus
    Ask(AskCommand),

    /// Import, export and inspect the corpus
    Corpus(CorpusCommand),
}

#[tokio::main]
async fn main() -> AppResult<()> {
    let cli = Cli::parse();

    let config = AppConfig::load(Overrides {
        workspace: cli.workspace,
        config_file: cli.config,
        provider: cli.provider,
        model: cli.model,
        log_level: cli.log_level,
        verbose: cli.verbose,
        no_color: cli.no_color,
    })?;

    logging::init_logging(config.log_level.as_deref(), config.no_color)?;

    tracing::info!("Lingua CLI starting");
    tracing::debug!("Workspace: {:?}", config.workspace);
    tracing::debug!("Provider: {}", config.provider);
    tracing::debug!("Model: {}", config.model);

    config.ensure_lingua_dir()?;

    let command_name = match &cli.command {
        Commands::Ask(_) => "ask",
        Commands::Corpus(_) => "corpus",
    };
    let _span = tracing::info_span!("command", name = command_name).entered();

    let result = match cli.command {
        Commands::Ask(cmd) => cmd.execute(&config).await,
        Commands::Corpus(cmd) => cmd.execute(&config).await,
    };

    match &result {
        Ok(_) => tracing::info!("Command completed successfully"),
        Err(e) => tracing::error!("Command failed: {}", e),
    }

    result
}
