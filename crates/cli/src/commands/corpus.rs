//! Corpus command handler.
//!
//! Import scraped articles into the corpus store, export them back out, and
//! show what the store holds.

use clap::{Args, Subcommand};
use lingua_core::{config::AppConfig, AppError, AppResult};
use lingua_retrieval::{
    export_corpus, import_corpus, CorpusStore, EmbeddingClient, ExportFormat, ImportOptions,
    RagConfig,
};
use std::path::PathBuf;

/// Import, export and inspect the corpus
#[derive(Args, Debug)]
pub struct CorpusCommand {
    #[command(subcommand)]
    pub action: CorpusAction,
}

#[derive(Subcommand, Debug)]
pub enum CorpusAction {
    /// Import JSON / JSON Lines article files
    Import(CorpusImportCommand),
    /// Export every stored document
    Export(CorpusExportCommand),
    /// Show corpus statistics
    Stats(CorpusStatsCommand),
}

/// Import article files
#[derive(Args, Debug)]
pub struct CorpusImportCommand {
    /// Files or directories to import
    #[arg(required = true)]
    pub paths: Vec<PathBuf>,

    /// Compute embeddings for records that carry none
    #[arg(long)]
    pub embed: bool,

    /// Clear the store before importing
    #[arg(long)]
    pub reset: bool,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl CorpusImportCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing corpus import for {} paths", self.paths.len());

        let rag_config = RagConfig::from_app(config)?;
        let store = CorpusStore::open(&rag_config.store_path(&config.workspace))?;

        let embedder = if self.embed {
            Some(EmbeddingClient::from_config(&rag_config.embedding)?)
        } else {
            None
        };

        let options = ImportOptions {
            embed: self.embed,
            reset: self.reset,
        };
        let stats = import_corpus(&store, &self.paths, &options, embedder.as_ref()).await?;

        if self.json {
            print_json(&stats)?;
        } else {
            println!(
                "Imported {} of {} records from {} files ({} embedded, {} skipped) in {:.2}s",
                stats.imported,
                stats.records,
                stats.files,
                stats.embedded,
                stats.skipped,
                stats.duration_secs
            );
        }

        Ok(())
    }
}

/// Export stored documents
#[derive(Args, Debug)]
pub struct CorpusExportCommand {
    /// Output file
    pub out: PathBuf,

    /// Output format (jsonl, json)
    #[arg(long, default_value = "jsonl")]
    pub format: ExportFormat,
}

impl CorpusExportCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing corpus export to {:?}", self.out);

        let rag_config = RagConfig::from_app(config)?;
        let store = CorpusStore::open_read_only(&rag_config.store_path(&config.workspace))?;
        let count = export_corpus(&store, &self.out, self.format)?;

        println!("Exported {} documents to {}", count, self.out.display());
        Ok(())
    }
}

/// Show corpus statistics
#[derive(Args, Debug)]
pub struct CorpusStatsCommand {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl CorpusStatsCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing corpus stats command");

        let rag_config = RagConfig::from_app(config)?;
        let store = CorpusStore::open_read_only(&rag_config.store_path(&config.workspace))?;
        let stats = store.stats()?;

        if self.json {
            return print_json(&stats);
        }

        if let Some(path) = &stats.path {
            println!("Corpus: {}", path.display());
        }
        println!("  Documents: {}", stats.documents);
        for (language, count) in &stats.languages {
            println!("    {}: {}", language, count);
        }
        match stats.dimensions {
            Some(dimensions) => println!("  Dimensions: {}", dimensions),
            None => println!("  Dimensions: (empty corpus)"),
        }
        if let Some(model) = &stats.embedding_model {
            println!("  Embedding model: {}", model);
        }
        println!("  DB size: {} bytes", stats.db_size_bytes);
        if let Some(imported_at) = &stats.imported_at {
            println!("  Last import: {}", imported_at);
        }

        Ok(())
    }
}

impl CorpusCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        match &self.action {
            CorpusAction::Import(cmd) => cmd.execute(config).await,
            CorpusAction::Export(cmd) => cmd.execute(config).await,
            CorpusAction::Stats(cmd) => cmd.execute(config).await,
        }
    }
}

fn print_json(value: &impl serde::Serialize) -> AppResult<()> {
    let json =
        serde_json::to_string_pretty(value).map_err(|e| AppError::Serialization(e.to_string()))?;
    println!("{}", json);
    Ok(())
}
