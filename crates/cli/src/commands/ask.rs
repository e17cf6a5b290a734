//! Ask command handler.
//!
//! Runs the cross-lingual pipeline for one question, or for each line read
//! from stdin in interactive mode.

use clap::Args;
use lingua_core::{config::AppConfig, AppError, AppResult};
use lingua_retrieval::{AskOptions, RagAnswer, RagConfig, RagPipeline};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

/// Ask a question against the corpus
#[derive(Args, Debug)]
pub struct AskCommand {
    /// The question to ask
    #[arg(required_unless_present = "interactive")]
    pub question: Option<String>,

    /// Read questions from stdin until "quit"
    #[arg(short, long)]
    pub interactive: bool,

    /// Documents retrieved for the original question
    #[arg(long)]
    pub top_primary: Option<usize>,

    /// Documents retrieved for the translated question (0 disables translation)
    #[arg(long)]
    pub top_secondary: Option<usize>,

    /// Print the assembled context before the answer
    #[arg(long)]
    pub show_context: bool,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl AskCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing ask command");
        tracing::debug!("Ask command options: {:?}", self);

        let rag_config = RagConfig::from_app(config)?;
        let pipeline = RagPipeline::from_config(config, &rag_config)?;

        let options = AskOptions {
            n_primary: self.top_primary,
            n_secondary: self.top_secondary,
        };

        if self.interactive {
            return self.interactive_loop(&pipeline, &options).await;
        }

        let question = self
            .question
            .as_deref()
            .ok_or_else(|| AppError::InvalidArgument("No question provided".to_string()))?;
        let answer = pipeline.ask(question, &options).await?;
        self.print_answer(&answer)
    }

    async fn interactive_loop(&self, pipeline: &RagPipeline, options: &AskOptions) -> AppResult<()> {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        let mut stdout = tokio::io::stdout();

        loop {
            stdout.write_all("問題 / question> ".as_bytes()).await?;
            stdout.flush().await?;

            let Some(line) = lines.next_line().await? else {
                break;
            };
            let question = line.trim();
            if question.eq_ignore_ascii_case("quit") || question.eq_ignore_ascii_case("exit") {
                break;
            }
            if question.is_empty() {
                continue;
            }

            // One bad question should not end the session.
            match pipeline.ask(question, options).await {
                Ok(answer) => self.print_answer(&answer)?,
                Err(e) => eprintln!("Error: {}", e),
            }
        }

        Ok(())
    }

    fn print_answer(&self, answer: &RagAnswer) -> AppResult<()> {
        for warning in answer.warnings() {
            eprintln!("Warning: {}", warning);
        }

        if self.json {
            let json = serde_json::to_string_pretty(answer)
                .map_err(|e| AppError::Serialization(e.to_string()))?;
            println!("{}", json);
            return Ok(());
        }

        let retrieval = &answer.retrieval;
        if self.show_context {
            println!("Context ({} documents):", retrieval.context.entries.len());
            println!("{}", retrieval.context.text);
            println!();
        }

        println!("{}", answer.answer);
        println!();

        if retrieval.context.is_empty() {
            println!("Sources: (no documents retrieved)");
        } else {
            println!("Sources:");
            for entry in &retrieval.context.entries {
                println!("- {} ({})", entry.title, entry.url);
            }
        }

        tracing::debug!(
            "Answered with {} in {:.2}s ({} primary, {} secondary, {} merged)",
            answer.model,
            answer.duration_secs,
            retrieval.primary.len(),
            retrieval.secondary.len(),
            retrieval.merged.len()
        );

        Ok(())
    }
}
