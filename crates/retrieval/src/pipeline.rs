//! Query pipeline orchestration.
//!
//! question → translate → embed (both languages) → retrieve (both passes,
//! concurrently) → merge → assemble context → generate.
//!
//! Every external call runs under the configured deadline. Translation is the
//! only stage allowed to fail softly: the secondary pass is skipped and the
//! failure is reported in [`RagAnswer::warnings`].

use crate::config::{MergePolicy, RagConfig};
use crate::context::ContextAssembler;
use crate::embeddings::EmbeddingClient;
use crate::generator::AnswerGenerator;
use crate::merge::merge_candidates;
use crate::retriever::{create_retriever, Retriever};
use crate::store::{CorpusStore, DocumentLookup, META_EMBEDDING_MODEL};
use crate::translate::{create_translator, TranslatedQuery, Translator};
use crate::types::{Candidate, ContextBlock, Language, MergedCandidate, QueryVector};
use lingua_core::{AppConfig, AppError, AppResult};
use lingua_llm::create_client;
use lingua_prompt::load_prompt_or_default;
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Non-fatal problems encountered while answering.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PipelineWarning {
    /// Translation failed or came back empty; only the primary pass ran.
    TranslationFailed { reason: String },
}

impl std::fmt::Display for PipelineWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PipelineWarning::TranslationFailed { reason } => write!(
                f,
                "translation failed, answered from the original-language pass only: {}",
                reason
            ),
        }
    }
}

/// Per-query overrides.
#[derive(Debug, Clone, Default)]
pub struct AskOptions {
    pub n_primary: Option<usize>,
    pub n_secondary: Option<usize>,
}

/// Everything retrieved for a question, before generation.
#[derive(Debug, Clone, Serialize)]
pub struct Retrieval {
    pub question: String,
    pub query_language: Language,
    pub translated_query: Option<String>,
    pub primary: Vec<Candidate>,
    pub secondary: Vec<Candidate>,
    pub merged: Vec<MergedCandidate>,
    pub context: ContextBlock,
    pub warnings: Vec<PipelineWarning>,
}

/// Final result of one query.
#[derive(Debug, Clone, Serialize)]
pub struct RagAnswer {
    pub answer: String,
    pub model: String,
    pub retrieval: Retrieval,
    pub duration_secs: f64,
}

impl RagAnswer {
    pub fn warnings(&self) -> &[PipelineWarning] {
        &self.retrieval.warnings
    }
}

/// The collaborators a pipeline is built from.
pub struct PipelineComponents {
    pub embedder: EmbeddingClient,
    pub retriever: Arc<dyn Retriever>,
    pub translator: Option<Arc<dyn Translator>>,
    pub documents: Arc<dyn DocumentLookup + Send + Sync>,
    pub generator: AnswerGenerator,
}

pub struct RagPipeline {
    embedder: EmbeddingClient,
    retriever: Arc<dyn Retriever>,
    translator: Option<Arc<dyn Translator>>,
    documents: Arc<dyn DocumentLookup + Send + Sync>,
    generator: AnswerGenerator,
    assembler: ContextAssembler,
    n_primary: usize,
    n_secondary: usize,
    merge_policy: MergePolicy,
    timeout: Duration,
}

impl RagPipeline {
    pub fn new(components: PipelineComponents, config: &RagConfig) -> Self {
        Self {
            embedder: components.embedder,
            retriever: components.retriever,
            translator: components.translator,
            documents: components.documents,
            generator: components.generator,
            assembler: ContextAssembler::new(&config.context),
            n_primary: config.merge.n_primary,
            n_secondary: config.merge.n_secondary,
            merge_policy: config.merge.policy,
            timeout: config.pipeline.timeout(),
        }
    }

    /// Wire the production pipeline for a workspace.
    pub fn from_config(app: &AppConfig, config: &RagConfig) -> AppResult<Self> {
        app.validate()?;
        let store = CorpusStore::open_read_only(&config.store_path(&app.workspace))?;
        let embedder = EmbeddingClient::from_config(&config.embedding)?;
        check_corpus_compatibility(&store, &embedder)?;

        let retriever = create_retriever(config, store.clone())?;

        let translator = create_translator(&config.translation)?;

        let endpoint = app
            .get_provider_config(&app.provider)
            .and_then(|p| p.endpoint().map(str::to_string));
        let api_key = app.resolve_api_key(&app.provider);
        let client = create_client(
            &app.provider,
            endpoint.as_deref(),
            api_key.as_deref(),
            config.pipeline.timeout(),
        )?;
        let prompt = load_prompt_or_default(&app.workspace, &config.generation.prompt_id)?;
        let generator = AnswerGenerator::new(client, app.model.clone(), prompt, &config.generation);

        info!(
            "Pipeline ready: retriever={}, embedding={}, generator={}/{}",
            retriever.name(),
            embedder.model_name(),
            generator.provider_name(),
            app.model
        );

        Ok(Self::new(
            PipelineComponents {
                embedder,
                retriever,
                translator,
                documents: Arc::new(store),
                generator,
            },
            config,
        ))
    }

    /// Retrieve, merge and assemble context for a question.
    pub async fn retrieve(&self, question: &str, options: &AskOptions) -> AppResult<Retrieval> {
        let question = question.trim();
        if question.is_empty() {
            return Err(AppError::InvalidArgument(
                "question cannot be empty".to_string(),
            ));
        }

        let n_primary = options.n_primary.unwrap_or(self.n_primary);
        let n_secondary = options.n_secondary.unwrap_or(self.n_secondary);
        let mut query_language = Language::detect(question);
        let mut warnings = Vec::new();

        let translated = if n_secondary == 0 {
            None
        } else {
            self.translate(question, &mut warnings).await
        };

        if let Some(source) = translated
            .as_ref()
            .and_then(|t| t.source_language.clone())
        {
            query_language = source;
        }
        let translated_text = translated.map(|t| t.text);

        // A translation that echoes the question reuses the primary vector.
        let mut texts = vec![question.to_string()];
        if let Some(text) = translated_text.as_ref().filter(|t| t.as_str() != question) {
            texts.push(text.clone());
        }
        let mut vectors = self
            .deadline("embed", self.embedder.embed(&texts))
            .await?
            .into_iter();

        let primary_query = QueryVector {
            text: question.to_string(),
            language: query_language.clone(),
            embedding: vectors
                .next()
                .ok_or_else(|| AppError::EmbeddingService("no vector for query".to_string()))?,
        };
        let secondary_query = match translated_text.clone() {
            Some(text) => {
                let embedding = if text == question {
                    primary_query.embedding.clone()
                } else {
                    vectors.next().ok_or_else(|| {
                        AppError::EmbeddingService("no vector for translated query".to_string())
                    })?
                };
                Some(QueryVector {
                    text,
                    language: self.target_language(),
                    embedding,
                })
            }
            None => None,
        };

        let primary_pass = self.deadline(
            "retrieve",
            self.retriever.find_top_n(&primary_query, n_primary),
        );
        let secondary_pass = async {
            match &secondary_query {
                Some(query) => {
                    self.deadline("retrieve", self.retriever.find_top_n(query, n_secondary))
                        .await
                }
                None => Ok(Vec::new()),
            }
        };
        let (primary, secondary) = futures::join!(primary_pass, secondary_pass);
        let (primary, secondary) = (primary?, secondary?);

        let merged = merge_candidates(&primary, &secondary, self.merge_policy);
        debug!(
            "Merged {} primary + {} secondary into {} candidates",
            primary.len(),
            secondary.len(),
            merged.len()
        );

        let context = self.assemble(merged.clone()).await?;

        Ok(Retrieval {
            question: question.to_string(),
            query_language,
            translated_query: translated_text,
            primary,
            secondary,
            merged,
            context,
            warnings,
        })
    }

    /// Answer a question end to end.
    pub async fn ask(&self, question: &str, options: &AskOptions) -> AppResult<RagAnswer> {
        let start = Instant::now();
        let retrieval = self.retrieve(question, options).await?;

        if retrieval.context.is_empty() {
            warn!("No documents retrieved; generating without context");
        }

        let generated = self
            .deadline(
                "generate",
                self.generator
                    .generate(&retrieval.context.text, &retrieval.question),
            )
            .await?;

        let duration = start.elapsed();
        info!(
            "Answered in {:.2}s using {} context documents",
            duration.as_secs_f64(),
            retrieval.context.entries.len()
        );

        Ok(RagAnswer {
            answer: generated.text,
            model: generated.model,
            retrieval,
            duration_secs: duration.as_secs_f64(),
        })
    }

    /// Translate for the secondary pass; failures become warnings.
    ///
    /// Every question goes through the translator, whatever script it is
    /// written in. A question already in the target language comes back
    /// unchanged and the secondary pass searches with it.
    async fn translate(
        &self,
        question: &str,
        warnings: &mut Vec<PipelineWarning>,
    ) -> Option<TranslatedQuery> {
        let translator = self.translator.as_ref()?;

        match self.deadline("translate", translator.translate(question)).await {
            Ok(translated) if !translated.text.trim().is_empty() => Some(TranslatedQuery {
                text: translated.text.trim().to_string(),
                source_language: translated.source_language,
            }),
            Ok(_) => {
                warn!("Translation returned an empty string; skipping secondary pass");
                warnings.push(PipelineWarning::TranslationFailed {
                    reason: "empty translation".to_string(),
                });
                None
            }
            Err(e) => {
                warn!("Translation failed; skipping secondary pass: {}", e);
                warnings.push(PipelineWarning::TranslationFailed {
                    reason: e.to_string(),
                });
                None
            }
        }
    }

    fn target_language(&self) -> Language {
        self.translator
            .as_ref()
            .map(|t| t.target().clone())
            .unwrap_or(Language::English)
    }

    async fn assemble(&self, merged: Vec<MergedCandidate>) -> AppResult<ContextBlock> {
        let assembler = self.assembler.clone();
        let documents = Arc::clone(&self.documents);
        tokio::task::spawn_blocking(move || assembler.assemble(&merged, documents.as_ref()))
            .await
            .map_err(|e| AppError::Other(format!("Context assembly task failed: {}", e)))?
    }

    async fn deadline<T>(
        &self,
        operation: &str,
        call: impl Future<Output = AppResult<T>>,
    ) -> AppResult<T> {
        match tokio::time::timeout(self.timeout, call).await {
            Ok(result) => result,
            Err(_) => {
                warn!("{} exceeded {}s", operation, self.timeout.as_secs());
                Err(AppError::timeout(operation, self.timeout))
            }
        }
    }
}

/// Refuse to query a corpus embedded with a different model or size.
fn check_corpus_compatibility(store: &CorpusStore, embedder: &EmbeddingClient) -> AppResult<()> {
    if let Some(dimensions) = store.dimensions()? {
        if dimensions != embedder.dimensions() {
            return Err(AppError::Config(format!(
                "Dimension mismatch: corpus has {}, embedding.dimensions is {}",
                dimensions,
                embedder.dimensions()
            )));
        }
    }

    if let Some(model) = store.meta(META_EMBEDDING_MODEL)? {
        if model != embedder.model_name() {
            return Err(AppError::Config(format!(
                "Model mismatch: corpus embedded with '{}', configured '{}'",
                model,
                embedder.model_name()
            )));
        }
    }

    Ok(())
}
