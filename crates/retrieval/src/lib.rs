//! Cross-lingual retrieval-augmented answering.
//!
//! Embeds a question and its translation, retrieves nearest documents for
//! both from the corpus, merges the two candidate lists, assembles a bounded
//! context block and hands it to the answer generator.

pub mod config;
pub mod context;
pub mod corpus;
pub mod embeddings;
pub mod generator;
pub mod ids;
pub mod merge;
pub mod pipeline;
pub mod retriever;
pub mod similarity;
pub mod store;
pub mod translate;
pub mod types;

#[cfg(test)]
mod tests;

// Re-export commonly used types
pub use config::{
    ContextConfig, GenerationConfig, MergeConfig, MergePolicy, OverflowPolicy, PipelineConfig,
    RagConfig, RetrieverConfig, RetrieverKind, TranslationConfig, TranslationProvider,
};
pub use context::ContextAssembler;
pub use corpus::{export_corpus, import_corpus, ExportFormat, ImportOptions, ImportStats};
pub use embeddings::{EmbeddingClient, EmbeddingConfig, EmbeddingProvider};
pub use generator::{AnswerGenerator, GeneratedAnswer};
pub use merge::merge_candidates;
pub use pipeline::{AskOptions, PipelineComponents, PipelineWarning, RagAnswer, RagPipeline, Retrieval};
pub use retriever::{create_retriever, ApproximateRetriever, ExactRetriever, Retriever};
pub use similarity::cosine_similarity;
pub use store::{CorpusStats, CorpusStore, DocumentLookup};
pub use translate::{
    create_translator, GoogleTranslator, StaticTranslator, TranslatedQuery, Translator,
};
pub use types::{
    Candidate, ContextBlock, ContextEntry, Document, Embedding, Language, MergedCandidate,
    QueryVector, RetrievalPass, ScoreKind,
};
