//! End-to-end pipeline runs with a mock embedder, a static translator and a
//! recording LLM client.

use crate::config::{MergePolicy, RagConfig};
use crate::embeddings::providers::mock::MockProvider;
use crate::embeddings::{EmbeddingClient, EmbeddingProvider};
use crate::generator::AnswerGenerator;
use crate::pipeline::{AskOptions, PipelineComponents, PipelineWarning, RagPipeline};
use crate::retriever::ExactRetriever;
use crate::store::CorpusStore;
use crate::translate::StaticTranslator;
use crate::types::{Document, Embedding, Language, RetrievalPass};
use lingua_core::{AppError, AppResult};
use lingua_llm::{LlmClient, LlmRequest, LlmResponse, LlmUsage};
use lingua_prompt::PromptDefinition;
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[cfg(test)]
mod tests {
    use super::*;

    const DIMS: usize = 64;
    const QUESTION: &str = "經痛 怎麼辦";
    const TRANSLATION: &str = "period cramps remedy";
    const KOREAN: &str = "생리통 어떻게 해요";
    const FRENCH: &str = "remède contre les crampes menstruelles";

    #[derive(Default)]
    struct RecordingLlm {
        requests: Mutex<Vec<LlmRequest>>,
        delay: Option<Duration>,
    }

    #[async_trait::async_trait]
    impl LlmClient for RecordingLlm {
        fn provider_name(&self) -> &str {
            "recording"
        }

        async fn complete(&self, request: &LlmRequest) -> AppResult<LlmResponse> {
            self.requests.lock().unwrap().push(request.clone());
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            Ok(LlmResponse {
                content: "熱敷和休息通常有幫助。".to_string(),
                model: request.model.clone(),
                usage: LlmUsage::new(200, 12),
            })
        }
    }

    #[derive(Debug)]
    struct BrokenEmbedder;

    #[async_trait::async_trait]
    impl EmbeddingProvider for BrokenEmbedder {
        fn provider_name(&self) -> &str {
            "broken"
        }

        fn model_name(&self) -> &str {
            "broken-v1"
        }

        fn dimensions(&self) -> usize {
            DIMS
        }

        async fn embed_batch(&self, _texts: &[String]) -> AppResult<Vec<Embedding>> {
            Err(AppError::EmbeddingService("503 Service Unavailable".to_string()))
        }
    }

    async fn corpus() -> CorpusStore {
        let entries = [
            ("zh-cramps", "經痛", QUESTION, Language::Chinese),
            ("zh-cycle", "週期", "月經 週期 平均 二十八 天", Language::Chinese),
            ("en-cramps", "Cramps", TRANSLATION, Language::English),
            ("en-pms", "PMS", "premenstrual syndrome mood changes", Language::English),
            ("en-ovulation", "Ovulation", "ovulation happens mid cycle", Language::English),
        ];

        let provider = MockProvider::new(DIMS);
        let texts: Vec<String> = entries.iter().map(|e| e.2.to_string()).collect();
        let vectors = provider.embed_batch(&texts).await.unwrap();

        let docs: Vec<Document> = entries
            .iter()
            .zip(vectors)
            .map(|((id, title, content, language), embedding)| Document {
                id: id.to_string(),
                title: title.to_string(),
                url: format!("https://example.org/{}", id),
                content: content.to_string(),
                embedding,
                source_language: language.clone(),
            })
            .collect();

        let store = CorpusStore::open_in_memory().unwrap();
        store.insert_documents(&docs).unwrap();
        store
    }

    fn pipeline_with(
        store: CorpusStore,
        provider: Arc<dyn EmbeddingProvider>,
        translator: Option<StaticTranslator>,
        llm: Arc<RecordingLlm>,
        config: &RagConfig,
    ) -> RagPipeline {
        let components = PipelineComponents {
            embedder: EmbeddingClient::new(provider, 5, DIMS).unwrap(),
            retriever: Arc::new(ExactRetriever::new(store.clone()).unwrap()),
            translator: translator.map(|t| Arc::new(t) as Arc<dyn crate::translate::Translator>),
            documents: Arc::new(store),
            generator: AnswerGenerator::new(
                llm,
                "test-model",
                PromptDefinition::builtin_default(),
                &config.generation,
            ),
        };
        RagPipeline::new(components, config)
    }

    fn translator() -> StaticTranslator {
        StaticTranslator::new(Language::English).with(QUESTION, TRANSLATION)
    }

    #[tokio::test]
    async fn test_cross_lingual_answer() {
        let llm = Arc::new(RecordingLlm::default());
        let pipeline = pipeline_with(
            corpus().await,
            Arc::new(MockProvider::new(DIMS)),
            Some(translator()),
            llm.clone(),
            &RagConfig::default(),
        );

        let answer = pipeline.ask(QUESTION, &AskOptions::default()).await.unwrap();
        let retrieval = &answer.retrieval;

        assert_eq!(answer.answer, "熱敷和休息通常有幫助。");
        assert!(answer.warnings().is_empty());
        assert_eq!(retrieval.query_language, Language::Chinese);
        assert_eq!(retrieval.translated_query.as_deref(), Some(TRANSLATION));

        assert_eq!(retrieval.primary.len(), 2);
        assert_eq!(retrieval.secondary.len(), 3);
        assert_eq!(retrieval.primary[0].document_id, "zh-cramps");
        assert!((retrieval.primary[0].similarity_score - 1.0).abs() < 1e-9);
        assert_eq!(retrieval.secondary[0].document_id, "en-cramps");
        assert_eq!(retrieval.secondary[0].origin_language, Language::English);

        let overlaps = retrieval
            .secondary
            .iter()
            .filter(|s| retrieval.primary.iter().any(|p| p.document_id == s.document_id))
            .count();
        assert_eq!(retrieval.merged.len(), 2 + 3 - overlaps);
        assert_eq!(retrieval.merged[0].document_id, "zh-cramps");
        assert_eq!(retrieval.merged[0].pass, RetrievalPass::Primary);

        assert_eq!(retrieval.context.entries.len(), retrieval.merged.len());
        assert!(retrieval.context.text.starts_with("Title: 經痛\n"));

        let requests = llm.requests.lock().unwrap();
        assert_eq!(requests.len(), 1);
        assert!(requests[0].messages[0].content.contains(&retrieval.context.text));
        assert!(requests[0].messages[0].content.contains(QUESTION));
        assert_eq!(requests[0].max_tokens, Some(8192));
    }

    #[tokio::test]
    async fn test_translation_failure_degrades_to_primary_pass() {
        let pipeline = pipeline_with(
            corpus().await,
            Arc::new(MockProvider::new(DIMS)),
            Some(StaticTranslator::new(Language::English)),
            Arc::new(RecordingLlm::default()),
            &RagConfig::default(),
        );

        let answer = pipeline.ask(QUESTION, &AskOptions::default()).await.unwrap();

        assert!(answer.retrieval.secondary.is_empty());
        assert_eq!(answer.retrieval.merged.len(), 2);
        assert!(answer.retrieval.translated_query.is_none());
        assert!(matches!(
            answer.warnings(),
            [PipelineWarning::TranslationFailed { .. }]
        ));
    }

    #[tokio::test]
    async fn test_empty_translation_is_reported() {
        let pipeline = pipeline_with(
            corpus().await,
            Arc::new(MockProvider::new(DIMS)),
            Some(StaticTranslator::new(Language::English).with(QUESTION, "   ")),
            Arc::new(RecordingLlm::default()),
            &RagConfig::default(),
        );

        let retrieval = pipeline
            .retrieve(QUESTION, &AskOptions::default())
            .await
            .unwrap();
        assert!(retrieval.secondary.is_empty());
        assert_eq!(retrieval.warnings.len(), 1);
    }

    #[tokio::test]
    async fn test_query_in_target_language_runs_both_passes() {
        let pipeline = pipeline_with(
            corpus().await,
            Arc::new(MockProvider::new(DIMS)),
            Some(
                StaticTranslator::new(Language::English)
                    .with_source_language(Language::English)
                    .with(TRANSLATION, TRANSLATION),
            ),
            Arc::new(RecordingLlm::default()),
            &RagConfig::default(),
        );

        let retrieval = pipeline
            .retrieve(TRANSLATION, &AskOptions::default())
            .await
            .unwrap();
        assert_eq!(retrieval.query_language, Language::English);
        assert!(retrieval.warnings.is_empty());
        assert_eq!(retrieval.primary.len(), 2);
        assert_eq!(retrieval.secondary.len(), 3);
        assert_eq!(retrieval.primary[0].document_id, "en-cramps");
        assert_eq!(retrieval.secondary[0].document_id, "en-cramps");
        assert_eq!(retrieval.merged.len(), 3);
    }

    #[tokio::test]
    async fn test_korean_question_is_translated() {
        let pipeline = pipeline_with(
            corpus().await,
            Arc::new(MockProvider::new(DIMS)),
            Some(StaticTranslator::new(Language::English).with(KOREAN, TRANSLATION)),
            Arc::new(RecordingLlm::default()),
            &RagConfig::default(),
        );

        let retrieval = pipeline
            .retrieve(KOREAN, &AskOptions::default())
            .await
            .unwrap();
        assert_eq!(retrieval.query_language, Language::Other("ko".to_string()));
        assert_eq!(retrieval.translated_query.as_deref(), Some(TRANSLATION));
        assert!(retrieval.warnings.is_empty());
        assert_eq!(retrieval.secondary.len(), 3);
        assert_eq!(retrieval.secondary[0].document_id, "en-cramps");
        assert!((retrieval.secondary[0].similarity_score - 1.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_provider_detected_language_wins() {
        let pipeline = pipeline_with(
            corpus().await,
            Arc::new(MockProvider::new(DIMS)),
            Some(
                StaticTranslator::new(Language::English)
                    .with_source_language(Language::Other("fr".to_string()))
                    .with(FRENCH, TRANSLATION),
            ),
            Arc::new(RecordingLlm::default()),
            &RagConfig::default(),
        );

        let retrieval = pipeline
            .retrieve(FRENCH, &AskOptions::default())
            .await
            .unwrap();
        assert_eq!(retrieval.query_language, Language::Other("fr".to_string()));
        assert_eq!(retrieval.secondary[0].document_id, "en-cramps");
    }

    #[tokio::test]
    async fn test_untranslatable_non_chinese_question_warns() {
        let pipeline = pipeline_with(
            corpus().await,
            Arc::new(MockProvider::new(DIMS)),
            Some(translator()),
            Arc::new(RecordingLlm::default()),
            &RagConfig::default(),
        );

        let retrieval = pipeline
            .retrieve(KOREAN, &AskOptions::default())
            .await
            .unwrap();
        assert!(retrieval.secondary.is_empty());
        assert!(matches!(
            retrieval.warnings.as_slice(),
            [PipelineWarning::TranslationFailed { .. }]
        ));
    }

    #[tokio::test]
    async fn test_options_and_normalized_policy() {
        let mut config = RagConfig::default();
        config.merge.policy = MergePolicy::Normalized;
        let pipeline = pipeline_with(
            corpus().await,
            Arc::new(MockProvider::new(DIMS)),
            Some(translator()),
            Arc::new(RecordingLlm::default()),
            &config,
        );

        let options = AskOptions {
            n_primary: Some(1),
            n_secondary: Some(1),
        };
        let retrieval = pipeline.retrieve(QUESTION, &options).await.unwrap();
        assert_eq!(retrieval.primary.len(), 1);
        assert_eq!(retrieval.secondary.len(), 1);

        let ids: Vec<&str> = retrieval
            .merged
            .iter()
            .map(|m| m.document_id.as_str())
            .collect();
        assert_eq!(ids, vec!["zh-cramps", "en-cramps"]);
        assert!(retrieval.merged.iter().all(|m| m.score == 1.0));
    }

    #[tokio::test]
    async fn test_embedding_failure_aborts_query() {
        let llm = Arc::new(RecordingLlm::default());
        let pipeline = pipeline_with(
            corpus().await,
            Arc::new(BrokenEmbedder),
            Some(translator()),
            llm.clone(),
            &RagConfig::default(),
        );

        let err = pipeline
            .ask(QUESTION, &AskOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::EmbeddingService(_)));
        assert!(llm.requests.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_slow_generation_times_out() {
        let mut config = RagConfig::default();
        config.pipeline.timeout_secs = 1;
        let llm = Arc::new(RecordingLlm {
            delay: Some(Duration::from_secs(10)),
            ..Default::default()
        });
        let pipeline = pipeline_with(
            corpus().await,
            Arc::new(MockProvider::new(DIMS)),
            Some(translator()),
            llm,
            &config,
        );

        let err = pipeline
            .ask(QUESTION, &AskOptions::default())
            .await
            .unwrap_err();
        match err {
            AppError::Timeout { operation, .. } => assert_eq!(operation, "generate"),
            other => panic!("expected timeout, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_blank_question_rejected() {
        let pipeline = pipeline_with(
            corpus().await,
            Arc::new(MockProvider::new(DIMS)),
            None,
            Arc::new(RecordingLlm::default()),
            &RagConfig::default(),
        );

        let err = pipeline
            .ask("   ", &AskOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidArgument(_)));
    }
}
