//! Exact cosine retrieval over the SQLite corpus.

use super::{validate_request, Retriever};
use crate::store::{self, CorpusStore};
use crate::types::{Candidate, QueryVector, ScoreKind};
use lingua_core::AppResult;
use tracing::{debug, instrument};

pub struct ExactRetriever {
    store: CorpusStore,
    dimensions: Option<usize>,
}

impl ExactRetriever {
    pub fn new(store: CorpusStore) -> AppResult<Self> {
        let dimensions = store.dimensions()?;
        Ok(Self { store, dimensions })
    }
}

#[async_trait::async_trait]
impl Retriever for ExactRetriever {
    fn name(&self) -> &str {
        "exact"
    }

    #[instrument(skip(self, query), fields(language = %query.language))]
    async fn find_top_n(&self, query: &QueryVector, n: usize) -> AppResult<Vec<Candidate>> {
        validate_request(query, n, self.dimensions)?;

        if self.dimensions.is_none() {
            debug!("Corpus is empty, nothing to retrieve");
            return Ok(Vec::new());
        }

        let embedding = query.embedding.clone();
        let rows = self
            .store
            .with_connection(move |conn| store::top_n_by_cosine(conn, &embedding, n))
            .await?;

        debug!(
            "Retrieved {} candidates (requested top-{}), scores: {:?}",
            rows.len(),
            n,
            rows.iter().map(|(_, s)| *s).collect::<Vec<_>>()
        );

        Ok(rows
            .into_iter()
            .map(|(document_id, similarity_score)| Candidate {
                document_id,
                similarity_score,
                origin_language: query.language.clone(),
                score_kind: ScoreKind::Cosine,
            })
            .collect())
    }
}
