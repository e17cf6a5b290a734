//! Vertex AI text-embedding provider.
//!
//! Calls the publisher model `:predict` REST endpoint, e.g. for
//! `text-multilingual-embedding-002` (768 dimensions, up to 250 instances per
//! request). Authentication uses a bearer token read from the environment
//! variable named by `embedding.access_token_env`.

use crate::embeddings::{EmbeddingConfig, EmbeddingProvider};
use crate::types::Embedding;
use lingua_core::{AppError, AppResult};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, instrument};

const REQUEST_TIMEOUT_SECS: u64 = 60;

#[derive(Debug, Clone)]
pub struct VertexProvider {
    client: Client,
    predict_url: String,
    model: String,
    dimensions: usize,
    access_token_env: String,
}

#[derive(Debug, Serialize)]
struct PredictRequest<'a> {
    instances: Vec<PredictInstance<'a>>,
}

#[derive(Debug, Serialize)]
struct PredictInstance<'a> {
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct PredictResponse {
    predictions: Vec<Prediction>,
}

#[derive(Debug, Deserialize)]
struct Prediction {
    embeddings: PredictionEmbeddings,
}

#[derive(Debug, Deserialize)]
struct PredictionEmbeddings {
    values: Vec<f64>,
}

impl VertexProvider {
    pub fn new(config: &EmbeddingConfig) -> AppResult<Self> {
        let project_id = config.project_id.as_deref().ok_or_else(|| {
            AppError::Config("embedding.project_id is required for the vertex provider".to_string())
        })?;

        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| {
                AppError::Config(format!("Failed to create HTTP client for Vertex AI: {}", e))
            })?;

        Ok(Self {
            client,
            predict_url: predict_url(config, project_id),
            model: config.model.clone(),
            dimensions: config.dimensions,
            access_token_env: config.access_token_env.clone(),
        })
    }

    fn access_token(&self) -> AppResult<String> {
        std::env::var(&self.access_token_env).map_err(|_| {
            AppError::EmbeddingService(format!(
                "Vertex AI access token not found in environment variable {}",
                self.access_token_env
            ))
        })
    }
}

fn predict_url(config: &EmbeddingConfig, project_id: &str) -> String {
    let host = config
        .endpoint
        .clone()
        .unwrap_or_else(|| format!("https://{}-aiplatform.googleapis.com", config.location));

    format!(
        "{}/v1/projects/{}/locations/{}/publishers/google/models/{}:predict",
        host.trim_end_matches('/'),
        project_id,
        config.location,
        config.model
    )
}

#[async_trait::async_trait]
impl EmbeddingProvider for VertexProvider {
    fn provider_name(&self) -> &str {
        "vertex"
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    #[instrument(skip(self, texts), fields(batch_size = texts.len(), provider = "vertex", model = %self.model))]
    async fn embed_batch(&self, texts: &[String]) -> AppResult<Vec<Embedding>> {
        let request = PredictRequest {
            instances: texts
                .iter()
                .map(|t| PredictInstance { content: t })
                .collect(),
        };

        let response = self
            .client
            .post(&self.predict_url)
            .bearer_auth(self.access_token()?)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                AppError::EmbeddingService(format!("Failed to call Vertex AI predict: {}", e))
            })?;

        let status = response.status();
        if !status.is_success() {
            let text = response
                .text()
                .await
                .unwrap_or_else(|_| "<body unavailable>".to_string());
            return Err(AppError::EmbeddingService(format!(
                "Vertex AI returned {}: {}",
                status, text
            )));
        }

        let body: PredictResponse = response.json().await.map_err(|e| {
            AppError::EmbeddingService(format!("Failed to parse Vertex AI response: {}", e))
        })?;

        debug!("Received {} predictions", body.predictions.len());

        Ok(body
            .predictions
            .into_iter()
            .map(|p| Embedding::new(p.embeddings.values))
            .collect())
    }
}
