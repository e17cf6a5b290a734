//! Approximate retrieval through a deployed nearest-neighbor index.
//!
//! Talks to the Vertex AI Vector Search `findNeighbors` REST method. Scores
//! are whatever distance the index reports and are tagged
//! [`ScoreKind::IndexDistance`]; they are not cosine similarities.

use super::{validate_request, Retriever};
use crate::config::RetrieverConfig;
use crate::types::{Candidate, QueryVector, ScoreKind};
use lingua_core::{AppError, AppResult};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, instrument};

const REQUEST_TIMEOUT_SECS: u64 = 30;

pub struct ApproximateRetriever {
    client: Client,
    url: String,
    deployed_index_id: String,
    access_token_env: String,
    dimensions: usize,
}

#[derive(Debug, Serialize)]
struct FindNeighborsRequest<'a> {
    deployed_index_id: &'a str,
    queries: Vec<NeighborQuery<'a>>,
}

#[derive(Debug, Serialize)]
struct NeighborQuery<'a> {
    datapoint: QueryDatapoint<'a>,
    neighbor_count: usize,
}

#[derive(Debug, Serialize)]
struct QueryDatapoint<'a> {
    feature_vector: &'a [f64],
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FindNeighborsResponse {
    #[serde(default)]
    nearest_neighbors: Vec<NearestNeighbors>,
}

#[derive(Debug, Deserialize)]
struct NearestNeighbors {
    #[serde(default)]
    neighbors: Vec<Neighbor>,
}

#[derive(Debug, Deserialize)]
struct Neighbor {
    datapoint: NeighborDatapoint,
    distance: Option<f64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct NeighborDatapoint {
    datapoint_id: String,
}

impl ApproximateRetriever {
    /// `dimensions` is the embedding size the index was built with.
    pub fn new(config: &RetrieverConfig, dimensions: usize) -> AppResult<Self> {
        let endpoint = config.index_endpoint.as_deref().ok_or_else(|| {
            AppError::Config("retriever.index_endpoint is required for approximate retrieval".to_string())
        })?;
        let index_endpoint_id = config.index_endpoint_id.as_deref().ok_or_else(|| {
            AppError::Config(
                "retriever.index_endpoint_id is required for approximate retrieval".to_string(),
            )
        })?;
        let deployed_index_id = config.deployed_index_id.clone().ok_or_else(|| {
            AppError::Config(
                "retriever.deployed_index_id is required for approximate retrieval".to_string(),
            )
        })?;

        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| AppError::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            url: find_neighbors_url(endpoint, index_endpoint_id),
            deployed_index_id,
            access_token_env: config.access_token_env.clone(),
            dimensions,
        })
    }
}

fn find_neighbors_url(endpoint: &str, index_endpoint_id: &str) -> String {
    let host = if endpoint.starts_with("http://") || endpoint.starts_with("https://") {
        endpoint.trim_end_matches('/').to_string()
    } else {
        format!("https://{}", endpoint.trim_end_matches('/'))
    };
    format!(
        "{}/v1/{}:findNeighbors",
        host,
        index_endpoint_id.trim_matches('/')
    )
}

/// A neighbor without a distance is a malformed response, not a zero score.
fn into_candidates(
    response: FindNeighborsResponse,
    query: &QueryVector,
    n: usize,
) -> AppResult<Vec<Candidate>> {
    response
        .nearest_neighbors
        .into_iter()
        .flat_map(|group| group.neighbors)
        .take(n)
        .map(|neighbor| match neighbor.distance {
            Some(distance) => Ok(Candidate {
                document_id: neighbor.datapoint.datapoint_id,
                similarity_score: distance,
                origin_language: query.language.clone(),
                score_kind: ScoreKind::IndexDistance,
            }),
            None => Err(AppError::RetrieverUnavailable(format!(
                "Neighbor '{}' has no distance",
                neighbor.datapoint.datapoint_id
            ))),
        })
        .collect()
}

#[async_trait::async_trait]
impl Retriever for ApproximateRetriever {
    fn name(&self) -> &str {
        "approximate"
    }

    #[instrument(skip(self, query), fields(language = %query.language, index = %self.deployed_index_id))]
    async fn find_top_n(&self, query: &QueryVector, n: usize) -> AppResult<Vec<Candidate>> {
        validate_request(query, n, Some(self.dimensions))?;

        let request = FindNeighborsRequest {
            deployed_index_id: &self.deployed_index_id,
            queries: vec![NeighborQuery {
                datapoint: QueryDatapoint {
                    feature_vector: query.embedding.values(),
                },
                neighbor_count: n,
            }],
        };

        let mut builder = self.client.post(&self.url).json(&request);
        if let Ok(token) = std::env::var(&self.access_token_env) {
            builder = builder.bearer_auth(token);
        }

        let response = builder.send().await.map_err(|e| {
            AppError::RetrieverUnavailable(format!("Index endpoint unreachable: {}", e))
        })?;

        let status = response.status();
        if !status.is_success() {
            let text = response
                .text()
                .await
                .unwrap_or_else(|_| "<body unavailable>".to_string());
            return Err(AppError::RetrieverUnavailable(format!(
                "Index endpoint returned {}: {}",
                status, text
            )));
        }

        let body: FindNeighborsResponse = response.json().await.map_err(|e| {
            AppError::RetrieverUnavailable(format!("Invalid findNeighbors response: {}", e))
        })?;

        let candidates = into_candidates(body, query, n)?;
        debug!("Index returned {} neighbors", candidates.len());
        Ok(candidates)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Embedding, Language};

    fn config(endpoint: &str) -> RetrieverConfig {
        RetrieverConfig {
            index_endpoint: Some(endpoint.to_string()),
            index_endpoint_id: Some(
                "projects/demo/locations/us-central1/indexEndpoints/699".to_string(),
            ),
            deployed_index_id: Some("articles_node".to_string()),
            ..Default::default()
        }
    }

    fn query(values: Vec<f64>) -> QueryVector {
        QueryVector {
            text: "q".to_string(),
            language: Language::English,
            embedding: Embedding::new(values),
        }
    }

    #[test]
    fn test_requires_index_settings() {
        let result = ApproximateRetriever::new(&RetrieverConfig::default(), 768);
        assert!(matches!(result, Err(AppError::Config(_))));
    }

    #[test]
    fn test_url_building() {
        assert_eq!(
            find_neighbors_url(
                "123.us-central1-456.vdb.vertexai.goog",
                "projects/demo/locations/us-central1/indexEndpoints/699"
            ),
            "https://123.us-central1-456.vdb.vertexai.goog/v1/projects/demo/locations/us-central1/indexEndpoints/699:findNeighbors"
        );
        assert_eq!(
            find_neighbors_url("http://localhost:9000/", "/projects/p/indexEndpoints/1/"),
            "http://localhost:9000/v1/projects/p/indexEndpoints/1:findNeighbors"
        );
    }

    #[test]
    fn test_request_shape() {
        let vector = [0.5, 0.25];
        let request = FindNeighborsRequest {
            deployed_index_id: "articles_node",
            queries: vec![NeighborQuery {
                datapoint: QueryDatapoint {
                    feature_vector: &vector,
                },
                neighbor_count: 5,
            }],
        };
        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            serde_json::json!({
                "deployed_index_id": "articles_node",
                "queries": [{"datapoint": {"feature_vector": [0.5, 0.25]}, "neighbor_count": 5}]
            })
        );
    }

    #[test]
    fn test_response_mapping() {
        let raw = r#"{
            "nearestNeighbors": [{
                "id": "0",
                "neighbors": [
                    {"datapoint": {"datapointId": "talk_yiwu_io.12"}, "distance": 0.91},
                    {"datapoint": {"datapointId": "helloclue_com.pms"}, "distance": 0.84},
                    {"datapoint": {"datapointId": "extra"}, "distance": 0.10}
                ]
            }]
        }"#;
        let response: FindNeighborsResponse = serde_json::from_str(raw).unwrap();
        let candidates = into_candidates(response, &query(vec![1.0]), 2).unwrap();

        assert_eq!(candidates.len(), 2);
        assert_eq!(candidates[0].document_id, "talk_yiwu_io.12");
        assert!((candidates[0].similarity_score - 0.91).abs() < 1e-12);
        assert_eq!(candidates[1].score_kind, ScoreKind::IndexDistance);
        assert_eq!(candidates[1].origin_language, Language::English);
    }

    #[test]
    fn test_empty_response() {
        let response: FindNeighborsResponse = serde_json::from_str("{}").unwrap();
        assert!(into_candidates(response, &query(vec![1.0]), 3)
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_missing_distance_is_rejected() {
        let raw = r#"{
            "nearestNeighbors": [{
                "neighbors": [
                    {"datapoint": {"datapointId": "a"}, "distance": 0.7},
                    {"datapoint": {"datapointId": "b"}}
                ]
            }]
        }"#;
        let response: FindNeighborsResponse = serde_json::from_str(raw).unwrap();
        let err = into_candidates(response, &query(vec![1.0]), 5).unwrap_err();
        assert!(matches!(err, AppError::RetrieverUnavailable(ref m) if m.contains("'b'")));
    }

    #[tokio::test]
    async fn test_invalid_arguments_fail_before_network() {
        let retriever = ApproximateRetriever::new(&config("http://127.0.0.1:9"), 2).unwrap();

        let err = retriever.find_top_n(&query(vec![1.0, 0.0]), 0).await.unwrap_err();
        assert!(matches!(err, AppError::InvalidArgument(_)));

        let err = retriever.find_top_n(&query(vec![1.0]), 1).await.unwrap_err();
        assert!(matches!(err, AppError::InvalidArgument(_)));
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_unavailable() {
        let retriever = ApproximateRetriever::new(&config("http://127.0.0.1:9"), 2).unwrap();
        let err = retriever.find_top_n(&query(vec![1.0, 0.0]), 1).await.unwrap_err();
        assert!(matches!(err, AppError::RetrieverUnavailable(_)));
    }
}
