//! The SQL cosine scan must agree with `cosine_similarity`.

use crate::retriever::{ExactRetriever, Retriever};
use crate::similarity::cosine_similarity;
use crate::store::CorpusStore;
use crate::types::{Document, Embedding, Language, QueryVector};

#[cfg(test)]
mod tests {
    use super::*;

    fn document(id: &str, values: Vec<f64>) -> Document {
        Document {
            id: id.to_string(),
            title: id.to_string(),
            url: String::new(),
            content: id.to_string(),
            embedding: Embedding::new(values),
            source_language: Language::English,
        }
    }

    /// Small deterministic pseudo-random vectors.
    fn vector(seed: u64, dims: usize) -> Vec<f64> {
        let mut state = seed.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
        (0..dims)
            .map(|_| {
                state = state
                    .wrapping_mul(6364136223846793005)
                    .wrapping_add(1442695040888963407);
                ((state >> 33) as f64 / (1u64 << 31) as f64) - 0.5
            })
            .collect()
    }

    #[tokio::test]
    async fn test_sql_scores_match_reference() {
        let dims = 16;
        let docs: Vec<Document> = (0..25)
            .map(|i| document(&format!("doc{:02}", i), vector(i, dims)))
            .collect();

        let store = CorpusStore::open_in_memory().unwrap();
        store.insert_documents(&docs).unwrap();
        let retriever = ExactRetriever::new(store).unwrap();

        let query_values = vector(999, dims);
        let query = QueryVector {
            text: "q".to_string(),
            language: Language::English,
            embedding: Embedding::new(query_values.clone()),
        };

        let results = retriever.find_top_n(&query, docs.len()).await.unwrap();
        assert_eq!(results.len(), docs.len());

        let mut reference: Vec<(String, f64)> = docs
            .iter()
            .map(|d| {
                (
                    d.id.clone(),
                    cosine_similarity(&query_values, d.embedding.values()),
                )
            })
            .collect();
        reference.sort_by(|a, b| b.1.total_cmp(&a.1));

        for (got, want) in results.iter().zip(reference.iter()) {
            assert_eq!(got.document_id, want.0);
            assert!((got.similarity_score - want.1).abs() < 1e-9);
        }
    }

    #[test]
    fn test_reference_is_symmetric_and_bounded() {
        for seed in 0..20 {
            let a = vector(seed, 8);
            let b = vector(seed + 100, 8);
            let ab = cosine_similarity(&a, &b);
            let ba = cosine_similarity(&b, &a);
            assert!((ab - ba).abs() < 1e-12);
            assert!((-1.0..=1.0).contains(&ab));
        }
    }
}
