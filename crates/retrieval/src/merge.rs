//! Cross-lingual candidate merging.
//!
//! The primary pass (original query) and secondary pass (translated query)
//! each return a ranked list. Merging deduplicates by document id; a document
//! found by both passes is kept once, at its first position, with the higher
//! score and both origin languages.

use crate::config::MergePolicy;
use crate::similarity::min_max_normalize;
use crate::types::{Candidate, MergedCandidate, RetrievalPass};
use std::collections::HashMap;

/// Merge two ranked candidate lists under `policy`.
///
/// The result holds `primary.len() + secondary.len() - overlaps` entries.
pub fn merge_candidates(
    primary: &[Candidate],
    secondary: &[Candidate],
    policy: MergePolicy,
) -> Vec<MergedCandidate> {
    match policy {
        MergePolicy::Grouped => group(
            primary.iter().map(|c| (c, c.similarity_score)),
            secondary.iter().map(|c| (c, c.similarity_score)),
        ),
        MergePolicy::Normalized => {
            let primary_scores = normalized_scores(primary);
            let secondary_scores = normalized_scores(secondary);
            let mut merged = group(
                primary.iter().zip(primary_scores),
                secondary.iter().zip(secondary_scores),
            );
            // Stable, so equal scores keep grouped order.
            merged.sort_by(|a, b| b.score.total_cmp(&a.score));
            merged
        }
    }
}

fn normalized_scores(candidates: &[Candidate]) -> Vec<f64> {
    let raw: Vec<f64> = candidates.iter().map(|c| c.similarity_score).collect();
    min_max_normalize(&raw)
}

fn group<'a>(
    primary: impl Iterator<Item = (&'a Candidate, f64)>,
    secondary: impl Iterator<Item = (&'a Candidate, f64)>,
) -> Vec<MergedCandidate> {
    let mut merged: Vec<MergedCandidate> = Vec::new();
    let mut index: HashMap<&'a str, usize> = HashMap::new();

    let passes = primary
        .map(|(c, s)| (c, s, RetrievalPass::Primary))
        .chain(secondary.map(|(c, s)| (c, s, RetrievalPass::Secondary)));

    for (candidate, score, pass) in passes {
        match index.get(candidate.document_id.as_str()) {
            Some(&i) => {
                let existing = &mut merged[i];
                if score > existing.score {
                    existing.score = score;
                }
                if !existing.origin_languages.contains(&candidate.origin_language) {
                    existing
                        .origin_languages
                        .push(candidate.origin_language.clone());
                }
            }
            None => {
                index.insert(candidate.document_id.as_str(), merged.len());
                merged.push(MergedCandidate {
                    document_id: candidate.document_id.clone(),
                    score,
                    origin_languages: vec![candidate.origin_language.clone()],
                    pass,
                });
            }
        }
    }

    merged
}
