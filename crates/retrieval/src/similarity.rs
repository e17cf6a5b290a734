//! Vector similarity math shared by the retrievers and the merger.

/// Dot product of two equal-length vectors.
pub fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

/// Euclidean norm.
pub fn norm(v: &[f64]) -> f64 {
    v.iter().map(|x| x * x).sum::<f64>().sqrt()
}

/// Cosine similarity between two vectors, clamped to `[-1, 1]`.
///
/// Returns `0.0` when either vector has zero norm or the lengths differ;
/// a zero-norm document stays in the ranking with the neutral score.
pub fn cosine_similarity(a: &[f64], b: &[f64]) -> f64 {
    if a.len() != b.len() {
        return 0.0;
    }

    let norm_a = norm(a);
    let norm_b = norm(b);

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    (dot(a, b) / (norm_a * norm_b)).clamp(-1.0, 1.0)
}

/// Min-max normalize scores into `[0, 1]`. A constant list maps to all `1.0`.
pub fn min_max_normalize(scores: &[f64]) -> Vec<f64> {
    let Some(min) = scores.iter().copied().reduce(f64::min) else {
        return Vec::new();
    };
    let max = scores.iter().copied().fold(min, f64::max);
    let range = max - min;

    scores
        .iter()
        .map(|s| if range > 0.0 { (s - min) / range } else { 1.0 })
        .collect()
}
