//! Cosine similarity helpers shared by the semantic cache and chunk ranking

use std::cmp::Ordering;

/// Cosine similarity of two vectors
///
/// Returns `None` when the vectors are empty or differ in length. A zero-norm
/// vector has similarity 0.0 with everything.
pub fn cosine_similarity(query: &[f32], candidate: &[f32]) -> Option<f32> {
    if query.is_empty() || query.len() != candidate.len() {
        return None;
    }

    let mut dot = 0.0f32;
    let mut query_norm = 0.0f32;
    let mut candidate_norm = 0.0f32;
    for (q, c) in query.iter().zip(candidate) {
        dot += q * c;
        query_norm += q * q;
        candidate_norm += c * c;
    }

    let denom = query_norm.sqrt() * candidate_norm.sqrt();
    if denom <= f32::EPSILON {
        return Some(0.0);
    }

    Some(dot / denom)
}

/// Cosine distance (1 - similarity), in `[0, 2]`
pub fn cosine_distance(query: &[f32], candidate: &[f32]) -> Option<f32> {
    cosine_similarity(query, candidate).map(|similarity| 1.0 - similarity)
}

/// Rank candidates by similarity, highest first
///
/// Candidates with incompatible dimensions are skipped. The sort is stable,
/// so equal scores keep their input order.
pub fn rank_descending_by_cosine<'a, I>(query: &[f32], candidates: I) -> Vec<(usize, f32)>
where
    I: IntoIterator<Item = &'a [f32]>,
{
    let mut scores: Vec<(usize, f32)> = candidates
        .into_iter()
        .enumerate()
        .filter_map(|(idx, candidate)| cosine_similarity(query, candidate).map(|s| (idx, s)))
        .collect();

    scores.sort_by(|left, right| right.1.partial_cmp(&left.1).unwrap_or(Ordering::Equal));
    scores
}
