//! Similarity computation for embeddings.

use std::cmp::Reverse;

use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};

/// Compute the cosine similarity between two embeddings.
///
/// Returns a value between -1.0 and 1.0, where:
/// - 1.0 means identical direction
/// - 0.0 means orthogonal vectors
/// - -1.0 means opposite vectors
///
/// Vectors of different lengths, empty vectors, and zero-norm vectors all
/// score 0.0 instead of failing.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;

    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    // Rounding can push identical unit vectors a hair past 1.0.
    (dot / (norm_a.sqrt() * norm_b.sqrt())).clamp(-1.0, 1.0)
}

/// A similarity search result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimilarityResult {
    /// Position of the matched candidate in the input slice.
    pub index: usize,

    /// Similarity score.
    pub score: f32,
}

impl SimilarityResult {
    /// Create a new similarity result.
    pub fn new(index: usize, score: f32) -> Self {
        Self { index, score }
    }
}

/// Find the top-k most similar embeddings.
///
/// Candidates scoring below `min_score` are dropped. The sort is stable, so
/// equal scores keep their candidate order.
pub fn find_top_k<'a, I>(
    query: &[f32],
    candidates: I,
    k: usize,
    min_score: f32,
) -> Vec<SimilarityResult>
where
    I: IntoIterator<Item = &'a [f32]>,
{
    let mut scores: Vec<(OrderedFloat<f32>, usize)> = candidates
        .into_iter()
        .enumerate()
        .map(|(index, embedding)| (OrderedFloat(cosine_similarity(query, embedding)), index))
        .filter(|(score, _)| score.0 >= min_score)
        .collect();

    // Sort by score descending
    scores.sort_by_key(|(score, _)| Reverse(*score));

    scores
        .into_iter()
        .take(k)
        .map(|(score, index)| SimilarityResult::new(index, score.0))
        .collect()
}

/// Normalize an embedding to unit length.
pub fn normalize(embedding: &mut [f32]) {
    let magnitude: f32 = embedding.iter().map(|x| x * x).sum::<f32>().sqrt();
    if magnitude > 0.0 {
        for x in embedding.iter_mut() {
            *x /= magnitude;
        }
    }
}
