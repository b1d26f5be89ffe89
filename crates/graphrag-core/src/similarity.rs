//! Cosine similarity and top-K ranking.
//!
//! Used by the fallback retrieval path and by stores that score vectors
//! in-process. Accumulation happens in `f64` even though embeddings are
//! stored as `f32`, so scores from different paths agree to full precision.

use crate::error::{RagError, Result};
use crate::models::{EmbeddedChunk, ScoredCandidate};

/// Cosine similarity between two vectors of equal length.
///
/// Returns a value in `[-1.0, 1.0]`. A zero-magnitude vector on either
/// side scores `0.0`. Vectors of different lengths are rejected with
/// [`RagError::InvalidInput`].
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> Result<f64> {
    if a.len() != b.len() {
        return Err(RagError::invalid(format!(
            "vector dimension mismatch: {} vs {}",
            a.len(),
            b.len()
        )));
    }

    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;

    for (&x, &y) in a.iter().zip(b.iter()) {
        let (x, y) = (x as f64, y as f64);
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    if norm_a == 0.0 || norm_b == 0.0 {
        return Ok(0.0);
    }

    Ok(dot / (norm_a.sqrt() * norm_b.sqrt()))
}

/// Sort candidates by similarity, descending, then keep the first `limit`.
///
/// The sort is stable: equal scores keep their input order.
pub fn sort_and_truncate(candidates: &mut Vec<ScoredCandidate>, limit: usize) {
    candidates.sort_by(|a, b| b.similarity.total_cmp(&a.similarity));
    candidates.truncate(limit);
}

/// Score every candidate against `query` and return the top `limit`.
///
/// The output holds `min(limit, candidates.len())` entries. Any candidate
/// whose dimensionality differs from the query fails the whole call.
pub fn rank_and_limit(
    query: &[f32],
    candidates: &[EmbeddedChunk],
    limit: usize,
) -> Result<Vec<ScoredCandidate>> {
    let mut scored = candidates
        .iter()
        .map(|c| {
            cosine_similarity(query, &c.embedding)
                .map(|sim| ScoredCandidate::new(c.id.clone(), c.content.clone(), sim))
        })
        .collect::<Result<Vec<_>>>()?;

    sort_and_truncate(&mut scored, limit);
    Ok(scored)
}
