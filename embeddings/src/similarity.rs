//! Similarity computation for embeddings.

use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};

use crate::error::{EmbeddingError, Result};

/// Compute the cosine similarity between two embeddings.
///
/// Returns a value between -1.0 and 1.0, where:
/// - 1.0 means identical direction
/// - 0.0 means orthogonal vectors
/// - -1.0 means opposite vectors
///
/// If either vector has zero magnitude the similarity is defined as `0.0`.
/// Rounding can push the result marginally outside `[-1, 1]`.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> Result<f32> {
    let dot = dot_product_f64(a, b)?;
    let magnitude_a = magnitude(a);
    let magnitude_b = magnitude(b);

    if magnitude_a == 0.0 || magnitude_b == 0.0 {
        return Ok(0.0);
    }

    Ok((dot / (magnitude_a * magnitude_b)) as f32)
}

/// Compute the dot product between two embeddings.
pub fn dot_product(a: &[f32], b: &[f32]) -> Result<f32> {
    dot_product_f64(a, b).map(|dot| dot as f32)
}

// Sums run in f64 so that squares of very small or very large f32
// components neither underflow to zero nor overflow to infinity.
fn dot_product_f64(a: &[f32], b: &[f32]) -> Result<f64> {
    if a.len() != b.len() {
        return Err(EmbeddingError::DimensionMismatch {
            expected: a.len(),
            actual: b.len(),
        });
    }

    Ok(a.iter()
        .zip(b.iter())
        .map(|(x, y)| f64::from(*x) * f64::from(*y))
        .sum())
}

fn magnitude(v: &[f32]) -> f64 {
    v.iter()
        .map(|x| f64::from(*x) * f64::from(*x))
        .sum::<f64>()
        .sqrt()
}

/// Normalize an embedding to unit length. Zero vectors are left untouched.
pub fn normalize(embedding: &mut [f32]) {
    let magnitude = magnitude(embedding);
    if magnitude > 0.0 {
        for x in embedding.iter_mut() {
            *x = (f64::from(*x) / magnitude) as f32;
        }
    }
}

/// A candidate that survived ranking, identified by its position in the
/// candidate sequence.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoredCandidate {
    /// Position of the candidate in the input sequence.
    pub index: usize,

    /// Cosine similarity to the query.
    pub score: f32,
}

/// Rank candidates against a query and keep the best `k`.
///
/// Only candidates scoring strictly above `threshold` are kept. The sort is
/// stable, so equal scores stay in input order. Any candidate whose length
/// differs from the query fails the whole ranking.
pub fn rank_top_k<'a, I>(
    query: &[f32],
    candidates: I,
    k: usize,
    threshold: f32,
) -> Result<Vec<ScoredCandidate>>
where
    I: IntoIterator<Item = &'a [f32]>,
{
    let mut scored = Vec::new();

    for (index, embedding) in candidates.into_iter().enumerate() {
        let score = cosine_similarity(query, embedding)?;
        if score > threshold {
            scored.push(ScoredCandidate { index, score });
        }
    }

    // Sort by score descending; `sort_by` is stable.
    scored.sort_by(|a, b| OrderedFloat(b.score).cmp(&OrderedFloat(a.score)));
    scored.truncate(k);

    Ok(scored)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const EPSILON: f32 = 1e-6;

    /// Small deterministic generator so the property checks need no extra crates.
    fn sample_vectors(count: usize, dim: usize) -> Vec<Vec<f32>> {
        let mut state: u32 = 0x9e37_79b9;
        (0..count)
            .map(|_| {
                (0..dim)
                    .map(|_| {
                        state = state.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
                        (state >> 8) as f32 / (1u32 << 24) as f32 * 2.0 - 1.0
                    })
                    .collect()
            })
            .collect()
    }

    #[test]
    fn test_cosine_similarity_identical() {
        let a = vec![1.0, 0.0, 0.0];
        let b = vec![1.0, 0.0, 0.0];
        let sim = cosine_similarity(&a, &b).unwrap();
        assert!((sim - 1.0).abs() < EPSILON);
    }

    #[test]
    fn test_cosine_similarity_orthogonal() {
        let a = vec![1.0, 0.0, 0.0];
        let b = vec![0.0, 1.0, 0.0];
        let sim = cosine_similarity(&a, &b).unwrap();
        assert!(sim.abs() < EPSILON);
    }

    #[test]
    fn test_cosine_similarity_opposite() {
        let a = vec![1.0, 0.0, 0.0];
        let b = vec![-1.0, 0.0, 0.0];
        let sim = cosine_similarity(&a, &b).unwrap();
        assert!((sim + 1.0).abs() < EPSILON);
    }

    #[test]
    fn test_cosine_similarity_ignores_magnitude() {
        let sim = cosine_similarity(&[2.0, 0.0], &[10.0, 0.0]).unwrap();
        assert!((sim - 1.0).abs() < EPSILON);
    }

    #[test]
    fn test_zero_vector_scores_zero() {
        let zero = vec![0.0; 4];
        for v in sample_vectors(8, 4) {
            assert_eq!(cosine_similarity(&v, &zero).unwrap(), 0.0);
            assert_eq!(cosine_similarity(&zero, &v).unwrap(), 0.0);
        }
        assert_eq!(cosine_similarity(&zero, &zero).unwrap(), 0.0);
    }

    #[test]
    fn test_extreme_magnitudes_stay_well_defined() {
        let tiny: Vec<f32> = vec![1e-30, 2e-30];
        let large: Vec<f32> = vec![1e20, 1e20];
        let huge: Vec<f32> = vec![f32::MAX, -f32::MAX];

        for v in [&tiny, &large, &huge] {
            let sim = cosine_similarity(v, v).unwrap();
            assert!((sim - 1.0).abs() < EPSILON, "{v:?} gave {sim}");
        }

        let sim = cosine_similarity(&tiny, &[2e-30, -1e-30]).unwrap();
        assert!(sim.abs() < EPSILON);

        let sim = cosine_similarity(&large, &[-1e20, -1e20]).unwrap();
        assert!((sim + 1.0).abs() < EPSILON);

        let mut scaled = tiny;
        normalize(&mut scaled);
        assert!((cosine_similarity(&scaled, &scaled).unwrap() - 1.0).abs() < EPSILON);
        assert!((scaled[0] - 1.0 / 5.0f32.sqrt()).abs() < EPSILON);
    }

    #[test]
    fn test_dimension_mismatch() {
        let a = vec![1.0, 0.0];
        let b = vec![1.0, 0.0, 0.0];
        let err = cosine_similarity(&a, &b).unwrap_err();
        assert!(matches!(
            err,
            EmbeddingError::DimensionMismatch {
                expected: 2,
                actual: 3
            }
        ));
    }

    #[test]
    fn test_bounds_symmetry_and_self_similarity() {
        let vectors = sample_vectors(24, 16);
        for a in &vectors {
            let own = cosine_similarity(a, a).unwrap();
            assert!((own - 1.0).abs() < 1e-5, "self similarity was {own}");

            for b in &vectors {
                let ab = cosine_similarity(a, b).unwrap();
                let ba = cosine_similarity(b, a).unwrap();
                assert!((-1.0 - EPSILON..=1.0 + EPSILON).contains(&ab));
                assert_eq!(ab, ba);
            }
        }
    }

    #[test]
    fn test_normalize() {
        let mut v = vec![3.0, 4.0];
        normalize(&mut v);
        assert!((v[0] - 0.6).abs() < EPSILON);
        assert!((v[1] - 0.8).abs() < EPSILON);

        let mut zero = vec![0.0, 0.0];
        normalize(&mut zero);
        assert_eq!(zero, vec![0.0, 0.0]);
    }

    #[test]
    fn test_rank_top_k() {
        let query = vec![1.0, 0.0, 0.0];
        let candidates = [
            vec![1.0, 0.0, 0.0], // similarity 1.0
            vec![0.0, 1.0, 0.0], // similarity 0.0
            vec![0.7, 0.7, 0.0], // similarity ~0.7
        ];

        let results = rank_top_k(&query, candidates.iter().map(Vec::as_slice), 2, 0.0).unwrap();
        let order: Vec<usize> = results.iter().map(|r| r.index).collect();
        assert_eq!(order, vec![0, 2]);
    }

    #[test]
    fn test_rank_top_k_threshold_is_strict() {
        let query = vec![1.0, 0.0];
        let candidates = [vec![0.0, 1.0], vec![1.0, 0.0]];

        let results = rank_top_k(&query, candidates.iter().map(Vec::as_slice), 10, 0.0).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].index, 1);
    }

    #[test]
    fn test_rank_top_k_ties_keep_input_order() {
        let query = vec![1.0, 1.0];
        let candidates = [vec![0.0, 1.0], vec![1.0, 1.0], vec![1.0, 0.0], vec![1.0, 1.0]];

        let results = rank_top_k(&query, candidates.iter().map(Vec::as_slice), 10, -1.0).unwrap();
        let order: Vec<usize> = results.iter().map(|r| r.index).collect();
        assert_eq!(order, vec![1, 3, 0, 2]);
    }

    #[test]
    fn test_rank_top_k_rejects_mixed_dimensions() {
        let query = vec![1.0, 0.0];
        let candidates = [vec![1.0, 0.0], vec![1.0, 0.0, 0.0]];

        let result = rank_top_k(&query, candidates.iter().map(Vec::as_slice), 10, -1.0);
        assert!(matches!(
            result,
            Err(EmbeddingError::DimensionMismatch { .. })
        ));
    }
}
