//! Brute-force cosine similarity ranking.

use crate::embedding::EmbeddingEntry;
use std::cmp::Ordering;

/// A ranked entry.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoredHit {
    /// Index of the matched entry.
    pub index: usize,
    /// Cosine similarity to the query, or `f32::NEG_INFINITY` when undefined.
    pub similarity: f32,
}

/// Compute cosine similarity between two vectors.
///
/// Returns `None` when the similarity is undefined: mismatched or empty
/// vectors, or either vector having zero magnitude.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> Option<f32> {
    if a.len() != b.len() || a.is_empty() {
        return None;
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return None;
    }

    let similarity = dot_product / (norm_a * norm_b);
    similarity.is_finite().then_some(similarity)
}

/// Rank every entry against `query` and keep the best `top_n`.
///
/// Ordered by descending similarity, ties by ascending index. Entries whose
/// similarity is undefined rank last.
pub fn similarity_search(query: &[f32], entries: &[EmbeddingEntry], top_n: usize) -> Vec<ScoredHit> {
    let mut hits: Vec<ScoredHit> = entries
        .iter()
        .map(|entry| ScoredHit {
            index: entry.index,
            similarity: cosine_similarity(query, &entry.embedding).unwrap_or(f32::NEG_INFINITY),
        })
        .collect();

    hits.sort_by(|a, b| {
        b.similarity
            .partial_cmp(&a.similarity)
            .unwrap_or(Ordering::Equal)
            .then(a.index.cmp(&b.index))
    });
    hits.truncate(top_n);

    hits
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(index: usize, embedding: Vec<f32>) -> EmbeddingEntry {
        EmbeddingEntry {
            index,
            embedding,
            transcript: format!("entry {}", index),
        }
    }

    #[test]
    fn test_cosine_similarity() {
        let a = vec![1.0, 0.0, 0.0];
        let b = vec![1.0, 0.0, 0.0];
        assert!((cosine_similarity(&a, &b).unwrap() - 1.0).abs() < 0.001);

        let c = vec![0.0, 1.0, 0.0];
        assert!(cosine_similarity(&a, &c).unwrap().abs() < 0.001);

        let d = vec![-1.0, 0.0, 0.0];
        assert!((cosine_similarity(&a, &d).unwrap() + 1.0).abs() < 0.001);
    }

    #[test]
    fn test_undefined_similarity() {
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), None);
        assert_eq!(cosine_similarity(&[1.0], &[1.0, 0.0]), None);
        assert_eq!(cosine_similarity(&[], &[]), None);
    }

    #[test]
    fn test_ordering_and_ties() {
        let entries = vec![
            entry(0, vec![1.0, 0.0]),
            entry(1, vec![0.0, 1.0]),
            entry(2, vec![1.0, 0.0]),
        ];

        let hits = similarity_search(&[1.0, 0.0], &entries, 3);
        assert_eq!(hits.iter().map(|h| h.index).collect::<Vec<_>>(), vec![0, 2, 1]);
        assert!((hits[0].similarity - 1.0).abs() < 1e-6);
        assert!((hits[1].similarity - 1.0).abs() < 1e-6);
        assert!(hits[2].similarity.abs() < 1e-6);
    }

    #[test]
    fn test_zero_vector_ranks_last_without_nan() {
        let entries = vec![
            entry(0, vec![0.0, 0.0]),
            entry(1, vec![-1.0, 0.0]),
            entry(2, vec![0.5, 0.5]),
        ];

        let hits = similarity_search(&[1.0, 0.0], &entries, 10);
        assert_eq!(hits.iter().map(|h| h.index).collect::<Vec<_>>(), vec![2, 1, 0]);
        assert!(hits.iter().all(|h| !h.similarity.is_nan()));
        assert_eq!(hits[2].similarity, f32::NEG_INFINITY);
    }

    #[test]
    fn test_top_n_truncates() {
        let entries: Vec<_> = (0..20).map(|i| entry(i, vec![1.0, i as f32])).collect();
        let hits = similarity_search(&[1.0, 0.0], &entries, 5);
        assert_eq!(hits.len(), 5);
        assert_eq!(hits[0].index, 0);
    }
}
