//! Mock Embedders
//!
//! Deterministic stand-ins for a real model:
//! - [`KeywordBucketEmbedder`]: bag of words over a controllable number of buckets
//! - [`UnavailableEmbedder`]: never ready
//! - [`FailingEmbedder`]: ready, but every encode fails
//! - [`WrongDimensionEmbedder`]: returns vectors longer than it advertises

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use recollect_core::{Embedder, EmbeddingError};

// ============================================================================
// KEYWORD BUCKETS
// ============================================================================

/// Bag-of-words embedder. Each lowercase alphanumeric token adds weight to one
/// bucket and the result is L2-normalized, so texts sharing words are close.
///
/// Buckets are picked from the token bytes unless pinned with
/// [`KeywordBucketEmbedder::pin`], which lets a test force two words to
/// collide or stay apart.
#[derive(Debug)]
pub struct KeywordBucketEmbedder {
    dimensions: usize,
    pinned: HashMap<String, usize>,
    calls: AtomicUsize,
}

impl KeywordBucketEmbedder {
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions: dimensions.max(1),
            pinned: HashMap::new(),
            calls: AtomicUsize::new(0),
        }
    }

    /// Always map `word` to `bucket` (modulo the dimension)
    pub fn pin(mut self, word: &str, bucket: usize) -> Self {
        self.pinned
            .insert(word.to_lowercase(), bucket % self.dimensions);
        self
    }

    /// Number of `encode` calls so far
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::Relaxed)
    }

    fn bucket(&self, token: &str) -> usize {
        if let Some(&bucket) = self.pinned.get(token) {
            return bucket;
        }
        let sum = token
            .bytes()
            .enumerate()
            .fold(0usize, |acc, (i, b)| acc.wrapping_add((i + 1) * b as usize));
        sum % self.dimensions
    }
}

impl Embedder for KeywordBucketEmbedder {
    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn encode(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        self.calls.fetch_add(1, Ordering::Relaxed);

        let mut vector = vec![0.0f32; self.dimensions];
        for token in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
        {
            vector[self.bucket(&token.to_lowercase())] += 1.0;
        }

        let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm == 0.0 {
            vector[0] = 1.0;
        } else {
            vector.iter_mut().for_each(|v| *v /= norm);
        }
        Ok(vector)
    }

    fn model_name(&self) -> &str {
        "keyword-buckets"
    }
}

// ============================================================================
// DEGRADED EMBEDDERS
// ============================================================================

/// Reports itself as not ready, like a model that failed to load
#[derive(Debug, Default)]
pub struct UnavailableEmbedder;

impl Embedder for UnavailableEmbedder {
    fn dimensions(&self) -> usize {
        16
    }

    fn encode(&self, _text: &str) -> Result<Vec<f32>, EmbeddingError> {
        Err(EmbeddingError::Unavailable("model not loaded".into()))
    }

    fn is_ready(&self) -> bool {
        false
    }
}

/// Ready, but every encode fails
#[derive(Debug, Default)]
pub struct FailingEmbedder;

impl Embedder for FailingEmbedder {
    fn dimensions(&self) -> usize {
        16
    }

    fn encode(&self, _text: &str) -> Result<Vec<f32>, EmbeddingError> {
        Err(EmbeddingError::EmbeddingFailed("inference error".into()))
    }
}

/// Advertises `dimensions` but returns one extra component
#[derive(Debug)]
pub struct WrongDimensionEmbedder {
    dimensions: usize,
}

impl WrongDimensionEmbedder {
    pub fn new(dimensions: usize) -> Self {
        Self { dimensions }
    }
}

impl Embedder for WrongDimensionEmbedder {
    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn encode(&self, _text: &str) -> Result<Vec<f32>, EmbeddingError> {
        Ok(vec![0.5; self.dimensions + 1])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shared_words_are_closer() {
        let embedder = KeywordBucketEmbedder::new(64);
        let a = embedder.encode("kubernetes rollout").unwrap();
        let b = embedder.encode("rollout of kubernetes pods").unwrap();
        let c = embedder.encode("pasta basil").unwrap();

        let dist = |x: &[f32], y: &[f32]| -> f32 {
            x.iter().zip(y).map(|(p, q)| (p - q) * (p - q)).sum()
        };
        assert!(dist(&a, &b) < dist(&a, &c));
        assert_eq!(embedder.calls(), 3);
    }

    #[test]
    fn test_pinned_words_collide() {
        let embedder = KeywordBucketEmbedder::new(32).pin("car", 5).pin("automobile", 5);
        assert_eq!(
            embedder.encode("car").unwrap(),
            embedder.encode("Automobile").unwrap()
        );
    }

    #[test]
    fn test_empty_text_is_unit_vector() {
        let v = KeywordBucketEmbedder::new(8).encode("  ").unwrap();
        assert_eq!(v.len(), 8);
        assert_eq!(v[0], 1.0);
    }

    #[test]
    fn test_degraded_embedders() {
        assert!(!UnavailableEmbedder.is_ready());
        assert!(FailingEmbedder.encode("x").is_err());
        assert_eq!(WrongDimensionEmbedder::new(4).encode("x").unwrap().len(), 5);
    }
}
