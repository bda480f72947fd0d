//! Feature-hashing embedder
//!
//! Maps lowercase alphanumeric tokens into a fixed number of buckets with FNV-1a
//! and L2-normalizes the counts. No model, no downloads, fully deterministic
//! across runs and platforms. Texts that share words land close together, which
//! is enough for hosts without an ML runtime and for tests.

use super::{l2_normalize, Embedder, EmbeddingError};

/// Default bucket count
pub const DEFAULT_HASHING_DIMENSIONS: usize = 256;

const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

fn fnv1a(bytes: &[u8]) -> u64 {
    let mut hash = FNV_OFFSET;
    for b in bytes {
        hash ^= u64::from(*b);
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    hash
}

/// Deterministic bag-of-words embedder
#[derive(Debug, Clone)]
pub struct HashingEmbedder {
    dimensions: usize,
}

impl Default for HashingEmbedder {
    fn default() -> Self {
        Self::new(DEFAULT_HASHING_DIMENSIONS)
    }
}

impl HashingEmbedder {
    /// Create an embedder producing `dimensions`-long vectors (minimum 1)
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions: dimensions.max(1),
        }
    }
}

impl Embedder for HashingEmbedder {
    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn encode(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let mut vector = vec![0.0_f32; self.dimensions];
        let lowered = text.to_lowercase();

        for token in lowered
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
        {
            let bucket = (fnv1a(token.as_bytes()) % self.dimensions as u64) as usize;
            vector[bucket] += 1.0;
        }

        l2_normalize(&mut vector);
        Ok(vector)
    }

    fn model_name(&self) -> &str {
        "feature-hashing"
    }
}
