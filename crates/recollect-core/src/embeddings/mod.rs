//! Semantic Embeddings Module
//!
//! The engine never talks to an ML runtime directly. It depends on one injected
//! capability, [`Embedder`], which turns text into a fixed-length vector.
//!
//! Provided implementations:
//! - [`FastEmbedder`] (feature `embeddings`): local ONNX inference via fastembed
//! - [`HashingEmbedder`]: deterministic feature hashing, no model download

mod hashing;
#[cfg(feature = "embeddings")]
mod local;
mod math;

pub use hashing::{HashingEmbedder, DEFAULT_HASHING_DIMENSIONS};
#[cfg(feature = "embeddings")]
pub use local::{FastEmbedder, DEFAULT_MODEL_DIMENSIONS, MAX_TEXT_LENGTH};
pub use math::{cosine_similarity, l2_normalize, squared_l2};

// ============================================================================
// ERROR TYPES
// ============================================================================

/// Embedding error types
#[non_exhaustive]
#[derive(Debug, Clone, thiserror::Error)]
pub enum EmbeddingError {
    /// The embedder cannot serve requests (model missing, runtime not loaded)
    #[error("Embedder unavailable: {0}")]
    Unavailable(String),
    /// Failed to generate embedding
    #[error("Embedding generation failed: {0}")]
    EmbeddingFailed(String),
    /// Invalid input (empty, too long, etc.)
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

// ============================================================================
// EMBEDDER CAPABILITY
// ============================================================================

/// Text → vector capability supplied by the host.
///
/// The dimension must stay constant for the lifetime of the embedder; the vector
/// index fixes its own dimension from it at construction.
pub trait Embedder: Send + Sync {
    /// Length of every vector returned by [`Embedder::encode`]
    fn dimensions(&self) -> usize;

    /// Encode a single text
    fn encode(&self, text: &str) -> Result<Vec<f32>, EmbeddingError>;

    /// Whether the embedder can currently serve requests
    fn is_ready(&self) -> bool {
        true
    }

    /// Human readable model identifier, recorded in stats
    fn model_name(&self) -> &str {
        "custom"
    }
}
