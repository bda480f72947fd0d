//! Crate-level error type

use crate::embeddings::EmbeddingError;
use crate::hierarchy::HierarchyError;
use crate::memory::TemporalError;
use crate::mindmap::MindMapError;
use crate::search::VectorSearchError;
use crate::storage::StorageError;

/// Any error surfaced by the engine
#[non_exhaustive]
#[derive(Debug, thiserror::Error)]
pub enum MemoryError {
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    VectorSearch(#[from] VectorSearchError),
    #[error(transparent)]
    Embedding(#[from] EmbeddingError),
    #[error(transparent)]
    Temporal(#[from] TemporalError),
    #[error(transparent)]
    Hierarchy(#[from] HierarchyError),
    #[error(transparent)]
    MindMap(#[from] MindMapError),
    /// Unknown node id where one is required
    #[error("Node not found: {0}")]
    NodeNotFound(String),
    /// A worker task of [`crate::SharedEngine`] panicked or was cancelled
    #[error("Engine task failed: {0}")]
    TaskJoin(String),
    /// The engine mutex was poisoned by a panicking holder
    #[error("Engine lock poisoned")]
    LockPoisoned,
}

/// Result type used throughout the engine facade
pub type Result<T> = std::result::Result<T, MemoryError>;
