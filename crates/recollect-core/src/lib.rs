//! # Recollect Core
//!
//! Long-term memory engine for autonomous agents. Everything an agent writes
//! survives restarts and crashes, and can be found again by meaning and by
//! keyword:
//!
//! - **Knowledge Graph**: typed nodes with tags, metadata and directed edges,
//!   persisted as one JSON file plus per-node documents
//! - **Embedding Index**: exact nearest-neighbour search over an injected
//!   [`Embedder`], flushed in generations with `.bak` rotation
//! - **Hybrid Retrieval**: exact / all-token / fuzzy keyword matching ahead of
//!   recency-adjusted vector matches, with filters and usage statistics
//! - **Category Hierarchy**: a forest of categories with typed relations,
//!   merge, and staged commits
//! - **Temporal Queries**: rolling windows and neighbourhoods over access time
//! - **Mind Maps**: per-task concept maps with typed links, searchable and
//!   summarised for session priming
//! - **Cache Layer**: bounded LRU caches for nodes and relation lookups
//! - **Backups**: timestamped snapshots, retention, and automatic recovery
//!   when the live store is older than the last snapshot
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use recollect_core::{EngineConfig, HashingEmbedder, MemoryEngine, SaveRequest, SearchQuery};
//!
//! # fn main() -> recollect_core::Result<()> {
//! let embedder = Arc::new(HashingEmbedder::new(256));
//! let mut engine = MemoryEngine::open(EngineConfig::new("/tmp/agent-memory"), Some(embedder))?;
//!
//! let id = engine.save(
//!     SaveRequest::new("Deploy checklist", "run migrations before restarting workers")
//!         .tags(["ops", "important"]),
//! )?;
//!
//! for hit in engine.search(&SearchQuery::new("migrations").limit(5)) {
//!     println!("{} {:?}", hit.node.title, hit.match_kind);
//! }
//! assert!(engine.get(&id).is_some());
//! # Ok(())
//! # }
//! ```
//!
//! ## Feature Flags
//!
//! - `embeddings`: local embedding generation with fastembed (all-MiniLM-L6-v2)
//! - `full`: all features

#![cfg_attr(docsrs, feature(doc_cfg))]
#![warn(rustdoc::missing_crate_level_docs)]

// ============================================================================
// MODULES
// ============================================================================

pub mod backup;
pub mod cache;
pub mod config;
pub mod conversation;
pub mod embeddings;
pub mod engine;
pub mod error;
pub mod hierarchy;
pub mod memory;
pub mod mindmap;
pub mod search;
pub mod shared;
pub mod storage;

// ============================================================================
// PUBLIC API RE-EXPORTS
// ============================================================================

// Engine facade
pub use engine::{
    ActivitySummary, EngineStats, MemoryEngine, NoteImportance, PrimingKnowledge, PrimingMap,
    PrimingNote, SaveRequest, SessionMemory, IMPORTANT_TAG, KNOWLEDGE_BASE_TAGS, NOTES_TAG,
    TASK_STATUS_TAG, TRUNCATION_MARKER,
};
pub use error::{MemoryError, Result};
pub use shared::SharedEngine;

// Configuration
pub use config::{default_data_dir, EngineConfig, MemoryLimits, DATA_DIR_ENV};

// Knowledge graph
pub use memory::{
    GraphEdge, MemoryNode, MemoryStore, NewNode, NodeType, NodeUpdate, TemporalError,
    TemporalIndex, TimeWindow,
};

// Retrieval
pub use search::{
    EmbeddingIndex, FlatIndex, HybridRetriever, HybridSearchConfig, MatchKind, SearchHit,
    SearchQuery, SearchStats, VectorIndexStats, VectorSearchError,
};

// Embeddings
pub use embeddings::{Embedder, EmbeddingError, HashingEmbedder};
#[cfg(feature = "embeddings")]
pub use embeddings::FastEmbedder;

// Hierarchy, cache, backups
pub use backup::{BackupInfo, BackupState, EngineCounters, PersistenceManager};
pub use cache::{CacheLayer, CacheStats};
pub use conversation::ConversationMessage;
pub use hierarchy::{Category, Hierarchy, HierarchyError, Relation};
pub use mindmap::{
    Concept, ConceptKind, ConceptLink, MindMap, MindMapError, MindMapMatch, MindMaps, Position,
};

// Storage
pub use storage::{StorageError, StoreLayout};

// ============================================================================
// VERSION INFO
// ============================================================================

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default local embedding model
pub const DEFAULT_EMBEDDING_MODEL: &str = "sentence-transformers/all-MiniLM-L6-v2";

// ============================================================================
// PRELUDE
// ============================================================================

/// Convenient imports for common usage
pub mod prelude {
    pub use crate::{
        ConversationMessage, Embedder, EngineConfig, HashingEmbedder, MemoryEngine, MemoryError,
        MemoryNode, NodeUpdate, NoteImportance, Result, SaveRequest, SearchHit, SearchQuery,
        SharedEngine, TimeWindow,
    };

    #[cfg(feature = "embeddings")]
    pub use crate::FastEmbedder;
}
