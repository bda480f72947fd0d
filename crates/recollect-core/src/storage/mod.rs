//! Storage Module
//!
//! File-based persistence primitives shared by every component:
//! - On-disk layout of a store root
//! - Atomic whole-file writes (temp file + rename)
//! - `.bak` generation rotation for node-level files
//! - Staged multi-file commits with roll-forward on startup

mod files;
mod layout;

pub use files::{
    backup_path, copy_dir_files, read_json, read_json_or_backup, remove_stale_files,
    write_bytes_with_backup, write_json_atomic, write_json_with_backup, StagedCommit,
};
pub use layout::StoreLayout;

// ============================================================================
// ERROR TYPES
// ============================================================================

/// Storage error type
#[non_exhaustive]
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    /// Serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    /// A persisted file exists but cannot be decoded
    #[error("Corrupt file {path}: {reason}")]
    Corrupt {
        /// Offending file
        path: String,
        /// What was wrong with it
        reason: String,
    },
    /// An id that cannot be used as a file name inside the store
    #[error("Unsafe file name: {0:?}")]
    UnsafeName(String),
    /// Node not found
    #[error("Node not found: {0}")]
    NotFound(String),
    /// Initialization error
    #[error("Initialization error: {0}")]
    Init(String),
}

/// Storage result type
pub type Result<T> = std::result::Result<T, StorageError>;
