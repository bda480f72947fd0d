//! Engine configuration
//!
//! Plain structs with defaults, overridable field by field. The store root is
//! resolved from (first match wins):
//! 1. `RECOLLECT_DATA_DIR`
//! 2. a `memory.config` file in the working directory holding a path
//! 3. the platform data directory (`directories::ProjectDirs`)

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::search::{HybridSearchConfig, DEFAULT_FLUSH_EVERY};
use crate::storage::StorageError;

/// Environment variable overriding the store root
pub const DATA_DIR_ENV: &str = "RECOLLECT_DATA_DIR";
/// Environment variable overriding the backup interval, in seconds
pub const BACKUP_INTERVAL_ENV: &str = "RECOLLECT_BACKUP_INTERVAL_SECS";
/// Environment variable overriding the number of snapshots kept
pub const MAX_BACKUPS_ENV: &str = "RECOLLECT_MAX_BACKUPS";
/// File in the working directory naming the store root
pub const CONFIG_FILE_NAME: &str = "memory.config";

/// Size and cadence limits
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoryLimits {
    /// Documents longer than this (bytes) are truncated on save
    pub max_document_size: usize,
    /// Notes longer than this (chars) are truncated
    pub max_note_length: usize,
    /// Snapshots kept under `backups/`
    pub max_backups: usize,
    /// Minimum time between unforced snapshots
    pub backup_interval: Duration,
    /// Saves between automatic backup attempts
    pub auto_backup_every: u64,
    /// Age after which files under `temp/` are deleted at startup
    pub temp_file_max_age: Duration,
}

impl Default for MemoryLimits {
    fn default() -> Self {
        Self {
            max_document_size: 1024 * 1024,
            max_note_length: 500,
            max_backups: 10,
            backup_interval: Duration::from_secs(3600),
            auto_backup_every: 10,
            temp_file_max_age: Duration::from_secs(7 * 86_400),
        }
    }
}

/// Full engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Store root directory
    pub root: PathBuf,
    #[serde(default)]
    pub limits: MemoryLimits,
    #[serde(default)]
    pub search: HybridSearchConfig,
    /// Entries per LRU cache; 0 disables the cache layer
    #[serde(default = "default_cache_capacity")]
    pub cache_capacity: usize,
    /// Embedding-index inserts between flushes
    #[serde(default = "default_flush_every")]
    pub index_flush_every: usize,
}

fn default_cache_capacity() -> usize {
    1000
}

fn default_flush_every() -> usize {
    DEFAULT_FLUSH_EVERY
}

impl EngineConfig {
    /// Defaults rooted at `root`
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            limits: MemoryLimits::default(),
            search: HybridSearchConfig::default(),
            cache_capacity: default_cache_capacity(),
            index_flush_every: default_flush_every(),
        }
    }

    /// Resolve the root and limit overrides from the environment
    pub fn from_env() -> Result<Self, StorageError> {
        let root = match std::env::var_os(DATA_DIR_ENV) {
            Some(dir) if !dir.is_empty() => PathBuf::from(dir),
            _ => match read_config_file(Path::new(CONFIG_FILE_NAME)) {
                Some(path) => path,
                None => default_data_dir()?,
            },
        };

        let mut config = Self::new(root);
        if let Some(secs) = env_number::<u64>(BACKUP_INTERVAL_ENV) {
            config.limits.backup_interval = Duration::from_secs(secs);
        }
        if let Some(max) = env_number::<usize>(MAX_BACKUPS_ENV) {
            config.limits.max_backups = max;
        }
        Ok(config)
    }

    pub fn with_cache_capacity(mut self, capacity: usize) -> Self {
        self.cache_capacity = capacity;
        self
    }

    pub fn with_limits(mut self, limits: MemoryLimits) -> Self {
        self.limits = limits;
        self
    }

    pub fn with_search(mut self, search: HybridSearchConfig) -> Self {
        self.search = search;
        self
    }
}

/// Platform data directory for the store
pub fn default_data_dir() -> Result<PathBuf, StorageError> {
    ProjectDirs::from("dev", "recollect", "recollect")
        .map(|dirs| dirs.data_dir().join("memory"))
        .ok_or_else(|| StorageError::Init("Could not determine project directories".to_string()))
}

/// First non-empty line of a `memory.config` file, if present
fn read_config_file(path: &Path) -> Option<PathBuf> {
    let contents = std::fs::read_to_string(path).ok()?;
    let line = contents.lines().map(str::trim).find(|l| !l.is_empty())?;
    Some(PathBuf::from(line))
}

fn env_number<T: std::str::FromStr>(name: &str) -> Option<T> {
    let raw = std::env::var(name).ok()?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::warn!(var = name, value = %raw, "Ignoring non-numeric environment override");
            None
        }
    }
}
