//! Test Store Manager
//!
//! Provides isolated memory stores for testing:
//! - Temporary store roots that are automatically cleaned up
//! - Reopening the same root to observe persistence
//! - Pre-seeded stores with test data
//! - Helpers that damage live files to exercise recovery

use std::path::{Path, PathBuf};
use std::sync::Arc;

use recollect_core::{Embedder, EngineConfig, MemoryEngine, SaveRequest, StoreLayout};
use tempfile::TempDir;

use crate::mocks::KeywordBucketEmbedder;

/// Manager for test stores
///
/// Creates an isolated store root for each test to prevent interference.
/// The root is deleted when the manager is dropped.
///
/// # Example
///
/// ```rust,ignore
/// let mut store = TestStore::new_temp();
///
/// let id = store.engine.save(SaveRequest::new("title", "content"))?;
///
/// // Drop the engine and open the same root again
/// store.reopen();
/// assert!(store.engine.peek(&id).is_some());
/// ```
pub struct TestStore {
    /// The engine instance
    pub engine: MemoryEngine,
    /// Temporary directory (kept alive to prevent premature deletion)
    _temp_dir: TempDir,
    config: EngineConfig,
    embedder: Option<Arc<dyn Embedder>>,
}

impl TestStore {
    /// Temporary store with a 64-dimension keyword bucket embedder
    pub fn new_temp() -> Self {
        Self::with_embedder(Some(Arc::new(KeywordBucketEmbedder::new(64))))
    }

    /// Temporary store without any embedder (keyword search only)
    pub fn without_embedder() -> Self {
        Self::with_embedder(None)
    }

    pub fn with_embedder(embedder: Option<Arc<dyn Embedder>>) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let config = EngineConfig::new(temp_dir.path());
        Self::open_in(temp_dir, config, embedder)
    }

    /// Temporary store with a tweaked configuration. `configure` receives a
    /// config already rooted at the temp directory.
    pub fn with_config<F>(embedder: Option<Arc<dyn Embedder>>, configure: F) -> Self
    where
        F: FnOnce(EngineConfig) -> EngineConfig,
    {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let config = configure(EngineConfig::new(temp_dir.path()));
        Self::open_in(temp_dir, config, embedder)
    }

    fn open_in(
        temp_dir: TempDir,
        config: EngineConfig,
        embedder: Option<Arc<dyn Embedder>>,
    ) -> Self {
        let engine = MemoryEngine::open(config.clone(), embedder.clone())
            .expect("Failed to open test engine");
        Self {
            engine,
            _temp_dir: temp_dir,
            config,
            embedder,
        }
    }

    /// Store root
    pub fn root(&self) -> &Path {
        &self.config.root
    }

    pub fn layout(&self) -> StoreLayout {
        StoreLayout::new(self.root())
    }

    pub fn node_count(&self) -> usize {
        self.engine.len()
    }

    // ========================================================================
    // LIFECYCLE
    // ========================================================================

    /// Drop the current engine and open the same root again, as a restarted
    /// agent would.
    pub fn reopen(&mut self) {
        self.engine.flush().expect("Failed to flush before reopen");
        let fresh = MemoryEngine::open(self.config.clone(), self.embedder.clone())
            .expect("Failed to reopen test engine");
        // Assigning drops the old engine after the new one has loaded; the
        // old engine has nothing pending, so its Drop writes nothing.
        self.engine = fresh;
    }

    /// Reopen without flushing or dropping first, simulating a crash after
    /// the live files have been damaged.
    pub fn restart_after_crash(&mut self) {
        let fresh = MemoryEngine::open(self.config.clone(), self.embedder.clone())
            .expect("Failed to reopen test engine");
        self.engine = fresh;
    }

    // ========================================================================
    // SEEDING METHODS
    // ========================================================================

    /// Seed the store with `count` documents
    pub fn seed_nodes(&mut self, count: usize) -> Vec<String> {
        (0..count)
            .filter_map(|i| {
                self.engine
                    .save(
                        SaveRequest::new(
                            format!("Test memory {i}"),
                            format!("Test memory content {i}"),
                        )
                        .tags([format!("test-{}", i % 5)]),
                    )
                    .ok()
            })
            .collect()
    }

    /// Seed with one batch per node type
    pub fn seed_diverse(&mut self, count_per_type: usize) -> Vec<String> {
        let types = ["document", "note", "conversation", "fact", "procedure"];
        let mut ids = Vec::with_capacity(count_per_type * types.len());

        for node_type in types {
            for i in 0..count_per_type {
                let request = SaveRequest::new(
                    format!("{node_type} {i}"),
                    format!("Test {node_type} content {i}"),
                )
                .node_type(node_type)
                .tags([node_type]);
                if let Ok(id) = self.engine.save(request) {
                    ids.push(id);
                }
            }
        }

        ids
    }

    // ========================================================================
    // DAMAGE
    // ========================================================================

    /// Overwrite `graph.json` with bytes that do not parse
    pub fn corrupt_graph(&self) {
        std::fs::write(self.layout().graph_file(), b"{ not json")
            .expect("Failed to corrupt graph file");
    }

    /// Delete `graph.json`
    pub fn delete_graph(&self) {
        std::fs::remove_file(self.layout().graph_file()).expect("Failed to delete graph file");
    }

    /// Path of the newest backup directory, if any
    pub fn latest_backup(&self) -> Option<PathBuf> {
        self.engine
            .list_backups()
            .ok()
            .and_then(|backups| backups.into_iter().map(|b| b.path).max())
    }
}

impl std::fmt::Debug for TestStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TestStore")
            .field("root", &self.root())
            .field("nodes", &self.engine.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seed_and_reopen() {
        let mut store = TestStore::new_temp();
        let ids = store.seed_nodes(7);
        assert_eq!(ids.len(), 7);
        assert_eq!(store.node_count(), 7);

        store.reopen();
        assert_eq!(store.node_count(), 7);
        assert!(store.engine.peek(&ids[3]).is_some());
    }

    #[test]
    fn test_seed_diverse() {
        let mut store = TestStore::without_embedder();
        let ids = store.seed_diverse(2);
        assert_eq!(ids.len(), 10);
        assert_eq!(store.engine.stats().node_types["note"], 2);
    }
}
