//! Async host integration
//!
//! The engine is synchronous and single-writer. [`SharedEngine`] puts one
//! instance behind a mutex and runs every call on tokio's blocking pool, so an
//! async agent loop can share it across tasks without blocking the runtime.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::engine::{MemoryEngine, SaveRequest};
use crate::error::{MemoryError, Result};
use crate::memory::MemoryNode;
use crate::search::{SearchHit, SearchQuery};

/// Cloneable handle to one [`MemoryEngine`]
#[derive(Clone)]
pub struct SharedEngine {
    inner: Arc<Mutex<MemoryEngine>>,
}

impl SharedEngine {
    pub fn new(engine: MemoryEngine) -> Self {
        Self {
            inner: Arc::new(Mutex::new(engine)),
        }
    }

    /// Run `f` against the engine on the blocking pool
    pub async fn run<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut MemoryEngine) -> T + Send + 'static,
        T: Send + 'static,
    {
        let inner = Arc::clone(&self.inner);
        tokio::task::spawn_blocking(move || -> Result<T> {
            let mut engine = inner.lock().map_err(|_| MemoryError::LockPoisoned)?;
            Ok(f(&mut *engine))
        })
        .await
        .map_err(|e| MemoryError::TaskJoin(e.to_string()))?
    }

    pub async fn save(&self, request: SaveRequest) -> Result<String> {
        self.run(move |engine| engine.save(request)).await?
    }

    pub async fn search(&self, query: SearchQuery) -> Result<Vec<SearchHit>> {
        self.run(move |engine| engine.search(&query)).await
    }

    /// Touching read, see [`MemoryEngine::get`]
    pub async fn get(&self, id: impl Into<String>) -> Result<Option<MemoryNode>> {
        let id = id.into();
        self.run(move |engine| engine.get(&id)).await
    }

    pub async fn create_backup(&self, force: bool) -> Result<Option<PathBuf>> {
        self.run(move |engine| engine.create_backup(force)).await?
    }

    /// Attempt an unforced backup every `period` on the current runtime.
    /// Attempts inside the engine's backup interval are skipped.
    pub fn spawn_backup_task(&self, period: Duration) -> tokio::task::JoinHandle<()> {
        let engine = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            // the first tick completes immediately
            ticker.tick().await;
            loop {
                ticker.tick().await;
                match engine.create_backup(false).await {
                    Ok(Some(path)) => {
                        tracing::info!(path = %path.display(), "Periodic backup complete")
                    }
                    Ok(None) => tracing::debug!("Periodic backup skipped"),
                    Err(e) => tracing::warn!("Periodic backup failed: {}", e),
                }
            }
        })
    }
}

impl std::fmt::Debug for SharedEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedEngine")
            .field("handles", &Arc::strong_count(&self.inner))
            .finish()
    }
}
