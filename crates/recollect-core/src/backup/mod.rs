//! Backup and Recovery
//!
//! Timestamped snapshots of every persisted structure under `backups/`, with
//! a recovery marker (`backups/last_state.json`) rewritten by each snapshot.
//!
//! ```text
//! backups/20260101_120000_123/
//!     graph.json
//!     vector_index/{faiss.index, node_ids.json}
//!     categories.json, relations.json
//!     mind_maps/{map_id}.json
//!     stats/{access_patterns, retrieval_counts, query_patterns, session}.json
//!     state.json
//! ```
//!
//! The marker records the store files' newest modification time. On startup,
//! if the live files are older than that (or the live graph is missing or
//! unreadable), the newest snapshot is restored before anything is loaded.

use chrono::{DateTime, Duration, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use crate::memory::GraphFile;
use crate::search::{QueryPattern, SearchStats};
use crate::storage::{copy_dir_files, read_json, write_json_atomic, Result, StoreLayout};

/// Snapshot directory name format (UTC, sortable)
pub const SNAPSHOT_NAME_FORMAT: &str = "%Y%m%d_%H%M%S_%3f";

/// Retrieval counts kept in a snapshot
const TOP_RETRIEVALS: usize = 100;

const STATS_DIR: &str = "stats";
const STATE_FILE: &str = "state.json";
const ACCESS_PATTERNS_FILE: &str = "access_patterns.json";
const RETRIEVAL_COUNTS_FILE: &str = "retrieval_counts.json";
const QUERY_PATTERNS_FILE: &str = "query_patterns.json";
const SESSION_FILE: &str = "session.json";
const MIND_MAPS_DIR: &str = "mind_maps";

// ============================================================================
// STATE TYPES
// ============================================================================

/// Lifetime counters of an engine, carried across snapshots
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineCounters {
    pub nodes_added: u64,
    pub documents_saved: u64,
    pub conversations_saved: u64,
    pub notes_added: u64,
    pub searches_performed: u64,
    pub backups_created: u64,
    pub recoveries: u64,
    pub mind_maps_created: u64,
    pub task_statuses_logged: u64,
}

/// Current process session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionInfo {
    pub started_at: DateTime<Utc>,
    pub duration_secs: i64,
    pub timestamp: DateTime<Utc>,
}

impl SessionInfo {
    pub fn since(started_at: DateTime<Utc>) -> Self {
        let now = Utc::now();
        Self {
            started_at,
            duration_secs: (now - started_at).num_seconds(),
            timestamp: now,
        }
    }
}

/// Condensed summary written as `state.json` and as the recovery marker
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackupState {
    pub timestamp: DateTime<Utc>,
    pub num_nodes: usize,
    pub num_edges: usize,
    pub num_categories: usize,
    pub num_vectors: usize,
    #[serde(default)]
    pub num_mind_maps: usize,
    #[serde(default)]
    pub counters: EngineCounters,
    /// Newest modification time of the live store files when the snapshot
    /// was taken; filled in by [`PersistenceManager::snapshot`]
    #[serde(default)]
    pub store_modified: Option<DateTime<Utc>>,
}

/// A snapshot on disk
#[derive(Debug, Clone, Serialize)]
pub struct BackupInfo {
    pub name: String,
    pub path: PathBuf,
    /// Parsed from the directory name
    pub created_at: Option<DateTime<Utc>>,
    /// `state.json`, if readable
    pub state: Option<BackupState>,
}

/// What a recovery brought back besides the store files
#[derive(Debug, Clone)]
pub struct RecoveredState {
    pub snapshot: String,
    pub search: SearchStats,
    pub counters: EngineCounters,
    pub session: Option<SessionInfo>,
}

// ============================================================================
// PERSISTENCE MANAGER
// ============================================================================

/// Creates, prunes, lists and restores snapshots
#[derive(Debug)]
pub struct PersistenceManager {
    layout: StoreLayout,
    max_backups: usize,
    interval: Duration,
    last_backup: Option<DateTime<Utc>>,
}

impl PersistenceManager {
    /// The cadence clock starts from the marker's timestamp, if any
    pub fn new(layout: StoreLayout, max_backups: usize, interval: Duration) -> Self {
        let last_backup = match read_json::<BackupState>(&layout.last_state_file()) {
            Ok(state) => state.map(|s| s.timestamp),
            Err(e) => {
                tracing::warn!("Unreadable recovery marker: {}", e);
                None
            }
        };
        Self {
            layout,
            max_backups: max_backups.max(1),
            interval,
            last_backup,
        }
    }

    pub fn last_backup(&self) -> Option<DateTime<Utc>> {
        self.last_backup
    }

    /// Whether the backup interval has elapsed
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.last_backup
            .is_none_or(|last| now - last >= self.interval)
    }

    // ========================================================================
    // SNAPSHOTS
    // ========================================================================

    /// Write a snapshot unless one was taken within the interval and `force`
    /// is false. Returns the snapshot directory when one was written.
    pub fn snapshot(
        &mut self,
        state: &BackupState,
        stats: &SearchStats,
        session: &SessionInfo,
        force: bool,
    ) -> Result<Option<PathBuf>> {
        let now = Utc::now();
        if !force && !self.is_due(now) {
            tracing::debug!("Backup skipped, not enough time elapsed since last backup");
            return Ok(None);
        }

        let dir = self.new_snapshot_dir(now)?;
        let layout = &self.layout;

        copy_if_exists(&layout.graph_file(), &dir.join("graph.json"))?;
        copy_dir_files(&layout.vector_dir(), &dir.join("vector_index"))?;
        copy_if_exists(&layout.categories_file(), &dir.join(StoreLayout::CATEGORIES))?;
        copy_if_exists(&layout.relations_file(), &dir.join(StoreLayout::RELATIONS))?;
        copy_dir_files(&layout.mind_maps_dir(), &dir.join(MIND_MAPS_DIR))?;

        let stats_dir = dir.join(STATS_DIR);
        fs::create_dir_all(&stats_dir)?;
        write_json_atomic(&stats_dir.join(ACCESS_PATTERNS_FILE), &stats.access_patterns)?;
        let top: HashMap<String, u64> = stats.top_retrieved(TOP_RETRIEVALS).into_iter().collect();
        write_json_atomic(&stats_dir.join(RETRIEVAL_COUNTS_FILE), &top)?;
        write_json_atomic(&stats_dir.join(QUERY_PATTERNS_FILE), &stats.query_patterns)?;
        write_json_atomic(&stats_dir.join(SESSION_FILE), session)?;

        let mut state = state.clone();
        state.store_modified = self.live_modified().map(DateTime::<Utc>::from);
        write_json_atomic(&dir.join(STATE_FILE), &state)?;
        write_json_atomic(&layout.last_state_file(), &state)?;

        self.last_backup = Some(now);
        self.prune()?;

        tracing::info!(
            nodes = state.num_nodes,
            snapshot = %dir.display(),
            "Created backup"
        );
        Ok(Some(dir))
    }

    fn new_snapshot_dir(&self, now: DateTime<Utc>) -> Result<PathBuf> {
        let base = now.format(SNAPSHOT_NAME_FORMAT).to_string();
        let backups = self.layout.backups_dir();
        fs::create_dir_all(&backups)?;

        let mut dir = backups.join(&base);
        let mut n = 1;
        while dir.exists() {
            dir = backups.join(format!("{base}_{n}"));
            n += 1;
        }
        fs::create_dir_all(&dir)?;
        Ok(dir)
    }

    /// Snapshot directories, newest first
    fn snapshot_dirs(&self) -> Result<Vec<PathBuf>> {
        let backups = self.layout.backups_dir();
        if !backups.is_dir() {
            return Ok(vec![]);
        }

        let mut dirs: Vec<PathBuf> = fs::read_dir(&backups)?
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| p.is_dir() && is_snapshot_name(p))
            .collect();
        dirs.sort_by(|a, b| b.file_name().cmp(&a.file_name()));
        Ok(dirs)
    }

    /// Keep only the newest `max_backups` snapshots
    fn prune(&self) -> Result<usize> {
        let dirs = self.snapshot_dirs()?;
        let mut removed = 0;
        for old in dirs.iter().skip(self.max_backups) {
            fs::remove_dir_all(old)?;
            tracing::info!(snapshot = %old.display(), "Removed old backup");
            removed += 1;
        }
        Ok(removed)
    }

    pub fn latest_snapshot(&self) -> Result<Option<PathBuf>> {
        Ok(self.snapshot_dirs()?.into_iter().next())
    }

    /// Every snapshot on disk, newest first
    pub fn list_backups(&self) -> Result<Vec<BackupInfo>> {
        Ok(self
            .snapshot_dirs()?
            .into_iter()
            .map(|path| {
                let name = path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default();
                let created_at = name
                    .get(..19)
                    .and_then(|s| NaiveDateTime::parse_from_str(s, SNAPSHOT_NAME_FORMAT).ok())
                    .map(|naive| naive.and_utc());
                let state = read_json(&path.join(STATE_FILE)).ok().flatten();
                BackupInfo {
                    name,
                    path,
                    created_at,
                    state,
                }
            })
            .collect())
    }

    // ========================================================================
    // RECOVERY
    // ========================================================================

    /// A snapshot exists and the live store is older than what the marker
    /// recorded at snapshot time, or the live graph is missing or unreadable.
    pub fn needs_recovery(&self) -> bool {
        let Ok(Some(_)) = self.latest_snapshot() else {
            return false;
        };
        let graph = self.layout.graph_file();
        if !graph.exists() || read_json::<GraphFile>(&graph).is_err() {
            return true;
        }

        let live = self.live_modified();
        let marker_path = self.layout.last_state_file();
        match read_json::<BackupState>(&marker_path) {
            Ok(Some(BackupState {
                store_modified: Some(recorded),
                ..
            })) => live.is_none_or(|live| DateTime::<Utc>::from(live) < recorded),
            // markers without a recorded store time fall back to file times
            _ => match (modified(&marker_path), live) {
                (Some(marker), Some(live)) => marker > live,
                _ => false,
            },
        }
    }

    /// Newest modification time among the graph and hierarchy files
    fn live_modified(&self) -> Option<SystemTime> {
        [
            self.layout.graph_file(),
            self.layout.categories_file(),
            self.layout.relations_file(),
        ]
        .iter()
        .filter_map(|p| modified(p))
        .max()
    }

    /// Copy the newest snapshot's store files back into place and return its
    /// statistics. `Ok(None)` if there is no snapshot.
    pub fn recover(&self) -> Result<Option<RecoveredState>> {
        let Some(snapshot) = self.latest_snapshot()? else {
            return Ok(None);
        };
        let name = snapshot
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        tracing::warn!(snapshot = %name, "Found newer backup data, recovering from backup");

        let layout = &self.layout;
        restore_file(&snapshot.join("graph.json"), &layout.graph_file())?;
        let vectors = snapshot.join("vector_index");
        if vectors.is_dir() {
            for file in [layout.vector_index_file(), layout.vector_ids_file()] {
                if let Some(file_name) = file.file_name() {
                    restore_file(&vectors.join(file_name), &file)?;
                }
            }
        }
        restore_file(&snapshot.join(StoreLayout::CATEGORIES), &layout.categories_file())?;
        restore_file(&snapshot.join(StoreLayout::RELATIONS), &layout.relations_file())?;
        let maps = restore_mind_maps(&snapshot.join(MIND_MAPS_DIR), &layout.mind_maps_dir());
        if maps > 0 {
            tracing::info!(maps, "Restored mind maps from backup");
        }

        let stats_dir = snapshot.join(STATS_DIR);
        let state: Option<BackupState> = read_or_warn(&snapshot.join(STATE_FILE));
        let counters = state.map(|s| s.counters).unwrap_or_default();
        let query_patterns: Option<VecDeque<QueryPattern>> =
            read_or_warn(&stats_dir.join(QUERY_PATTERNS_FILE));
        let search = SearchStats {
            searches_performed: counters.searches_performed,
            query_patterns: query_patterns.unwrap_or_default(),
            access_patterns: read_or_warn(&stats_dir.join(ACCESS_PATTERNS_FILE))
                .unwrap_or_default(),
            retrieval_counts: read_or_warn(&stats_dir.join(RETRIEVAL_COUNTS_FILE))
                .unwrap_or_default(),
        };
        let session = read_or_warn(&stats_dir.join(SESSION_FILE));

        tracing::info!(snapshot = %name, "Recovery complete, memory state restored");
        Ok(Some(RecoveredState {
            snapshot: name,
            search,
            counters,
            session,
        }))
    }

    /// Delete files under `temp/` older than `max_age`
    pub fn cleanup_temp(&self, max_age: std::time::Duration) -> usize {
        match crate::storage::remove_stale_files(&self.layout.temp_dir(), max_age) {
            Ok(n) => n,
            Err(e) => {
                tracing::error!("Error cleaning up temp files: {}", e);
                0
            }
        }
    }
}

// ============================================================================
// HELPERS
// ============================================================================

fn is_snapshot_name(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .and_then(|n| n.chars().next())
        .is_some_and(|c| c.is_ascii_digit())
}

fn modified(path: &Path) -> Option<SystemTime> {
    fs::metadata(path).and_then(|m| m.modified()).ok()
}

fn copy_if_exists(src: &Path, dst: &Path) -> Result<bool> {
    if !src.is_file() {
        return Ok(false);
    }
    fs::copy(src, dst)?;
    Ok(true)
}

/// Copy `src` over `dst` through a temp file so `dst` is replaced atomically
fn restore_file(src: &Path, dst: &Path) -> Result<bool> {
    if !src.is_file() {
        return Ok(false);
    }
    if let Some(parent) = dst.parent() {
        fs::create_dir_all(parent)?;
    }
    let tmp = dst.with_extension("restore");
    fs::copy(src, &tmp)?;
    fs::rename(&tmp, dst)?;
    Ok(true)
}

/// Copy every map of a snapshot over the live one with the same name. Live
/// maps absent from the snapshot are kept. Failures are logged per file.
fn restore_mind_maps(src: &Path, dst: &Path) -> usize {
    let Ok(entries) = fs::read_dir(src) else {
        return 0;
    };
    let mut restored = 0;
    for path in entries.filter_map(|e| e.ok()).map(|e| e.path()) {
        let Some(name) = path.file_name() else {
            continue;
        };
        match restore_file(&path, &dst.join(name)) {
            Ok(true) => restored += 1,
            Ok(false) => {}
            Err(e) => {
                tracing::error!(file = %path.display(), "Error recovering mind map: {}", e);
            }
        }
    }
    restored
}

fn read_or_warn<T: serde::de::DeserializeOwned>(path: &Path) -> Option<T> {
    match read_json(path) {
        Ok(value) => value,
        Err(e) => {
            tracing::error!(file = %path.display(), "Error recovering backup statistics: {}", e);
            None
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================
