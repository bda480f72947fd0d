use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use super::{Result, StorageError};

const COMMIT_MARKER: &str = "COMMIT";

/// `foo.json` → `foo.json.bak`
pub fn backup_path(path: &Path) -> PathBuf {
    with_suffix(path, "bak")
}

fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!("{name}.{suffix}"))
}

fn write_synced(path: &Path, bytes: &[u8]) -> Result<()> {
    let mut file = File::create(path)?;
    file.write_all(bytes)?;
    file.sync_all()?;
    Ok(())
}

/// Read and decode a JSON file. A missing file is `Ok(None)`.
pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };

    serde_json::from_slice(&bytes)
        .map(Some)
        .map_err(|e| StorageError::Corrupt {
            path: path.display().to_string(),
            reason: e.to_string(),
        })
}

/// Read a JSON file, falling back to its `.bak` generation when the primary is
/// missing or cannot be decoded.
pub fn read_json_or_backup<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    match read_json(path) {
        Ok(Some(value)) => Ok(Some(value)),
        primary => {
            let bak = backup_path(path);
            match read_json(&bak)? {
                Some(value) => {
                    tracing::warn!(
                        path = %path.display(),
                        "Primary file unusable, loaded previous generation from .bak"
                    );
                    Ok(Some(value))
                }
                None => primary,
            }
        }
    }
}

/// Replace `path` atomically: write a temp file, fsync, rename over the target.
pub fn write_json_atomic<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let bytes = serde_json::to_vec_pretty(value)?;
    let tmp = with_suffix(path, "tmp");
    write_synced(&tmp, &bytes)?;
    fs::rename(&tmp, path)?;
    Ok(())
}

/// Write `bytes` to `path`, keeping the previous generation as `path.bak`.
///
/// The new content is fully written to a temp file before the old file is
/// rotated, so at any crash point one complete generation exists on disk.
pub fn write_bytes_with_backup(path: &Path, bytes: &[u8]) -> Result<()> {
    let tmp = with_suffix(path, "tmp");
    write_synced(&tmp, bytes)?;
    if path.exists() {
        fs::rename(path, backup_path(path))?;
    }
    fs::rename(&tmp, path)?;
    Ok(())
}

/// JSON flavour of [`write_bytes_with_backup`]
pub fn write_json_with_backup<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let bytes = serde_json::to_vec_pretty(value)?;
    write_bytes_with_backup(path, &bytes)
}

/// Copy every regular file of `src` into `dst` (non-recursive). Returns the count.
pub fn copy_dir_files(src: &Path, dst: &Path) -> Result<usize> {
    if !src.is_dir() {
        return Ok(0);
    }
    fs::create_dir_all(dst)?;

    let mut copied = 0;
    for entry in fs::read_dir(src)? {
        let entry = entry?;
        if entry.file_type()?.is_file() {
            fs::copy(entry.path(), dst.join(entry.file_name()))?;
            copied += 1;
        }
    }
    Ok(copied)
}

/// Delete regular files in `dir` whose modification time is older than `max_age`.
pub fn remove_stale_files(dir: &Path, max_age: Duration) -> Result<usize> {
    if !dir.is_dir() {
        return Ok(0);
    }

    let cutoff = SystemTime::now()
        .checked_sub(max_age)
        .unwrap_or(SystemTime::UNIX_EPOCH);
    let mut removed = 0;
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let meta = entry.metadata()?;
        if meta.is_file() && meta.modified()? < cutoff {
            fs::remove_file(entry.path())?;
            tracing::debug!(file = %entry.path().display(), "Deleted old temp file");
            removed += 1;
        }
    }
    Ok(removed)
}

// ============================================================================
// STAGED COMMIT
// ============================================================================

/// Multi-file commit that survives a crash at any point.
///
/// Files are first written into a staging directory, then a `COMMIT` marker
/// listing them is written, then each file is renamed into the target
/// directory. A staging directory found on startup is rolled forward when the
/// marker exists and discarded when it does not.
#[derive(Debug)]
pub struct StagedCommit {
    staging_dir: PathBuf,
    target_dir: PathBuf,
    files: Vec<(String, Vec<u8>)>,
}

impl StagedCommit {
    pub fn new(staging_dir: impl Into<PathBuf>, target_dir: impl Into<PathBuf>) -> Self {
        Self {
            staging_dir: staging_dir.into(),
            target_dir: target_dir.into(),
            files: Vec::new(),
        }
    }

    /// Add a file (by name relative to the target directory) to the commit
    pub fn stage_json<T: Serialize + ?Sized>(&mut self, file_name: &str, value: &T) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(value)?;
        self.files.push((file_name.to_string(), bytes));
        Ok(())
    }

    /// Write everything to staging, mark committed, then move into place
    pub fn commit(self) -> Result<()> {
        if self.staging_dir.exists() {
            fs::remove_dir_all(&self.staging_dir)?;
        }
        fs::create_dir_all(&self.staging_dir)?;

        let names: Vec<&str> = self.files.iter().map(|(n, _)| n.as_str()).collect();
        for (name, bytes) in &self.files {
            write_synced(&self.staging_dir.join(name), bytes)?;
        }
        write_synced(
            &self.staging_dir.join(COMMIT_MARKER),
            &serde_json::to_vec(&names)?,
        )?;

        Self::roll_forward(&self.staging_dir, &self.target_dir)
    }

    /// Finish or discard an interrupted commit. Returns `true` if one was rolled forward.
    pub fn recover(staging_dir: &Path, target_dir: &Path) -> Result<bool> {
        if !staging_dir.exists() {
            return Ok(false);
        }

        if staging_dir.join(COMMIT_MARKER).exists() {
            Self::roll_forward(staging_dir, target_dir)?;
            tracing::warn!(
                staging = %staging_dir.display(),
                "Rolled forward an interrupted multi-file commit"
            );
            Ok(true)
        } else {
            fs::remove_dir_all(staging_dir)?;
            tracing::warn!(
                staging = %staging_dir.display(),
                "Discarded an uncommitted staging directory"
            );
            Ok(false)
        }
    }

    fn roll_forward(staging_dir: &Path, target_dir: &Path) -> Result<()> {
        let marker = staging_dir.join(COMMIT_MARKER);
        let names: Vec<String> = read_json(&marker)?.unwrap_or_default();

        fs::create_dir_all(target_dir)?;
        for name in names {
            let staged = staging_dir.join(&name);
            // Already moved by an earlier, interrupted roll-forward
            if staged.exists() {
                fs::rename(&staged, target_dir.join(&name))?;
            }
        }

        fs::remove_file(&marker)?;
        fs::remove_dir_all(staging_dir)?;
        Ok(())
    }
}
