//! Exact Vector Search
//!
//! Brute-force flat index over squared L2 distance. Every query scans every
//! stored vector, so results are exact and ordered by ascending distance
//! (lower = more similar).
//!
//! Deletion is not supported in place: [`FlatIndex::remove`] reconstructs the
//! retained vectors and rebuilds the index from scratch. That is an O(n)
//! operation and should not be called in tight loops.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::embeddings::{squared_l2, Embedder, EmbeddingError};
use crate::storage::{
    backup_path, read_json, write_bytes_with_backup, write_json_with_backup, StorageError,
    StoreLayout,
};

// ============================================================================
// CONSTANTS
// ============================================================================

/// Magic bytes opening a persisted index
const INDEX_MAGIC: &[u8; 4] = b"RFLT";

/// Header: magic + u32 dimensions + u64 count
const HEADER_LEN: usize = 4 + 4 + 8;

/// Default number of inserts between index flushes
pub const DEFAULT_FLUSH_EVERY: usize = 10;

// ============================================================================
// ERROR TYPES
// ============================================================================

/// Vector search error types
#[non_exhaustive]
#[derive(Debug, thiserror::Error)]
pub enum VectorSearchError {
    /// Dimension mismatch
    #[error("Invalid dimensions: expected {0}, got {1}")]
    InvalidDimensions(usize, usize),
    /// Query or document could not be encoded
    #[error("Embedding failed: {0}")]
    Embedding(#[from] EmbeddingError),
    /// Failed to persist/load index
    #[error("Persistence failed: {0}")]
    IndexPersistence(#[from] StorageError),
    /// Persisted index is malformed
    #[error("Corrupt index: {0}")]
    Corrupt(String),
}

type Result<T> = std::result::Result<T, VectorSearchError>;

/// Index statistics
#[derive(Debug, Clone, serde::Serialize)]
pub struct VectorIndexStats {
    /// Total number of vectors
    pub total_vectors: usize,
    /// Vector dimensions
    pub dimensions: usize,
    /// Raw vector storage in bytes
    pub memory_bytes: usize,
    /// Whether the embedder can currently serve requests
    pub available: bool,
    pub model: String,
    /// Inserts not yet flushed to disk
    pub pending_writes: usize,
}

// ============================================================================
// FLAT INDEX
// ============================================================================

/// Exact nearest-neighbour index: slot `i` holds the vector of `ids[i]`
#[derive(Debug, Clone, Default)]
pub struct FlatIndex {
    dimensions: usize,
    data: Vec<f32>,
    ids: Vec<String>,
    slots: HashMap<String, usize>,
}

impl FlatIndex {
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions,
            ..Default::default()
        }
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    pub fn contains(&self, id: &str) -> bool {
        self.slots.contains_key(id)
    }

    /// Node ids in slot order
    pub fn ids(&self) -> &[String] {
        &self.ids
    }

    pub fn vector(&self, id: &str) -> Option<&[f32]> {
        let slot = *self.slots.get(id)?;
        Some(&self.data[slot * self.dimensions..(slot + 1) * self.dimensions])
    }

    /// Append a vector. Returns `Ok(false)` if `id` is already indexed.
    pub fn add(&mut self, id: &str, vector: &[f32]) -> Result<bool> {
        if vector.len() != self.dimensions {
            return Err(VectorSearchError::InvalidDimensions(
                self.dimensions,
                vector.len(),
            ));
        }
        if self.contains(id) {
            return Ok(false);
        }

        self.slots.insert(id.to_string(), self.ids.len());
        self.ids.push(id.to_string());
        self.data.extend_from_slice(vector);
        Ok(true)
    }

    /// Up to `k` nearest ids by ascending squared L2 distance
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<(String, f32)>> {
        if query.len() != self.dimensions {
            return Err(VectorSearchError::InvalidDimensions(
                self.dimensions,
                query.len(),
            ));
        }
        if k == 0 || self.is_empty() {
            return Ok(vec![]);
        }

        let mut scored: Vec<(usize, f32)> = self
            .data
            .chunks_exact(self.dimensions.max(1))
            .map(|v| squared_l2(query, v))
            .enumerate()
            .collect();
        scored.sort_by(|a, b| a.1.total_cmp(&b.1));
        scored.truncate(k);

        Ok(scored
            .into_iter()
            .map(|(slot, d)| (self.ids[slot].clone(), d))
            .collect())
    }

    /// Rebuild the index without `id`. O(n) in the number of stored vectors.
    pub fn remove(&mut self, id: &str) -> bool {
        if !self.contains(id) {
            return false;
        }

        let mut rebuilt = FlatIndex::new(self.dimensions);
        for (slot, kept) in self.ids.iter().enumerate() {
            if kept == id {
                continue;
            }
            let vector = &self.data[slot * self.dimensions..(slot + 1) * self.dimensions];
            rebuilt.slots.insert(kept.clone(), rebuilt.ids.len());
            rebuilt.ids.push(kept.clone());
            rebuilt.data.extend_from_slice(vector);
        }

        *self = rebuilt;
        true
    }

    pub fn clear(&mut self) {
        self.data.clear();
        self.ids.clear();
        self.slots.clear();
    }

    /// Raw vector storage in bytes
    pub fn memory_bytes(&self) -> usize {
        self.data.len() * std::mem::size_of::<f32>()
    }

    /// Serialize the vectors (ids are persisted separately)
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(HEADER_LEN + self.memory_bytes());
        bytes.extend_from_slice(INDEX_MAGIC);
        bytes.extend_from_slice(&(self.dimensions as u32).to_le_bytes());
        bytes.extend_from_slice(&(self.len() as u64).to_le_bytes());
        for value in &self.data {
            bytes.extend_from_slice(&value.to_le_bytes());
        }
        bytes
    }

    /// Rebuild from persisted vectors and their slot → id mapping
    pub fn from_parts(bytes: &[u8], ids: Vec<String>) -> Result<Self> {
        if bytes.len() < HEADER_LEN || &bytes[..4] != INDEX_MAGIC {
            return Err(VectorSearchError::Corrupt("bad header".into()));
        }

        let mut dim = [0u8; 4];
        dim.copy_from_slice(&bytes[4..8]);
        let mut count = [0u8; 8];
        count.copy_from_slice(&bytes[8..16]);
        let dimensions = u32::from_le_bytes(dim) as usize;
        let count = usize::try_from(u64::from_le_bytes(count))
            .map_err(|_| VectorSearchError::Corrupt("vector count out of range".into()))?;

        if dimensions == 0 && count > 0 {
            return Err(VectorSearchError::Corrupt("zero-dimension vectors".into()));
        }
        let expected = count
            .checked_mul(dimensions)
            .and_then(|floats| floats.checked_mul(std::mem::size_of::<f32>()))
            .ok_or_else(|| {
                VectorSearchError::Corrupt(format!(
                    "header claims {count} vectors of {dimensions} floats"
                ))
            })?;
        let body = &bytes[HEADER_LEN..];
        if body.len() != expected {
            return Err(VectorSearchError::Corrupt(format!(
                "expected {} vectors of {} floats, found {} bytes",
                count,
                dimensions,
                body.len()
            )));
        }
        if ids.len() != count {
            return Err(VectorSearchError::Corrupt(format!(
                "{} vectors but {} ids",
                count,
                ids.len()
            )));
        }

        let data: Vec<f32> = body
            .chunks_exact(4)
            .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect();
        let slots = ids
            .iter()
            .enumerate()
            .map(|(slot, id)| (id.clone(), slot))
            .collect::<HashMap<_, _>>();
        if slots.len() != ids.len() {
            return Err(VectorSearchError::Corrupt("duplicate ids".into()));
        }

        Ok(Self {
            dimensions,
            data,
            ids,
            slots,
        })
    }
}

// ============================================================================
// EMBEDDING INDEX
// ============================================================================

/// Persistent flat index over node texts, wrapping the injected [`Embedder`].
///
/// With no embedder (or one that is not ready) every operation degrades to a
/// no-op: `add` returns `Ok(false)` and `search` returns an empty list.
pub struct EmbeddingIndex {
    embedder: Option<Arc<dyn Embedder>>,
    index: FlatIndex,
    index_path: PathBuf,
    ids_path: PathBuf,
    flush_every: usize,
    pending: usize,
}

impl EmbeddingIndex {
    /// Load the index under `layout`, or start empty if it is missing,
    /// unreadable or was built with a different dimension.
    pub fn open(
        layout: &StoreLayout,
        embedder: Option<Arc<dyn Embedder>>,
        flush_every: usize,
    ) -> Self {
        let dimensions = embedder.as_ref().map(|e| e.dimensions()).unwrap_or(0);
        let index_path = layout.vector_index_file();
        let ids_path = layout.vector_ids_file();

        let index = match Self::load_generation(&index_path, &ids_path) {
            Ok(Some(index)) if embedder.is_none() || index.dimensions() == dimensions => {
                tracing::info!(vectors = index.len(), "Loaded vector index");
                index
            }
            Ok(Some(index)) => {
                tracing::warn!(
                    expected = dimensions,
                    found = index.dimensions(),
                    "Vector index dimension differs from embedder, starting empty"
                );
                FlatIndex::new(dimensions)
            }
            Ok(None) => FlatIndex::new(dimensions),
            Err(e) => {
                tracing::warn!("Error loading vector index, starting empty: {}", e);
                FlatIndex::new(dimensions)
            }
        };

        if embedder.is_none() {
            tracing::warn!("No embedder configured, vector search disabled");
        }

        Self {
            embedder,
            index,
            index_path,
            ids_path,
            flush_every: flush_every.max(1),
            pending: 0,
        }
    }

    /// Try the current generation, then pairings with the `.bak` files.
    ///
    /// `flush` writes the vectors before the id map, so a crash between the
    /// two leaves the previous vectors in `.bak` next to the current ids.
    fn load_generation(index_path: &Path, ids_path: &Path) -> Result<Option<FlatIndex>> {
        let index_bak = backup_path(index_path);
        let ids_bak = backup_path(ids_path);

        let primary = Self::load_pair(index_path, ids_path);
        if let Ok(Some(index)) = primary {
            return Ok(Some(index));
        }

        let fallbacks = [
            (index_bak.as_path(), ids_path),
            (index_path, ids_bak.as_path()),
            (index_bak.as_path(), ids_bak.as_path()),
        ];
        for (vectors, ids) in fallbacks {
            if let Ok(Some(index)) = Self::load_pair(vectors, ids) {
                tracing::warn!(
                    vectors = %vectors.display(),
                    ids = %ids.display(),
                    "Vector index unusable, loaded previous generation"
                );
                return Ok(Some(index));
            }
        }
        primary
    }

    fn load_pair(index_path: &Path, ids_path: &Path) -> Result<Option<FlatIndex>> {
        let bytes = match std::fs::read(index_path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(StorageError::from(e).into()),
        };
        let ids: Vec<String> = read_json(ids_path)?.unwrap_or_default();
        FlatIndex::from_parts(&bytes, ids).map(Some)
    }

    pub fn is_available(&self) -> bool {
        self.embedder.as_ref().is_some_and(|e| e.is_ready())
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    pub fn dimensions(&self) -> usize {
        self.index.dimensions()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains(id)
    }

    /// Inserts not yet flushed to disk
    pub fn pending_writes(&self) -> usize {
        self.pending
    }

    /// Encode text with the configured embedder
    pub fn encode(&self, text: &str) -> Result<Vec<f32>> {
        match &self.embedder {
            Some(embedder) if embedder.is_ready() => Ok(embedder.encode(text)?),
            _ => Err(EmbeddingError::Unavailable("no embedder configured".into()).into()),
        }
    }

    /// Index `text` under `id`.
    ///
    /// Returns `Ok(false)` when the embedder is unavailable or `id` is already
    /// indexed. Flushes to disk every `flush_every` inserts.
    pub fn add(&mut self, id: &str, text: &str) -> Result<bool> {
        if !self.is_available() || self.contains(id) {
            return Ok(false);
        }

        let vector = self.encode(text)?;
        if !self.index.add(id, &vector)? {
            return Ok(false);
        }

        self.pending += 1;
        if self.pending >= self.flush_every {
            self.flush()?;
        }
        Ok(true)
    }

    /// Nearest `k` node ids to `query`, ascending distance.
    /// An unavailable embedder yields an empty list.
    pub fn search(&self, query: &str, k: usize) -> Result<Vec<(String, f32)>> {
        if !self.is_available() || self.is_empty() || k == 0 {
            return Ok(vec![]);
        }
        let vector = self.encode(query)?;
        self.index.search(&vector, k)
    }

    /// Remove `id` by rebuilding the whole index (O(n)), then persist.
    pub fn remove(&mut self, id: &str) -> Result<bool> {
        if !self.index.remove(id) {
            return Ok(false);
        }
        tracing::debug!(
            node_id = %id,
            remaining = self.index.len(),
            "Rebuilt vector index without node"
        );
        self.flush()?;
        Ok(true)
    }

    /// Write both index files, rotating the previous generation to `.bak`
    pub fn flush(&mut self) -> Result<()> {
        if let Some(dir) = self.index_path.parent() {
            std::fs::create_dir_all(dir).map_err(StorageError::from)?;
        }
        write_bytes_with_backup(&self.index_path, &self.index.to_bytes())?;
        write_json_with_backup(&self.ids_path, self.index.ids())?;
        self.pending = 0;
        tracing::debug!(vectors = self.index.len(), "Flushed vector index");
        Ok(())
    }

    pub fn stats(&self) -> VectorIndexStats {
        VectorIndexStats {
            total_vectors: self.index.len(),
            dimensions: self.index.dimensions(),
            memory_bytes: self.index.memory_bytes(),
            available: self.is_available(),
            model: self
                .embedder
                .as_ref()
                .map(|e| e.model_name().to_string())
                .unwrap_or_else(|| "none".to_string()),
            pending_writes: self.pending,
        }
    }
}

impl std::fmt::Debug for EmbeddingIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmbeddingIndex")
            .field("vectors", &self.index.len())
            .field("dimensions", &self.index.dimensions())
            .field("available", &self.is_available())
            .finish()
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::HashingEmbedder;

    const DIMS: usize = 8;

    fn create_test_vector(seed: f32) -> Vec<f32> {
        (0..DIMS)
            .map(|i| ((i as f32 + seed) / DIMS as f32).sin())
            .collect()
    }

    fn open_index(dir: &Path, flush_every: usize) -> EmbeddingIndex {
        let layout = StoreLayout::new(dir);
        layout.create_dirs().unwrap();
        let embedder: Arc<dyn Embedder> = Arc::new(HashingEmbedder::new(64));
        EmbeddingIndex::open(&layout, Some(embedder), flush_every)
    }

    #[test]
    fn test_flat_add_and_search() {
        let mut index = FlatIndex::new(DIMS);
        index.add("node-1", &create_test_vector(1.0)).unwrap();
        index.add("node-2", &create_test_vector(2.0)).unwrap();
        index.add("node-3", &create_test_vector(100.0)).unwrap();

        assert_eq!(index.len(), 3);
        let results = index.search(&create_test_vector(1.0), 3).unwrap();
        assert_eq!(results.len(), 3);
        assert_eq!(results[0].0, "node-1");
        assert_eq!(results[0].1, 0.0);
        assert!(results.windows(2).all(|w| w[0].1 <= w[1].1));
    }

    #[test]
    fn test_flat_duplicate_is_noop() {
        let mut index = FlatIndex::new(DIMS);
        assert!(index.add("a", &create_test_vector(1.0)).unwrap());
        assert!(!index.add("a", &create_test_vector(2.0)).unwrap());
        assert_eq!(index.len(), 1);
        assert_eq!(index.vector("a").unwrap(), create_test_vector(1.0).as_slice());
    }

    #[test]
    fn test_invalid_dimensions() {
        let mut index = FlatIndex::new(DIMS);
        let result = index.add("node-1", &[1.0, 2.0, 3.0]);
        assert!(matches!(result, Err(VectorSearchError::InvalidDimensions(8, 3))));
        assert!(index.search(&[1.0], 1).is_err());
    }

    #[test]
    fn test_remove_rebuilds() {
        let mut index = FlatIndex::new(DIMS);
        for i in 0..5 {
            index.add(&format!("n{i}"), &create_test_vector(i as f32)).unwrap();
        }
        assert!(index.remove("n2"));
        assert!(!index.remove("n2"));

        assert_eq!(index.len(), 4);
        assert_eq!(index.ids(), &["n0", "n1", "n3", "n4"]);
        assert_eq!(index.vector("n3").unwrap(), create_test_vector(3.0).as_slice());

        let results = index.search(&create_test_vector(2.0), 10).unwrap();
        assert!(results.iter().all(|(id, _)| id != "n2"));
    }

    #[test]
    fn test_bytes_roundtrip_and_corruption() {
        let mut index = FlatIndex::new(DIMS);
        index.add("a", &create_test_vector(1.0)).unwrap();
        index.add("b", &create_test_vector(2.0)).unwrap();

        let bytes = index.to_bytes();
        let back = FlatIndex::from_parts(&bytes, vec!["a".into(), "b".into()]).unwrap();
        assert_eq!(back.ids(), index.ids());
        assert_eq!(back.vector("b"), index.vector("b"));

        assert!(FlatIndex::from_parts(&bytes, vec!["a".into()]).is_err());
        let truncated = &bytes[..bytes.len() - 1];
        assert!(FlatIndex::from_parts(truncated, vec!["a".into(), "b".into()]).is_err());
        assert!(FlatIndex::from_parts(b"nope", vec![]).is_err());
    }

    #[test]
    fn test_oversized_header_is_corrupt() {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(INDEX_MAGIC);
        bytes.extend_from_slice(&1024u32.to_le_bytes());
        bytes.extend_from_slice(&(u64::MAX / 2).to_le_bytes());
        bytes.extend_from_slice(&[0u8; 16]);

        let result = FlatIndex::from_parts(&bytes, vec![]);
        assert!(matches!(result, Err(VectorSearchError::Corrupt(_))));
    }

    #[test]
    fn test_oversized_header_on_disk_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        let layout = StoreLayout::new(dir.path());
        layout.create_dirs().unwrap();
        let mut bytes = Vec::new();
        bytes.extend_from_slice(INDEX_MAGIC);
        bytes.extend_from_slice(&64u32.to_le_bytes());
        bytes.extend_from_slice(&u64::MAX.to_le_bytes());
        std::fs::write(layout.vector_index_file(), bytes).unwrap();

        let index = open_index(dir.path(), 1);
        assert!(index.is_empty());
        assert_eq!(index.dimensions(), 64);
    }

    #[test]
    fn test_embedding_index_unavailable_is_noop() {
        let dir = tempfile::tempdir().unwrap();
        let layout = StoreLayout::new(dir.path());
        let mut index = EmbeddingIndex::open(&layout, None, 10);

        assert!(!index.is_available());
        assert!(!index.add("a", "text").unwrap());
        assert!(index.search("text", 5).unwrap().is_empty());
    }

    #[test]
    fn test_embedding_index_add_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let mut index = open_index(dir.path(), 10);
        assert!(index.add("a", "rust borrow checker").unwrap());
        assert!(!index.add("a", "something else").unwrap());
        assert_eq!(index.len(), 1);
    }

    #[test]
    fn test_embedding_index_search_and_remove() {
        let dir = tempfile::tempdir().unwrap();
        let mut index = open_index(dir.path(), 10);
        index.add("rust", "rust ownership borrow checker").unwrap();
        index.add("cook", "pasta tomato basil recipe").unwrap();

        let results = index.search("borrow checker in rust", 2).unwrap();
        assert_eq!(results[0].0, "rust");

        assert!(index.remove("rust").unwrap());
        let results = index.search("borrow checker in rust", 2).unwrap();
        assert!(results.iter().all(|(id, _)| id != "rust"));
    }

    #[test]
    fn test_flush_every_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        {
            let mut index = open_index(dir.path(), 2);
            index.add("a", "first text").unwrap();
            assert!(!StoreLayout::new(dir.path()).vector_index_file().exists());
            index.add("b", "second text").unwrap();
            assert!(StoreLayout::new(dir.path()).vector_index_file().exists());
            index.add("c", "third text").unwrap();
            // third insert still pending
        }

        let index = open_index(dir.path(), 2);
        assert_eq!(index.len(), 2);
        assert!(index.contains("a") && index.contains("b"));
    }

    #[test]
    fn test_corrupt_index_falls_back_to_backup() {
        let dir = tempfile::tempdir().unwrap();
        let layout = StoreLayout::new(dir.path());
        {
            let mut index = open_index(dir.path(), 1);
            index.add("a", "first").unwrap();
            index.add("b", "second").unwrap();
        }
        std::fs::write(layout.vector_index_file(), b"garbage").unwrap();

        let index = open_index(dir.path(), 1);
        assert_eq!(index.len(), 1);
        assert!(index.contains("a"));
    }

    #[test]
    fn test_crash_between_vector_and_id_writes() {
        let dir = tempfile::tempdir().unwrap();
        let layout = StoreLayout::new(dir.path());
        {
            let mut index = open_index(dir.path(), 1);
            index.add("a", "first").unwrap();
            index.add("b", "second").unwrap();
        }

        // vectors for a third node reach disk, the id map never does
        let mut next = open_index(dir.path(), 100);
        next.add("c", "third").unwrap();
        write_bytes_with_backup(&layout.vector_index_file(), &next.index.to_bytes()).unwrap();
        drop(next);

        let index = open_index(dir.path(), 1);
        assert_eq!(index.len(), 2);
        assert!(index.contains("a") && index.contains("b"));
        assert!(!index.contains("c"));
    }

    #[test]
    fn test_dimension_change_discards_index() {
        let dir = tempfile::tempdir().unwrap();
        {
            let mut index = open_index(dir.path(), 1);
            index.add("a", "first").unwrap();
        }
        let layout = StoreLayout::new(dir.path());
        let embedder: Arc<dyn Embedder> = Arc::new(HashingEmbedder::new(32));
        let index = EmbeddingIndex::open(&layout, Some(embedder), 1);
        assert!(index.is_empty());
        assert_eq!(index.dimensions(), 32);
    }
}
