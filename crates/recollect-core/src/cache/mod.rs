//! Cache Layer
//!
//! Two bounded LRU maps in front of the store:
//! - nodes, each with a precomputed embedding and an access counter
//! - relation lookups (`related` results keyed by node and depth)
//!
//! Cached node embeddings also feed an ephemeral [`FlatIndex`] scoped to the
//! cached items. Nothing here is a source of truth: the whole layer can be
//! cleared and rebuilt from the store and the embedding index at any time.

use chrono::{DateTime, Utc};
use lru::LruCache;
use serde::Serialize;
use std::num::NonZeroUsize;
use std::sync::Arc;

use crate::embeddings::Embedder;
use crate::memory::MemoryNode;
use crate::search::FlatIndex;

/// Number of entries reported in [`CacheStats::most_accessed`]
const TOP_ACCESSED: usize = 10;

/// A cached node
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub node: MemoryNode,
    /// `None` when no embedder is available
    pub embedding: Option<Vec<f32>>,
    pub last_accessed: DateTime<Utc>,
    pub access_count: u64,
}

/// Cache statistics
#[derive(Debug, Clone, Serialize)]
pub struct CacheStats {
    pub capacity: usize,
    pub node_entries: usize,
    pub relation_entries: usize,
    pub indexed_vectors: usize,
    /// Most accessed cached nodes as `(id, access_count)`
    pub most_accessed: Vec<(String, u64)>,
}

/// Bounded LRU caches plus a similarity index over the cached nodes
pub struct CacheLayer {
    nodes: LruCache<String, CacheEntry>,
    relations: LruCache<String, Vec<String>>,
    embedder: Option<Arc<dyn Embedder>>,
    index: FlatIndex,
}

impl CacheLayer {
    pub fn new(capacity: NonZeroUsize, embedder: Option<Arc<dyn Embedder>>) -> Self {
        let dimensions = embedder.as_ref().map(|e| e.dimensions()).unwrap_or(0);
        Self {
            nodes: LruCache::new(capacity),
            relations: LruCache::new(capacity),
            embedder,
            index: FlatIndex::new(dimensions),
        }
    }

    pub fn capacity(&self) -> usize {
        self.nodes.cap().get()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.nodes.contains(id)
    }

    // ========================================================================
    // NODES
    // ========================================================================

    /// Insert or refresh a node as most recently used.
    ///
    /// The embedding is recomputed unless title and content are unchanged.
    /// Whatever falls out of the cache also leaves the similarity index.
    pub fn put_node(&mut self, node: MemoryNode) {
        let previous = self.nodes.pop(&node.id);
        let access_count = previous.as_ref().map(|e| e.access_count).unwrap_or(0);

        let reusable = previous.and_then(|e| {
            let same_text = e.node.title == node.title && e.node.content == node.content;
            if same_text {
                e.embedding
            } else {
                self.index.remove(&node.id);
                None
            }
        });

        let mut embedding = reusable;
        if embedding.is_none() {
            if let Some(vector) = self.encode(&node) {
                match self.index.add(&node.id, &vector) {
                    Ok(_) => embedding = Some(vector),
                    Err(e) => {
                        tracing::warn!(node_id = %node.id, "Cannot index cached node: {}", e)
                    }
                }
            }
        }

        let entry = CacheEntry {
            node,
            embedding,
            last_accessed: Utc::now(),
            access_count,
        };

        if let Some((evicted, _)) = self.nodes.push(entry.node.id.clone(), entry) {
            self.index.remove(&evicted);
            tracing::debug!(node_id = %evicted, "Evicted node from cache");
        }
    }

    /// Cached node, promoted to most recently used; bumps its access counter
    pub fn get_node(&mut self, id: &str) -> Option<&CacheEntry> {
        let entry = self.nodes.get_mut(id)?;
        entry.last_accessed = Utc::now();
        entry.access_count += 1;
        Some(entry)
    }

    /// Cached node without touching recency or counters
    pub fn peek_node(&self, id: &str) -> Option<&CacheEntry> {
        self.nodes.peek(id)
    }

    /// Drop a node from the cache and from the similarity index (O(n) rebuild)
    pub fn remove_node(&mut self, id: &str) -> bool {
        match self.nodes.pop(id) {
            Some(_) => {
                self.index.remove(id);
                true
            }
            None => false,
        }
    }

    /// Nearest cached nodes to `text`, ascending distance. Empty without an embedder.
    pub fn search_similar(&self, text: &str, k: usize) -> Vec<(String, f32)> {
        let Some(embedder) = self.embedder.as_ref().filter(|e| e.is_ready()) else {
            return vec![];
        };
        if self.index.is_empty() {
            return vec![];
        }

        match embedder
            .encode(text)
            .map_err(crate::search::VectorSearchError::from)
            .and_then(|query| self.index.search(&query, k))
        {
            Ok(results) => results,
            Err(e) => {
                tracing::warn!("Cache similarity search failed: {}", e);
                vec![]
            }
        }
    }

    fn encode(&self, node: &MemoryNode) -> Option<Vec<f32>> {
        let embedder = self.embedder.as_ref().filter(|e| e.is_ready())?;
        match embedder.encode(&format!("{}\n{}", node.title, node.content)) {
            Ok(vector) => Some(vector),
            Err(e) => {
                tracing::warn!(node_id = %node.id, "Cannot embed cached node: {}", e);
                None
            }
        }
    }

    // ========================================================================
    // RELATIONS
    // ========================================================================

    pub fn put_relation(&mut self, key: impl Into<String>, ids: Vec<String>) {
        self.relations.put(key.into(), ids);
    }

    /// Cached relation lookup, promoted to most recently used
    pub fn get_relation(&mut self, key: &str) -> Option<Vec<String>> {
        self.relations.get(key).cloned()
    }

    pub fn invalidate_relation(&mut self, key: &str) -> bool {
        self.relations.pop(key).is_some()
    }

    /// Forget every cached relation lookup (after graph edges change)
    pub fn invalidate_relations(&mut self) {
        self.relations.clear();
    }

    // ========================================================================
    // MAINTENANCE
    // ========================================================================

    pub fn clear(&mut self) {
        self.nodes.clear();
        self.relations.clear();
        self.index.clear();
    }

    pub fn stats(&self) -> CacheStats {
        let mut most_accessed: Vec<(String, u64)> = self
            .nodes
            .iter()
            .map(|(id, e)| (id.clone(), e.access_count))
            .collect();
        most_accessed.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        most_accessed.truncate(TOP_ACCESSED);

        CacheStats {
            capacity: self.capacity(),
            node_entries: self.nodes.len(),
            relation_entries: self.relations.len(),
            indexed_vectors: self.index.len(),
            most_accessed,
        }
    }
}

impl std::fmt::Debug for CacheLayer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheLayer")
            .field("capacity", &self.capacity())
            .field("nodes", &self.nodes.len())
            .field("relations", &self.relations.len())
            .finish()
    }
}
