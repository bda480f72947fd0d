//! Memory Engine
//!
//! The single entry point an agent host constructs at startup and passes to
//! its collaborators. It owns every component:
//!
//! - [`MemoryStore`]: knowledge graph, source of truth for nodes
//! - [`EmbeddingIndex`]: persistent vector index over node texts
//! - [`Hierarchy`]: category forest and category relations
//! - [`MindMaps`]: per-task concept maps
//! - [`CacheLayer`]: optional LRU acceleration, never authoritative
//! - [`PersistenceManager`]: snapshots and crash recovery
//!
//! Mutations persist immediately; write failures are logged and the
//! in-memory state stays authoritative for the rest of the process.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::num::NonZeroUsize;
use std::path::PathBuf;
use std::sync::Arc;

use crate::backup::{BackupInfo, BackupState, EngineCounters, PersistenceManager, SessionInfo};
use crate::cache::{CacheLayer, CacheStats};
use crate::config::EngineConfig;
use crate::conversation::{self, ConversationMessage};
use crate::embeddings::Embedder;
use crate::error::{MemoryError, Result};
use crate::hierarchy::{Category, CategoryStats, Hierarchy, RelatedCategory};
use crate::memory::{
    MemoryNode, MemoryStore, NewNode, NodeType, NodeUpdate, TemporalIndex, TimeWindow,
    PERMANENT_KEY,
};
use crate::mindmap::{MindMap, MindMapMatch, MindMaps, Position};
use crate::search::{
    EmbeddingIndex, HybridRetriever, SearchHit, SearchQuery, SearchStats, VectorIndexStats,
    VectorSearchError,
};
use crate::storage::{write_json_atomic, StorageError, StoreLayout};

/// Appended to documents cut at `max_document_size`
pub const TRUNCATION_MARKER: &str = "\n...[CONTENT TRUNCATED]";
/// Tag that makes a save trigger a backup attempt
pub const IMPORTANT_TAG: &str = "important";
/// Tag carried by every agent note
pub const NOTES_TAG: &str = "agent_notes";
/// Tags carried by every knowledge-base entry
pub const KNOWLEDGE_BASE_TAGS: &[&str] = &["knowledge_base", "permanent"];

/// Tag carried by every task status note
pub const TASK_STATUS_TAG: &str = "task_status";

/// Retrieval counts reported by [`MemoryEngine::stats`]
const STATS_TOP_RETRIEVED: usize = 10;

/// Entries per section of [`MemoryEngine::session_memory`]
const PRIMING_NOTES: usize = 10;
const PRIMING_STATUSES: usize = 7;
const PRIMING_MIND_MAPS: usize = 2;
const PRIMING_KNOWLEDGE: usize = 5;
/// Knowledge-base content is cut to this many characters when priming
const PRIMING_KNOWLEDGE_CHARS: usize = 250;

// ============================================================================
// REQUEST / RESULT TYPES
// ============================================================================

/// A document save
#[non_exhaustive]
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SaveRequest {
    pub title: String,
    pub content: String,
    /// Node type; `document` when unset
    pub node_type: Option<String>,
    pub tags: Vec<String>,
    pub metadata: Map<String, Value>,
    pub category_id: Option<String>,
    /// Marks the node `metadata.permanent` and triggers a backup attempt
    pub permanent: bool,
    /// Existing node ids to link with `reference` edges
    pub references: Vec<String>,
}

impl SaveRequest {
    pub fn new(title: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            content: content.into(),
            ..Default::default()
        }
    }

    pub fn node_type(mut self, node_type: impl Into<String>) -> Self {
        self.node_type = Some(node_type.into());
        self
    }

    pub fn tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    pub fn metadata(mut self, metadata: Map<String, Value>) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn category(mut self, category_id: impl Into<String>) -> Self {
        self.category_id = Some(category_id.into());
        self
    }

    pub fn permanent(mut self, permanent: bool) -> Self {
        self.permanent = permanent;
        self
    }

    pub fn references<I, S>(mut self, references: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.references = references.into_iter().map(Into::into).collect();
        self
    }
}

/// Importance of an agent note
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NoteImportance {
    #[default]
    Normal,
    /// Tagged `important`, stored permanent
    High,
}

impl NoteImportance {
    pub fn as_str(&self) -> &'static str {
        match self {
            NoteImportance::Normal => "normal",
            NoteImportance::High => "high",
        }
    }

    /// `high` (any case) is high; anything else is normal
    pub fn parse_name(s: &str) -> Self {
        if s.eq_ignore_ascii_case("high") {
            NoteImportance::High
        } else {
            NoteImportance::Normal
        }
    }
}

/// Nodes created within a window, by type
#[derive(Debug, Clone, Serialize)]
pub struct ActivitySummary {
    pub window: String,
    pub since: DateTime<Utc>,
    pub created: usize,
    pub accessed: usize,
    pub by_type: BTreeMap<String, usize>,
}

/// A note or status line recalled for session priming
#[derive(Debug, Clone, Serialize)]
pub struct PrimingNote {
    pub id: String,
    pub content: String,
    pub note_type: String,
    pub importance: String,
    pub created_at: DateTime<Utc>,
}

/// A mind map listed for session priming
#[derive(Debug, Clone, Serialize)]
pub struct PrimingMap {
    pub id: String,
    pub title: String,
    pub description: String,
    pub concepts: usize,
    pub links: usize,
}

/// A knowledge-base entry recalled for session priming
#[derive(Debug, Clone, Serialize)]
pub struct PrimingKnowledge {
    pub id: String,
    pub title: String,
    pub content: String,
}

/// What a new session should know before its first turn, assembled by
/// [`MemoryEngine::session_memory`]
#[derive(Debug, Clone, Default, Serialize)]
pub struct SessionMemory {
    pub agent_notes: Vec<PrimingNote>,
    pub task_statuses: Vec<PrimingNote>,
    pub mind_maps: Vec<PrimingMap>,
    pub knowledge_base: Vec<PrimingKnowledge>,
}

/// Snapshot of engine state for monitoring
#[derive(Debug, Clone, Serialize)]
pub struct EngineStats {
    pub root: PathBuf,
    pub nodes: usize,
    pub edges: usize,
    pub node_types: BTreeMap<String, usize>,
    pub categories: usize,
    pub category_relations: usize,
    pub mind_maps: usize,
    pub vectors: VectorIndexStats,
    pub cache: Option<CacheStats>,
    pub counters: EngineCounters,
    pub access_patterns: BTreeMap<String, u64>,
    pub top_retrieved: Vec<(String, u64)>,
    pub last_backup: Option<DateTime<Utc>>,
    /// Snapshot restored at startup, if any
    pub recovered_from: Option<String>,
    pub session: SessionInfo,
}

/// Payload of `conversations/{id}.json`
#[derive(Serialize)]
struct ConversationFile<'a> {
    conversation_id: &'a str,
    node_id: &'a str,
    messages: &'a [ConversationMessage],
    summary: &'a str,
    metadata: &'a Map<String, Value>,
    category_id: Option<&'a str>,
    created_at: DateTime<Utc>,
}

// ============================================================================
// ENGINE
// ============================================================================

/// Long-term memory for one agent
pub struct MemoryEngine {
    config: EngineConfig,
    layout: StoreLayout,
    store: MemoryStore,
    index: EmbeddingIndex,
    hierarchy: Hierarchy,
    mind_maps: MindMaps,
    cache: Option<CacheLayer>,
    persistence: PersistenceManager,
    search_stats: SearchStats,
    counters: EngineCounters,
    session_started: DateTime<Utc>,
    recovered_from: Option<String>,
}

impl MemoryEngine {
    /// Open (or create) the store at `config.root`.
    ///
    /// Restores the newest snapshot first when the live files are older than
    /// the recovery marker or the graph is unreadable, then loads every
    /// component. Missing or corrupt component files start empty.
    pub fn open(config: EngineConfig, embedder: Option<Arc<dyn Embedder>>) -> Result<Self> {
        let layout = StoreLayout::new(&config.root);
        layout.create_dirs()?;

        let interval = chrono::Duration::from_std(config.limits.backup_interval)
            .unwrap_or_else(|_| chrono::Duration::hours(1));
        let persistence =
            PersistenceManager::new(layout.clone(), config.limits.max_backups, interval);

        let recovered = if persistence.needs_recovery() {
            match persistence.recover() {
                Ok(recovered) => recovered,
                Err(e) => {
                    tracing::error!("Recovery from backup failed, loading live files: {}", e);
                    None
                }
            }
        } else {
            None
        };

        let removed = persistence.cleanup_temp(config.limits.temp_file_max_age);
        if removed > 0 {
            tracing::debug!(removed, "Removed stale temp files");
        }

        let store = MemoryStore::open(layout.clone());
        let index = EmbeddingIndex::open(&layout, embedder.clone(), config.index_flush_every);
        let hierarchy = Hierarchy::open(layout.clone());
        let mind_maps = MindMaps::open(layout.clone());
        let cache = NonZeroUsize::new(config.cache_capacity)
            .map(|capacity| CacheLayer::new(capacity, embedder.clone()));

        let (search_stats, counters, recovered_from) = match recovered {
            Some(state) => {
                let rewritten = store.rewrite_documents();
                let mut counters = state.counters;
                counters.recoveries += 1;
                tracing::warn!(
                    snapshot = %state.snapshot,
                    nodes = store.len(),
                    documents = rewritten,
                    "Recovered memory from backup"
                );
                (state.search, counters, Some(state.snapshot))
            }
            None => (SearchStats::default(), EngineCounters::default(), None),
        };

        let mut engine = Self {
            config,
            layout,
            store,
            index,
            hierarchy,
            mind_maps,
            cache,
            persistence,
            search_stats,
            counters,
            session_started: Utc::now(),
            recovered_from,
        };
        engine.reindex_missing();

        tracing::info!(
            root = %engine.layout.root().display(),
            nodes = engine.store.len(),
            edges = engine.store.edge_count(),
            vectors = engine.index.len(),
            categories = engine.hierarchy.len(),
            mind_maps = engine.mind_maps.len(),
            "Memory engine ready"
        );

        Ok(engine)
    }

    /// Embed nodes the vector index lost (unflushed inserts, a discarded or
    /// re-dimensioned index). Stops at the first failure.
    fn reindex_missing(&mut self) {
        if !self.index.is_available() {
            return;
        }
        let missing: Vec<(String, String)> = self
            .store
            .nodes()
            .filter(|node| !self.index.contains(&node.id))
            .map(|node| (node.id.clone(), index_text(node)))
            .collect();
        if missing.is_empty() {
            return;
        }

        let mut indexed = 0;
        for (id, text) in &missing {
            match self.index.add(id, text) {
                Ok(_) => indexed += 1,
                Err(e) => {
                    tracing::warn!(node_id = %id, "Stopped re-indexing missing nodes: {}", e);
                    break;
                }
            }
        }
        if self.index.pending_writes() > 0 {
            if let Err(e) = self.index.flush() {
                tracing::error!("Failed to flush re-indexed vectors: {}", e);
            }
        }
        tracing::info!(indexed, missing = missing.len(), "Re-indexed nodes missing vectors");
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn layout(&self) -> &StoreLayout {
        &self.layout
    }

    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    /// Read access to the graph for queries the facade does not wrap
    pub fn store(&self) -> &MemoryStore {
        &self.store
    }

    pub fn hierarchy(&self) -> &Hierarchy {
        &self.hierarchy
    }

    pub fn mind_maps(&self) -> &MindMaps {
        &self.mind_maps
    }

    pub fn index(&self) -> &EmbeddingIndex {
        &self.index
    }

    pub fn search_stats(&self) -> &SearchStats {
        &self.search_stats
    }

    pub fn counters(&self) -> &EngineCounters {
        &self.counters
    }

    // ========================================================================
    // SAVING
    // ========================================================================

    /// Save a document and index `"{title}\n{content}"`.
    ///
    /// Content over `max_document_size` bytes is cut and marked
    /// (`metadata.truncated`, `metadata.original_size`). Every
    /// `auto_backup_every` saves, and on permanent or `important` saves, a
    /// backup is attempted (still subject to the backup interval).
    ///
    /// A vector dimension mismatch is returned as an error; the node itself
    /// is stored and remains reachable by keyword search.
    pub fn save(&mut self, request: SaveRequest) -> Result<String> {
        let SaveRequest {
            title,
            mut content,
            node_type,
            tags,
            mut metadata,
            category_id,
            permanent,
            references,
        } = request;

        let max = self.config.limits.max_document_size;
        if content.len() > max {
            let original_size = content.len();
            content.truncate(floor_char_boundary(&content, max));
            content.push_str(TRUNCATION_MARKER);
            tracing::warn!(
                title = %title,
                original_size,
                truncated_size = content.len(),
                "Document truncated"
            );
            metadata.insert("truncated".into(), Value::Bool(true));
            metadata.insert("original_size".into(), original_size.into());
        }
        if permanent {
            metadata.insert(PERMANENT_KEY.into(), Value::Bool(true));
        }
        metadata.insert("timestamp".into(), Value::String(Utc::now().to_rfc3339()));

        let node_type = node_type.unwrap_or_else(|| NodeType::Document.as_str().to_string());
        let important = tags.iter().any(|t| t == IMPORTANT_TAG);
        let embed_text = format!("{title}\n{content}");

        let mut node = NewNode::new(title, content, node_type.as_str())
            .with_tags(tags)
            .with_references(references)
            .with_metadata(metadata);
        if let Some(category_id) = category_id {
            node = node.with_category(category_id);
        }

        let id = self.insert(node);
        if node_type == NodeType::Document.as_str() {
            self.counters.documents_saved += 1;
        }
        tracing::info!(node_id = %id, node_type = %node_type, "Saved memory");

        let indexed = self.index_node(&id, &embed_text);
        self.maybe_auto_backup(permanent || important);
        indexed.map(|_| id)
    }

    /// Save a permanent knowledge-base entry
    pub fn add_to_knowledge_base(
        &mut self,
        title: &str,
        content: &str,
        tags: &[String],
    ) -> Result<String> {
        let mut all_tags: Vec<String> = KNOWLEDGE_BASE_TAGS.iter().map(|t| t.to_string()).collect();
        all_tags.extend(tags.iter().cloned());

        let mut metadata = Map::new();
        metadata.insert("kind".into(), "knowledge_base".into());
        metadata.insert("importance".into(), "high".into());

        self.save(
            SaveRequest::new(title, content)
                .tags(all_tags)
                .metadata(metadata)
                .permanent(true),
        )
    }

    /// Save a conversation transcript.
    ///
    /// The node content is the JSON message list; the generated summary is
    /// kept in `metadata.summary` and is what gets embedded. A copy is written
    /// to `conversations/{conversation_id}.json`, so an id that is not a plain
    /// file name ([`StoreLayout::is_safe_name`]) is rejected before anything
    /// is stored.
    pub fn save_conversation(
        &mut self,
        conversation_id: &str,
        messages: &[ConversationMessage],
        mut metadata: Map<String, Value>,
        category_id: Option<&str>,
    ) -> Result<String> {
        let conversation_file = self.layout.conversation_file(conversation_id)?;
        let summary = conversation::summarize(messages);
        let content = serde_json::to_string_pretty(messages).map_err(StorageError::from)?;

        metadata.insert("conversation_id".into(), conversation_id.into());
        metadata.insert("message_count".into(), messages.len().into());
        metadata.insert("summary".into(), Value::String(summary.clone()));

        let mut node = NewNode::new(
            format!("Conversation {conversation_id}"),
            content,
            NodeType::Conversation.as_str(),
        )
        .with_tags(["conversation"])
        .with_metadata(metadata.clone());
        if let Some(category_id) = category_id {
            node = node.with_category(category_id);
        }

        let id = self.insert(node);
        self.counters.conversations_saved += 1;

        let file = ConversationFile {
            conversation_id,
            node_id: &id,
            messages,
            summary: &summary,
            metadata: &metadata,
            category_id,
            created_at: Utc::now(),
        };
        if let Err(e) = write_json_atomic(&conversation_file, &file) {
            tracing::error!(conversation_id, "Failed to write conversation file: {}", e);
        }
        tracing::info!(
            node_id = %id,
            conversation_id,
            messages = messages.len(),
            "Saved conversation"
        );

        let indexed = self.index_node(&id, &summary);
        self.maybe_auto_backup(false);
        indexed.map(|_| id)
    }

    /// Add a short agent note, cut to `max_note_length` characters.
    ///
    /// Tagged `agent_notes` plus the note type; high importance adds
    /// `important` and stores the note permanent.
    pub fn add_note(
        &mut self,
        text: &str,
        note_type: &str,
        importance: NoteImportance,
        tags: &[String],
    ) -> Result<String> {
        let max = self.config.limits.max_note_length;
        let text = cut_chars(text, max);

        let mut note_tags = vec![NOTES_TAG.to_string(), note_type.to_string()];
        note_tags.extend(tags.iter().cloned());
        if importance == NoteImportance::High {
            note_tags.push(IMPORTANT_TAG.to_string());
        }

        let mut metadata = Map::new();
        metadata.insert("note_type".into(), note_type.into());
        metadata.insert("importance".into(), importance.as_str().into());

        let title = format!(
            "{} Note - {}",
            title_case(note_type),
            Utc::now().format("%Y-%m-%d %H:%M")
        );

        let id = self.save(
            SaveRequest::new(title, text)
                .node_type(NodeType::Note.as_str())
                .tags(note_tags)
                .metadata(metadata)
                .permanent(importance == NoteImportance::High),
        )?;
        self.counters.notes_added += 1;
        Ok(id)
    }

    /// Store the node, count it and refresh the cache
    fn insert(&mut self, node: NewNode) -> String {
        let id = self.store.add(node);
        self.counters.nodes_added += 1;
        if let Some(cache) = self.cache.as_mut() {
            cache.invalidate_relations();
            if let Some(node) = self.store.peek(&id) {
                cache.put_node(node.clone());
            }
        }
        id
    }

    /// Add a node's text to the vector index. Only a dimension mismatch is an
    /// error; every other failure degrades to keyword-only for that node.
    fn index_node(&mut self, id: &str, text: &str) -> Result<()> {
        match self.index.add(id, text) {
            Ok(_) => Ok(()),
            Err(e @ VectorSearchError::InvalidDimensions(..)) => Err(e.into()),
            Err(e) => {
                tracing::warn!(node_id = %id, "Failed to index node: {}", e);
                Ok(())
            }
        }
    }

    fn maybe_auto_backup(&mut self, urgent: bool) {
        let every = self.config.limits.auto_backup_every.max(1);
        if !urgent && self.counters.nodes_added % every != 0 {
            return;
        }
        if let Err(e) = self.create_backup(false) {
            tracing::error!("Automatic backup failed: {}", e);
        }
    }

    // ========================================================================
    // RETRIEVAL
    // ========================================================================

    /// Hybrid keyword + vector search. Never fails; see [`HybridRetriever`].
    pub fn search(&mut self, query: &SearchQuery) -> Vec<SearchHit> {
        let hits = HybridRetriever::new(&self.config.search).search(
            &mut self.store,
            &self.index,
            &mut self.search_stats,
            query,
        );
        self.counters.searches_performed = self.search_stats.searches_performed;

        if let Some(cache) = self.cache.as_mut() {
            for hit in &hits {
                if cache.contains(&hit.node.id) {
                    cache.put_node(hit.node.clone());
                }
            }
        }
        hits
    }

    /// Fetch a node, touching `last_accessed` (persisted)
    pub fn get(&mut self, id: &str) -> Option<MemoryNode> {
        let node = self.store.get(id)?;
        if let Some(cache) = self.cache.as_mut() {
            cache.put_node(node.clone());
            cache.get_node(id);
        }
        Some(node)
    }

    /// Fetch a node without touching it
    pub fn peek(&self, id: &str) -> Option<&MemoryNode> {
        self.store.peek(id)
    }

    /// Apply a partial update. Text changes re-index the node (O(n) rebuild).
    /// Returns `Ok(false)` for an unknown id.
    pub fn update(&mut self, id: &str, update: NodeUpdate) -> Result<bool> {
        let text_changed = update.touches_text();
        if !self.store.update(id, update) {
            return Ok(false);
        }
        if let Some(cache) = self.cache.as_mut() {
            cache.remove_node(id);
        }

        if text_changed && self.index.contains(id) {
            let text = self
                .store
                .peek(id)
                .map(index_text)
                .ok_or_else(|| MemoryError::NodeNotFound(id.to_string()))?;
            self.index.remove(id)?;
            self.index_node(id, &text)?;
        }
        Ok(true)
    }

    /// Nodes within `max_depth` hops in either direction. Cached per (id, depth).
    pub fn related(&mut self, id: &str, max_depth: usize) -> Vec<MemoryNode> {
        let key = format!("{id}:{max_depth}");
        if let Some(ids) = self.cache.as_mut().and_then(|c| c.get_relation(&key)) {
            return ids
                .iter()
                .filter_map(|id| self.store.peek(id).cloned())
                .collect();
        }

        let related = self.store.related(id, max_depth);
        if let Some(cache) = self.cache.as_mut() {
            cache.put_relation(key, related.iter().map(|n| n.id.clone()).collect());
        }
        related
    }

    /// Add a typed edge between two existing nodes
    pub fn link(
        &mut self,
        source: &str,
        target: &str,
        kind: &str,
        strength: f32,
        attributes: Map<String, Value>,
    ) -> bool {
        let linked = self.store.link(source, target, kind, strength, attributes);
        if linked {
            if let Some(cache) = self.cache.as_mut() {
                cache.invalidate_relations();
            }
        }
        linked
    }

    /// Cached nodes most similar to `text`, ascending distance
    pub fn similar_cached(&self, text: &str, k: usize) -> Vec<(MemoryNode, f32)> {
        let Some(cache) = self.cache.as_ref() else {
            return vec![];
        };
        cache
            .search_similar(text, k)
            .into_iter()
            .filter_map(|(id, distance)| self.store.peek(&id).map(|n| (n.clone(), distance)))
            .collect()
    }

    // ========================================================================
    // CATEGORIES
    // ========================================================================

    pub fn add_category(
        &mut self,
        name: &str,
        description: &str,
        parent_id: Option<&str>,
    ) -> String {
        self.hierarchy
            .add_category(name, description, parent_id, Map::new())
    }

    pub fn category(&self, id: &str) -> Option<&Category> {
        self.hierarchy.category(id)
    }

    pub fn categories(&self) -> Vec<&Category> {
        self.hierarchy.categories()
    }

    pub fn update_category(
        &mut self,
        id: &str,
        name: Option<&str>,
        description: Option<&str>,
    ) -> bool {
        self.hierarchy.update_category(id, name, description)
    }

    pub fn subcategories(&self, id: &str, recursive: bool) -> Vec<&Category> {
        self.hierarchy.subcategories(id, recursive)
    }

    /// Root → `id` path
    pub fn category_path(&self, id: &str) -> Vec<&Category> {
        self.hierarchy.path(id)
    }

    pub fn category_stats(&self, id: &str) -> Option<CategoryStats> {
        self.hierarchy.category_stats(id)
    }

    /// Fold `source` into `target`, then move `source`'s nodes into `target`
    pub fn merge_categories(&mut self, source: &str, target: &str) -> bool {
        if !self.hierarchy.merge_categories(source, target) {
            return false;
        }

        let moved: Vec<String> = self
            .store
            .nodes()
            .filter(|n| n.category_id.as_deref() == Some(source))
            .map(|n| n.id.clone())
            .collect();
        for id in &moved {
            if let Some(node) = self.store.node_mut(id) {
                node.category_id = Some(target.to_string());
            }
            if let Some(cache) = self.cache.as_mut() {
                cache.remove_node(id);
            }
        }
        if !moved.is_empty() {
            let touched: Vec<&str> = moved.iter().map(String::as_str).collect();
            self.store.persist(&touched);
        }

        tracing::info!(source, target, nodes = moved.len(), "Merged categories");
        true
    }

    /// Relate two existing categories. `false` when either is unknown.
    pub fn add_relation(
        &mut self,
        source: &str,
        target: &str,
        relation_type: &str,
        strength: f32,
    ) -> bool {
        self.hierarchy
            .add_relation(source, target, relation_type, strength, Map::new())
    }

    pub fn strengthen_relation(&mut self, source: &str, target: &str, amount: f32) -> bool {
        self.hierarchy.strengthen_relation(source, target, amount)
    }

    pub fn related_categories(
        &self,
        id: &str,
        types: Option<&[String]>,
        min_strength: f32,
    ) -> Vec<RelatedCategory> {
        self.hierarchy.related(id, types, min_strength)
    }

    /// Put a node into an existing category
    pub fn move_to_category(&mut self, node_id: &str, category_id: &str) -> bool {
        if !self.hierarchy.contains(category_id) {
            return false;
        }
        let moved = self
            .store
            .update(node_id, NodeUpdate::default().category(Some(category_id.to_string())));
        if moved {
            if let Some(cache) = self.cache.as_mut() {
                cache.remove_node(node_id);
            }
        }
        moved
    }

    /// Nodes filed under `id`, and under its descendants when `recursive`
    pub fn category_contents(&self, id: &str, recursive: bool) -> Vec<MemoryNode> {
        if !self.hierarchy.contains(id) {
            return vec![];
        }
        let mut ids = vec![id.to_string()];
        if recursive {
            ids.extend(
                self.hierarchy
                    .subcategories(id, true)
                    .into_iter()
                    .map(|c| c.id.clone()),
            );
        }
        self.store
            .find(|n| n.category_id.as_ref().is_some_and(|c| ids.contains(c)))
    }

    /// Category names from the root down to the node's category
    pub fn node_path(&self, node_id: &str) -> Vec<String> {
        self.store
            .peek(node_id)
            .and_then(|n| n.category_id.as_deref())
            .map(|category| {
                self.hierarchy
                    .path(category)
                    .into_iter()
                    .map(|c| c.name.clone())
                    .collect()
            })
            .unwrap_or_default()
    }

    // ========================================================================
    // MIND MAPS
    // ========================================================================

    /// Create a mind map and leave an agent note recording it
    pub fn create_mind_map(
        &mut self,
        title: &str,
        description: &str,
        map_type: &str,
    ) -> Result<String> {
        let id = self.mind_maps.create(title, description, map_type)?;
        self.counters.mind_maps_created += 1;

        let tags = ["mind_map".to_string(), map_type.to_string()];
        let note = format!("Created new mind map: {title}");
        if let Err(e) = self.add_note(&note, "mind_map_created", NoteImportance::Normal, &tags) {
            tracing::warn!(map_id = %id, "Failed to record mind map note: {}", e);
        }
        Ok(id)
    }

    /// Add a concept to a map, linked from `related_to` when given
    pub fn add_mind_map_concept(
        &mut self,
        map_id: &str,
        title: &str,
        content: &str,
        related_to: Option<&str>,
        link_type: &str,
        position: Option<Position>,
    ) -> Result<String> {
        Ok(self
            .mind_maps
            .add_concept(map_id, title, content, related_to, link_type, position)?)
    }

    pub fn link_mind_map_concepts(
        &mut self,
        map_id: &str,
        source: &str,
        target: &str,
        link_type: &str,
        strength: f32,
    ) -> Result<String> {
        Ok(self
            .mind_maps
            .link(map_id, source, target, link_type, strength)?)
    }

    /// A map, with every concept marked accessed
    pub fn mind_map(&mut self, map_id: &str) -> Option<&MindMap> {
        self.mind_maps.get(map_id)
    }

    pub fn search_mind_maps(&self, query: &str, limit: usize) -> Vec<MindMapMatch> {
        self.mind_maps.search(query, limit)
    }

    pub fn mind_map_summary(&self, map_id: &str) -> Option<String> {
        self.mind_maps.summary(map_id)
    }

    // ========================================================================
    // TASKS / SESSION PRIMING
    // ========================================================================

    /// Record a task status as a `status_updates` note. `completed` and
    /// `error` statuses are high importance.
    pub fn log_task_status(
        &mut self,
        task_title: &str,
        status: &str,
        details: Option<&str>,
    ) -> Result<String> {
        let mut text = format!("Task: {task_title}\nStatus: {status}");
        if let Some(details) = details {
            text.push_str("\nDetails: ");
            text.push_str(details);
        }
        let importance = if matches!(status, "completed" | "error") {
            NoteImportance::High
        } else {
            NoteImportance::Normal
        };
        let tags = [TASK_STATUS_TAG.to_string(), status.to_string()];

        let id = self.add_note(&text, "status_updates", importance, &tags)?;
        self.counters.task_statuses_logged += 1;
        Ok(id)
    }

    /// Important agent notes, recent task statuses, the latest mind maps and
    /// knowledge-base entries, newest first. A pure read: nothing is touched.
    pub fn session_memory(&self) -> SessionMemory {
        let agent_notes = self
            .newest_tagged(&[NOTES_TAG, IMPORTANT_TAG], PRIMING_NOTES)
            .into_iter()
            .map(priming_note)
            .collect();
        let task_statuses = self
            .newest_tagged(&[TASK_STATUS_TAG], PRIMING_STATUSES)
            .into_iter()
            .map(priming_note)
            .collect();
        let mind_maps = self
            .mind_maps
            .recent(PRIMING_MIND_MAPS)
            .into_iter()
            .map(|map| PrimingMap {
                id: map.id.clone(),
                title: map.title.clone(),
                description: map.description.clone(),
                concepts: map.concepts.len(),
                links: map.links.len(),
            })
            .collect();
        let knowledge_base = self
            .newest_tagged(&[KNOWLEDGE_BASE_TAGS[0]], PRIMING_KNOWLEDGE)
            .into_iter()
            .map(|node| PrimingKnowledge {
                id: node.id.clone(),
                title: node.title.clone(),
                content: cut_chars(node.content.trim(), PRIMING_KNOWLEDGE_CHARS),
            })
            .collect();

        SessionMemory {
            agent_notes,
            task_statuses,
            mind_maps,
            knowledge_base,
        }
    }

    /// Nodes carrying every tag in `tags`, newest created first
    fn newest_tagged(&self, tags: &[&str], limit: usize) -> Vec<&MemoryNode> {
        let mut nodes: Vec<&MemoryNode> = self
            .store
            .nodes()
            .filter(|node| tags.iter().all(|tag| node.tags.iter().any(|t| t == tag)))
            .collect();
        nodes.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        nodes.truncate(limit);
        nodes
    }

    // ========================================================================
    // TEMPORAL
    // ========================================================================

    /// Nodes accessed within the window, most recent first
    pub fn recent(&self, window: TimeWindow) -> Vec<MemoryNode> {
        TemporalIndex::new(&self.store).window(window)
    }

    /// [`Self::recent`] with a window name (`recent|day|week|month|<n>h`)
    pub fn recent_named(&self, window: &str) -> Result<Vec<MemoryNode>> {
        Ok(self.recent(window.parse()?))
    }

    pub fn around(&self, id: &str, window: TimeWindow) -> Vec<MemoryNode> {
        TemporalIndex::new(&self.store).around(id, window)
    }

    pub fn between(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> Vec<MemoryNode> {
        TemporalIndex::new(&self.store).between(start, end)
    }

    pub fn activity_summary(&self, window: TimeWindow) -> ActivitySummary {
        let since = window.since(Utc::now());
        let mut by_type = BTreeMap::new();
        let mut created = 0;
        let mut accessed = 0;
        for node in self.store.nodes() {
            if node.created_at >= since {
                created += 1;
                *by_type.entry(node.node_type.clone()).or_insert(0) += 1;
            }
            if node.last_accessed >= since {
                accessed += 1;
            }
        }
        ActivitySummary {
            window: window.to_string(),
            since,
            created,
            accessed,
            by_type,
        }
    }

    // ========================================================================
    // BACKUP / MAINTENANCE
    // ========================================================================

    /// Snapshot the store. Unless `force`, skipped within the backup interval.
    /// Returns the snapshot directory when one was written.
    pub fn create_backup(&mut self, force: bool) -> Result<Option<PathBuf>> {
        if !force && !self.persistence.is_due(Utc::now()) {
            tracing::debug!("Backup skipped, not enough time elapsed since last backup");
            return Ok(None);
        }

        self.index.flush()?;
        let state = BackupState {
            timestamp: Utc::now(),
            num_nodes: self.store.len(),
            num_edges: self.store.edge_count(),
            num_categories: self.hierarchy.len(),
            num_vectors: self.index.len(),
            num_mind_maps: self.mind_maps.len(),
            counters: self.counters.clone(),
            store_modified: None,
        };
        let session = SessionInfo::since(self.session_started);

        let snapshot = self
            .persistence
            .snapshot(&state, &self.search_stats, &session, force)?;
        if let Some(path) = &snapshot {
            self.counters.backups_created += 1;
            tracing::info!(path = %path.display(), nodes = state.num_nodes, "Created backup");
        }
        Ok(snapshot)
    }

    /// Snapshots on disk, newest first
    pub fn list_backups(&self) -> Result<Vec<BackupInfo>> {
        Ok(self.persistence.list_backups()?)
    }

    pub fn stats(&self) -> EngineStats {
        let mut node_types = BTreeMap::new();
        for node in self.store.nodes() {
            *node_types.entry(node.node_type.clone()).or_insert(0) += 1;
        }

        EngineStats {
            root: self.layout.root().to_path_buf(),
            nodes: self.store.len(),
            edges: self.store.edge_count(),
            node_types,
            categories: self.hierarchy.len(),
            category_relations: self.hierarchy.relation_count(),
            mind_maps: self.mind_maps.len(),
            vectors: self.index.stats(),
            cache: self.cache.as_ref().map(CacheLayer::stats),
            counters: self.counters.clone(),
            access_patterns: self
                .search_stats
                .access_patterns
                .iter()
                .map(|(k, v)| (k.clone(), *v))
                .collect(),
            top_retrieved: self.search_stats.top_retrieved(STATS_TOP_RETRIEVED),
            last_backup: self.persistence.last_backup(),
            recovered_from: self.recovered_from.clone(),
            session: SessionInfo::since(self.session_started),
        }
    }

    /// Every node, in insertion order
    pub fn export(&self) -> Vec<MemoryNode> {
        self.store.export()
    }

    /// Insert exported nodes, keeping ids and timestamps. Nodes whose id is
    /// already present are skipped. Returns how many were imported.
    pub fn import(&mut self, nodes: Vec<MemoryNode>) -> Result<usize> {
        let mut imported = 0;
        for node in nodes {
            let id = node.id.clone();
            let text = index_text(&node);
            if !self.store.import(node) {
                tracing::debug!(node_id = %id, "Skipped import of existing or unsafe node id");
                continue;
            }
            self.index_node(&id, &text)?;
            imported += 1;
        }
        if let Some(cache) = self.cache.as_mut() {
            cache.invalidate_relations();
        }
        tracing::info!(imported, "Imported memory nodes");
        Ok(imported)
    }

    /// Persist anything buffered (vector index inserts, hierarchy)
    pub fn flush(&mut self) -> Result<()> {
        if self.index.pending_writes() > 0 {
            self.index.flush()?;
        }
        self.hierarchy.save()?;
        Ok(())
    }
}

impl Drop for MemoryEngine {
    fn drop(&mut self) {
        if self.index.pending_writes() == 0 {
            return;
        }
        if let Err(e) = self.index.flush() {
            tracing::error!("Failed to flush vector index on shutdown: {}", e);
        }
    }
}

impl std::fmt::Debug for MemoryEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryEngine")
            .field("root", &self.layout.root())
            .field("store", &self.store)
            .field("index", &self.index)
            .field("categories", &self.hierarchy.len())
            .field("cache", &self.cache)
            .finish()
    }
}

/// Text a node is embedded from: the summary for conversations,
/// `"{title}\n{content}"` for everything else
fn index_text(node: &MemoryNode) -> String {
    let summary = (node.node_type == NodeType::Conversation.as_str())
        .then(|| node.metadata.get("summary").and_then(Value::as_str))
        .flatten();
    match summary {
        Some(summary) => summary.to_string(),
        None => format!("{}\n{}", node.title, node.content),
    }
}

fn priming_note(node: &MemoryNode) -> PrimingNote {
    let field = |key: &str, default: &str| {
        node.metadata
            .get(key)
            .and_then(Value::as_str)
            .unwrap_or(default)
            .to_string()
    };
    PrimingNote {
        id: node.id.clone(),
        content: node.content.clone(),
        note_type: field("note_type", "general"),
        importance: field("importance", "normal"),
        created_at: node.created_at,
    }
}

/// First `max` characters, ending in `...` when cut
fn cut_chars(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let mut cut: String = text.chars().take(max.saturating_sub(3)).collect();
    cut.push_str("...");
    cut
}

/// Largest char boundary `<= max`
fn floor_char_boundary(s: &str, max: usize) -> usize {
    if max >= s.len() {
        return s.len();
    }
    let mut cut = max;
    while !s.is_char_boundary(cut) {
        cut -= 1;
    }
    cut
}

fn title_case(s: &str) -> String {
    s.split(['_', ' '])
        .filter(|w| !w.is_empty())
        .map(|w| {
            let mut chars = w.chars();
            match chars.next() {
                Some(first) => first
                    .to_uppercase()
                    .chain(chars.flat_map(char::to_lowercase))
                    .collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}
