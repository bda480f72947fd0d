//! Memory Node - the atomic record of the store
//!
//! Each node carries:
//! - Title, content and an open-ended type (document, conversation, note, ...)
//! - A tag set and free-form metadata (search hits, permanence, summaries)
//! - Creation and last-access timestamps (the latter feeds recency ranking)
//! - Outgoing references to other nodes and an optional category

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Metadata key counting how often a node was returned by search
pub const SEARCH_HITS_KEY: &str = "search_hits";
/// Metadata key marking a node as permanent
pub const PERMANENT_KEY: &str = "permanent";
/// Edge type created for node references
pub const REFERENCE_EDGE: &str = "reference";

// ============================================================================
// NODE TYPES
// ============================================================================

/// Well-known node types. The stored type is an open string; anything else
/// parses as [`NodeType::Other`].
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum NodeType {
    /// A saved document or knowledge-base entry
    #[default]
    Document,
    /// A conversation transcript
    Conversation,
    /// A short agent note
    Note,
    /// Any other caller-defined type
    Other,
}

impl NodeType {
    /// Convert to string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeType::Document => "document",
            NodeType::Conversation => "conversation",
            NodeType::Note => "note",
            NodeType::Other => "other",
        }
    }

    /// Parse from string name
    pub fn parse_name(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "document" => NodeType::Document,
            "conversation" => NodeType::Conversation,
            "note" => NodeType::Note,
            _ => NodeType::Other,
        }
    }
}

impl std::fmt::Display for NodeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ============================================================================
// MEMORY NODE
// ============================================================================

/// A node in the memory graph
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemoryNode {
    /// Unique identifier derived from title and creation time
    pub id: String,
    pub title: String,
    pub content: String,
    /// document | conversation | note | caller-defined
    pub node_type: String,
    /// Tag set (no duplicates, order irrelevant)
    #[serde(default)]
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
    /// Updated on every read through `get` and on keyword search matches
    pub last_accessed: DateTime<Utc>,
    /// Ids of referenced nodes (outgoing `reference` edges)
    #[serde(default)]
    pub references: Vec<String>,
    #[serde(default)]
    pub metadata: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category_id: Option<String>,
}

impl Default for MemoryNode {
    fn default() -> Self {
        let now = Utc::now();
        Self {
            id: String::new(),
            title: String::new(),
            content: String::new(),
            node_type: NodeType::Document.as_str().to_string(),
            tags: vec![],
            created_at: now,
            last_accessed: now,
            references: vec![],
            metadata: Map::new(),
            category_id: None,
        }
    }
}

impl MemoryNode {
    /// Create an unsaved node (empty id) with the given title, content and type
    pub fn new(
        title: impl Into<String>,
        content: impl Into<String>,
        node_type: impl Into<String>,
    ) -> Self {
        Self {
            title: title.into(),
            content: content.into(),
            node_type: node_type.into(),
            ..Default::default()
        }
    }

    /// Get the parsed node type
    pub fn get_node_type(&self) -> NodeType {
        NodeType::parse_name(&self.node_type)
    }

    /// Number of times search returned this node
    pub fn search_hits(&self) -> u64 {
        self.metadata
            .get(SEARCH_HITS_KEY)
            .and_then(Value::as_u64)
            .unwrap_or(0)
    }

    /// Whether the node was saved as permanent
    pub fn is_permanent(&self) -> bool {
        self.metadata
            .get(PERMANENT_KEY)
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }

    /// True if the node carries at least one of `tags`
    pub fn has_any_tag(&self, tags: &[String]) -> bool {
        tags.iter().any(|t| self.has_tag(t))
    }

    /// Age in fractional days relative to `now`, never negative
    pub fn age_days(&self, now: DateTime<Utc>) -> f64 {
        let seconds = (now - self.created_at).num_milliseconds() as f64 / 1000.0;
        (seconds / 86_400.0).max(0.0)
    }
}

/// De-duplicate tags, keeping first occurrences in order
pub(crate) fn dedup_tags(tags: Vec<String>) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    tags.into_iter()
        .filter(|t| seen.insert(t.clone()))
        .collect()
}

// ============================================================================
// INPUT TYPES
// ============================================================================

/// Input for adding a node to the store
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct NewNode {
    pub title: String,
    pub content: String,
    pub node_type: String,
    #[serde(default)]
    pub tags: Vec<String>,
    /// Referenced node ids; unknown ids are dropped silently
    #[serde(default)]
    pub references: Vec<String>,
    #[serde(default)]
    pub metadata: Map<String, Value>,
    #[serde(default)]
    pub category_id: Option<String>,
}

impl NewNode {
    pub fn new(
        title: impl Into<String>,
        content: impl Into<String>,
        node_type: impl Into<String>,
    ) -> Self {
        Self {
            title: title.into(),
            content: content.into(),
            node_type: node_type.into(),
            ..Default::default()
        }
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_references<I, S>(mut self, references: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.references = references.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_metadata(mut self, metadata: Map<String, Value>) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn with_category(mut self, category_id: impl Into<String>) -> Self {
        self.category_id = Some(category_id.into());
        self
    }
}

/// Partial update of a node. `None` leaves a field unchanged.
#[derive(Debug, Clone, Default)]
pub struct NodeUpdate {
    pub title: Option<String>,
    pub content: Option<String>,
    pub node_type: Option<String>,
    pub tags: Option<Vec<String>>,
    /// Keys merged into the existing metadata map
    pub metadata: Option<Map<String, Value>>,
    /// `Some(None)` clears the category
    pub category_id: Option<Option<String>>,
}

impl NodeUpdate {
    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn content(mut self, content: impl Into<String>) -> Self {
        self.content = Some(content.into());
        self
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
        self.tags = Some(tags.into_iter().map(Into::into).collect());
        self
    }

    pub fn metadata_entry(mut self, key: impl Into<String>, value: Value) -> Self {
        self.metadata
            .get_or_insert_with(Map::new)
            .insert(key.into(), value);
        self
    }

    pub fn category(mut self, category_id: Option<String>) -> Self {
        self.category_id = Some(category_id);
        self
    }

    /// Whether the update changes what gets embedded
    pub fn touches_text(&self) -> bool {
        self.title.is_some() || self.content.is_some()
    }

    pub(crate) fn apply(self, node: &mut MemoryNode) {
        if let Some(title) = self.title {
            node.title = title;
        }
        if let Some(content) = self.content {
            node.content = content;
        }
        if let Some(node_type) = self.node_type {
            node.node_type = node_type;
        }
        if let Some(tags) = self.tags {
            node.tags = dedup_tags(tags);
        }
        if let Some(metadata) = self.metadata {
            node.metadata.extend(metadata);
        }
        if let Some(category_id) = self.category_id {
            node.category_id = category_id;
        }
    }
}

// ============================================================================
// GRAPH EDGE
// ============================================================================

/// A directed, typed edge between two existing nodes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphEdge {
    pub source: String,
    pub target: String,
    /// `reference` or a relation type
    #[serde(rename = "type")]
    pub kind: String,
    /// Strength in [0, 1]
    pub strength: f32,
    #[serde(default)]
    pub attributes: Map<String, Value>,
}

impl GraphEdge {
    pub fn reference(source: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            kind: REFERENCE_EDGE.to_string(),
            strength: 1.0,
            attributes: Map::new(),
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================
