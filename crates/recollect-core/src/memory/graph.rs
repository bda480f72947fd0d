//! Graph-backed node store
//!
//! Directed graph of [`MemoryNode`]s and typed [`GraphEdge`]s, persisted twice:
//! the whole graph as `graph.json` (atomic replace after every mutation) and each
//! node as `documents/{id}.json` (with `.bak` rotation).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{HashMap, HashSet, VecDeque};
use uuid::Uuid;

use super::node::{dedup_tags, GraphEdge, MemoryNode, NewNode, NodeUpdate, REFERENCE_EDGE};
use crate::storage::{read_json, write_json_atomic, write_json_with_backup, StoreLayout};

/// On-disk shape of `graph.json`
#[derive(Debug, Default, Serialize, Deserialize)]
pub(crate) struct GraphFile {
    #[serde(default)]
    pub nodes: Vec<MemoryNode>,
    #[serde(default)]
    pub edges: Vec<GraphEdge>,
}

#[derive(Serialize)]
struct GraphFileRef<'a> {
    nodes: &'a [MemoryNode],
    edges: &'a [GraphEdge],
}

/// Length of generated node ids (hex chars)
const NODE_ID_LEN: usize = 12;

/// The node/edge store
pub struct MemoryStore {
    layout: StoreLayout,
    nodes: Vec<MemoryNode>,
    index: HashMap<String, usize>,
    edges: Vec<GraphEdge>,
    edge_index: HashMap<(String, String), usize>,
    outgoing: HashMap<String, Vec<String>>,
    incoming: HashMap<String, Vec<String>>,
}

impl MemoryStore {
    /// Load `graph.json` under `layout`. A missing or corrupt file yields an
    /// empty graph and a warning.
    pub fn open(layout: StoreLayout) -> Self {
        let mut store = Self::empty(layout);

        match read_json::<GraphFile>(&store.layout.graph_file()) {
            Ok(Some(file)) => {
                for node in file.nodes {
                    store.insert_node(node);
                }
                for edge in file.edges {
                    store.insert_edge(edge);
                }
                tracing::info!(
                    nodes = store.nodes.len(),
                    edges = store.edges.len(),
                    "Loaded memory graph"
                );
            }
            Ok(None) => tracing::debug!("No memory graph on disk, starting empty"),
            Err(e) => tracing::warn!("Error loading memory graph, starting empty: {}", e),
        }

        store
    }

    fn empty(layout: StoreLayout) -> Self {
        Self {
            layout,
            nodes: Vec::new(),
            index: HashMap::new(),
            edges: Vec::new(),
            edge_index: HashMap::new(),
            outgoing: HashMap::new(),
            incoming: HashMap::new(),
        }
    }

    pub fn layout(&self) -> &StoreLayout {
        &self.layout
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    /// Nodes in insertion order
    pub fn nodes(&self) -> impl Iterator<Item = &MemoryNode> {
        self.nodes.iter()
    }

    pub fn edges(&self) -> &[GraphEdge] {
        &self.edges
    }

    pub fn edge(&self, source: &str, target: &str) -> Option<&GraphEdge> {
        self.edge_index
            .get(&(source.to_string(), target.to_string()))
            .map(|&i| &self.edges[i])
    }

    /// Direct successors (targets of outgoing edges)
    pub fn successors(&self, id: &str) -> &[String] {
        self.outgoing.get(id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Direct predecessors (sources of incoming edges)
    pub fn predecessors(&self, id: &str) -> &[String] {
        self.incoming.get(id).map(Vec::as_slice).unwrap_or(&[])
    }

    // ========================================================================
    // WRITES
    // ========================================================================

    /// Add a node and its `reference` edges. References to unknown nodes are
    /// dropped without error. Returns the new id.
    pub fn add(&mut self, input: NewNode) -> String {
        let now = Utc::now();
        let id = self.generate_id(&input.title, now);

        let node = MemoryNode {
            id: id.clone(),
            title: input.title,
            content: input.content,
            node_type: input.node_type,
            tags: dedup_tags(input.tags),
            created_at: now,
            last_accessed: now,
            references: input.references,
            metadata: input.metadata,
            category_id: input.category_id,
        };

        self.insert_with_references(node);
        self.persist(&[id.as_str()]);
        tracing::debug!(node_id = %id, "Added memory node");
        id
    }

    /// Insert a fully-formed node, preserving its id and timestamps.
    /// Returns `false` if the id is already taken or is not a safe file name.
    pub fn import(&mut self, mut node: MemoryNode) -> bool {
        if !StoreLayout::is_safe_name(&node.id) {
            tracing::warn!(node_id = ?node.id, "Rejected import of node with unsafe id");
            return false;
        }
        if self.contains(&node.id) {
            return false;
        }
        node.tags = dedup_tags(node.tags);
        let id = node.id.clone();
        self.insert_with_references(node);
        self.persist(&[id.as_str()]);
        true
    }

    /// Merge `update` into a node and bump `last_accessed`.
    /// Returns `false` for an unknown id.
    pub fn update(&mut self, id: &str, update: NodeUpdate) -> bool {
        let Some(node) = self.node_mut(id) else {
            return false;
        };
        update.apply(node);
        node.last_accessed = Utc::now();
        self.persist(&[id]);
        true
    }

    /// Add (or replace) a typed edge between two existing nodes
    pub fn link(
        &mut self,
        source: &str,
        target: &str,
        kind: &str,
        strength: f32,
        attributes: Map<String, Value>,
    ) -> bool {
        if !self.contains(source) || !self.contains(target) {
            return false;
        }
        self.insert_edge(GraphEdge {
            source: source.to_string(),
            target: target.to_string(),
            kind: kind.to_string(),
            strength: strength.clamp(0.0, 1.0),
            attributes,
        });
        self.persist(&[]);
        true
    }

    // ========================================================================
    // READS
    // ========================================================================

    /// Pure read: no timestamp change, nothing persisted
    pub fn peek(&self, id: &str) -> Option<&MemoryNode> {
        self.index.get(id).map(|&i| &self.nodes[i])
    }

    /// Touch on read: sets `last_accessed = now`, re-persists, returns a copy
    pub fn get(&mut self, id: &str) -> Option<MemoryNode> {
        let node = self.node_mut(id)?;
        node.last_accessed = Utc::now();
        let node = node.clone();
        self.persist(&[id]);
        Some(node)
    }

    /// Linear scan with an arbitrary predicate
    pub fn find<F>(&self, predicate: F) -> Vec<MemoryNode>
    where
        F: Fn(&MemoryNode) -> bool,
    {
        self.nodes.iter().filter(|n| predicate(n)).cloned().collect()
    }

    /// Linear scan with exact equality on serialized fields, e.g.
    /// `{"nodeType": "note", "categoryId": "cat_1"}`. A field absent from a
    /// node only matches `null`.
    pub fn find_matching(&self, fields: &Map<String, Value>) -> Vec<MemoryNode> {
        self.find(|node| {
            let Ok(Value::Object(serialized)) = serde_json::to_value(node) else {
                return false;
            };
            fields
                .iter()
                .all(|(k, v)| serialized.get(k).unwrap_or(&Value::Null) == v)
        })
    }

    /// Breadth-first expansion over outgoing and incoming edges, up to
    /// `max_depth` hops. The start node is never part of the result.
    pub fn related(&self, id: &str, max_depth: usize) -> Vec<MemoryNode> {
        if !self.contains(id) {
            return vec![];
        }

        let mut visited: HashSet<&str> = HashSet::from([id]);
        let mut order: Vec<&str> = Vec::new();
        let mut frontier: VecDeque<(&str, usize)> = VecDeque::from([(id, 0)]);

        while let Some((current, depth)) = frontier.pop_front() {
            if depth == max_depth {
                continue;
            }
            let neighbours = self
                .successors(current)
                .iter()
                .chain(self.predecessors(current).iter());
            for next in neighbours {
                if visited.insert(next.as_str()) {
                    order.push(next.as_str());
                    frontier.push_back((next.as_str(), depth + 1));
                }
            }
        }

        order
            .into_iter()
            .filter_map(|n| self.peek(n).cloned())
            .collect()
    }

    /// Snapshot of every node
    pub fn export(&self) -> Vec<MemoryNode> {
        self.nodes.clone()
    }

    // ========================================================================
    // CRATE-INTERNAL MUTATION (batched by the retriever)
    // ========================================================================

    pub(crate) fn node_mut(&mut self, id: &str) -> Option<&mut MemoryNode> {
        let i = *self.index.get(id)?;
        Some(&mut self.nodes[i])
    }

    /// Rewrite `graph.json` once and the per-node files of `touched`.
    /// Failures are logged; the in-memory graph stays authoritative.
    pub(crate) fn persist(&self, touched: &[&str]) {
        let file = GraphFileRef {
            nodes: &self.nodes,
            edges: &self.edges,
        };
        if let Err(e) = write_json_atomic(&self.layout.graph_file(), &file) {
            tracing::error!("Error saving memory graph: {}", e);
        }

        for id in touched {
            if let Some(node) = self.peek(id) {
                self.persist_document(node);
            }
        }
    }

    fn persist_document(&self, node: &MemoryNode) {
        let written = self
            .layout
            .document_file(&node.id)
            .and_then(|path| write_json_with_backup(&path, node));
        if let Err(e) = written {
            tracing::error!(node_id = %node.id, "Error saving node document: {}", e);
        }
    }

    /// Regenerate every `documents/{id}.json` from the graph (after recovery)
    pub fn rewrite_documents(&self) -> usize {
        if let Err(e) = std::fs::create_dir_all(self.layout.documents_dir()) {
            tracing::error!("Cannot create documents directory: {}", e);
            return 0;
        }
        for node in &self.nodes {
            self.persist_document(node);
        }
        self.nodes.len()
    }

    // ========================================================================
    // INTERNALS
    // ========================================================================

    fn generate_id(&self, title: &str, created_at: DateTime<Utc>) -> String {
        let nanos = created_at.timestamp_nanos_opt().unwrap_or_default();
        let mut salt: u32 = 0;
        loop {
            let seed = if salt == 0 {
                format!("{title}{nanos}")
            } else {
                format!("{title}{nanos}#{salt}")
            };
            let uuid = Uuid::new_v5(&Uuid::NAMESPACE_OID, seed.as_bytes());
            let id: String = uuid.simple().to_string().chars().take(NODE_ID_LEN).collect();
            if !self.contains(&id) {
                return id;
            }
            salt += 1;
        }
    }

    fn insert_with_references(&mut self, node: MemoryNode) {
        let id = node.id.clone();
        let references = node.references.clone();
        self.insert_node(node);

        for target in references {
            if target != id && self.contains(&target) {
                self.insert_edge(GraphEdge::reference(id.clone(), target));
            }
        }
    }

    fn insert_node(&mut self, node: MemoryNode) {
        if let Some(&i) = self.index.get(&node.id) {
            self.nodes[i] = node;
            return;
        }
        self.index.insert(node.id.clone(), self.nodes.len());
        self.nodes.push(node);
    }

    /// Edges whose endpoints are unknown are skipped; an existing
    /// (source, target) edge is replaced.
    fn insert_edge(&mut self, edge: GraphEdge) {
        if !self.contains(&edge.source) || !self.contains(&edge.target) {
            return;
        }

        let key = (edge.source.clone(), edge.target.clone());
        if let Some(&i) = self.edge_index.get(&key) {
            self.edges[i] = edge;
            return;
        }

        self.outgoing
            .entry(edge.source.clone())
            .or_default()
            .push(edge.target.clone());
        self.incoming
            .entry(edge.target.clone())
            .or_default()
            .push(edge.source.clone());
        self.edge_index.insert(key, self.edges.len());
        self.edges.push(edge);
    }
}

impl std::fmt::Debug for MemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryStore")
            .field("root", &self.layout.root())
            .field("nodes", &self.nodes.len())
            .field("edges", &self.edges.len())
            .finish()
    }
}

// ============================================================================
// TESTS
// ============================================================================
