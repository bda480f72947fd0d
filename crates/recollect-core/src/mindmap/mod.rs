//! Mind Maps
//!
//! Small concept graphs an agent sketches while planning a task: a root
//! concept, further concepts placed on a 2-D canvas, and typed links between
//! them. Independent of the knowledge graph. Each map is one file,
//! `mind_maps/{map_id}.json`, rewritten atomically on every change.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use uuid::Uuid;

use crate::storage::{read_json, write_json_atomic, StorageError, StoreLayout};

/// Concepts listed by [`MindMaps::summary`]
const SUMMARY_CONCEPTS: usize = 10;
/// Links listed by [`MindMaps::summary`]
const SUMMARY_LINKS: usize = 7;
/// Characters of concept content shown in a summary line
const SUMMARY_SNIPPET: usize = 100;

// ============================================================================
// ERROR TYPES
// ============================================================================

#[non_exhaustive]
#[derive(Debug, thiserror::Error)]
pub enum MindMapError {
    #[error("Mind map not found: {0}")]
    NotFound(String),
    #[error("Concept {concept} not found in mind map {map}")]
    UnknownConcept { map: String, concept: String },
    #[error("Mind map storage error: {0}")]
    Storage(#[from] StorageError),
}

pub type Result<T> = std::result::Result<T, MindMapError>;

// ============================================================================
// TYPES
// ============================================================================

/// Canvas position of a concept
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f32,
    pub y: f32,
}

/// Concept kind; every map has exactly one root
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConceptKind {
    Root,
    Concept,
}

#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Concept {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub content: String,
    pub kind: ConceptKind,
    #[serde(default)]
    pub position: Position,
    pub created_at: DateTime<Utc>,
    pub last_accessed: DateTime<Utc>,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

/// A directed, typed link between two concepts of the same map
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConceptLink {
    pub id: String,
    pub source: String,
    pub target: String,
    pub link_type: String,
    /// Always within [0, 1]
    pub strength: f32,
    pub created_at: DateTime<Utc>,
    pub last_modified: DateTime<Utc>,
}

#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MindMap {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    /// Free-form purpose, `task` by default
    pub map_type: String,
    pub root_id: String,
    /// Insertion order
    pub concepts: Vec<Concept>,
    pub links: Vec<ConceptLink>,
    pub created_at: DateTime<Utc>,
    pub last_modified: DateTime<Utc>,
}

impl MindMap {
    pub fn concept(&self, id: &str) -> Option<&Concept> {
        self.concepts.iter().find(|c| c.id == id)
    }

    fn contains_concept(&self, id: &str) -> bool {
        self.concepts.iter().any(|c| c.id == id)
    }
}

/// A map matched by [`MindMaps::search`]
#[derive(Debug, Clone, Serialize)]
pub struct MindMapMatch {
    pub id: String,
    pub title: String,
    pub description: String,
    pub concept_count: usize,
    pub score: u32,
    pub last_modified: DateTime<Utc>,
}

// ============================================================================
// STORE
// ============================================================================

/// Every mind map of a store, keyed by id
pub struct MindMaps {
    layout: StoreLayout,
    maps: HashMap<String, MindMap>,
}

impl MindMaps {
    /// Load every `mind_maps/*.json`. Unreadable files are skipped.
    pub fn open(layout: StoreLayout) -> Self {
        let mut maps = HashMap::new();
        let dir = layout.mind_maps_dir();
        let entries = match std::fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) => {
                if e.kind() != std::io::ErrorKind::NotFound {
                    tracing::error!("Error loading mind maps: {}", e);
                }
                return Self { layout, maps };
            }
        };

        for path in entries.filter_map(|e| e.ok()).map(|e| e.path()) {
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            match read_json::<MindMap>(&path) {
                Ok(Some(map)) if StoreLayout::is_safe_name(&map.id) => {
                    maps.insert(map.id.clone(), map);
                }
                Ok(Some(map)) => {
                    tracing::warn!(map_id = ?map.id, "Skipped mind map with unsafe id");
                }
                Ok(None) => {}
                Err(e) => {
                    tracing::error!(file = %path.display(), "Error loading mind map: {}", e);
                }
            }
        }

        tracing::debug!(maps = maps.len(), "Loaded mind maps");
        Self { layout, maps }
    }

    pub fn len(&self) -> usize {
        self.maps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.maps.is_empty()
    }

    /// Pure read
    pub fn peek(&self, map_id: &str) -> Option<&MindMap> {
        self.maps.get(map_id)
    }

    /// Read a map and mark all its concepts accessed
    pub fn get(&mut self, map_id: &str) -> Option<&MindMap> {
        let map = self.maps.get_mut(map_id)?;
        let now = Utc::now();
        for concept in &mut map.concepts {
            concept.last_accessed = now;
        }
        Some(map)
    }

    /// Maps by `last_modified`, newest first
    pub fn recent(&self, limit: usize) -> Vec<&MindMap> {
        let mut maps: Vec<&MindMap> = self.maps.values().collect();
        maps.sort_by(|a, b| b.last_modified.cmp(&a.last_modified));
        maps.truncate(limit);
        maps
    }

    // ========================================================================
    // WRITES
    // ========================================================================

    /// Create a map with a root concept carrying its title and description
    pub fn create(&mut self, title: &str, description: &str, map_type: &str) -> Result<String> {
        let now = Utc::now();
        let id = format!("map_{}", Uuid::new_v4().simple());
        let root = new_concept(title, description, ConceptKind::Root, Position::default(), now);

        let map = MindMap {
            id: id.clone(),
            title: title.to_string(),
            description: description.to_string(),
            map_type: map_type.to_string(),
            root_id: root.id.clone(),
            concepts: vec![root],
            links: vec![],
            created_at: now,
            last_modified: now,
        };
        self.maps.insert(id.clone(), map);
        self.persist(&id)?;

        tracing::info!(map_id = %id, title, "Created mind map");
        Ok(id)
    }

    /// Add a concept, linked from `related_to` when that concept exists in
    /// the map. Returns the concept id.
    pub fn add_concept(
        &mut self,
        map_id: &str,
        title: &str,
        content: &str,
        related_to: Option<&str>,
        link_type: &str,
        position: Option<Position>,
    ) -> Result<String> {
        let map = self
            .maps
            .get_mut(map_id)
            .ok_or_else(|| MindMapError::NotFound(map_id.to_string()))?;

        let now = Utc::now();
        let concept = new_concept(
            title,
            content,
            ConceptKind::Concept,
            position.unwrap_or_default(),
            now,
        );
        let concept_id = concept.id.clone();
        map.concepts.push(concept);
        map.last_modified = now;

        match related_to {
            Some(source) if map.contains_concept(source) => {
                upsert_link(map, source, &concept_id, link_type, 1.0, now);
            }
            Some(source) => {
                tracing::debug!(map_id, concept = %source, "Unknown related concept, not linked");
            }
            None => {}
        }

        self.persist(map_id)?;
        Ok(concept_id)
    }

    /// Link two concepts of a map. An existing link between the same pair
    /// is retyped and reweighted instead of duplicated. Returns the link id.
    pub fn link(
        &mut self,
        map_id: &str,
        source: &str,
        target: &str,
        link_type: &str,
        strength: f32,
    ) -> Result<String> {
        let map = self
            .maps
            .get_mut(map_id)
            .ok_or_else(|| MindMapError::NotFound(map_id.to_string()))?;
        for concept in [source, target] {
            if !map.contains_concept(concept) {
                return Err(MindMapError::UnknownConcept {
                    map: map_id.to_string(),
                    concept: concept.to_string(),
                });
            }
        }

        let now = Utc::now();
        let id = upsert_link(map, source, target, link_type, strength, now);
        map.last_modified = now;
        self.persist(map_id)?;
        Ok(id)
    }

    // ========================================================================
    // QUERIES
    // ========================================================================

    /// Case-insensitive substring search over map and concept text.
    ///
    /// Scores: map title 10, description 5, each concept title 3 and content
    /// 2, plus one per matching concept field up to 5. Highest score first,
    /// then most recently modified.
    pub fn search(&self, query: &str, limit: usize) -> Vec<MindMapMatch> {
        let needle = query.trim().to_lowercase();
        if needle.is_empty() {
            return vec![];
        }

        let mut matches: Vec<MindMapMatch> = self
            .maps
            .values()
            .filter_map(|map| {
                let score = score_map(map, &needle);
                (score > 0).then(|| MindMapMatch {
                    id: map.id.clone(),
                    title: map.title.clone(),
                    description: map.description.clone(),
                    concept_count: map.concepts.len(),
                    score,
                    last_modified: map.last_modified,
                })
            })
            .collect();
        matches.sort_by(|a, b| {
            b.score
                .cmp(&a.score)
                .then_with(|| b.last_modified.cmp(&a.last_modified))
        });
        matches.truncate(limit);
        matches
    }

    /// Markdown outline of a map: the root first, then concepts by creation
    /// time, then the first links
    pub fn summary(&self, map_id: &str) -> Option<String> {
        let map = self.maps.get(map_id)?;
        let mut lines = vec![format!("# Mind Map: {}", map.title)];
        if !map.description.is_empty() {
            lines.push(map.description.clone());
        }

        lines.push(String::new());
        lines.push("## Key Concepts".to_string());
        let mut concepts: Vec<&Concept> = map.concepts.iter().collect();
        concepts.sort_by_key(|c| (c.kind != ConceptKind::Root, c.created_at));
        for concept in concepts.iter().take(SUMMARY_CONCEPTS) {
            lines.push(format!("- {}: {}", concept.title, snippet(&concept.content)));
        }
        if concepts.len() > SUMMARY_CONCEPTS {
            lines.push(format!(
                "...and {} more concepts",
                concepts.len() - SUMMARY_CONCEPTS
            ));
        }

        if !map.links.is_empty() {
            lines.push(String::new());
            lines.push("## Relationships".to_string());
            for link in map.links.iter().take(SUMMARY_LINKS) {
                if let (Some(source), Some(target)) =
                    (map.concept(&link.source), map.concept(&link.target))
                {
                    lines.push(format!(
                        "- {} -> {} -> {}",
                        source.title, link.link_type, target.title
                    ));
                }
            }
            if map.links.len() > SUMMARY_LINKS {
                lines.push(format!(
                    "...and {} more relationships",
                    map.links.len() - SUMMARY_LINKS
                ));
            }
        }

        Some(lines.join("\n"))
    }

    // ========================================================================
    // PERSISTENCE
    // ========================================================================

    fn persist(&self, map_id: &str) -> Result<()> {
        let Some(map) = self.maps.get(map_id) else {
            return Ok(());
        };
        let path = self.layout.mind_map_file(map_id)?;
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir).map_err(StorageError::from)?;
        }
        write_json_atomic(&path, map)?;
        tracing::debug!(map_id, "Saved mind map");
        Ok(())
    }
}

impl std::fmt::Debug for MindMaps {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MindMaps")
            .field("maps", &self.maps.len())
            .finish()
    }
}

// ============================================================================
// HELPERS
// ============================================================================

fn new_concept(
    title: &str,
    content: &str,
    kind: ConceptKind,
    position: Position,
    now: DateTime<Utc>,
) -> Concept {
    Concept {
        id: format!("concept_{}", Uuid::new_v4().simple()),
        title: title.to_string(),
        content: content.to_string(),
        kind,
        position,
        created_at: now,
        last_accessed: now,
        metadata: Map::new(),
    }
}

fn upsert_link(
    map: &mut MindMap,
    source: &str,
    target: &str,
    link_type: &str,
    strength: f32,
    now: DateTime<Utc>,
) -> String {
    let strength = strength.clamp(0.0, 1.0);
    if let Some(link) = map
        .links
        .iter_mut()
        .find(|l| l.source == source && l.target == target)
    {
        link.link_type = link_type.to_string();
        link.strength = strength;
        link.last_modified = now;
        return link.id.clone();
    }

    let id = format!("link_{source}_{target}");
    map.links.push(ConceptLink {
        id: id.clone(),
        source: source.to_string(),
        target: target.to_string(),
        link_type: link_type.to_string(),
        strength,
        created_at: now,
        last_modified: now,
    });
    id
}

fn score_map(map: &MindMap, needle: &str) -> u32 {
    let contains = |text: &str| text.to_lowercase().contains(needle);

    let mut score = 0;
    if contains(&map.title) {
        score += 10;
    }
    if contains(&map.description) {
        score += 5;
    }
    let mut concept_hits = 0;
    for concept in &map.concepts {
        if contains(&concept.title) {
            score += 3;
            concept_hits += 1;
        }
        if contains(&concept.content) {
            score += 2;
            concept_hits += 1;
        }
    }
    score + concept_hits.min(5)
}

fn snippet(content: &str) -> String {
    if content.chars().count() <= SUMMARY_SNIPPET {
        return content.to_string();
    }
    let mut cut: String = content.chars().take(SUMMARY_SNIPPET).collect();
    cut.push_str("...");
    cut
}

// ============================================================================
// TESTS
// ============================================================================
