//! Category Hierarchy
//!
//! A forest of single-parent categories layered over node ids, plus weighted
//! relations between categories. Persisted as `categories.json` and
//! `relations.json`, always written together through a staged commit so that
//! a crash never leaves one file updated without the other.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{HashMap, HashSet};
use uuid::Uuid;

use crate::storage::{read_json, StagedCommit, StorageError, StoreLayout};

// ============================================================================
// ERROR TYPES
// ============================================================================

/// Hierarchy error type
#[non_exhaustive]
#[derive(Debug, thiserror::Error)]
pub enum HierarchyError {
    #[error("Hierarchy storage error: {0}")]
    Storage(#[from] StorageError),
}

// ============================================================================
// TYPES
// ============================================================================

/// A category; `parent_id = None` makes it a root
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Category {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub parent_id: Option<String>,
    #[serde(default)]
    pub attributes: Map<String, Value>,
    pub created_at: DateTime<Utc>,
    pub last_modified: DateTime<Utc>,
}

/// A weighted, typed relation between two categories
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Relation {
    pub source_id: String,
    pub target_id: String,
    pub relation_type: String,
    /// Always within [0, 1]
    pub strength: f32,
    #[serde(default)]
    pub attributes: Map<String, Value>,
    pub created_at: DateTime<Utc>,
    pub last_accessed: DateTime<Utc>,
}

impl Relation {
    fn touches(&self, id: &str) -> bool {
        self.source_id == id || self.target_id == id
    }

    /// The endpoint that is not `id`
    fn other(&self, id: &str) -> &str {
        if self.source_id == id {
            &self.target_id
        } else {
            &self.source_id
        }
    }
}

/// A category reached through a relation
#[derive(Debug, Clone, Serialize)]
pub struct RelatedCategory {
    pub category_id: String,
    pub relation: Relation,
}

/// Summary of one category's position in the forest
#[derive(Debug, Clone, Serialize)]
pub struct CategoryStats {
    pub name: String,
    pub total_subcategories: usize,
    pub direct_subcategories: usize,
    /// Length of the root → category path (a root has depth 1)
    pub depth: usize,
    pub created_at: DateTime<Utc>,
    pub last_modified: DateTime<Utc>,
}

// ============================================================================
// HIERARCHY
// ============================================================================

/// The category forest and its relations
pub struct Hierarchy {
    layout: StoreLayout,
    categories: HashMap<String, Category>,
    relations: Vec<Relation>,
}

impl Hierarchy {
    /// Load both hierarchy files, first finishing any interrupted commit.
    /// Missing or corrupt files start that part empty.
    pub fn open(layout: StoreLayout) -> Self {
        if let Err(e) = StagedCommit::recover(&layout.hierarchy_staging_dir(), layout.root()) {
            tracing::warn!("Cannot recover staged hierarchy commit: {}", e);
        }

        let categories: Vec<Category> = match read_json(&layout.categories_file()) {
            Ok(found) => found.unwrap_or_default(),
            Err(e) => {
                tracing::warn!("Error loading categories, starting empty: {}", e);
                vec![]
            }
        };
        let relations: Vec<Relation> = match read_json(&layout.relations_file()) {
            Ok(found) => found.unwrap_or_default(),
            Err(e) => {
                tracing::warn!("Error loading category relations, starting empty: {}", e);
                vec![]
            }
        };

        let categories: HashMap<String, Category> = categories
            .into_iter()
            .map(|c| (c.id.clone(), c))
            .collect();
        let relations = relations
            .into_iter()
            .filter(|r| {
                categories.contains_key(&r.source_id) && categories.contains_key(&r.target_id)
            })
            .collect();

        Self {
            layout,
            categories,
            relations,
        }
    }

    pub fn len(&self) -> usize {
        self.categories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
    }

    pub fn relation_count(&self) -> usize {
        self.relations.len()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.categories.contains_key(id)
    }

    // ========================================================================
    // CATEGORIES
    // ========================================================================

    /// Create a category. An unknown `parent_id` yields a root.
    pub fn add_category(
        &mut self,
        name: &str,
        description: &str,
        parent_id: Option<&str>,
        attributes: Map<String, Value>,
    ) -> String {
        let parent_id = match parent_id {
            Some(parent) if self.contains(parent) => Some(parent.to_string()),
            Some(parent) => {
                tracing::debug!(parent = %parent, "Unknown parent category, creating a root");
                None
            }
            None => None,
        };

        let now = Utc::now();
        let id = format!("cat_{}", Uuid::new_v4().simple());
        self.categories.insert(
            id.clone(),
            Category {
                id: id.clone(),
                name: name.to_string(),
                description: description.to_string(),
                parent_id,
                attributes,
                created_at: now,
                last_modified: now,
            },
        );
        self.persist();
        id
    }

    pub fn category(&self, id: &str) -> Option<&Category> {
        self.categories.get(id)
    }

    /// All categories, oldest first
    pub fn categories(&self) -> Vec<&Category> {
        let mut all: Vec<&Category> = self.categories.values().collect();
        sort_categories(&mut all);
        all
    }

    pub fn roots(&self) -> Vec<&Category> {
        let mut roots: Vec<&Category> = self
            .categories
            .values()
            .filter(|c| c.parent_id.is_none())
            .collect();
        sort_categories(&mut roots);
        roots
    }

    pub fn find_by_name(&self, name: &str) -> Option<&Category> {
        self.categories().into_iter().find(|c| c.name == name)
    }

    /// Rename and/or re-describe a category
    pub fn update_category(
        &mut self,
        id: &str,
        name: Option<&str>,
        description: Option<&str>,
    ) -> bool {
        let Some(category) = self.categories.get_mut(id) else {
            return false;
        };
        if let Some(name) = name {
            category.name = name.to_string();
        }
        if let Some(description) = description {
            category.description = description.to_string();
        }
        category.last_modified = Utc::now();
        self.persist();
        true
    }

    /// Direct children, or every descendant when `recursive`
    pub fn subcategories(&self, id: &str, recursive: bool) -> Vec<&Category> {
        if !self.contains(id) {
            return vec![];
        }
        if !recursive {
            return self.children(id);
        }

        let mut seen: HashSet<&str> = HashSet::from([id]);
        let mut out = Vec::new();
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            for child in self.children(current) {
                if seen.insert(child.id.as_str()) {
                    stack.push(child.id.as_str());
                    out.push(child);
                }
            }
        }
        out
    }

    fn children(&self, id: &str) -> Vec<&Category> {
        let mut children: Vec<&Category> = self
            .categories
            .values()
            .filter(|c| c.parent_id.as_deref() == Some(id))
            .collect();
        sort_categories(&mut children);
        children
    }

    /// Categories from the root down to `id`; empty for an unknown id
    pub fn path(&self, id: &str) -> Vec<&Category> {
        let mut path = Vec::new();
        let mut seen = HashSet::new();
        let mut current = self.category(id);
        while let Some(category) = current {
            if !seen.insert(category.id.as_str()) {
                tracing::warn!(category = %category.id, "Cycle in category parents");
                break;
            }
            path.push(category);
            current = category.parent_id.as_deref().and_then(|p| self.category(p));
        }
        path.reverse();
        path
    }

    /// Whether `id` lies strictly below `ancestor`
    pub fn is_descendant(&self, id: &str, ancestor: &str) -> bool {
        self.path(id)
            .iter()
            .rev()
            .skip(1)
            .any(|c| c.id == ancestor)
    }

    pub fn category_stats(&self, id: &str) -> Option<CategoryStats> {
        let category = self.category(id)?;
        Some(CategoryStats {
            name: category.name.clone(),
            total_subcategories: self.subcategories(id, true).len(),
            direct_subcategories: self.children(id).len(),
            depth: self.path(id).len(),
            created_at: category.created_at,
            last_modified: category.last_modified,
        })
    }

    // ========================================================================
    // RELATIONS
    // ========================================================================

    /// Add or replace the relation `source → target`.
    /// Returns `false` if either category is unknown.
    pub fn add_relation(
        &mut self,
        source: &str,
        target: &str,
        relation_type: &str,
        strength: f32,
        attributes: Map<String, Value>,
    ) -> bool {
        if !self.contains(source) || !self.contains(target) {
            return false;
        }

        let now = Utc::now();
        let relation = Relation {
            source_id: source.to_string(),
            target_id: target.to_string(),
            relation_type: relation_type.to_string(),
            strength: strength.clamp(0.0, 1.0),
            attributes,
            created_at: now,
            last_accessed: now,
        };
        match self.position(source, target) {
            Some(i) => self.relations[i] = relation,
            None => self.relations.push(relation),
        }
        self.persist();
        true
    }

    pub fn relation(&self, source: &str, target: &str) -> Option<&Relation> {
        self.position(source, target).map(|i| &self.relations[i])
    }

    fn position(&self, source: &str, target: &str) -> Option<usize> {
        self.relations
            .iter()
            .position(|r| r.source_id == source && r.target_id == target)
    }

    /// Categories related to `id` in either direction, strongest first
    pub fn related(
        &self,
        id: &str,
        types: Option<&[String]>,
        min_strength: f32,
    ) -> Vec<RelatedCategory> {
        let mut related: Vec<RelatedCategory> = self
            .relations
            .iter()
            .filter(|r| r.touches(id))
            .filter(|r| types.is_none_or(|t| t.contains(&r.relation_type)))
            .filter(|r| r.strength >= min_strength)
            .map(|r| RelatedCategory {
                category_id: r.other(id).to_string(),
                relation: r.clone(),
            })
            .collect();
        related.sort_by(|a, b| b.relation.strength.total_cmp(&a.relation.strength));
        related
    }

    /// Add `amount` to a relation's strength (capped at 1.0), in either direction
    pub fn strengthen_relation(&mut self, source: &str, target: &str, amount: f32) -> bool {
        let Some(i) = self
            .position(source, target)
            .or_else(|| self.position(target, source))
        else {
            return false;
        };
        let relation = &mut self.relations[i];
        relation.strength = (relation.strength + amount).clamp(0.0, 1.0);
        relation.last_accessed = Utc::now();
        self.persist();
        true
    }

    // ========================================================================
    // MERGE
    // ========================================================================

    /// Fold `source` into `target`: children are reparented, relations are
    /// rewired, and `source` is deleted.
    ///
    /// Returns `false` when either id is unknown, when they are equal, or when
    /// `target` lies below `source` (the merge would create a cycle).
    pub fn merge_categories(&mut self, source: &str, target: &str) -> bool {
        if source == target || !self.contains(source) || !self.contains(target) {
            return false;
        }
        if self.is_descendant(target, source) {
            tracing::warn!(source = %source, target = %target, "Refusing merge into a descendant");
            return false;
        }

        let now = Utc::now();
        for category in self.categories.values_mut() {
            if category.parent_id.as_deref() == Some(source) {
                category.parent_id = Some(target.to_string());
                category.last_modified = now;
            }
        }

        let mut merged: Vec<Relation> = Vec::with_capacity(self.relations.len());
        for mut relation in std::mem::take(&mut self.relations) {
            if relation.source_id == source {
                relation.source_id = target.to_string();
            }
            if relation.target_id == source {
                relation.target_id = target.to_string();
            }
            if relation.source_id == relation.target_id {
                continue;
            }
            match merged
                .iter_mut()
                .find(|r| r.source_id == relation.source_id && r.target_id == relation.target_id)
            {
                Some(existing) if existing.strength >= relation.strength => {}
                Some(existing) => *existing = relation,
                None => merged.push(relation),
            }
        }
        self.relations = merged;

        self.categories.remove(source);
        if let Some(category) = self.categories.get_mut(target) {
            category.last_modified = now;
        }
        self.persist();
        tracing::info!(source = %source, target = %target, "Merged categories");
        true
    }

    // ========================================================================
    // PERSISTENCE
    // ========================================================================

    /// Write both files through one staged commit
    pub fn save(&self) -> Result<(), HierarchyError> {
        let categories = self.categories();
        let mut commit = StagedCommit::new(self.layout.hierarchy_staging_dir(), self.layout.root());
        commit.stage_json(StoreLayout::CATEGORIES, &categories)?;
        commit.stage_json(StoreLayout::RELATIONS, &self.relations)?;
        commit.commit()?;
        Ok(())
    }

    fn persist(&self) {
        if let Err(e) = self.save() {
            tracing::error!("Error saving hierarchy: {}", e);
        }
    }
}

impl std::fmt::Debug for Hierarchy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Hierarchy")
            .field("categories", &self.categories.len())
            .field("relations", &self.relations.len())
            .finish()
    }
}

fn sort_categories(categories: &mut [&Category]) {
    categories.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
}

// ============================================================================
// TESTS
// ============================================================================
