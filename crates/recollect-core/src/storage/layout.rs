use std::path::{Path, PathBuf};

use super::{Result, StorageError};

/// Paths of every persisted artifact under one store root.
///
/// ```text
/// graph.json
/// documents/{node_id}.json
/// conversations/{conversation_id}.json
/// mind_maps/{map_id}.json
/// categories.json, relations.json
/// vector_index/faiss.index(.bak)
/// vector_index/node_ids.json(.bak)
/// backups/{timestamp}/...
/// backups/last_state.json
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreLayout {
    root: PathBuf,
}

impl StoreLayout {
    /// Layout rooted at `root` (nothing is created until [`StoreLayout::create_dirs`])
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Create the root and all fixed subdirectories
    pub fn create_dirs(&self) -> Result<()> {
        for dir in [
            self.root.clone(),
            self.documents_dir(),
            self.conversations_dir(),
            self.mind_maps_dir(),
            self.vector_dir(),
            self.backups_dir(),
        ] {
            std::fs::create_dir_all(dir)?;
        }
        Ok(())
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn graph_file(&self) -> PathBuf {
        self.root.join("graph.json")
    }

    pub fn documents_dir(&self) -> PathBuf {
        self.root.join("documents")
    }

    /// `documents/{node_id}.json`; fails for ids that are not plain file names
    pub fn document_file(&self, node_id: &str) -> Result<PathBuf> {
        Self::check_name(node_id)?;
        Ok(self.documents_dir().join(format!("{node_id}.json")))
    }

    pub fn conversations_dir(&self) -> PathBuf {
        self.root.join("conversations")
    }

    /// `conversations/{conversation_id}.json`; same naming rule as documents
    pub fn conversation_file(&self, conversation_id: &str) -> Result<PathBuf> {
        Self::check_name(conversation_id)?;
        Ok(self
            .conversations_dir()
            .join(format!("{conversation_id}.json")))
    }

    /// Whether `name` can be used verbatim as a file stem inside a store
    /// directory: ASCII letters, digits, `-`, `_` and non-leading `.`, at
    /// most [`Self::MAX_NAME_LEN`] bytes, no `..`.
    pub fn is_safe_name(name: &str) -> bool {
        !name.is_empty()
            && name.len() <= Self::MAX_NAME_LEN
            && !name.starts_with('.')
            && !name.contains("..")
            && name
                .bytes()
                .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'-' | b'_' | b'.'))
    }

    fn check_name(name: &str) -> Result<()> {
        if Self::is_safe_name(name) {
            Ok(())
        } else {
            Err(StorageError::UnsafeName(name.to_string()))
        }
    }

    pub fn mind_maps_dir(&self) -> PathBuf {
        self.root.join("mind_maps")
    }

    pub fn mind_map_file(&self, map_id: &str) -> Result<PathBuf> {
        Self::check_name(map_id)?;
        Ok(self.mind_maps_dir().join(format!("{map_id}.json")))
    }

    pub fn categories_file(&self) -> PathBuf {
        self.root.join(Self::CATEGORIES)
    }

    pub fn relations_file(&self) -> PathBuf {
        self.root.join(Self::RELATIONS)
    }

    /// Staging directory for multi-file hierarchy commits
    pub fn hierarchy_staging_dir(&self) -> PathBuf {
        self.root.join("hierarchy.staging")
    }

    pub fn vector_dir(&self) -> PathBuf {
        self.root.join("vector_index")
    }

    pub fn vector_index_file(&self) -> PathBuf {
        self.vector_dir().join("faiss.index")
    }

    pub fn vector_ids_file(&self) -> PathBuf {
        self.vector_dir().join("node_ids.json")
    }

    pub fn backups_dir(&self) -> PathBuf {
        self.root.join("backups")
    }

    /// Recovery marker, rewritten by every snapshot
    pub fn last_state_file(&self) -> PathBuf {
        self.backups_dir().join("last_state.json")
    }

    pub fn temp_dir(&self) -> PathBuf {
        self.root.join("temp")
    }

    pub const CATEGORIES: &'static str = "categories.json";
    pub const RELATIONS: &'static str = "relations.json";
    /// Longest id accepted as a file stem
    pub const MAX_NAME_LEN: usize = 200;
}
