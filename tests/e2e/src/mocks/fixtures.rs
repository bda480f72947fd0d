//! Test Data Factory
//!
//! Provides utilities for generating realistic agent memories:
//! - Documents, notes and conversations with various properties
//! - Batch generation for stress testing
//! - Pre-built scenarios for search, graph and category tests

use std::collections::HashMap;

use recollect_core::{ConversationMessage, MemoryEngine, NoteImportance, SaveRequest};
use serde_json::Map;

/// Factory for creating test data
///
/// # Example
///
/// ```rust,ignore
/// let mut store = TestStore::new_temp();
///
/// let id = TestDataFactory::create_memory(&mut store.engine, "title", "content");
/// let ids = TestDataFactory::create_batch(&mut store.engine, 100);
/// let scenario = TestDataFactory::create_search_scenario(&mut store.engine);
/// ```
pub struct TestDataFactory;

/// Ids created by a scenario, with named handles for the interesting ones
#[derive(Debug, Clone, Default)]
pub struct TestScenario {
    pub node_ids: Vec<String>,
    pub description: String,
    /// Named ids (for example `"hub"` or `"rust"`)
    pub handles: HashMap<String, String>,
}

impl TestScenario {
    /// Id registered under `name`; panics if the scenario did not create it
    pub fn id(&self, name: &str) -> &str {
        self.handles
            .get(name)
            .unwrap_or_else(|| panic!("scenario has no handle {name:?}"))
    }
}

impl TestDataFactory {
    // ========================================================================
    // SINGLE MEMORIES
    // ========================================================================

    pub fn create_memory(engine: &mut MemoryEngine, title: &str, content: &str) -> Option<String> {
        engine.save(SaveRequest::new(title, content)).ok()
    }

    pub fn create_tagged(
        engine: &mut MemoryEngine,
        title: &str,
        content: &str,
        tags: &[&str],
    ) -> Option<String> {
        engine
            .save(SaveRequest::new(title, content).tags(tags.iter().copied()))
            .ok()
    }

    /// A short user/assistant exchange with one shell command
    pub fn create_conversation(engine: &mut MemoryEngine, conversation_id: &str) -> Option<String> {
        let messages = vec![
            ConversationMessage::user("How do I list the log directory?"),
            ConversationMessage::assistant("Run <bash>ls -la /var/log</bash> to see it."),
            ConversationMessage::user("Thanks, that worked."),
            ConversationMessage::assistant("Glad to help."),
        ];
        engine
            .save_conversation(conversation_id, &messages, Map::new(), None)
            .ok()
    }

    pub fn create_note(engine: &mut MemoryEngine, text: &str, high: bool) -> Option<String> {
        let importance = if high {
            NoteImportance::High
        } else {
            NoteImportance::Normal
        };
        engine
            .add_note(text, "observation", importance, &[])
            .ok()
    }

    /// `count` documents with lorem-style content and rotating tags
    pub fn create_batch(engine: &mut MemoryEngine, count: usize) -> Vec<String> {
        (0..count)
            .filter_map(|i| {
                engine
                    .save(
                        SaveRequest::new(
                            format!("Batch memory {i}"),
                            Self::lorem_content(12, i),
                        )
                        .tags(Self::generate_tags(2, i)),
                    )
                    .ok()
            })
            .collect()
    }

    // ========================================================================
    // SCENARIOS
    // ========================================================================

    /// Programming, science and cooking documents
    pub fn create_search_scenario(engine: &mut MemoryEngine) -> TestScenario {
        let mut scenario = TestScenario {
            description: "Search scenario with topical documents".to_string(),
            ..Default::default()
        };

        let docs = [
            (
                "rust",
                "Rust ownership",
                "Rust programming language uses ownership for memory safety",
                "programming",
            ),
            (
                "python",
                "Python data",
                "Python is great for data science and machine learning",
                "programming",
            ),
            (
                "js",
                "JavaScript runtime",
                "JavaScript runs in web browsers and Node.js",
                "programming",
            ),
            ("cell", "Mitochondria", "Mitochondria is the powerhouse of the cell", "science"),
            ("dna", "Genetics", "DNA contains genetic information", "science"),
            ("pasta", "Pasta recipe", "To make pasta, boil water and add salt", "cooking"),
        ];
        for (handle, title, content, tag) in docs {
            if let Ok(id) = engine.save(SaveRequest::new(title, content).tags([tag])) {
                scenario.handles.insert(handle.to_string(), id.clone());
                scenario.node_ids.push(id);
            }
        }
        scenario
    }

    /// A small graph: hub -> a -> far, b -> hub, and an isolated node.
    pub fn create_graph_scenario(engine: &mut MemoryEngine) -> TestScenario {
        let mut scenario = TestScenario {
            description: "Graph scenario with one and two hop neighbours".to_string(),
            ..Default::default()
        };

        for handle in ["hub", "a", "b", "far", "isolated"] {
            if let Some(id) = Self::create_memory(engine, handle, &format!("{handle} node")) {
                scenario.handles.insert(handle.to_string(), id.clone());
                scenario.node_ids.push(id);
            }
        }

        let edges = [("hub", "a"), ("a", "far"), ("b", "hub")];
        for (source, target) in edges {
            let (source, target) = (scenario.id(source), scenario.id(target));
            engine.link(source, target, "related", 1.0, Map::new());
        }
        scenario
    }

    // ========================================================================
    // UTILITY METHODS
    // ========================================================================

    /// Generate lorem ipsum-like content
    pub fn lorem_content(words: usize, seed: usize) -> String {
        const WORDS: [&str; 20] = [
            "the", "memory", "agent", "knowledge", "task",
            "data", "system", "process", "command", "result",
            "file", "request", "error", "context", "plan",
            "goal", "tool", "output", "review", "step",
        ];

        (0..words)
            .map(|i| WORDS[(seed + i * 7) % WORDS.len()])
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Generate tags
    pub fn generate_tags(count: usize, seed: usize) -> Vec<String> {
        const TAGS: [&str; 8] = [
            "review", "todo", "concept", "code", "idea", "question", "reference", "ops",
        ];

        (0..count)
            .map(|i| TAGS[(seed + i) % TAGS.len()].to_string())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::harness::TestStore;

    #[test]
    fn test_create_batch() {
        let mut store = TestStore::new_temp();
        let ids = TestDataFactory::create_batch(&mut store.engine, 10);

        assert_eq!(ids.len(), 10);
        assert_eq!(store.engine.stats().nodes, 10);
    }

    #[test]
    fn test_graph_scenario_edges() {
        let mut store = TestStore::without_embedder();
        let scenario = TestDataFactory::create_graph_scenario(&mut store.engine);

        assert_eq!(scenario.node_ids.len(), 5);
        assert_eq!(store.engine.stats().edges, 3);
    }

    #[test]
    fn test_lorem_content() {
        let content = TestDataFactory::lorem_content(10, 42);
        assert_eq!(content.split_whitespace().count(), 10);
    }

    #[test]
    fn test_generate_tags() {
        let tags = TestDataFactory::generate_tags(5, 0);

        assert_eq!(tags.len(), 5);
        assert!(tags.iter().all(|t| !t.is_empty()));
    }
}
