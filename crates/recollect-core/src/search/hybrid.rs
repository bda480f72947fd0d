//! Hybrid Search (Keyword + Semantic)
//!
//! Two candidate sets are built and merged:
//! 1. Vector pass: nearest neighbours of the query embedding (over-fetched to
//!    survive filtering), optionally rescaled by age and retrieval frequency.
//! 2. Keyword pass: graded substring matching over every filtered node.
//!
//! Keyword matches always come first (quality desc, then recency); vector-only
//! matches follow by ascending adjusted distance. If anything fails the search
//! degrades to a plain substring scan with no side effects.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::{HashMap, HashSet, VecDeque};

use super::keyword::{KeywordMatcher, EXACT_MATCH};
use super::vector::{EmbeddingIndex, VectorSearchError};
use crate::memory::{MemoryNode, MemoryStore, SEARCH_HITS_KEY};

/// Metadata key holding the last few searches that matched a node
pub const SEARCH_HISTORY_KEY: &str = "search_history";
/// Metadata key holding the last query that returned a node
pub const LAST_MATCHED_QUERY_KEY: &str = "last_matched_query";

/// Tags whose accesses are counted in [`SearchStats::access_patterns`]
pub const PRIORITY_TAGS: &[&str] = &[
    "system_config",
    "tool_usage",
    "error_history",
    "active_projects",
    "agent_notes",
    "status_updates",
    "command_skills",
    "knowledge_base",
    "important",
    "task",
    "mind_map",
    "code",
    "project",
];

pub fn is_priority_tag(tag: &str) -> bool {
    PRIORITY_TAGS.contains(&tag)
}

// ============================================================================
// HYBRID SEARCH CONFIGURATION
// ============================================================================

/// Configuration for hybrid search
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HybridSearchConfig {
    /// Vector candidates fetched per requested result
    pub vector_overfetch: usize,
    /// Weight of the logarithmic age and frequency terms
    pub recency_weight: f64,
    /// Upper bound of the age term
    pub max_recency_term: f64,
    /// Minimum query tokens before fuzzy matching applies
    pub fuzzy_min_tokens: usize,
    /// Share of tokens that must match for a fuzzy match
    pub fuzzy_token_ratio: f64,
    /// Recent queries kept in [`SearchStats::query_patterns`]
    pub query_history: usize,
    /// Entries kept in a node's `search_history`
    pub node_search_history: usize,
}

impl Default for HybridSearchConfig {
    fn default() -> Self {
        Self {
            vector_overfetch: 3,
            recency_weight: 0.2,
            max_recency_term: 2.0,
            fuzzy_min_tokens: 3,
            fuzzy_token_ratio: 0.6,
            query_history: 20,
            node_search_history: 5,
        }
    }
}

// ============================================================================
// QUERY AND RESULTS
// ============================================================================

/// A hybrid search request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchQuery {
    pub query: String,
    pub limit: usize,
    /// Only nodes in this category
    pub category: Option<String>,
    /// Only nodes carrying at least one of these tags
    pub tags: Vec<String>,
    /// Only nodes of these types
    pub types: Vec<String>,
    /// Rescale vector distances by age and search frequency
    pub recency_boost: bool,
}

impl Default for SearchQuery {
    fn default() -> Self {
        Self {
            query: String::new(),
            limit: 10,
            category: None,
            tags: vec![],
            types: vec![],
            recency_boost: true,
        }
    }
}

impl SearchQuery {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            ..Default::default()
        }
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    pub fn category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
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

    pub fn types<I, S>(mut self, types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.types = types.into_iter().map(Into::into).collect();
        self
    }

    pub fn recency_boost(mut self, enabled: bool) -> Self {
        self.recency_boost = enabled;
        self
    }

    /// Category, tag and type filters
    pub fn accepts(&self, node: &MemoryNode) -> bool {
        if let Some(category) = &self.category {
            if node.category_id.as_ref() != Some(category) {
                return false;
            }
        }
        if !self.tags.is_empty() && !node.has_any_tag(&self.tags) {
            return false;
        }
        if !self.types.is_empty() && !self.types.contains(&node.node_type) {
            return false;
        }
        true
    }
}

/// How a result was found
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum MatchKind {
    Keyword { quality: f32 },
    /// Adjusted distance, lower is better
    Vector { distance: f32 },
}

/// A ranked search result
#[derive(Debug, Clone, Serialize)]
pub struct SearchHit {
    pub node: MemoryNode,
    pub match_kind: MatchKind,
}

// ============================================================================
// SEARCH STATISTICS
// ============================================================================

/// One recorded query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryPattern {
    pub query: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub types: Vec<String>,
}

/// Counters updated by every search
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchStats {
    pub searches_performed: u64,
    /// Most recent queries, oldest first
    pub query_patterns: VecDeque<QueryPattern>,
    /// Accesses per priority tag
    pub access_patterns: HashMap<String, u64>,
    /// Times each node id was returned
    pub retrieval_counts: HashMap<String, u64>,
}

impl SearchStats {
    fn record_query(&mut self, query: &SearchQuery, keep: usize) {
        self.searches_performed += 1;
        self.query_patterns.push_back(QueryPattern {
            query: query.query.clone(),
            timestamp: Utc::now(),
            tags: query.tags.clone(),
            types: query.types.clone(),
        });
        while self.query_patterns.len() > keep {
            self.query_patterns.pop_front();
        }
        self.count_tags(query.tags.iter().map(String::as_str));
    }

    fn count_tags<'a>(&mut self, tags: impl Iterator<Item = &'a str>) {
        for tag in tags.filter(|t| is_priority_tag(t)) {
            *self.access_patterns.entry(tag.to_string()).or_insert(0) += 1;
        }
    }

    /// The `n` most retrieved node ids, most retrieved first
    pub fn top_retrieved(&self, n: usize) -> Vec<(String, u64)> {
        let mut counts: Vec<(String, u64)> = self
            .retrieval_counts
            .iter()
            .map(|(id, c)| (id.clone(), *c))
            .collect();
        counts.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        counts.truncate(n);
        counts
    }
}

// ============================================================================
// RECENCY ADJUSTMENT
// ============================================================================

/// Rescale a raw distance by node age and search frequency:
/// `d * (1 + min(cap, w*ln(1+age_days))) / (1 + w*ln(1+search_hits))`
pub fn recency_adjusted(
    distance: f32,
    age_days: f64,
    search_hits: u64,
    weight: f64,
    max_age_term: f64,
) -> f32 {
    let age_term = (weight * age_days.max(0.0).ln_1p()).min(max_age_term);
    let hits_term = (weight * (search_hits as f64).ln_1p()).max(0.0);
    (distance as f64 * (1.0 + age_term) / (1.0 + hits_term)) as f32
}

// ============================================================================
// HYBRID RETRIEVER
// ============================================================================

struct KeywordCandidate {
    id: String,
    quality: f32,
    last_accessed: DateTime<Utc>,
    created_at: DateTime<Utc>,
}

/// Fuses keyword and vector search over a store and its embedding index
pub struct HybridRetriever<'a> {
    config: &'a HybridSearchConfig,
}

impl<'a> HybridRetriever<'a> {
    pub fn new(config: &'a HybridSearchConfig) -> Self {
        Self { config }
    }

    /// Run a hybrid search. Never fails: errors degrade to [`Self::fallback`].
    pub fn search(
        &self,
        store: &mut MemoryStore,
        index: &EmbeddingIndex,
        stats: &mut SearchStats,
        query: &SearchQuery,
    ) -> Vec<SearchHit> {
        let started = std::time::Instant::now();
        stats.record_query(query, self.config.query_history);

        match self.try_search(store, index, stats, query) {
            Ok(hits) => {
                tracing::debug!(
                    query = %query.query,
                    results = hits.len(),
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Memory search"
                );
                hits
            }
            Err(e) => {
                tracing::error!("Error searching memory, using keyword fallback: {}", e);
                self.fallback(store, query)
            }
        }
    }

    /// Substring scan with filters, most recently accessed first. Pure read.
    pub fn fallback(&self, store: &MemoryStore, query: &SearchQuery) -> Vec<SearchHit> {
        let matcher = KeywordMatcher::new(&query.query, 0, 1.0);
        let mut nodes: Vec<&MemoryNode> = store
            .nodes()
            .filter(|n| query.accepts(n))
            .filter(|n| matcher.is_substring(&n.title, &n.content))
            .collect();
        nodes.sort_by(|a, b| b.last_accessed.cmp(&a.last_accessed));

        nodes
            .into_iter()
            .take(query.limit)
            .map(|n| SearchHit {
                node: n.clone(),
                match_kind: MatchKind::Keyword {
                    quality: EXACT_MATCH,
                },
            })
            .collect()
    }

    fn try_search(
        &self,
        store: &mut MemoryStore,
        index: &EmbeddingIndex,
        stats: &mut SearchStats,
        query: &SearchQuery,
    ) -> Result<Vec<SearchHit>, VectorSearchError> {
        if query.limit == 0 {
            return Ok(vec![]);
        }

        // Vector pass first: it is the only fallible step, so a failure
        // leaves the store untouched.
        let vector = self.vector_pass(store, index, query)?;
        let keyword = self.keyword_pass(store, stats, query);

        let now = Utc::now();
        let keyword_ids: HashSet<&str> = keyword.iter().map(|c| c.id.as_str()).collect();

        let mut ranked: Vec<(String, MatchKind)> = keyword
            .iter()
            .map(|c| (c.id.clone(), MatchKind::Keyword { quality: c.quality }))
            .collect();
        ranked.extend(
            vector
                .into_iter()
                .filter(|(id, _)| !keyword_ids.contains(id.as_str()))
                .map(|(id, distance)| (id, MatchKind::Vector { distance })),
        );
        ranked.truncate(query.limit);

        let mut touched: Vec<String> = keyword.iter().map(|c| c.id.clone()).collect();
        for (id, kind) in &ranked {
            let Some(node) = store.node_mut(id) else {
                continue;
            };
            if matches!(kind, MatchKind::Vector { .. }) {
                node.last_accessed = now;
                bump_search_hits(node);
                stats.count_tags(node.tags.iter().map(String::as_str));
                touched.push(id.clone());
            }
            node.metadata
                .insert(LAST_MATCHED_QUERY_KEY.into(), json!(query.query));
            *stats.retrieval_counts.entry(id.clone()).or_insert(0) += 1;
        }

        let touched: Vec<&str> = touched.iter().map(String::as_str).collect();
        store.persist(&touched);

        Ok(ranked
            .into_iter()
            .filter_map(|(id, match_kind)| {
                store.peek(&id).map(|node| SearchHit {
                    node: node.clone(),
                    match_kind,
                })
            })
            .collect())
    }

    /// Nearest neighbours after filtering, ascending adjusted distance
    fn vector_pass(
        &self,
        store: &MemoryStore,
        index: &EmbeddingIndex,
        query: &SearchQuery,
    ) -> Result<Vec<(String, f32)>, VectorSearchError> {
        let k = query.limit.saturating_mul(self.config.vector_overfetch.max(1));
        let neighbours = index.search(&query.query, k)?;
        let now = Utc::now();

        let mut results: Vec<(String, f32)> = neighbours
            .into_iter()
            .filter_map(|(id, distance)| {
                let node = store.peek(&id)?;
                if !query.accepts(node) {
                    return None;
                }
                let score = if query.recency_boost {
                    recency_adjusted(
                        distance,
                        node.age_days(now),
                        node.search_hits(),
                        self.config.recency_weight,
                        self.config.max_recency_term,
                    )
                } else {
                    distance
                };
                Some((id, score))
            })
            .collect();
        results.sort_by(|a, b| a.1.total_cmp(&b.1));
        Ok(results)
    }

    /// Graded matches in rank order. Every match is touched, its search
    /// hits bumped, the query appended to its search history and its
    /// priority tags counted.
    fn keyword_pass(
        &self,
        store: &mut MemoryStore,
        stats: &mut SearchStats,
        query: &SearchQuery,
    ) -> Vec<KeywordCandidate> {
        let matcher = KeywordMatcher::new(
            &query.query,
            self.config.fuzzy_min_tokens,
            self.config.fuzzy_token_ratio,
        );

        let mut candidates: Vec<KeywordCandidate> = store
            .nodes()
            .filter(|n| query.accepts(n))
            .filter_map(|n| {
                matcher
                    .quality(&n.title, &n.content)
                    .map(|quality| KeywordCandidate {
                        id: n.id.clone(),
                        quality,
                        last_accessed: n.last_accessed,
                        created_at: n.created_at,
                    })
            })
            .collect();

        candidates.sort_by(|a, b| {
            b.quality
                .total_cmp(&a.quality)
                .then_with(|| b.last_accessed.cmp(&a.last_accessed))
                .then_with(|| b.created_at.cmp(&a.created_at))
        });

        let now = Utc::now();
        for candidate in &candidates {
            if let Some(node) = store.node_mut(&candidate.id) {
                node.last_accessed = now;
                bump_search_hits(node);
                push_search_history(node, &query.query, now, self.config.node_search_history);
                stats.count_tags(node.tags.iter().map(String::as_str));
            }
        }

        candidates
    }
}

fn bump_search_hits(node: &mut MemoryNode) {
    let hits = node.search_hits() + 1;
    node.metadata.insert(SEARCH_HITS_KEY.into(), json!(hits));
}

fn push_search_history(node: &mut MemoryNode, query: &str, at: DateTime<Utc>, keep: usize) {
    let mut history = match node.metadata.remove(SEARCH_HISTORY_KEY) {
        Some(Value::Array(entries)) => entries,
        _ => vec![],
    };
    history.push(json!({
        "query": query,
        "timestamp": at,
        "matched_by": "keyword",
    }));
    let excess = history.len().saturating_sub(keep);
    history.drain(..excess);
    node.metadata
        .insert(SEARCH_HISTORY_KEY.into(), Value::Array(history));
}

// ============================================================================
// TESTS
// ============================================================================
