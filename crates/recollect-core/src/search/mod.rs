//! Search Module
//!
//! Provides the retrieval side of the engine:
//! - Exact vector search over a flat L2 index
//! - Graded keyword matching
//! - Hybrid search fusing both, with recency/frequency damping

mod hybrid;
mod keyword;
mod vector;

pub use vector::{
    EmbeddingIndex, FlatIndex, VectorIndexStats, VectorSearchError, DEFAULT_FLUSH_EVERY,
};

pub use keyword::{KeywordMatcher, ALL_TOKENS_MATCH, EXACT_MATCH, FUZZY_MATCH};

pub use hybrid::{
    is_priority_tag, recency_adjusted, HybridRetriever, HybridSearchConfig, MatchKind,
    QueryPattern, SearchHit, SearchQuery, SearchStats, LAST_MATCHED_QUERY_KEY, PRIORITY_TAGS,
    SEARCH_HISTORY_KEY,
};
