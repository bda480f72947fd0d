//! Journey: the embedding model is missing, broken, or misconfigured, and the
//! agent keeps saving and recalling by keyword.

use std::sync::Arc;

use recollect_core::{MatchKind, MemoryError, SaveRequest, SearchQuery, VectorSearchError};
use recollect_e2e_tests::{
    FailingEmbedder, KeywordBucketEmbedder, TestStore, UnavailableEmbedder,
    WrongDimensionEmbedder,
};

#[test]
fn test_unavailable_embedder_degrades_to_keywords() {
    let mut store = TestStore::with_embedder(Some(Arc::new(UnavailableEmbedder)));
    let id = store
        .engine
        .save(SaveRequest::new("Backups", "snapshots run hourly"))
        .unwrap();

    let stats = store.engine.stats();
    assert!(!stats.vectors.available);
    assert_eq!(stats.vectors.total_vectors, 0);

    let hits = store.engine.search(&SearchQuery::new("hourly"));
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].node.id, id);
    assert!(matches!(hits[0].match_kind, MatchKind::Keyword { .. }));

    assert!(store.engine.similar_cached("hourly", 3).is_empty());
}

#[test]
fn test_failing_embedder_still_saves_and_finds() {
    let mut store = TestStore::with_embedder(Some(Arc::new(FailingEmbedder)));
    let id = store
        .engine
        .save(SaveRequest::new("Oncall", "page the secondary after ten minutes"))
        .unwrap();
    assert_eq!(store.engine.index().len(), 0);

    let hits = store.engine.search(&SearchQuery::new("SECONDARY"));
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].node.id, id);
}

#[test]
fn test_wrong_dimension_is_reported_but_node_kept() {
    let mut store = TestStore::with_embedder(Some(Arc::new(WrongDimensionEmbedder::new(8))));
    let result = store.engine.save(SaveRequest::new("Mismatch", "vector has nine components"));

    assert!(matches!(
        result,
        Err(MemoryError::VectorSearch(VectorSearchError::InvalidDimensions(8, 9)))
    ));
    assert_eq!(store.node_count(), 1);

    let hits = store.engine.search(&SearchQuery::new("nine components"));
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].node.title, "Mismatch");
}

#[test]
fn test_no_embedder_at_all() {
    let mut store = TestStore::without_embedder();
    store.seed_nodes(3);

    let hits = store.engine.search(&SearchQuery::new("content 1"));
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].node.title, "Test memory 1");
    assert_eq!(store.engine.stats().vectors.model, "none");
}

#[test]
fn test_changed_dimension_reembeds_every_node() {
    let mut store = TestStore::with_embedder(Some(Arc::new(KeywordBucketEmbedder::new(32))));
    store.seed_nodes(4);
    store.engine.flush().unwrap();
    assert_eq!(store.engine.index().len(), 4);
    let root = store.root().to_path_buf();

    // same root, different model dimension
    let config = recollect_core::EngineConfig::new(&root);
    let engine = recollect_core::MemoryEngine::open(
        config,
        Some(Arc::new(KeywordBucketEmbedder::new(48))),
    )
    .unwrap();
    assert_eq!(engine.len(), 4);
    assert_eq!(engine.index().dimensions(), 48);
    // the 32-dimension vectors are discarded and every node is embedded again
    assert_eq!(engine.index().len(), 4);
}
