//! Journey: an agent recalls memories by title, by shared words and by
//! meaning, and the ranking contract holds.

use std::sync::Arc;

use recollect_core::{EmbeddingIndex, MatchKind, SaveRequest, SearchQuery, StoreLayout};
use recollect_e2e_tests::{KeywordBucketEmbedder, TestDataFactory, TestStore};

#[test]
fn test_exact_title_ranks_first() {
    let mut store = TestStore::new_temp();
    let scenario = TestDataFactory::create_search_scenario(&mut store.engine);

    let expected = [
        ("rust", "Rust ownership"),
        ("pasta", "Pasta recipe"),
        ("dna", "Genetics"),
    ];
    for (handle, title) in expected {
        let hits = store.engine.search(&SearchQuery::new(title).limit(5));
        assert!(!hits.is_empty(), "no hits for {title}");
        assert_eq!(hits[0].node.id, scenario.id(handle));
        assert_eq!(hits[0].match_kind, MatchKind::Keyword { quality: 1.0 });
    }
}

#[test]
fn test_beta_scenario_prefers_most_recent_on_tie() {
    let mut store = TestStore::new_temp();
    store
        .engine
        .save(SaveRequest::new("doc1", "alpha beta").tags(["t"]))
        .unwrap();
    std::thread::sleep(std::time::Duration::from_millis(5));
    store.engine.save(SaveRequest::new("doc2", "beta gamma")).unwrap();

    let hits = store.engine.search(&SearchQuery::new("beta").limit(2));
    let titles: Vec<&str> = hits.iter().map(|h| h.node.title.as_str()).collect();
    assert_eq!(titles, vec!["doc2", "doc1"]);
    assert_eq!(hits[0].match_kind, hits[1].match_kind);
}

#[test]
fn test_keyword_hits_rank_ahead_of_vector_only_hits() {
    let embedder = KeywordBucketEmbedder::new(64);
    let mut store = TestStore::with_embedder(Some(Arc::new(embedder)));
    let vector_only = store
        .engine
        .save(SaveRequest::new("cluster ops", "kubernetes pods scaling"))
        .unwrap();
    let keyword = store
        .engine
        .save(SaveRequest::new("rollback", "kubernetes rollback procedure"))
        .unwrap();

    let hits = store
        .engine
        .search(&SearchQuery::new("kubernetes rollback").limit(2));
    assert_eq!(hits.len(), 2);
    assert_eq!(hits[0].node.id, keyword);
    assert!(matches!(hits[0].match_kind, MatchKind::Keyword { .. }));
    assert_eq!(hits[1].node.id, vector_only);
    assert!(matches!(hits[1].match_kind, MatchKind::Vector { .. }));
}

#[test]
fn test_filters_narrow_results() {
    let mut store = TestStore::new_temp();
    TestDataFactory::create_search_scenario(&mut store.engine);

    let hits = store
        .engine
        .search(&SearchQuery::new("the").tags(["science"]).limit(10));
    assert!(!hits.is_empty());
    assert!(hits.iter().all(|h| h.node.has_tag("science")));

    let hits = store
        .engine
        .search(&SearchQuery::new("data").types(["note"]).limit(10));
    assert!(hits.is_empty());
}

#[test]
fn test_search_updates_usage_statistics() {
    let mut store = TestStore::new_temp();
    let scenario = TestDataFactory::create_search_scenario(&mut store.engine);

    for _ in 0..3 {
        store.engine.search(&SearchQuery::new("Mitochondria").limit(1));
    }

    let node = store.engine.peek(scenario.id("cell")).unwrap();
    assert_eq!(node.search_hits(), 3);
    let stats = store.engine.stats();
    assert_eq!(stats.counters.searches_performed, 3);
    assert_eq!(stats.top_retrieved[0], (scenario.id("cell").to_string(), 3));
}

#[test]
fn test_removed_vector_never_returned() {
    let dir = tempfile::tempdir().unwrap();
    let layout = StoreLayout::new(dir.path());
    layout.create_dirs().unwrap();
    let embedder = Arc::new(KeywordBucketEmbedder::new(32));
    let mut index = EmbeddingIndex::open(&layout, Some(embedder.clone()), 10);

    for (id, text) in [("a", "red apple"), ("b", "red cherry"), ("c", "green pear")] {
        assert!(index.add(id, text).unwrap());
    }
    assert!(index.remove("b").unwrap());

    for query in ["red cherry", "red", "cherry", "green pear"] {
        let ids: Vec<String> = index
            .search(query, 10)
            .unwrap()
            .into_iter()
            .map(|(id, _)| id)
            .collect();
        assert!(!ids.contains(&"b".to_string()), "{query} returned a removed id");
        assert_eq!(ids.len(), 2);
    }

    // removal is persisted too
    let reopened = EmbeddingIndex::open(&layout, Some(embedder), 10);
    assert!(!reopened.contains("b"));
    assert_eq!(reopened.len(), 2);
}

#[test]
fn test_similar_cached_uses_cache_embeddings() {
    let mut store = TestStore::new_temp();
    let scenario = TestDataFactory::create_search_scenario(&mut store.engine);

    let similar = store.engine.similar_cached("pasta boil water salt", 1);
    assert_eq!(similar.len(), 1);
    assert_eq!(similar[0].0.id, scenario.id("pasta"));
}
