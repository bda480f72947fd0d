//! Journey: the cache layer stays within its capacity while an agent reads
//! more memories than fit.

use std::num::NonZeroUsize;

use recollect_core::{CacheLayer, MemoryNode};
use recollect_e2e_tests::{TestDataFactory, TestStore};

fn node(id: &str) -> MemoryNode {
    let mut node = MemoryNode::new(id, format!("content of {id}"), "document");
    node.id = id.to_string();
    node
}

#[test]
fn test_access_then_insert_evicts_least_recently_used() {
    let k = 3;
    let mut cache = CacheLayer::new(NonZeroUsize::new(k).unwrap(), None);
    for id in ["n1", "n2", "n3"] {
        cache.put_node(node(id));
    }

    // n1 becomes most recently used, so n2 is the eviction candidate
    assert!(cache.get_node("n1").is_some());
    cache.put_node(node("n4"));

    assert_eq!(cache.len(), k);
    assert!(cache.contains("n1"));
    assert!(!cache.contains("n2"));
    assert!(cache.contains("n3"));
    assert!(cache.contains("n4"));
}

#[test]
fn test_engine_cache_never_exceeds_capacity() {
    let capacity = 5;
    let mut store = TestStore::with_config(None, |config| config.with_cache_capacity(capacity));
    let ids = TestDataFactory::create_batch(&mut store.engine, 20);

    for id in ids.iter().rev() {
        assert!(store.engine.get(id).is_some());
        let stats = store.engine.stats().cache.unwrap();
        assert!(stats.node_entries <= capacity);
        assert!(stats.relation_entries <= capacity);
    }
    for id in &ids {
        store.engine.related(id, 1);
    }
    let stats = store.engine.stats().cache.unwrap();
    assert_eq!(stats.node_entries, capacity);
    assert!(stats.relation_entries <= capacity);
}

#[test]
fn test_zero_capacity_disables_cache() {
    let mut store = TestStore::with_config(None, |config| config.with_cache_capacity(0));
    let id = TestDataFactory::create_memory(&mut store.engine, "t", "c").unwrap();

    assert!(store.engine.get(&id).is_some());
    assert!(store.engine.stats().cache.is_none());
    assert!(store.engine.similar_cached("c", 3).is_empty());
}
