//! Journey: an agent backs up, the live store is damaged by a crash, and the
//! next start recovers the last snapshot.

use std::time::Duration;

use recollect_core::{MemoryLimits, SaveRequest, SearchQuery};
use recollect_e2e_tests::{TestDataFactory, TestStore};

#[test]
fn test_recovery_after_graph_corruption_keeps_node_count() {
    let mut store = TestStore::new_temp();
    TestDataFactory::create_batch(&mut store.engine, 7);
    TestDataFactory::create_memory(&mut store.engine, "Rollout", "canary first, then the fleet");
    store.engine.search(&SearchQuery::new("canary"));

    assert!(store.engine.create_backup(true).unwrap().is_some());
    let before = store.node_count();
    assert_eq!(before, 8);

    store.corrupt_graph();
    store.restart_after_crash();

    assert_eq!(store.node_count(), before);
    let stats = store.engine.stats();
    assert!(stats.recovered_from.is_some());
    assert_eq!(stats.counters.recoveries, 1);
    assert_eq!(stats.counters.searches_performed, 1);

    // recovered nodes are searchable again, by keyword and by vector
    let hits = store.engine.search(&SearchQuery::new("canary").limit(1));
    assert_eq!(hits[0].node.title, "Rollout");
    assert_eq!(store.engine.index().len(), before);
}

#[test]
fn test_recovery_after_graph_deleted() {
    let mut store = TestStore::without_embedder();
    let ids = store.seed_nodes(4);
    store.engine.create_backup(true).unwrap();

    store.delete_graph();
    store.restart_after_crash();

    assert_eq!(store.node_count(), 4);
    for id in &ids {
        assert!(store.engine.peek(id).is_some());
    }
}

#[test]
fn test_clean_restart_does_not_recover() {
    let mut store = TestStore::new_temp();
    store.seed_nodes(3);
    store.engine.create_backup(true).unwrap();
    // saved after the snapshot, so the live store is newer
    store.engine.save(SaveRequest::new("later", "after backup")).unwrap();

    store.reopen();
    assert_eq!(store.node_count(), 4);
    assert!(store.engine.stats().recovered_from.is_none());
    assert_eq!(store.engine.counters().recoveries, 0);
}

#[test]
fn test_categories_restored_with_snapshot() {
    let mut store = TestStore::without_embedder();
    let parent = store.engine.add_category("work", "", None);
    let child = store.engine.add_category("meetings", "", Some(&parent));
    store.seed_nodes(2);
    store.engine.create_backup(true).unwrap();

    store.corrupt_graph();
    store.restart_after_crash();

    let names: Vec<&str> = store
        .engine
        .category_path(&child)
        .into_iter()
        .map(|c| c.name.as_str())
        .collect();
    assert_eq!(names, vec!["work", "meetings"]);
}

#[test]
fn test_backup_interval_and_retention() {
    let mut store = TestStore::with_config(None, |config| {
        config.with_limits(MemoryLimits {
            max_backups: 3,
            backup_interval: Duration::from_secs(3600),
            ..MemoryLimits::default()
        })
    });

    assert!(store.engine.create_backup(false).unwrap().is_some());
    // inside the interval, unforced attempts are skipped
    assert!(store.engine.create_backup(false).unwrap().is_none());

    for _ in 0..4 {
        assert!(store.engine.create_backup(true).unwrap().is_some());
    }
    let backups = store.engine.list_backups().unwrap();
    assert_eq!(backups.len(), 3);
    assert!(backups.iter().all(|b| b.state.is_some()));
    assert_eq!(store.engine.counters().backups_created, 5);
    assert!(store.latest_backup().is_some());
}

#[test]
fn test_permanent_save_triggers_backup() {
    let mut store = TestStore::without_embedder();
    assert!(store.engine.list_backups().unwrap().is_empty());

    store
        .engine
        .add_to_knowledge_base("Service owners", "payments: team blue", &[])
        .unwrap();

    let backups = store.engine.list_backups().unwrap();
    assert_eq!(backups.len(), 1);
    assert_eq!(backups[0].state.as_ref().unwrap().num_nodes, 1);
}

#[test]
fn test_mind_maps_come_back_after_crash() {
    let mut store = TestStore::new_temp();
    store.seed_nodes(2);
    let map_id = store
        .engine
        .create_mind_map("Incident review", "pager storm on monday", "task")
        .unwrap();
    let root = store.engine.mind_maps().peek(&map_id).unwrap().root_id.clone();
    store
        .engine
        .add_mind_map_concept(&map_id, "Alert tuning", "raise thresholds", Some(&root), "fix", None)
        .unwrap();
    let backup = store.engine.create_backup(true).unwrap().unwrap();
    assert!(backup.join("mind_maps").join(format!("{map_id}.json")).is_file());

    store.corrupt_graph();
    std::fs::remove_dir_all(store.layout().mind_maps_dir()).unwrap();
    store.restart_after_crash();

    assert_eq!(store.engine.counters().recoveries, 1);
    let hits = store.engine.search_mind_maps("thresholds", 3);
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].id, map_id);
    assert_eq!(hits[0].concept_count, 2);

    let memory = store.engine.session_memory();
    assert_eq!(memory.mind_maps[0].id, map_id);
}
