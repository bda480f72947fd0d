//! Journey: several async tasks of one agent share a single engine.

use std::time::Duration;

use recollect_core::{EngineConfig, MemoryEngine, SaveRequest, SearchQuery, SharedEngine};

#[tokio::test]
async fn test_concurrent_saves_are_all_visible() {
    let dir = tempfile::tempdir().unwrap();
    let engine = MemoryEngine::open(EngineConfig::new(dir.path()), None).unwrap();
    let shared = SharedEngine::new(engine);

    let mut handles = Vec::new();
    for task in 0..8 {
        let shared = shared.clone();
        handles.push(tokio::spawn(async move {
            let mut ids = Vec::new();
            for i in 0..5 {
                let id = shared
                    .save(SaveRequest::new(
                        format!("task {task} item {i}"),
                        format!("worker output t{task}i{i}"),
                    ))
                    .await
                    .unwrap();
                ids.push(id);
            }
            ids
        }));
    }

    let mut all = Vec::new();
    for handle in handles {
        all.extend(handle.await.unwrap());
    }
    assert_eq!(all.len(), 40);

    let count = shared.run(|engine| engine.len()).await.unwrap();
    assert_eq!(count, 40);

    let hits = shared
        .search(SearchQuery::new("t3i").limit(50))
        .await
        .unwrap();
    assert_eq!(hits.len(), 5);
    for id in &all {
        assert!(shared.get(id.clone()).await.unwrap().is_some());
    }
}

#[tokio::test]
async fn test_periodic_backup_task_runs() {
    let dir = tempfile::tempdir().unwrap();
    let engine = MemoryEngine::open(EngineConfig::new(dir.path()), None).unwrap();
    let shared = SharedEngine::new(engine);
    shared
        .save(SaveRequest::new("periodic", "backed up by the timer"))
        .await
        .unwrap();

    let task = shared.spawn_backup_task(Duration::from_millis(20));
    tokio::time::sleep(Duration::from_millis(150)).await;
    task.abort();

    let backups = shared.run(|engine| engine.list_backups()).await.unwrap().unwrap();
    // the interval allows only one unforced backup per hour
    assert_eq!(backups.len(), 1);
    assert_eq!(backups[0].state.as_ref().unwrap().num_nodes, 1);
}
