//! Journey: an agent saves documents, notes and conversations, restarts, and
//! reads everything back unchanged.

use recollect_core::{MemoryLimits, SaveRequest, TRUNCATION_MARKER};
use recollect_e2e_tests::{TestDataFactory, TestStore};

#[test]
fn test_saved_nodes_round_trip_through_restart() {
    let mut store = TestStore::new_temp();

    let requests = [
        SaveRequest::new("Deploy checklist", "run migrations before restarting workers")
            .tags(["ops", "deploy"]),
        SaveRequest::new("Café notes ☕", "naïve façade, unicode survives")
            .node_type("fact")
            .tags(["i18n"]),
        SaveRequest::new("Empty body", ""),
    ];

    let mut saved = Vec::new();
    for request in requests {
        let expected = (
            request.title.clone(),
            request.content.clone(),
            request.tags.clone(),
            request.node_type.clone().unwrap_or_else(|| "document".into()),
        );
        let id = store.engine.save(request).unwrap();
        saved.push((id, expected));
    }

    let check = |store: &mut TestStore| {
        for (id, (title, content, tags, node_type)) in &saved {
            let node = store.engine.get(id).expect("saved node is readable");
            assert_eq!(&node.title, title);
            assert_eq!(&node.content, content);
            let mut got = node.tags.clone();
            got.sort();
            let mut want = tags.clone();
            want.sort();
            assert_eq!(got, want);
            assert_eq!(&node.node_type, node_type);
        }
    };

    check(&mut store);
    store.reopen();
    check(&mut store);
    assert_eq!(store.node_count(), 3);
}

#[test]
fn test_oversized_document_is_truncated() {
    let mut store = TestStore::with_config(None, |config| {
        config.with_limits(MemoryLimits {
            max_document_size: 64,
            ..MemoryLimits::default()
        })
    });

    let content = "x".repeat(500);
    let id = store.engine.save(SaveRequest::new("big", content)).unwrap();
    let node = store.engine.peek(&id).unwrap();

    assert!(node.content.ends_with(TRUNCATION_MARKER));
    assert_eq!(node.content.len(), 64 + TRUNCATION_MARKER.len());
    assert_eq!(node.metadata["truncated"], serde_json::json!(true));
    assert_eq!(node.metadata["original_size"], serde_json::json!(500));
}

#[test]
fn test_conversation_is_summarized_and_written() {
    let mut store = TestStore::new_temp();
    let id = TestDataFactory::create_conversation(&mut store.engine, "conv-42").unwrap();

    let node = store.engine.peek(&id).unwrap().clone();
    assert_eq!(node.title, "Conversation conv-42");
    assert_eq!(node.node_type, "conversation");
    assert_eq!(node.metadata["message_count"], serde_json::json!(4));

    let summary = node.metadata["summary"].as_str().unwrap();
    assert!(summary.contains("How do I list the log directory?"));
    assert!(summary.contains("bash: ls -la /var/log"));

    let file = store.layout().conversation_file("conv-42").unwrap();
    let written: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(file).unwrap()).unwrap();
    assert_eq!(written["node_id"], serde_json::json!(id));
    assert_eq!(written["messages"].as_array().unwrap().len(), 4);
    assert_eq!(store.engine.counters().conversations_saved, 1);
}

#[test]
fn test_notes_are_tagged_and_counted() {
    let mut store = TestStore::without_embedder();
    let normal =
        TestDataFactory::create_note(&mut store.engine, "cache warms slowly", false).unwrap();
    let high =
        TestDataFactory::create_note(&mut store.engine, "never delete prod data", true).unwrap();

    let normal = store.engine.peek(&normal).unwrap().clone();
    assert_eq!(normal.node_type, "note");
    assert!(normal.has_tag("agent_notes"));
    assert!(normal.has_tag("observation"));
    assert!(!normal.has_tag("important"));
    assert!(normal.title.starts_with("Observation Note - "));

    let high = store.engine.peek(&high).unwrap().clone();
    assert!(high.has_tag("important"));
    assert!(high.is_permanent());

    let counters = store.engine.counters();
    assert_eq!(counters.notes_added, 2);
    assert_eq!(counters.documents_saved, 0);
}

#[test]
fn test_export_then_import_into_fresh_store() {
    let mut source = TestStore::new_temp();
    let ids = TestDataFactory::create_batch(&mut source.engine, 12);
    let exported = source.engine.export();
    assert_eq!(exported.len(), 12);

    let mut target = TestStore::new_temp();
    assert_eq!(target.engine.import(exported.clone()).unwrap(), 12);
    // importing again skips every existing id
    assert_eq!(target.engine.import(exported).unwrap(), 0);

    for id in &ids {
        let original = source.engine.peek(id).unwrap();
        let copy = target.engine.peek(id).unwrap();
        assert_eq!(original.created_at, copy.created_at);
        assert_eq!(original.content, copy.content);
    }
    assert_eq!(target.engine.index().len(), 12);
}
