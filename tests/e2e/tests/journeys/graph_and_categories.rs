//! Journey: an agent links memories, files them into categories, reorganizes
//! the hierarchy, and the graph stays consistent across restarts.

use std::collections::HashSet;

use recollect_core::SaveRequest;
use recollect_e2e_tests::{TestDataFactory, TestStore};

fn id_set(nodes: &[recollect_core::MemoryNode]) -> HashSet<String> {
    nodes.iter().map(|n| n.id.clone()).collect()
}

#[test]
fn test_related_depth_one_is_direct_neighbours() {
    let mut store = TestStore::without_embedder();
    let scenario = TestDataFactory::create_graph_scenario(&mut store.engine);

    let depth1 = id_set(&store.engine.related(scenario.id("hub"), 1));
    // hub -> a (successor), b -> hub (predecessor)
    let expected: HashSet<String> = [scenario.id("a"), scenario.id("b")]
        .into_iter()
        .map(String::from)
        .collect();
    assert_eq!(depth1, expected);

    let depth2 = id_set(&store.engine.related(scenario.id("hub"), 2));
    assert!(depth2.is_superset(&depth1));
    assert!(depth2.contains(scenario.id("far")));
    assert!(!depth2.contains(scenario.id("isolated")));
    assert!(!depth2.contains(scenario.id("hub")));

    assert!(store.engine.related(scenario.id("isolated"), 3).is_empty());
    assert!(store.engine.related("no-such-node", 1).is_empty());
}

#[test]
fn test_related_cache_sees_new_links() {
    let mut store = TestStore::new_temp();
    let scenario = TestDataFactory::create_graph_scenario(&mut store.engine);
    let hub = scenario.id("hub");

    assert_eq!(store.engine.related(hub, 1).len(), 2);
    assert!(store.engine.link(
        scenario.id("isolated"),
        hub,
        "mentions",
        0.5,
        serde_json::Map::new()
    ));
    let depth1 = id_set(&store.engine.related(hub, 1));
    assert_eq!(depth1.len(), 3);
    assert!(depth1.contains(scenario.id("isolated")));
}

#[test]
fn test_references_become_edges_and_survive_restart() {
    let mut store = TestStore::without_embedder();
    let design = store
        .engine
        .save(SaveRequest::new("design", "storage layout"))
        .unwrap();
    let impl_note = store
        .engine
        .save(
            SaveRequest::new("impl", "follows the design")
                .references([design.clone(), "missing".into()]),
        )
        .unwrap();

    assert_eq!(store.engine.stats().edges, 1);
    store.reopen();
    assert_eq!(store.engine.stats().edges, 1);
    let related = id_set(&store.engine.related(&design, 1));
    assert!(related.contains(&impl_note));
}

#[test]
fn test_category_path_scenario() {
    let mut store = TestStore::without_embedder();
    let a = store.engine.add_category("A", "", None);
    let b = store.engine.add_category("B", "", Some(&a));

    let path: Vec<&str> = store
        .engine
        .category_path(&b)
        .into_iter()
        .map(|c| c.name.as_str())
        .collect();
    assert_eq!(path, vec!["A", "B"]);

    // unknown parent creates a root
    let orphan = store.engine.add_category("orphan", "", Some("cat_missing"));
    assert_eq!(store.engine.category(&orphan).unwrap().parent_id, None);
}

#[test]
fn test_merge_leaves_no_children_of_source() {
    let mut store = TestStore::without_embedder();
    let engine = &mut store.engine;

    let source = engine.add_category("inbox", "", None);
    let target = engine.add_category("archive", "", None);
    let child1 = engine.add_category("2023", "", Some(&source));
    let child2 = engine.add_category("2024", "", Some(&source));
    let grandchild = engine.add_category("q1", "", Some(&child2));
    let other = engine.add_category("other", "", None);
    assert!(engine.add_relation(&source, &other, "see_also", 0.4));

    let filed = engine
        .save(SaveRequest::new("receipt", "invoice 17").category(source.clone()))
        .unwrap();

    assert!(engine.merge_categories(&source, &target));

    assert!(engine.category(&source).is_none());
    assert!(engine
        .categories()
        .iter()
        .all(|c| c.parent_id.as_deref() != Some(source.as_str())));
    for child in [&child1, &child2] {
        assert_eq!(engine.category(child).unwrap().parent_id.as_deref(), Some(target.as_str()));
    }
    assert_eq!(
        engine.category(&grandchild).unwrap().parent_id.as_deref(),
        Some(child2.as_str())
    );

    let related = engine.related_categories(&target, None, 0.0);
    assert_eq!(related.len(), 1);
    assert_eq!(related[0].category_id, other);

    assert_eq!(engine.peek(&filed).unwrap().category_id.as_deref(), Some(target.as_str()));
    assert_eq!(engine.node_path(&filed), vec!["archive".to_string()]);

    // merging into a descendant is refused
    assert!(!engine.merge_categories(&target, &grandchild));

    store.reopen();
    assert!(store.engine.category(&source).is_none());
    assert_eq!(store.engine.subcategories(&target, true).len(), 3);
}

#[test]
fn test_category_contents_recursive() {
    let mut store = TestStore::without_embedder();
    let engine = &mut store.engine;

    let projects = engine.add_category("projects", "", None);
    let web = engine.add_category("web", "", Some(&projects));
    let top = engine
        .save(SaveRequest::new("roadmap", "q3 goals").category(projects.clone()))
        .unwrap();
    let nested = engine
        .save(SaveRequest::new("css", "grid layout notes"))
        .unwrap();
    assert!(engine.move_to_category(&nested, &web));
    assert!(!engine.move_to_category(&nested, "cat_missing"));

    assert_eq!(id_set(&engine.category_contents(&projects, false)), HashSet::from([top.clone()]));
    assert_eq!(
        id_set(&engine.category_contents(&projects, true)),
        HashSet::from([top, nested.clone()])
    );
    assert_eq!(engine.node_path(&nested), vec!["projects".to_string(), "web".to_string()]);
}
