//! Storage adapter tests against a real embedded database.

use std::sync::Arc;

use axon::graph::KnowledgeGraph;
use axon::storage::GraphStore;
use axon::types::{GraphNode, GraphRelationship, NodeEmbedding, NodeLabel, RelationKind};
use tempfile::TempDir;

fn open_store(dir: &TempDir) -> GraphStore {
    GraphStore::open(&dir.path().join("graph-db"), false).unwrap()
}

fn function_node(path: &str, name: &str, content: &str) -> GraphNode {
    let mut node = GraphNode::new(NodeLabel::Function, path, name);
    node.start_line = 1;
    node.end_line = 2;
    node.content = content.to_string();
    node.language = "python".to_string();
    node
}

fn file_node(path: &str, content: &str) -> GraphNode {
    let mut node = GraphNode::new(NodeLabel::File, path, "");
    node.name = path.rsplit('/').next().unwrap_or(path).to_string();
    node.start_line = 1;
    node.end_line = content.lines().count().max(1) as i64;
    node.content = content.to_string();
    node
}

fn sample_graph() -> KnowledgeGraph {
    let mut graph = KnowledgeGraph::new();
    graph.add_node(file_node("src/a.py", "def caller():\n    callee()\n"));
    graph.add_node(file_node("src/b.py", "def callee():\n    pass\n"));
    graph.add_node(function_node("src/a.py", "caller", "def caller():\n    callee()\n"));
    graph.add_node(function_node("src/b.py", "callee", "def callee():\n    pass\n"));
    graph.add_relationship(GraphRelationship::new(
        "file:src/a.py:",
        "function:src/a.py:caller",
        RelationKind::Defines,
    ));
    graph.add_relationship(GraphRelationship::new(
        "file:src/b.py:",
        "function:src/b.py:callee",
        RelationKind::Defines,
    ));
    graph.add_relationship(
        GraphRelationship::new(
            "function:src/a.py:caller",
            "function:src/b.py:callee",
            RelationKind::Calls,
        )
        .with_confidence(0.9),
    );
    graph
}

#[test]
fn bulk_load_round_trips_nodes() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir);
    store.bulk_load(&sample_graph()).unwrap();

    let caller = store.get_node("function:src/a.py:caller").unwrap();
    assert_eq!(caller.name, "caller");
    assert_eq!(caller.file_path, "src/a.py");
    assert_eq!(caller.label, NodeLabel::Function);
    assert_eq!(caller.start_line, 1);
    assert_eq!(caller.language, "python");

    assert!(store.get_node("function:src/a.py:ghost").is_none());
}

#[test]
fn callers_and_callees_follow_call_edges() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir);
    store.bulk_load(&sample_graph()).unwrap();

    let callers = store.get_callers("function:src/b.py:callee");
    assert_eq!(callers.len(), 1);
    assert_eq!(callers[0].id, "function:src/a.py:caller");

    let callees = store.get_callees("function:src/a.py:caller");
    assert_eq!(callees.len(), 1);
    assert_eq!(callees[0].id, "function:src/b.py:callee");

    let with_confidence = store.get_callees_with_confidence("function:src/a.py:caller");
    assert_eq!(with_confidence.len(), 1);
    assert!((with_confidence[0].1 - 0.9).abs() < 1e-9);
}

#[test]
fn remove_nodes_by_file_is_surgical() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir);
    store.bulk_load(&sample_graph()).unwrap();

    store.remove_nodes_by_file("src/b.py");

    assert!(store.get_node("function:src/b.py:callee").is_none());
    assert!(store.get_node("file:src/b.py:").is_none());
    // Other files are untouched.
    assert!(store.get_node("function:src/a.py:caller").is_some());
    assert!(store.get_node("file:src/a.py:").is_some());
}

#[test]
fn exact_search_scores_and_sorts() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir);

    let mut graph = sample_graph();
    graph.add_node(file_node("src/tests/test_x.py", "def caller():\n    pass\n"));
    graph.add_node(function_node(
        "src/tests/test_x.py",
        "caller",
        "def caller():\n    pass\n",
    ));
    store.bulk_load(&graph).unwrap();

    let results = store.exact_name_search("caller", 5);
    assert_eq!(results.len(), 2);
    // Source hit outranks the test-path hit.
    assert_eq!(results[0].node_id, "function:src/a.py:caller");
    assert_eq!(results[0].score, 2.0);
    assert_eq!(results[1].score, 1.0);
    assert_eq!(results[0].label, "function");
}

#[test]
fn search_respects_limit() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir);

    let mut graph = KnowledgeGraph::new();
    for i in 0..10 {
        let path = format!("src/m{i}.py");
        graph.add_node(file_node(&path, "def same():\n    pass\n"));
        graph.add_node(function_node(&path, "same", "def same():\n    pass\n"));
    }
    store.bulk_load(&graph).unwrap();

    assert_eq!(store.exact_name_search("same", 3).len(), 3);
}

#[test]
fn traversal_is_cycle_safe_and_capped() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir);

    // a -> b -> c -> a cycle.
    let mut graph = KnowledgeGraph::new();
    for name in ["a", "b", "c"] {
        graph.add_node(function_node("src/x.py", name, "def f():\n    pass\n"));
    }
    for (src, dst) in [("a", "b"), ("b", "c"), ("c", "a")] {
        graph.add_relationship(GraphRelationship::new(
            format!("function:src/x.py:{src}"),
            format!("function:src/x.py:{dst}"),
            RelationKind::Calls,
        ));
    }
    store.bulk_load(&graph).unwrap();

    let reached = store.traverse("function:src/x.py:a", 50, false);
    let mut ids: Vec<&str> = reached.iter().map(|n| n.id.as_str()).collect();
    ids.sort();
    // Start node excluded, each node visited once despite the cycle.
    assert_eq!(ids, vec!["function:src/x.py:b", "function:src/x.py:c"]);

    let with_depth = store.traverse_with_depth("function:src/x.py:a", 50, false);
    assert!(with_depth.iter().all(|(_, depth)| *depth <= 10));
}

#[test]
fn embeddings_store_and_search() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir);
    store.bulk_load(&sample_graph()).unwrap();

    store
        .store_embeddings(&[
            NodeEmbedding {
                node_id: "function:src/a.py:caller".into(),
                vector: vec![1.0, 0.0, 0.0],
            },
            NodeEmbedding {
                node_id: "function:src/b.py:callee".into(),
                vector: vec![0.0, 1.0, 0.0],
            },
        ])
        .unwrap();

    let results = store.vector_search(&[1.0, 0.0, 0.0], 2);
    // Best-effort path: on engines without cosine support this is empty,
    // otherwise the aligned vector must rank first.
    if let Some(top) = results.first() {
        assert_eq!(top.node_id, "function:src/a.py:caller");
        assert!(top.score > 0.99);
    }
}

#[test]
fn fts_and_fuzzy_degrade_without_erroring() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir);
    store.bulk_load(&sample_graph()).unwrap();

    // FTS depends on the optional extension; fuzzy on engine functions.
    // Both must degrade to (possibly empty) results, never error.
    assert!(store.fts_search("caller", 5).len() <= 5);
    assert!(store.fuzzy_search("callr", 5, 2).len() <= 5);
}

#[test]
fn execute_raw_passes_through() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir);
    store.bulk_load(&sample_graph()).unwrap();

    let rows = store
        .execute_raw("MATCH (n:Function) RETURN n.name ORDER BY n.name")
        .unwrap();
    let names: Vec<&str> = rows.iter().filter_map(|r| r[0].as_str()).collect();
    assert_eq!(names, vec!["callee", "caller"]);
}

#[test]
fn reopen_preserves_data() {
    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("graph-db");
    {
        let store = GraphStore::open(&db_path, false).unwrap();
        store.bulk_load(&sample_graph()).unwrap();
    }

    let reopened = GraphStore::open(&db_path, false).unwrap();
    assert!(reopened.get_node("function:src/a.py:caller").is_some());
    assert_eq!(reopened.get_indexed_files().len(), 2);
}

#[test]
fn shared_store_is_send_across_threads() {
    let dir = TempDir::new().unwrap();
    let store = Arc::new(open_store(&dir));
    store.bulk_load(&sample_graph()).unwrap();

    let worker_store = store.clone();
    let handle = std::thread::spawn(move || worker_store.get_node("function:src/b.py:callee"));
    assert!(handle.join().unwrap().is_some());
}
