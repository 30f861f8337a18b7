//! Dead code detection.
//!
//! Callable nodes with no incoming `calls` edge are flagged `is_dead`,
//! excluding constructors, test functions, entry points, and
//! language-reserved names (dunders, `init`, `new`).

use std::collections::HashSet;

use crate::graph::KnowledgeGraph;
use crate::types::{NodeLabel, RelationKind};

const RESERVED_NAMES: [&str; 6] = ["__init__", "init", "new", "constructor", "main", "start_link"];

/// Flag dead callables. Returns how many nodes were marked.
pub fn find_dead_code(graph: &mut KnowledgeGraph) -> usize {
    let called: HashSet<String> = graph
        .relationships_of_kind(RelationKind::Calls)
        .map(|r| r.target.clone())
        .collect();

    let mut marked = 0usize;
    for node in graph.iter_nodes_mut() {
        if !matches!(
            node.label,
            NodeLabel::Function | NodeLabel::Method | NodeLabel::Macro
        ) {
            continue;
        }
        if called.contains(&node.id) || node.is_entry_point {
            continue;
        }
        if is_excluded_name(&node.name) || is_test_path(&node.file_path) {
            continue;
        }
        node.is_dead = true;
        marked += 1;
    }
    marked
}

fn is_excluded_name(name: &str) -> bool {
    if RESERVED_NAMES.contains(&name) {
        return true;
    }
    // Python dunders and test functions.
    (name.starts_with("__") && name.ends_with("__")) || name.starts_with("test_")
}

fn is_test_path(path: &str) -> bool {
    let basename = path.rsplit('/').next().unwrap_or(path);
    path.split('/').any(|part| part == "tests" || part == "test")
        || basename.starts_with("test_")
        || basename.contains(".test.")
        || basename.ends_with("_test.go")
        || basename.ends_with("_test.py")
}
