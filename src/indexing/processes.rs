//! Execution flow detection.
//!
//! Starting from entry-point nodes (`main`, OTP callbacks), follow
//! `calls` edges depth-first to build an ordered chain. Chains with at
//! least two steps become `process` nodes with `step_in_process` edges
//! carrying the step number; the first step has role `entry`, the rest
//! `step`. Traversal is cycle-safe and capped.

use std::collections::{BTreeMap, HashSet};

use crate::graph::KnowledgeGraph;
use crate::types::{GraphNode, GraphRelationship, NodeLabel, RelationKind};

/// Longest chain followed from one entry point.
const MAX_CHAIN_LENGTH: usize = 10;

/// Detect execution flows and add process nodes. Returns how many were
/// created.
pub fn detect_processes(graph: &mut KnowledgeGraph) -> usize {
    // Outgoing call adjacency, targets sorted for determinism.
    let mut callees: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for rel in graph.relationships_of_kind(RelationKind::Calls) {
        callees
            .entry(rel.source.clone())
            .or_default()
            .push(rel.target.clone());
    }
    for targets in callees.values_mut() {
        targets.sort();
    }

    let entry_points: Vec<String> = graph
        .iter_nodes()
        .filter(|n| n.is_entry_point)
        .map(|n| n.id.clone())
        .collect();

    let mut created = 0usize;
    for entry_id in entry_points {
        let mut chain: Vec<String> = vec![entry_id.clone()];
        let mut visited: HashSet<String> = chain.iter().cloned().collect();

        let mut current = entry_id.clone();
        while chain.len() < MAX_CHAIN_LENGTH {
            let Some(next) = callees
                .get(&current)
                .and_then(|targets| targets.iter().find(|t| !visited.contains(*t)))
            else {
                break;
            };
            let next = next.clone();
            visited.insert(next.clone());
            chain.push(next.clone());
            current = next;
        }

        if chain.len() < 2 {
            continue;
        }

        let entry_name = graph
            .get_node(&entry_id)
            .map(|n| n.name.clone())
            .unwrap_or_else(|| "entry".to_string());
        let name = format!("flow_{entry_name}_{created}");
        let mut process = GraphNode::new(NodeLabel::Process, "", &name);
        process.name = name;
        let process_id = process.id.clone();
        graph.add_node(process);

        for (step, member) in chain.into_iter().enumerate() {
            let mut rel =
                GraphRelationship::new(member, process_id.clone(), RelationKind::StepInProcess);
            rel.properties.step_number = step as i64 + 1;
            rel.properties.role = if step == 0 { "entry" } else { "step" }.to_string();
            graph.add_relationship(rel);
        }
        created += 1;
    }
    created
}

#[cfg(test)]
mod tests {
    use super::*;

    fn func(path: &str, name: &str, entry: bool) -> GraphNode {
        let mut node = GraphNode::new(NodeLabel::Function, path, name);
        node.is_entry_point = entry;
        node
    }

    fn call(a: &str, b: &str) -> GraphRelationship {
        GraphRelationship::new(a, b, RelationKind::Calls)
    }

    #[test]
    fn chains_become_processes_with_ordered_steps() {
        let mut graph = KnowledgeGraph::new();
        graph.add_node(func("m.py", "main", true));
        graph.add_node(func("a.py", "handle", false));
        graph.add_node(func("b.py", "persist", false));
        graph.add_relationship(call("function:m.py:main", "function:a.py:handle"));
        graph.add_relationship(call("function:a.py:handle", "function:b.py:persist"));

        let created = detect_processes(&mut graph);
        assert_eq!(created, 1);

        let steps: Vec<(&str, i64, &str)> = graph
            .relationships_of_kind(RelationKind::StepInProcess)
            .map(|r| {
                (
                    r.source.as_str(),
                    r.properties.step_number,
                    r.properties.role.as_str(),
                )
            })
            .collect();

        assert_eq!(steps.len(), 3);
        assert!(steps.contains(&("function:m.py:main", 1, "entry")));
        assert!(steps.contains(&("function:a.py:handle", 2, "step")));
        assert!(steps.contains(&("function:b.py:persist", 3, "step")));
    }

    #[test]
    fn cycles_do_not_loop_forever() {
        let mut graph = KnowledgeGraph::new();
        graph.add_node(func("a.py", "main", true));
        graph.add_node(func("a.py", "tick", false));
        graph.add_relationship(call("function:a.py:main", "function:a.py:tick"));
        graph.add_relationship(call("function:a.py:tick", "function:a.py:main"));

        let created = detect_processes(&mut graph);
        assert_eq!(created, 1);
        let step_count = graph
            .relationships_of_kind(RelationKind::StepInProcess)
            .count();
        assert_eq!(step_count, 2);
    }

    #[test]
    fn entry_without_calls_creates_nothing() {
        let mut graph = KnowledgeGraph::new();
        graph.add_node(func("a.py", "main", true));
        assert_eq!(detect_processes(&mut graph), 0);
    }
}
