//! Community detection over the call/import structure.
//!
//! Connected components (union-find over undirected `calls` + `imports`
//! edges) with at least two members become `community` nodes, with a
//! `member_of` edge per member. Components are numbered in order of their
//! smallest member ID so repeated runs produce identical nodes.

use petgraph::unionfind::UnionFind;
use std::collections::{BTreeMap, HashMap};

use crate::graph::KnowledgeGraph;
use crate::types::{GraphNode, GraphRelationship, NodeLabel, RelationKind};

/// Minimum members for a component to be materialized.
const MIN_COMMUNITY_SIZE: usize = 2;

/// Detect communities and add them to the graph. Returns how many
/// community nodes were created.
pub fn detect_communities(graph: &mut KnowledgeGraph) -> usize {
    let ids: Vec<String> = graph.iter_nodes().map(|n| n.id.clone()).collect();
    let index_of: HashMap<&str, usize> = ids
        .iter()
        .enumerate()
        .map(|(i, id)| (id.as_str(), i))
        .collect();

    let mut union_find: UnionFind<usize> = UnionFind::new(ids.len());
    for rel in graph.iter_relationships() {
        if !matches!(rel.kind, RelationKind::Calls | RelationKind::Imports) {
            continue;
        }
        if let (Some(&a), Some(&b)) = (
            index_of.get(rel.source.as_str()),
            index_of.get(rel.target.as_str()),
        ) {
            union_find.union(a, b);
        }
    }

    // Group members, keyed by the component's smallest member ID.
    let mut components: BTreeMap<String, Vec<String>> = BTreeMap::new();
    let mut roots: HashMap<usize, String> = HashMap::new();
    for (i, id) in ids.iter().enumerate() {
        let root = union_find.find(i);
        let key = roots.entry(root).or_insert_with(|| id.clone());
        if id < key {
            *key = id.clone();
        }
    }
    for (i, id) in ids.iter().enumerate() {
        let root = union_find.find(i);
        let key = roots[&root].clone();
        components.entry(key).or_default().push(id.clone());
    }

    let mut created = 0usize;
    for (_, members) in components {
        if members.len() < MIN_COMMUNITY_SIZE {
            continue;
        }
        let name = format!("community_{created}");
        let mut community = GraphNode::new(NodeLabel::Community, "", &name);
        community.name = name;
        let community_id = community.id.clone();
        graph.add_node(community);

        for member in members {
            graph.add_relationship(GraphRelationship::new(
                member,
                community_id.clone(),
                RelationKind::MemberOf,
            ));
        }
        created += 1;
    }
    created
}
