//! In-memory knowledge graph.
//!
//! The graph is naturally cyclic (calls, imports), so it is represented as
//! a node arena keyed by string ID plus a flat edge list, never as a
//! direct-reference object graph. Storage persists the same shape.
//! Iteration order is deterministic (sorted by ID) so parallel parsing
//! upstream cannot leak nondeterminism into storage loads.

use std::collections::{BTreeMap, HashSet};

use crate::types::{GraphNode, GraphRelationship, NodeLabel, RelationKind};

/// Node arena plus typed edge list, with stable string IDs as handles.
#[derive(Debug, Default, Clone)]
pub struct KnowledgeGraph {
    nodes: BTreeMap<String, GraphNode>,
    relationships: Vec<GraphRelationship>,
    edge_keys: HashSet<(String, String, RelationKind)>,
}

impl KnowledgeGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a node, replacing any previous node with the same ID.
    pub fn add_node(&mut self, node: GraphNode) {
        self.nodes.insert(node.id.clone(), node);
    }

    /// Insert a node only if the ID is not yet present.
    pub fn add_node_if_absent(&mut self, node: GraphNode) {
        self.nodes.entry(node.id.clone()).or_insert(node);
    }

    /// Add an edge. Exact duplicates (same endpoints and kind) are dropped;
    /// the first insertion wins so re-resolution cannot clobber properties.
    pub fn add_relationship(&mut self, rel: GraphRelationship) {
        let key = (rel.source.clone(), rel.target.clone(), rel.kind);
        if self.edge_keys.insert(key) {
            self.relationships.push(rel);
        }
    }

    pub fn get_node(&self, id: &str) -> Option<&GraphNode> {
        self.nodes.get(id)
    }

    pub fn get_node_mut(&mut self, id: &str) -> Option<&mut GraphNode> {
        self.nodes.get_mut(id)
    }

    pub fn contains_node(&self, id: &str) -> bool {
        self.nodes.contains_key(id)
    }

    /// Nodes in ID order.
    pub fn iter_nodes(&self) -> impl Iterator<Item = &GraphNode> {
        self.nodes.values()
    }

    pub fn iter_nodes_mut(&mut self) -> impl Iterator<Item = &mut GraphNode> {
        self.nodes.values_mut()
    }

    pub fn iter_relationships(&self) -> impl Iterator<Item = &GraphRelationship> {
        self.relationships.iter()
    }

    /// Nodes with a given label, in ID order.
    pub fn nodes_with_label(&self, label: NodeLabel) -> impl Iterator<Item = &GraphNode> {
        self.nodes.values().filter(move |n| n.label == label)
    }

    /// Edges of a given kind, in insertion order.
    pub fn relationships_of_kind(
        &self,
        kind: RelationKind,
    ) -> impl Iterator<Item = &GraphRelationship> {
        self.relationships.iter().filter(move |r| r.kind == kind)
    }

    /// Find a symbol node in `file_path` whose name matches, preferring
    /// definition-like labels over containers.
    pub fn find_symbol_in_file(&self, file_path: &str, name: &str) -> Option<&GraphNode> {
        const PREFERENCE: [NodeLabel; 9] = [
            NodeLabel::Function,
            NodeLabel::Method,
            NodeLabel::Class,
            NodeLabel::Struct,
            NodeLabel::Enum,
            NodeLabel::Interface,
            NodeLabel::TypeAlias,
            NodeLabel::Macro,
            NodeLabel::Module,
        ];
        for label in PREFERENCE {
            let id = crate::types::node_id(label, file_path, name);
            if let Some(node) = self.nodes.get(&id) {
                return Some(node);
            }
        }
        None
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn relationship_count(&self) -> usize {
        self.relationships.len()
    }

    /// Remove every node whose `file_path` matches, along with all edges
    /// touching a removed node.
    pub fn remove_file_nodes(&mut self, file_path: &str) {
        let removed: HashSet<String> = self
            .nodes
            .values()
            .filter(|n| n.file_path == file_path)
            .map(|n| n.id.clone())
            .collect();
        if removed.is_empty() {
            return;
        }
        self.nodes.retain(|id, _| !removed.contains(id));
        self.relationships
            .retain(|r| !removed.contains(&r.source) && !removed.contains(&r.target));
        self.edge_keys
            .retain(|(s, t, _)| !removed.contains(s) && !removed.contains(t));
    }
}
