//! Core graph data model.
//!
//! Node IDs are opaque strings composed `"<label>:<file_path>:<name>"`
//! (e.g. `function:src/auth.py:validate`, `file:src/main.py:`). The label
//! prefix is the canonical way to recover a node's table from its ID, so
//! every constructor goes through [`node_id`] and the prefix invariant
//! `label_prefix(id) == node.label` holds by construction.

use serde::{Deserialize, Serialize};

/// Label of a graph node; one storage table per variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeLabel {
    File,
    Folder,
    Module,
    Class,
    Function,
    Method,
    Macro,
    Struct,
    Enum,
    Interface,
    TypeAlias,
    Community,
    Process,
}

impl NodeLabel {
    /// All labels, in schema/table creation order.
    pub const ALL: [NodeLabel; 13] = [
        NodeLabel::File,
        NodeLabel::Folder,
        NodeLabel::Module,
        NodeLabel::Class,
        NodeLabel::Function,
        NodeLabel::Method,
        NodeLabel::Macro,
        NodeLabel::Struct,
        NodeLabel::Enum,
        NodeLabel::Interface,
        NodeLabel::TypeAlias,
        NodeLabel::Community,
        NodeLabel::Process,
    ];

    /// Lowercase value used as the ID prefix (`function`, `type_alias`, ...).
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeLabel::File => "file",
            NodeLabel::Folder => "folder",
            NodeLabel::Module => "module",
            NodeLabel::Class => "class",
            NodeLabel::Function => "function",
            NodeLabel::Method => "method",
            NodeLabel::Macro => "macro",
            NodeLabel::Struct => "struct",
            NodeLabel::Enum => "enum",
            NodeLabel::Interface => "interface",
            NodeLabel::TypeAlias => "type_alias",
            NodeLabel::Community => "community",
            NodeLabel::Process => "process",
        }
    }

    /// Storage table name (`File`, `TypeAlias`, ...).
    pub fn table_name(&self) -> &'static str {
        match self {
            NodeLabel::File => "File",
            NodeLabel::Folder => "Folder",
            NodeLabel::Module => "Module",
            NodeLabel::Class => "Class",
            NodeLabel::Function => "Function",
            NodeLabel::Method => "Method",
            NodeLabel::Macro => "Macro",
            NodeLabel::Struct => "Struct",
            NodeLabel::Enum => "Enum",
            NodeLabel::Interface => "Interface",
            NodeLabel::TypeAlias => "TypeAlias",
            NodeLabel::Community => "Community",
            NodeLabel::Process => "Process",
        }
    }

    /// Parse a lowercase label value back into a variant.
    pub fn from_str_value(value: &str) -> Option<NodeLabel> {
        NodeLabel::ALL.iter().copied().find(|l| l.as_str() == value)
    }
}

/// Type of a graph relationship.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationKind {
    Contains,
    Defines,
    Imports,
    Calls,
    UsesType,
    Implements,
    Uses,
    StepInProcess,
    MemberOf,
}

impl RelationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RelationKind::Contains => "contains",
            RelationKind::Defines => "defines",
            RelationKind::Imports => "imports",
            RelationKind::Calls => "calls",
            RelationKind::UsesType => "uses_type",
            RelationKind::Implements => "implements",
            RelationKind::Uses => "uses",
            RelationKind::StepInProcess => "step_in_process",
            RelationKind::MemberOf => "member_of",
        }
    }
}

/// Compose a node ID from its parts. The empty `name` tail is canonical for
/// file and folder IDs.
pub fn node_id(label: NodeLabel, file_path: &str, name: &str) -> String {
    format!("{}:{}:{}", label.as_str(), file_path, name)
}

/// Recover the label from a node ID's prefix.
pub fn label_of_id(id: &str) -> Option<NodeLabel> {
    let prefix = id.split(':').next()?;
    NodeLabel::from_str_value(prefix)
}

/// A node in the knowledge graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphNode {
    pub id: String,
    pub label: NodeLabel,
    pub name: String,
    pub file_path: String,
    pub start_line: i64,
    pub end_line: i64,
    pub content: String,
    pub signature: String,
    pub language: String,
    /// Owning class/module for methods; empty for free functions.
    pub class_name: String,
    pub is_dead: bool,
    pub is_entry_point: bool,
    pub is_exported: bool,
}

impl GraphNode {
    /// Create a node with the ID derived from `(label, file_path, name)`.
    pub fn new(label: NodeLabel, file_path: &str, name: &str) -> Self {
        Self {
            id: node_id(label, file_path, name),
            label,
            name: name.to_string(),
            file_path: file_path.to_string(),
            start_line: 0,
            end_line: 0,
            content: String::new(),
            signature: String::new(),
            language: String::new(),
            class_name: String::new(),
            is_dead: false,
            is_entry_point: false,
            is_exported: false,
        }
    }
}

/// Edge properties. Defaults describe a fully-confident, unannotated edge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelProperties {
    pub confidence: f64,
    pub role: String,
    pub step_number: i64,
    pub strength: f64,
    pub co_changes: i64,
    /// Comma-joined imported symbol names on `imports` edges.
    pub symbols: String,
}

impl Default for RelProperties {
    fn default() -> Self {
        Self {
            confidence: 1.0,
            role: String::new(),
            step_number: 0,
            strength: 0.0,
            co_changes: 0,
            symbols: String::new(),
        }
    }
}

/// A typed edge between two nodes, referenced by ID.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphRelationship {
    pub source: String,
    pub target: String,
    pub kind: RelationKind,
    pub properties: RelProperties,
}

impl GraphRelationship {
    pub fn new(source: impl Into<String>, target: impl Into<String>, kind: RelationKind) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            kind,
            properties: RelProperties::default(),
        }
    }

    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.properties.confidence = confidence;
        self
    }
}

/// An embedding vector keyed by node ID.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeEmbedding {
    pub node_id: String,
    pub vector: Vec<f64>,
}

/// One hit from any of the search operations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub node_id: String,
    pub score: f64,
    pub node_name: String,
    pub file_path: String,
    /// Label prefix of the node ID (`function`, `class`, ...).
    pub label: String,
    pub snippet: String,
    pub language: String,
}
