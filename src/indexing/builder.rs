//! Folds walker entries and parse results into a [`KnowledgeGraph`].
//!
//! Structure first (file/folder nodes with `contains` edges), then symbol
//! nodes per parse result (`defines`, class-`contains`-method), then the
//! edge phases: imports (path-resolved, with synthetic external module
//! nodes for unresolved importees), calls (best-effort name resolution
//! with confidence), heritage, and type references.
//!
//! Unresolved callees get a placeholder node `function::<name>` (the
//! empty path slot marks the target as external) with confidence below
//! 1.0 on the edge.

use regex::Regex;
use std::collections::{BTreeMap, HashMap};
use std::sync::LazyLock;

use crate::graph::KnowledgeGraph;
use crate::parsing::{ImportInfo, ParseResult, SymbolKind};
use crate::types::{node_id, GraphNode, GraphRelationship, NodeLabel, RelationKind};

/// Confidence attached to call edges by resolution tier.
const CONFIDENCE_LOCAL: f64 = 1.0;
const CONFIDENCE_IMPORTED: f64 = 0.9;
const CONFIDENCE_UNRESOLVED: f64 = 0.5;

/// Names that mark a symbol as a process entry point.
const ENTRY_POINT_NAMES: [&str; 2] = ["main", "start_link"];

/// Capitalized identifiers in signatures, candidates for type references.
static TYPE_IDENT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b[A-Z][A-Za-z0-9_]*\b").unwrap());

pub struct GraphBuilder {
    graph: KnowledgeGraph,
    /// Parse results by file path, in path order.
    results: BTreeMap<String, ParseResult>,
    /// Symbol name → node IDs, for cross-file lookup.
    name_index: HashMap<String, Vec<String>>,
}

impl GraphBuilder {
    pub fn new() -> Self {
        Self {
            graph: KnowledgeGraph::new(),
            results: BTreeMap::new(),
            name_index: HashMap::new(),
        }
    }

    /// Create file and folder nodes plus `contains` edges.
    pub fn add_structure(&mut self, entries: &[crate::indexing::FileEntry]) {
        for entry in entries {
            let basename = entry.path.rsplit('/').next().unwrap_or(&entry.path);
            let mut file_node = GraphNode::new(NodeLabel::File, &entry.path, "");
            file_node.name = basename.to_string();
            file_node.start_line = 1;
            file_node.end_line = entry.content.lines().count().max(1) as i64;
            file_node.content = entry.content.clone();
            file_node.language = entry.language.as_str().to_string();
            self.graph.add_node(file_node);

            // Ancestor folders, outermost first.
            let components: Vec<&str> = entry.path.split('/').collect();
            let mut parent_folder: Option<String> = None;
            for depth in 0..components.len().saturating_sub(1) {
                let folder_path = components[..=depth].join("/");
                let folder_id = node_id(NodeLabel::Folder, &folder_path, "");
                if !self.graph.contains_node(&folder_id) {
                    let mut folder = GraphNode::new(NodeLabel::Folder, &folder_path, "");
                    folder.name = components[depth].to_string();
                    self.graph.add_node(folder);
                }
                if let Some(parent) = &parent_folder {
                    self.graph.add_relationship(GraphRelationship::new(
                        parent.clone(),
                        folder_id.clone(),
                        RelationKind::Contains,
                    ));
                }
                parent_folder = Some(folder_id);
            }

            if let Some(folder_id) = parent_folder {
                self.graph.add_relationship(GraphRelationship::new(
                    folder_id,
                    node_id(NodeLabel::File, &entry.path, ""),
                    RelationKind::Contains,
                ));
            }
        }
    }

    /// Create symbol nodes for one file's parse result and remember the
    /// result for the edge phases.
    pub fn add_parse_result(&mut self, entry: &crate::indexing::FileEntry, result: ParseResult) {
        let file_id = node_id(NodeLabel::File, &entry.path, "");

        for symbol in &result.symbols {
            let label = symbol_label(symbol.kind);
            let mut node = GraphNode::new(label, &entry.path, &symbol.name);
            node.start_line = symbol.start_line as i64;
            node.end_line = symbol.end_line as i64;
            node.content = symbol.content.clone();
            node.signature = symbol.signature.clone();
            node.language = entry.language.as_str().to_string();
            node.class_name = symbol.class_name.clone();
            node.is_exported = result.exports.contains(&symbol.name);
            node.is_entry_point = ENTRY_POINT_NAMES.contains(&symbol.name.as_str())
                || symbol.decorators.iter().any(|d| d == &symbol.name);

            let symbol_id = node.id.clone();
            self.name_index
                .entry(symbol.name.clone())
                .or_default()
                .push(symbol_id.clone());
            self.graph.add_node(node);

            self.graph.add_relationship(GraphRelationship::new(
                file_id.clone(),
                symbol_id.clone(),
                RelationKind::Defines,
            ));

            // Methods hang off their owning class-like symbol.
            if !symbol.class_name.is_empty() {
                if let Some(owner) = self
                    .graph
                    .find_symbol_in_file(&entry.path, &symbol.class_name)
                {
                    let owner_id = owner.id.clone();
                    if owner_id != symbol_id {
                        self.graph.add_relationship(GraphRelationship::new(
                            owner_id,
                            symbol_id,
                            RelationKind::Contains,
                        ));
                    }
                }
            }
        }

        self.results.insert(entry.path.clone(), result);
    }

    /// Materialize `imports` edges. Returns how many were created.
    pub fn link_imports(&mut self) -> usize {
        let mut edges: Vec<GraphRelationship> = Vec::new();
        let mut externals: Vec<GraphNode> = Vec::new();

        for (path, result) in &self.results {
            let file_id = node_id(NodeLabel::File, path, "");
            for import in &result.imports {
                if import.module.is_empty() {
                    continue;
                }
                let target_id = match self.resolve_import(path, import) {
                    Some(resolved_path) => node_id(NodeLabel::File, &resolved_path, ""),
                    None => {
                        // External importee gets a synthetic module node.
                        let mut external =
                            GraphNode::new(NodeLabel::Module, "", &import.module);
                        external.name = import.module.clone();
                        let id = external.id.clone();
                        externals.push(external);
                        id
                    }
                };

                let mut rel =
                    GraphRelationship::new(file_id.clone(), target_id, RelationKind::Imports);
                rel.properties.symbols = import.names.join(",");
                rel.properties.role = import.alias.clone();
                edges.push(rel);
            }
        }

        for node in externals {
            self.graph.add_node_if_absent(node);
        }
        let count = edges.len();
        for edge in edges {
            self.graph.add_relationship(edge);
        }
        count
    }

    /// Materialize `calls` edges with per-edge confidence.
    pub fn link_calls(&mut self) -> usize {
        let mut edges: Vec<GraphRelationship> = Vec::new();
        let mut placeholders: Vec<GraphNode> = Vec::new();

        for (path, result) in &self.results {
            let spans = self.symbol_spans(path, result);
            let file_id = node_id(NodeLabel::File, path, "");

            for call in &result.calls {
                if call.name.is_empty() {
                    continue;
                }
                let source_id = enclosing_symbol(&spans, call.line)
                    .unwrap_or_else(|| file_id.clone());

                let (target_id, confidence) = self.resolve_callee(path, &call.name);
                let target_id = match target_id {
                    Some(id) => id,
                    None => {
                        let mut placeholder = GraphNode::new(NodeLabel::Function, "", &call.name);
                        placeholder.name = call.name.clone();
                        let id = placeholder.id.clone();
                        placeholders.push(placeholder);
                        id
                    }
                };

                edges.push(
                    GraphRelationship::new(source_id, target_id, RelationKind::Calls)
                        .with_confidence(confidence),
                );
            }
        }

        for node in placeholders {
            self.graph.add_node_if_absent(node);
        }
        let count = edges.len();
        for edge in edges {
            self.graph.add_relationship(edge);
        }
        count
    }

    /// Materialize `implements`/`uses` edges from heritage tuples.
    pub fn link_heritage(&mut self) -> usize {
        let mut edges: Vec<GraphRelationship> = Vec::new();
        let mut synthetics: Vec<GraphNode> = Vec::new();

        for (path, result) in &self.results {
            for heritage in &result.heritage {
                let Some(subject) = self
                    .graph
                    .find_symbol_in_file(path, &heritage.subject)
                    .map(|n| n.id.clone())
                else {
                    continue;
                };

                let object_id = self
                    .graph
                    .find_symbol_in_file(path, &heritage.object)
                    .map(|n| n.id.clone())
                    .or_else(|| self.lookup_by_name(&heritage.object))
                    .unwrap_or_else(|| {
                        let label = match heritage.relation {
                            RelationKind::Implements => NodeLabel::Interface,
                            _ => NodeLabel::Module,
                        };
                        let mut synthetic = GraphNode::new(label, "", &heritage.object);
                        synthetic.name = heritage.object.clone();
                        let id = synthetic.id.clone();
                        synthetics.push(synthetic);
                        id
                    });

                edges.push(GraphRelationship::new(
                    subject,
                    object_id,
                    heritage.relation,
                ));
            }
        }

        for node in synthetics {
            self.graph.add_node_if_absent(node);
        }
        let count = edges.len();
        for edge in edges {
            self.graph.add_relationship(edge);
        }
        count
    }

    /// Scan signatures and definition headers for references to known
    /// type names and materialize `uses_type` edges.
    pub fn link_type_refs(&mut self) -> usize {
        // Known type-like nodes by bare name.
        let mut type_index: HashMap<String, String> = HashMap::new();
        for node in self.graph.iter_nodes() {
            if matches!(
                node.label,
                NodeLabel::Class
                    | NodeLabel::Struct
                    | NodeLabel::Enum
                    | NodeLabel::Interface
                    | NodeLabel::TypeAlias
            ) {
                type_index
                    .entry(node.name.clone())
                    .or_insert_with(|| node.id.clone());
            }
        }

        let mut edges: Vec<GraphRelationship> = Vec::new();

        for node in self.graph.iter_nodes() {
            if !matches!(node.label, NodeLabel::Function | NodeLabel::Method) {
                continue;
            }
            let header = if node.signature.is_empty() {
                node.content.lines().next().unwrap_or("")
            } else {
                node.signature.as_str()
            };
            for capture in TYPE_IDENT_RE.find_iter(header) {
                if let Some(type_id) = type_index.get(capture.as_str()) {
                    if *type_id != node.id {
                        edges.push(GraphRelationship::new(
                            node.id.clone(),
                            type_id.clone(),
                            RelationKind::UsesType,
                        ));
                    }
                }
            }
        }

        let count = edges.len();
        for edge in edges {
            self.graph.add_relationship(edge);
        }
        count
    }

    pub fn graph(&self) -> &KnowledgeGraph {
        &self.graph
    }

    pub fn graph_mut(&mut self) -> &mut KnowledgeGraph {
        &mut self.graph
    }

    pub fn into_graph(self) -> KnowledgeGraph {
        self.graph
    }

    /// Symbol spans for a file, innermost-resolvable by maximal start.
    fn symbol_spans(&self, path: &str, result: &ParseResult) -> Vec<(u32, u32, String)> {
        let mut spans: Vec<(u32, u32, String)> = result
            .symbols
            .iter()
            .map(|s| {
                (
                    s.start_line,
                    s.end_line,
                    node_id(symbol_label(s.kind), path, &s.name),
                )
            })
            .collect();
        spans.sort_by_key(|(start, _, _)| *start);
        spans
    }

    /// Resolve a call name: local symbols first, then symbols reachable
    /// through this file's imports, unresolved last.
    fn resolve_callee(&self, path: &str, name: &str) -> (Option<String>, f64) {
        let bare = name.trim_end_matches('!');
        if let Some(local) = self
            .graph
            .find_symbol_in_file(path, name)
            .or_else(|| self.graph.find_symbol_in_file(path, bare))
        {
            return (Some(local.id.clone()), CONFIDENCE_LOCAL);
        }

        if let Some(result) = self.results.get(path) {
            for import in &result.imports {
                if !import.names.is_empty() && !import.names.iter().any(|n| n == bare) {
                    continue;
                }
                if let Some(imported_path) = self.resolve_import(path, import) {
                    if let Some(found) = self.graph.find_symbol_in_file(&imported_path, bare) {
                        return (Some(found.id.clone()), CONFIDENCE_IMPORTED);
                    }
                }
            }
        }

        (None, CONFIDENCE_UNRESOLVED)
    }

    fn lookup_by_name(&self, name: &str) -> Option<String> {
        self.name_index.get(name)?.first().cloned()
    }

    /// Path-based import resolution: join the module path against the
    /// importer's directory and the repo root, trying the language's file
    /// extensions plus `__init__.py`/`mod.rs`/`index.*` package entries.
    fn resolve_import(&self, importer: &str, import: &ImportInfo) -> Option<String> {
        let module = import.module.as_str();
        let importer_dir = match importer.rsplit_once('/') {
            Some((dir, _)) => dir,
            None => "",
        };

        // Leading dots mark Python-style relative imports: one dot is the
        // importer's directory, each extra dot climbs one level.
        let (relative_levels, trimmed) = {
            let dots = module.len() - module.trim_start_matches('.').len();
            (dots, module.trim_start_matches('.'))
        };
        let normalized = trimmed.replace("::", "/").replace('.', "/");
        let normalized = normalized.trim_start_matches("./").trim_matches('/');

        let mut bases: Vec<String> = Vec::new();
        if relative_levels > 0 {
            let mut dir_parts: Vec<&str> = if importer_dir.is_empty() {
                Vec::new()
            } else {
                importer_dir.split('/').collect()
            };
            for _ in 1..relative_levels {
                dir_parts.pop();
            }
            let base_dir = dir_parts.join("/");
            bases.push(join_path(&base_dir, normalized));
        } else {
            bases.push(join_path(importer_dir, normalized));
            bases.push(normalized.to_string());
            // Rust crate-rooted paths live under src/.
            if let Some(rest) = normalized.strip_prefix("crate/") {
                bases.push(join_path("src", rest));
            }
            if let Some(rest) = normalized.strip_prefix("super/") {
                let parent = importer_dir.rsplit_once('/').map(|(d, _)| d).unwrap_or("");
                bases.push(join_path(parent, rest));
            }
        }

        for base in &bases {
            if let Some(found) = self.probe_candidates(base) {
                return Some(found);
            }
        }
        // The last path segment is often an item, not a module; retry
        // with it dropped (use crate::auth::validate → auth.rs).
        for base in &bases {
            if let Some((parent, _)) = base.rsplit_once('/') {
                if let Some(found) = self.probe_candidates(parent) {
                    return Some(found);
                }
            }
        }
        None
    }

    fn probe_candidates(&self, base: &str) -> Option<String> {
        if base.is_empty() {
            return None;
        }
        const EXTENSIONS: [&str; 8] = ["py", "rs", "ts", "tsx", "js", "jsx", "go", "ex"];
        const PACKAGE_ENTRIES: [&str; 4] = ["__init__.py", "mod.rs", "index.ts", "index.js"];

        let direct = self.results.contains_key(base).then(|| base.to_string());
        if direct.is_some() {
            return direct;
        }
        for ext in EXTENSIONS {
            let candidate = format!("{base}.{ext}");
            if self.results.contains_key(&candidate)
                || self.graph.contains_node(&node_id(NodeLabel::File, &candidate, ""))
            {
                return Some(candidate);
            }
        }
        for entry in PACKAGE_ENTRIES {
            let candidate = format!("{base}/{entry}");
            if self.results.contains_key(&candidate)
                || self.graph.contains_node(&node_id(NodeLabel::File, &candidate, ""))
            {
                return Some(candidate);
            }
        }
        None
    }
}

impl Default for GraphBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Map a parsed symbol kind onto its storage label. Document sections
/// have no table of their own and are stored as module nodes.
pub fn symbol_label(kind: SymbolKind) -> NodeLabel {
    match kind {
        SymbolKind::Class => NodeLabel::Class,
        SymbolKind::Function => NodeLabel::Function,
        SymbolKind::Method => NodeLabel::Method,
        SymbolKind::Macro => NodeLabel::Macro,
        SymbolKind::Struct => NodeLabel::Struct,
        SymbolKind::Enum => NodeLabel::Enum,
        SymbolKind::Interface => NodeLabel::Interface,
        SymbolKind::TypeAlias => NodeLabel::TypeAlias,
        SymbolKind::Module => NodeLabel::Module,
        SymbolKind::Section => NodeLabel::Module,
    }
}

/// ID of the innermost symbol whose span contains `line`.
fn enclosing_symbol(spans: &[(u32, u32, String)], line: u32) -> Option<String> {
    spans
        .iter()
        .filter(|(start, end, _)| *start <= line && line <= *end)
        .max_by_key(|(start, _, _)| *start)
        .map(|(_, _, id)| id.clone())
}
