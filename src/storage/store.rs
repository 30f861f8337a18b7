//! The graph store adapter.
//!
//! Wraps an embedded Kuzu database. A connection is created per
//! operation (they are cheap client handles); bulk writes are
//! single-writer and must not be interleaved from multiple callers.

use kuzu::{Connection, Database, SystemConfig, Value};
use std::collections::{HashMap, HashSet, VecDeque};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::error::{StorageError, StorageResult};
use crate::graph::KnowledgeGraph;
use crate::indexing::walker::sha256_hex;
use crate::storage::{bulk, escape, schema, search, table_for_id};
use crate::types::{
    label_of_id, GraphNode, GraphRelationship, NodeEmbedding, NodeLabel, SearchResult,
};

/// Hard cap on BFS traversal depth, regardless of the requested depth.
const MAX_BFS_DEPTH: usize = 10;

pub struct GraphStore {
    db: Option<Database>,
    path: PathBuf,
}

// Kuzu handles cross-thread access internally; connections are created
// per operation and never shared.
unsafe impl Send for GraphStore {}
unsafe impl Sync for GraphStore {}

impl GraphStore {
    /// Open or create the database at `path` and set up the schema.
    pub fn open(path: &Path, read_only: bool) -> StorageResult<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let config = SystemConfig::default().read_only(read_only);
        let db = Database::new(path, config).map_err(|e| StorageError::OpenFailed {
            path: path.to_path_buf(),
            cause: e.to_string(),
        })?;

        let store = Self {
            db: Some(db),
            path: path.to_path_buf(),
        };
        if !read_only {
            let conn = store.connection()?;
            schema::create_schema(&conn).map_err(|e| StorageError::SchemaFailed {
                cause: e.to_string(),
            })?;
        }
        Ok(store)
    }

    /// Release the database handle. Subsequent operations fail with
    /// `NotInitialized`.
    pub fn close(&mut self) {
        self.db = None;
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn connection(&self) -> StorageResult<Connection<'_>> {
        let db = self.db.as_ref().ok_or(StorageError::NotInitialized)?;
        Ok(Connection::new(db)?)
    }

    /// Insert nodes, bucketed per label table. CSV copy first, per-row
    /// Cypher on failure.
    pub fn add_nodes(&self, nodes: &[GraphNode]) -> StorageResult<()> {
        if nodes.is_empty() {
            return Ok(());
        }
        let conn = self.connection()?;

        let mut by_table: HashMap<&'static str, Vec<&GraphNode>> = HashMap::new();
        for node in nodes {
            by_table.entry(node.label.table_name()).or_default().push(node);
        }

        for (table, table_nodes) in by_table {
            let rows: Vec<Vec<String>> = table_nodes.iter().map(|n| bulk::node_row(n)).collect();
            if let Err(e) = bulk::csv_copy(&conn, table, &rows) {
                debug!("Batch node insert via CSV failed for {table}, falling back: {e}");
                for node in table_nodes {
                    insert_node(&conn, node);
                }
            }
        }
        Ok(())
    }

    /// Insert relationships by matching source and target nodes.
    pub fn add_relationships(&self, rels: &[GraphRelationship]) -> StorageResult<()> {
        if rels.is_empty() {
            return Ok(());
        }
        let conn = self.connection()?;

        let mut by_pair: HashMap<(&'static str, &'static str), Vec<&GraphRelationship>> =
            HashMap::new();
        for rel in rels {
            let (Some(src), Some(dst)) = (table_for_id(&rel.source), table_for_id(&rel.target))
            else {
                warn!("Cannot resolve tables for rel {} -> {}", rel.source, rel.target);
                continue;
            };
            by_pair.entry((src, dst)).or_default().push(rel);
        }

        for ((src, dst), pair_rels) in by_pair {
            let rows: Vec<Vec<String>> = pair_rels.iter().map(|r| bulk::rel_row(r)).collect();
            let table = format!("CodeRelation_{src}_{dst}");
            if let Err(e) = bulk::csv_copy(&conn, &table, &rows) {
                debug!("Batch rel insert via CSV failed for {table}, falling back: {e}");
                for rel in pair_rels {
                    insert_relationship(&conn, rel);
                }
            }
        }
        Ok(())
    }

    /// Delete every node whose `file_path` matches, across all tables.
    pub fn remove_nodes_by_file(&self, file_path: &str) {
        let Ok(conn) = self.connection() else {
            return;
        };
        let escaped = escape(file_path);
        for label in NodeLabel::ALL {
            let query = format!(
                "MATCH (n:{}) WHERE n.file_path = '{escaped}' DETACH DELETE n",
                label.table_name()
            );
            if let Err(e) = conn.query(&query) {
                debug!("remove_nodes_by_file failed on {}: {e}", label.table_name());
            }
        }
    }

    /// Fetch a single node by ID.
    pub fn get_node(&self, node_id: &str) -> Option<GraphNode> {
        let table = table_for_id(node_id)?;
        let query = format!(
            "MATCH (n:{table}) WHERE n.id = '{}' RETURN {}",
            escape(node_id),
            node_columns("n")
        );
        self.query_nodes(&query).into_iter().next()
    }

    /// Nodes with a `calls` edge into `node_id`.
    pub fn get_callers(&self, node_id: &str) -> Vec<GraphNode> {
        self.related_nodes(node_id, "calls", Direction::Incoming)
    }

    /// Nodes reached by `calls` edges out of `node_id`.
    pub fn get_callees(&self, node_id: &str) -> Vec<GraphNode> {
        self.related_nodes(node_id, "calls", Direction::Outgoing)
    }

    /// Nodes referenced via `uses_type` from `node_id`.
    pub fn get_type_refs(&self, node_id: &str) -> Vec<GraphNode> {
        self.related_nodes(node_id, "uses_type", Direction::Outgoing)
    }

    pub fn get_callers_with_confidence(&self, node_id: &str) -> Vec<(GraphNode, f64)> {
        self.related_with_confidence(node_id, "calls", Direction::Incoming)
    }

    pub fn get_callees_with_confidence(&self, node_id: &str) -> Vec<(GraphNode, f64)> {
        self.related_with_confidence(node_id, "calls", Direction::Outgoing)
    }

    /// BFS over `calls` edges; flat result without depth info.
    pub fn traverse(&self, start_id: &str, depth: usize, callers: bool) -> Vec<GraphNode> {
        self.traverse_with_depth(start_id, depth, callers)
            .into_iter()
            .map(|(node, _)| node)
            .collect()
    }

    /// BFS over `calls` edges returning `(node, hop)` pairs. Cycle-safe,
    /// capped at [`MAX_BFS_DEPTH`] hops regardless of `depth`.
    pub fn traverse_with_depth(
        &self,
        start_id: &str,
        depth: usize,
        callers: bool,
    ) -> Vec<(GraphNode, usize)> {
        let depth = depth.min(MAX_BFS_DEPTH);
        if table_for_id(start_id).is_none() {
            return Vec::new();
        }

        let mut visited: HashSet<String> = HashSet::new();
        let mut results: Vec<(GraphNode, usize)> = Vec::new();
        let mut queue: VecDeque<(String, usize)> = VecDeque::new();
        queue.push_back((start_id.to_string(), 0));

        while let Some((current_id, current_depth)) = queue.pop_front() {
            if !visited.insert(current_id.clone()) {
                continue;
            }
            if current_id != start_id {
                if let Some(node) = self.get_node(&current_id) {
                    results.push((node, current_depth));
                }
            }
            if current_depth < depth {
                let neighbors = if callers {
                    self.get_callers(&current_id)
                } else {
                    self.get_callees(&current_id)
                };
                for neighbor in neighbors {
                    if !visited.contains(&neighbor.id) {
                        queue.push_back((neighbor.id, current_depth + 1));
                    }
                }
            }
        }
        results
    }

    /// `{node_id: process_name}` for nodes that are a step in any process.
    pub fn get_process_memberships(&self, node_ids: &[String]) -> HashMap<String, String> {
        let mut mapping = HashMap::new();
        if node_ids.is_empty() {
            return mapping;
        }
        let Ok(conn) = self.connection() else {
            return mapping;
        };
        let id_list: Vec<String> = node_ids.iter().map(|id| format!("'{}'", escape(id))).collect();
        let query = format!(
            "MATCH (n)-[r:CodeRelation]->(p:Process) \
             WHERE n.id IN [{}] AND r.rel_type = 'step_in_process' \
             RETURN n.id, p.name",
            id_list.join(", ")
        );
        match conn.query(&query) {
            Ok(result) => {
                for row in result {
                    let node_id = value_str(&row[0]);
                    let process = value_str(&row[1]);
                    if !node_id.is_empty() && !process.is_empty() {
                        mapping.entry(node_id).or_insert(process);
                    }
                }
            }
            Err(e) => debug!("get_process_memberships failed: {e}"),
        }
        mapping
    }

    /// Pass-through for advanced consumers.
    pub fn execute_raw(&self, query: &str) -> StorageResult<Vec<Vec<serde_json::Value>>> {
        let conn = self.connection()?;
        let result = conn.query(query)?;
        let mut rows = Vec::new();
        for row in result {
            rows.push(row.iter().map(value_to_json).collect());
        }
        Ok(rows)
    }

    pub fn exact_name_search(&self, name: &str, limit: usize) -> Vec<SearchResult> {
        match self.connection() {
            Ok(conn) => search::exact_name_search(&conn, name, limit),
            Err(e) => {
                debug!("exact_name_search unavailable: {e}");
                Vec::new()
            }
        }
    }

    pub fn fts_search(&self, query: &str, limit: usize) -> Vec<SearchResult> {
        match self.connection() {
            Ok(conn) => search::fts_search(&conn, query, limit),
            Err(e) => {
                debug!("fts_search unavailable: {e}");
                Vec::new()
            }
        }
    }

    pub fn fuzzy_search(&self, query: &str, limit: usize, max_distance: i64) -> Vec<SearchResult> {
        match self.connection() {
            Ok(conn) => search::fuzzy_search(&conn, query, limit, max_distance),
            Err(e) => {
                debug!("fuzzy_search unavailable: {e}");
                Vec::new()
            }
        }
    }

    pub fn vector_search(&self, vector: &[f64], limit: usize) -> Vec<SearchResult> {
        match self.connection() {
            Ok(conn) => search::vector_search(&conn, vector, limit),
            Err(e) => {
                debug!("vector_search unavailable: {e}");
                Vec::new()
            }
        }
    }

    /// Persist embeddings: bulk CSV replace, per-row MERGE on fallback.
    pub fn store_embeddings(&self, embeddings: &[NodeEmbedding]) -> StorageResult<()> {
        if embeddings.is_empty() {
            return Ok(());
        }
        let conn = self.connection()?;
        if let Err(e) = bulk::bulk_store_embeddings_csv(&conn, embeddings) {
            debug!("Bulk embedding store failed, falling back: {e}");
            for embedding in embeddings {
                let query = format!(
                    "MERGE (e:Embedding {{node_id: '{}'}}) SET e.vec = {}",
                    escape(&embedding.node_id),
                    bulk::vector_literal(&embedding.vector)
                );
                if let Err(e) = conn.query(&query) {
                    debug!("store_embeddings failed for {}: {e}", embedding.node_id);
                }
            }
        }
        Ok(())
    }

    /// `{file_path: sha256(content)}` for all file nodes.
    pub fn get_indexed_files(&self) -> HashMap<String, String> {
        let mut mapping = HashMap::new();
        let Ok(conn) = self.connection() else {
            return mapping;
        };
        match conn.query("MATCH (n:File) RETURN n.file_path, n.content") {
            Ok(result) => {
                for row in result {
                    let file_path = value_str(&row[0]);
                    let content = value_str(&row[1]);
                    if !file_path.is_empty() {
                        mapping.insert(file_path, sha256_hex(&content));
                    }
                }
            }
            Err(e) => debug!("get_indexed_files failed: {e}"),
        }
        mapping
    }

    /// True when no files have been indexed yet.
    pub fn is_empty(&self) -> bool {
        self.get_indexed_files().is_empty()
    }

    /// Replace the entire store with the contents of `graph`.
    pub fn bulk_load(&self, graph: &KnowledgeGraph) -> StorageResult<()> {
        let conn = self.connection()?;
        bulk::bulk_load(
            &conn,
            graph,
            |conn, graph| {
                for node in graph.iter_nodes() {
                    insert_node(conn, node);
                }
            },
            |conn, graph| {
                for rel in graph.iter_relationships() {
                    insert_relationship(conn, rel);
                }
            },
        )
        .map_err(|e| StorageError::BulkLoadFailed {
            operation: "bulk_load".into(),
            cause: e.to_string(),
        })
    }

    /// Drop and recreate all FTS indexes.
    pub fn rebuild_fts_indexes(&self) {
        match self.connection() {
            Ok(conn) => schema::rebuild_fts_indexes(&conn),
            Err(e) => debug!("rebuild_fts_indexes unavailable: {e}"),
        }
    }

    fn related_nodes(&self, node_id: &str, rel_type: &str, direction: Direction) -> Vec<GraphNode> {
        let Some(query) = rel_query(node_id, rel_type, direction, false) else {
            return Vec::new();
        };
        self.query_nodes(&query)
    }

    fn related_with_confidence(
        &self,
        node_id: &str,
        rel_type: &str,
        direction: Direction,
    ) -> Vec<(GraphNode, f64)> {
        let Some(query) = rel_query(node_id, rel_type, direction, true) else {
            return Vec::new();
        };
        let Ok(conn) = self.connection() else {
            return Vec::new();
        };
        let mut pairs = Vec::new();
        match conn.query(&query) {
            Ok(result) => {
                for row in result {
                    let confidence = value_f64(&row[row.len() - 1]);
                    if let Some(node) = row_to_node(&row[..row.len() - 1]) {
                        pairs.push((node, confidence));
                    }
                }
            }
            Err(e) => debug!("related_with_confidence failed: {e}"),
        }
        pairs
    }

    fn query_nodes(&self, query: &str) -> Vec<GraphNode> {
        let Ok(conn) = self.connection() else {
            return Vec::new();
        };
        let mut nodes = Vec::new();
        match conn.query(query) {
            Ok(result) => {
                for row in result {
                    if let Some(node) = row_to_node(&row) {
                        nodes.push(node);
                    }
                }
            }
            Err(e) => debug!("query_nodes failed: {e}"),
        }
        nodes
    }
}

#[derive(Clone, Copy, PartialEq)]
enum Direction {
    Incoming,
    Outgoing,
}

/// Build a relation query anchored on `node_id`'s table.
fn rel_query(
    node_id: &str,
    rel_type: &str,
    direction: Direction,
    with_confidence: bool,
) -> Option<String> {
    let table = table_for_id(node_id)?;
    let escaped = escape(node_id);
    let confidence_column = if with_confidence { ", r.confidence" } else { "" };
    let query = match direction {
        Direction::Incoming => format!(
            "MATCH (caller)-[r:CodeRelation]->(callee:{table}) \
             WHERE callee.id = '{escaped}' AND r.rel_type = '{rel_type}' \
             RETURN {}{confidence_column}",
            node_columns("caller")
        ),
        Direction::Outgoing => format!(
            "MATCH (caller:{table})-[r:CodeRelation]->(callee) \
             WHERE caller.id = '{escaped}' AND r.rel_type = '{rel_type}' \
             RETURN {}{confidence_column}",
            node_columns("callee")
        ),
    };
    Some(query)
}

/// Column list matching the node table property order.
pub(crate) fn node_columns(alias: &str) -> String {
    [
        "id",
        "name",
        "file_path",
        "start_line",
        "end_line",
        "content",
        "signature",
        "language",
        "class_name",
        "is_dead",
        "is_entry_point",
        "is_exported",
    ]
    .iter()
    .map(|column| format!("{alias}.{column}"))
    .collect::<Vec<String>>()
    .join(", ")
}

/// Decode a row in `node_columns` order into a GraphNode.
pub(crate) fn row_to_node(row: &[Value]) -> Option<GraphNode> {
    if row.len() < 12 {
        return None;
    }
    let id = value_str(&row[0]);
    let label = label_of_id(&id).unwrap_or(NodeLabel::File);
    Some(GraphNode {
        id,
        label,
        name: value_str(&row[1]),
        file_path: value_str(&row[2]),
        start_line: value_i64(&row[3]),
        end_line: value_i64(&row[4]),
        content: value_str(&row[5]),
        signature: value_str(&row[6]),
        language: value_str(&row[7]),
        class_name: value_str(&row[8]),
        is_dead: value_bool(&row[9]),
        is_entry_point: value_bool(&row[10]),
        is_exported: value_bool(&row[11]),
    })
}

fn insert_node(conn: &Connection, node: &GraphNode) {
    let query = format!(
        "CREATE (:{} {{id: '{}', name: '{}', file_path: '{}', start_line: {}, \
         end_line: {}, content: '{}', signature: '{}', language: '{}', \
         class_name: '{}', is_dead: {}, is_entry_point: {}, is_exported: {}}})",
        node.label.table_name(),
        escape(&node.id),
        escape(&node.name),
        escape(&node.file_path),
        node.start_line,
        node.end_line,
        escape(&node.content),
        escape(&node.signature),
        escape(&node.language),
        escape(&node.class_name),
        node.is_dead,
        node.is_entry_point,
        node.is_exported,
    );
    if let Err(e) = conn.query(&query) {
        debug!("Insert node failed for {}: {e}", node.id);
    }
}

fn insert_relationship(conn: &Connection, rel: &GraphRelationship) {
    let (Some(src), Some(dst)) = (table_for_id(&rel.source), table_for_id(&rel.target)) else {
        warn!("Cannot resolve tables for rel {} -> {}", rel.source, rel.target);
        return;
    };
    let p = &rel.properties;
    let query = format!(
        "MATCH (a:{src}), (b:{dst}) WHERE a.id = '{}' AND b.id = '{}' \
         CREATE (a)-[:CodeRelation {{rel_type: '{}', confidence: {}, role: '{}', \
         step_number: {}, strength: {}, co_changes: {}, symbols: '{}'}}]->(b)",
        escape(&rel.source),
        escape(&rel.target),
        rel.kind.as_str(),
        p.confidence,
        escape(&p.role),
        p.step_number,
        p.strength,
        p.co_changes,
        escape(&p.symbols),
    );
    if let Err(e) = conn.query(&query) {
        debug!("Insert rel failed: {} -> {}: {e}", rel.source, rel.target);
    }
}

pub(crate) fn value_str(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null(_) => String::new(),
        other => other.to_string(),
    }
}

pub(crate) fn value_i64(value: &Value) -> i64 {
    match value {
        Value::Int64(n) => *n,
        Value::Int32(n) => *n as i64,
        Value::UInt64(n) => *n as i64,
        _ => 0,
    }
}

pub(crate) fn value_f64(value: &Value) -> f64 {
    match value {
        Value::Double(f) => *f,
        Value::Float(f) => *f as f64,
        Value::Int64(n) => *n as f64,
        _ => 0.0,
    }
}

pub(crate) fn value_bool(value: &Value) -> bool {
    matches!(value, Value::Bool(true))
}

fn value_to_json(value: &Value) -> serde_json::Value {
    match value {
        Value::Null(_) => serde_json::Value::Null,
        Value::Bool(b) => serde_json::Value::Bool(*b),
        Value::Int64(n) => serde_json::json!(*n),
        Value::Int32(n) => serde_json::json!(*n),
        Value::UInt64(n) => serde_json::json!(*n),
        Value::Double(f) => serde_json::Number::from_f64(*f)
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null),
        Value::Float(f) => serde_json::Number::from_f64(*f as f64)
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null),
        Value::String(s) => serde_json::Value::String(s.clone()),
        Value::List(_, items) | Value::Array(_, items) => {
            serde_json::Value::Array(items.iter().map(value_to_json).collect())
        }
        other => serde_json::Value::String(other.to_string()),
    }
}
