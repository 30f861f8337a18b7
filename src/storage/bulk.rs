//! Bulk loading via temporary CSV files.
//!
//! Rows are staged to a headerless CSV in the OS temp dir and loaded with
//! `COPY ... FROM`. The temp file is owned by a `NamedTempFile`, so it is
//! deleted on every exit path (success, error, or partial write). All
//! functions report failure with `Err` so callers can fall back to
//! per-row inserts.

use kuzu::Connection;
use std::collections::BTreeMap;
use std::io::Write;
use tracing::debug;

use crate::error::StorageResult;
use crate::graph::KnowledgeGraph;
use crate::storage::table_for_id;
use crate::types::{GraphNode, GraphRelationship, NodeEmbedding, NodeLabel};

/// Write `rows` to a temporary CSV and `COPY FROM` into `table`.
pub(crate) fn csv_copy(conn: &Connection, table: &str, rows: &[Vec<String>]) -> StorageResult<()> {
    if rows.is_empty() {
        return Ok(());
    }

    let mut file = tempfile::Builder::new()
        .prefix("axon-bulk-")
        .suffix(".csv")
        .tempfile()?;
    for row in rows {
        let line: Vec<String> = row.iter().map(|field| csv_field(field)).collect();
        writeln!(file, "{}", line.join(","))?;
    }
    file.flush()?;

    let path = file.path().to_string_lossy().replace('\\', "/");
    conn.query(&format!("COPY {table} FROM \"{path}\" (HEADER=false)"))?;
    Ok(())
}

/// Load all nodes from `graph`, bucketed per label table.
pub(crate) fn bulk_load_nodes_csv(conn: &Connection, graph: &KnowledgeGraph) -> StorageResult<()> {
    let mut by_table: BTreeMap<&'static str, Vec<Vec<String>>> = BTreeMap::new();
    for node in graph.iter_nodes() {
        by_table
            .entry(node.label.table_name())
            .or_default()
            .push(node_row(node));
    }
    for (table, rows) in by_table {
        csv_copy(conn, table, &rows)?;
    }
    Ok(())
}

/// Load all relationships from `graph`, bucketed per (src, dst) pair of
/// the CodeRelation group.
pub(crate) fn bulk_load_rels_csv(conn: &Connection, graph: &KnowledgeGraph) -> StorageResult<()> {
    let mut by_pair: BTreeMap<(String, String), Vec<Vec<String>>> = BTreeMap::new();
    for rel in graph.iter_relationships() {
        let (Some(src), Some(dst)) = (table_for_id(&rel.source), table_for_id(&rel.target)) else {
            continue;
        };
        by_pair
            .entry((src.to_string(), dst.to_string()))
            .or_default()
            .push(rel_row(rel));
    }
    for ((src, dst), rows) in by_pair {
        csv_copy(conn, &format!("CodeRelation_{src}_{dst}"), &rows)?;
    }
    Ok(())
}

/// Replace all embeddings via CSV copy.
pub(crate) fn bulk_store_embeddings_csv(
    conn: &Connection,
    embeddings: &[NodeEmbedding],
) -> StorageResult<()> {
    if let Err(e) = conn.query("MATCH (e:Embedding) DETACH DELETE e") {
        debug!("Embedding table clear skipped: {e}");
    }
    let rows: Vec<Vec<String>> = embeddings
        .iter()
        .map(|emb| vec![emb.node_id.clone(), vector_literal(&emb.vector)])
        .collect();
    csv_copy(conn, "Embedding", &rows)
}

/// Delete everything, load `graph`, rebuild the FTS indexes.
pub(crate) fn bulk_load(
    conn: &Connection,
    graph: &KnowledgeGraph,
    fallback_nodes: impl Fn(&Connection, &KnowledgeGraph),
    fallback_rels: impl Fn(&Connection, &KnowledgeGraph),
) -> StorageResult<()> {
    for label in NodeLabel::ALL {
        if let Err(e) = conn.query(&format!(
            "MATCH (n:{}) DETACH DELETE n",
            label.table_name()
        )) {
            debug!("Table clear skipped for {}: {e}", label.table_name());
        }
    }

    if let Err(e) = bulk_load_nodes_csv(conn, graph) {
        debug!("CSV node load failed, falling back to per-row inserts: {e}");
        fallback_nodes(conn, graph);
    }
    if let Err(e) = bulk_load_rels_csv(conn, graph) {
        debug!("CSV relationship load failed, falling back to per-row inserts: {e}");
        fallback_rels(conn, graph);
    }

    crate::storage::schema::rebuild_fts_indexes(conn);
    Ok(())
}

/// Flat CSV row for a node, in table property order.
pub(crate) fn node_row(node: &GraphNode) -> Vec<String> {
    vec![
        node.id.clone(),
        node.name.clone(),
        node.file_path.clone(),
        node.start_line.to_string(),
        node.end_line.to_string(),
        node.content.clone(),
        node.signature.clone(),
        node.language.clone(),
        node.class_name.clone(),
        node.is_dead.to_string(),
        node.is_entry_point.to_string(),
        node.is_exported.to_string(),
    ]
}

/// Flat CSV row for a relationship: FROM key, TO key, then properties.
pub(crate) fn rel_row(rel: &GraphRelationship) -> Vec<String> {
    let p = &rel.properties;
    vec![
        rel.source.clone(),
        rel.target.clone(),
        rel.kind.as_str().to_string(),
        p.confidence.to_string(),
        p.role.clone(),
        p.step_number.to_string(),
        p.strength.to_string(),
        p.co_changes.to_string(),
        p.symbols.clone(),
    ]
}

/// Inline Kuzu array literal for a vector.
pub(crate) fn vector_literal(vector: &[f64]) -> String {
    let parts: Vec<String> = vector.iter().map(|v| v.to_string()).collect();
    format!("[{}]", parts.join(","))
}

fn csv_field(value: &str) -> String {
    if value.contains(&['"', ',', '\n', '\r'][..]) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn csv_field_quotes_specials() {
        assert_eq!(csv_field("plain"), "plain");
        assert_eq!(csv_field("a,b"), "\"a,b\"");
        assert_eq!(csv_field("line\nbreak"), "\"line\nbreak\"");
        assert_eq!(csv_field("say \"hi\""), "\"say \"\"hi\"\"\"");
    }

    #[test]
    fn node_row_matches_schema_column_order() {
        let mut node = GraphNode::new(crate::types::NodeLabel::Function, "src/a.py", "f");
        node.start_line = 3;
        node.end_line = 9;
        node.is_exported = true;
        let row = node_row(&node);
        assert_eq!(row[0], "function:src/a.py:f");
        assert_eq!(row[3], "3");
        assert_eq!(row[4], "9");
        assert_eq!(row[11], "true");
        assert_eq!(row.len(), 12);
    }

    #[test]
    fn vector_literal_is_bracketed() {
        assert_eq!(vector_literal(&[0.5, 1.0]), "[0.5,1]");
    }
}
