//! Schema creation and FTS index setup.
//!
//! All DDL is idempotent (`IF NOT EXISTS`); the FTS extension install is
//! tolerated to fail (already loaded, or offline) and search then
//! degrades to the non-FTS paths.

use kuzu::Connection;
use tracing::debug;

use crate::error::StorageResult;
use crate::types::NodeLabel;

/// Property block shared by every node table. Column order matters: CSV
/// bulk loads and row decoding both follow it.
pub(crate) const NODE_PROPERTIES: &str = "id STRING, name STRING, file_path STRING, \
     start_line INT64, end_line INT64, content STRING, signature STRING, \
     language STRING, class_name STRING, is_dead BOOLEAN, \
     is_entry_point BOOLEAN, is_exported BOOLEAN, PRIMARY KEY (id)";

pub(crate) const REL_PROPERTIES: &str = "rel_type STRING, confidence DOUBLE, role STRING, \
     step_number INT64, strength DOUBLE, co_changes INT64, symbols STRING";

pub(crate) const EMBEDDING_PROPERTIES: &str =
    "node_id STRING, vec DOUBLE[], PRIMARY KEY (node_id)";

/// Fields covered by every FTS index.
pub(crate) const FTS_FIELDS: &str = "['name', 'content', 'signature']";

/// Create node/rel/embedding tables and FTS indexes.
pub(crate) fn create_schema(conn: &Connection) -> StorageResult<()> {
    if let Err(e) = conn.query("INSTALL fts") {
        debug!("FTS extension install skipped: {e}");
    }
    if let Err(e) = conn.query("LOAD EXTENSION fts") {
        debug!("FTS extension load skipped: {e}");
    }

    for label in NodeLabel::ALL {
        conn.query(&format!(
            "CREATE NODE TABLE IF NOT EXISTS {}({})",
            label.table_name(),
            NODE_PROPERTIES
        ))?;
    }

    conn.query(&format!(
        "CREATE NODE TABLE IF NOT EXISTS Embedding({EMBEDDING_PROPERTIES})"
    ))?;

    // One rel table group covering every label pair.
    let pairs: Vec<String> = NodeLabel::ALL
        .iter()
        .flat_map(|src| {
            NodeLabel::ALL
                .iter()
                .map(|dst| format!("FROM {} TO {}", src.table_name(), dst.table_name()))
        })
        .collect();
    let rel_stmt = format!(
        "CREATE REL TABLE GROUP IF NOT EXISTS CodeRelation({}, {})",
        pairs.join(", "),
        REL_PROPERTIES
    );
    if let Err(e) = conn.query(&rel_stmt) {
        debug!("REL TABLE GROUP creation skipped: {e}");
    }

    create_fts_indexes(conn);
    Ok(())
}

/// Create FTS indexes for every node table (idempotent: an existing
/// index is left alone).
pub(crate) fn create_fts_indexes(conn: &Connection) {
    for label in NodeLabel::ALL {
        let table = label.table_name();
        let idx_name = format!("{}_fts", table.to_lowercase());
        if let Err(e) = conn.query(&format!(
            "CALL CREATE_FTS_INDEX('{table}', '{idx_name}', {FTS_FIELDS})"
        )) {
            debug!("FTS index creation skipped for {table}: {e}");
        }
    }
}

/// Drop and recreate every FTS index. A drop failure on a missing index
/// is benign.
pub(crate) fn rebuild_fts_indexes(conn: &Connection) {
    for label in NodeLabel::ALL {
        let table = label.table_name();
        let idx_name = format!("{}_fts", table.to_lowercase());
        if let Err(e) = conn.query(&format!("CALL DROP_FTS_INDEX('{table}', '{idx_name}')")) {
            debug!("FTS index drop skipped for {table}: {e}");
        }
    }
    create_fts_indexes(conn);
}
