//! Graph persistence on Kuzu, an embedded Cypher graph database.
//!
//! One node table per [`crate::types::NodeLabel`], a single relationship
//! table group covering every label pair, an `Embedding` table keyed by
//! node ID, and BM25 full-text indexes over `(name, content, signature)`.
//!
//! Write paths prefer temporary-CSV `COPY FROM` and fall back to per-row
//! Cypher on failure. Read paths are best-effort: errors are logged at
//! debug level and resolve to empty results; only `open` and `bulk_load`
//! propagate.

mod bulk;
mod schema;
mod search;
mod store;

pub use store::GraphStore;

use crate::types::NodeLabel;

/// Tables included in search operations.
pub(crate) fn searchable_labels() -> impl Iterator<Item = NodeLabel> {
    NodeLabel::ALL.into_iter().filter(|label| {
        !matches!(
            label,
            NodeLabel::Folder | NodeLabel::Community | NodeLabel::Process
        )
    })
}

/// Escape a string for inclusion in a single-quoted Cypher literal.
/// Every user-controlled string that is inlined into a query goes
/// through here.
pub(crate) fn escape(value: &str) -> String {
    value.replace('\\', "\\\\").replace('\'', "\\'")
}

/// Node table name for a node ID, derived from its label prefix.
pub(crate) fn table_for_id(node_id: &str) -> Option<&'static str> {
    crate::types::label_of_id(node_id).map(|label| label.table_name())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escape_doubles_backslashes_and_quotes() {
        assert_eq!(escape(r"a\b"), r"a\\b");
        assert_eq!(escape("it's"), r"it\'s");
        assert_eq!(escape(r"mix'\"), "mix\\'\\\\");
    }

    #[test]
    fn searchable_labels_exclude_structural_tables() {
        let tables: Vec<&str> = searchable_labels().map(|l| l.table_name()).collect();
        assert!(!tables.contains(&"Folder"));
        assert!(!tables.contains(&"Community"));
        assert!(!tables.contains(&"Process"));
        assert!(tables.contains(&"Function"));
        assert_eq!(tables.len(), 10);
    }

    #[test]
    fn table_for_id_maps_prefix() {
        assert_eq!(table_for_id("function:src/a.py:f"), Some("Function"));
        assert_eq!(table_for_id("type_alias:src/lib.rs:Id"), Some("TypeAlias"));
        assert_eq!(table_for_id("bogus:x:y"), None);
    }
}
