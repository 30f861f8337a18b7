//! Search operations: exact name, BM25 full-text, fuzzy, and vector.
//!
//! Each operation scans the searchable node tables, scores candidates,
//! and returns the top `limit` sorted by score descending with node ID
//! as the tiebreaker. Per-table query failures are logged at debug level
//! and skipped, so a missing FTS extension degrades instead of erroring.

use kuzu::Connection;
use tracing::debug;

use crate::storage::store::{node_columns, row_to_node, value_f64, value_str};
use crate::storage::{escape, searchable_labels, table_for_id};
use crate::types::SearchResult;

/// Test-path demotion factor shared by the search paths.
const TEST_PATH_PENALTY: f64 = 0.5;

/// Boost for function/class definitions outside test files.
const DEFINITION_BOOST: f64 = 1.2;

pub(crate) fn exact_name_search(conn: &Connection, name: &str, limit: usize) -> Vec<SearchResult> {
    let escaped = escape(name);
    let mut candidates: Vec<SearchResult> = Vec::new();

    for label in searchable_labels() {
        let table = label.table_name();
        let query = format!(
            "MATCH (n:{table}) WHERE n.name = '{escaped}' \
             RETURN n.id, n.name, n.file_path, n.content, n.signature LIMIT {limit}"
        );
        let result = match conn.query(&query) {
            Ok(result) => result,
            Err(e) => {
                debug!("exact_name_search failed on {table}: {e}");
                continue;
            }
        };
        for row in result {
            let node_id = value_str(&row[0]);
            let file_path = value_str(&row[2]);
            let content = value_str(&row[3]);
            let signature = value_str(&row[4]);
            let score = if file_path.contains("/tests/") { 1.0 } else { 2.0 };
            candidates.push(SearchResult {
                label: label_prefix(&node_id),
                node_id,
                score,
                node_name: value_str(&row[1]),
                file_path,
                snippet: snippet(&content, &signature),
                language: String::new(),
            });
        }
    }

    sort_and_truncate(candidates, limit)
}

pub(crate) fn fts_search(conn: &Connection, query_text: &str, limit: usize) -> Vec<SearchResult> {
    let escaped = escape(query_text);
    let mut candidates: Vec<SearchResult> = Vec::new();

    for label in searchable_labels() {
        let table = label.table_name();
        let idx_name = format!("{}_fts", table.to_lowercase());
        let query = format!(
            "CALL QUERY_FTS_INDEX('{table}', '{idx_name}', '{escaped}') \
             RETURN node.id, node.name, node.file_path, node.content, \
             node.signature, node.language, score \
             ORDER BY score DESC LIMIT {limit}"
        );
        let result = match conn.query(&query) {
            Ok(result) => result,
            Err(e) => {
                debug!("fts_search failed on {table}: {e}");
                continue;
            }
        };
        for row in result {
            let node_id = value_str(&row[0]);
            let file_path = value_str(&row[2]);
            let content = value_str(&row[3]);
            let signature = value_str(&row[4]);
            let mut score = value_f64(&row[6]);

            // Demote test files; boost top-level definitions elsewhere.
            let is_test = file_path.contains("/tests/") || file_path.contains("/test_");
            if is_test {
                score *= TEST_PATH_PENALTY;
            }
            let label_prefix = label_prefix(&node_id);
            if matches!(label_prefix.as_str(), "function" | "class") && !is_test {
                score *= DEFINITION_BOOST;
            }

            candidates.push(SearchResult {
                node_id,
                score,
                node_name: value_str(&row[1]),
                file_path,
                label: label_prefix,
                snippet: snippet(&content, &signature),
                language: value_str(&row[5]),
            });
        }
    }

    sort_and_truncate(candidates, limit)
}

pub(crate) fn fuzzy_search(
    conn: &Connection,
    query_text: &str,
    limit: usize,
    max_distance: i64,
) -> Vec<SearchResult> {
    let escaped = escape(&query_text.to_lowercase());
    let mut candidates: Vec<SearchResult> = Vec::new();

    for label in searchable_labels() {
        let table = label.table_name();
        let query = format!(
            "MATCH (n:{table}) \
             WHERE levenshtein(lower(n.name), '{escaped}') <= {max_distance} \
             RETURN n.id, n.name, n.file_path, n.content, \
             levenshtein(lower(n.name), '{escaped}') AS dist \
             ORDER BY dist LIMIT {limit}"
        );
        let result = match conn.query(&query) {
            Ok(result) => result,
            Err(e) => {
                debug!("fuzzy_search failed on {table}: {e}");
                continue;
            }
        };
        for row in result {
            let node_id = value_str(&row[0]);
            let content = value_str(&row[3]);
            let distance = crate::storage::store::value_i64(&row[4]);
            let score = (1.0 - distance as f64 * 0.3).max(0.3);
            candidates.push(SearchResult {
                label: label_prefix(&node_id),
                node_id,
                score,
                node_name: value_str(&row[1]),
                file_path: value_str(&row[2]),
                snippet: snippet(&content, ""),
                language: String::new(),
            });
        }
    }

    sort_and_truncate(candidates, limit)
}

pub(crate) fn vector_search(conn: &Connection, vector: &[f64], limit: usize) -> Vec<SearchResult> {
    // Vector literals must be inlined; parameterized queries cannot
    // disambiguate DOUBLE[] for array_cosine_similarity.
    let literal = crate::storage::bulk::vector_literal(vector);
    let query = format!(
        "MATCH (e:Embedding) \
         RETURN e.node_id, array_cosine_similarity(e.vec, {literal}) AS sim \
         ORDER BY sim DESC LIMIT {limit}"
    );
    let result = match conn.query(&query) {
        Ok(result) => result,
        Err(e) => {
            debug!("vector_search failed: {e}");
            return Vec::new();
        }
    };

    let mut hits: Vec<(String, f64)> = Vec::new();
    for row in result {
        hits.push((value_str(&row[0]), value_f64(&row[1])));
    }
    if hits.is_empty() {
        return Vec::new();
    }

    // Batch-fetch node metadata per table.
    let mut by_table: std::collections::BTreeMap<&'static str, Vec<&str>> =
        std::collections::BTreeMap::new();
    for (node_id, _) in &hits {
        if let Some(table) = table_for_id(node_id) {
            by_table.entry(table).or_default().push(node_id);
        }
    }

    let mut node_cache: std::collections::HashMap<String, crate::types::GraphNode> =
        std::collections::HashMap::new();
    for (table, ids) in by_table {
        let id_list: Vec<String> = ids.iter().map(|id| format!("'{}'", escape(id))).collect();
        let query = format!(
            "MATCH (n:{table}) WHERE n.id IN [{}] RETURN {}",
            id_list.join(", "),
            node_columns("n")
        );
        match conn.query(&query) {
            Ok(result) => {
                for row in result {
                    if let Some(node) = row_to_node(&row) {
                        node_cache.insert(node.id.clone(), node);
                    }
                }
            }
            Err(e) => debug!("vector_search node fetch failed on {table}: {e}"),
        }
    }

    hits.into_iter()
        .map(|(node_id, similarity)| {
            let node = node_cache.get(&node_id);
            SearchResult {
                label: label_prefix(&node_id),
                score: similarity,
                node_name: node.map(|n| n.name.clone()).unwrap_or_default(),
                file_path: node.map(|n| n.file_path.clone()).unwrap_or_default(),
                snippet: node
                    .map(|n| snippet(&n.content, &n.signature))
                    .unwrap_or_default(),
                language: node.map(|n| n.language.clone()).unwrap_or_default(),
                node_id,
            }
        })
        .collect()
}

fn label_prefix(node_id: &str) -> String {
    node_id.split(':').next().unwrap_or("").to_string()
}

/// First 200 bytes of content (or signature when content is empty),
/// clipped at a character boundary.
fn snippet(content: &str, signature: &str) -> String {
    let source = if content.is_empty() { signature } else { content };
    let mut end = source.len().min(200);
    while end > 0 && !source.is_char_boundary(end) {
        end -= 1;
    }
    source[..end].to_string()
}

fn sort_and_truncate(mut candidates: Vec<SearchResult>, limit: usize) -> Vec<SearchResult> {
    candidates.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.node_id.cmp(&b.node_id))
    });
    candidates.truncate(limit);
    candidates
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hit(id: &str, score: f64) -> SearchResult {
        SearchResult {
            node_id: id.to_string(),
            score,
            node_name: String::new(),
            file_path: String::new(),
            label: label_prefix(id),
            snippet: String::new(),
            language: String::new(),
        }
    }

    #[test]
    fn results_sort_by_score_then_id() {
        let sorted = sort_and_truncate(
            vec![
                hit("function:b.py:f", 1.0),
                hit("function:a.py:f", 2.0),
                hit("function:a.py:a", 1.0),
            ],
            10,
        );
        let ids: Vec<&str> = sorted.iter().map(|r| r.node_id.as_str()).collect();
        assert_eq!(
            ids,
            vec!["function:a.py:f", "function:a.py:a", "function:b.py:f"]
        );
    }

    #[test]
    fn truncation_respects_limit() {
        let sorted = sort_and_truncate(vec![hit("a", 1.0), hit("b", 2.0), hit("c", 3.0)], 2);
        assert_eq!(sorted.len(), 2);
        assert_eq!(sorted[0].node_id, "c");
    }

    #[test]
    fn snippet_prefers_content_and_respects_boundaries() {
        assert_eq!(snippet("short", "sig"), "short");
        assert_eq!(snippet("", "sig"), "sig");
        let long = "é".repeat(150);
        let clipped = snippet(&long, "");
        assert!(clipped.len() <= 200);
        assert!(clipped.chars().all(|c| c == 'é'));
    }
}
