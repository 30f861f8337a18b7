//! Git co-change coupling.
//!
//! Walks recent history and counts, per file pair, how many commits
//! touched both. Pairs co-changed at least twice get a `uses` edge
//! between their file nodes with `co_changes` and a normalized
//! `strength`. Repositories without git history silently contribute zero
//! coupled pairs.

use git2::Repository;
use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use tracing::debug;

use crate::graph::KnowledgeGraph;
use crate::types::{node_id, GraphRelationship, NodeLabel, RelationKind};

/// How many commits of history to inspect.
const MAX_COMMITS: usize = 200;

/// Minimum co-change count for a pair to be recorded.
const MIN_CO_CHANGES: i64 = 2;

/// Analyze git history and attach coupling edges. Returns the number of
/// coupled pairs recorded.
pub fn analyze_coupling(graph: &mut KnowledgeGraph, repo_root: &Path) -> usize {
    let commits = match collect_commit_files(repo_root) {
        Ok(commits) => commits,
        Err(e) => {
            debug!("Git history unavailable for {}: {e}", repo_root.display());
            return 0;
        }
    };

    let indexed: HashSet<String> = graph
        .nodes_with_label(NodeLabel::File)
        .map(|n| n.file_path.clone())
        .collect();

    let mut pair_counts: BTreeMap<(String, String), i64> = BTreeMap::new();
    for files in commits {
        let mut touched: Vec<&String> = files.iter().filter(|f| indexed.contains(*f)).collect();
        touched.sort();
        for i in 0..touched.len() {
            for j in i + 1..touched.len() {
                *pair_counts
                    .entry((touched[i].clone(), touched[j].clone()))
                    .or_insert(0) += 1;
            }
        }
    }

    let max_count = pair_counts.values().copied().max().unwrap_or(0);
    let mut coupled = 0usize;
    for ((a, b), count) in pair_counts {
        if count < MIN_CO_CHANGES {
            continue;
        }
        let mut rel = GraphRelationship::new(
            node_id(NodeLabel::File, &a, ""),
            node_id(NodeLabel::File, &b, ""),
            RelationKind::Uses,
        );
        rel.properties.co_changes = count;
        rel.properties.strength = count as f64 / max_count as f64;
        graph.add_relationship(rel);
        coupled += 1;
    }
    coupled
}

/// Changed file paths per commit, newest first, bounded by MAX_COMMITS.
fn collect_commit_files(repo_root: &Path) -> Result<Vec<HashSet<String>>, git2::Error> {
    let repo = Repository::discover(repo_root)?;
    let mut revwalk = repo.revwalk()?;
    revwalk.push_head()?;

    let mut commits: Vec<HashSet<String>> = Vec::new();
    for oid in revwalk.take(MAX_COMMITS) {
        let oid = oid?;
        let commit = repo.find_commit(oid)?;
        let tree = commit.tree()?;
        let parent_tree = match commit.parent(0) {
            Ok(parent) => Some(parent.tree()?),
            Err(_) => None,
        };

        let diff = repo.diff_tree_to_tree(parent_tree.as_ref(), Some(&tree), None)?;
        let mut files: HashSet<String> = HashSet::new();
        for delta in diff.deltas() {
            if let Some(path) = delta.new_file().path().and_then(|p| p.to_str()) {
                files.insert(path.to_string());
            }
        }
        if !files.is_empty() {
            commits.push(files);
        }
    }
    Ok(commits)
}
