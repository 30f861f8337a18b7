//! Embedding generation and background persistence.
//!
//! The embedding model is an external collaborator behind the
//! [`Embedder`] trait: `embed(graph) -> [(node_id, vector)]`. The
//! pipeline can run the stage inline or hand it to a background worker;
//! either way the task persists its batch into storage on completion and
//! its failure never invalidates the rest of a pipeline result.

use std::sync::Arc;
use std::thread::JoinHandle;
use tracing::debug;

use crate::graph::KnowledgeGraph;
use crate::storage::GraphStore;
use crate::types::{NodeEmbedding, NodeLabel};

/// Opaque embedding model.
pub trait Embedder: Send + Sync {
    /// Produce one vector per embeddable node. Dimension is fixed per run.
    fn embed(&self, graph: &KnowledgeGraph) -> Vec<NodeEmbedding>;

    fn dimension(&self) -> usize;
}

/// Deterministic hashing embedder.
///
/// Projects each node's name and content into a fixed-dimension vector by
/// hashing character n-grams. No model weights, no I/O; exists so the
/// embedding path can run and be tested without a real model.
pub struct HashEmbedder {
    dimension: usize,
}

impl HashEmbedder {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension: dimension.max(1),
        }
    }

    fn embed_text(&self, text: &str) -> Vec<f64> {
        let mut vector = vec![0.0f64; self.dimension];
        let bytes = text.as_bytes();
        for window in bytes.windows(3) {
            let mut hash: u64 = 1469598103934665603;
            for &b in window {
                hash ^= b as u64;
                hash = hash.wrapping_mul(1099511628211);
            }
            let bucket = (hash % self.dimension as u64) as usize;
            vector[bucket] += 1.0;
        }
        // L2-normalize so cosine similarity behaves.
        let norm = vector.iter().map(|v| v * v).sum::<f64>().sqrt();
        if norm > 0.0 {
            for v in &mut vector {
                *v /= norm;
            }
        }
        vector
    }
}

impl Embedder for HashEmbedder {
    fn embed(&self, graph: &KnowledgeGraph) -> Vec<NodeEmbedding> {
        graph
            .iter_nodes()
            .filter(|n| {
                !matches!(
                    n.label,
                    NodeLabel::Folder | NodeLabel::Community | NodeLabel::Process
                )
            })
            .map(|n| NodeEmbedding {
                node_id: n.id.clone(),
                vector: self.embed_text(&format!("{} {}", n.name, n.content)),
            })
            .collect()
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

/// Handle on a background embedding run.
///
/// The worker computes embeddings and persists them; `wait` joins it and
/// returns how many were stored. Errors inside the worker are isolated;
/// they resolve to a count of zero.
pub struct EmbeddingTask {
    handle: JoinHandle<usize>,
}

impl EmbeddingTask {
    /// Run the full embed-and-store step synchronously. Returns the
    /// number of embeddings stored; failures yield zero.
    pub fn run_blocking(
        embedder: &dyn Embedder,
        graph: &KnowledgeGraph,
        storage: &GraphStore,
    ) -> usize {
        let embeddings = embedder.embed(graph);
        let count = embeddings.len();
        if let Err(e) = storage.store_embeddings(&embeddings) {
            debug!("Embedding persistence failed: {e}");
            return 0;
        }
        count
    }

    /// Dispatch the embed-and-store step to a background worker.
    pub fn spawn(
        embedder: Arc<dyn Embedder>,
        graph: KnowledgeGraph,
        storage: Arc<GraphStore>,
    ) -> Self {
        let handle = std::thread::spawn(move || {
            EmbeddingTask::run_blocking(embedder.as_ref(), &graph, &storage)
        });
        Self { handle }
    }

    /// Block until the worker finishes; returns embeddings stored.
    pub fn wait(self) -> usize {
        match self.handle.join() {
            Ok(count) => count,
            Err(_) => {
                debug!("Embedding worker panicked");
                0
            }
        }
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::GraphNode;

    fn sample_graph() -> KnowledgeGraph {
        let mut graph = KnowledgeGraph::new();
        let mut file = GraphNode::new(NodeLabel::File, "src/a.py", "");
        file.content = "def f():\n    pass\n".into();
        graph.add_node(file);
        graph.add_node(GraphNode::new(NodeLabel::Function, "src/a.py", "f"));
        graph.add_node(GraphNode::new(NodeLabel::Folder, "src", ""));
        graph
    }

    #[test]
    fn embeddings_are_deterministic_and_fixed_dimension() {
        let embedder = HashEmbedder::new(32);
        let graph = sample_graph();

        let first = embedder.embed(&graph);
        let second = embedder.embed(&graph);
        assert_eq!(first, second);
        assert!(first.iter().all(|e| e.vector.len() == 32));
    }

    #[test]
    fn folders_are_not_embedded() {
        let embedder = HashEmbedder::new(16);
        let embeddings = embedder.embed(&sample_graph());
        assert!(embeddings.iter().all(|e| !e.node_id.starts_with("folder:")));
        assert_eq!(embeddings.len(), 2);
    }

    #[test]
    fn vectors_are_normalized() {
        let embedder = HashEmbedder::new(8);
        let vector = embedder.embed_text("some source text with ngrams");
        let norm: f64 = vector.iter().map(|v| v * v).sum::<f64>().sqrt();
        assert!((norm - 1.0).abs() < 1e-9);
    }
}
