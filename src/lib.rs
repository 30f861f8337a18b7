//! Axon indexes a source repository into a persistent knowledge graph of
//! code entities and their relationships, with incremental re-indexing
//! and exact/full-text/fuzzy/vector search over an embedded graph store.

pub mod analytics;
pub mod config;
pub mod error;
pub mod graph;
pub mod indexing;
pub mod logging;
pub mod parsing;
pub mod storage;
pub mod types;
pub mod vector;
pub mod watcher;

pub use config::Settings;
pub use error::{IndexError, IndexResult, StorageError, StorageResult};
pub use graph::KnowledgeGraph;
pub use indexing::{run_pipeline, PipelineOptions, PipelineResult};
pub use storage::GraphStore;
pub use types::{
    GraphNode, GraphRelationship, NodeEmbedding, NodeLabel, RelationKind, SearchResult,
};
