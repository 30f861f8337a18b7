//! Repository ingestion: walking, graph building, derived analyses, and
//! the staged pipeline orchestrator.

pub mod builder;
pub mod communities;
pub mod coupling;
pub mod dead_code;
pub mod pipeline;
pub mod processes;
pub mod walker;

pub use builder::GraphBuilder;
pub use pipeline::{run_pipeline, PhaseTimings, PipelineOptions, PipelineResult, ProgressCallback};
pub use walker::{FileEntry, FileWalker};
