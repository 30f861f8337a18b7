//! The staged ingestion pipeline.
//!
//! Phases run in a fixed order, each reporting `(name, 0.0)` on entry and
//! `(name, 1.0)` on exit to an optional progress callback. Incremental
//! mode is the default when the store already has files: only files whose
//! content hash changed are re-parsed, and deleted files have their nodes
//! removed. Phase failures in the analysis stages are best-effort; only
//! walking, structure, and the storage load abort a run.

use rayon::prelude::*;
use serde_json::json;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

use crate::analytics;
use crate::config::Settings;
use crate::error::{IndexError, IndexResult};
use crate::graph::KnowledgeGraph;
use crate::indexing::builder::GraphBuilder;
use crate::indexing::walker::{FileEntry, FileWalker};
use crate::indexing::{communities, coupling, dead_code, processes};
use crate::parsing::{parser_for, ParseResult};
use crate::storage::GraphStore;
use crate::types::NodeLabel;
use crate::vector::{Embedder, EmbeddingTask, HashEmbedder};

/// Progress reporting hook: `(phase_name, fraction)`.
pub type ProgressCallback = Box<dyn Fn(&str, f64) + Send + Sync>;

/// Ordered pipeline phases, with the verbatim names reported to the
/// progress callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Walk,
    Structure,
    Parsing,
    Imports,
    Calls,
    Heritage,
    Types,
    Communities,
    Processes,
    DeadCode,
    Coupling,
    StorageLoad,
    Embeddings,
}

impl Phase {
    pub fn display_name(&self) -> &'static str {
        match self {
            Phase::Walk => "Walking files",
            Phase::Structure => "Processing structure",
            Phase::Parsing => "Parsing code",
            Phase::Imports => "Resolving imports",
            Phase::Calls => "Tracing calls",
            Phase::Heritage => "Extracting heritage",
            Phase::Types => "Analyzing types",
            Phase::Communities => "Detecting communities",
            Phase::Processes => "Detecting execution flows",
            Phase::DeadCode => "Finding dead code",
            Phase::Coupling => "Analyzing git history",
            Phase::StorageLoad => "Loading to storage",
            Phase::Embeddings => "Generating embeddings",
        }
    }

    pub fn key(&self) -> &'static str {
        match self {
            Phase::Walk => "walk",
            Phase::Structure => "structure",
            Phase::Parsing => "parsing",
            Phase::Imports => "imports",
            Phase::Calls => "calls",
            Phase::Heritage => "heritage",
            Phase::Types => "types",
            Phase::Communities => "communities",
            Phase::Processes => "processes",
            Phase::DeadCode => "dead_code",
            Phase::Coupling => "coupling",
            Phase::StorageLoad => "storage_load",
            Phase::Embeddings => "embeddings",
        }
    }
}

/// Per-phase wall-clock seconds.
#[derive(Debug, Clone, Default)]
pub struct PhaseTimings {
    pub walk: f64,
    pub structure: f64,
    pub parsing: f64,
    pub imports: f64,
    pub calls: f64,
    pub heritage: f64,
    pub types: f64,
    pub communities: f64,
    pub processes: f64,
    pub dead_code: f64,
    pub coupling: f64,
    pub storage_load: f64,
    pub embeddings: f64,
}

impl PhaseTimings {
    fn record(&mut self, phase: Phase, seconds: f64) {
        let slot = match phase {
            Phase::Walk => &mut self.walk,
            Phase::Structure => &mut self.structure,
            Phase::Parsing => &mut self.parsing,
            Phase::Imports => &mut self.imports,
            Phase::Calls => &mut self.calls,
            Phase::Heritage => &mut self.heritage,
            Phase::Types => &mut self.types,
            Phase::Communities => &mut self.communities,
            Phase::Processes => &mut self.processes,
            Phase::DeadCode => &mut self.dead_code,
            Phase::Coupling => &mut self.coupling,
            Phase::StorageLoad => &mut self.storage_load,
            Phase::Embeddings => &mut self.embeddings,
        };
        *slot = seconds;
    }

    /// `(phase, display name, seconds)` for every phase, in order.
    pub fn entries(&self) -> Vec<(&'static str, &'static str, f64)> {
        [
            (Phase::Walk, self.walk),
            (Phase::Structure, self.structure),
            (Phase::Parsing, self.parsing),
            (Phase::Imports, self.imports),
            (Phase::Calls, self.calls),
            (Phase::Heritage, self.heritage),
            (Phase::Types, self.types),
            (Phase::Communities, self.communities),
            (Phase::Processes, self.processes),
            (Phase::DeadCode, self.dead_code),
            (Phase::Coupling, self.coupling),
            (Phase::StorageLoad, self.storage_load),
            (Phase::Embeddings, self.embeddings),
        ]
        .into_iter()
        .map(|(phase, seconds)| (phase.key(), phase.display_name(), seconds))
        .collect()
    }
}

/// Options controlling one pipeline run.
pub struct PipelineOptions {
    /// Force a complete re-index even when the store has data.
    pub full: bool,
    /// Run the embedding stage (requires storage).
    pub embeddings: bool,
    /// Block on the embedding stage instead of returning a task handle.
    pub wait_embeddings: bool,
    pub progress: Option<ProgressCallback>,
    /// Embedding model; a deterministic hashing embedder when unset.
    pub embedder: Option<Arc<dyn Embedder>>,
    pub settings: Arc<Settings>,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            full: false,
            embeddings: false,
            wait_embeddings: false,
            progress: None,
            embedder: None,
            settings: Arc::new(Settings::default()),
        }
    }
}

/// Outcome of one pipeline run.
pub struct PipelineResult {
    pub files: usize,
    pub symbols: usize,
    pub relationships: usize,
    pub clusters: usize,
    pub processes: usize,
    pub dead_code: usize,
    pub coupled_pairs: usize,
    pub embeddings: usize,
    pub incremental: bool,
    pub changed_files: usize,
    pub duration_seconds: f64,
    pub phase_timings: PhaseTimings,
    /// Handle on a background embedding run, when not waited for.
    pub embedding_task: Option<EmbeddingTask>,
}

/// Index `repo_path`, optionally loading into `storage`.
///
/// Returns the built graph (changed files only on incremental runs) and
/// the run report.
pub fn run_pipeline(
    repo_path: &Path,
    storage: Option<Arc<GraphStore>>,
    options: PipelineOptions,
) -> IndexResult<(KnowledgeGraph, PipelineResult)> {
    if !repo_path.is_dir() {
        return Err(IndexError::InvalidRoot {
            path: repo_path.to_path_buf(),
        });
    }

    let run_start = Instant::now();
    let mut timings = PhaseTimings::default();
    let progress = options.progress.as_deref();

    // Phase 1: walk.
    let entries = run_phase(Phase::Walk, progress, &mut timings, || {
        FileWalker::new(options.settings.clone()).walk(repo_path)
    });

    // Incremental diff against the store's hashes.
    let incremental = !options.full
        && storage
            .as_deref()
            .map(|store| !store.is_empty())
            .unwrap_or(false);

    let mut deleted_files: Vec<String> = Vec::new();
    let to_parse: Vec<FileEntry> = if incremental {
        let indexed = storage
            .as_deref()
            .map(|store| store.get_indexed_files())
            .unwrap_or_default();
        let changed: Vec<FileEntry> = entries
            .iter()
            .filter(|entry| indexed.get(&entry.path) != Some(&entry.content_hash))
            .cloned()
            .collect();
        deleted_files = indexed
            .keys()
            .filter(|path| !entries.iter().any(|e| &e.path == *path))
            .cloned()
            .collect();
        deleted_files.sort();
        changed
    } else {
        entries.clone()
    };
    let changed_files = to_parse.len() + deleted_files.len();

    // Phase 2: structure.
    let mut builder = GraphBuilder::new();
    run_phase(Phase::Structure, progress, &mut timings, || {
        builder.add_structure(&to_parse);
    });

    // Phase 3: parsing. Parsers are pure, so one task per file; results
    // are folded back in deterministic path order.
    let parallel = options.settings.indexing.parallel;
    run_phase(Phase::Parsing, progress, &mut timings, || {
        let parsed: Vec<(usize, ParseResult)> = if parallel {
            to_parse
                .par_iter()
                .enumerate()
                .map(|(i, entry)| (i, parse_entry(entry)))
                .collect()
        } else {
            to_parse
                .iter()
                .enumerate()
                .map(|(i, entry)| (i, parse_entry(entry)))
                .collect()
        };
        let mut parsed = parsed;
        parsed.sort_by_key(|(i, _)| *i);
        for (i, result) in parsed {
            builder.add_parse_result(&to_parse[i], result);
        }
    });

    // Phases 4-7: edge materialization.
    run_phase(Phase::Imports, progress, &mut timings, || {
        builder.link_imports()
    });
    run_phase(Phase::Calls, progress, &mut timings, || builder.link_calls());
    run_phase(Phase::Heritage, progress, &mut timings, || {
        builder.link_heritage()
    });
    run_phase(Phase::Types, progress, &mut timings, || {
        builder.link_type_refs()
    });

    let mut graph = builder.into_graph();

    // Phases 8-11: derived analyses, best-effort.
    let clusters = run_phase(Phase::Communities, progress, &mut timings, || {
        communities::detect_communities(&mut graph)
    });
    let process_count = run_phase(Phase::Processes, progress, &mut timings, || {
        processes::detect_processes(&mut graph)
    });
    let dead = run_phase(Phase::DeadCode, progress, &mut timings, || {
        dead_code::find_dead_code(&mut graph)
    });
    let coupled_pairs = run_phase(Phase::Coupling, progress, &mut timings, || {
        coupling::analyze_coupling(&mut graph, repo_path)
    });

    // Phase 12: storage load. Always last; failures abort the run.
    if let Some(store) = storage.as_deref() {
        run_phase_result(Phase::StorageLoad, progress, &mut timings, || {
            if incremental {
                for path in &deleted_files {
                    store.remove_nodes_by_file(path);
                }
                for entry in &to_parse {
                    store.remove_nodes_by_file(&entry.path);
                }
                let nodes: Vec<_> = graph.iter_nodes().cloned().collect();
                let rels: Vec<_> = graph.iter_relationships().cloned().collect();
                store.add_nodes(&nodes)?;
                store.add_relationships(&rels)?;
                store.rebuild_fts_indexes();
                Ok(())
            } else {
                store.bulk_load(&graph)
            }
        })?;
    }

    let symbols = graph
        .iter_nodes()
        .filter(|n| {
            !matches!(
                n.label,
                NodeLabel::File | NodeLabel::Folder | NodeLabel::Community | NodeLabel::Process
            )
        })
        .count();
    let relationships = graph.relationship_count();

    let mut result = PipelineResult {
        files: entries.len(),
        symbols,
        relationships,
        clusters,
        processes: process_count,
        dead_code: dead,
        coupled_pairs,
        embeddings: 0,
        incremental,
        changed_files: if incremental { changed_files } else { entries.len() },
        duration_seconds: 0.0,
        phase_timings: PhaseTimings::default(),
        embedding_task: None,
    };

    // Phase 13 (optional): embeddings. Failure never invalidates the
    // rest of the result.
    if options.embeddings {
        if let Some(store) = storage.clone() {
            let embedder: Arc<dyn Embedder> = options
                .embedder
                .clone()
                .unwrap_or_else(|| Arc::new(HashEmbedder::new(options.settings.embedding.dimension)));

            if options.wait_embeddings {
                result.embeddings = run_phase(Phase::Embeddings, progress, &mut timings, || {
                    EmbeddingTask::run_blocking(embedder.as_ref(), &graph, &store)
                });
            } else {
                report(progress, Phase::Embeddings, 0.0);
                result.embedding_task =
                    Some(EmbeddingTask::spawn(embedder, graph.clone(), store));
                report(progress, Phase::Embeddings, 1.0);
            }
        } else {
            debug!("Embedding stage skipped: no storage configured");
        }
    }

    result.duration_seconds = run_start.elapsed().as_secs_f64();
    result.phase_timings = timings;

    info!(
        "Indexed {} files ({} symbols, {} relationships) in {:.2}s",
        result.files, result.symbols, result.relationships, result.duration_seconds
    );
    analytics::log_event(
        "index",
        &[
            ("repo", json!(repo_path.display().to_string())),
            ("files", json!(result.files)),
            ("symbols", json!(result.symbols)),
            ("relationships", json!(result.relationships)),
            ("incremental", json!(result.incremental)),
            ("duration_seconds", json!(result.duration_seconds)),
        ],
    );

    Ok((graph, result))
}

fn parse_entry(entry: &FileEntry) -> ParseResult {
    match parser_for(entry.language) {
        Some(mut parser) => parser.parse(&entry.content, &entry.path),
        None => ParseResult::default(),
    }
}

fn report(progress: Option<&(dyn Fn(&str, f64) + Send + Sync)>, phase: Phase, fraction: f64) {
    if let Some(callback) = progress {
        callback(phase.display_name(), fraction);
    }
}

fn run_phase<T>(
    phase: Phase,
    progress: Option<&(dyn Fn(&str, f64) + Send + Sync)>,
    timings: &mut PhaseTimings,
    body: impl FnOnce() -> T,
) -> T {
    report(progress, phase, 0.0);
    let start = Instant::now();
    let value = body();
    timings.record(phase, start.elapsed().as_secs_f64());
    report(progress, phase, 1.0);
    value
}

fn run_phase_result<T>(
    phase: Phase,
    progress: Option<&(dyn Fn(&str, f64) + Send + Sync)>,
    timings: &mut PhaseTimings,
    body: impl FnOnce() -> Result<T, crate::error::StorageError>,
) -> IndexResult<T> {
    report(progress, phase, 0.0);
    let start = Instant::now();
    let value = body();
    timings.record(phase, start.elapsed().as_secs_f64());
    report(progress, phase, 1.0);
    value.map_err(IndexError::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phase_names_are_verbatim() {
        assert_eq!(Phase::Walk.display_name(), "Walking files");
        assert_eq!(Phase::Structure.display_name(), "Processing structure");
        assert_eq!(Phase::Parsing.display_name(), "Parsing code");
        assert_eq!(Phase::Imports.display_name(), "Resolving imports");
        assert_eq!(Phase::Calls.display_name(), "Tracing calls");
        assert_eq!(Phase::Heritage.display_name(), "Extracting heritage");
        assert_eq!(Phase::Types.display_name(), "Analyzing types");
        assert_eq!(Phase::Communities.display_name(), "Detecting communities");
        assert_eq!(Phase::Processes.display_name(), "Detecting execution flows");
        assert_eq!(Phase::DeadCode.display_name(), "Finding dead code");
        assert_eq!(Phase::Coupling.display_name(), "Analyzing git history");
        assert_eq!(Phase::StorageLoad.display_name(), "Loading to storage");
        assert_eq!(Phase::Embeddings.display_name(), "Generating embeddings");
    }

    #[test]
    fn missing_root_is_fatal() {
        let result = run_pipeline(
            Path::new("/definitely/not/a/real/path"),
            None,
            PipelineOptions::default(),
        );
        assert!(matches!(result, Err(IndexError::InvalidRoot { .. })));
    }

    #[test]
    fn pipeline_without_storage_builds_a_graph() {
        let tmp = tempfile::TempDir::new().unwrap();
        std::fs::create_dir_all(tmp.path().join("src")).unwrap();
        std::fs::write(
            tmp.path().join("src/main.py"),
            "from .auth import validate\n\ndef main():\n    validate()\n",
        )
        .unwrap();
        std::fs::write(tmp.path().join("src/auth.py"), "def validate():\n    pass\n").unwrap();

        let (graph, result) = run_pipeline(tmp.path(), None, PipelineOptions::default()).unwrap();

        assert_eq!(result.files, 2);
        assert!(result.symbols >= 2);
        assert!(result.relationships > 0);
        assert!(!result.incremental);
        assert!(graph.contains_node("file:src/main.py:"));
        assert!(result.duration_seconds > 0.0);
    }

    #[test]
    fn progress_reports_entry_and_exit_for_each_phase() {
        let tmp = tempfile::TempDir::new().unwrap();
        std::fs::write(tmp.path().join("a.py"), "def f():\n    pass\n").unwrap();

        let calls = std::sync::Arc::new(std::sync::Mutex::new(Vec::<(String, f64)>::new()));
        let sink = calls.clone();
        let options = PipelineOptions {
            progress: Some(Box::new(move |name, fraction| {
                sink.lock().unwrap().push((name.to_string(), fraction));
            })),
            ..Default::default()
        };

        run_pipeline(tmp.path(), None, options).unwrap();

        let calls = calls.lock().unwrap();
        for name in [
            "Walking files",
            "Processing structure",
            "Parsing code",
            "Resolving imports",
            "Tracing calls",
            "Extracting heritage",
            "Analyzing types",
            "Detecting communities",
            "Detecting execution flows",
            "Finding dead code",
            "Analyzing git history",
        ] {
            assert!(
                calls.iter().any(|(n, f)| n == name && *f == 0.0),
                "{name} missing 0.0"
            );
            assert!(
                calls.iter().any(|(n, f)| n == name && *f == 1.0),
                "{name} missing 1.0"
            );
        }
        // No storage: the load and embedding phases never fire.
        assert!(!calls.iter().any(|(n, _)| n == "Loading to storage"));
        assert!(!calls.iter().any(|(n, _)| n == "Generating embeddings"));
    }

    #[test]
    fn timing_entries_cover_all_phases() {
        let timings = PhaseTimings::default();
        let entries = timings.entries();
        assert_eq!(entries.len(), 13);
        assert_eq!(entries[0].0, "walk");
        assert_eq!(entries[12].1, "Generating embeddings");
    }
}
