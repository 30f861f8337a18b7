//! End-to-end pipeline tests against a real store.

use std::fs;
use std::path::Path;
use std::sync::{Arc, Mutex};

use axon::indexing::{run_pipeline, PipelineOptions};
use axon::storage::GraphStore;
use tempfile::TempDir;

/// Three-file Python fixture: main imports validate from auth, auth
/// imports helper from utils.
fn python_fixture(root: &Path) {
    let src = root.join("src");
    fs::create_dir_all(&src).unwrap();
    fs::write(
        src.join("main.py"),
        "from .auth import validate\n\ndef main():\n    validate()\n",
    )
    .unwrap();
    fs::write(
        src.join("auth.py"),
        "from .utils import helper\n\ndef validate():\n    helper()\n",
    )
    .unwrap();
    fs::write(src.join("utils.py"), "def helper():\n    pass\n").unwrap();
}

/// Fixture with a call chain and an orphan function for phases 7-11.
fn rich_fixture(root: &Path) {
    let src = root.join("src");
    fs::create_dir_all(&src).unwrap();
    fs::write(
        src.join("models.py"),
        "class User:\n    def __init__(self, name: str):\n        self.name = name\n",
    )
    .unwrap();
    fs::write(
        src.join("auth.py"),
        "from .models import User\nfrom .check import check\n\ndef validate(user: User) -> bool:\n    return check(user)\n",
    )
    .unwrap();
    fs::write(
        src.join("check.py"),
        "from .verify import verify\n\ndef check(obj) -> bool:\n    return verify(obj)\n",
    )
    .unwrap();
    fs::write(
        src.join("verify.py"),
        "def verify(obj) -> bool:\n    return obj is not None\n",
    )
    .unwrap();
    fs::write(src.join("unused.py"), "def orphan_func():\n    pass\n").unwrap();
}

fn open_store(dir: &TempDir) -> Arc<GraphStore> {
    Arc::new(GraphStore::open(&dir.path().join("graph-db"), false).unwrap())
}

#[test]
fn basic_run_reports_counts_and_loads_files() {
    let repo = TempDir::new().unwrap();
    python_fixture(repo.path());
    let db = TempDir::new().unwrap();
    let store = open_store(&db);

    let (_, result) =
        run_pipeline(repo.path(), Some(store.clone()), PipelineOptions::default()).unwrap();

    assert_eq!(result.files, 3);
    assert!(result.symbols >= 3);
    assert!(result.relationships > 0);
    assert!(result.duration_seconds > 0.0);
    assert!(!result.incremental);

    // File nodes are retrievable with walker-relative paths.
    let node = store.get_node("file:src/main.py:").unwrap();
    assert_eq!(node.name, "main.py");
}

#[test]
fn progress_callback_covers_storage_phase() {
    let repo = TempDir::new().unwrap();
    python_fixture(repo.path());
    let db = TempDir::new().unwrap();
    let store = open_store(&db);

    let calls: Arc<Mutex<Vec<(String, f64)>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = calls.clone();
    let options = PipelineOptions {
        progress: Some(Box::new(move |name, fraction| {
            sink.lock().unwrap().push((name.to_string(), fraction));
        })),
        ..Default::default()
    };

    run_pipeline(repo.path(), Some(store), options).unwrap();

    let calls = calls.lock().unwrap();
    let names: Vec<&str> = calls.iter().map(|(n, _)| n.as_str()).collect();
    for expected in [
        "Walking files",
        "Processing structure",
        "Parsing code",
        "Resolving imports",
        "Tracing calls",
        "Extracting heritage",
        "Loading to storage",
    ] {
        assert!(names.contains(&expected), "missing phase {expected}");
    }
}

#[test]
fn full_phases_report_analysis_counts() {
    let repo = TempDir::new().unwrap();
    rich_fixture(repo.path());
    let db = TempDir::new().unwrap();
    let store = open_store(&db);

    let (_, result) = run_pipeline(repo.path(), Some(store), PipelineOptions::default()).unwrap();

    assert_eq!(result.files, 5);
    assert!(result.symbols >= 5);
    assert!(result.relationships > 0);

    // orphan_func has no callers and is not excluded, so it must be flagged.
    assert!(result.dead_code >= 1);

    // No git repo under the fixture, so coupling silently yields zero.
    assert_eq!(result.coupled_pairs, 0);
}

#[test]
fn incremental_no_changes() {
    let repo = TempDir::new().unwrap();
    python_fixture(repo.path());
    let db = TempDir::new().unwrap();
    let store = open_store(&db);

    run_pipeline(repo.path(), Some(store.clone()), PipelineOptions::default()).unwrap();
    let (_, second) =
        run_pipeline(repo.path(), Some(store), PipelineOptions::default()).unwrap();

    assert!(second.incremental);
    assert_eq!(second.changed_files, 0);
    assert_eq!(second.files, 3);
}

#[test]
fn incremental_changed_file() {
    let repo = TempDir::new().unwrap();
    python_fixture(repo.path());
    let db = TempDir::new().unwrap();
    let store = open_store(&db);

    run_pipeline(repo.path(), Some(store.clone()), PipelineOptions::default()).unwrap();

    fs::write(
        repo.path().join("src/utils.py"),
        "def helper():\n    return 42\n",
    )
    .unwrap();

    let (_, result) = run_pipeline(repo.path(), Some(store), PipelineOptions::default()).unwrap();
    assert!(result.incremental);
    assert_eq!(result.changed_files, 1);
}

#[test]
fn incremental_new_file() {
    let repo = TempDir::new().unwrap();
    python_fixture(repo.path());
    let db = TempDir::new().unwrap();
    let store = open_store(&db);

    run_pipeline(repo.path(), Some(store.clone()), PipelineOptions::default()).unwrap();

    fs::write(
        repo.path().join("src/extra.py"),
        "def extra_func():\n    pass\n",
    )
    .unwrap();

    let (_, result) = run_pipeline(repo.path(), Some(store), PipelineOptions::default()).unwrap();
    assert!(result.incremental);
    assert_eq!(result.changed_files, 1);
    assert_eq!(result.files, 4);
}

#[test]
fn incremental_deleted_file_purges_nodes() {
    let repo = TempDir::new().unwrap();
    python_fixture(repo.path());
    let db = TempDir::new().unwrap();
    let store = open_store(&db);

    run_pipeline(repo.path(), Some(store.clone()), PipelineOptions::default()).unwrap();

    fs::remove_file(repo.path().join("src/utils.py")).unwrap();

    let (_, result) =
        run_pipeline(repo.path(), Some(store.clone()), PipelineOptions::default()).unwrap();
    assert!(result.incremental);
    assert_eq!(result.changed_files, 1);

    let remaining = store.get_indexed_files();
    assert!(!remaining.keys().any(|p| p.contains("utils.py")));
}

#[test]
fn full_flag_bypasses_incremental() {
    let repo = TempDir::new().unwrap();
    python_fixture(repo.path());
    let db = TempDir::new().unwrap();
    let store = open_store(&db);

    run_pipeline(repo.path(), Some(store.clone()), PipelineOptions::default()).unwrap();
    let options = PipelineOptions {
        full: true,
        ..Default::default()
    };
    let (_, result) = run_pipeline(repo.path(), Some(store), options).unwrap();

    assert!(!result.incremental);
}

#[test]
fn indexed_files_match_walked_hashes() {
    let repo = TempDir::new().unwrap();
    python_fixture(repo.path());
    let db = TempDir::new().unwrap();
    let store = open_store(&db);

    run_pipeline(repo.path(), Some(store.clone()), PipelineOptions::default()).unwrap();

    let indexed = store.get_indexed_files();
    assert_eq!(indexed.len(), 3);
    for path in ["src/main.py", "src/auth.py", "src/utils.py"] {
        let content = fs::read_to_string(repo.path().join(path)).unwrap();
        let expected = axon::indexing::walker::sha256_hex(&content);
        assert_eq!(indexed.get(path), Some(&expected), "{path}");
    }
}

#[test]
fn waited_embeddings_report_a_count() {
    let repo = TempDir::new().unwrap();
    python_fixture(repo.path());
    let db = TempDir::new().unwrap();
    let store = open_store(&db);

    let options = PipelineOptions {
        embeddings: true,
        wait_embeddings: true,
        ..Default::default()
    };
    let (_, result) = run_pipeline(repo.path(), Some(store), options).unwrap();

    assert!(result.embeddings > 0);
    assert!(result.embedding_task.is_none());
}

#[test]
fn async_embeddings_return_a_task_handle() {
    let repo = TempDir::new().unwrap();
    python_fixture(repo.path());
    let db = TempDir::new().unwrap();
    let store = open_store(&db);

    let options = PipelineOptions {
        embeddings: true,
        wait_embeddings: false,
        ..Default::default()
    };
    let (_, mut result) = run_pipeline(repo.path(), Some(store), options).unwrap();

    let task = result.embedding_task.take().expect("background task handle");
    let stored = task.wait();
    assert!(stored > 0);
}

#[test]
fn no_storage_skips_embedding_phase() {
    let repo = TempDir::new().unwrap();
    python_fixture(repo.path());

    let calls: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = calls.clone();
    let options = PipelineOptions {
        embeddings: true,
        wait_embeddings: true,
        progress: Some(Box::new(move |name, _| {
            sink.lock().unwrap().push(name.to_string());
        })),
        ..Default::default()
    };

    let (_, result) = run_pipeline(repo.path(), None, options).unwrap();

    assert_eq!(result.embeddings, 0);
    assert!(!calls.lock().unwrap().iter().any(|n| n == "Generating embeddings"));
}
