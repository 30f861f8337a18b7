//! File system watcher driving incremental re-indexing.
//!
//! Filesystem events are debounced into a single re-index call: the
//! watcher thread batches notifications until the repository has been
//! quiet for the debounce window, then runs an incremental pipeline. The
//! pipeline's own hash diff decides what actually gets re-parsed, so the
//! watcher never needs to interpret event payloads.

use crossbeam_channel::{unbounded, RecvTimeoutError};
use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::Settings;
use crate::error::{IndexError, IndexResult};
use crate::indexing::{run_pipeline, PipelineOptions};
use crate::storage::GraphStore;

/// Quiet period before a batch of events triggers a re-index.
const DEBOUNCE: Duration = Duration::from_millis(500);

/// Watches a repository and re-indexes on change until stopped.
pub struct RepoWatcher {
    stop: Arc<AtomicBool>,
    handle: Option<std::thread::JoinHandle<()>>,
    // Dropping the watcher unregisters the OS hooks.
    _watcher: RecommendedWatcher,
}

impl RepoWatcher {
    /// Start watching `repo_path`, loading updates into `storage`.
    pub fn start(
        repo_path: &Path,
        storage: Arc<GraphStore>,
        settings: Arc<Settings>,
    ) -> IndexResult<Self> {
        let (event_tx, event_rx) = unbounded::<()>();

        let mut watcher = notify::recommended_watcher(move |event: notify::Result<notify::Event>| {
            match event {
                Ok(_) => {
                    let _ = event_tx.send(());
                }
                Err(e) => debug!("Watcher event error: {e}"),
            }
        })
        .map_err(|e| IndexError::General(format!("Failed to create watcher: {e}")))?;

        watcher
            .watch(repo_path, RecursiveMode::Recursive)
            .map_err(|e| IndexError::General(format!("Failed to watch {}: {e}", repo_path.display())))?;

        let stop = Arc::new(AtomicBool::new(false));
        let stop_flag = stop.clone();
        let root: PathBuf = repo_path.to_path_buf();

        let handle = std::thread::spawn(move || {
            let mut pending = false;
            loop {
                if stop_flag.load(Ordering::Relaxed) {
                    break;
                }
                match event_rx.recv_timeout(DEBOUNCE) {
                    Ok(()) => pending = true,
                    Err(RecvTimeoutError::Timeout) => {
                        if pending {
                            pending = false;
                            let options = PipelineOptions {
                                settings: settings.clone(),
                                ..Default::default()
                            };
                            if let Err(e) = run_pipeline(&root, Some(storage.clone()), options) {
                                warn!("Incremental re-index failed: {e}");
                            }
                        }
                    }
                    Err(RecvTimeoutError::Disconnected) => break,
                }
            }
        });

        Ok(Self {
            stop,
            handle: Some(handle),
            _watcher: watcher,
        })
    }

    /// Stop the watcher loop and wait for it to exit.
    pub fn stop(mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}
