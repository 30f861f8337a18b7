//! Configuration loading and settings.
//!
//! Settings are resolved in order: built-in defaults, then an optional
//! `.axon/config.toml` in the workspace, then `AXON_*` environment
//! variables. Loading never fails hard: a malformed config falls back to
//! defaults with a warning so indexing can proceed.

use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Directory name for all on-disk state (index, config, events).
pub const AXON_DIR: &str = ".axon";

/// Top-level settings for indexing and storage.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Where the graph database lives, relative to the workspace root.
    pub index_path: PathBuf,

    /// Indexing behavior.
    pub indexing: IndexingConfig,

    /// Embedding generation.
    pub embedding: EmbeddingConfig,

    /// Log levels.
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexingConfig {
    /// Glob patterns excluded in addition to .gitignore rules.
    pub ignore_patterns: Vec<String>,

    /// Directory names never descended into.
    pub skip_dirs: Vec<String>,

    /// Parse files in parallel with one task per file.
    pub parallel: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    /// Generate embeddings during indexing.
    pub enabled: bool,

    /// Vector dimension, fixed per run.
    pub dimension: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default level filter (`error`, `warn`, `info`, `debug`, `trace`).
    pub default: String,

    /// Per-module overrides, e.g. `storage = "debug"`.
    pub modules: HashMap<String, String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            index_path: PathBuf::from(AXON_DIR).join("index"),
            indexing: IndexingConfig::default(),
            embedding: EmbeddingConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for IndexingConfig {
    fn default() -> Self {
        Self {
            ignore_patterns: Vec::new(),
            skip_dirs: vec![
                ".git".into(),
                "node_modules".into(),
                "target".into(),
                "__pycache__".into(),
                ".venv".into(),
                "venv".into(),
                "dist".into(),
                "build".into(),
                "_build".into(),
                "deps".into(),
                ".cache".into(),
                ".idea".into(),
            ],
            parallel: true,
        }
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            dimension: 384,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            default: "warn".into(),
            modules: HashMap::new(),
        }
    }
}

impl Settings {
    /// Load settings for a workspace, merging defaults, the workspace
    /// config file, and `AXON_*` environment variables.
    pub fn load(workspace_root: &Path) -> Self {
        let config_file = workspace_root.join(AXON_DIR).join("config.toml");

        let figment = Figment::from(Serialized::defaults(Settings::default()))
            .merge(Toml::file(&config_file))
            .merge(Env::prefixed("AXON_").split("__"));

        match figment.extract() {
            Ok(settings) => settings,
            Err(e) => {
                tracing::warn!("Failed to load config from {}: {e}", config_file.display());
                Settings::default()
            }
        }
    }

    /// Absolute path of the graph database for a workspace.
    pub fn index_path_for(&self, workspace_root: &Path) -> PathBuf {
        workspace_root.join(&self.index_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_settings_have_skip_dirs() {
        let settings = Settings::default();
        assert!(settings.indexing.skip_dirs.iter().any(|d| d == ".git"));
        assert!(settings.indexing.skip_dirs.iter().any(|d| d == "_build"));
        assert!(settings.indexing.parallel);
    }

    #[test]
    fn load_missing_config_falls_back_to_defaults() {
        let tmp = tempfile::TempDir::new().unwrap();
        let settings = Settings::load(tmp.path());
        assert_eq!(settings.embedding.dimension, 384);
        assert!(!settings.embedding.enabled);
    }

    #[test]
    fn load_reads_workspace_toml() {
        let tmp = tempfile::TempDir::new().unwrap();
        let dir = tmp.path().join(AXON_DIR);
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(
            dir.join("config.toml"),
            "[embedding]\nenabled = true\ndimension = 128\n",
        )
        .unwrap();

        let settings = Settings::load(tmp.path());
        assert!(settings.embedding.enabled);
        assert_eq!(settings.embedding.dimension, 128);
    }
}
