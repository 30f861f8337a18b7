//! Error types for the indexing and storage subsystems.
//!
//! Structured errors via thiserror. Failure handling follows three tiers:
//! best-effort paths (parsers, storage reads, analytics) log at debug and
//! return identity values; pipeline phases recover locally; only walking,
//! structure building, storage initialization, and the final load abort a run.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for pipeline and indexing operations.
#[derive(Error, Debug)]
pub enum IndexError {
    #[error("Failed to read file '{path}': {source}")]
    FileRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Repository root '{path}' is not a directory")]
    InvalidRoot { path: PathBuf },

    #[error("Failed to initialize {language} grammar: {reason}")]
    GrammarInit { language: String, reason: String },

    #[error("Storage operation failed: {0}")]
    Storage(#[from] StorageError),

    #[error("Invalid configuration: {reason}")]
    ConfigError { reason: String },

    #[error("{0}")]
    General(String),
}

/// Errors specific to the graph store adapter.
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Failed to open graph database at '{path}': {cause}")]
    OpenFailed { path: PathBuf, cause: String },

    #[error("Schema creation failed: {cause}")]
    SchemaFailed { cause: String },

    #[error("Bulk load failed during {operation}: {cause}")]
    BulkLoadFailed { operation: String, cause: String },

    #[error("Query failed: {cause}")]
    QueryFailed { cause: String },

    #[error("Storage connection is not initialized")]
    NotInitialized,

    #[error("Storage I/O failed: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },
}

impl From<kuzu::Error> for StorageError {
    fn from(err: kuzu::Error) -> Self {
        StorageError::QueryFailed {
            cause: err.to_string(),
        }
    }
}

/// Result alias for indexing operations.
pub type IndexResult<T> = Result<T, IndexError>;

/// Result alias for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;
