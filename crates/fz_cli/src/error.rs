//! CLI error types.

use fz_core::{CoreError, KeyError};
use fz_storage::StorageError;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for CLI commands.
pub type CliResult<T> = Result<T, CliError>;

/// Errors reported by the `fz` binary.
#[derive(Debug, Error)]
pub enum CliError {
    /// A command that reads a store was run without `--path`.
    #[error("store path required for {0}")]
    MissingPath(&'static str),

    /// The directory holds no store.
    #[error("no store found at {}", .0.display())]
    NoStore(PathBuf),

    /// A key argument did not parse.
    #[error("invalid key argument: {0}")]
    Key(#[from] KeyError),

    /// Core error.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// Storage error.
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// JSON output failed.
    #[error(transparent)]
    Json(#[from] serde_json::Error),

    /// `verify` found problems.
    #[error("verification failed with {0} findings")]
    VerifyFailed(u64),
}
