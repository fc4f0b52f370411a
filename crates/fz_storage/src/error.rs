//! Error types for storage operations.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Attempted to read beyond the end of storage.
    #[error("read beyond end of storage: offset {offset}, len {len}, size {size}")]
    ReadPastEnd {
        /// The requested read offset.
        offset: u64,
        /// The requested read length.
        len: usize,
        /// The current storage size.
        size: u64,
    },

    /// The stored bytes cannot be interpreted.
    #[error("storage corrupted: {0}")]
    Corrupted(String),

    /// A store that had to exist already was not found.
    #[error("storage not found: {}", .0.display())]
    NotFound(PathBuf),

    /// Reserving memory for a store failed.
    #[error("unable to reserve {requested} bytes")]
    Allocation {
        /// Number of bytes that could not be reserved.
        requested: u64,
    },
}
