//! Error types for passage storage.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Errors that can occur reading or writing a record store.
#[derive(Error, Debug)]
pub enum StoreError {
    /// The backing data exists but could not be read as a record collection.
    #[error("record store at {} is corrupt: {reason}", path.display())]
    Corrupt { path: PathBuf, reason: String },

    /// Records with different embedding lengths would share a store.
    #[error("dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// A record breaks a store invariant.
    #[error("invalid record {id}: {reason}")]
    InvalidRecord { id: String, reason: String },

    /// Failed to create the store directory.
    #[error("failed to create directory: {0}")]
    CreateDirectory(String),

    /// Failed to write the store file.
    #[error("failed to write file: {0}")]
    WriteFile(String),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
