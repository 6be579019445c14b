//! Error types for the retrieval engine.

use std::path::PathBuf;

use recall_embeddings::{EmbeddingError, GenerationError};
use recall_passages::StoreError;
use thiserror::Error;

/// Result type alias for retrieval operations.
pub type Result<T> = std::result::Result<T, RetrievalError>;

/// Errors that can occur in the retrieval engine.
#[derive(Error, Debug)]
pub enum RetrievalError {
    /// Vectors that must share a length do not, e.g. a store written with a
    /// different embedding model than the one answering queries.
    #[error("dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// The record store exists but could not be read.
    #[error("record store at {} is corrupt: {reason}", path.display())]
    StoreCorrupt { path: PathBuf, reason: String },

    /// The embedding provider failed or timed out.
    #[error("embedding unavailable: {0}")]
    EmbeddingUnavailable(#[source] EmbeddingError),

    /// The caller passed an argument outside its valid range.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Any other record store failure.
    #[error("store error: {0}")]
    Store(#[source] StoreError),

    /// The text generator failed.
    #[error("generation failed: {0}")]
    Generation(#[source] GenerationError),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),
}

impl From<StoreError> for RetrievalError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Corrupt { path, reason } => Self::StoreCorrupt { path, reason },
            StoreError::DimensionMismatch { expected, actual } => {
                Self::DimensionMismatch { expected, actual }
            }
            other => Self::Store(other),
        }
    }
}

impl RetrievalError {
    /// Map an error from the embedding layer. Length mismatches keep their
    /// own variant; everything else means the provider is unavailable.
    pub(crate) fn from_embedding(err: EmbeddingError) -> Self {
        match err {
            EmbeddingError::DimensionMismatch { expected, actual } => {
                Self::DimensionMismatch { expected, actual }
            }
            other => Self::EmbeddingUnavailable(other),
        }
    }
}
