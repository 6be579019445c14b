//! Error types for the embeddings system.

use thiserror::Error;

/// Result type alias for embedding operations.
pub type Result<T> = std::result::Result<T, EmbeddingError>;

/// Errors that can occur in the embeddings system.
#[derive(Error, Debug)]
pub enum EmbeddingError {
    /// Provider not configured.
    #[error("{provider} provider not configured: missing API key")]
    ProviderNotConfigured { provider: String },

    /// API request failed.
    #[error("API request failed: {0}")]
    ApiRequest(String),

    /// Invalid response from provider.
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// Rate limit exceeded.
    #[error("rate limit exceeded, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    /// Two vectors that must share a length do not.
    #[error("dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// The provider did not answer in time.
    #[error("embedding request timed out after {0:?}")]
    Timeout(std::time::Duration),

    /// Cache error.
    #[error("cache error: {0}")]
    Cache(String),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP error.
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Result type alias for text generation.
pub type GenerationResult<T> = std::result::Result<T, GenerationError>;

/// Errors that can occur while generating text.
#[derive(Error, Debug)]
pub enum GenerationError {
    /// Generator not configured.
    #[error("{provider} generator not configured: missing API key")]
    NotConfigured { provider: String },

    /// Chat request failed.
    #[error("chat request failed: {0}")]
    Request(String),

    /// Rate limit exceeded.
    #[error("rate limit exceeded, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    /// Invalid response from the generator.
    #[error("invalid chat response: {0}")]
    InvalidResponse(String),

    /// HTTP error.
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
}

/// A non-success HTTP status from an OpenAI-compatible endpoint.
#[derive(Debug)]
pub(crate) enum StatusError {
    RateLimited { retry_after_secs: u64 },
    Failed(String),
}

impl From<StatusError> for EmbeddingError {
    fn from(err: StatusError) -> Self {
        match err {
            StatusError::RateLimited { retry_after_secs } => Self::RateLimited { retry_after_secs },
            StatusError::Failed(message) => Self::ApiRequest(message),
        }
    }
}

impl From<StatusError> for GenerationError {
    fn from(err: StatusError) -> Self {
        match err {
            StatusError::RateLimited { retry_after_secs } => Self::RateLimited { retry_after_secs },
            StatusError::Failed(message) => Self::Request(message),
        }
    }
}
