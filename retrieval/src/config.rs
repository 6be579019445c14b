//! Configuration for the retrieval engine.
//!
//! Loaded from TOML; every key is optional and falls back to the defaults
//! below.

use std::path::{Path, PathBuf};
use std::time::Duration;

use recall_passages::ChunkingStrategy;
use serde::{Deserialize, Serialize};

use crate::error::{Result, RetrievalError};

/// Default similarity a passage must exceed to be returned.
pub const DEFAULT_THRESHOLD: f32 = 0.5;

/// Default number of passages returned per query.
pub const DEFAULT_TOP_K: usize = 4;

/// Configuration for the retrieval engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    /// Path of the JSON record store.
    pub store_path: PathBuf,

    /// Embedding provider configuration.
    pub embedding: EmbeddingConfig,

    /// Query defaults.
    pub query: QueryConfig,

    /// Chunking configuration.
    pub chunking: ChunkingConfig,

    /// Text generation configuration for grounded answers.
    pub generation: GenerationConfig,
}

impl RetrievalConfig {
    /// Create a new configuration with default values.
    pub fn new(store_path: impl Into<PathBuf>) -> Self {
        Self {
            store_path: store_path.into(),
            embedding: EmbeddingConfig::default(),
            query: QueryConfig::default(),
            chunking: ChunkingConfig::default(),
            generation: GenerationConfig::default(),
        }
    }

    /// Parse a TOML document.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Self =
            toml::from_str(content).map_err(|e| RetrievalError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a TOML configuration file.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            RetrievalError::Config(format!("failed to read {}: {e}", path.display()))
        })?;
        Self::from_toml_str(&content)
    }

    /// Reject values the engine cannot run with.
    pub fn validate(&self) -> Result<()> {
        validate_threshold(self.query.threshold).map_err(RetrievalError::Config)?;
        if self.embedding.timeout_secs == 0 {
            return Err(RetrievalError::Config(
                "embedding.timeout_secs must be greater than zero".to_string(),
            ));
        }
        if self.embedding.provider == EmbeddingProviderType::Mock
            && self.embedding.mock_dimension == 0
        {
            return Err(RetrievalError::Config(
                "embedding.mock_dimension must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Set the embedding configuration.
    pub fn with_embedding(mut self, config: EmbeddingConfig) -> Self {
        self.embedding = config;
        self
    }

    /// Set the query configuration.
    pub fn with_query(mut self, config: QueryConfig) -> Self {
        self.query = config;
        self
    }

    /// Set the chunking strategy.
    pub fn with_chunking(mut self, strategy: ChunkingStrategy) -> Self {
        self.chunking.strategy = strategy;
        self
    }
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self::new("recall-store.json")
    }
}

/// Check that a threshold is a finite value in `[-1, 1]`.
pub(crate) fn validate_threshold(threshold: f32) -> std::result::Result<(), String> {
    if threshold.is_finite() && (-1.0..=1.0).contains(&threshold) {
        Ok(())
    } else {
        Err(format!("threshold must be within [-1, 1], got {threshold}"))
    }
}

/// Configuration for the embedding provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    /// Which provider to use.
    pub provider: EmbeddingProviderType,

    /// Model to use for embeddings.
    pub model: Option<String>,

    /// Base URL of an OpenAI-compatible API.
    pub base_url: Option<String>,

    /// API key; `OPENAI_API_KEY` is used when unset.
    pub api_key: Option<String>,

    /// Seconds to wait for the provider before failing the operation.
    pub timeout_secs: u64,

    /// Whether to cache embeddings.
    pub cache_enabled: bool,

    /// Maximum cache size.
    pub cache_max_entries: usize,

    /// Where to persist the cache; in memory only when unset.
    pub cache_path: Option<PathBuf>,

    /// Vector length produced by the mock provider.
    pub mock_dimension: usize,
}

impl EmbeddingConfig {
    /// Provider call timeout.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: EmbeddingProviderType::OpenAI,
            model: None,
            base_url: None,
            api_key: None,
            timeout_secs: 30,
            cache_enabled: true,
            cache_max_entries: 10000,
            cache_path: None,
            mock_dimension: 64,
        }
    }
}

/// Type of embedding provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmbeddingProviderType {
    /// OpenAI-compatible embeddings API.
    #[serde(rename = "openai")]
    OpenAI,
    /// Deterministic offline vectors.
    Mock,
}

/// Defaults applied to queries that don't override them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryConfig {
    /// Similarity a passage must strictly exceed.
    pub threshold: f32,

    /// Maximum number of passages to return.
    pub top_k: usize,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_THRESHOLD,
            top_k: DEFAULT_TOP_K,
        }
    }
}

/// Configuration for chunking.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingConfig {
    /// How documents are split into passages.
    pub strategy: ChunkingStrategy,
}

/// Configuration for grounded answer generation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    /// Chat model to use.
    pub model: Option<String>,

    /// Base URL of an OpenAI-compatible API.
    pub base_url: Option<String>,

    /// API key; `OPENAI_API_KEY` is used when unset.
    pub api_key: Option<String>,

    /// System instruction sent with every question.
    pub system_prompt: String,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            model: None,
            base_url: None,
            api_key: None,
            system_prompt: "Answer the question using only the provided passages. \
                            If they do not contain the answer, say so."
                .to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_empty_document_uses_defaults() {
        let config = RetrievalConfig::from_toml_str("").unwrap();
        assert_eq!(config, RetrievalConfig::default());
        assert_eq!(config.query.threshold, 0.5);
        assert_eq!(config.query.top_k, 4);
        assert_eq!(config.embedding.timeout(), Duration::from_secs(30));
    }

    #[test]
    fn test_partial_document_overrides() {
        let config = RetrievalConfig::from_toml_str(
            r#"
            store_path = "data/store.json"

            [embedding]
            provider = "mock"
            mock_dimension = 16
            cache_enabled = false

            [query]
            top_k = 2

            [chunking]
            strategy = "paragraph"
            "#,
        )
        .unwrap();

        assert_eq!(config.store_path, PathBuf::from("data/store.json"));
        assert_eq!(config.embedding.provider, EmbeddingProviderType::Mock);
        assert_eq!(config.embedding.mock_dimension, 16);
        assert!(!config.embedding.cache_enabled);
        assert_eq!(config.query.top_k, 2);
        assert_eq!(config.query.threshold, DEFAULT_THRESHOLD);
        assert_eq!(config.chunking.strategy, ChunkingStrategy::Paragraph);
    }

    #[test]
    fn test_api_keys_are_read_per_section() {
        let config = RetrievalConfig::from_toml_str(
            r#"
            [embedding]
            api_key = "embed-key"

            [generation]
            api_key = "chat-key"
            base_url = "http://localhost:8080/v1"
            "#,
        )
        .unwrap();

        assert_eq!(config.embedding.api_key.as_deref(), Some("embed-key"));
        assert_eq!(config.generation.api_key.as_deref(), Some("chat-key"));
        assert_eq!(
            config.generation.base_url.as_deref(),
            Some("http://localhost:8080/v1")
        );
        assert_eq!(RetrievalConfig::default().embedding.api_key, None);
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        for doc in [
            "[query]\nthreshold = 1.5",
            "[query]\nthreshold = -2.0",
            "[embedding]\ntimeout_secs = 0",
            "[embedding]\nprovider = \"mock\"\nmock_dimension = 0",
            "[embedding]\nprovider = \"carrier-pigeon\"",
        ] {
            let err = RetrievalConfig::from_toml_str(doc).unwrap_err();
            assert!(matches!(err, RetrievalError::Config(_)), "{doc}: {err:?}");
        }
    }

    #[tokio::test]
    async fn test_load_from_file() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let path = temp_dir.path().join("recall.toml");
        tokio::fs::write(&path, "[query]\nthreshold = 0.25\n")
            .await
            .unwrap();

        let config = RetrievalConfig::load(&path).await.unwrap();
        assert_eq!(config.query.threshold, 0.25);

        let missing = RetrievalConfig::load(temp_dir.path().join("nope.toml")).await;
        assert!(matches!(missing, Err(RetrievalError::Config(_))));
    }
}
