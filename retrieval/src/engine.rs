//! Retrieval engine implementation.

use std::collections::BTreeSet;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use recall_embeddings::{
    CachedProvider, EmbeddingCache, EmbeddingError, EmbeddingProvider, EmbeddingRequest,
    MockProvider, OpenAIProvider, rank_top_k,
};
use recall_passages::{Chunker, JsonFileStore, Metadata, PassageRecord, RecordStore};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::{
    EmbeddingConfig, EmbeddingProviderType, QueryConfig, RetrievalConfig, validate_threshold,
};
use crate::error::{Result, RetrievalError};

/// A passage judged relevant to a query.
///
/// Record ids and raw vectors stay inside the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimilarityResult {
    /// The passage text.
    pub content: String,

    /// Cosine similarity to the query.
    pub similarity: f32,

    /// Provenance tag of the passage.
    pub source: String,

    /// Metadata stored with the passage.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Metadata>,
}

/// Outcome of ingesting one document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IngestReport {
    /// Source tag the passages were stored under.
    pub source: String,

    /// Number of passages stored.
    pub chunks: usize,

    /// Ids of the stored records, in passage order.
    pub ids: Vec<String>,
}

/// Statistics about the record store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineStats {
    /// Number of stored passages.
    pub records: usize,

    /// Embedding dimension shared by the records, if any are stored.
    pub dimension: Option<usize>,

    /// Distinct source tags.
    pub sources: usize,
}

/// Finds stored passages relevant to a query, and ingests new documents.
///
/// The engine owns no state of its own between calls: every operation reads
/// the store as it is at that moment.
pub struct RetrievalEngine {
    /// Embedding gateway.
    provider: Arc<dyn EmbeddingProvider>,

    /// Where passage records live.
    store: Arc<dyn RecordStore>,

    /// How documents are split.
    chunker: Box<dyn Chunker>,

    /// Query defaults.
    query: QueryConfig,

    /// Model requested from the provider, if not its default.
    model: Option<String>,

    /// Deadline for each provider call.
    timeout: Duration,
}

impl RetrievalEngine {
    /// Create an engine with default query settings and sentence chunking.
    pub fn new(provider: Arc<dyn EmbeddingProvider>, store: Arc<dyn RecordStore>) -> Self {
        let config = RetrievalConfig::default();
        Self {
            provider,
            store,
            chunker: config.chunking.strategy.build(),
            query: config.query,
            model: None,
            timeout: config.embedding.timeout(),
        }
    }

    /// Build an engine, its provider and its JSON store from configuration.
    pub async fn from_config(config: &RetrievalConfig) -> Result<Self> {
        config.validate()?;

        let provider = build_provider(&config.embedding).await?;
        let store = Arc::new(JsonFileStore::new(&config.store_path));

        info!(
            "Retrieval engine using {} embeddings and store {}",
            provider.name(),
            config.store_path.display()
        );

        Ok(Self::new(provider, store)
            .with_chunker(config.chunking.strategy.build())
            .with_query_defaults(config.query.clone())
            .with_model(config.embedding.model.clone())
            .with_timeout(config.embedding.timeout()))
    }

    /// Use a different chunking strategy for ingestion.
    pub fn with_chunker(mut self, chunker: Box<dyn Chunker>) -> Self {
        self.chunker = chunker;
        self
    }

    /// Set the threshold and top-k used by [`Self::find_relevant`].
    pub fn with_query_defaults(mut self, query: QueryConfig) -> Self {
        self.query = query;
        self
    }

    /// Request a specific embedding model.
    pub fn with_model(mut self, model: Option<String>) -> Self {
        self.model = model;
        self
    }

    /// Set the deadline for each provider call.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// The record store this engine reads and writes.
    pub fn store(&self) -> &Arc<dyn RecordStore> {
        &self.store
    }

    /// The query defaults in effect.
    pub fn query_defaults(&self) -> &QueryConfig {
        &self.query
    }

    /// Find passages relevant to `query` using the configured threshold and
    /// top-k.
    pub async fn find_relevant(&self, query: &str) -> Result<Vec<SimilarityResult>> {
        self.find_relevant_with(query, self.query.threshold, self.query.top_k)
            .await
    }

    /// Find at most `top_k` passages whose similarity to `query` is strictly
    /// greater than `threshold`, best first.
    ///
    /// Equal similarities keep store order. Finding nothing is not an error.
    pub async fn find_relevant_with(
        &self,
        query: &str,
        threshold: f32,
        top_k: usize,
    ) -> Result<Vec<SimilarityResult>> {
        if query.trim().is_empty() {
            return Err(RetrievalError::InvalidInput("query is empty".to_string()));
        }
        validate_threshold(threshold).map_err(RetrievalError::InvalidInput)?;

        debug!("Finding passages for query (threshold {threshold}, top_k {top_k})");

        let query_embedding = self
            .call_provider(self.provider.embed(self.request(query)))
            .await?
            .embedding;

        let records = self.store.load_all().await?;

        let ranked = rank_top_k(
            &query_embedding,
            records.iter().map(|r| r.embedding.as_slice()),
            top_k,
            threshold,
        )
        .map_err(RetrievalError::from_embedding)?;

        debug!(
            "Scored {} records, returning {}",
            records.len(),
            ranked.len()
        );

        // `ranked` indexes are unique, so each record is taken at most once.
        let mut slots: Vec<Option<PassageRecord>> = records.into_iter().map(Some).collect();
        let results = ranked
            .into_iter()
            .filter_map(|scored| {
                slots[scored.index].take().map(|record| SimilarityResult {
                    content: record.content,
                    similarity: scored.score,
                    source: record.source,
                    metadata: record.metadata,
                })
            })
            .collect();

        Ok(results)
    }

    /// Chunk `text`, embed every passage and append them to the store in one
    /// write.
    ///
    /// Either every passage is stored or none is.
    pub async fn ingest(
        &self,
        text: &str,
        source: &str,
        metadata: Option<Metadata>,
    ) -> Result<IngestReport> {
        let passages: Vec<&str> = self.chunker.chunks(text).collect();

        if passages.is_empty() {
            info!("No passages found in {source}, nothing to store");
            return Ok(IngestReport {
                source: source.to_string(),
                chunks: 0,
                ids: Vec::new(),
            });
        }

        debug!(
            "Embedding {} passages from {source} ({} chunking)",
            passages.len(),
            self.chunker.name()
        );

        let requests = passages.iter().map(|p| self.request(p)).collect();
        let responses = self
            .call_provider(self.provider.embed_batch(requests))
            .await?;

        if responses.len() != passages.len() {
            return Err(RetrievalError::EmbeddingUnavailable(
                EmbeddingError::InvalidResponse(format!(
                    "expected {} embeddings, got {}",
                    passages.len(),
                    responses.len()
                )),
            ));
        }

        let records: Vec<PassageRecord> = passages
            .iter()
            .zip(responses)
            .map(|(passage, response)| {
                let record = PassageRecord::new(*passage, response.embedding, source);
                match &metadata {
                    Some(metadata) => record.with_metadata(metadata.clone()),
                    None => record,
                }
            })
            .collect();

        let ids: Vec<String> = records.iter().map(|r| r.id.clone()).collect();
        self.store.append(records).await?;

        info!("Ingested {} passages from {source}", ids.len());

        Ok(IngestReport {
            source: source.to_string(),
            chunks: ids.len(),
            ids,
        })
    }

    /// Get store statistics.
    pub async fn stats(&self) -> Result<EngineStats> {
        let records = self.store.load_all().await?;
        let sources: BTreeSet<&str> = records.iter().map(|r| r.source.as_str()).collect();

        Ok(EngineStats {
            records: records.len(),
            dimension: records.first().map(PassageRecord::dimension),
            sources: sources.len(),
        })
    }

    fn request(&self, text: &str) -> EmbeddingRequest {
        let request = EmbeddingRequest::new(text);
        match &self.model {
            Some(model) => request.with_model(model.clone()),
            None => request,
        }
    }

    /// Await a provider call under the engine's deadline. Any failure,
    /// including the deadline passing, is reported as unavailability.
    async fn call_provider<T, F>(&self, call: F) -> Result<T>
    where
        F: Future<Output = recall_embeddings::Result<T>>,
    {
        match tokio::time::timeout(self.timeout, call).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(err)) => Err(RetrievalError::EmbeddingUnavailable(err)),
            Err(_) => Err(RetrievalError::EmbeddingUnavailable(EmbeddingError::Timeout(
                self.timeout,
            ))),
        }
    }
}

/// Construct the embedding provider described by `config`.
pub async fn build_provider(config: &EmbeddingConfig) -> Result<Arc<dyn EmbeddingProvider>> {
    let base: Arc<dyn EmbeddingProvider> = match config.provider {
        EmbeddingProviderType::OpenAI => {
            let mut provider = OpenAIProvider::new();
            if let Some(model) = &config.model {
                provider = provider.with_model(model.clone());
            }
            if let Some(url) = &config.base_url {
                provider = provider.with_base_url(url.clone());
            }
            if let Some(key) = &config.api_key {
                provider = provider.with_api_key(key.clone());
            }
            Arc::new(provider)
        }
        EmbeddingProviderType::Mock => Arc::new(MockProvider::new(config.mock_dimension)),
    };

    if !config.cache_enabled {
        return Ok(base);
    }

    let cache = match &config.cache_path {
        Some(path) => EmbeddingCache::with_persistence(path, config.cache_max_entries)
            .await
            .map_err(|e| RetrievalError::Config(format!("embedding cache: {e}")))?,
        None => EmbeddingCache::new(config.cache_max_entries),
    };

    Ok(Arc::new(CachedProvider::new(base, cache)))
}
