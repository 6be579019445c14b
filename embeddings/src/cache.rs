//! Embedding cache so repeated text is embedded once.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tokio::fs;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::Embedding;
use crate::error::{EmbeddingError, Result};
use crate::provider::{EmbeddingProvider, EmbeddingRequest, EmbeddingResponse};

/// Cache entry for an embedding.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    /// Hash of the model and text that were embedded.
    pub key: String,

    /// The embedding vector.
    pub embedding: Embedding,

    /// Model used to generate the embedding.
    pub model: String,

    /// Insertion sequence number; lower is older.
    pub sequence: u64,
}

#[derive(Default)]
struct CacheState {
    entries: HashMap<String, CacheEntry>,
    next_sequence: u64,
}

/// Bounded cache of embeddings keyed by `(text, model)`.
pub struct EmbeddingCache {
    state: RwLock<CacheState>,

    /// Path for persistent cache storage.
    cache_path: Option<PathBuf>,

    /// Maximum cache size.
    max_entries: usize,

    /// Number of times the cache file has been written.
    writes: AtomicUsize,
}

impl EmbeddingCache {
    /// Create a new in-memory cache.
    pub fn new(max_entries: usize) -> Self {
        Self {
            state: RwLock::new(CacheState::default()),
            cache_path: None,
            max_entries,
            writes: AtomicUsize::new(0),
        }
    }

    /// Create a cache persisted to a JSON file, loading it if present.
    pub async fn with_persistence(path: impl AsRef<Path>, max_entries: usize) -> Result<Self> {
        let cache = Self {
            state: RwLock::new(CacheState::default()),
            cache_path: Some(path.as_ref().to_path_buf()),
            max_entries,
            writes: AtomicUsize::new(0),
        };
        cache.load().await?;
        Ok(cache)
    }

    /// Stable hash of the model and text.
    fn hash_key(text: &str, model: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(model.as_bytes());
        hasher.update([0u8]);
        hasher.update(text.as_bytes());
        hasher
            .finalize()
            .iter()
            .map(|b| format!("{b:02x}"))
            .collect()
    }

    /// Get an embedding from the cache.
    pub async fn get(&self, text: &str, model: &str) -> Option<Embedding> {
        let key = Self::hash_key(text, model);
        let state = self.state.read().await;
        state.entries.get(&key).map(|e| e.embedding.clone())
    }

    /// Put an embedding in the cache, evicting the oldest entry when full.
    pub async fn put(&self, text: &str, model: &str, embedding: Embedding) -> Result<()> {
        self.put_many(vec![(text.to_string(), model.to_string(), embedding)])
            .await
    }

    /// Put several `(text, model, embedding)` entries, writing the cache file
    /// once for the whole set.
    pub async fn put_many(&self, items: Vec<(String, String, Embedding)>) -> Result<()> {
        if self.max_entries == 0 || items.is_empty() {
            return Ok(());
        }

        {
            let mut state = self.state.write().await;
            for (text, model, embedding) in items {
                let key = Self::hash_key(&text, &model);
                if !state.entries.contains_key(&key) {
                    Self::evict_to(&mut state, self.max_entries - 1);
                }

                let sequence = state.next_sequence;
                state.next_sequence += 1;
                state.entries.insert(
                    key.clone(),
                    CacheEntry {
                        key,
                        embedding,
                        model,
                        sequence,
                    },
                );
            }
            debug!("Cache holds {} embeddings", state.entries.len());
        }

        self.save().await
    }

    /// Drop the oldest entries until at most `limit` remain.
    fn evict_to(state: &mut CacheState, limit: usize) {
        while state.entries.len() > limit {
            let Some(oldest_key) = state
                .entries
                .values()
                .min_by_key(|e| e.sequence)
                .map(|e| e.key.clone())
            else {
                break;
            };
            state.entries.remove(&oldest_key);
        }
    }

    /// Number of cached embeddings.
    pub async fn len(&self) -> usize {
        self.state.read().await.entries.len()
    }

    /// Whether the cache holds nothing.
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Save cache to disk.
    async fn save(&self) -> Result<()> {
        let Some(path) = &self.cache_path else {
            return Ok(());
        };

        let content = {
            let state = self.state.read().await;
            let mut entries: Vec<&CacheEntry> = state.entries.values().collect();
            entries.sort_by_key(|e| e.sequence);
            serde_json::to_string(&entries)?
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await?;
        }

        // Write beside the target and rename, so a crash never leaves a
        // half-written cache file behind.
        let mut temp_name = path
            .file_name()
            .map(std::ffi::OsStr::to_os_string)
            .unwrap_or_default();
        temp_name.push(".tmp");
        let temp_path = path.with_file_name(temp_name);
        fs::write(&temp_path, content).await?;
        fs::rename(&temp_path, path).await?;

        self.writes.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    #[cfg(test)]
    fn writes(&self) -> usize {
        self.writes.load(Ordering::Relaxed)
    }

    /// Load cache from disk.
    async fn load(&self) -> Result<()> {
        let Some(path) = &self.cache_path else {
            return Ok(());
        };

        let content = match fs::read_to_string(path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(e.into()),
        };

        let entries: Vec<CacheEntry> = serde_json::from_str(&content)
            .map_err(|e| EmbeddingError::Cache(format!("{}: {e}", path.display())))?;

        let mut state = self.state.write().await;
        for entry in entries {
            state.next_sequence = state.next_sequence.max(entry.sequence + 1);
            state.entries.insert(entry.key.clone(), entry);
        }
        Self::evict_to(&mut state, self.max_entries);

        info!("Loaded {} cache entries from {}", state.entries.len(), path.display());
        Ok(())
    }
}

/// A provider wrapper that serves repeated texts from an [`EmbeddingCache`].
pub struct CachedProvider<P> {
    provider: P,
    cache: EmbeddingCache,
}

impl<P> CachedProvider<P>
where
    P: EmbeddingProvider,
{
    /// Create a new cached provider.
    pub fn new(provider: P, cache: EmbeddingCache) -> Self {
        Self { provider, cache }
    }

    /// Get the underlying cache.
    pub fn cache(&self) -> &EmbeddingCache {
        &self.cache
    }

    /// Get the wrapped provider.
    pub fn inner(&self) -> &P {
        &self.provider
    }

    fn model_for(&self, request: &EmbeddingRequest) -> String {
        request
            .model
            .clone()
            .unwrap_or_else(|| self.provider.default_model().to_string())
    }
}

#[async_trait]
impl<P> EmbeddingProvider for CachedProvider<P>
where
    P: EmbeddingProvider,
{
    fn name(&self) -> &str {
        self.provider.name()
    }

    fn default_model(&self) -> &str {
        self.provider.default_model()
    }

    async fn embed(&self, request: EmbeddingRequest) -> Result<EmbeddingResponse> {
        let model = self.model_for(&request);

        if let Some(embedding) = self.cache.get(&request.text, &model).await {
            debug!("Cache hit for embedding");
            return Ok(EmbeddingResponse {
                embedding,
                model,
                tokens_used: None,
            });
        }

        let text = request.text.clone();
        let response = self.provider.embed(request).await?;
        if let Err(e) = self.cache.put(&text, &model, response.embedding.clone()).await {
            warn!("Failed to cache embedding: {e}");
        }

        Ok(response)
    }

    async fn embed_batch(&self, requests: Vec<EmbeddingRequest>) -> Result<Vec<EmbeddingResponse>> {
        let mut slots: Vec<Option<EmbeddingResponse>> = Vec::with_capacity(requests.len());
        let mut misses = Vec::new();
        let mut miss_slots = Vec::new();

        for request in requests {
            let model = self.model_for(&request);
            match self.cache.get(&request.text, &model).await {
                Some(embedding) => slots.push(Some(EmbeddingResponse {
                    embedding,
                    model,
                    tokens_used: None,
                })),
                None => {
                    miss_slots.push(slots.len());
                    slots.push(None);
                    misses.push(request);
                }
            }
        }

        if !misses.is_empty() {
            debug!("Embedding {} uncached texts of {}", misses.len(), slots.len());
            let keys: Vec<(String, String)> = misses
                .iter()
                .map(|r| (r.text.clone(), self.model_for(r)))
                .collect();
            let responses = self.provider.embed_batch(misses).await?;

            if responses.len() != keys.len() {
                return Err(EmbeddingError::InvalidResponse(format!(
                    "expected {} embeddings, got {}",
                    keys.len(),
                    responses.len()
                )));
            }

            let mut fresh = Vec::with_capacity(keys.len());
            for ((slot, (text, model)), response) in
                miss_slots.into_iter().zip(keys).zip(responses)
            {
                fresh.push((text, model, response.embedding.clone()));
                slots[slot] = Some(response);
            }
            if let Err(e) = self.cache.put_many(fresh).await {
                warn!("Failed to cache embeddings: {e}");
            }
        }

        slots
            .into_iter()
            .map(|slot| {
                slot.ok_or_else(|| EmbeddingError::Cache("batch slot left unfilled".to_string()))
            })
            .collect()
    }

    fn is_available(&self) -> bool {
        self.provider.is_available()
    }
}
