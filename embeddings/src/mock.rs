//! Deterministic embedding provider for tests and offline use.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use sha2::{Digest, Sha256};

use crate::Embedding;
use crate::error::{EmbeddingError, Result};
use crate::provider::{EmbeddingProvider, EmbeddingRequest, EmbeddingResponse};
use crate::similarity::normalize;

const MOCK_MODEL: &str = "mock-bag-of-words";

/// An embedding provider that never touches the network.
///
/// Texts registered with [`MockProvider::with_vector`] embed to exactly that
/// vector. Every other text embeds to a normalized hashed bag-of-words vector,
/// so texts sharing words score closer than texts that don't.
pub struct MockProvider {
    dimension: usize,
    fixed: HashMap<String, Embedding>,
    failure: Option<String>,
    delay: Option<Duration>,
    calls: AtomicUsize,
}

impl MockProvider {
    /// Create a mock producing vectors of the given dimension.
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            fixed: HashMap::new(),
            failure: None,
            delay: None,
            calls: AtomicUsize::new(0),
        }
    }

    /// Pin the embedding returned for `text`.
    pub fn with_vector(mut self, text: impl Into<String>, embedding: Embedding) -> Self {
        self.fixed.insert(text.into(), embedding);
        self
    }

    /// Make every call fail with an API error.
    pub fn failing(mut self, message: impl Into<String>) -> Self {
        self.failure = Some(message.into());
        self
    }

    /// Sleep before answering each call.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Number of texts embedded so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn hashed_embedding(&self, text: &str) -> Embedding {
        let mut embedding = vec![0.0f32; self.dimension];
        if self.dimension == 0 {
            return embedding;
        }

        for token in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
        {
            let digest = Sha256::digest(token.to_lowercase().as_bytes());
            let bucket = u64::from_le_bytes([
                digest[0], digest[1], digest[2], digest[3], digest[4], digest[5], digest[6],
                digest[7],
            ]) as usize
                % self.dimension;
            embedding[bucket] += 1.0;
        }

        normalize(&mut embedding);
        embedding
    }
}

#[async_trait]
impl EmbeddingProvider for MockProvider {
    fn name(&self) -> &str {
        "mock"
    }

    fn default_model(&self) -> &str {
        MOCK_MODEL
    }

    async fn embed(&self, request: EmbeddingRequest) -> Result<EmbeddingResponse> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        if let Some(message) = &self.failure {
            return Err(EmbeddingError::ApiRequest(message.clone()));
        }

        self.calls.fetch_add(1, Ordering::SeqCst);

        let embedding = match self.fixed.get(&request.text) {
            Some(embedding) => embedding.clone(),
            None => self.hashed_embedding(&request.text),
        };

        Ok(EmbeddingResponse {
            embedding,
            model: request.model.unwrap_or_else(|| MOCK_MODEL.to_string()),
            tokens_used: Some(request.text.split_whitespace().count() as u64),
        })
    }

    fn is_available(&self) -> bool {
        self.failure.is_none()
    }
}
