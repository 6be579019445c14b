//! # Embeddings
//!
//! This crate provides the model-facing capabilities the Recall retrieval
//! layer consumes, plus the vector math it scores with.
//!
//! ## Features
//!
//! - **Embedding Generation**: Convert text to dense vectors through an
//!   injected [`EmbeddingProvider`]
//! - **Text Generation**: Prompt a chat model through an injected
//!   [`TextGenerator`]
//! - **Similarity**: Cosine similarity and stable top-k ranking
//! - **Caching**: Avoid re-embedding text that was already seen
//! - **Test Doubles**: Deterministic [`MockProvider`] and [`MockGenerator`]
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                    Embeddings System                            │
//! ├─────────────────────────────────────────────────────────────────┤
//! │  EmbeddingProvider ──► Embedding ──► cosine_similarity          │
//! │       │                                   │                     │
//! │       ▼                                   ▼                     │
//! │  OpenAI/Mock ◄── CachedProvider       rank_top_k                │
//! │                                                                 │
//! │  TextGenerator ──► OpenAI chat / Mock                           │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

pub mod cache;
pub mod error;
pub mod generator;
pub mod mock;
pub mod provider;
pub mod similarity;

pub use cache::{CachedProvider, EmbeddingCache};
pub use error::{EmbeddingError, GenerationError, GenerationResult, Result};
pub use generator::{GenerationRequest, MockGenerator, OpenAIGenerator, TextGenerator};
pub use mock::MockProvider;
pub use provider::{EmbeddingProvider, EmbeddingRequest, EmbeddingResponse, OpenAIProvider};
pub use similarity::{ScoredCandidate, cosine_similarity, rank_top_k};

/// A dense vector embedding.
pub type Embedding = Vec<f32>;
