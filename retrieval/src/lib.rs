//! # Retrieval Engine
//!
//! This crate ties the Recall building blocks together:
//!
//! - **Ingestion**: chunk a document, embed every passage, append the
//!   records to the store in one write
//! - **Retrieval**: embed a query, score every stored passage by cosine
//!   similarity, keep those above a threshold, return the best `k`
//! - **Grounded answers**: hand retrieved passages to a text generator
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                       Retrieval Engine                          │
//! ├─────────────────────────────────────────────────────────────────┤
//! │                                                                 │
//! │  ┌──────────────┐  ┌──────────────┐  ┌──────────────┐           │
//! │  │   Chunker    │  │  Embedding   │  │   Record     │           │
//! │  │              │  │  Provider    │  │   Store      │           │
//! │  └──────────────┘  └──────────────┘  └──────────────┘           │
//! │         │                │                  │                   │
//! │         └────────────────┼──────────────────┘                   │
//! │                          ▼                                      │
//! │                  ┌──────────────┐                               │
//! │                  │  Retrieval   │                               │
//! │                  │   Engine     │                               │
//! │                  └──────────────┘                               │
//! │                          │                                      │
//! │                          ▼                                      │
//! │                  ┌──────────────┐                               │
//! │                  │   Answer     │                               │
//! │                  │  Composer    │                               │
//! │                  └──────────────┘                               │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use recall_retrieval::{RetrievalConfig, RetrievalEngine};
//!
//! let config = RetrievalConfig::load("recall.toml").await?;
//! let engine = RetrievalEngine::from_config(&config).await?;
//!
//! engine.ingest("Penguins live in the south. Gulls live on coasts.", "birds.txt", None).await?;
//! let results = engine.find_relevant("Where do penguins live?").await?;
//! ```

pub mod answer;
pub mod config;
pub mod engine;
pub mod error;

pub use answer::{Answer, AnswerComposer, NO_RELEVANT_ANSWER};
pub use config::{
    ChunkingConfig, DEFAULT_THRESHOLD, DEFAULT_TOP_K, EmbeddingConfig, EmbeddingProviderType,
    GenerationConfig, QueryConfig, RetrievalConfig,
};
pub use engine::{EngineStats, IngestReport, RetrievalEngine, SimilarityResult, build_provider};
pub use error::{Result, RetrievalError};
