//! # Passages
//!
//! Everything on the storage side of Recall: turning documents into
//! passages, the record shape persisted for each passage, and the stores
//! that hold those records.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                       Passage Storage                           │
//! ├─────────────────────────────────────────────────────────────────┤
//! │  text ──► Chunker ──► passages ──(embed)──► PassageRecord       │
//! │             │                                     │             │
//! │             ▼                                     ▼             │
//! │  Sentence/Paragraph                 RecordStore (JSON file,     │
//! │                                                  memory)        │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

pub mod chunker;
pub mod error;
pub mod record;
pub mod storage;

pub use chunker::{Chunker, ChunkingStrategy, ParagraphChunker, SentenceChunker};
pub use error::{Result, StoreError};
pub use record::{Metadata, MetadataValue, PassageRecord};
pub use storage::{JsonFileStore, MemoryStore, RecordStore};
