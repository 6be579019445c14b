//! Record stores.
//!
//! A [`RecordStore`] holds the full, ordered collection of passage records.
//! Reads always load everything; writes always replace everything. There is
//! no locking: two processes appending to the same file race, and the last
//! writer wins.

use std::collections::HashSet;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::fs;
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::error::{Result, StoreError};
use crate::record::{MetadataValue, PassageRecord};

/// Durable home for passage records.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Every persisted record, in insertion order. An absent store is empty.
    async fn load_all(&self) -> Result<Vec<PassageRecord>>;

    /// Replace the persisted collection with exactly `records`.
    async fn save_all(&self, records: Vec<PassageRecord>) -> Result<()>;

    /// Add records after the existing ones and persist before returning.
    async fn append(&self, records: Vec<PassageRecord>) -> Result<()> {
        let mut all = self.load_all().await?;
        all.extend(records);
        self.save_all(all).await
    }

    /// Number of persisted records.
    async fn len(&self) -> Result<usize> {
        Ok(self.load_all().await?.len())
    }

    /// Whether the store holds no records.
    async fn is_empty(&self) -> Result<bool> {
        Ok(self.len().await? == 0)
    }
}

/// Check the invariants a collection must satisfy before it is written:
/// non-empty content, unique ids, finite numbers and one shared embedding
/// dimension.
pub fn validate_records(records: &[PassageRecord]) -> Result<()> {
    let mut ids = HashSet::with_capacity(records.len());
    let dimension = records.first().map(PassageRecord::dimension);

    for record in records {
        if record.content.trim().is_empty() {
            return Err(StoreError::InvalidRecord {
                id: record.id.clone(),
                reason: "content is empty".to_string(),
            });
        }
        if !ids.insert(record.id.as_str()) {
            return Err(StoreError::InvalidRecord {
                id: record.id.clone(),
                reason: "duplicate id".to_string(),
            });
        }
        if !record.embedding.iter().all(|x| x.is_finite()) {
            return Err(StoreError::InvalidRecord {
                id: record.id.clone(),
                reason: "embedding contains a non-finite component".to_string(),
            });
        }
        let metadata_finite = record
            .metadata
            .as_ref()
            .is_none_or(|metadata| metadata.values().all(MetadataValue::is_finite));
        if !metadata_finite {
            return Err(StoreError::InvalidRecord {
                id: record.id.clone(),
                reason: "metadata contains a non-finite number".to_string(),
            });
        }
        match dimension {
            Some(expected) if record.dimension() != expected => {
                return Err(StoreError::DimensionMismatch {
                    expected,
                    actual: record.dimension(),
                });
            }
            _ => {}
        }
    }

    Ok(())
}

/// On-disk layout of a [`JsonFileStore`].
#[derive(Debug, Default, Serialize, Deserialize)]
struct StoreFile {
    records: Vec<PassageRecord>,
}

/// A record store backed by a single JSON file.
///
/// Writes go to a sibling temp file which is then renamed over the target,
/// so readers never observe a half-written file.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    /// Create a store handle for the file at `path`. Nothing is touched on
    /// disk until the first write.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(std::ffi::OsStr::to_os_string)
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    fn corrupt(&self, reason: impl Into<String>) -> StoreError {
        StoreError::Corrupt {
            path: self.path.clone(),
            reason: reason.into(),
        }
    }
}

#[async_trait]
impl RecordStore for JsonFileStore {
    async fn load_all(&self) -> Result<Vec<PassageRecord>> {
        let content = match fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("No record store at {}, starting empty", self.path.display());
                return Ok(Vec::new());
            }
            Err(e) => return Err(self.corrupt(format!("unreadable: {e}"))),
        };

        let file: StoreFile =
            serde_json::from_str(&content).map_err(|e| self.corrupt(e.to_string()))?;

        debug!(
            "Loaded {} records from {}",
            file.records.len(),
            self.path.display()
        );
        Ok(file.records)
    }

    async fn save_all(&self, records: Vec<PassageRecord>) -> Result<()> {
        validate_records(&records)?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| StoreError::CreateDirectory(format!("{}: {e}", parent.display())))?;
        }

        let count = records.len();
        let content = serde_json::to_string(&StoreFile { records })?;

        let temp_path = self.temp_path();
        fs::write(&temp_path, &content)
            .await
            .map_err(|e| StoreError::WriteFile(format!("{}: {e}", temp_path.display())))?;

        fs::rename(&temp_path, &self.path)
            .await
            .map_err(|e| StoreError::WriteFile(format!("{}: {e}", self.path.display())))?;

        info!("Saved {count} records to {}", self.path.display());
        Ok(())
    }
}

/// A record store that lives only in memory.
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: RwLock<Vec<PassageRecord>>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store pre-filled with `records`.
    pub fn with_records(records: Vec<PassageRecord>) -> Result<Self> {
        validate_records(&records)?;
        Ok(Self {
            records: RwLock::new(records),
        })
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn load_all(&self) -> Result<Vec<PassageRecord>> {
        Ok(self.records.read().await.clone())
    }

    async fn save_all(&self, records: Vec<PassageRecord>) -> Result<()> {
        validate_records(&records)?;
        *self.records.write().await = records;
        Ok(())
    }
}
