//! Persistent disk-backed backend
//!
//! One JSON file per entry, named by the sha256 of the key so arbitrary key
//! strings never reach the filesystem. Survives process restarts. Capacity
//! is a byte quota over the backing directory; a write that would exceed it
//! is rejected with [`StoreError::QuotaExceeded`] and left for the store
//! wrapper's eviction-and-retry to resolve.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tokio::fs;

use crate::error::StoreError;

use super::backend::StorageBackend;

#[derive(Debug, Serialize, Deserialize)]
struct DiskRecord {
    key: String,
    value: String,
}

#[derive(Debug, Clone)]
pub struct DiskBackend {
    dir: PathBuf,
    max_bytes: u64,
}

impl DiskBackend {
    /// Opens (creating if needed) the backing directory.
    pub fn new(dir: impl Into<PathBuf>, max_bytes: u64) -> Result<Self, StoreError> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir, max_bytes })
    }

    fn entry_path(&self, key: &str) -> PathBuf {
        let digest = Sha256::digest(key.as_bytes());
        self.dir.join(format!("{}.json", hex::encode(digest)))
    }

    async fn file_len(path: &Path) -> u64 {
        fs::metadata(path).await.map(|m| m.len()).unwrap_or(0)
    }

    async fn total_bytes(&self) -> Result<u64, StoreError> {
        let mut total = 0u64;
        let mut dir = fs::read_dir(&self.dir).await?;
        while let Some(entry) = dir.next_entry().await? {
            if let Ok(meta) = entry.metadata().await {
                if meta.is_file() {
                    total += meta.len();
                }
            }
        }
        Ok(total)
    }
}

#[async_trait]
impl StorageBackend for DiskBackend {
    async fn read(&self, key: &str) -> Result<Option<String>, StoreError> {
        let path = self.entry_path(key);
        let raw = match fs::read_to_string(&path).await {
            Ok(raw) => raw,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        };

        match serde_json::from_str::<DiskRecord>(&raw) {
            Ok(record) => Ok(Some(record.value)),
            Err(err) => {
                // Corrupt file: treat as absent and drop it.
                tracing::warn!(path = %path.display(), %err, "unreadable cache file, removing");
                let _ = fs::remove_file(&path).await;
                Ok(None)
            }
        }
    }

    async fn write(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let record = DiskRecord {
            key: key.to_string(),
            value: value.to_string(),
        };
        let payload =
            serde_json::to_string(&record).map_err(|e| StoreError::serialization(e.to_string()))?;

        let path = self.entry_path(key);
        let replaced = Self::file_len(&path).await;
        let total = self.total_bytes().await?;

        if total - replaced + payload.len() as u64 > self.max_bytes {
            return Err(StoreError::quota_exceeded(format!(
                "disk storage is at capacity ({} bytes)",
                self.max_bytes
            )));
        }

        fs::write(&path, payload).await?;
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), StoreError> {
        match fs::remove_file(self.entry_path(key)).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }

    async fn keys(&self) -> Result<Vec<String>, StoreError> {
        let mut keys = Vec::new();
        let mut dir = fs::read_dir(&self.dir).await?;

        while let Some(entry) = dir.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let Ok(raw) = fs::read_to_string(&path).await else {
                continue;
            };
            match serde_json::from_str::<DiskRecord>(&raw) {
                Ok(record) => keys.push(record.key),
                Err(err) => {
                    tracing::warn!(path = %path.display(), %err, "skipping unreadable cache file");
                }
            }
        }

        Ok(keys)
    }
}
