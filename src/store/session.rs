//! Session-scoped bounded backend

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::StoreError;

use super::backend::StorageBackend;

/// Bounded in-process storage scoped to the current session.
///
/// Unlike [`super::MemoryBackend`] the capacity is a hard quota: a write
/// that would grow the map past `max_entries` is rejected with
/// [`StoreError::QuotaExceeded`], which the store wrapper recovers from by
/// evicting the oldest entries and retrying once. Entries do not survive
/// the session (process lifetime).
#[derive(Debug)]
pub struct SessionBackend {
    entries: RwLock<HashMap<String, String>>,
    max_entries: usize,
}

impl SessionBackend {
    pub fn new(max_entries: usize) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            max_entries,
        }
    }
}

#[async_trait]
impl StorageBackend for SessionBackend {
    async fn read(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn write(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let mut entries = self.entries.write().await;

        if !entries.contains_key(key) && entries.len() >= self.max_entries {
            return Err(StoreError::quota_exceeded(format!(
                "session storage is at capacity ({} entries)",
                self.max_entries
            )));
        }

        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), StoreError> {
        self.entries.write().await.remove(key);
        Ok(())
    }

    async fn keys(&self) -> Result<Vec<String>, StoreError> {
        Ok(self.entries.read().await.keys().cloned().collect())
    }
}
