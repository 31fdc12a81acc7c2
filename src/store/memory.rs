//! Volatile in-memory backend using moka

use async_trait::async_trait;
use moka::future::Cache as MokaCache;

use crate::error::StoreError;

use super::backend::StorageBackend;

/// Process-lifetime storage with no quota.
///
/// Entries vanish on process exit. Expiry is handled by the store wrapper,
/// not by moka, so that stats and eviction see the same timestamps the
/// persistent backends do.
#[derive(Debug)]
pub struct MemoryBackend {
    cache: MokaCache<String, String>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self {
            cache: MokaCache::builder().build(),
        }
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl StorageBackend for MemoryBackend {
    async fn read(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.cache.get(key).await)
    }

    async fn write(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.cache.insert(key.to_string(), value.to_string()).await;
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), StoreError> {
        self.cache.remove(key).await;
        Ok(())
    }

    async fn keys(&self) -> Result<Vec<String>, StoreError> {
        self.cache.run_pending_tasks().await;
        Ok(self.cache.iter().map(|(k, _)| k.as_ref().clone()).collect())
    }
}
