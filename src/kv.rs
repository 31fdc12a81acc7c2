//! Generic key-value cache
//!
//! Standalone cache interface for application code that wants memoization
//! without the HTTP interception path (entity-resolution results, computed
//! lookups). Independent of [`crate::store::CacheStore`] on purpose: no
//! TTL, no namespacing, no quota semantics.

use std::collections::HashMap;
use std::fmt::Debug;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;

#[async_trait]
pub trait KeyValueCache: Send + Sync + Debug {
    async fn get(&self, key: &str) -> Option<Value>;

    async fn set(&self, key: &str, value: Value);

    async fn has(&self, key: &str) -> bool {
        self.get(key).await.is_some()
    }

    /// Returns `true` when the key was present.
    async fn delete(&self, key: &str) -> bool;

    async fn clear(&self);

    async fn keys(&self) -> Vec<String>;
}

/// In-memory [`KeyValueCache`].
#[derive(Debug, Default)]
pub struct MemoryKeyValueCache {
    entries: RwLock<HashMap<String, Value>>,
}

impl MemoryKeyValueCache {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KeyValueCache for MemoryKeyValueCache {
    async fn get(&self, key: &str) -> Option<Value> {
        self.entries.read().await.get(key).cloned()
    }

    async fn set(&self, key: &str, value: Value) {
        self.entries.write().await.insert(key.to_string(), value);
    }

    async fn has(&self, key: &str) -> bool {
        self.entries.read().await.contains_key(key)
    }

    async fn delete(&self, key: &str) -> bool {
        self.entries.write().await.remove(key).is_some()
    }

    async fn clear(&self) {
        self.entries.write().await.clear();
    }

    async fn keys(&self) -> Vec<String> {
        self.entries.read().await.keys().cloned().collect()
    }
}
