//! Storage backend trait

use std::fmt::Debug;

use async_trait::async_trait;

use crate::error::StoreError;

/// Raw key-value storage underneath [`super::CacheStore`].
///
/// Backends exchange raw JSON strings so the trait stays dyn-compatible;
/// entry serialization, namespacing, TTL checks, and quota recovery all
/// live in the store wrapper. A backend with bounded capacity signals a
/// rejected write with [`StoreError::QuotaExceeded`].
#[async_trait]
pub trait StorageBackend: Send + Sync + Debug {
    /// Reads the raw value for a key, `None` when absent.
    async fn read(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Writes a raw value for a key, replacing any existing value.
    async fn write(&self, key: &str, value: &str) -> Result<(), StoreError>;

    /// Removes a key. Removing an absent key is not an error.
    async fn remove(&self, key: &str) -> Result<(), StoreError>;

    /// Lists every key currently stored, including keys outside this
    /// layer's namespace when the backend scope is shared.
    async fn keys(&self) -> Result<Vec<String>, StoreError>;
}
