//! Cache store: namespaced, TTL-aware storage over pluggable backends
//!
//! The store owns everything the backends do not: key namespacing, entry
//! serialization, lazy expiry, pattern-scoped clearing, and the
//! quota-recovery policy (evict the oldest fifth of this layer's entries,
//! retry the write once, then drop it silently). Caching is best-effort;
//! no store operation ever fails the request that triggered it.

mod backend;
mod disk;
mod memory;
mod session;

pub use backend::StorageBackend;
pub use disk::DiskBackend;
pub use memory::MemoryBackend;
pub use session::SessionBackend;

use std::sync::Arc;

use tracing::{debug, warn};

use crate::entry::{now_millis, CacheEntry};

/// Fraction of namespace entries evicted when a backend reports
/// quota exhaustion.
const QUOTA_EVICTION_FRACTION: f64 = 0.2;

#[derive(Debug, Clone)]
pub struct CacheStore {
    backend: Arc<dyn StorageBackend>,
    prefix: String,
}

impl CacheStore {
    pub fn new(backend: Arc<dyn StorageBackend>, prefix: impl Into<String>) -> Self {
        Self {
            backend,
            prefix: prefix.into(),
        }
    }

    fn namespaced(&self, key: &str) -> String {
        format!("{}:{}", self.prefix, key)
    }

    fn strip_prefix<'a>(&self, namespaced: &'a str) -> Option<&'a str> {
        namespaced
            .strip_prefix(&self.prefix)
            .and_then(|rest| rest.strip_prefix(':'))
    }

    /// Keys in this layer's namespace, un-prefixed.
    async fn namespace_keys(&self) -> Vec<String> {
        match self.backend.keys().await {
            Ok(keys) => keys
                .iter()
                .filter_map(|k| self.strip_prefix(k))
                .map(str::to_string)
                .collect(),
            Err(err) => {
                warn!(%err, "failed to list cache keys");
                Vec::new()
            }
        }
    }

    /// Returns a live entry, or `None`.
    ///
    /// Expired entries are evicted on access; read and deserialize failures
    /// are treated as misses.
    pub async fn get(&self, key: &str) -> Option<CacheEntry> {
        let namespaced = self.namespaced(key);
        let raw = match self.backend.read(&namespaced).await {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(err) => {
                warn!(key, %err, "cache read failed, treating as miss");
                return None;
            }
        };

        let entry: CacheEntry = match serde_json::from_str(&raw) {
            Ok(entry) => entry,
            Err(err) => {
                warn!(key, %err, "undeserializable cache entry, evicting");
                let _ = self.backend.remove(&namespaced).await;
                return None;
            }
        };

        if entry.is_expired(now_millis()) {
            debug!(key, "evicting expired cache entry");
            let _ = self.backend.remove(&namespaced).await;
            return None;
        }

        Some(entry)
    }

    /// Writes an entry, recovering from quota exhaustion by evicting the
    /// oldest entries and retrying exactly once.
    pub async fn set(&self, key: &str, entry: CacheEntry) {
        let payload = match serde_json::to_string(&entry) {
            Ok(payload) => payload,
            Err(err) => {
                warn!(key, %err, "failed to serialize cache entry");
                return;
            }
        };

        let namespaced = self.namespaced(key);
        match self.backend.write(&namespaced, &payload).await {
            Ok(()) => {}
            Err(err) if err.is_quota_exceeded() => {
                warn!(key, %err, "cache storage full, evicting oldest entries");
                self.evict_oldest().await;

                if let Err(err) = self.backend.write(&namespaced, &payload).await {
                    warn!(key, %err, "dropping cache write after eviction retry");
                }
            }
            Err(err) => {
                warn!(key, %err, "dropping cache write");
            }
        }
    }

    /// Removes a single entry.
    pub async fn delete(&self, key: &str) {
        if let Err(err) = self.backend.remove(&self.namespaced(key)).await {
            warn!(key, %err, "failed to remove cache entry");
        }
    }

    /// Removes entries in this layer's namespace.
    ///
    /// With no pattern the whole namespace is cleared. A pattern is matched
    /// against the un-prefixed key, as a regex when it parses and as a
    /// substring otherwise.
    pub async fn clear(&self, pattern: Option<&str>) {
        let matcher = pattern.map(|p| match regex::Regex::new(p) {
            Ok(re) => Matcher::Regex(re),
            Err(err) => {
                warn!(pattern = p, %err, "invalid clear pattern, matching as substring");
                Matcher::Substring(p.to_string())
            }
        });

        for key in self.namespace_keys().await {
            let matched = match &matcher {
                None => true,
                Some(Matcher::Regex(re)) => re.is_match(&key),
                Some(Matcher::Substring(s)) => key.contains(s),
            };
            if matched {
                self.delete(&key).await;
            }
        }
    }

    /// Snapshot of live entries: `(size, keys)`.
    ///
    /// Read-only: expired entries are excluded but not evicted, so calling
    /// this repeatedly observes the same state.
    pub async fn snapshot(&self) -> (usize, Vec<String>) {
        let now = now_millis();
        let mut live = Vec::new();

        for key in self.namespace_keys().await {
            if let Ok(Some(raw)) = self.backend.read(&self.namespaced(&key)).await {
                if let Ok(entry) = serde_json::from_str::<CacheEntry>(&raw) {
                    if !entry.is_expired(now) {
                        live.push(key);
                    }
                }
            }
        }

        (live.len(), live)
    }

    /// Evicts the oldest entries in this namespace, by `timestamp`
    /// ascending. Entries that fail to parse count as oldest.
    async fn evict_oldest(&self) {
        let mut stamped: Vec<(u64, String)> = Vec::new();

        for key in self.namespace_keys().await {
            let timestamp = match self.backend.read(&self.namespaced(&key)).await {
                Ok(Some(raw)) => serde_json::from_str::<CacheEntry>(&raw)
                    .map(|e| e.timestamp)
                    .unwrap_or(0),
                _ => 0,
            };
            stamped.push((timestamp, key));
        }

        if stamped.is_empty() {
            return;
        }

        stamped.sort();
        let count = ((stamped.len() as f64) * QUOTA_EVICTION_FRACTION).ceil() as usize;
        let count = count.max(1);

        for (_, key) in stamped.into_iter().take(count) {
            debug!(key = %key, "evicting entry for quota recovery");
            self.delete(&key).await;
        }
    }
}

enum Matcher {
    Regex(regex::Regex),
    Substring(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::time::Duration;

    fn memory_store() -> CacheStore {
        CacheStore::new(Arc::new(MemoryBackend::new()), "api_cache")
    }

    fn entry_at(timestamp: u64, expires_at: u64) -> CacheEntry {
        CacheEntry {
            response: json!({"id": 1}),
            timestamp,
            expires_at,
        }
    }

    #[tokio::test]
    async fn test_set_and_get() {
        let store = memory_store();
        store
            .set("k", CacheEntry::new(json!({"id": 1}), Duration::from_secs(60)))
            .await;

        let entry = store.get("k").await.unwrap();
        assert_eq!(entry.response, json!({"id": 1}));
    }

    #[tokio::test]
    async fn test_expired_entry_evicted_on_access() {
        let store = memory_store();
        let now = now_millis();
        store.set("k", entry_at(now, now)).await;

        assert!(store.get("k").await.is_none());
        // Physically gone, not just filtered.
        let (size, _) = store.snapshot().await;
        assert_eq!(size, 0);
    }

    #[tokio::test]
    async fn test_namespacing_isolates_foreign_keys() {
        let backend = Arc::new(MemoryBackend::new());
        backend.write("unrelated:key", "data").await.unwrap();

        let store = CacheStore::new(backend.clone(), "api_cache");
        store
            .set("k", CacheEntry::new(json!(1), Duration::from_secs(60)))
            .await;

        store.clear(None).await;

        let (size, _) = store.snapshot().await;
        assert_eq!(size, 0);
        assert_eq!(
            backend.read("unrelated:key").await.unwrap(),
            Some("data".to_string())
        );
    }

    #[tokio::test]
    async fn test_clear_with_pattern() {
        let store = memory_store();
        for key in ["players:1", "players:2", "teams:1"] {
            store
                .set(key, CacheEntry::new(json!(1), Duration::from_secs(60)))
                .await;
        }

        store.clear(Some("players")).await;

        let (size, keys) = store.snapshot().await;
        assert_eq!(size, 1);
        assert_eq!(keys, vec!["teams:1".to_string()]);
    }

    #[tokio::test]
    async fn test_snapshot_is_read_only() {
        let store = memory_store();
        store
            .set("k", CacheEntry::new(json!(1), Duration::from_secs(60)))
            .await;

        let first = store.snapshot().await;
        let second = store.snapshot().await;
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_quota_eviction_removes_oldest_fifth() {
        let backend = Arc::new(SessionBackend::new(5));
        let store = CacheStore::new(backend, "api_cache");

        let far = now_millis() + 60_000;
        for i in 1..=5u64 {
            store.set(&format!("k{}", i), entry_at(i, far)).await;
        }

        // Store is full; the next write evicts ceil(5 * 0.2) = 1 oldest
        // entry and retries.
        store.set("k6", entry_at(100, far)).await;

        assert!(store.get("k1").await.is_none());
        assert!(store.get("k2").await.is_some());
        assert!(store.get("k6").await.is_some());
    }

    #[tokio::test]
    async fn test_single_slot_quota_recovery() {
        let backend = Arc::new(SessionBackend::new(1));
        let store = CacheStore::new(backend, "api_cache");

        let far = now_millis() + 60_000;
        store.set("old", entry_at(1, far)).await;
        store.set("new", entry_at(2, far)).await;

        assert!(store.get("old").await.is_none());
        assert!(store.get("new").await.is_some());
    }

    #[tokio::test]
    async fn test_quota_recovery_on_disk_backend() {
        let dir = tempfile::TempDir::new().unwrap();
        let far = now_millis() + 60_000;

        // Fill the directory without a meaningful quota, then reopen it
        // with a quota that cannot fit one more entry.
        {
            let backend = Arc::new(DiskBackend::new(dir.path(), u64::MAX).unwrap());
            let store = CacheStore::new(backend, "api_cache");
            for i in 1..=5u64 {
                store.set(&format!("k{}", i), entry_at(i, far)).await;
            }
        }

        let used: u64 = std::fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter_map(|e| e.metadata().ok())
            .map(|m| m.len())
            .sum();

        let backend = Arc::new(DiskBackend::new(dir.path(), used + 10).unwrap());
        let store = CacheStore::new(backend, "api_cache");
        store.set("k6", entry_at(100, far)).await;

        assert!(store.get("k1").await.is_none());
        assert!(store.get("k2").await.is_some());
        assert!(store.get("k6").await.is_some());
    }

    #[tokio::test]
    async fn test_undeserializable_entry_is_a_miss() {
        let backend = Arc::new(MemoryBackend::new());
        backend.write("api_cache:bad", "not json").await.unwrap();

        let store = CacheStore::new(backend, "api_cache");
        assert!(store.get("bad").await.is_none());
    }
}
