//! Client cache configuration

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use reqwest::Method;

use crate::error::ClientCacheError;
use crate::key::{default_cache_key, default_dedupe_key};
use crate::request::RequestDescriptor;

/// Key derivation override.
pub type KeyFn = Arc<dyn Fn(&RequestDescriptor) -> String + Send + Sync>;

/// Predicate returning `true` when a request should skip caching or
/// deduplication.
pub type SkipPredicate = Arc<dyn Fn(&RequestDescriptor) -> bool + Send + Sync>;

/// Which storage backend holds cached responses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageKind {
    /// Volatile process memory (default).
    Memory,
    /// Bounded in-process storage cleared when the session ends.
    Session { max_entries: usize },
    /// Disk-backed storage that survives restarts, with a byte quota.
    Persistent { dir: PathBuf, max_bytes: u64 },
}

/// Configuration for a [`crate::client::CachedClient`].
///
/// Every field has a default; overrides are applied builder-style and the
/// whole struct is validated once at construction of the client.
#[derive(Clone)]
pub struct CacheConfig {
    /// Time-to-live for cached responses.
    pub ttl: Duration,
    pub storage: StorageKind,
    /// Namespace prefix for cache keys in shared storage scopes.
    pub key_prefix: String,
    pub cache_key_fn: Option<KeyFn>,
    pub dedupe_key_fn: Option<KeyFn>,
    /// Default: skip caching for non-GET requests.
    pub skip_cache: Option<SkipPredicate>,
    /// Default: skip deduplication for non-GET/HEAD requests.
    pub skip_dedupe: Option<SkipPredicate>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(300),
            storage: StorageKind::Memory,
            key_prefix: "api_cache".to_string(),
            cache_key_fn: None,
            dedupe_key_fn: None,
            skip_cache: None,
            skip_dedupe: None,
        }
    }
}

impl CacheConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn with_storage(mut self, storage: StorageKind) -> Self {
        self.storage = storage;
        self
    }

    pub fn with_key_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.key_prefix = prefix.into();
        self
    }

    pub fn with_cache_key_fn(
        mut self,
        f: impl Fn(&RequestDescriptor) -> String + Send + Sync + 'static,
    ) -> Self {
        self.cache_key_fn = Some(Arc::new(f));
        self
    }

    pub fn with_dedupe_key_fn(
        mut self,
        f: impl Fn(&RequestDescriptor) -> String + Send + Sync + 'static,
    ) -> Self {
        self.dedupe_key_fn = Some(Arc::new(f));
        self
    }

    pub fn with_skip_cache(
        mut self,
        f: impl Fn(&RequestDescriptor) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.skip_cache = Some(Arc::new(f));
        self
    }

    pub fn with_skip_dedupe(
        mut self,
        f: impl Fn(&RequestDescriptor) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.skip_dedupe = Some(Arc::new(f));
        self
    }

    pub(crate) fn validate(&self) -> Result<(), ClientCacheError> {
        if self.ttl.is_zero() {
            return Err(ClientCacheError::configuration("ttl must be non-zero"));
        }
        if self.key_prefix.is_empty() {
            return Err(ClientCacheError::configuration("key prefix must not be empty"));
        }
        match &self.storage {
            StorageKind::Session { max_entries: 0 } => Err(ClientCacheError::configuration(
                "session storage capacity must be non-zero",
            )),
            StorageKind::Persistent { max_bytes: 0, .. } => Err(ClientCacheError::configuration(
                "persistent storage quota must be non-zero",
            )),
            _ => Ok(()),
        }
    }
}

impl std::fmt::Debug for CacheConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheConfig")
            .field("ttl", &self.ttl)
            .field("storage", &self.storage)
            .field("key_prefix", &self.key_prefix)
            .field("cache_key_fn", &self.cache_key_fn.as_ref().map(|_| "custom"))
            .field("dedupe_key_fn", &self.dedupe_key_fn.as_ref().map(|_| "custom"))
            .field("skip_cache", &self.skip_cache.as_ref().map(|_| "custom"))
            .field("skip_dedupe", &self.skip_dedupe.as_ref().map(|_| "custom"))
            .finish()
    }
}

/// Config resolved against its defaults, consumed by the interceptors.
#[derive(Clone)]
pub(crate) struct RequestPolicy {
    pub ttl: Duration,
    pub cache_key_fn: KeyFn,
    pub dedupe_key_fn: KeyFn,
    pub skip_cache: SkipPredicate,
    pub skip_dedupe: SkipPredicate,
}

impl RequestPolicy {
    pub(crate) fn from_config(config: &CacheConfig) -> Self {
        Self {
            ttl: config.ttl,
            cache_key_fn: config
                .cache_key_fn
                .clone()
                .unwrap_or_else(|| Arc::new(default_cache_key)),
            dedupe_key_fn: config
                .dedupe_key_fn
                .clone()
                .unwrap_or_else(|| Arc::new(default_dedupe_key)),
            skip_cache: config
                .skip_cache
                .clone()
                .unwrap_or_else(|| Arc::new(|d: &RequestDescriptor| d.method != Method::GET)),
            skip_dedupe: config.skip_dedupe.clone().unwrap_or_else(|| {
                Arc::new(|d: &RequestDescriptor| {
                    d.method != Method::GET && d.method != Method::HEAD
                })
            }),
        }
    }
}

impl std::fmt::Debug for RequestPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestPolicy").field("ttl", &self.ttl).finish_non_exhaustive()
    }
}
