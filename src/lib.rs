//! api-client-cache
//!
//! Transparent HTTP response caching and request deduplication for JSON API
//! clients, with support for:
//! - TTL-based expiry across pluggable storage backends (memory, bounded
//!   session storage, quota-limited persistent disk storage)
//! - Deduplication of concurrent identical in-flight requests
//! - Best-effort degradation when persistent storage fills up
//! - Hit/miss statistics and pattern-scoped cache clearing
//!
//! Call sites wrap an existing `reqwest::Client` once and issue requests
//! through the returned [`CachedClient`]; interception is invisible to them.
//!
//! ```no_run
//! use api_client_cache::{CacheConfig, CachedClient, RequestDescriptor};
//!
//! # async fn run() -> Result<(), api_client_cache::ClientCacheError> {
//! let client = CachedClient::wrap(reqwest::Client::new(), CacheConfig::default())?;
//!
//! // First call reaches the network; identical calls within the TTL are
//! // served from the cache.
//! let players = client.get("https://api.example.com/players").await?;
//! let again = client.request(&RequestDescriptor::get("https://api.example.com/players")).await?;
//! assert_eq!(players, again);
//! # Ok(())
//! # }
//! ```

pub mod cancel;
pub mod client;
pub mod config;
pub mod entry;
pub mod error;
pub mod key;
pub mod kv;
pub mod request;
pub mod stats;
pub mod store;

mod inflight;
mod interceptor;

pub use cancel::{CancelReason, CancelToken};
pub use client::{CachedClient, HttpTransport, Transport};
pub use config::{CacheConfig, KeyFn, SkipPredicate, StorageKind};
pub use entry::CacheEntry;
pub use error::{ClientCacheError, StoreError};
pub use key::{canonical_json, default_cache_key, default_dedupe_key, query_cache_key};
pub use kv::{KeyValueCache, MemoryKeyValueCache};
pub use request::RequestDescriptor;
pub use stats::CacheStats;
pub use store::{CacheStore, DiskBackend, MemoryBackend, SessionBackend, StorageBackend};
