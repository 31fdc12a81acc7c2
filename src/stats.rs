//! Hit/miss accounting and the stats snapshot

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Monotonic hit/miss counters owned by one client instance.
///
/// Misses are recorded at interception time, when the cache lookup decision
/// is made, never at response time.
#[derive(Debug, Default)]
pub(crate) struct CacheMetrics {
    hits: AtomicU64,
    misses: AtomicU64,
}

impl CacheMetrics {
    pub(crate) fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    pub(crate) fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }
}

/// Point-in-time view of the cache.
///
/// `hits`/`misses` accumulate for the lifetime of the client instance;
/// `size`/`keys` reflect the live store contents at the moment of the call.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub size: usize,
    pub keys: Vec<String>,
}
