//! Cache entry type shared by every storage backend

use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A cached response payload with its TTL bookkeeping.
///
/// The payload is opaque to this layer and owned by the entry, never a view
/// into a live network response. Timestamps are millis since the epoch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub response: Value,
    pub timestamp: u64,
    pub expires_at: u64,
}

impl CacheEntry {
    pub fn new(response: Value, ttl: Duration) -> Self {
        let timestamp = now_millis();
        Self {
            response,
            timestamp,
            expires_at: timestamp + ttl.as_millis() as u64,
        }
    }

    /// Expiry is strict: an entry whose `expires_at` equals `now` is
    /// already stale.
    pub fn is_expired(&self, now: u64) -> bool {
        self.expires_at <= now
    }
}

pub(crate) fn now_millis() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
