//! Error types for the caching layer

use thiserror::Error;

/// Storage backend errors.
///
/// Backends signal quota exhaustion through a dedicated kind so callers of
/// the [`crate::store::CacheStore`] interface never need to know which
/// backend is in use.
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    #[error("storage quota exceeded: {message}")]
    QuotaExceeded { message: String },

    #[error("storage I/O error: {message}")]
    Io { message: String },

    #[error("storage serialization error: {message}")]
    Serialization { message: String },
}

impl StoreError {
    pub fn quota_exceeded(message: impl Into<String>) -> Self {
        Self::QuotaExceeded {
            message: message.into(),
        }
    }

    pub fn io(message: impl Into<String>) -> Self {
        Self::Io {
            message: message.into(),
        }
    }

    pub fn serialization(message: impl Into<String>) -> Self {
        Self::Serialization {
            message: message.into(),
        }
    }

    /// Returns true when the error is the quota-exhaustion kind that
    /// triggers eviction-and-retry.
    pub fn is_quota_exceeded(&self) -> bool {
        matches!(self, Self::QuotaExceeded { .. })
    }
}

impl From<std::io::Error> for StoreError {
    fn from(err: std::io::Error) -> Self {
        Self::io(err.to_string())
    }
}

/// Errors surfaced to callers of [`crate::client::CachedClient`].
///
/// The type is `Clone` because the outcome of a canonical request is
/// broadcast to every deduplicated waiter.
#[derive(Debug, Clone, Error)]
pub enum ClientCacheError {
    #[error("configuration error: {message}")]
    Configuration { message: String },

    #[error("http error: {message}")]
    Http { message: String },

    #[error("serialization error: {message}")]
    Serialization { message: String },

    #[error("request cancelled: {reason}")]
    Cancelled { reason: String },
}

impl ClientCacheError {
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    pub fn http(message: impl Into<String>) -> Self {
        Self::Http {
            message: message.into(),
        }
    }

    pub fn serialization(message: impl Into<String>) -> Self {
        Self::Serialization {
            message: message.into(),
        }
    }

    pub fn cancelled(reason: impl Into<String>) -> Self {
        Self::Cancelled {
            reason: reason.into(),
        }
    }
}

impl From<reqwest::Error> for ClientCacheError {
    fn from(err: reqwest::Error) -> Self {
        Self::http(err.to_string())
    }
}

impl From<serde_json::Error> for ClientCacheError {
    fn from(err: serde_json::Error) -> Self {
        Self::serialization(err.to_string())
    }
}
