//! Cooperative cancellation for short-circuited requests
//!
//! A token is attached to every tagged request. The request interceptor
//! decides its state; the transport consults it before dispatching. A
//! triggered token is a local routing mechanism, not a caller-visible
//! failure: callers of the wrapped client always receive the cached value or
//! the canonical outcome instead.

use std::sync::{Arc, OnceLock};

/// Why a request's own network execution was cancelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelReason {
    /// A live cache entry satisfied the request.
    ResolvedFromCache,
    /// An identical request is already in flight; this one piggybacks on it.
    Deduplicated,
}

impl std::fmt::Display for CancelReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CancelReason::ResolvedFromCache => write!(f, "resolved from cache"),
            CancelReason::Deduplicated => write!(f, "deduplicated"),
        }
    }
}

/// A cancellation handle shared between the interceptor, the in-flight
/// registry, and the transport.
///
/// Triggering is one-shot: the first reason wins, later triggers are no-ops.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    reason: Arc<OnceLock<CancelReason>>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn trigger(&self, reason: CancelReason) {
        let _ = self.reason.set(reason);
    }

    pub fn triggered(&self) -> Option<CancelReason> {
        self.reason.get().copied()
    }
}
