//! In-flight request registry
//!
//! Tracks exactly one canonical pending request per dedupe key. Duplicates
//! arriving before the canonical request settles receive a waiter on its
//! outcome instead of dispatching their own network call. The
//! check-then-claim step runs under one lock so the one-canonical-per-key
//! invariant holds on a multi-threaded runtime.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use serde_json::Value;
use tokio::sync::broadcast;
use tracing::{debug, warn};

use crate::cancel::CancelToken;
use crate::error::ClientCacheError;

/// Settled result of a canonical request, cloned to every waiter.
pub(crate) type Outcome = Result<Value, ClientCacheError>;

#[derive(Debug)]
struct InFlightEntry {
    sender: broadcast::Sender<Outcome>,
    /// One handle per request sharing this key, the canonical one included.
    /// Triggering any one of them never disturbs the others' completion.
    handles: Vec<CancelToken>,
}

/// Ownership of a claimed dedupe key.
///
/// The canonical request holds this for the duration of its network call
/// and settles it with the outcome. If the holder's future is dropped
/// mid-flight (a caller timeout, an abandoned task), `Drop` releases the
/// entry with an error so waiters fail instead of hanging and the key is
/// immediately claimable again.
#[derive(Debug)]
pub(crate) struct ClaimGuard {
    registry: Arc<InFlightRegistry>,
    key: Option<String>,
}

impl ClaimGuard {
    /// Releases the entry with the settled outcome, broadcasting it to
    /// every waiter. Consumes the guard so `Drop` cannot release twice.
    pub(crate) fn settle(mut self, outcome: &Outcome) {
        if let Some(key) = self.key.take() {
            self.registry.release(&key, outcome);
        }
    }
}

impl Drop for ClaimGuard {
    fn drop(&mut self) {
        if let Some(key) = self.key.take() {
            warn!(key = %key, "canonical request dropped before settling");
            self.registry.release(
                &key,
                &Err(ClientCacheError::http(
                    "canonical request dropped before settling",
                )),
            );
        }
    }
}

/// Result of asking the registry about a dedupe key.
#[derive(Debug)]
pub(crate) enum JoinOutcome {
    /// No request was in flight; the asking request is now canonical and
    /// owns the entry through the guard.
    Claimed(ClaimGuard),
    /// A canonical request exists; await its broadcast outcome.
    Joined(broadcast::Receiver<Outcome>),
}

#[derive(Debug, Default)]
pub(crate) struct InFlightRegistry {
    entries: Mutex<HashMap<String, InFlightEntry>>,
}

impl InFlightRegistry {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Atomically joins an existing entry or claims the key as canonical.
    ///
    /// Claiming is registration: it only happens after the cache decision,
    /// so a claimed request is guaranteed to dispatch and the entry can
    /// never describe a call that was short-circuited.
    pub(crate) fn join_or_claim(self: &Arc<Self>, key: &str, handle: CancelToken) -> JoinOutcome {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());

        if let Some(entry) = entries.get_mut(key) {
            entry.handles.push(handle);
            debug!(key, waiters = entry.handles.len() - 1, "joining in-flight request");
            return JoinOutcome::Joined(entry.sender.subscribe());
        }

        let (sender, _) = broadcast::channel(1);
        entries.insert(
            key.to_string(),
            InFlightEntry {
                sender,
                handles: vec![handle],
            },
        );
        JoinOutcome::Claimed(ClaimGuard {
            registry: self.clone(),
            key: Some(key.to_string()),
        })
    }

    /// Releases the entry once the canonical request settles, broadcasting
    /// the outcome to every waiter. Reached through [`ClaimGuard`] on both
    /// the settle and drop paths so later requests are never starved.
    fn release(&self, key: &str, outcome: &Outcome) {
        let entry = {
            let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
            entries.remove(key)
        };

        match entry {
            Some(entry) => {
                // Send fails only when no waiter subscribed.
                let _ = entry.sender.send(outcome.clone());
            }
            None => {
                debug_assert!(false, "released a dedupe key that was never registered");
                warn!(key, "released a dedupe key that was never registered");
            }
        }
    }

    #[cfg(test)]
    pub(crate) fn handle_count(&self, key: &str) -> usize {
        self.entries
            .lock()
            .unwrap()
            .get(key)
            .map(|e| e.handles.len())
            .unwrap_or(0)
    }

    #[cfg(test)]
    pub(crate) fn contains(&self, key: &str) -> bool {
        self.entries.lock().unwrap().contains_key(key)
    }
}
