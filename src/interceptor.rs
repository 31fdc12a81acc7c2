//! Request and response interceptors
//!
//! The request interceptor runs exactly once before a request can reach the
//! network and decides its routing: short-circuit on a live cache entry,
//! piggyback on an identical in-flight request, or dispatch as canonical.
//! The response interceptor runs once per settled request: it releases the
//! registry entry (broadcasting the outcome to deduplicated waiters) and
//! populates the cache on cacheable success.

use std::sync::Arc;

use serde_json::Value;
use tokio::sync::broadcast;
use tracing::debug;

use crate::cancel::{CancelReason, CancelToken};
use crate::config::RequestPolicy;
use crate::entry::CacheEntry;
use crate::error::ClientCacheError;
use crate::inflight::{ClaimGuard, InFlightRegistry, JoinOutcome, Outcome};
use crate::request::RequestDescriptor;
use crate::stats::CacheMetrics;
use crate::store::CacheStore;

/// How a tagged request is routed after interception.
#[derive(Debug)]
pub(crate) enum Disposition {
    /// Dispatch to the network. The key is present when the request is
    /// cacheable; the claim when it was registered as canonical. Dropping
    /// the claim without settling releases the registry entry with an
    /// error, so an abandoned dispatch never wedges its dedupe key.
    Network {
        cache_key: Option<String>,
        claim: Option<ClaimGuard>,
    },
    /// Satisfied by a live cache entry; the network is never touched.
    FromCache(Value),
    /// An identical request is in flight; await its broadcast outcome.
    Deduplicated(broadcast::Receiver<Outcome>),
}

/// A cloned, tagged request ready for the transport.
#[derive(Debug)]
pub(crate) struct TaggedRequest {
    pub descriptor: RequestDescriptor,
    pub token: CancelToken,
    pub disposition: Disposition,
}

#[derive(Debug, Clone)]
pub(crate) struct RequestInterceptor {
    store: CacheStore,
    registry: Arc<InFlightRegistry>,
    metrics: Arc<CacheMetrics>,
    policy: Arc<RequestPolicy>,
}

impl RequestInterceptor {
    pub(crate) fn new(
        store: CacheStore,
        registry: Arc<InFlightRegistry>,
        metrics: Arc<CacheMetrics>,
        policy: Arc<RequestPolicy>,
    ) -> Self {
        Self {
            store,
            registry,
            metrics,
            policy,
        }
    }

    pub(crate) async fn intercept(&self, descriptor: &RequestDescriptor) -> TaggedRequest {
        let descriptor = descriptor.clone();
        let token = CancelToken::new();

        let mut cache_key = None;
        if !(self.policy.skip_cache)(&descriptor) {
            let key = (self.policy.cache_key_fn)(&descriptor);

            if let Some(entry) = self.store.get(&key).await {
                // Cache hit wins over any dedupe consideration; the request
                // is never registered as canonical.
                self.metrics.record_hit();
                token.trigger(CancelReason::ResolvedFromCache);
                debug!(key = %key, "serving response from cache");
                return TaggedRequest {
                    descriptor,
                    token,
                    disposition: Disposition::FromCache(entry.response),
                };
            }

            self.metrics.record_miss();
            cache_key = Some(key);
        }

        let mut claim = None;
        if !(self.policy.skip_dedupe)(&descriptor) {
            let key = (self.policy.dedupe_key_fn)(&descriptor);

            match self.registry.join_or_claim(&key, token.clone()) {
                JoinOutcome::Joined(rx) => {
                    token.trigger(CancelReason::Deduplicated);
                    return TaggedRequest {
                        descriptor,
                        token,
                        disposition: Disposition::Deduplicated(rx),
                    };
                }
                JoinOutcome::Claimed(guard) => claim = Some(guard),
            }
        }

        TaggedRequest {
            descriptor,
            token,
            disposition: Disposition::Network { cache_key, claim },
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) struct ResponseInterceptor {
    store: CacheStore,
    policy: Arc<RequestPolicy>,
}

impl ResponseInterceptor {
    pub(crate) fn new(store: CacheStore, policy: Arc<RequestPolicy>) -> Self {
        Self { store, policy }
    }

    /// Settles a genuine network round-trip: release the claimed registry
    /// entry unconditionally, then cache a cacheable success.
    pub(crate) async fn settle(
        &self,
        cache_key: Option<&str>,
        claim: Option<ClaimGuard>,
        outcome: Outcome,
    ) -> Outcome {
        if let Some(claim) = claim {
            claim.settle(&outcome);
        }

        if let (Some(key), Ok(response)) = (cache_key, &outcome) {
            self.store
                .set(key, CacheEntry::new(response.clone(), self.policy.ttl))
                .await;
            debug!(key = %key, "cached response");
        }

        outcome
    }

    /// Resolves a deduplicated request from the canonical outcome.
    pub(crate) async fn await_canonical(
        &self,
        mut rx: broadcast::Receiver<Outcome>,
    ) -> Outcome {
        match rx.recv().await {
            Ok(outcome) => outcome,
            Err(_) => Err(ClientCacheError::http(
                "canonical request dropped before settling",
            )),
        }
    }
}
