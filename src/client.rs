//! Cached client wrapper and transport seam

use std::fmt::Debug;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::warn;

use crate::cancel::CancelToken;
use crate::config::{CacheConfig, RequestPolicy, StorageKind};
use crate::error::ClientCacheError;
use crate::inflight::InFlightRegistry;
use crate::interceptor::{Disposition, RequestInterceptor, ResponseInterceptor};
use crate::request::RequestDescriptor;
use crate::stats::{CacheMetrics, CacheStats};
use crate::store::{CacheStore, DiskBackend, MemoryBackend, SessionBackend, StorageBackend};

/// Executes a tagged request against the network.
///
/// The seam between the interception pipeline and the wire. The transport
/// must honor the cancellation token: a token triggered by the interceptor
/// means the request was short-circuited and its own network execution
/// must not proceed.
#[async_trait]
pub trait Transport: Send + Sync + Debug {
    async fn execute(
        &self,
        descriptor: &RequestDescriptor,
        token: &CancelToken,
    ) -> Result<Value, ClientCacheError>;
}

/// Default transport over [`reqwest::Client`], exchanging JSON payloads.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn execute(
        &self,
        descriptor: &RequestDescriptor,
        token: &CancelToken,
    ) -> Result<Value, ClientCacheError> {
        if let Some(reason) = token.triggered() {
            return Err(ClientCacheError::cancelled(reason.to_string()));
        }

        let mut request = self
            .client
            .request(descriptor.method.clone(), &descriptor.url);

        if !descriptor.params.is_empty() {
            request = request.query(&descriptor.params);
        }
        if let Some(body) = &descriptor.body {
            request = request.json(body);
        }

        let response = request.send().await?.error_for_status()?;
        Ok(response.json::<Value>().await?)
    }
}

/// An HTTP client decorated with transparent response caching and request
/// deduplication.
///
/// Call sites issue requests through [`CachedClient::request`] and receive
/// responses indistinguishable from direct network calls; the only
/// observable effects of this layer are latency and [`CacheStats`]. The
/// store, registry, and counters are owned by this instance — two wrapped
/// clients never share state.
#[derive(Debug)]
pub struct CachedClient<T: Transport = HttpTransport> {
    transport: T,
    store: CacheStore,
    metrics: Arc<CacheMetrics>,
    request_interceptor: RequestInterceptor,
    response_interceptor: ResponseInterceptor,
}

impl CachedClient<HttpTransport> {
    /// Wraps a `reqwest` client with the interception layer.
    pub fn wrap(client: reqwest::Client, config: CacheConfig) -> Result<Self, ClientCacheError> {
        Self::with_transport(HttpTransport::new(client), config)
    }
}

impl<T: Transport> CachedClient<T> {
    /// Builds the layer over a custom transport.
    pub fn with_transport(transport: T, config: CacheConfig) -> Result<Self, ClientCacheError> {
        config.validate()?;

        let backend: Arc<dyn StorageBackend> = match &config.storage {
            StorageKind::Memory => Arc::new(MemoryBackend::new()),
            StorageKind::Session { max_entries } => Arc::new(SessionBackend::new(*max_entries)),
            StorageKind::Persistent { dir, max_bytes } => Arc::new(
                DiskBackend::new(dir.clone(), *max_bytes)
                    .map_err(|e| ClientCacheError::configuration(e.to_string()))?,
            ),
        };

        let store = CacheStore::new(backend, config.key_prefix.clone());
        let registry = Arc::new(InFlightRegistry::new());
        let metrics = Arc::new(CacheMetrics::default());
        let policy = Arc::new(RequestPolicy::from_config(&config));

        Ok(Self {
            transport,
            store: store.clone(),
            metrics: metrics.clone(),
            request_interceptor: RequestInterceptor::new(
                store.clone(),
                registry.clone(),
                metrics,
                policy.clone(),
            ),
            response_interceptor: ResponseInterceptor::new(store, policy),
        })
    }

    /// Issues a request through the interception pipeline.
    pub async fn request(
        &self,
        descriptor: &RequestDescriptor,
    ) -> Result<Value, ClientCacheError> {
        let tagged = self.request_interceptor.intercept(descriptor).await;

        match tagged.disposition {
            Disposition::FromCache(response) => Ok(response),
            Disposition::Deduplicated(rx) => self.response_interceptor.await_canonical(rx).await,
            Disposition::Network { cache_key, claim } => {
                // `claim` stays live across the network call; if this
                // future is dropped mid-flight its guard releases the
                // registry entry so waiters are not starved.
                let outcome = self
                    .transport
                    .execute(&tagged.descriptor, &tagged.token)
                    .await;
                self.response_interceptor
                    .settle(cache_key.as_deref(), claim, outcome)
                    .await
            }
        }
    }

    /// Convenience GET without params or body.
    pub async fn get(&self, url: impl Into<String>) -> Result<Value, ClientCacheError> {
        self.request(&RequestDescriptor::get(url)).await
    }

    /// Issues a request purely to warm the cache. Errors are swallowed and
    /// logged; prefetch never fails.
    pub async fn prefetch(&self, descriptor: &RequestDescriptor) {
        if let Err(error) = self.request(descriptor).await {
            warn!(url = %descriptor.url, %error, "prefetch failed");
        }
    }

    /// Clears cached responses, optionally only keys matching a pattern.
    pub async fn clear_cache(&self, pattern: Option<&str>) {
        self.store.clear(pattern).await;
    }

    /// Current cache statistics. Never mutates counters or the store.
    pub async fn cache_stats(&self) -> CacheStats {
        let (size, keys) = self.store.snapshot().await;
        CacheStats {
            hits: self.metrics.hits(),
            misses: self.metrics.misses(),
            size,
            keys,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cancel::CancelReason;

    #[tokio::test]
    async fn test_transport_honors_triggered_token() {
        let transport = HttpTransport::new(reqwest::Client::new());
        let token = CancelToken::new();
        token.trigger(CancelReason::ResolvedFromCache);

        let err = transport
            .execute(&RequestDescriptor::get("http://localhost/test"), &token)
            .await
            .unwrap_err();
        assert!(matches!(err, ClientCacheError::Cancelled { .. }));
    }

    #[test]
    fn test_invalid_config_rejected_at_construction() {
        let config = CacheConfig::default().with_key_prefix("");
        let result = CachedClient::wrap(reqwest::Client::new(), config);
        assert!(matches!(
            result,
            Err(ClientCacheError::Configuration { .. })
        ));
    }
}
