//! Integration tests for the caching and deduplication pipeline, driven
//! through a counting mock transport so every network dispatch is observable.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::future::join_all;
use serde_json::{json, Value};

use api_client_cache::{
    CacheConfig, CachedClient, CancelToken, ClientCacheError, RequestDescriptor, StorageKind,
    Transport,
};

/// Transport that records every dispatch and serves a fixed payload.
#[derive(Debug)]
struct CountingTransport {
    calls: AtomicUsize,
    response: Value,
    delay: Option<Duration>,
    fail: bool,
}

impl CountingTransport {
    fn new(response: Value) -> Self {
        Self {
            calls: AtomicUsize::new(0),
            response,
            delay: None,
            fail: false,
        }
    }

    fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    fn failing() -> Self {
        Self {
            calls: AtomicUsize::new(0),
            response: Value::Null,
            delay: Some(Duration::from_millis(50)),
            fail: true,
        }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

/// Local wrapper so the counter outlives the client under test.
#[derive(Debug, Clone)]
struct SharedTransport(Arc<CountingTransport>);

#[async_trait]
impl Transport for SharedTransport {
    async fn execute(
        &self,
        _descriptor: &RequestDescriptor,
        token: &CancelToken,
    ) -> Result<Value, ClientCacheError> {
        if let Some(reason) = token.triggered() {
            return Err(ClientCacheError::cancelled(reason.to_string()));
        }

        self.0.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.0.delay {
            tokio::time::sleep(delay).await;
        }
        if self.0.fail {
            return Err(ClientCacheError::http("upstream returned 500"));
        }
        Ok(self.0.response.clone())
    }
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "api_client_cache=debug".into()),
        )
        .try_init();
}

fn wrapped(
    transport: Arc<CountingTransport>,
    config: CacheConfig,
) -> CachedClient<SharedTransport> {
    CachedClient::with_transport(SharedTransport(transport), config).unwrap()
}

#[tokio::test]
async fn scenario_a_miss_then_hit() {
    init_tracing();
    let transport = Arc::new(CountingTransport::new(json!({"id": 1, "name": "Test"})));
    let client = wrapped(
        transport.clone(),
        CacheConfig::default().with_ttl(Duration::from_secs(60)),
    );
    let descriptor = RequestDescriptor::get("/test");

    let first = client.request(&descriptor).await.unwrap();
    assert_eq!(first, json!({"id": 1, "name": "Test"}));

    let stats = client.cache_stats().await;
    assert_eq!(stats.hits, 0);
    assert_eq!(stats.misses, 1);
    assert_eq!(stats.size, 1);

    let second = client.request(&descriptor).await.unwrap();
    assert_eq!(second, first);

    let stats = client.cache_stats().await;
    assert_eq!(stats.hits, 1);
    assert_eq!(stats.misses, 1);
    assert_eq!(stats.size, 1);
    assert_eq!(transport.calls(), 1);
}

#[tokio::test]
async fn scenario_b_concurrent_requests_share_one_network_call() {
    let transport = Arc::new(
        CountingTransport::new(json!({"id": 1})).with_delay(Duration::from_millis(100)),
    );
    let client = wrapped(transport.clone(), CacheConfig::default());
    let descriptor = RequestDescriptor::get("/test");

    let results = join_all([
        client.request(&descriptor),
        client.request(&descriptor),
        client.request(&descriptor),
    ])
    .await;

    assert_eq!(transport.calls(), 1);
    for result in results {
        assert_eq!(result.unwrap(), json!({"id": 1}));
    }
}

#[tokio::test]
async fn scenario_c_post_is_never_cached() {
    let transport = Arc::new(CountingTransport::new(json!({"created": true})));
    let client = wrapped(transport.clone(), CacheConfig::default());
    let descriptor = RequestDescriptor::post("/test").with_body(json!({"name": "X"}));

    client.request(&descriptor).await.unwrap();
    client.request(&descriptor).await.unwrap();

    assert_eq!(transport.calls(), 2);
    let stats = client.cache_stats().await;
    assert_eq!(stats.size, 0);
    assert_eq!(stats.misses, 0);
}

#[tokio::test]
async fn ttl_expiry_is_strict() {
    let transport = Arc::new(CountingTransport::new(json!({"id": 1})));
    let client = wrapped(
        transport.clone(),
        CacheConfig::default().with_ttl(Duration::from_millis(50)),
    );
    let descriptor = RequestDescriptor::get("/test");

    client.request(&descriptor).await.unwrap();
    tokio::time::sleep(Duration::from_millis(80)).await;
    client.request(&descriptor).await.unwrap();

    assert_eq!(transport.calls(), 2);
    let stats = client.cache_stats().await;
    assert_eq!(stats.misses, 2);
    assert_eq!(stats.hits, 0);
}

#[tokio::test]
async fn clear_cache_without_pattern_empties_store() {
    let transport = Arc::new(CountingTransport::new(json!(1)));
    let client = wrapped(transport.clone(), CacheConfig::default());

    client.get("/a").await.unwrap();
    client.get("/b").await.unwrap();
    assert_eq!(client.cache_stats().await.size, 2);

    client.clear_cache(None).await;
    assert_eq!(client.cache_stats().await.size, 0);

    // Cleared entries miss again.
    client.get("/a").await.unwrap();
    assert_eq!(transport.calls(), 3);
}

#[tokio::test]
async fn clear_cache_with_pattern_is_scoped() {
    let transport = Arc::new(CountingTransport::new(json!(1)));
    let client = wrapped(transport.clone(), CacheConfig::default());

    client.get("/players/1").await.unwrap();
    client.get("/players/2").await.unwrap();
    client.get("/teams/1").await.unwrap();

    client.clear_cache(Some("players")).await;

    let stats = client.cache_stats().await;
    assert_eq!(stats.size, 1);
    assert!(stats.keys[0].contains("/teams/1"));
}

#[tokio::test]
async fn cache_stats_is_idempotent() {
    let transport = Arc::new(CountingTransport::new(json!(1)));
    let client = wrapped(transport.clone(), CacheConfig::default());
    client.get("/test").await.unwrap();

    let first = client.cache_stats().await;
    let second = client.cache_stats().await;
    assert_eq!(first, second);
    assert_eq!(transport.calls(), 1);
}

#[tokio::test]
async fn canonical_failure_reaches_all_waiters_and_releases_registry() {
    let transport = Arc::new(CountingTransport::failing());
    let client = wrapped(transport.clone(), CacheConfig::default());
    let descriptor = RequestDescriptor::get("/test");

    let results = join_all([client.request(&descriptor), client.request(&descriptor)]).await;

    assert_eq!(transport.calls(), 1);
    for result in results {
        assert!(matches!(result, Err(ClientCacheError::Http { .. })));
    }

    // The registry entry was released; a retry dispatches again instead of
    // waiting on a request that will never settle.
    let retry = client.request(&descriptor).await;
    assert!(retry.is_err());
    assert_eq!(transport.calls(), 2);
}

#[tokio::test]
async fn abandoned_canonical_request_does_not_wedge_dedupe_key() {
    let transport = Arc::new(
        CountingTransport::new(json!({"id": 1})).with_delay(Duration::from_millis(200)),
    );
    let client = wrapped(transport.clone(), CacheConfig::default());
    let descriptor = RequestDescriptor::get("/slow");

    // The caller gives up while the canonical network call is in flight,
    // dropping the request future before it can settle.
    let abandoned =
        tokio::time::timeout(Duration::from_millis(20), client.request(&descriptor)).await;
    assert!(abandoned.is_err());

    // A later request must claim the key afresh and complete, not hang on
    // a broadcast that will never arrive.
    let retry = tokio::time::timeout(Duration::from_secs(1), client.request(&descriptor))
        .await
        .expect("dedupe key released after canonical future was dropped")
        .unwrap();

    assert_eq!(retry, json!({"id": 1}));
    assert_eq!(transport.calls(), 2);
}

#[tokio::test]
async fn waiter_fails_fast_when_canonical_is_abandoned() {
    let transport = Arc::new(
        CountingTransport::new(json!({"id": 1})).with_delay(Duration::from_millis(200)),
    );
    let client = Arc::new(wrapped(transport.clone(), CacheConfig::default()));
    let descriptor = RequestDescriptor::get("/slow");

    let mut canonical = Box::pin({
        let client = client.clone();
        let descriptor = descriptor.clone();
        async move { client.request(&descriptor).await }
    });
    // Drive the canonical request into its network call.
    assert!(
        tokio::time::timeout(Duration::from_millis(20), canonical.as_mut())
            .await
            .is_err()
    );

    let waiter = tokio::spawn({
        let client = client.clone();
        let descriptor = descriptor.clone();
        async move { client.request(&descriptor).await }
    });
    tokio::time::sleep(Duration::from_millis(20)).await;

    // Abandoning the canonical future surfaces as an error to the waiter
    // instead of leaving it parked forever.
    drop(canonical);
    let outcome = tokio::time::timeout(Duration::from_secs(1), waiter)
        .await
        .expect("waiter resolved after canonical future was dropped")
        .unwrap();
    assert!(matches!(outcome, Err(ClientCacheError::Http { .. })));
    assert_eq!(transport.calls(), 1);
}

#[tokio::test]
async fn prefetch_populates_cache_and_swallows_errors() {
    let transport = Arc::new(CountingTransport::new(json!({"id": 1})));
    let client = wrapped(transport.clone(), CacheConfig::default());
    let descriptor = RequestDescriptor::get("/test");

    client.prefetch(&descriptor).await;
    assert_eq!(client.cache_stats().await.size, 1);

    // The prefetched entry serves the real request.
    client.request(&descriptor).await.unwrap();
    assert_eq!(transport.calls(), 1);

    // A failing prefetch is invisible to the caller.
    let failing = Arc::new(CountingTransport::failing());
    let client = wrapped(failing.clone(), CacheConfig::default());
    client.prefetch(&RequestDescriptor::get("/boom")).await;
    assert_eq!(failing.calls(), 1);
}

#[tokio::test]
async fn session_storage_evicts_oldest_when_full() {
    let transport = Arc::new(CountingTransport::new(json!(1)));
    let client = wrapped(
        transport.clone(),
        CacheConfig::default().with_storage(StorageKind::Session { max_entries: 5 }),
    );

    for i in 0..5 {
        client.get(format!("/resource/{}", i)).await.unwrap();
        // Distinct timestamps so eviction order is deterministic.
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    assert_eq!(client.cache_stats().await.size, 5);

    // The sixth write trips the quota, evicts the oldest 20% (one entry)
    // and lands on retry.
    client.get("/resource/5").await.unwrap();

    let stats = client.cache_stats().await;
    assert_eq!(stats.size, 5);
    assert!(!stats.keys.iter().any(|k| k.contains("/resource/0")));
    assert!(stats.keys.iter().any(|k| k.contains("/resource/5")));
    assert!(stats.keys.iter().any(|k| k.contains("/resource/1")));
}

#[tokio::test]
async fn persistent_storage_survives_client_restart() {
    let dir = tempfile::TempDir::new().unwrap();
    let storage = StorageKind::Persistent {
        dir: dir.path().to_path_buf(),
        max_bytes: 1024 * 1024,
    };
    let transport = Arc::new(CountingTransport::new(json!({"id": 1})));

    {
        let client = wrapped(
            transport.clone(),
            CacheConfig::default().with_storage(storage.clone()),
        );
        client.get("/test").await.unwrap();
    }

    // A fresh client over the same directory serves from disk.
    let client = wrapped(
        transport.clone(),
        CacheConfig::default().with_storage(storage),
    );
    client.get("/test").await.unwrap();

    assert_eq!(transport.calls(), 1);
    let stats = client.cache_stats().await;
    assert_eq!(stats.hits, 1);
}

#[tokio::test]
async fn independent_clients_do_not_share_state() {
    let transport = Arc::new(CountingTransport::new(json!(1)));
    let first = wrapped(transport.clone(), CacheConfig::default());
    let second = wrapped(transport.clone(), CacheConfig::default());

    first.get("/test").await.unwrap();
    second.get("/test").await.unwrap();

    assert_eq!(transport.calls(), 2);
    assert_eq!(first.cache_stats().await.misses, 1);
    assert_eq!(second.cache_stats().await.misses, 1);
}

#[tokio::test]
async fn custom_cache_key_fn_controls_identity() {
    let transport = Arc::new(CountingTransport::new(json!(1)));
    let client = wrapped(
        transport.clone(),
        // Collapse every GET to one identity, ignoring the URL.
        CacheConfig::default().with_cache_key_fn(|d| d.method.to_string()),
    );

    client.get("/a").await.unwrap();
    client.get("/b").await.unwrap();

    assert_eq!(transport.calls(), 1);
    assert_eq!(client.cache_stats().await.hits, 1);
}
