//! Integration tests for the Pulse worker
//!
//! Drives full event sequences through the driver against in-memory hosts,
//! with instrumented store/client fakes where ordering matters.

use async_trait::async_trait;
use pulse_worker::clients::{ClientControl, MemoryClients};
use pulse_worker::controller::CacheLifecycleController;
use pulse_worker::driver::{EventDriver, FetchEvent, MessageEvent, WorkerEvent};
use pulse_worker::generation::CacheGeneration;
use pulse_worker::message::{PurgeAck, ReplyPort};
use pulse_worker::net::{FetchRequest, FetchResponse, RequestDestination, ScriptedFetcher};
use pulse_worker::store::{CacheStore, MemoryCacheStore};
use pulse_worker::{WorkerError, WorkerResult};
use std::sync::{Arc, Mutex};

/// Shared operation log for cross-fake ordering assertions
type Trace = Arc<Mutex<Vec<String>>>;

fn record(trace: &Trace, op: impl Into<String>) {
    trace.lock().unwrap().push(op.into());
}

/// Cache store that logs every operation before delegating
struct TracingStore {
    inner: MemoryCacheStore,
    trace: Trace,
}

impl TracingStore {
    fn new(trace: Trace) -> Self {
        Self {
            inner: MemoryCacheStore::new(),
            trace,
        }
    }
}

#[async_trait]
impl CacheStore for TracingStore {
    async fn keys(&self) -> WorkerResult<Vec<String>> {
        record(&self.trace, "keys");
        self.inner.keys().await
    }

    async fn has(&self, name: &str) -> WorkerResult<bool> {
        record(&self.trace, format!("has:{name}"));
        self.inner.has(name).await
    }

    async fn delete(&self, name: &str) -> WorkerResult<bool> {
        record(&self.trace, format!("delete:{name}"));
        self.inner.delete(name).await
    }

    async fn match_url(&self, url: &str) -> WorkerResult<Option<FetchResponse>> {
        record(&self.trace, format!("match:{url}"));
        self.inner.match_url(url).await
    }
}

/// Client registry that logs the handover primitives
struct TracingClients {
    trace: Trace,
}

#[async_trait]
impl ClientControl for TracingClients {
    async fn skip_waiting(&self) -> WorkerResult<()> {
        record(&self.trace, "skip_waiting");
        Ok(())
    }

    async fn claim(&self) -> WorkerResult<()> {
        record(&self.trace, "claim");
        Ok(())
    }
}

/// Store whose deletions always fail, for lifecycle-failure paths
struct BrokenStore {
    inner: MemoryCacheStore,
}

#[async_trait]
impl CacheStore for BrokenStore {
    async fn keys(&self) -> WorkerResult<Vec<String>> {
        self.inner.keys().await
    }

    async fn has(&self, name: &str) -> WorkerResult<bool> {
        self.inner.has(name).await
    }

    async fn delete(&self, name: &str) -> WorkerResult<bool> {
        Err(WorkerError::cache_delete(name, "store detached"))
    }

    async fn match_url(&self, url: &str) -> WorkerResult<Option<FetchResponse>> {
        self.inner.match_url(url).await
    }
}

fn worker(
    stamp: i64,
    store: Arc<dyn CacheStore>,
    fetcher: Arc<ScriptedFetcher>,
    clients: Arc<dyn ClientControl>,
) -> EventDriver {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();

    EventDriver::new(CacheLifecycleController::with_generation(
        CacheGeneration::from_stamp("pulse-cache", stamp),
        "t",
        store,
        fetcher,
        clients,
    ))
}

mod lifecycle_tests {
    use super::*;

    #[tokio::test]
    async fn single_generation_after_each_activate() {
        let store = Arc::new(MemoryCacheStore::new());
        store.create_cache("pulse-cache-100");
        store.create_cache("pulse-cache-200");
        // The host opens the current generation's cache; the worker itself
        // never writes
        store.create_cache("pulse-cache-1000");

        // First worker version comes and goes
        let mut first = worker(
            1000,
            store.clone(),
            Arc::new(ScriptedFetcher::new()),
            Arc::new(MemoryClients::new()),
        );
        first.dispatch(WorkerEvent::Install).await.unwrap();
        first.dispatch(WorkerEvent::Activate).await.unwrap();
        assert_eq!(
            store.keys().await.unwrap(),
            vec!["pulse-cache-1000".to_string()]
        );

        // A redeploy supersedes it; the new activation leaves only the
        // newest generation behind
        store.create_cache("pulse-cache-2000");
        let mut second = worker(
            2000,
            store.clone(),
            Arc::new(ScriptedFetcher::new()),
            Arc::new(MemoryClients::new()),
        );
        second.dispatch(WorkerEvent::Install).await.unwrap();
        second.dispatch(WorkerEvent::Activate).await.unwrap();
        assert_eq!(
            store.keys().await.unwrap(),
            vec!["pulse-cache-2000".to_string()]
        );
    }

    #[tokio::test]
    async fn claim_happens_only_after_every_deletion() {
        let trace: Trace = Arc::new(Mutex::new(Vec::new()));
        let store = Arc::new(TracingStore::new(trace.clone()));
        store.inner.create_cache("pulse-cache-100");
        store.inner.create_cache("pulse-cache-200");
        store.inner.create_cache("pulse-cache-300");

        let mut driver = worker(
            1000,
            store,
            Arc::new(ScriptedFetcher::new()),
            Arc::new(TracingClients {
                trace: trace.clone(),
            }),
        );
        driver.dispatch(WorkerEvent::Install).await.unwrap();
        driver.dispatch(WorkerEvent::Activate).await.unwrap();

        let ops = trace.lock().unwrap().clone();
        let claim_at = ops.iter().position(|op| op == "claim").unwrap();
        let deletions: Vec<usize> = ops
            .iter()
            .enumerate()
            .filter(|(_, op)| op.starts_with("delete:"))
            .map(|(i, _)| i)
            .collect();

        assert_eq!(deletions.len(), 3);
        assert!(deletions.iter().all(|&i| i < claim_at));
        // Enumeration precedes every deletion
        let keys_at = ops.iter().position(|op| op == "keys").unwrap();
        assert!(deletions.iter().all(|&i| i > keys_at));
    }

    #[tokio::test]
    async fn failed_deletion_fails_activation_without_claim() {
        let store = Arc::new(BrokenStore {
            inner: MemoryCacheStore::new(),
        });
        store.inner.create_cache("pulse-cache-100");
        let clients = Arc::new(MemoryClients::new());

        let mut driver = worker(
            1000,
            store,
            Arc::new(ScriptedFetcher::new()),
            clients.clone(),
        );
        driver.dispatch(WorkerEvent::Install).await.unwrap();

        let result = driver.dispatch(WorkerEvent::Activate).await;
        assert!(matches!(result, Err(WorkerError::CacheDelete { .. })));
        assert!(!clients.claimed());
    }

    #[tokio::test]
    async fn out_of_order_lifecycle_is_rejected() {
        let mut driver = worker(
            1000,
            Arc::new(MemoryCacheStore::new()),
            Arc::new(ScriptedFetcher::new()),
            Arc::new(MemoryClients::new()),
        );

        let result = driver.dispatch(WorkerEvent::Activate).await;
        assert!(matches!(
            result,
            Err(WorkerError::LifecycleViolation { .. })
        ));
    }
}

mod fetch_tests {
    use super::*;

    #[tokio::test]
    async fn navigation_never_consults_cache_when_network_succeeds() {
        let trace: Trace = Arc::new(Mutex::new(Vec::new()));
        let store = Arc::new(TracingStore::new(trace.clone()));
        let fetcher = Arc::new(ScriptedFetcher::new());
        fetcher.route(
            "https://pulse.app/",
            FetchResponse::ok("https://pulse.app/", "index"),
        );

        let mut driver = worker(
            1000,
            store,
            fetcher.clone(),
            Arc::new(MemoryClients::new()),
        );
        driver.dispatch(WorkerEvent::Install).await.unwrap();
        driver.dispatch(WorkerEvent::Activate).await.unwrap();
        trace.lock().unwrap().clear();

        let (event, rx) = FetchEvent::new(FetchRequest::navigation("https://pulse.app/"));
        driver.dispatch(WorkerEvent::Fetch(event)).await.unwrap();
        let response = rx.await.unwrap().unwrap();
        assert_eq!(response.body, b"index");

        // The cache-busted fetch succeeded; the store saw nothing at all
        assert!(trace.lock().unwrap().is_empty());
        assert!(fetcher.requests()[0].url.contains("?t="));
    }

    #[tokio::test]
    async fn offline_navigation_rejects_without_touching_cache() {
        let trace: Trace = Arc::new(Mutex::new(Vec::new()));
        let store = Arc::new(TracingStore::new(trace.clone()));
        let fetcher = Arc::new(ScriptedFetcher::new());
        fetcher.set_offline(true);

        let mut driver = worker(1000, store, fetcher.clone(), Arc::new(MemoryClients::new()));

        let (event, rx) = FetchEvent::new(FetchRequest::navigation("https://pulse.app/"));
        driver.dispatch(WorkerEvent::Fetch(event)).await.unwrap();

        // Both network attempts rejected; the response settles as an error,
        // never a synthesized empty response
        assert!(matches!(
            rx.await.unwrap(),
            Err(WorkerError::NetworkUnavailable { .. })
        ));
        assert_eq!(fetcher.requests().len(), 2);
        assert!(trace.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn resource_fallback_reaches_cache_then_misses() {
        let trace: Trace = Arc::new(Mutex::new(Vec::new()));
        let store = Arc::new(TracingStore::new(trace.clone()));
        let fetcher = Arc::new(ScriptedFetcher::new());
        fetcher.set_offline(true);

        let mut driver = worker(1000, store, fetcher, Arc::new(MemoryClients::new()));

        let (event, rx) = FetchEvent::new(FetchRequest::resource(
            "https://pulse.app/app.js",
            RequestDestination::Script,
        ));
        driver.dispatch(WorkerEvent::Fetch(event)).await.unwrap();

        assert!(matches!(
            rx.await.unwrap(),
            Err(WorkerError::ResourceUnavailable { .. })
        ));
        assert_eq!(
            trace.lock().unwrap().as_slice(),
            ["match:https://pulse.app/app.js"]
        );
    }
}

mod purge_tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn clear_cache_empties_store_and_acks() {
        let store = Arc::new(MemoryCacheStore::new());
        let mut driver = worker(
            1000,
            store.clone(),
            Arc::new(ScriptedFetcher::new()),
            Arc::new(MemoryClients::new()),
        );
        driver.dispatch(WorkerEvent::Install).await.unwrap();
        driver.dispatch(WorkerEvent::Activate).await.unwrap();
        store.create_cache("pulse-cache-1000");
        store.create_cache("pulse-cache-999");

        let (port, mut rx) = ReplyPort::channel();
        driver
            .dispatch(WorkerEvent::Message(MessageEvent::new(
                json!({ "type": "CLEAR_CACHE" }),
                vec![port],
            )))
            .await
            .unwrap();

        // The current generation goes too, and the ack has the exact
        // wire shape clients expect
        assert_eq!(store.cache_count(), 0);
        let ack = rx.recv().await.unwrap();
        assert_eq!(serde_json::to_value(ack).unwrap(), json!({ "success": true }));
    }

    #[tokio::test]
    async fn ack_goes_to_the_first_port_only() {
        let store = Arc::new(MemoryCacheStore::new());
        let mut driver = worker(
            1000,
            store,
            Arc::new(ScriptedFetcher::new()),
            Arc::new(MemoryClients::new()),
        );

        let (first, mut first_rx) = ReplyPort::channel();
        let (second, mut second_rx) = ReplyPort::channel();
        driver
            .dispatch(WorkerEvent::Message(MessageEvent::new(
                json!({ "type": "CLEAR_CACHE" }),
                vec![first, second],
            )))
            .await
            .unwrap();

        assert_eq!(first_rx.try_recv().unwrap(), PurgeAck::ok());
        assert!(second_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn no_store_writes_across_the_full_event_sequence() {
        let trace: Trace = Arc::new(Mutex::new(Vec::new()));
        let store = Arc::new(TracingStore::new(trace.clone()));
        store.inner.create_cache("pulse-cache-100");
        let fetcher = Arc::new(ScriptedFetcher::new());
        fetcher.set_offline(true);

        let mut driver = worker(
            1000,
            store,
            fetcher,
            Arc::new(TracingClients {
                trace: trace.clone(),
            }),
        );
        driver.dispatch(WorkerEvent::Install).await.unwrap();
        driver.dispatch(WorkerEvent::Activate).await.unwrap();

        let (event, rx) = FetchEvent::new(FetchRequest::resource(
            "https://pulse.app/app.js",
            RequestDestination::Script,
        ));
        driver.dispatch(WorkerEvent::Fetch(event)).await.unwrap();
        assert!(rx.await.unwrap().is_err());

        let (port, _rx) = ReplyPort::channel();
        driver
            .dispatch(WorkerEvent::Message(MessageEvent::new(
                json!({ "type": "CLEAR_CACHE" }),
                vec![port],
            )))
            .await
            .unwrap();

        // install -> activate -> fetch(miss) -> clear: reads and deletes
        // only, zero writes anywhere in the sequence
        let allowed = ["keys", "delete:", "match:", "has:", "skip_waiting", "claim"];
        for op in trace.lock().unwrap().iter() {
            assert!(
                allowed.iter().any(|prefix| op.starts_with(prefix)),
                "unexpected store operation: {op}"
            );
        }
    }
}
