//! Network fetch seam
//!
//! Request/response shapes for intercepted fetches plus the [`Fetcher`]
//! trait the host injects. The worker never talks to a socket itself; it
//! only decides which fetches to issue and in what order.

use crate::error::{WorkerError, WorkerResult};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Mutex, PoisonError};

/// How the request was initiated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RequestMode {
    /// Top-level navigation
    Navigate,
    SameOrigin,
    NoCors,
    Cors,
}

/// What kind of resource the request is for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestDestination {
    Document,
    Script,
    Style,
    Image,
    Font,
    Worker,
    Other,
}

/// How intermediaries' HTTP caches may be consulted for a fetch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CacheDirective {
    /// Standard HTTP cache semantics
    Default,
    /// Bypass every HTTP cache on the way to the origin
    NoStore,
}

/// An intercepted request from a controlled client
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchRequest {
    pub url: String,
    pub mode: RequestMode,
    pub destination: RequestDestination,
    pub cache: CacheDirective,
}

impl FetchRequest {
    /// A top-level navigation request
    pub fn navigation(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            mode: RequestMode::Navigate,
            destination: RequestDestination::Document,
            cache: CacheDirective::Default,
        }
    }

    /// A subresource request
    pub fn resource(url: impl Into<String>, destination: RequestDestination) -> Self {
        Self {
            url: url.into(),
            mode: RequestMode::NoCors,
            destination,
            cache: CacheDirective::Default,
        }
    }

    /// Whether this request targets a navigable document
    ///
    /// Either signal is enough: navigate mode for top-level navigations,
    /// document destination for frames.
    pub fn is_navigation(&self) -> bool {
        self.mode == RequestMode::Navigate || self.destination == RequestDestination::Document
    }

    /// Copy of this request with a different cache directive
    pub fn with_cache(mut self, cache: CacheDirective) -> Self {
        self.cache = cache;
        self
    }
}

/// A settled network (or cache) response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchResponse {
    pub url: String,
    pub status: u16,
    pub body: Vec<u8>,
}

impl FetchResponse {
    /// A 200 response with the given body
    pub fn ok(url: impl Into<String>, body: impl Into<Vec<u8>>) -> Self {
        Self {
            url: url.into(),
            status: 200,
            body: body.into(),
        }
    }

    /// Whether the status is in the 2xx range
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Append a cache-busting query parameter to a URL
///
/// The stamp has millisecond resolution: two requests inside the same
/// millisecond share a stamp and an intermediary may coalesce them.
pub fn bust_url(url: &str, param: &str, stamp_millis: i64) -> String {
    let sep = if url.contains('?') { '&' } else { '?' };
    format!("{url}{sep}{param}={stamp_millis}")
}

/// Abstract network backend
///
/// The real host wires this to the browser's fetch; tests and embedders use
/// [`ScriptedFetcher`]. A rejected fetch surfaces as an `Err`, exactly like
/// a rejected fetch promise.
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Issue a network fetch for the request
    async fn fetch(&self, request: &FetchRequest) -> WorkerResult<FetchResponse>;
}

/// Scripted fetch backend for driving the worker without a network
///
/// Routes are keyed by URL with any query string ignored, so cache-busted
/// variants of a routed URL still resolve. Every issued request is recorded
/// for later inspection.
#[derive(Debug, Default)]
pub struct ScriptedFetcher {
    routes: Mutex<HashMap<String, FetchResponse>>,
    requests: Mutex<Vec<FetchRequest>>,
    offline: AtomicBool,
    fail_budget: AtomicU32,
}

impl ScriptedFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `response` for every fetch of `url` (query string ignored)
    pub fn route(&self, url: &str, response: FetchResponse) {
        self.locked_routes().insert(url.to_string(), response);
    }

    /// Reject every subsequent fetch
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Reject only the next `count` fetches, then recover
    pub fn fail_next(&self, count: u32) {
        self.fail_budget.store(count, Ordering::SeqCst);
    }

    /// Every request issued so far, in order
    pub fn requests(&self) -> Vec<FetchRequest> {
        self.locked_requests().clone()
    }

    fn locked_routes(&self) -> std::sync::MutexGuard<'_, HashMap<String, FetchResponse>> {
        self.routes.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn locked_requests(&self) -> std::sync::MutexGuard<'_, Vec<FetchRequest>> {
        self.requests.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl Fetcher for ScriptedFetcher {
    async fn fetch(&self, request: &FetchRequest) -> WorkerResult<FetchResponse> {
        self.locked_requests().push(request.clone());

        if self.offline.load(Ordering::SeqCst) {
            return Err(WorkerError::network(&request.url));
        }
        if self
            .fail_budget
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            return Err(WorkerError::network(&request.url));
        }

        let base = request.url.split('?').next().unwrap_or_default();
        let response = self.locked_routes().get(base).cloned();
        response.ok_or_else(|| WorkerError::network(&request.url))
    }
}
