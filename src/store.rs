//! Cache store abstraction
//!
//! The browser owns the named-cache storage; the worker only enumerates,
//! looks up, and deletes against it. The trait deliberately has no write
//! operation: nothing in this worker ever populates a cache, so the store
//! can only shrink while a worker is in control.

use crate::error::WorkerResult;
use crate::net::FetchResponse;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Host-owned store of named caches
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Names of every cache generation currently in the store
    async fn keys(&self) -> WorkerResult<Vec<String>>;

    /// Whether a cache with this name exists
    async fn has(&self, name: &str) -> WorkerResult<bool>;

    /// Delete a named cache, returning whether it existed
    async fn delete(&self, name: &str) -> WorkerResult<bool>;

    /// Look up a cached response for `url` across every cache
    async fn match_url(&self, url: &str) -> WorkerResult<Option<FetchResponse>>;
}

/// In-memory cache store
///
/// The host simulation used by embedders and the test suite. Seeding goes
/// through the inherent [`insert`](Self::insert)/[`create_cache`](Self::create_cache)
/// methods, which are host-side operations outside the [`CacheStore`] seam.
#[derive(Debug, Default)]
pub struct MemoryCacheStore {
    caches: Mutex<HashMap<String, HashMap<String, FetchResponse>>>,
}

impl MemoryCacheStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a response under a named cache, creating the cache if needed
    pub fn insert(&self, cache: &str, url: &str, response: FetchResponse) {
        self.locked()
            .entry(cache.to_string())
            .or_default()
            .insert(url.to_string(), response);
    }

    /// Create an empty named cache
    pub fn create_cache(&self, name: &str) {
        self.locked().entry(name.to_string()).or_default();
    }

    /// Number of caches currently in the store
    pub fn cache_count(&self) -> usize {
        self.locked().len()
    }

    fn locked(&self) -> MutexGuard<'_, HashMap<String, HashMap<String, FetchResponse>>> {
        self.caches.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl CacheStore for MemoryCacheStore {
    async fn keys(&self) -> WorkerResult<Vec<String>> {
        let mut names: Vec<String> = self.locked().keys().cloned().collect();
        names.sort();
        Ok(names)
    }

    async fn has(&self, name: &str) -> WorkerResult<bool> {
        Ok(self.locked().contains_key(name))
    }

    async fn delete(&self, name: &str) -> WorkerResult<bool> {
        Ok(self.locked().remove(name).is_some())
    }

    async fn match_url(&self, url: &str) -> WorkerResult<Option<FetchResponse>> {
        let caches = self.locked();
        for entries in caches.values() {
            if let Some(response) = entries.get(url) {
                return Ok(Some(response.clone()));
            }
        }
        Ok(None)
    }
}
