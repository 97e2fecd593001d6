//! Controlled client registry
//!
//! A controlled client is one open tab or document of the Pulse app.
//! Claiming on activation hands every open client to the newest worker
//! without a reload; skip-waiting keeps a new worker from idling behind
//! its predecessor.

use crate::error::WorkerResult;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use uuid::Uuid;

/// One open tab/document controlled by the worker
#[derive(Debug, Clone)]
pub struct ControlledClient {
    /// Unique client ID
    pub id: Uuid,

    /// URL the client is showing
    pub url: String,

    /// When the client connected
    pub connected_at: DateTime<Utc>,
}

impl ControlledClient {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            url: url.into(),
            connected_at: Utc::now(),
        }
    }
}

/// Host primitives for client handover
#[async_trait]
pub trait ClientControl: Send + Sync {
    /// Promote this worker past the waiting state immediately
    async fn skip_waiting(&self) -> WorkerResult<()>;

    /// Take control of every open client
    async fn claim(&self) -> WorkerResult<()>;
}

/// In-memory client registry
///
/// Records which handover primitives have been invoked so tests and
/// embedders can observe the lifecycle from the host's side.
#[derive(Debug, Default)]
pub struct MemoryClients {
    clients: Mutex<Vec<ControlledClient>>,
    skipped_waiting: AtomicBool,
    claimed: AtomicBool,
}

impl MemoryClients {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an open client, returning its ID
    pub fn connect(&self, url: impl Into<String>) -> Uuid {
        let client = ControlledClient::new(url);
        let id = client.id;
        self.locked().push(client);
        id
    }

    /// Number of connected clients
    pub fn len(&self) -> usize {
        self.locked().len()
    }

    pub fn is_empty(&self) -> bool {
        self.locked().is_empty()
    }

    /// Whether skip-waiting has been requested
    pub fn skipped_waiting(&self) -> bool {
        self.skipped_waiting.load(Ordering::SeqCst)
    }

    /// Whether the clients have been claimed
    pub fn claimed(&self) -> bool {
        self.claimed.load(Ordering::SeqCst)
    }

    fn locked(&self) -> MutexGuard<'_, Vec<ControlledClient>> {
        self.clients.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl ClientControl for MemoryClients {
    async fn skip_waiting(&self) -> WorkerResult<()> {
        self.skipped_waiting.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn claim(&self) -> WorkerResult<()> {
        self.claimed.store(true, Ordering::SeqCst);
        Ok(())
    }
}
