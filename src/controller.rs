//! Cache lifecycle controller
//!
//! The heart of the worker: a small state machine that owns one cache
//! generation and answers the four lifecycle events. The cache store is
//! treated as a liability to be minimized, not a performance optimization:
//! the controller deletes aggressively, never writes, and always prefers
//! the network, so clients see the latest deployed version of the app.
//!
//! # States
//!
//! | State | Entered | Accepts |
//! |------------|------------------------------|------------------------|
//! | Installing | construction | install, fetch, message |
//! | Installed | install (after skip-waiting) | activate, fetch, message |
//! | Activating | activate, until claim | fetch, message |
//! | Active | activate completed | fetch, message |

use crate::clients::ClientControl;
use crate::config::WorkerConfig;
use crate::error::{WorkerError, WorkerResult};
use crate::generation::CacheGeneration;
use crate::message::{ClientMessage, PurgeAck, ReplyPort};
use crate::net::{FetchRequest, FetchResponse, Fetcher};
use crate::plan::{plan_activation, plan_fetch, FetchPlan};
use crate::store::CacheStore;
use chrono::Utc;
use futures_util::future::try_join_all;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Lifecycle state of the controller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    /// Constructed, install event not yet seen
    Installing,
    /// Install completed, waiting skipped
    Installed,
    /// Activate in progress (stale generations being purged)
    Activating,
    /// In control of all clients
    Active,
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Installing => write!(f, "installing"),
            Self::Installed => write!(f, "installed"),
            Self::Activating => write!(f, "activating"),
            Self::Active => write!(f, "active"),
        }
    }
}

/// Event responder enforcing the always-fresh cache policy
pub struct CacheLifecycleController {
    generation: CacheGeneration,
    state: LifecycleState,
    bust_param: String,
    store: Arc<dyn CacheStore>,
    fetcher: Arc<dyn Fetcher>,
    clients: Arc<dyn ClientControl>,
}

impl CacheLifecycleController {
    /// Construct a controller, minting a fresh generation from the clock
    pub fn new(
        config: &WorkerConfig,
        store: Arc<dyn CacheStore>,
        fetcher: Arc<dyn Fetcher>,
        clients: Arc<dyn ClientControl>,
    ) -> Self {
        Self::with_generation(
            CacheGeneration::now(&config.cache.prefix),
            &config.fetch.bust_param,
            store,
            fetcher,
            clients,
        )
    }

    /// Construct a controller around an explicit generation
    pub fn with_generation(
        generation: CacheGeneration,
        bust_param: impl Into<String>,
        store: Arc<dyn CacheStore>,
        fetcher: Arc<dyn Fetcher>,
        clients: Arc<dyn ClientControl>,
    ) -> Self {
        info!(generation = %generation, "Worker constructed");
        Self {
            generation,
            state: LifecycleState::Installing,
            bust_param: bust_param.into(),
            store,
            fetcher,
            clients,
        }
    }

    /// The generation this controller owns
    pub fn generation(&self) -> &CacheGeneration {
        &self.generation
    }

    /// Current lifecycle state
    pub fn state(&self) -> LifecycleState {
        self.state
    }

    /// Handle the install event
    ///
    /// Skips the waiting period so this worker does not idle behind
    /// existing clients. Nothing is pre-fetched into the cache.
    pub async fn handle_install(&mut self) -> WorkerResult<()> {
        if self.state != LifecycleState::Installing {
            return Err(WorkerError::lifecycle(self.state, "install"));
        }

        self.clients.skip_waiting().await?;
        self.state = LifecycleState::Installed;
        info!(generation = %self.generation, "Installed, waiting skipped");
        Ok(())
    }

    /// Handle the activate event
    ///
    /// Enumerates the store, deletes every generation but its own, then
    /// claims all clients. The deletions are issued together and joined
    /// before the claim, so no client is handed over while a stale
    /// generation is still readable.
    pub async fn handle_activate(&mut self) -> WorkerResult<()> {
        if self.state != LifecycleState::Installed {
            return Err(WorkerError::lifecycle(self.state, "activate"));
        }
        self.state = LifecycleState::Activating;

        let existing = self.store.keys().await?;
        let plan = plan_activation(&self.generation, &existing);
        debug!(
            stale = plan.deletions.len(),
            total = existing.len(),
            "Purging stale cache generations"
        );

        try_join_all(plan.deletions.iter().map(|name| self.store.delete(name))).await?;

        self.clients.claim().await?;
        self.state = LifecycleState::Active;
        info!(
            generation = %self.generation,
            purged = plan.deletions.len(),
            "Activated and claimed clients"
        );
        Ok(())
    }

    /// Handle an intercepted fetch
    ///
    /// Navigations go to the network with a cache-busting stamp and fall
    /// back to a plain network retry; the cache store is never consulted
    /// for them. Other resources try the network and fall back to a cache
    /// lookup, which misses unless the host seeded the store out-of-band.
    pub async fn handle_fetch(&self, request: &FetchRequest) -> WorkerResult<FetchResponse> {
        let plan = plan_fetch(request, &self.bust_param, Utc::now().timestamp_millis());

        match plan {
            FetchPlan::NavigationNetworkFirst { primary, fallback } => {
                match self.fetcher.fetch(&primary).await {
                    Ok(response) => Ok(response),
                    Err(err) => {
                        debug!(url = %fallback.url, %err, "Busted navigation fetch failed, retrying plain");
                        self.fetcher.fetch(&fallback).await
                    }
                }
            }
            FetchPlan::ResourceNetworkFirst { request } => {
                match self.fetcher.fetch(&request).await {
                    Ok(response) => Ok(response),
                    Err(err) => {
                        debug!(url = %request.url, %err, "Resource fetch failed, trying cache");
                        match self.store.match_url(&request.url).await? {
                            Some(response) => Ok(response),
                            None => Err(WorkerError::ResourceUnavailable {
                                url: request.url.clone(),
                            }),
                        }
                    }
                }
            }
        }
    }

    /// Handle a control message
    ///
    /// Unrecognized payloads are ignored. A clear-cache request purges
    /// every generation, the current one included, then acknowledges on
    /// the first reply port.
    pub async fn handle_message(
        &self,
        payload: &serde_json::Value,
        ports: &[ReplyPort],
    ) -> WorkerResult<()> {
        let Some(message) = ClientMessage::parse(payload) else {
            debug!("Ignoring unrecognized control message");
            return Ok(());
        };

        match message {
            ClientMessage::ClearCache => self.purge_all(ports).await,
        }
    }

    /// Delete every cache generation and acknowledge on the first port
    async fn purge_all(&self, ports: &[ReplyPort]) -> WorkerResult<()> {
        let names = self.store.keys().await?;
        try_join_all(names.iter().map(|name| self.store.delete(name))).await?;
        info!(purged = names.len(), "Cleared every cache generation");

        let Some(port) = ports.first() else {
            warn!("Clear-cache message carried no reply port");
            return Err(WorkerError::ReplyPortMissing);
        };
        port.post(PurgeAck::ok())
    }
}
