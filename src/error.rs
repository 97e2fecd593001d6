//! Error types for the Pulse worker
//!
//! All modules use `WorkerResult<T>` as their return type.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for worker operations
pub type WorkerResult<T> = Result<T, WorkerError>;

/// All errors that can occur in the worker
#[derive(Error, Debug)]
pub enum WorkerError {
    // Cache store errors
    #[error("Failed to enumerate cache generations: {reason}")]
    CacheEnumerate { reason: String },

    #[error("Failed to delete cache generation {name}: {reason}")]
    CacheDelete { name: String, reason: String },

    #[error("Cache lookup failed for {url}: {reason}")]
    CacheLookup { url: String, reason: String },

    // Network errors
    #[error("Network unavailable for {url}")]
    NetworkUnavailable { url: String },

    #[error("No response available for {url}")]
    ResourceUnavailable { url: String },

    // Lifecycle errors
    #[error("Lifecycle violation: {event} event while {state}")]
    LifecycleViolation { state: String, event: String },

    #[error("Skip-waiting request rejected by host: {0}")]
    SkipWaiting(String),

    #[error("Client claim rejected by host: {0}")]
    ClientClaim(String),

    // Messaging errors
    #[error("No reply port provided for acknowledgment")]
    ReplyPortMissing,

    #[error("Reply port closed before acknowledgment was posted")]
    ReplyPortClosed,

    // Configuration errors
    #[error("Invalid configuration at {path}: {reason}")]
    ConfigInvalid { path: PathBuf, reason: String },

    #[error("Configuration file not found: {0}")]
    ConfigNotFound(PathBuf),

    // IO errors
    #[error("IO error: {context}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    // Serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    // General errors
    #[error("Internal error: {0}")]
    Internal(String),
}

impl WorkerError {
    /// Create an IO error with context
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Create a network-unavailable error for a URL
    pub fn network(url: impl Into<String>) -> Self {
        Self::NetworkUnavailable { url: url.into() }
    }

    /// Create a cache deletion error
    pub fn cache_delete(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::CacheDelete {
            name: name.into(),
            reason: reason.into(),
        }
    }

    /// Create a lifecycle violation error
    pub fn lifecycle(state: impl ToString, event: impl Into<String>) -> Self {
        Self::LifecycleViolation {
            state: state.to_string(),
            event: event.into(),
        }
    }

    /// Check if the error is absorbed by a fetch fallback path
    ///
    /// Network rejections are never surfaced to clients as distinguishable
    /// errors; cache store failures propagate and fail the enclosing event.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::NetworkUnavailable { .. })
    }
}
