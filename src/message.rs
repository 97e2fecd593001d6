//! Control-channel messages
//!
//! Clients post control messages to the worker. The recognized payload is
//! `{"type":"CLEAR_CACHE"}`; the acknowledgment posted back on the first
//! reply port is `{"success":true}`. Anything else on the channel is
//! ignored.

use crate::error::{WorkerError, WorkerResult};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

/// Recognized control messages from clients
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ClientMessage {
    /// Purge every cache generation, the current one included
    #[serde(rename = "CLEAR_CACHE")]
    ClearCache,
}

impl ClientMessage {
    /// Parse a raw payload, returning `None` for unrecognized shapes
    pub fn parse(payload: &serde_json::Value) -> Option<Self> {
        serde_json::from_value(payload.clone()).ok()
    }
}

/// Acknowledgment posted after a purge completes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurgeAck {
    pub success: bool,
}

impl PurgeAck {
    pub fn ok() -> Self {
        Self { success: true }
    }
}

/// Worker-side end of a client's reply channel
#[derive(Debug, Clone)]
pub struct ReplyPort {
    tx: mpsc::UnboundedSender<PurgeAck>,
}

impl ReplyPort {
    /// Create a port and the client-side receiver for it
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<PurgeAck>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Post an acknowledgment to the client
    pub fn post(&self, ack: PurgeAck) -> WorkerResult<()> {
        self.tx.send(ack).map_err(|_| WorkerError::ReplyPortClosed)
    }
}
