//! Event dispatch
//!
//! The host hands the driver one event at a time. The driver keeps each
//! event open until the handler's future resolves (the wait-until
//! contract), and structurally guarantees that a fetch event is responded
//! to exactly once: responding consumes the event.
//!
//! A failed lifecycle event propagates its error to the host, which logs
//! it and may retry the transition on the next load. A failed fetch does
//! not fail dispatch; the rejection settles through the event's responder,
//! which is all the requesting client ever sees.

use crate::controller::CacheLifecycleController;
use crate::error::WorkerResult;
use crate::message::ReplyPort;
use crate::net::{FetchRequest, FetchResponse};
use tokio::sync::oneshot;
use tracing::debug;

/// A fetch interception with its single-use response channel
#[derive(Debug)]
pub struct FetchEvent {
    pub request: FetchRequest,
    responder: oneshot::Sender<WorkerResult<FetchResponse>>,
}

impl FetchEvent {
    /// Create an event and the receiver the client awaits
    pub fn new(request: FetchRequest) -> (Self, oneshot::Receiver<WorkerResult<FetchResponse>>) {
        let (responder, rx) = oneshot::channel();
        (Self { request, responder }, rx)
    }

    /// Settle the event with the final outcome
    fn respond_with(self, outcome: WorkerResult<FetchResponse>) {
        if self.responder.send(outcome).is_err() {
            debug!("Client went away before its fetch settled");
        }
    }
}

/// A posted control message with its reply ports
#[derive(Debug, Clone)]
pub struct MessageEvent {
    pub data: serde_json::Value,
    pub ports: Vec<ReplyPort>,
}

impl MessageEvent {
    pub fn new(data: serde_json::Value, ports: Vec<ReplyPort>) -> Self {
        Self { data, ports }
    }
}

/// The four event classes a worker responds to
#[derive(Debug)]
pub enum WorkerEvent {
    Install,
    Activate,
    Fetch(FetchEvent),
    Message(MessageEvent),
}

/// Cooperative single-event dispatcher
///
/// The host guarantees at most one handler executes at a time within a
/// scope; the driver mirrors that by taking `&mut self` per dispatch.
pub struct EventDriver {
    controller: CacheLifecycleController,
}

impl EventDriver {
    pub fn new(controller: CacheLifecycleController) -> Self {
        Self { controller }
    }

    /// The controller being driven
    pub fn controller(&self) -> &CacheLifecycleController {
        &self.controller
    }

    /// Dispatch one event, holding it open until the handler completes
    pub async fn dispatch(&mut self, event: WorkerEvent) -> WorkerResult<()> {
        match event {
            WorkerEvent::Install => self.controller.handle_install().await,
            WorkerEvent::Activate => self.controller.handle_activate().await,
            WorkerEvent::Fetch(event) => {
                let outcome = self.controller.handle_fetch(&event.request).await;
                event.respond_with(outcome);
                Ok(())
            }
            WorkerEvent::Message(event) => {
                self.controller.handle_message(&event.data, &event.ports).await
            }
        }
    }
}
