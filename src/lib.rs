//! Pulse worker - cache lifecycle controller
//!
//! Keeps the Pulse web client from ever serving stale content: one cache
//! generation per worker instantiation, network-first fetch handling, and
//! aggressive purging of every other generation on activation. The browser
//! runtime (cache storage, network, client registry) is injected behind
//! traits so the whole worker can be driven in-process.

pub mod clients;
pub mod config;
pub mod controller;
pub mod driver;
pub mod error;
pub mod generation;
pub mod message;
pub mod net;
pub mod plan;
pub mod store;

pub use error::{WorkerError, WorkerResult};
