//! # relay-session
//!
//! The per-session message pipeline: the core that accepts inbound chat
//! requests from a live connection, enforces rate limits and backpressure,
//! serializes access to per-session state, streams the upstream response
//! back incrementally, and persists each completed exchange.
//!
//! Components, leaves first:
//!
//! - [`limiter::TokenBucket`] — refillable per-session admission quota
//! - [`queue::MessageQueue`] — bounded FIFO with reject-on-full and
//!   half-close
//! - [`pipeline::SessionPipeline`] — ingress (parse → limit → enqueue) and
//!   drain (one upstream call in flight, relay, persist) halves
//! - [`table::SessionTable`] — process-wide identifier → session map with
//!   takeover on reconnect and idle eviction
//!
//! ## Concurrency model
//!
//! Many sessions run concurrently; within one session every mutation of
//! history, limiter, and queue is linearized. The drain loop is the sole
//! owner of the history; the connection's read task reaches it only
//! through the queue. Suspension points (upstream fragments, empty-queue
//! waits, persistence I/O) are all cooperative — no session can stall
//! another.

#![deny(unsafe_code)]

pub mod errors;
pub mod limiter;
pub mod pipeline;
pub mod queue;
pub mod table;

#[cfg(test)]
pub(crate) mod testing;

pub use errors::SessionError;
pub use limiter::TokenBucket;
pub use pipeline::{PipelineConfig, SessionPipeline};
pub use queue::{EnqueueError, MessageQueue, PendingMessage};
pub use table::{SessionTable, TableConfig};
