//! Bounded per-session message queue with half-close.
//!
//! Strict FIFO. Producers are rejected (never blocked) when the queue is
//! full, so the inbound read loop can answer the client immediately.
//! `close` half-closes the queue: later enqueues fail fast and a blocked
//! consumer is released.
//!
//! Single-consumer discipline: exactly one task awaits `dequeue` at a
//! time (the session's drain loop). Wakeups use `Notify::notify_one`,
//! whose stored permit guarantees a notification issued between the
//! consumer's empty-check and its await is not lost.

use std::collections::VecDeque;

use parking_lot::Mutex;
use thiserror::Error;
use tokio::sync::Notify;
use tokio::time::Instant;

/// A request unit waiting to be processed. Immutable once enqueued.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PendingMessage {
    /// The user's message text.
    pub text: String,
    /// Model override carried by the request, if any.
    pub model: Option<String>,
    /// When the message was admitted into the queue.
    pub enqueued_at: Instant,
}

impl PendingMessage {
    /// Build a pending message stamped now.
    #[must_use]
    pub fn new(text: impl Into<String>, model: Option<String>) -> Self {
        Self {
            text: text.into(),
            model,
            enqueued_at: Instant::now(),
        }
    }
}

/// Why an enqueue was refused.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
pub enum EnqueueError {
    /// The queue is at capacity.
    #[error("queue is full")]
    Full,
    /// The queue was half-closed — the session is tearing down.
    #[error("queue is closed")]
    Closed,
}

struct Inner {
    items: VecDeque<PendingMessage>,
    closed: bool,
}

/// Bounded FIFO queue of pending messages.
pub struct MessageQueue {
    inner: Mutex<Inner>,
    notify: Notify,
    capacity: usize,
}

impl MessageQueue {
    /// Create a queue holding at most `capacity` messages.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(Inner {
                items: VecDeque::new(),
                closed: false,
            }),
            notify: Notify::new(),
            capacity,
        }
    }

    /// Add a message to the back of the queue.
    ///
    /// Fails with [`EnqueueError::Full`] at capacity and
    /// [`EnqueueError::Closed`] after half-close. Never blocks.
    pub fn enqueue(&self, msg: PendingMessage) -> Result<(), EnqueueError> {
        {
            let mut inner = self.inner.lock();
            if inner.closed {
                return Err(EnqueueError::Closed);
            }
            if inner.items.len() >= self.capacity {
                return Err(EnqueueError::Full);
            }
            inner.items.push_back(msg);
        }
        self.notify.notify_one();
        Ok(())
    }

    /// Take the oldest message, waiting while the queue is empty.
    ///
    /// Returns `None` once the queue is closed — the shutdown signal that
    /// releases a blocked consumer. Messages still queued at close time
    /// are discarded.
    pub async fn dequeue(&self) -> Option<PendingMessage> {
        loop {
            {
                let mut inner = self.inner.lock();
                if inner.closed {
                    return None;
                }
                if let Some(msg) = inner.items.pop_front() {
                    return Some(msg);
                }
            }
            self.notify.notified().await;
        }
    }

    /// Half-close: reject all future enqueues and release the consumer.
    pub fn close(&self) {
        {
            let mut inner = self.inner.lock();
            inner.closed = true;
        }
        self.notify.notify_one();
    }

    /// Whether the queue has been closed.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.inner.lock().closed
    }

    /// Number of queued messages.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.lock().items.len()
    }

    /// Whether the queue is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.lock().items.is_empty()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
