//! Per-session pipeline controller.
//!
//! Two halves share a [`SessionPipeline`]:
//!
//! - **Ingress** ([`SessionPipeline::submit`]) runs on the connection's
//!   read task: parse the frame, check the token bucket, enqueue. Every
//!   refusal is answered inline with an error frame; nothing is dropped
//!   silently.
//! - **Drain** ([`SessionPipeline::run`]) is the single owner of the
//!   conversation history: it dequeues one message at a time, streams the
//!   upstream response to the client as fragments arrive, and persists
//!   the completed exchange before touching the next message. At most one
//!   upstream call is in flight per session, ever.
//!
//! The two halves synchronize through the queue only — the reader never
//! touches history.

use std::sync::Arc;
use std::time::Duration;

use metrics::{counter, histogram};
use parking_lot::Mutex;
use relay_core::frames::{ErrorKind, InboundFrame, OutboundFrame};
use relay_core::turns::Turn;
use relay_history::HistoryGateway;
use relay_upstream::{ChatProvider, UpstreamError};
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use crate::errors::SessionError;
use crate::limiter::TokenBucket;
use crate::queue::{EnqueueError, MessageQueue, PendingMessage};

/// Failure marker recorded when the client went away mid-stream.
const CANCELLED_MARKER: &str = "cancelled";

/// Injected pipeline parameters, owned by the host's configuration.
#[derive(Clone, Debug)]
pub struct PipelineConfig {
    /// Token bucket capacity.
    pub bucket_capacity: f64,
    /// Token bucket refill rate, tokens per second.
    pub refill_per_sec: f64,
    /// Tokens consumed per admitted message.
    pub cost_per_message: f64,
    /// Backpressure queue capacity.
    pub queue_capacity: usize,
    /// Maximum duration of one upstream streaming call.
    pub upstream_timeout: Duration,
    /// Model used when a request carries none.
    pub default_model: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            bucket_capacity: 10.0,
            refill_per_sec: 1.0,
            cost_per_message: 1.0,
            queue_capacity: 16,
            upstream_timeout: Duration::from_secs(60),
            default_model: "google/gemini-flash-1.5".into(),
        }
    }
}

/// How one streaming call ended.
enum StreamEnd {
    /// Provider signalled completion; the full response text.
    Complete(String),
    /// Upstream failed; whatever text had accumulated.
    Failed {
        partial: String,
        error: UpstreamError,
    },
    /// The client went away (cancel or dead outbound channel).
    Cancelled { partial: String },
}

/// Whether the drain loop should keep going after a message.
enum Flow {
    Continue,
    Disconnect,
}

/// One session's pipeline state.
pub struct SessionPipeline {
    session_id: String,
    limiter: Mutex<TokenBucket>,
    queue: MessageQueue,
    outbound: mpsc::Sender<OutboundFrame>,
    cancel: CancellationToken,
    cost_per_message: f64,
    default_model: String,
    upstream_timeout: Duration,
}

impl SessionPipeline {
    /// Create a pipeline bound to a connection's outbound channel.
    #[must_use]
    pub fn new(
        session_id: impl Into<String>,
        config: &PipelineConfig,
        outbound: mpsc::Sender<OutboundFrame>,
    ) -> Arc<Self> {
        Arc::new(Self {
            session_id: session_id.into(),
            limiter: Mutex::new(TokenBucket::new(
                config.bucket_capacity,
                config.refill_per_sec,
            )),
            queue: MessageQueue::new(config.queue_capacity),
            outbound,
            cancel: CancellationToken::new(),
            cost_per_message: config.cost_per_message,
            default_model: config.default_model.clone(),
            upstream_timeout: config.upstream_timeout,
        })
    }

    /// This pipeline's session identifier.
    #[must_use]
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Begin teardown: half-close the queue and cancel the drain loop.
    ///
    /// Idempotent. Any in-flight upstream call is cancelled promptly; the
    /// blocked consumer (if any) is released.
    pub fn shutdown(&self) {
        self.queue.close();
        self.cancel.cancel();
    }

    /// Whether teardown has begun.
    #[must_use]
    pub fn is_shutdown(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Completes once teardown begins.
    ///
    /// The host's connection tasks select on this so a takeover or
    /// transport failure releases them promptly.
    pub async fn cancelled(&self) {
        self.cancel.cancelled().await;
    }

    /// Number of messages waiting in the queue.
    #[must_use]
    pub fn queued(&self) -> usize {
        self.queue.len()
    }

    // ── Ingress half ─────────────────────────────────────────────────────

    /// Handle one raw inbound payload: parse → rate-check → enqueue.
    ///
    /// Refusals (malformed, rate-limited, overloaded) are answered with an
    /// error frame and return `Ok` — they are not session-fatal. The `Err`
    /// cases tell the read loop to stop: the outbound channel is dead or
    /// the session is tearing down.
    #[instrument(skip(self, raw), fields(session_id = %self.session_id))]
    pub async fn submit(&self, raw: &str) -> Result<(), SessionError> {
        let frame = match InboundFrame::parse(raw) {
            Ok(frame) => frame,
            Err(e) => {
                warn!(error = %e, "malformed inbound frame");
                counter!("pipeline_rejects_total", "reason" => "malformed").increment(1);
                return self
                    .send(OutboundFrame::error(
                        ErrorKind::MalformedRequest,
                        format!("invalid request: {e}"),
                    ))
                    .await;
            }
        };

        if !self.limiter.lock().admit(self.cost_per_message) {
            debug!("rate limited");
            counter!("pipeline_rejects_total", "reason" => "rate_limited").increment(1);
            return self
                .send(OutboundFrame::error(
                    ErrorKind::RateLimited,
                    "rate limit exceeded, retry later",
                ))
                .await;
        }

        match self
            .queue
            .enqueue(PendingMessage::new(frame.message, frame.model))
        {
            Ok(()) => Ok(()),
            Err(EnqueueError::Full) => {
                debug!("queue full");
                counter!("pipeline_rejects_total", "reason" => "overloaded").increment(1);
                self.send(OutboundFrame::error(
                    ErrorKind::Overloaded,
                    "too many pending messages",
                ))
                .await
            }
            Err(EnqueueError::Closed) => Err(SessionError::ShuttingDown),
        }
    }

    async fn send(&self, frame: OutboundFrame) -> Result<(), SessionError> {
        self.outbound
            .send(frame)
            .await
            .map_err(|_| SessionError::ConnectionClosed)
    }

    // ── Drain half ───────────────────────────────────────────────────────

    /// Drain the queue until shutdown, one message at a time.
    ///
    /// Owns `history` exclusively for the life of the loop — the
    /// serialization invariant is the ownership rule, not a lock.
    #[instrument(skip_all, fields(session_id = %self.session_id))]
    pub async fn run(
        self: Arc<Self>,
        mut history: Vec<Turn>,
        provider: Arc<dyn ChatProvider>,
        store: Arc<dyn HistoryGateway>,
    ) {
        info!(turns = history.len(), "drain loop started");
        loop {
            let msg = tokio::select! {
                () = self.cancel.cancelled() => break,
                msg = self.queue.dequeue() => match msg {
                    Some(msg) => msg,
                    None => break,
                },
            };

            let flow = self
                .process_message(&mut history, msg, provider.as_ref(), store.as_ref())
                .await;
            if matches!(flow, Flow::Disconnect) {
                self.shutdown();
                break;
            }
        }
        debug!("drain loop exited");
    }

    /// Process one dequeued message end to end.
    async fn process_message(
        &self,
        history: &mut Vec<Turn>,
        msg: PendingMessage,
        provider: &dyn ChatProvider,
        store: &dyn HistoryGateway,
    ) -> Flow {
        let started = Instant::now();
        let model = msg
            .model
            .as_deref()
            .unwrap_or(&self.default_model)
            .to_string();
        let queued_for = started.saturating_duration_since(msg.enqueued_at);
        debug!(model = %model, queued_ms = queued_for.as_millis() as u64, "processing message");

        history.push(Turn::user(msg.text));

        let end = self.stream_response(history, &model, provider).await;
        let flow = match end {
            StreamEnd::Complete(full_text) => {
                history.push(Turn::assistant(full_text));
                counter!("pipeline_messages_total", "outcome" => "complete").increment(1);

                // Both turns of the exchange, durably, before the next message.
                let tail = history.len() - 2;
                match self.persist_turns(store, &history[tail..]).await {
                    Ok(()) => self.send(OutboundFrame::Done).await,
                    Err(e) => {
                        error!(error = %e, "failed to persist exchange");
                        counter!("pipeline_persist_errors_total").increment(1);
                        self.send(OutboundFrame::error(
                            ErrorKind::Persistence,
                            "failed to record exchange",
                        ))
                        .await
                    }
                }
                .map_or(Flow::Disconnect, |()| Flow::Continue)
            }
            StreamEnd::Failed { partial, error } => {
                warn!(kind = error.kind(), "upstream call failed");
                counter!("pipeline_messages_total", "outcome" => "upstream_error").increment(1);

                let informed = self
                    .send(OutboundFrame::error(ErrorKind::Upstream, error.to_string()))
                    .await;
                self.record_failed_turn(history, store, partial, error.kind())
                    .await;
                informed.map_or(Flow::Disconnect, |()| Flow::Continue)
            }
            StreamEnd::Cancelled { partial } => {
                debug!("stream cancelled by client disconnect");
                counter!("pipeline_messages_total", "outcome" => "cancelled").increment(1);
                self.record_failed_turn(history, store, partial, CANCELLED_MARKER)
                    .await;
                Flow::Disconnect
            }
        };

        histogram!("pipeline_message_duration_seconds")
            .record(started.elapsed().as_secs_f64());
        flow
    }

    /// Issue the upstream call and relay fragments until it ends.
    ///
    /// The whole call lives under one deadline. Client disconnect (cancel
    /// token or dead outbound channel) drops the fragment stream, which
    /// aborts the underlying request — cancellation is bounded by that
    /// drop, not by upstream goodwill.
    async fn stream_response(
        &self,
        history: &[Turn],
        model: &str,
        provider: &dyn ChatProvider,
    ) -> StreamEnd {
        use futures::StreamExt;

        let deadline = Instant::now() + self.upstream_timeout;

        let opened = tokio::select! {
            () = self.cancel.cancelled() => {
                return StreamEnd::Cancelled { partial: String::new() };
            }
            opened = tokio::time::timeout_at(deadline, provider.stream(history, model)) => opened,
        };
        let mut stream = match opened {
            Err(_) => {
                return StreamEnd::Failed {
                    partial: String::new(),
                    error: UpstreamError::Timeout,
                };
            }
            Ok(Err(error)) => {
                return StreamEnd::Failed {
                    partial: String::new(),
                    error,
                };
            }
            Ok(Ok(stream)) => stream,
        };

        let mut accumulated = String::new();
        loop {
            let next = tokio::select! {
                () = self.cancel.cancelled() => {
                    return StreamEnd::Cancelled { partial: accumulated };
                }
                next = tokio::time::timeout_at(deadline, stream.next()) => next,
            };
            match next {
                Err(_) => {
                    return StreamEnd::Failed {
                        partial: accumulated,
                        error: UpstreamError::Timeout,
                    };
                }
                Ok(None) => return StreamEnd::Complete(accumulated),
                Ok(Some(Ok(text))) => {
                    if self
                        .send(OutboundFrame::fragment(text.clone()))
                        .await
                        .is_err()
                    {
                        return StreamEnd::Cancelled {
                            partial: accumulated,
                        };
                    }
                    accumulated.push_str(&text);
                }
                Ok(Some(Err(error))) => {
                    return StreamEnd::Failed {
                        partial: accumulated,
                        error,
                    };
                }
            }
        }
    }

    /// Record a failed exchange: the user turn always, plus the partial
    /// assistant text (with its failure marker) when any arrived.
    async fn record_failed_turn(
        &self,
        history: &mut Vec<Turn>,
        store: &dyn HistoryGateway,
        partial: String,
        marker: &str,
    ) {
        if !partial.is_empty() {
            history.push(Turn::failed_assistant(partial, marker));
        }
        let tail = if history.last().is_some_and(Turn::is_failed) {
            history.len() - 2
        } else {
            history.len() - 1
        };
        if let Err(e) = self.persist_turns(store, &history[tail..]).await {
            error!(error = %e, "failed to persist failed exchange");
            counter!("pipeline_persist_errors_total").increment(1);
        }
    }

    async fn persist_turns(
        &self,
        store: &dyn HistoryGateway,
        turns: &[Turn],
    ) -> relay_history::Result<()> {
        for turn in turns {
            store.append(&self.session_id, turn.clone()).await?;
        }
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
