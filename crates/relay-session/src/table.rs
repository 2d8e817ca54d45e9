//! Process-wide session table.
//!
//! Maps session identifiers to live pipelines. Enforces the at-most-one
//! active connection invariant with a takeover policy: a reconnect for an
//! identifier cancels the previous pipeline, waits for its drain loop to
//! finish, reloads history, and starts fresh. Disconnected entries are
//! evicted after a configured idle window so the table never grows
//! without bound.
//!
//! No map lock is held across upstream or persistence I/O: slots are
//! removed from the map before their drain task is awaited, and history
//! loads happen outside any shard lock.

use std::collections::HashMap;
use std::sync::{Arc, Weak};
use std::time::Duration;

use dashmap::DashMap;
use metrics::gauge;
use relay_core::frames::OutboundFrame;
use relay_history::HistoryGateway;
use relay_upstream::ChatProvider;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, instrument};

use crate::errors::SessionError;
use crate::pipeline::{PipelineConfig, SessionPipeline};

struct SessionSlot {
    pipeline: Arc<SessionPipeline>,
    drain: Option<JoinHandle<()>>,
    disconnected_at: Option<Instant>,
}

/// Session table configuration.
#[derive(Clone, Debug)]
pub struct TableConfig {
    /// Per-pipeline parameters.
    pub pipeline: PipelineConfig,
    /// How long a disconnected session stays resident before eviction.
    pub idle_eviction: Duration,
}

impl Default for TableConfig {
    fn default() -> Self {
        Self {
            pipeline: PipelineConfig::default(),
            idle_eviction: Duration::from_secs(300),
        }
    }
}

/// The in-memory table of active sessions.
pub struct SessionTable {
    slots: DashMap<String, SessionSlot>,
    config: TableConfig,
    provider: Arc<dyn ChatProvider>,
    store: Arc<dyn HistoryGateway>,
    /// Serializes concurrent `connect` calls for the same identifier so
    /// takeover can never interleave and duplicate a session.
    connect_locks: parking_lot::Mutex<HashMap<String, Weak<tokio::sync::Mutex<()>>>>,
}

impl SessionTable {
    /// Create a table.
    #[must_use]
    pub fn new(
        config: TableConfig,
        provider: Arc<dyn ChatProvider>,
        store: Arc<dyn HistoryGateway>,
    ) -> Self {
        Self {
            slots: DashMap::new(),
            config,
            provider,
            store,
            connect_locks: parking_lot::Mutex::new(HashMap::new()),
        }
    }

    fn connect_lock(&self, session_id: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.connect_locks.lock();
        if locks.len() > 128 {
            locks.retain(|_, weak| weak.strong_count() > 0);
        }
        if let Some(existing) = locks.get(session_id).and_then(Weak::upgrade) {
            return existing;
        }
        let lock = Arc::new(tokio::sync::Mutex::new(()));
        let _ = locks.insert(session_id.to_string(), Arc::downgrade(&lock));
        lock
    }

    /// Attach a connection to a session, creating or taking it over.
    ///
    /// Loads persisted history, builds a fresh limiter and queue from the
    /// configured parameters, and spawns the drain loop. If the identifier
    /// already has a live pipeline, that pipeline is cancelled and awaited
    /// first (takeover — never a silent duplicate).
    #[instrument(skip(self, outbound), fields(session_id))]
    pub async fn connect(
        &self,
        session_id: &str,
        outbound: mpsc::Sender<OutboundFrame>,
    ) -> Result<Arc<SessionPipeline>, SessionError> {
        let lock = self.connect_lock(session_id);
        let _guard = lock.lock().await;

        if let Some((_, old)) = self.slots.remove(session_id) {
            info!("taking over existing session");
            old.pipeline.shutdown();
            if let Some(drain) = old.drain {
                let _ = drain.await;
            }
        }

        let history = self.store.load(session_id).await?;
        debug!(turns = history.len(), "session history loaded");

        let pipeline = SessionPipeline::new(session_id, &self.config.pipeline, outbound);
        let drain = tokio::spawn(Arc::clone(&pipeline).run(
            history,
            Arc::clone(&self.provider),
            Arc::clone(&self.store),
        ));
        let _ = self.slots.insert(
            session_id.to_string(),
            SessionSlot {
                pipeline: Arc::clone(&pipeline),
                drain: Some(drain),
                disconnected_at: None,
            },
        );
        gauge!("sessions_active").set(self.slots.len() as f64);
        Ok(pipeline)
    }

    /// Mark a session's connection as closed.
    ///
    /// Shuts the pipeline down (the queue half-closes, any in-flight
    /// upstream call is cancelled) but keeps the table entry until the
    /// idle window elapses, in case the client reconnects.
    ///
    /// Identity-checked: if the table slot already belongs to a successor
    /// pipeline (takeover), the stale connection's disconnect must not
    /// touch it.
    #[instrument(skip_all, fields(session_id = pipeline.session_id()))]
    pub fn disconnect(&self, pipeline: &Arc<SessionPipeline>) {
        if let Some(mut slot) = self.slots.get_mut(pipeline.session_id())
            && Arc::ptr_eq(&slot.pipeline, pipeline)
        {
            debug!("session disconnected");
            slot.pipeline.shutdown();
            slot.disconnected_at = Some(Instant::now());
        }
    }

    /// Evict sessions disconnected longer than the idle window.
    ///
    /// Returns the number of sessions removed. Called periodically by the
    /// host's sweeper task.
    pub fn evict_idle(&self) -> usize {
        let now = Instant::now();
        let before = self.slots.len();
        self.slots.retain(|session_id, slot| {
            let expired = slot
                .disconnected_at
                .is_some_and(|at| now.saturating_duration_since(at) >= self.config.idle_eviction);
            if expired {
                debug!(session_id, "evicting idle session");
            }
            !expired
        });
        let evicted = before - self.slots.len();
        gauge!("sessions_active").set(self.slots.len() as f64);
        evicted
    }

    /// Whether a session is resident (connected or within its idle window).
    #[must_use]
    pub fn contains(&self, session_id: &str) -> bool {
        self.slots.contains_key(session_id)
    }

    /// Number of resident sessions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Whether the table is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Graceful shutdown: cancel every pipeline and await every drain loop.
    #[instrument(skip(self))]
    pub async fn shutdown_all(&self) {
        info!(sessions = self.slots.len(), "shutting down all sessions");
        let ids: Vec<String> = self.slots.iter().map(|e| e.key().clone()).collect();
        for id in ids {
            if let Some((_, old)) = self.slots.remove(&id) {
                old.pipeline.shutdown();
                if let Some(drain) = old.drain {
                    let _ = drain.await;
                }
            }
        }
        gauge!("sessions_active").set(0.0);
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
