//! Test doubles shared by the pipeline and table test suites.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use relay_core::turns::Turn;
use relay_history::{HistoryError, HistoryGateway};
use relay_upstream::{ChatProvider, FragmentStream, UpstreamError};
use tokio::sync::oneshot;

/// Shared, ordered record of observable events across stubs.
pub type EventLog = Arc<Mutex<Vec<String>>>;

/// Create an empty event log.
pub fn new_log() -> EventLog {
    Arc::new(Mutex::new(Vec::new()))
}

/// Append an entry to a log.
pub fn log_event(log: &EventLog, entry: impl Into<String>) {
    log.lock().unwrap().push(entry.into());
}

/// Snapshot a log's entries.
pub fn log_entries(log: &EventLog) -> Vec<String> {
    log.lock().unwrap().clone()
}

/// One scripted upstream response.
pub type Script = Vec<Result<String, UpstreamError>>;

/// Provider that replays pre-scripted fragment sequences, one per call.
///
/// Logs `stream_start:<n>` (plus the model and history length) when each
/// call begins, so tests can assert cross-component ordering.
pub struct ScriptedProvider {
    scripts: Mutex<VecDeque<Script>>,
    log: EventLog,
}

impl ScriptedProvider {
    /// Build a provider that answers successive calls with `scripts`.
    pub fn new(log: EventLog, scripts: Vec<Script>) -> Self {
        Self {
            scripts: Mutex::new(scripts.into()),
            log,
        }
    }
}

#[async_trait]
impl ChatProvider for ScriptedProvider {
    async fn stream(&self, history: &[Turn], model: &str) -> Result<FragmentStream, UpstreamError> {
        let script = self.scripts.lock().unwrap().pop_front();
        log_event(
            &self.log,
            format!("stream_start:model={model}:history={}", history.len()),
        );
        let script = script.ok_or_else(|| UpstreamError::Provider {
            status: 500,
            message: "no script left".into(),
        })?;
        Ok(Box::pin(async_stream::stream! {
            for item in script {
                yield item;
            }
        }))
    }
}

/// Provider that yields some fragments and then hangs forever.
///
/// When the returned stream is dropped (cancellation), the provided
/// oneshot sender fires — tests use it to bound cancellation time.
pub struct HangingProvider {
    prefix: Vec<String>,
    dropped: Mutex<Option<oneshot::Sender<()>>>,
}

impl HangingProvider {
    /// Build a provider yielding `prefix` then hanging. Returns the
    /// receiver that fires when the stream is dropped.
    pub fn new(prefix: Vec<String>) -> (Self, oneshot::Receiver<()>) {
        let (tx, rx) = oneshot::channel();
        (
            Self {
                prefix,
                dropped: Mutex::new(Some(tx)),
            },
            rx,
        )
    }
}

/// Fires a oneshot sender when dropped.
struct SignalOnDrop(Option<oneshot::Sender<()>>);

impl Drop for SignalOnDrop {
    fn drop(&mut self) {
        if let Some(tx) = self.0.take() {
            let _ = tx.send(());
        }
    }
}

#[async_trait]
impl ChatProvider for HangingProvider {
    async fn stream(
        &self,
        _history: &[Turn],
        _model: &str,
    ) -> Result<FragmentStream, UpstreamError> {
        let prefix = self.prefix.clone();
        let guard = SignalOnDrop(self.dropped.lock().unwrap().take());
        Ok(Box::pin(async_stream::stream! {
            let _guard = guard;
            for text in prefix {
                yield Ok::<String, UpstreamError>(text);
            }
            futures::future::pending::<()>().await;
        }))
    }
}

/// In-memory history gateway recording appends to the shared log.
pub struct MemoryStore {
    turns: Mutex<HashMap<String, Vec<Turn>>>,
    log: EventLog,
    fail_appends: AtomicBool,
}

impl MemoryStore {
    /// Empty store.
    pub fn new(log: EventLog) -> Self {
        Self {
            turns: Mutex::new(HashMap::new()),
            log,
            fail_appends: AtomicBool::new(false),
        }
    }

    /// Pre-seed a session's history.
    pub fn seed(&self, session_id: &str, turns: Vec<Turn>) {
        let _ = self.turns.lock().unwrap().insert(session_id.into(), turns);
    }

    /// Make subsequent appends fail (or succeed again).
    pub fn set_fail_appends(&self, fail: bool) {
        self.fail_appends.store(fail, Ordering::SeqCst);
    }

    /// Current turns for a session.
    pub fn turns_for(&self, session_id: &str) -> Vec<Turn> {
        self.turns
            .lock()
            .unwrap()
            .get(session_id)
            .cloned()
            .unwrap_or_default()
    }
}

#[async_trait]
impl HistoryGateway for MemoryStore {
    async fn append(&self, session_id: &str, turn: Turn) -> relay_history::Result<()> {
        if self.fail_appends.load(Ordering::SeqCst) {
            return Err(HistoryError::Internal("append disabled".into()));
        }
        log_event(&self.log, format!("append:{}", turn.role.as_str()));
        self.turns
            .lock()
            .unwrap()
            .entry(session_id.to_string())
            .or_default()
            .push(turn);
        Ok(())
    }

    async fn load(&self, session_id: &str) -> relay_history::Result<Vec<Turn>> {
        Ok(self.turns_for(session_id))
    }
}
