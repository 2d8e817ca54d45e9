//! # relay-server
//!
//! Axum host for the relay pipeline: the WebSocket chat endpoint, the
//! Prometheus `/metrics` endpoint, and the background eviction sweeper.
//!
//! The server owns no pipeline logic — it bridges sockets to
//! `relay-session` and renders metrics. See the `relay` binary for
//! startup wiring.

#![deny(unsafe_code)]

pub mod metrics;
pub mod state;
pub mod ws;

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::extract::State;
use axum::routing::get;
use relay_session::SessionTable;
use tokio::task::JoinHandle;
use tower_http::trace::TraceLayer;
use tracing::debug;

use crate::state::AppState;

/// Build the application router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/ws/chat/{session_id}", get(ws::chat_handler))
        .route("/metrics", get(metrics_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// `GET /metrics` — Prometheus text format.
async fn metrics_handler(State(state): State<AppState>) -> String {
    state.metrics.render()
}

/// Spawn the periodic idle-session eviction sweeper.
pub fn spawn_eviction_sweeper(
    table: Arc<SessionTable>,
    interval: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            let _ = ticker.tick().await;
            let evicted = table.evict_idle();
            if evicted > 0 {
                debug!(evicted, "evicted idle sessions");
            }
        }
    })
}
