//! Prometheus metrics recorder and `/metrics` endpoint support.

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use tracing::info;

/// Install the Prometheus metrics recorder (global).
///
/// Returns the `PrometheusHandle` used to render the `/metrics` endpoint.
/// Must be called once at server startup before any metrics are recorded.
pub fn install_recorder() -> PrometheusHandle {
    let builder = PrometheusBuilder::new();
    let handle = builder
        .install_recorder()
        .expect("failed to install metrics recorder");
    info!("prometheus metrics recorder installed");
    handle
}

// Metric name constants to avoid typos across crates.

/// WebSocket connections opened total (counter).
pub const WS_CONNECTIONS_TOTAL: &str = "ws_connections_total";
/// WebSocket disconnections total (counter).
pub const WS_DISCONNECTIONS_TOTAL: &str = "ws_disconnections_total";
/// Resident sessions (gauge).
pub const SESSIONS_ACTIVE: &str = "sessions_active";
/// Pipeline messages processed total (counter, labels: outcome).
pub const PIPELINE_MESSAGES_TOTAL: &str = "pipeline_messages_total";
/// Pipeline ingress rejections total (counter, labels: reason).
pub const PIPELINE_REJECTS_TOTAL: &str = "pipeline_rejects_total";
/// Pipeline persistence failures total (counter).
pub const PIPELINE_PERSIST_ERRORS_TOTAL: &str = "pipeline_persist_errors_total";
/// Pipeline message duration seconds (histogram).
pub const PIPELINE_MESSAGE_DURATION_SECONDS: &str = "pipeline_message_duration_seconds";
/// Upstream requests total (counter, labels: provider).
pub const UPSTREAM_REQUESTS_TOTAL: &str = "upstream_requests_total";
/// Upstream errors total (counter, labels: kind).
pub const UPSTREAM_ERRORS_TOTAL: &str = "upstream_errors_total";
