//! Shared server state and settings → pipeline wiring.

use std::sync::Arc;
use std::time::Duration;

use metrics_exporter_prometheus::PrometheusHandle;
use relay_session::{PipelineConfig, SessionTable, TableConfig};
use relay_settings::RelaySettings;

/// State shared by every route handler.
#[derive(Clone)]
pub struct AppState {
    /// The process-wide session table.
    pub table: Arc<SessionTable>,
    /// Handle for rendering the `/metrics` endpoint.
    pub metrics: PrometheusHandle,
}

/// Build the session table configuration from loaded settings.
#[must_use]
pub fn table_config(settings: &RelaySettings) -> TableConfig {
    TableConfig {
        pipeline: PipelineConfig {
            bucket_capacity: settings.limiter.capacity,
            refill_per_sec: settings.limiter.refill_per_sec,
            cost_per_message: settings.limiter.cost_per_message,
            queue_capacity: settings.queue.capacity,
            upstream_timeout: Duration::from_millis(settings.upstream.request_timeout_ms),
            default_model: settings.upstream.default_model.clone(),
        },
        idle_eviction: Duration::from_secs(settings.sessions.idle_eviction_secs),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_config_maps_every_injected_parameter() {
        let mut settings = RelaySettings::default();
        settings.limiter.capacity = 7.0;
        settings.limiter.refill_per_sec = 2.5;
        settings.limiter.cost_per_message = 0.5;
        settings.queue.capacity = 3;
        settings.upstream.request_timeout_ms = 1234;
        settings.upstream.default_model = "m-default".into();
        settings.sessions.idle_eviction_secs = 42;

        let config = table_config(&settings);
        assert_eq!(config.pipeline.bucket_capacity, 7.0);
        assert_eq!(config.pipeline.refill_per_sec, 2.5);
        assert_eq!(config.pipeline.cost_per_message, 0.5);
        assert_eq!(config.pipeline.queue_capacity, 3);
        assert_eq!(config.pipeline.upstream_timeout, Duration::from_millis(1234));
        assert_eq!(config.pipeline.default_model, "m-default");
        assert_eq!(config.idle_eviction, Duration::from_secs(42));
    }
}
