//! Settings types and compiled defaults.

use serde::{Deserialize, Serialize};

/// Root settings for the relay service.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RelaySettings {
    /// Host process settings.
    pub server: ServerSettings,
    /// Per-session token bucket parameters.
    pub limiter: LimiterSettings,
    /// Per-session backpressure queue parameters.
    pub queue: QueueSettings,
    /// Upstream provider parameters.
    pub upstream: UpstreamSettings,
    /// Session table lifecycle parameters.
    pub sessions: SessionSettings,
}

impl Default for RelaySettings {
    fn default() -> Self {
        Self {
            server: ServerSettings::default(),
            limiter: LimiterSettings::default(),
            queue: QueueSettings::default(),
            upstream: UpstreamSettings::default(),
            sessions: SessionSettings::default(),
        }
    }
}

/// Host process settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerSettings {
    /// WebSocket listen port.
    pub ws_port: u16,
    /// SQLite history database path.
    pub db_path: String,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            ws_port: 8080,
            db_path: "relay.db".into(),
        }
    }
}

/// Token bucket parameters (one bucket per session).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LimiterSettings {
    /// Bucket capacity — the burst ceiling.
    pub capacity: f64,
    /// Refill rate in tokens per second.
    pub refill_per_sec: f64,
    /// Tokens consumed per admitted message.
    pub cost_per_message: f64,
}

impl Default for LimiterSettings {
    fn default() -> Self {
        Self {
            capacity: 10.0,
            refill_per_sec: 1.0,
            cost_per_message: 1.0,
        }
    }
}

/// Backpressure queue parameters.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct QueueSettings {
    /// Maximum queued messages per session before producers are rejected.
    pub capacity: usize,
}

impl Default for QueueSettings {
    fn default() -> Self {
        Self { capacity: 16 }
    }
}

/// Upstream provider parameters.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UpstreamSettings {
    /// Provider API base URL.
    pub base_url: String,
    /// Bearer token for the provider. Usually supplied via `RELAY_API_KEY`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    /// Model used when the client request carries none.
    pub default_model: String,
    /// Maximum duration of one streaming call, in milliseconds.
    pub request_timeout_ms: u64,
}

impl Default for UpstreamSettings {
    fn default() -> Self {
        Self {
            base_url: "https://openrouter.ai/api/v1".into(),
            api_key: None,
            default_model: "google/gemini-flash-1.5".into(),
            request_timeout_ms: 60_000,
        }
    }
}

/// Session table lifecycle parameters.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SessionSettings {
    /// Seconds a disconnected session stays in the table before eviction.
    pub idle_eviction_secs: u64,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            idle_eviction_secs: 300,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
