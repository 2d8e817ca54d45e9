//! Settings loading: defaults → JSON file → environment overrides.

use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::debug;

use crate::errors::Result;
use crate::types::RelaySettings;

/// Default settings file location: `~/.relay/settings.json`.
#[must_use]
pub fn settings_path() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".into());
    Path::new(&home).join(".relay").join("settings.json")
}

/// Deep-merge `overlay` onto `base`.
///
/// Objects merge recursively; any other value in `overlay` replaces the
/// corresponding value in `base`.
#[must_use]
pub fn deep_merge(base: Value, overlay: Value) -> Value {
    match (base, overlay) {
        (Value::Object(mut base_map), Value::Object(overlay_map)) => {
            for (key, overlay_value) in overlay_map {
                let merged = match base_map.remove(&key) {
                    Some(base_value) => deep_merge(base_value, overlay_value),
                    None => overlay_value,
                };
                let _ = base_map.insert(key, merged);
            }
            Value::Object(base_map)
        }
        (_, overlay) => overlay,
    }
}

/// Load settings from the default path with env overrides applied.
///
/// A missing file is not an error — defaults are used. A malformed file is.
pub fn load_settings() -> Result<RelaySettings> {
    load_settings_from_path(&settings_path())
}

/// Load settings from a specific file path with env overrides applied.
pub fn load_settings_from_path(path: &Path) -> Result<RelaySettings> {
    let defaults = serde_json::to_value(RelaySettings::default())?;

    let merged = if path.exists() {
        let raw = std::fs::read_to_string(path)?;
        let file_value: Value = serde_json::from_str(&raw)?;
        debug!(?path, "loaded settings file");
        deep_merge(defaults, file_value)
    } else {
        debug!(?path, "no settings file, using defaults");
        defaults
    };

    let mut settings: RelaySettings = serde_json::from_value(merged)?;
    apply_env_overrides(&mut settings);
    Ok(settings)
}

/// Apply `RELAY_*` environment variable overrides (highest priority).
fn apply_env_overrides(settings: &mut RelaySettings) {
    if let Ok(port) = std::env::var("RELAY_WS_PORT")
        && let Ok(port) = port.parse()
    {
        settings.server.ws_port = port;
    }
    if let Ok(path) = std::env::var("RELAY_DB_PATH") {
        settings.server.db_path = path;
    }
    if let Ok(key) = std::env::var("RELAY_API_KEY") {
        settings.upstream.api_key = Some(key);
    }
    if let Ok(model) = std::env::var("RELAY_DEFAULT_MODEL") {
        settings.upstream.default_model = model;
    }
    if let Ok(url) = std::env::var("RELAY_UPSTREAM_URL") {
        settings.upstream.base_url = url;
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
