//! # relay-settings
//!
//! Layered configuration for the relay service.
//!
//! Settings are loaded from three layers (in priority order):
//! 1. **Compiled defaults** — [`RelaySettings::default()`]
//! 2. **User file** — `~/.relay/settings.json` (deep-merged over defaults)
//! 3. **Environment variables** — `RELAY_*` overrides (highest priority)
//!
//! The core pipeline does not own configuration: the binary loads settings
//! once at startup and injects the relevant values (limiter parameters,
//! queue capacity, upstream timeout, default model, eviction window) into
//! the components that consume them.

#![deny(unsafe_code)]

pub mod errors;
pub mod loader;
pub mod types;

pub use errors::{Result, SettingsError};
pub use loader::{deep_merge, load_settings, load_settings_from_path, settings_path};
pub use types::*;
