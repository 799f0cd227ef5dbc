//! # inquest-settings
//!
//! Configuration for investigation runs, loaded from three layers (in
//! priority order):
//! 1. **Compiled defaults**: [`InvestigationSettings::default()`]
//! 2. **User file**: `~/.inquest/settings.json` (deep-merged over defaults)
//! 3. **Environment variables**: `INQUEST_*` overrides (highest priority)
//!
//! Loaded settings are validated once into an immutable [`RunConfig`], which
//! is what a run actually consumes.

#![deny(unsafe_code)]

pub mod errors;
pub mod loader;
pub mod run_config;
pub mod types;

pub use errors::{Result, SettingsError};
pub use loader::{deep_merge, load_settings, load_settings_from_path, settings_path};
pub use run_config::RunConfig;
pub use types::InvestigationSettings;
