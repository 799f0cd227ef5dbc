//! Settings error types.

use inquest_core::UnknownProviderError;
use thiserror::Error;

/// Errors that can occur when loading or validating settings.
#[derive(Debug, Error)]
pub enum SettingsError {
    /// Failed to read the settings file from disk.
    #[error("failed to read settings file: {0}")]
    Io(#[from] std::io::Error),
    /// Failed to parse JSON in the settings file.
    #[error("failed to parse settings JSON: {0}")]
    Json(#[from] serde_json::Error),
    /// A value fell outside its allowed range.
    #[error("invalid settings value: {field} = {value} (allowed {allowed})")]
    OutOfRange {
        /// camelCase settings key.
        field: &'static str,
        /// Offending value, rendered.
        value: String,
        /// Human-readable allowed range.
        allowed: &'static str,
    },
    /// The provider is not one of the supported backends.
    #[error(transparent)]
    UnknownProvider(#[from] UnknownProviderError),
}

/// Result type for settings operations.
pub type Result<T> = std::result::Result<T, SettingsError>;
