//! Runtime error taxonomy.
//!
//! Configuration errors fail before any work starts. Tool failures and
//! partial gather failures never reach [`RuntimeError`]: they are converted
//! into recoverable outcomes at the point where they happen.

use std::any::Any;
use std::time::Duration;

use inquest_llm::ModelError;
use inquest_settings::SettingsError;
use thiserror::Error;

/// Invalid setup, detected before a run does any work.
#[derive(Debug, Error)]
pub enum ConfigurationError {
    /// A run needs at least one worker.
    #[error("at least one worker is required")]
    NoWorkers,
    /// Two workers share a name.
    #[error("duplicate worker name `{0}`")]
    DuplicateWorker(String),
    /// Settings failed validation.
    #[error(transparent)]
    Settings(#[from] SettingsError),
}

/// A scoped deadline elapsed before the operation finished.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("{label} timed out after {}ms", .deadline.as_millis())]
pub struct TimeoutError {
    /// What was being waited on.
    pub label: String,
    /// The deadline that elapsed.
    pub deadline: Duration,
}

impl TimeoutError {
    /// Build from a label and deadline.
    pub fn new(label: impl Into<String>, deadline: Duration) -> Self {
        Self {
            label: label.into(),
            deadline,
        }
    }

    /// Deadline in whole milliseconds.
    #[allow(clippy::cast_possible_truncation)]
    pub fn deadline_ms(&self) -> u64 {
        self.deadline.as_millis() as u64
    }
}

/// A spawned operation was cancelled by the runtime before it finished,
/// with no deadline involved.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("{label} was aborted before it finished")]
pub struct TaskAborted {
    /// What was being waited on.
    pub label: String,
}

/// An individual tool call failed. Always recoverable.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ToolExecutionError {
    /// The tool reported a failure.
    #[error("{0}")]
    Failed(String),
    /// No tool with this name.
    #[error("unknown tool `{0}`")]
    UnknownTool(String),
    /// Arguments did not match the tool's input schema.
    #[error("invalid input: {0}")]
    InvalidInput(String),
    /// The per-step deadline elapsed.
    #[error(transparent)]
    Timeout(#[from] TimeoutError),
    /// The tool panicked.
    #[error("tool crashed: {0}")]
    Panicked(String),
}

/// One or more fan-out targets failed. Reported alongside the successes,
/// never as a batch failure.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("{} of {total} targets failed: {}", .failed.len(), .failed.join(", "))]
pub struct PartialGatherFailure {
    /// Failed target keys, sorted.
    pub failed: Vec<String>,
    /// Number of targets in the batch.
    pub total: usize,
}

/// Errors that end an investigation run.
#[derive(Debug, Error)]
pub enum RuntimeError {
    /// Invalid setup.
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),
    /// A deadline elapsed at run level or on a model call.
    #[error(transparent)]
    Timeout(#[from] TimeoutError),
    /// The iteration budget ran out.
    #[error("recursion limit of {limit} steps exceeded")]
    RecursionExceeded {
        /// Configured or computed limit.
        limit: u32,
    },
    /// A model call failed.
    #[error("model call failed: {0}")]
    Model(#[from] ModelError),
    /// The caller cancelled the run.
    #[error("run cancelled")]
    Cancelled,
    /// Bug or broken invariant.
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<SettingsError> for RuntimeError {
    fn from(err: SettingsError) -> Self {
        Self::Configuration(ConfigurationError::Settings(err))
    }
}

impl RuntimeError {
    /// Stable category string for logs and reports.
    pub fn category(&self) -> &'static str {
        match self {
            Self::Configuration(_) => "configuration",
            Self::Timeout(_) => "timeout",
            Self::RecursionExceeded { .. } => "recursion_exceeded",
            Self::Model(_) => "model",
            Self::Cancelled => "cancelled",
            Self::Internal(_) => "internal",
        }
    }

    /// Reason shown to the requester. Never an internal trace.
    pub fn user_message(&self) -> String {
        match self {
            Self::Configuration(e) => format!("The investigation could not start: {e}."),
            Self::Timeout(e) => format!(
                "The investigation did not finish in time ({} exceeded {}s).",
                e.label,
                e.deadline.as_secs()
            ),
            Self::RecursionExceeded { limit } => format!(
                "The investigation stopped after reaching its limit of {limit} steps. \
                 Narrow the question or raise recursionLimit."
            ),
            Self::Model(_) => "The language model backend failed to respond.".to_owned(),
            Self::Cancelled => "The investigation was cancelled.".to_owned(),
            Self::Internal(_) => "The investigation failed due to an internal error.".to_owned(),
        }
    }
}

/// Best-effort text of a panic payload.
pub(crate) fn panic_message(panic: &(dyn Any + Send)) -> String {
    panic
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| panic.downcast_ref::<&str>().copied())
        .unwrap_or("unknown panic")
        .to_owned()
}
