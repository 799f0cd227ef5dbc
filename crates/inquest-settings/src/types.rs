//! Settings type definitions.
//!
//! Field names are camelCase on the wire. Missing fields take their default
//! during deserialization, so partial JSON files are valid.

use serde::{Deserialize, Serialize};

/// Default tool-call quota per run.
pub const DEFAULT_MAX_TOOL_CALLS: u32 = 30;
/// Default overall run deadline (10 minutes).
pub const DEFAULT_TIMEOUT_MS: u64 = 600_000;
/// Default per-operation deadline.
pub const DEFAULT_STEP_TIMEOUT_SEC: u64 = 120;
/// Default completion token cap.
pub const DEFAULT_MAX_TOKENS: u32 = 60_000;
/// Default per-worker iteration cap.
pub const DEFAULT_MAX_WORKER_ITERATIONS: u32 = 10;
/// Default bound for partial output preserved after a late failure.
pub const DEFAULT_MAX_PARTIAL_OUTPUT_CHARS: usize = 4000;

/// Raw investigation settings as loaded from file and environment.
///
/// Nothing here is trusted until [`InvestigationSettings::validate`] turns
/// it into a [`RunConfig`](crate::RunConfig).
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct InvestigationSettings {
    /// Explicit iteration budget. Unset means "use the computed budget".
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recursion_limit: Option<u32>,
    /// Shared tool-call quota for one run.
    pub max_tool_calls: u32,
    /// Overall run deadline in milliseconds.
    pub timeout_ms: u64,
    /// Per-operation deadline in seconds.
    pub step_timeout_sec: u64,
    /// Sampling temperature.
    pub temperature: f64,
    /// Model backend name.
    pub provider: String,
    /// Model override; falls back to the provider default when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    /// Completion token cap per model call.
    pub max_tokens: u32,
    /// Per-worker decide/act iteration cap.
    pub max_worker_iterations: u32,
    /// Bound for partial output kept after a late failure.
    pub max_partial_output_chars: usize,
    /// Extra log detail. Never affects trace contents.
    pub verbose_logging: bool,
}

impl Default for InvestigationSettings {
    fn default() -> Self {
        Self {
            recursion_limit: None,
            max_tool_calls: DEFAULT_MAX_TOOL_CALLS,
            timeout_ms: DEFAULT_TIMEOUT_MS,
            step_timeout_sec: DEFAULT_STEP_TIMEOUT_SEC,
            temperature: 0.0,
            provider: "anthropic".to_string(),
            model: None,
            max_tokens: DEFAULT_MAX_TOKENS,
            max_worker_iterations: DEFAULT_MAX_WORKER_ITERATIONS,
            max_partial_output_chars: DEFAULT_MAX_PARTIAL_OUTPUT_CHARS,
            verbose_logging: false,
        }
    }
}
