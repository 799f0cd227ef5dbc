//! Validated, immutable configuration for one run.

use std::fmt::Display;
use std::ops::RangeInclusive;
use std::time::Duration;

use inquest_core::Provider;
use serde::Serialize;

use crate::errors::{Result, SettingsError};
use crate::types::InvestigationSettings;

/// Configuration a run consumes. Created once per request, never mutated.
///
/// Only obtainable through [`InvestigationSettings::validate`], so every
/// value is known to be in range.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunConfig {
    recursion_limit: Option<u32>,
    max_tool_calls: u32,
    timeout_ms: u64,
    step_timeout_sec: u64,
    temperature: f64,
    provider: Provider,
    model: Option<String>,
    max_tokens: u32,
    max_worker_iterations: u32,
    max_partial_output_chars: usize,
    verbose_logging: bool,
}

fn check<T>(field: &'static str, value: T, range: RangeInclusive<T>, allowed: &'static str) -> Result<T>
where
    T: PartialOrd + Display + Copy,
{
    if range.contains(&value) {
        Ok(value)
    } else {
        Err(SettingsError::OutOfRange {
            field,
            value: value.to_string(),
            allowed,
        })
    }
}

impl InvestigationSettings {
    /// Validate every range and resolve the provider.
    ///
    /// Fails fast on the first invalid field; an unknown provider is fatal.
    pub fn validate(&self) -> Result<RunConfig> {
        let recursion_limit = self
            .recursion_limit
            .map(|v| check("recursionLimit", v, 1..=100, "1..=100"))
            .transpose()?;
        let temperature = check("temperature", self.temperature, 0.0..=2.0, "0..=2")?;
        let model = self
            .model
            .as_deref()
            .map(str::trim)
            .filter(|m| !m.is_empty())
            .map(str::to_owned);

        Ok(RunConfig {
            recursion_limit,
            max_tool_calls: check("maxToolCalls", self.max_tool_calls, 1..=100, "1..=100")?,
            timeout_ms: check("timeoutMs", self.timeout_ms, 1000..=600_000, "1000..=600000")?,
            step_timeout_sec: check("stepTimeoutSec", self.step_timeout_sec, 10..=300, "10..=300")?,
            temperature,
            provider: self.provider.parse::<Provider>()?,
            model,
            max_tokens: check("maxTokens", self.max_tokens, 100..=128_000, "100..=128000")?,
            max_worker_iterations: check(
                "maxWorkerIterations",
                self.max_worker_iterations,
                1..=50,
                "1..=50",
            )?,
            max_partial_output_chars: check(
                "maxPartialOutputChars",
                self.max_partial_output_chars,
                100..=100_000,
                "100..=100000",
            )?,
            verbose_logging: self.verbose_logging,
        })
    }
}

impl RunConfig {
    /// Explicit iteration budget override, if configured.
    pub fn recursion_limit(&self) -> Option<u32> {
        self.recursion_limit
    }

    /// Shared tool-call quota.
    pub fn max_tool_calls(&self) -> u32 {
        self.max_tool_calls
    }

    /// Overall run deadline.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Per-operation deadline.
    pub fn step_timeout(&self) -> Duration {
        Duration::from_secs(self.step_timeout_sec)
    }

    /// Sampling temperature.
    pub fn temperature(&self) -> f64 {
        self.temperature
    }

    /// Selected model backend.
    pub fn provider(&self) -> Provider {
        self.provider
    }

    /// Model override, if configured.
    pub fn model_override(&self) -> Option<&str> {
        self.model.as_deref()
    }

    /// Completion token cap per model call.
    pub fn max_tokens(&self) -> u32 {
        self.max_tokens
    }

    /// Per-worker decide/act iteration cap.
    pub fn max_worker_iterations(&self) -> u32 {
        self.max_worker_iterations
    }

    /// Bound for partial output kept after a late failure.
    pub fn max_partial_output_chars(&self) -> usize {
        self.max_partial_output_chars
    }

    /// Whether verbose logging is on.
    pub fn verbose_logging(&self) -> bool {
        self.verbose_logging
    }
}
