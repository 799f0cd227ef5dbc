//! Settings loading with deep merge and environment variable overrides.
//!
//! Loading flow:
//! 1. Start with compiled [`InvestigationSettings::default()`]
//! 2. If `~/.inquest/settings.json` exists, deep-merge user values over defaults
//! 3. Apply `INQUEST_*` environment overrides (highest priority)
//!
//! Deep merge rules:
//! - Objects are merged recursively (source overrides target per-key)
//! - Arrays and primitives are replaced entirely by source
//! - Null values in source are skipped (preserving target)

use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::{debug, warn};

use crate::errors::Result;
use crate::types::InvestigationSettings;

/// Resolve the path to the settings file (`~/.inquest/settings.json`).
pub fn settings_path() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
    PathBuf::from(home).join(".inquest").join("settings.json")
}

/// Load settings from the default path with env var overrides.
pub fn load_settings() -> Result<InvestigationSettings> {
    load_settings_from_path(&settings_path())
}

/// Load settings from a specific path with env var overrides.
///
/// A missing file yields defaults. Invalid JSON is an error.
pub fn load_settings_from_path(path: &Path) -> Result<InvestigationSettings> {
    let mut settings = load_file_layer(path)?;
    apply_env_overrides(&mut settings);
    Ok(settings)
}

fn load_file_layer(path: &Path) -> Result<InvestigationSettings> {
    let defaults = serde_json::to_value(InvestigationSettings::default())?;

    let merged = if path.exists() {
        debug!(?path, "loading settings from file");
        let content = std::fs::read_to_string(path)?;
        let user: Value = serde_json::from_str(&content)?;
        deep_merge(defaults, user)
    } else {
        debug!(?path, "settings file not found, using defaults");
        defaults
    };

    Ok(serde_json::from_value(merged)?)
}

/// Recursive deep merge of two JSON values.
pub fn deep_merge(target: Value, source: Value) -> Value {
    match (target, source) {
        (Value::Object(mut target_map), Value::Object(source_map)) => {
            for (key, source_val) in source_map {
                if source_val.is_null() {
                    continue;
                }
                let merged = match target_map.remove(&key) {
                    Some(target_val) => deep_merge(target_val, source_val),
                    None => source_val,
                };
                let _ = target_map.insert(key, merged);
            }
            Value::Object(target_map)
        }
        (_, source) => source,
    }
}

/// Apply `INQUEST_*` environment variable overrides.
pub fn apply_env_overrides(settings: &mut InvestigationSettings) {
    apply_overrides(settings, |name| std::env::var(name).ok());
}

/// Apply overrides read through `lookup`.
///
/// Integers must parse and sit inside the field's allowed range; booleans
/// accept `true`/`1`/`yes`/`on` and `false`/`0`/`no`/`off`. Anything else
/// is logged and ignored, leaving the file/default value in place.
pub fn apply_overrides<F>(settings: &mut InvestigationSettings, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    let env = EnvReader { lookup };

    if let Some(v) = env.string("INQUEST_PROVIDER") {
        settings.provider = v;
    }
    if let Some(v) = env.string("INQUEST_MODEL") {
        settings.model = Some(v);
    }
    if let Some(v) = env.u64("INQUEST_RECURSION_LIMIT", 1, 100) {
        settings.recursion_limit = u32::try_from(v).ok();
    }
    if let Some(v) = env.u64("INQUEST_MAX_TOOL_CALLS", 1, 100) {
        settings.max_tool_calls = u32::try_from(v).unwrap_or(settings.max_tool_calls);
    }
    if let Some(v) = env.u64("INQUEST_TIMEOUT_MS", 1000, 600_000) {
        settings.timeout_ms = v;
    }
    if let Some(v) = env.u64("INQUEST_STEP_TIMEOUT_SEC", 10, 300) {
        settings.step_timeout_sec = v;
    }
    if let Some(v) = env.u64("INQUEST_MAX_TOKENS", 100, 128_000) {
        settings.max_tokens = u32::try_from(v).unwrap_or(settings.max_tokens);
    }
    if let Some(v) = env.f64("INQUEST_TEMPERATURE", 0.0, 2.0) {
        settings.temperature = v;
    }
    if let Some(v) = env.bool("INQUEST_VERBOSE") {
        settings.verbose_logging = v;
    }
}

// ── Pure parsing functions (testable without env vars) ──────────────────────

/// Parse a string as a boolean.
///
/// Accepts (case-insensitive): `true`/`1`/`yes`/`on` or `false`/`0`/`no`/`off`.
pub fn parse_bool(val: &str) -> Option<bool> {
    match val.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Parse a string as a `u64` within a range.
pub fn parse_u64_range(val: &str, min: u64, max: u64) -> Option<u64> {
    let n: u64 = val.trim().parse().ok()?;
    (min..=max).contains(&n).then_some(n)
}

/// Parse a string as a finite `f64` within a range.
pub fn parse_f64_range(val: &str, min: f64, max: f64) -> Option<f64> {
    let n: f64 = val.trim().parse().ok()?;
    (n.is_finite() && (min..=max).contains(&n)).then_some(n)
}

// ── Env readers (thin wrappers) ─────────────────────────────────────────────

struct EnvReader<F> {
    lookup: F,
}

impl<F> EnvReader<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn string(&self, name: &str) -> Option<String> {
        (self.lookup)(name)
            .map(|v| v.trim().to_owned())
            .filter(|v| !v.is_empty())
    }

    fn bool(&self, name: &str) -> Option<bool> {
        let val = (self.lookup)(name)?;
        let result = parse_bool(&val);
        if result.is_none() {
            warn!(key = name, value = %val, "invalid boolean env var, ignoring");
        }
        result
    }

    fn u64(&self, name: &str, min: u64, max: u64) -> Option<u64> {
        let val = (self.lookup)(name)?;
        let result = parse_u64_range(&val, min, max);
        if result.is_none() {
            warn!(key = name, value = %val, min, max, "invalid integer env var, ignoring");
        }
        result
    }

    fn f64(&self, name: &str, min: f64, max: f64) -> Option<f64> {
        let val = (self.lookup)(name)?;
        let result = parse_f64_range(&val, min, max);
        if result.is_none() {
            warn!(key = name, value = %val, "invalid float env var, ignoring");
        }
        result
    }
}
