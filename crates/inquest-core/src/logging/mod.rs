//! Structured logging with `tracing`.
//!
//! Log context (run ID, worker, tool, gather target) travels as structured
//! fields and `#[instrument]` spans. The subscriber writes compact
//! human-readable output to stderr; `RUST_LOG` overrides the configured level.

pub mod test_utils;

pub use test_utils::{CapturedEvent, CapturedLogs, capture_logs};

/// Log level used when verbose logging is off.
pub const DEFAULT_LEVEL: &str = "info";
/// Log level used when verbose logging is on.
pub const VERBOSE_LEVEL: &str = "debug";

/// Map the `verboseLogging` setting to a level filter string.
pub fn level_for(verbose: bool) -> &'static str {
    if verbose { VERBOSE_LEVEL } else { DEFAULT_LEVEL }
}

/// Initialize the global tracing subscriber with stderr output.
///
/// Call once at application startup. Subsequent calls are no-ops.
pub fn init_subscriber(level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .compact();

    // try_init fails if a global subscriber is already set
    let _ = subscriber.try_init();
}

/// Initialize the global subscriber with JSON lines on stderr.
pub fn init_json_subscriber(level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .json();

    let _ = subscriber.try_init();
}
