//! In-memory log capture for asserting on what a run logged.

use std::fmt::Debug;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::{Context, SubscriberExt};
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{Layer, Registry};

/// One recorded event.
#[derive(Clone, Debug)]
pub struct CapturedEvent {
    /// Event level.
    pub level: Level,
    /// Rendered `message` field.
    pub message: String,
    /// Remaining fields in declaration order, values rendered as text.
    pub fields: Vec<(String, String)>,
}

impl CapturedEvent {
    /// Rendered value of field `name`.
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find_map(|(key, value)| (key == name).then_some(value.as_str()))
    }
}

/// Shared handle onto the captured events.
#[derive(Clone, Default)]
pub struct CapturedLogs(Arc<Mutex<Vec<CapturedEvent>>>);

impl CapturedLogs {
    /// Snapshot of everything captured so far.
    pub fn events(&self) -> Vec<CapturedEvent> {
        self.0.lock().clone()
    }

    /// True if an event at `level` has a message containing `needle`.
    pub fn has_event(&self, level: Level, needle: &str) -> bool {
        self.0
            .lock()
            .iter()
            .any(|event| event.level == level && event.message.contains(needle))
    }

    /// Number of events at `level`.
    pub fn count_at_level(&self, level: Level) -> usize {
        self.0.lock().iter().filter(|event| event.level == level).count()
    }
}

#[derive(Default)]
struct Recorded {
    message: String,
    fields: Vec<(String, String)>,
}

impl Recorded {
    fn put(&mut self, field: &Field, value: String) {
        if field.name() == "message" {
            self.message = value;
        } else {
            self.fields.push((field.name().to_owned(), value));
        }
    }
}

impl Visit for Recorded {
    fn record_str(&mut self, field: &Field, value: &str) {
        self.put(field, value.to_owned());
    }

    fn record_debug(&mut self, field: &Field, value: &dyn Debug) {
        self.put(field, format!("{value:?}"));
    }
}

struct Capture(CapturedLogs);

impl<S> Layer<S> for Capture
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let mut recorded = Recorded::default();
        event.record(&mut recorded);
        self.0.0.lock().push(CapturedEvent {
            level: *event.metadata().level(),
            message: recorded.message,
            fields: recorded.fields,
        });
    }
}

/// Capture every event on the current thread until the guard drops.
///
/// The subscriber is thread-local, so async tests should use the
/// current-thread runtime to see events from spawned tasks.
pub fn capture_logs() -> (CapturedLogs, tracing::subscriber::DefaultGuard) {
    let logs = CapturedLogs::default();
    let guard = Registry::default()
        .with(Capture(logs.clone()))
        .set_default();
    (logs, guard)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_by_level() {
        let (logs, _guard) = capture_logs();
        tracing::debug!("step charged");
        tracing::warn!("partial output truncated");
        tracing::warn!("gather target failed");

        assert_eq!(logs.count_at_level(Level::WARN), 2);
        assert_eq!(logs.count_at_level(Level::DEBUG), 1);
        assert!(logs.has_event(Level::WARN, "truncated"));
        assert!(!logs.has_event(Level::ERROR, "truncated"));
    }

    #[test]
    fn keeps_structured_fields() {
        let (logs, _guard) = capture_logs();
        tracing::warn!(key = "billing", attempt = 2, "gather target failed");

        let events = logs.events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].message, "gather target failed");
        assert_eq!(events[0].field("key"), Some("billing"));
        assert_eq!(events[0].field("attempt"), Some("2"));
    }
}
