//! Observability recorder.
//!
//! The execution engine fires lifecycle hooks through [`CallObserver`]. The
//! [`Recorder`] appends each hook as an immutable [`RecorderEvent`] and the
//! trace is a pure fold over that log ([`fold_events`]). A recorder belongs
//! to exactly one run: [`Recorder::finish`] seals it, and later events are
//! dropped.

pub mod clock;
pub mod events;
pub mod trace;

use std::sync::Arc;

use inquest_core::CallId;
use inquest_llm::{ModelResponse, ResolvedModel};
use parking_lot::Mutex;
use tracing::{debug, warn};

pub use clock::{Clock, ManualClock, SystemClock};
pub use events::{EventKind, EventPayload, RecorderEvent};
pub use trace::{
    InvestigationTrace, LlmCallStep, ToolExecutionStep, TraceStep, TraceSummary, fold_events,
};

/// Lifecycle hooks fired by the execution engine.
pub trait CallObserver: Send + Sync {
    /// A model call began.
    fn on_model_start(&self, call_id: &CallId, agent: Option<&str>);
    /// A model call returned.
    fn on_model_end(&self, call_id: &CallId, response: &ModelResponse);
    /// A tool call began.
    fn on_tool_start(&self, call_id: &CallId, agent: Option<&str>, tool_name: &str);
    /// A tool call returned; `error` is set on failure.
    fn on_tool_end(&self, call_id: &CallId, error: Option<&str>);
}

#[derive(Default)]
struct Log {
    events: Vec<RecorderEvent>,
    sealed: bool,
}

/// Single-run event sink that produces the [`InvestigationTrace`].
pub struct Recorder {
    model: ResolvedModel,
    clock: Arc<dyn Clock>,
    log: Mutex<Log>,
    verbose: bool,
}

impl Recorder {
    /// Recorder on the system clock.
    pub fn new(model: ResolvedModel) -> Self {
        Self::with_clock(model, Arc::new(SystemClock))
    }

    /// Recorder reading timestamps from `clock`.
    pub fn with_clock(model: ResolvedModel, clock: Arc<dyn Clock>) -> Self {
        Self {
            model,
            clock,
            log: Mutex::new(Log::default()),
            verbose: false,
        }
    }

    /// Log every recorded event at debug level.
    #[must_use]
    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Model used for cost attribution.
    pub fn model(&self) -> &ResolvedModel {
        &self.model
    }

    /// Append an event stamped with the current time.
    pub fn record(&self, call_id: &CallId, payload: EventPayload) {
        let event = RecorderEvent {
            call_id: call_id.clone(),
            timestamp: self.clock.now(),
            payload,
        };
        let mut log = self.log.lock();
        if log.sealed {
            warn!(call_id = %call_id, kind = ?event.kind(), "event after run finished, dropping");
            return;
        }
        if self.verbose {
            debug!(call_id = %call_id, kind = ?event.kind(), "recorded call event");
        }
        log.events.push(event);
    }

    /// Snapshot of the event log.
    pub fn events(&self) -> Vec<RecorderEvent> {
        self.log.lock().events.clone()
    }

    /// Trace of everything completed so far.
    pub fn trace(&self) -> InvestigationTrace {
        fold_events(&self.log.lock().events, &self.model)
    }

    /// Seal the recorder and return the final trace.
    pub fn finish(&self) -> InvestigationTrace {
        let mut log = self.log.lock();
        log.sealed = true;
        fold_events(&log.events, &self.model)
    }

    /// Whether [`finish`](Self::finish) has been called.
    pub fn is_sealed(&self) -> bool {
        self.log.lock().sealed
    }
}

impl CallObserver for Recorder {
    fn on_model_start(&self, call_id: &CallId, agent: Option<&str>) {
        self.record(
            call_id,
            EventPayload::ModelStart {
                agent: agent.map(str::to_owned),
            },
        );
    }

    fn on_model_end(&self, call_id: &CallId, response: &ModelResponse) {
        self.record(
            call_id,
            EventPayload::ModelEnd {
                metadata: response.metadata.clone(),
                tool_calls_decided: response.tool_call_names(),
            },
        );
    }

    fn on_tool_start(&self, call_id: &CallId, agent: Option<&str>, tool_name: &str) {
        self.record(
            call_id,
            EventPayload::ToolStart {
                agent: agent.map(str::to_owned),
                tool_name: tool_name.to_owned(),
            },
        );
    }

    fn on_tool_end(&self, call_id: &CallId, error: Option<&str>) {
        self.record(
            call_id,
            EventPayload::ToolEnd {
                success: error.is_none(),
                error: error.map(str::to_owned),
            },
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use inquest_core::Provider;
    use inquest_core::logging::capture_logs;
    use inquest_llm::resolve_model;
    use serde_json::json;
    use tracing::Level;

    fn recorder() -> (Recorder, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::at_epoch());
        let rec = Recorder::with_clock(resolve_model(Provider::Anthropic, None), clock.clone());
        (rec, clock)
    }

    #[test]
    fn hooks_build_timed_steps() {
        let (rec, clock) = recorder();
        let m = CallId::from("m");
        let t = CallId::from("t");

        rec.on_model_start(&m, Some("metrics"));
        clock.advance_ms(40);
        let response = ModelResponse::text("")
            .with_usage(100, 20)
            .with_tool_call("query", json!({}));
        rec.on_model_end(&m, &response);
        rec.on_tool_start(&t, Some("metrics"), "query");
        clock.advance_ms(15);
        rec.on_tool_end(&t, Some("boom"));

        let trace = rec.trace();
        assert_eq!(trace.steps.len(), 2);
        let TraceStep::LlmCall(llm) = &trace.steps[0] else {
            panic!("expected llm step first");
        };
        assert_eq!(llm.duration_ms, 40);
        assert_eq!(llm.agent.as_deref(), Some("metrics"));
        assert_eq!(llm.tool_calls_decided, Some(vec!["query".to_owned()]));
        let TraceStep::ToolExecution(tool) = &trace.steps[1] else {
            panic!("expected tool step second");
        };
        assert!(!tool.success);
        assert_eq!(tool.error.as_deref(), Some("boom"));
        assert_eq!(trace.summary.total_duration_ms, 55);
    }

    #[test]
    fn orphan_end_leaves_trace_unchanged() {
        let (rec, _clock) = recorder();
        rec.on_tool_end(&CallId::from("never-started"), None);
        assert!(rec.trace().steps.is_empty());
        // Still logged as an event
        assert_eq!(rec.events().len(), 1);
    }

    #[test]
    fn finish_seals_against_reuse() {
        let (logs, _guard) = capture_logs();
        let (rec, _clock) = recorder();
        let id = CallId::from("a");
        rec.on_model_start(&id, None);
        rec.on_model_end(&id, &ModelResponse::text("done"));

        let first = rec.finish();
        assert!(rec.is_sealed());

        let late = CallId::from("late");
        rec.on_model_start(&late, None);
        rec.on_model_end(&late, &ModelResponse::text("late"));

        assert_eq!(rec.trace(), first);
        assert_eq!(rec.events().len(), 2);
        assert!(logs.has_event(Level::WARN, "event after run finished"));
    }

    fn replay(rec: &Recorder, clock: &ManualClock) -> InvestigationTrace {
        let m = CallId::from("m");
        let t = CallId::from("t");
        rec.on_model_start(&m, Some("logs"));
        clock.advance_ms(30);
        rec.on_model_end(&m, &ModelResponse::text("").with_usage(50, 5));
        rec.on_tool_start(&t, Some("logs"), "search");
        clock.advance_ms(10);
        rec.on_tool_end(&t, None);
        rec.finish()
    }

    #[test]
    fn verbose_logs_each_event() {
        let (logs, _guard) = capture_logs();
        let (quiet, quiet_clock) = recorder();
        let (loud, loud_clock) = recorder();
        let loud = loud.verbose(true);

        let quiet_trace = replay(&quiet, &quiet_clock);
        assert_eq!(logs.count_at_level(Level::DEBUG), 0);
        let loud_trace = replay(&loud, &loud_clock);

        assert_eq!(logs.count_at_level(Level::DEBUG), 4);
        assert_eq!(loud_trace, quiet_trace);
        assert_eq!(loud_trace.steps.len(), 2);
    }
}
