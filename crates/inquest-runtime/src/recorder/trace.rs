//! Trace types and the fold that builds them from the event log.

use std::collections::HashMap;
use std::fmt::Write as _;

use chrono::{DateTime, Utc};
use inquest_core::{CallId, Provider};
use inquest_llm::{ResolvedModel, Usd, estimate_cost, extract_usage, format_cost, format_tokens};
use serde::{Deserialize, Serialize};

use super::events::{EventPayload, RecorderEvent};

/// A completed model call.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LlmCallStep {
    /// Run-wide sequence number, assigned at completion.
    pub order: u64,
    /// When the call started.
    pub timestamp: DateTime<Utc>,
    /// Start to end.
    pub duration_ms: u64,
    /// Worker or supervisor that made the call.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agent: Option<String>,
    /// Prompt tokens.
    pub input_tokens: u64,
    /// Completion tokens.
    pub output_tokens: u64,
    /// `input_tokens + output_tokens`.
    pub total_tokens: u64,
    /// Estimated cost at record time.
    pub cost: Usd,
    /// Tools the model asked for next.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_calls_decided: Option<Vec<String>>,
}

/// A completed tool call.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolExecutionStep {
    /// Run-wide sequence number, assigned at completion.
    pub order: u64,
    /// When the call started.
    pub timestamp: DateTime<Utc>,
    /// Start to end.
    pub duration_ms: u64,
    /// Worker that invoked the tool.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agent: Option<String>,
    /// Tool name.
    pub tool_name: String,
    /// Whether the tool succeeded.
    pub success: bool,
    /// Failure description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// One entry of an [`InvestigationTrace`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TraceStep {
    /// Model call.
    LlmCall(LlmCallStep),
    /// Tool call.
    ToolExecution(ToolExecutionStep),
}

impl TraceStep {
    /// Sequence number.
    pub fn order(&self) -> u64 {
        match self {
            Self::LlmCall(s) => s.order,
            Self::ToolExecution(s) => s.order,
        }
    }

    /// Start time.
    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            Self::LlmCall(s) => s.timestamp,
            Self::ToolExecution(s) => s.timestamp,
        }
    }

    /// Duration in milliseconds.
    pub fn duration_ms(&self) -> u64 {
        match self {
            Self::LlmCall(s) => s.duration_ms,
            Self::ToolExecution(s) => s.duration_ms,
        }
    }

    /// Start time plus duration.
    pub fn end_time(&self) -> DateTime<Utc> {
        let millis = i64::try_from(self.duration_ms()).unwrap_or(i64::MAX);
        self.timestamp() + chrono::TimeDelta::milliseconds(millis)
    }
}

/// Aggregates over every step of a trace.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TraceSummary {
    /// Last step end minus first step start.
    pub total_duration_ms: u64,
    /// Number of model calls.
    pub llm_call_count: usize,
    /// Number of tool calls.
    pub tool_execution_count: usize,
    /// Tokens over all model calls.
    pub total_tokens: u64,
    /// Cost over all model calls.
    pub total_cost: Usd,
    /// Model the run used.
    pub model: String,
    /// Backend the run used.
    pub provider: Provider,
}

/// Chronological, cost-annotated record of one run.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvestigationTrace {
    /// Steps sorted by start time.
    pub steps: Vec<TraceStep>,
    /// Totals.
    pub summary: TraceSummary,
}

impl InvestigationTrace {
    /// Plain-text summary for reports.
    pub fn render_summary(&self) -> String {
        let s = &self.summary;
        let mut out = String::new();
        let _ = writeln!(out, "Model: {}/{}", s.provider, s.model);
        let _ = writeln!(
            out,
            "Calls: {} model, {} tool",
            s.llm_call_count, s.tool_execution_count
        );
        let _ = writeln!(out, "Tokens: {}", format_tokens(s.total_tokens));
        let _ = writeln!(out, "Cost: {}", format_cost(s.total_cost));
        let _ = write!(out, "Duration: {:.1}s", duration_secs(s.total_duration_ms));
        let failed: Vec<&str> = self
            .steps
            .iter()
            .filter_map(|step| match step {
                TraceStep::ToolExecution(t) if !t.success => Some(t.tool_name.as_str()),
                _ => None,
            })
            .collect();
        if !failed.is_empty() {
            let _ = write!(out, "\nFailed tool calls: {}", failed.join(", "));
        }
        out
    }
}

#[allow(clippy::cast_precision_loss)]
fn duration_secs(ms: u64) -> f64 {
    ms as f64 / 1000.0
}

struct PendingCall {
    started: DateTime<Utc>,
    agent: Option<String>,
    tool_name: Option<String>,
}

fn elapsed_ms(start: DateTime<Utc>, end: DateTime<Utc>) -> u64 {
    u64::try_from((end - start).num_milliseconds()).unwrap_or(0)
}

/// Build a trace from an ordered event log.
///
/// Ends without a matching start are ignored. Sequence numbers are
/// assigned in completion order; steps are then stably sorted by start
/// time. Cost uses `model` for every call.
pub fn fold_events(events: &[RecorderEvent], model: &ResolvedModel) -> InvestigationTrace {
    let mut model_calls: HashMap<&CallId, PendingCall> = HashMap::new();
    let mut tool_calls: HashMap<&CallId, PendingCall> = HashMap::new();
    let mut steps = Vec::new();
    let mut next_order = 1u64;

    for event in events {
        match &event.payload {
            EventPayload::ModelStart { agent } => {
                let _ = model_calls.insert(
                    &event.call_id,
                    PendingCall {
                        started: event.timestamp,
                        agent: agent.clone(),
                        tool_name: None,
                    },
                );
            }
            EventPayload::ToolStart { agent, tool_name } => {
                let _ = tool_calls.insert(
                    &event.call_id,
                    PendingCall {
                        started: event.timestamp,
                        agent: agent.clone(),
                        tool_name: Some(tool_name.clone()),
                    },
                );
            }
            EventPayload::ModelEnd {
                metadata,
                tool_calls_decided,
            } => {
                let Some(pending) = model_calls.remove(&event.call_id) else {
                    continue;
                };
                let usage = extract_usage(metadata);
                steps.push(TraceStep::LlmCall(LlmCallStep {
                    order: next_order,
                    timestamp: pending.started,
                    duration_ms: elapsed_ms(pending.started, event.timestamp),
                    agent: pending.agent,
                    input_tokens: usage.input_tokens,
                    output_tokens: usage.output_tokens,
                    total_tokens: usage.total(),
                    cost: estimate_cost(
                        usage.input_tokens,
                        usage.output_tokens,
                        &model.model,
                        model.provider,
                    ),
                    tool_calls_decided: (!tool_calls_decided.is_empty())
                        .then(|| tool_calls_decided.clone()),
                }));
                next_order += 1;
            }
            EventPayload::ToolEnd { success, error } => {
                let Some(pending) = tool_calls.remove(&event.call_id) else {
                    continue;
                };
                steps.push(TraceStep::ToolExecution(ToolExecutionStep {
                    order: next_order,
                    timestamp: pending.started,
                    duration_ms: elapsed_ms(pending.started, event.timestamp),
                    agent: pending.agent,
                    tool_name: pending.tool_name.unwrap_or_default(),
                    success: *success,
                    error: error.clone(),
                }));
                next_order += 1;
            }
        }
    }

    steps.sort_by_key(TraceStep::timestamp);
    let summary = summarize(&steps, model);
    InvestigationTrace { steps, summary }
}

fn summarize(steps: &[TraceStep], model: &ResolvedModel) -> TraceSummary {
    let mut llm_call_count = 0;
    let mut tool_execution_count = 0;
    let mut total_tokens = 0u64;
    let mut total_cost = Usd::ZERO;
    for step in steps {
        match step {
            TraceStep::LlmCall(s) => {
                llm_call_count += 1;
                total_tokens = total_tokens.saturating_add(s.total_tokens);
                total_cost += s.cost;
            }
            TraceStep::ToolExecution(_) => tool_execution_count += 1,
        }
    }

    let first_start = steps.iter().map(TraceStep::timestamp).min();
    let last_end = steps.iter().map(TraceStep::end_time).max();
    let total_duration_ms = match (first_start, last_end) {
        (Some(start), Some(end)) => elapsed_ms(start, end),
        _ => 0,
    };

    TraceSummary {
        total_duration_ms,
        llm_call_count,
        tool_execution_count,
        total_tokens,
        total_cost,
        model: model.model.clone(),
        provider: model.provider,
    }
}
