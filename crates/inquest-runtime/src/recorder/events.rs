//! Immutable lifecycle events captured from the execution engine.

use chrono::{DateTime, Utc};
use inquest_core::CallId;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Which hook fired.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// A model call began.
    ModelStart,
    /// A model call returned.
    ModelEnd,
    /// A tool call began.
    ToolStart,
    /// A tool call returned.
    ToolEnd,
}

/// Hook-specific data.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EventPayload {
    /// A model call began.
    ModelStart {
        /// Worker or supervisor making the call.
        agent: Option<String>,
    },
    /// A model call returned.
    ModelEnd {
        /// Raw response metadata carrying token usage.
        metadata: Value,
        /// Tools the model asked to call next.
        tool_calls_decided: Vec<String>,
    },
    /// A tool call began.
    ToolStart {
        /// Worker invoking the tool.
        agent: Option<String>,
        /// Tool name.
        tool_name: String,
    },
    /// A tool call returned.
    ToolEnd {
        /// Whether the tool succeeded.
        success: bool,
        /// Failure description.
        error: Option<String>,
    },
}

/// One entry in the recorder's log.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecorderEvent {
    /// Opaque id pairing a start with its end.
    pub call_id: CallId,
    /// When the hook fired.
    pub timestamp: DateTime<Utc>,
    /// Hook data.
    #[serde(flatten)]
    pub payload: EventPayload,
}

impl RecorderEvent {
    /// Which hook produced this event.
    pub fn kind(&self) -> EventKind {
        match self.payload {
            EventPayload::ModelStart { .. } => EventKind::ModelStart,
            EventPayload::ModelEnd { .. } => EventKind::ModelEnd,
            EventPayload::ToolStart { .. } => EventKind::ToolStart,
            EventPayload::ToolEnd { .. } => EventKind::ToolEnd,
        }
    }
}
