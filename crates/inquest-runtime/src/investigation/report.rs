//! Final report of an investigation run.

use std::fmt::Write as _;

use inquest_core::RunId;
use serde::{Deserialize, Serialize};

use crate::context::Finding;
use crate::recorder::InvestigationTrace;

/// How a run ended.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RunStatus {
    /// The supervisor produced an answer.
    Completed,
    /// The run ended early.
    Failed {
        /// Stable error category.
        category: String,
        /// Reason for the requester.
        reason: String,
    },
}

/// Everything a caller gets back from a run.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvestigationReport {
    /// Run identifier.
    pub run_id: RunId,
    /// Outcome.
    #[serde(flatten)]
    pub status: RunStatus,
    /// Synthesized answer, when completed.
    pub answer: Option<String>,
    /// Findings text preserved from a failed run, bounded in length.
    pub partial_output: Option<String>,
    /// Worker findings, in delegation order.
    pub findings: Vec<Finding>,
    /// Timed, cost-annotated trace.
    pub trace: InvestigationTrace,
}

impl InvestigationReport {
    /// Whether the run completed.
    pub fn is_completed(&self) -> bool {
        self.status == RunStatus::Completed
    }

    /// Plain-text report.
    pub fn render(&self) -> String {
        let mut out = format!("Investigation {}\n\n", self.run_id);
        match &self.status {
            RunStatus::Completed => {
                out.push_str(self.answer.as_deref().unwrap_or_default());
            }
            RunStatus::Failed { reason, .. } => {
                out.push_str(reason);
                if let Some(partial) = &self.partial_output {
                    let _ = write!(out, "\n\nPartial findings:\n\n{partial}");
                }
            }
        }
        let _ = write!(out, "\n\n---\n{}", self.trace.render_summary());
        out
    }
}
