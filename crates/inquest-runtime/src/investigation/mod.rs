//! Investigation runner.
//!
//! [`Investigation::run`] validates the worker set, builds a fresh
//! [`RunContext`], races the supervisor against the overall deadline and
//! the caller's cancellation, and always returns a report with the trace.
//! Only configuration problems are returned as errors, before any work
//! starts.

pub mod report;
pub mod supervisor;
pub mod worker;

use std::collections::HashSet;
use std::sync::Arc;

use inquest_core::text::truncate_chars;
use inquest_llm::ModelClient;
use inquest_settings::RunConfig;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, error, info, info_span, warn};

use crate::context::RunContext;
use crate::errors::{ConfigurationError, RuntimeError};
use crate::recorder::{Clock, SystemClock};

pub use report::{InvestigationReport, RunStatus};
pub use supervisor::{SUPERVISOR_AGENT, Supervisor};
pub use worker::{ToolLoopAgent, WorkerSpec};

/// A configured investigation: settings, model client and workers.
pub struct Investigation {
    config: Arc<RunConfig>,
    client: Arc<dyn ModelClient>,
    workers: Vec<WorkerSpec>,
    clock: Arc<dyn Clock>,
}

impl Investigation {
    /// Investigation with no workers yet.
    pub fn new(config: RunConfig, client: Arc<dyn ModelClient>) -> Self {
        Self {
            config: Arc::new(config),
            client,
            workers: Vec::new(),
            clock: Arc::new(SystemClock),
        }
    }

    /// Add a worker.
    #[must_use]
    pub fn with_worker(mut self, worker: WorkerSpec) -> Self {
        self.workers.push(worker);
        self
    }

    /// Read recorder timestamps from `clock`.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Registered workers.
    pub fn workers(&self) -> &[WorkerSpec] {
        &self.workers
    }

    /// Run `request` to completion or failure.
    pub async fn run(&self, request: &str) -> Result<InvestigationReport, ConfigurationError> {
        self.run_with_cancel(request, &CancellationToken::new()).await
    }

    /// Like [`run`](Self::run); cancelling `cancel` ends the run early.
    pub async fn run_with_cancel(
        &self,
        request: &str,
        cancel: &CancellationToken,
    ) -> Result<InvestigationReport, ConfigurationError> {
        self.check_workers()?;
        let ctx = RunContext::with_clock(
            Arc::clone(&self.config),
            self.workers.len(),
            Arc::clone(&self.clock),
        )?
        .with_parent(cancel);

        let span = info_span!("investigation", run_id = %ctx.run_id(), model = %ctx.model());
        let outcome = self.drive(&ctx, request).instrument(span).await;
        ctx.cancellation().cancel();
        let trace = ctx.recorder().finish();

        let report = match outcome {
            Ok(answer) => {
                info!(
                    run_id = %ctx.run_id(),
                    llm_calls = trace.summary.llm_call_count,
                    tool_calls = trace.summary.tool_execution_count,
                    cost = %trace.summary.total_cost,
                    "investigation completed"
                );
                InvestigationReport {
                    run_id: ctx.run_id().clone(),
                    status: RunStatus::Completed,
                    answer: Some(answer),
                    partial_output: None,
                    findings: ctx.findings(),
                    trace,
                }
            }
            Err(err) => {
                error!(run_id = %ctx.run_id(), category = err.category(), error = %err, "investigation failed");
                InvestigationReport {
                    run_id: ctx.run_id().clone(),
                    status: RunStatus::Failed {
                        category: err.category().to_owned(),
                        reason: err.user_message(),
                    },
                    answer: None,
                    partial_output: preserved_output(&ctx),
                    findings: ctx.findings(),
                    trace,
                }
            }
        };
        Ok(report)
    }

    async fn drive(&self, ctx: &RunContext, request: &str) -> Result<String, RuntimeError> {
        let supervisor = Supervisor::new(&self.workers);
        let work = ctx.controller().with_timeout(
            "investigation",
            self.config.timeout(),
            supervisor.run(ctx, self.client.as_ref(), request),
        );
        tokio::select! {
            result = work => result,
            () = ctx.cancellation().cancelled() => Err(RuntimeError::Cancelled),
        }
    }

    fn check_workers(&self) -> Result<(), ConfigurationError> {
        if self.workers.is_empty() {
            return Err(ConfigurationError::NoWorkers);
        }
        let mut seen = HashSet::new();
        for worker in &self.workers {
            if !seen.insert(worker.name.as_str()) {
                return Err(ConfigurationError::DuplicateWorker(worker.name.clone()));
            }
        }
        Ok(())
    }
}

fn preserved_output(ctx: &RunContext) -> Option<String> {
    let partial = ctx.partial_output();
    if partial.is_empty() {
        return None;
    }
    let max = ctx.config().max_partial_output_chars();
    let kept = truncate_chars(&partial, max);
    if kept.truncated {
        warn!(
            run_id = %ctx.run_id(),
            original_chars = kept.original_chars,
            max_chars = max,
            "partial output truncated"
        );
    }
    Some(kept.text)
}
