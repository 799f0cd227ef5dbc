//! Per-run state.
//!
//! Everything a run mutates (step counter, tool quota, recorder, findings,
//! cancellation) lives on one [`RunContext`] that is created for the run
//! and passed by reference to every collaborator. Nothing is global.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use inquest_core::{CallId, RunId};
use inquest_llm::{ModelClient, ModelRequest, ModelResponse, ResolvedModel, resolve_model};
use inquest_settings::RunConfig;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::budget::Budget;
use crate::errors::{ConfigurationError, RuntimeError};
use crate::guard::{GuardedTools, ToolExecutor, ToolQuota};
use crate::recorder::{CallObserver, Clock, Recorder, SystemClock};
use crate::timeout::TimeoutController;

/// One worker's concluding text.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Finding {
    /// Worker that produced it.
    pub worker: String,
    /// Concluding text.
    pub text: String,
}

/// State owned by exactly one run.
pub struct RunContext {
    run_id: RunId,
    config: Arc<RunConfig>,
    model: ResolvedModel,
    budget: Budget,
    recorder: Arc<Recorder>,
    quota: Arc<ToolQuota>,
    controller: TimeoutController,
    cancel: CancellationToken,
    steps: AtomicU32,
    findings: Mutex<Vec<Finding>>,
}

impl std::fmt::Debug for RunContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunContext")
            .field("run_id", &self.run_id)
            .field("model", &self.model)
            .field("budget", &self.budget)
            .finish_non_exhaustive()
    }
}

impl RunContext {
    /// Context for a run with `workers` active workers.
    pub fn new(config: Arc<RunConfig>, workers: usize) -> Result<Self, ConfigurationError> {
        Self::with_clock(config, workers, Arc::new(SystemClock))
    }

    /// Like [`new`](Self::new), with recorder timestamps read from `clock`.
    pub fn with_clock(
        config: Arc<RunConfig>,
        workers: usize,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, ConfigurationError> {
        let budget = Budget::for_config(workers, &config)?;
        let model = resolve_model(config.provider(), config.model_override());
        let recorder = Recorder::with_clock(model.clone(), clock).verbose(config.verbose_logging());
        let run_id = RunId::new();
        debug!(
            run_id = %run_id,
            model = %model,
            recursion_limit = budget.recursion_limit,
            overridden = budget.overridden,
            "run context created"
        );
        Ok(Self {
            run_id,
            quota: Arc::new(ToolQuota::new(config.max_tool_calls())),
            config,
            model,
            budget,
            recorder: Arc::new(recorder),
            controller: TimeoutController::new(),
            cancel: CancellationToken::new(),
            steps: AtomicU32::new(0),
            findings: Mutex::new(Vec::new()),
        })
    }

    /// Tie this run's cancellation to `parent`.
    #[must_use]
    pub fn with_parent(mut self, parent: &CancellationToken) -> Self {
        self.cancel = parent.child_token();
        self
    }

    /// Run identifier.
    pub fn run_id(&self) -> &RunId {
        &self.run_id
    }

    /// Validated configuration.
    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    /// Model resolved for this run.
    pub fn model(&self) -> &ResolvedModel {
        &self.model
    }

    /// Step budget.
    pub fn budget(&self) -> Budget {
        self.budget
    }

    /// The run's recorder.
    pub fn recorder(&self) -> &Arc<Recorder> {
        &self.recorder
    }

    /// Shared tool quota.
    pub fn quota(&self) -> &Arc<ToolQuota> {
        &self.quota
    }

    /// Run-wide timeout controller.
    pub fn controller(&self) -> &TimeoutController {
        &self.controller
    }

    /// Run cancellation token.
    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Steps charged so far.
    pub fn steps_used(&self) -> u32 {
        self.steps.load(Ordering::SeqCst)
    }

    /// Charge `n` steps against the budget.
    ///
    /// Returns the running total, or [`RuntimeError::RecursionExceeded`]
    /// once the total passes the recursion limit.
    pub fn charge_steps(&self, n: u32) -> Result<u32, RuntimeError> {
        let used = self.steps.fetch_add(n, Ordering::SeqCst).saturating_add(n);
        let limit = self.budget.recursion_limit;
        if used > limit {
            warn!(run_id = %self.run_id, used, limit, "recursion limit exceeded");
            return Err(RuntimeError::RecursionExceeded { limit });
        }
        Ok(used)
    }

    /// Call the model under the per-step deadline, firing recorder hooks.
    pub async fn call_model(
        &self,
        client: &dyn ModelClient,
        agent: Option<&str>,
        request: &ModelRequest,
    ) -> Result<ModelResponse, RuntimeError> {
        if self.cancel.is_cancelled() {
            return Err(RuntimeError::Cancelled);
        }
        let call_id = CallId::new();
        self.recorder.on_model_start(&call_id, agent);

        let label = format!("model:{}", agent.unwrap_or("supervisor"));
        let response = self
            .controller
            .with_timeout(&label, self.config.step_timeout(), async {
                client
                    .invoke(&self.model, request)
                    .await
                    .map_err(RuntimeError::from)
            })
            .await?;

        self.recorder.on_model_end(&call_id, &response);
        Ok(response)
    }

    /// Wrap `tools` with the run's quota, step deadline, recorder and
    /// cancellation.
    pub fn guard(&self, tools: Arc<dyn ToolExecutor>) -> GuardedTools {
        let observer: Arc<dyn CallObserver> = self.recorder.clone();
        GuardedTools::new(
            tools,
            Arc::clone(&self.quota),
            self.controller.clone(),
            self.config.step_timeout(),
        )
        .with_observer(observer)
        .with_cancellation(&self.cancel)
    }

    /// Keep a worker's concluding text.
    pub fn record_finding(&self, worker: &str, text: &str) {
        self.findings.lock().push(Finding {
            worker: worker.to_owned(),
            text: text.to_owned(),
        });
    }

    /// Findings recorded so far.
    pub fn findings(&self) -> Vec<Finding> {
        self.findings.lock().clone()
    }

    /// Findings rendered as text, empty when there are none.
    pub fn partial_output(&self) -> String {
        self.findings
            .lock()
            .iter()
            .map(|f| format!("## {}\n{}", f.worker, f.text))
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}
