//! Tool invocation guard.
//!
//! Every tool call goes through [`GuardedTools::invoke`], which never fails:
//! errors, timeouts and panics become a recoverable message for the calling
//! worker, and once the shared quota is spent calls short-circuit without
//! reaching the tool.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use futures::FutureExt;
use inquest_core::CallId;
use inquest_llm::ToolSpec;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::errors::{ToolExecutionError, panic_message};
use crate::gather::Gatherer;
use crate::recorder::CallObserver;
use crate::timeout::TimeoutController;

/// What a tool sees of the run that called it.
#[derive(Clone, Debug)]
pub struct ToolContext {
    /// Id of this call in the trace.
    pub call_id: CallId,
    /// Worker making the call.
    pub agent: Option<String>,
    /// Cancelled once the call returns or the run is cancelled.
    pub cancellation: CancellationToken,
    controller: TimeoutController,
    step_timeout: Duration,
}

impl ToolContext {
    /// Fan-out over the run's timers, with the step deadline per target.
    /// Targets are cancelled together with this call.
    pub fn gatherer(&self) -> Gatherer {
        Gatherer::new(self.controller.clone(), self.step_timeout).with_parent(&self.cancellation)
    }
}

/// Executes named tools. Implemented by domain tool sets.
#[async_trait]
pub trait ToolExecutor: Send + Sync {
    /// Tools this executor offers to the model.
    fn specs(&self) -> Vec<ToolSpec> {
        Vec::new()
    }

    /// Run tool `name` with `input`.
    async fn execute(
        &self,
        name: &str,
        input: Value,
        cx: &ToolContext,
    ) -> Result<String, ToolExecutionError>;
}

/// Run-wide tool call counter shared by every worker.
#[derive(Debug)]
pub struct ToolQuota {
    used: AtomicU32,
    cap: u32,
}

impl ToolQuota {
    /// Quota allowing `cap` calls.
    pub fn new(cap: u32) -> Self {
        Self {
            used: AtomicU32::new(0),
            cap,
        }
    }

    /// Count one call. `false` once the count exceeds the cap.
    pub fn try_acquire(&self) -> bool {
        let count = self.used.fetch_add(1, Ordering::SeqCst).saturating_add(1);
        count <= self.cap
    }

    /// Calls attempted so far, including rejected ones.
    pub fn attempted(&self) -> u32 {
        self.used.load(Ordering::SeqCst)
    }

    /// Calls still allowed.
    pub fn remaining(&self) -> u32 {
        self.cap.saturating_sub(self.attempted())
    }

    /// Configured cap.
    pub fn cap(&self) -> u32 {
        self.cap
    }
}

/// What the calling worker gets back from a guarded call.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ToolOutcome {
    /// The tool ran and returned output.
    Completed(String),
    /// The tool failed; the message tells the worker to adapt.
    Failed {
        /// Underlying failure.
        error: ToolExecutionError,
        /// Message for the worker.
        message: String,
    },
    /// The quota is spent; the message tells the worker to conclude.
    QuotaExhausted {
        /// Message for the worker.
        message: String,
    },
}

impl ToolOutcome {
    /// Text to feed back to the model.
    pub fn content(&self) -> &str {
        match self {
            Self::Completed(output) => output,
            Self::Failed { message, .. } | Self::QuotaExhausted { message } => message,
        }
    }

    /// Whether the tool ran successfully.
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Completed(_))
    }
}

/// Message returned when a tool fails.
pub fn tool_error_message(error: &ToolExecutionError) -> String {
    format!("Tool error: {error}. Try an alternative approach or a different tool.")
}

/// Message returned once the quota is spent.
pub fn quota_exhausted_message(cap: u32) -> String {
    format!(
        "Tool call limit reached ({cap}). Stop calling tools and conclude with the information you already have."
    )
}

/// Wraps a [`ToolExecutor`] with error isolation, a per-call deadline and
/// the shared quota. The wrapped executor is used unmodified.
#[derive(Clone)]
pub struct GuardedTools {
    inner: Arc<dyn ToolExecutor>,
    quota: Arc<ToolQuota>,
    controller: TimeoutController,
    step_timeout: Duration,
    cancellation: CancellationToken,
    observer: Option<Arc<dyn CallObserver>>,
}

impl GuardedTools {
    /// Guard `inner` with `quota` and a per-call deadline.
    pub fn new(
        inner: Arc<dyn ToolExecutor>,
        quota: Arc<ToolQuota>,
        controller: TimeoutController,
        step_timeout: Duration,
    ) -> Self {
        Self {
            inner,
            quota,
            controller,
            step_timeout,
            cancellation: CancellationToken::new(),
            observer: None,
        }
    }

    /// Derive every call's token from `parent`.
    #[must_use]
    pub fn with_cancellation(mut self, parent: &CancellationToken) -> Self {
        self.cancellation = parent.clone();
        self
    }

    /// Fire tool start/end hooks on `observer`.
    #[must_use]
    pub fn with_observer(mut self, observer: Arc<dyn CallObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Tools offered by the wrapped executor.
    pub fn specs(&self) -> Vec<ToolSpec> {
        self.inner.specs()
    }

    /// Shared quota.
    pub fn quota(&self) -> &ToolQuota {
        &self.quota
    }

    /// Invoke tool `name`. Never returns an error.
    pub async fn invoke(&self, agent: Option<&str>, name: &str, input: Value) -> ToolOutcome {
        if !self.quota.try_acquire() {
            info!(tool = name, cap = self.quota.cap(), "tool call quota exhausted, short-circuiting");
            return ToolOutcome::QuotaExhausted {
                message: quota_exhausted_message(self.quota.cap()),
            };
        }

        let call_id = CallId::new();
        if let Some(observer) = &self.observer {
            observer.on_tool_start(&call_id, agent, name);
        }

        let cx = ToolContext {
            call_id: call_id.clone(),
            agent: agent.map(str::to_owned),
            cancellation: self.cancellation.child_token(),
            controller: self.controller.clone(),
            step_timeout: self.step_timeout,
        };
        let _cancel_on_exit = cx.cancellation.clone().drop_guard();

        let label = format!("tool:{name}");
        let execution = async {
            match AssertUnwindSafe(self.inner.execute(name, input, &cx)).catch_unwind().await {
                Ok(result) => result,
                Err(panic) => {
                    let msg = panic_message(panic.as_ref());
                    error!(tool = name, panic = %msg, "tool panicked during execution");
                    Err(ToolExecutionError::Panicked(msg))
                }
            }
        };
        let result = self
            .controller
            .with_timeout(&label, self.step_timeout, execution)
            .await;

        let outcome = match result {
            Ok(output) => {
                debug!(tool = name, "tool call completed");
                ToolOutcome::Completed(output)
            }
            Err(error) => {
                warn!(tool = name, error = %error, "tool call failed");
                ToolOutcome::Failed {
                    message: tool_error_message(&error),
                    error,
                }
            }
        };

        if let Some(observer) = &self.observer {
            let error = match &outcome {
                ToolOutcome::Failed { error, .. } => Some(error.to_string()),
                _ => None,
            };
            observer.on_tool_end(&call_id, error.as_deref());
        }
        outcome
    }
}
