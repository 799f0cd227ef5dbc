//! # inquest-runtime
//!
//! Orchestration primitives for a supervisor/worker investigation run.
//!
//! - **Budget**: recursion limit for the execution graph ([`compute_budget`])
//! - **Timeout**: deadline races with cooperative cancellation
//! - **Gather**: concurrent fan-out with per-target failure isolation
//! - **Recorder**: event log folded into a timed, cost-annotated trace
//! - **Guard**: tool calls with error isolation and a shared quota
//! - **Investigation**: per-run context, reference engine and runner

#![deny(unsafe_code)]

pub mod budget;
pub mod context;
pub mod errors;
pub mod gather;
pub mod guard;
pub mod investigation;
pub mod recorder;
pub mod timeout;

pub use budget::{Budget, compute_budget, per_worker_limit};
pub use context::{Finding, RunContext};
pub use errors::{
    ConfigurationError, PartialGatherFailure, RuntimeError, TaskAborted, TimeoutError,
    ToolExecutionError,
};
pub use gather::{GatherBatch, GatherResult, Gatherer};
pub use guard::{GuardedTools, ToolContext, ToolExecutor, ToolOutcome, ToolQuota};
pub use investigation::{Investigation, InvestigationReport, RunStatus, WorkerSpec};
pub use recorder::{CallObserver, InvestigationTrace, Recorder, TraceStep};
pub use timeout::TimeoutController;
