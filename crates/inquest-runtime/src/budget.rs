//! Iteration budget for a supervisor/worker execution graph.
//!
//! Each worker iteration is two steps (decide, act). Handing off to a worker
//! and back, plus the supervisor's routing decision, costs four more; the
//! worker's forced conclusion is charged against those four, so no worker
//! can use more than `2k + 4` steps. The supervisor itself only delegates,
//! so its own iterations are capped at ten regardless of the tool quota. A
//! small fixed slack covers re-delegation, error recovery and the final
//! synthesis.

use inquest_settings::RunConfig;
use serde::Serialize;

use crate::errors::ConfigurationError;

/// Steps per decide/act iteration.
pub const STEPS_PER_ITERATION: u32 = 2;
/// Hand-off to and from the supervisor plus its routing decision.
pub const HANDOFF_STEPS: u32 = 4;
/// Hand-off steps charged by the supervisor when it delegates. The
/// remaining one pays for the worker's forced conclusion.
pub const DELEGATION_STEPS: u32 = HANDOFF_STEPS - 1;
/// Cap on supervisor iterations counted toward the budget.
pub const SUPERVISOR_ITERATION_CAP: u32 = 10;
/// Fixed slack for re-delegation, recovery and synthesis.
pub const SLACK_STEPS: u32 = 5;

/// Computed limits for one run.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Budget {
    /// Total steps the run may take.
    pub recursion_limit: u32,
    /// Value of the formula, whether or not an override replaced it.
    pub computed: u32,
    /// Whether an explicit override set `recursion_limit`.
    pub overridden: bool,
    /// Local cap for any single worker.
    pub per_worker_limit: u32,
}

/// `n*(2k+4) + 2*min(m,10) + 5`, unless `override_limit` is set.
///
/// `n = 0` is rejected even when an override is present.
pub fn compute_budget(
    workers: u32,
    worker_iterations: u32,
    max_tool_calls: u32,
    override_limit: Option<u32>,
) -> Result<Budget, ConfigurationError> {
    if workers == 0 {
        return Err(ConfigurationError::NoWorkers);
    }
    let per_worker = STEPS_PER_ITERATION
        .saturating_mul(worker_iterations)
        .saturating_add(HANDOFF_STEPS);
    let supervisor = STEPS_PER_ITERATION.saturating_mul(max_tool_calls.min(SUPERVISOR_ITERATION_CAP));
    let computed = workers
        .saturating_mul(per_worker)
        .saturating_add(supervisor)
        .saturating_add(SLACK_STEPS);

    Ok(Budget {
        recursion_limit: override_limit.unwrap_or(computed),
        computed,
        overridden: override_limit.is_some(),
        per_worker_limit: per_worker_limit(worker_iterations),
    })
}

/// `2k + 1`: every iteration plus one forced conclusion.
pub fn per_worker_limit(worker_iterations: u32) -> u32 {
    STEPS_PER_ITERATION
        .saturating_mul(worker_iterations)
        .saturating_add(1)
}

impl Budget {
    /// Budget for `workers` active workers under `config`.
    pub fn for_config(workers: usize, config: &RunConfig) -> Result<Self, ConfigurationError> {
        let workers = u32::try_from(workers).unwrap_or(u32::MAX);
        compute_budget(
            workers,
            config.max_worker_iterations(),
            config.max_tool_calls(),
            config.recursion_limit(),
        )
    }
}
