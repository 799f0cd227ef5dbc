//! Supervisor: delegates to each worker in turn, then synthesizes.

use std::fmt::Write as _;

use inquest_llm::{ChatMessage, ModelClient, ModelRequest};
use tracing::{debug, info};

use super::worker::{ToolLoopAgent, WorkerSpec};
use crate::budget::DELEGATION_STEPS;
use crate::context::RunContext;
use crate::errors::RuntimeError;

/// Agent label used for the supervisor's own model calls.
pub const SUPERVISOR_AGENT: &str = "supervisor";

const SYNTHESIS_PROMPT: &str = "You are the supervisor of an investigation. \
Combine the findings of your workers into one answer for the requester. \
Call out any data source that failed and what could not be verified because of it.";

/// Coordinates a fixed set of workers.
pub struct Supervisor<'a> {
    workers: &'a [WorkerSpec],
}

impl<'a> Supervisor<'a> {
    /// Supervisor over `workers`.
    pub fn new(workers: &'a [WorkerSpec]) -> Self {
        Self { workers }
    }

    /// Delegate `request` to every worker, record their findings and return
    /// the synthesized answer.
    pub async fn run(
        &self,
        ctx: &RunContext,
        client: &dyn ModelClient,
        request: &str,
    ) -> Result<String, RuntimeError> {
        for worker in self.workers {
            let _ = ctx.charge_steps(DELEGATION_STEPS)?;
            debug!(run_id = %ctx.run_id(), worker = %worker.name, "delegating to worker");
            let task = delegation_task(worker, request);
            let finding = ToolLoopAgent::new(worker).run(ctx, client, &task).await?;
            ctx.record_finding(&worker.name, &finding);
        }

        let _ = ctx.charge_steps(1)?;
        let synthesis = ModelRequest {
            system_prompt: SYNTHESIS_PROMPT.to_owned(),
            messages: vec![ChatMessage::user(synthesis_input(request, &ctx.partial_output()))],
            tools: Vec::new(),
            temperature: ctx.config().temperature(),
            max_tokens: ctx.config().max_tokens(),
        };
        let response = ctx
            .call_model(client, Some(SUPERVISOR_AGENT), &synthesis)
            .await?;
        info!(run_id = %ctx.run_id(), steps = ctx.steps_used(), "supervisor synthesized answer");
        Ok(response.content)
    }
}

fn delegation_task(worker: &WorkerSpec, request: &str) -> String {
    let mut task = format!("Investigation request: {request}");
    if !worker.description.is_empty() {
        let _ = write!(task, "\n\nYour focus: {}", worker.description);
    }
    task
}

fn synthesis_input(request: &str, findings: &str) -> String {
    format!("Investigation request: {request}\n\nWorker findings:\n\n{findings}")
}
