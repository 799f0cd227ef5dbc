//! Tool-using worker loop.

use std::fmt;
use std::sync::Arc;

use futures::future::join_all;
use inquest_llm::{ChatMessage, ModelClient, ModelRequest, ToolSpec};
use tracing::{debug, info};

use crate::context::RunContext;
use crate::errors::RuntimeError;
use crate::guard::ToolExecutor;

const CONCLUDE_PROMPT: &str = "You have used all available iterations. \
Conclude now with what you found, without calling any more tools.";

/// A worker specialized for one investigation sub-domain.
#[derive(Clone)]
pub struct WorkerSpec {
    /// Unique name, used as the agent label in the trace.
    pub name: String,
    /// What the supervisor delegates to this worker.
    pub description: String,
    /// System prompt for every call the worker makes.
    pub system_prompt: String,
    /// Tools the worker may call.
    pub tools: Arc<dyn ToolExecutor>,
}

impl WorkerSpec {
    /// Worker with an empty description.
    pub fn new(
        name: impl Into<String>,
        system_prompt: impl Into<String>,
        tools: Arc<dyn ToolExecutor>,
    ) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            system_prompt: system_prompt.into(),
            tools,
        }
    }

    /// Set the description.
    #[must_use]
    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }
}

impl fmt::Debug for WorkerSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkerSpec")
            .field("name", &self.name)
            .field("description", &self.description)
            .finish_non_exhaustive()
    }
}

/// Runs one worker's decide/act loop.
///
/// Each iteration is a model call (decide) followed, if the model asked for
/// tools, by the guarded tool calls (act), run concurrently. After `k` iterations the worker
/// gets one last call without tools and must conclude, so a worker never
/// takes more than `2k + 1` steps.
pub struct ToolLoopAgent<'a> {
    spec: &'a WorkerSpec,
}

impl<'a> ToolLoopAgent<'a> {
    /// Agent running `spec`.
    pub fn new(spec: &'a WorkerSpec) -> Self {
        Self { spec }
    }

    /// Run the loop on `task` and return the worker's concluding text.
    pub async fn run(
        &self,
        ctx: &RunContext,
        client: &dyn ModelClient,
        task: &str,
    ) -> Result<String, RuntimeError> {
        let name = self.spec.name.as_str();
        let tools = ctx.guard(Arc::clone(&self.spec.tools));
        let specs = tools.specs();
        let iterations = ctx.config().max_worker_iterations();
        let local_limit = ctx.budget().per_worker_limit;
        let mut local_steps = 0u32;
        let mut messages = vec![ChatMessage::user(task)];

        for iteration in 1..=iterations {
            local_steps += 1;
            let _ = ctx.charge_steps(1)?;
            let response = ctx
                .call_model(client, Some(name), &self.request(ctx, &messages, specs.clone()))
                .await?;
            messages.push(response.to_message());

            if response.tool_calls.is_empty() {
                debug!(worker = name, iteration, "worker concluded");
                return Ok(response.content);
            }

            local_steps += 1;
            let _ = ctx.charge_steps(1)?;
            let outcomes = join_all(
                response
                    .tool_calls
                    .iter()
                    .map(|call| tools.invoke(Some(name), &call.name, call.arguments.clone())),
            )
            .await;
            for (call, outcome) in response.tool_calls.iter().zip(outcomes) {
                messages.push(ChatMessage::tool_result(&call.id, outcome.content()));
            }
        }

        debug_assert!(local_steps < local_limit);
        info!(
            worker = name,
            iterations,
            steps = local_steps + 1,
            limit = local_limit,
            "worker iteration cap reached, forcing conclusion"
        );
        let _ = ctx.charge_steps(1)?;
        messages.push(ChatMessage::user(CONCLUDE_PROMPT));
        let response = ctx
            .call_model(client, Some(name), &self.request(ctx, &messages, Vec::new()))
            .await?;
        Ok(response.content)
    }

    fn request(&self, ctx: &RunContext, messages: &[ChatMessage], tools: Vec<ToolSpec>) -> ModelRequest {
        ModelRequest {
            system_prompt: self.spec.system_prompt.clone(),
            messages: messages.to_vec(),
            tools,
            temperature: ctx.config().temperature(),
            max_tokens: ctx.config().max_tokens(),
        }
    }
}
