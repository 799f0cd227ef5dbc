//! A full run where one of three data sources fails.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use inquest_llm::mock::{ScriptedModel, ScriptedReply};
use inquest_llm::{ModelRequest, ModelResponse, Role, ToolSpec};
use inquest_runtime::recorder::{ManualClock, TraceStep};
use inquest_runtime::{
    GatherBatch, Gatherer, Investigation, RunStatus, TimeoutController, ToolContext,
    ToolExecutionError, ToolExecutor, WorkerSpec,
};
use inquest_settings::{InvestigationSettings, RunConfig};
use serde_json::{Value, json};
use tokio_util::sync::CancellationToken;

const WORKER_PROMPT: &str = "You check the health of every service.";

fn config() -> RunConfig {
    InvestigationSettings {
        max_tool_calls: 5,
        timeout_ms: 5_000,
        ..InvestigationSettings::default()
    }
    .validate()
    .unwrap()
}

async fn query_status(target: String, _token: CancellationToken) -> Result<u32, String> {
    tokio::time::sleep(Duration::from_millis(10)).await;
    match target.as_str() {
        "A" => Ok(200),
        "B" => Err("boom".to_owned()),
        _ => Ok(204),
    }
}

fn gatherer() -> Gatherer {
    Gatherer::new(TimeoutController::new(), Duration::from_secs(1))
}

fn render_batch(batch: &GatherBatch<u32>) -> String {
    batch
        .iter()
        .map(|r| match (&r.value, &r.error) {
            (Some(status), _) => format!("{}: status {status}", r.key),
            (None, Some(error)) => format!("{}: failed ({error})", r.key),
            (None, None) => format!("{}: no data", r.key),
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn status_spec() -> Vec<ToolSpec> {
    vec![ToolSpec {
        name: "service_status".into(),
        description: "Query the status of several services at once".into(),
        input_schema: json!({"type": "object", "properties": {"targets": {"type": "array"}}}),
    }]
}

fn targets(name: &str, input: &Value) -> Result<Vec<String>, ToolExecutionError> {
    if name != "service_status" {
        return Err(ToolExecutionError::UnknownTool(name.to_owned()));
    }
    serde_json::from_value(input["targets"].clone())
        .map_err(|e| ToolExecutionError::InvalidInput(e.to_string()))
}

struct StatusTools;

#[async_trait]
impl ToolExecutor for StatusTools {
    fn specs(&self) -> Vec<ToolSpec> {
        status_spec()
    }

    async fn execute(
        &self,
        name: &str,
        input: Value,
        cx: &ToolContext,
    ) -> Result<String, ToolExecutionError> {
        let targets = targets(name, &input)?;
        let batch = cx.gatherer().gather(targets, query_status).await;
        Ok(render_batch(&batch))
    }
}

/// Every target waits until it is cancelled.
struct StuckTools {
    cancelled: Arc<AtomicBool>,
}

#[async_trait]
impl ToolExecutor for StuckTools {
    fn specs(&self) -> Vec<ToolSpec> {
        status_spec()
    }

    async fn execute(
        &self,
        name: &str,
        input: Value,
        cx: &ToolContext,
    ) -> Result<String, ToolExecutionError> {
        let targets = targets(name, &input)?;
        let batch = cx
            .gatherer()
            .gather(targets, |_key, token| {
                let cancelled = Arc::clone(&self.cancelled);
                async move {
                    token.cancelled().await;
                    cancelled.store(true, Ordering::SeqCst);
                    Err::<u32, _>("cancelled")
                }
            })
            .await;
        Ok(render_batch(&batch))
    }
}

/// Worker asks for the tool, then reports its output; the supervisor
/// repeats the findings it was given.
fn respond(request: &ModelRequest) -> ScriptedReply {
    let Some(last) = request.messages.last() else {
        return ScriptedReply::text("");
    };
    if request.system_prompt != WORKER_PROMPT {
        let findings = last.content.split("Worker findings:").nth(1).unwrap_or_default();
        return ScriptedReply::text(&format!("Answer based on:{findings}"));
    }
    match last.role {
        Role::Tool => ScriptedReply::text(&format!("Service health:\n{}", last.content)),
        _ => ModelResponse::text("")
            .with_usage(1_000, 50)
            .with_tool_call("service_status", json!({"targets": ["A", "B", "C"]}))
            .into(),
    }
}

#[tokio::test]
async fn gather_settles_every_target() {
    let batch = gatherer().gather(["A", "B", "C"], query_status).await;

    assert_eq!(
        serde_json::to_value(&batch).unwrap(),
        json!({
            "A": {"key": "A", "value": 200, "error": null},
            "B": {"key": "B", "value": null, "error": "boom"},
            "C": {"key": "C", "value": 204, "error": null},
        })
    );
}

#[tokio::test]
async fn run_completes_with_partial_data_and_reports_the_failure() {
    let model = Arc::new(ScriptedModel::from_fn(respond));
    let worker = WorkerSpec::new("services", WORKER_PROMPT, Arc::new(StatusTools))
        .describe("service health checks");

    let report = Investigation::new(config(), model.clone())
        .with_worker(worker)
        .with_clock(Arc::new(ManualClock::at_epoch()))
        .run("why did the availability alert fire")
        .await
        .unwrap();

    assert_eq!(report.status, RunStatus::Completed);
    let answer = report.answer.as_deref().unwrap();
    assert!(answer.contains("A: status 200"), "{answer}");
    assert!(answer.contains("C: status 204"), "{answer}");
    assert!(answer.contains("B: failed (boom)"), "{answer}");
    assert!(report.render().contains("B: failed (boom)"));

    // decide, act, decide, synthesize
    assert_eq!(model.call_count(), 3);
    let summary = &report.trace.summary;
    assert_eq!(summary.llm_call_count, 3);
    assert_eq!(summary.tool_execution_count, 1);
    assert_eq!(summary.total_tokens, 1_050);

    let tool_step = report
        .trace
        .steps
        .iter()
        .find_map(|s| match s {
            TraceStep::ToolExecution(t) => Some(t),
            TraceStep::LlmCall(_) => None,
        })
        .unwrap();
    assert!(tool_step.success, "partial gather failure must not fail the tool");
    assert_eq!(tool_step.agent.as_deref(), Some("services"));
}

#[tokio::test(start_paused = true)]
async fn cancelling_the_run_reaches_in_flight_gather_targets() {
    let cancelled = Arc::new(AtomicBool::new(false));
    let model = Arc::new(ScriptedModel::from_fn(respond));
    let worker = WorkerSpec::new(
        "services",
        WORKER_PROMPT,
        Arc::new(StuckTools {
            cancelled: Arc::clone(&cancelled),
        }),
    );
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    let _canceller = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        trigger.cancel();
    });

    let report = Investigation::new(config(), model)
        .with_worker(worker)
        .run_with_cancel("why did the availability alert fire", &cancel)
        .await
        .unwrap();

    assert!(
        matches!(&report.status, RunStatus::Failed { category, .. } if category == "cancelled"),
        "{:?}",
        report.status
    );
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert!(cancelled.load(Ordering::SeqCst));
}
