//! Chat turns driven end to end with a scripted model.

use std::sync::Arc;
use std::time::Duration;

use assert_matches::assert_matches;
use async_trait::async_trait;
use inquest_core::Provider;
use inquest_core::logging::capture_logs;
use inquest_intent::workflow::{INCOMPLETE_NOTE, NOTHING_PRODUCED};
use inquest_intent::{
    ChatWorkflow, Intent, IntentClassifier, IntentError, IntentHandler, ModelIntentHandler,
    NodeInput,
};
use inquest_llm::mock::{ScriptedModel, ScriptedReply};
use inquest_llm::{ModelError, ModelRequest, resolve_model};
use tracing::Level;

const STEP: Duration = Duration::from_secs(30);
const PARTIAL_CHARS: usize = 2_000;

fn classifier_replying(json: &str) -> IntentClassifier {
    let model = ScriptedModel::new(vec![ScriptedReply::text(json)]);
    IntentClassifier::new(Arc::new(model), resolve_model(Provider::Anthropic, None), STEP)
}

fn respond(request: &ModelRequest) -> ScriptedReply {
    let prompt = request.system_prompt.as_str();
    if prompt.starts_with("Classify") {
        let wants = request.messages.last().map(|m| m.content.as_str()).unwrap_or_default();
        if wants.contains("Spanish") {
            ScriptedReply::text(r#"{"intents": ["find-information", "translate"], "confidence": 0.8}"#)
        } else {
            ScriptedReply::text(r#"{"intents": ["find-information"], "confidence": 0.9}"#)
        }
    } else if prompt.starts_with("Find") {
        ScriptedReply::text("Tokio is an async runtime for Rust.")
    } else if prompt.starts_with("Summarize") {
        ScriptedReply::text("Tokio runs async Rust.")
    } else if prompt.starts_with("Translate") {
        ScriptedReply::text("Tokio ejecuta Rust asíncrono.")
    } else {
        ScriptedReply::text("Hello!")
    }
}

fn workflow_with(handler: Arc<dyn IntentHandler>) -> ChatWorkflow {
    let model = Arc::new(ScriptedModel::from_fn(respond));
    let classifier = IntentClassifier::new(model, resolve_model(Provider::Anthropic, None), STEP);
    ChatWorkflow::new(classifier, handler, STEP, PARTIAL_CHARS)
}

fn model_workflow() -> ChatWorkflow {
    let model = Arc::new(ScriptedModel::from_fn(respond));
    let handler = ModelIntentHandler::new(model, resolve_model(Provider::Anthropic, None), 1_000);
    workflow_with(Arc::new(handler))
}

#[tokio::test]
async fn find_information_is_always_followed_by_summarize() {
    let classification = classifier_replying(r#"{"intents": ["find-information"]}"#)
        .classify("find information about tokio", &[])
        .await;
    assert_eq!(
        classification.intents,
        [Intent::FindInformation, Intent::Summarize]
    );
}

#[tokio::test]
async fn empty_classification_becomes_general_response() {
    let classification = classifier_replying(r#"{"intents": []}"#).classify("hm", &[]).await;
    assert_eq!(classification.intents, [Intent::GeneralResponse]);
    assert!(classification.fallback);
}

#[tokio::test]
async fn classifier_failure_becomes_general_response() {
    let model = ScriptedModel::new(vec![ScriptedReply::Fail(ModelError::Request("503".into()))]);
    let classifier =
        IntentClassifier::new(Arc::new(model), resolve_model(Provider::Anthropic, None), STEP);
    let classification = classifier.classify("hello", &[]).await;
    assert_eq!(classification.intents, [Intent::GeneralResponse]);
    assert!(classification.reasoning.contains("503"));
}

#[tokio::test]
async fn nodes_accumulate_and_translate_replaces() {
    let turn = model_workflow()
        .run("Tell me about tokio, in Spanish", &[])
        .await;

    assert_eq!(
        turn.state.executed_intents(),
        [Intent::FindInformation, Intent::Summarize, Intent::Translate]
    );
    assert_eq!(turn.response, "Tokio ejecuta Rust asíncrono.");
    assert!(turn.failure.is_none());
    assert!(turn.state.is_finished());
}

#[tokio::test]
async fn find_then_summarize_are_joined() {
    let turn = model_workflow().run("what is tokio", &[]).await;
    assert_eq!(
        turn.response,
        "Tokio is an async runtime for Rust.\n\nTokio runs async Rust."
    );
}

struct FailingSummary;

#[async_trait]
impl IntentHandler for FailingSummary {
    async fn handle(&self, intent: Intent, _input: NodeInput<'_>) -> Result<String, IntentError> {
        match intent {
            Intent::FindInformation => Ok("raw facts".into()),
            _ => Err(IntentError::Handler {
                intent: intent.to_string(),
                message: "summarizer offline".into(),
            }),
        }
    }
}

#[tokio::test]
async fn node_failure_keeps_earlier_output() {
    let turn = workflow_with(Arc::new(FailingSummary))
        .run("what is tokio", &[])
        .await;

    assert_eq!(turn.response, format!("raw facts\n\n{INCOMPLETE_NOTE}"));
    assert_matches!(turn.failure, Some(IntentError::Handler { ref intent, .. }) if intent == "summarize");
    assert_eq!(turn.state.executed_intents(), [Intent::FindInformation]);
}

struct HugeFindingThenFailure;

#[async_trait]
impl IntentHandler for HugeFindingThenFailure {
    async fn handle(&self, intent: Intent, _input: NodeInput<'_>) -> Result<String, IntentError> {
        match intent {
            Intent::FindInformation => Ok("f".repeat(1_000_000)),
            _ => Err(IntentError::Handler {
                intent: intent.to_string(),
                message: "summarizer offline".into(),
            }),
        }
    }
}

#[tokio::test]
async fn kept_output_is_bounded_when_a_node_fails() {
    let (logs, _guard) = capture_logs();
    let turn = workflow_with(Arc::new(HugeFindingThenFailure))
        .run("what is tokio", &[])
        .await;

    assert!(turn.failure.is_some());
    assert!(turn.response.starts_with(&"f".repeat(PARTIAL_CHARS)));
    assert!(turn.response.contains("[truncated: 1000000 chars -> 2000 chars]"));
    assert!(turn.response.ends_with(INCOMPLETE_NOTE));
    assert!(turn.response.chars().count() < PARTIAL_CHARS + 200);

    let truncations: Vec<_> = logs
        .events()
        .into_iter()
        .filter(|e| e.level == Level::WARN && e.message == "partial response truncated")
        .collect();
    assert_eq!(truncations.len(), 1);
    assert_eq!(truncations[0].field("original_chars"), Some("1000000"));
    assert_eq!(truncations[0].field("max_chars"), Some("2000"));
}

struct Stalled;

#[async_trait]
impl IntentHandler for Stalled {
    async fn handle(&self, _intent: Intent, _input: NodeInput<'_>) -> Result<String, IntentError> {
        tokio::time::sleep(Duration::from_secs(3_600)).await;
        Ok("too late".into())
    }
}

#[tokio::test(start_paused = true)]
async fn stalled_node_hits_the_step_deadline() {
    let workflow = workflow_with(Arc::new(Stalled));
    let turn = workflow.run("what is tokio", &[]).await;

    assert_eq!(turn.response, NOTHING_PRODUCED);
    assert_matches!(turn.failure, Some(IntentError::Timeout(ref e)) if e.label == "find-information");
    assert_eq!(workflow.controller().active(), 0);
}
