//! Chat workflow: classify, then run each intent node in order.

use std::sync::Arc;
use std::time::Duration;

use inquest_core::text::truncate_chars;
use inquest_llm::ChatMessage;
use inquest_runtime::TimeoutController;
use tracing::{info, instrument, warn};

use crate::buffer::ResponseBuffer;
use crate::classify::{Classification, IntentClassifier};
use crate::errors::IntentError;
use crate::handler::{IntentHandler, NodeInput};
use crate::state::IntentExecutionState;

/// Appended when a later node fails after earlier nodes produced output.
pub const INCOMPLETE_NOTE: &str = "Part of this request could not be completed.";
/// Sent when nothing was produced.
pub const NOTHING_PRODUCED: &str = "Sorry, I could not complete this request.";

/// Outcome of one chat turn.
#[derive(Clone, Debug)]
pub struct ChatTurn {
    /// How the message was classified.
    pub classification: Classification,
    /// Router state at the end of the turn.
    pub state: IntentExecutionState,
    /// Final response text.
    pub response: String,
    /// The node failure that ended the turn early, if any.
    pub failure: Option<IntentError>,
}

/// Runs chat turns through the intent router.
pub struct ChatWorkflow {
    classifier: IntentClassifier,
    handler: Arc<dyn IntentHandler>,
    controller: TimeoutController,
    step_timeout: Duration,
    max_partial_chars: usize,
}

impl ChatWorkflow {
    /// Workflow giving each node `step_timeout`.
    ///
    /// When a node fails, the output kept from earlier nodes is cut to
    /// `max_partial_chars`.
    pub fn new(
        classifier: IntentClassifier,
        handler: Arc<dyn IntentHandler>,
        step_timeout: Duration,
        max_partial_chars: usize,
    ) -> Self {
        Self {
            classifier,
            handler,
            controller: TimeoutController::new(),
            step_timeout,
            max_partial_chars,
        }
    }

    /// Timer counters for this workflow's node deadlines.
    pub fn controller(&self) -> &TimeoutController {
        &self.controller
    }

    /// Handle one message.
    ///
    /// A failing node stops the turn; whatever earlier nodes produced is
    /// kept in the response.
    #[instrument(skip_all)]
    pub async fn run(&self, message: &str, history: &[ChatMessage]) -> ChatTurn {
        let classification = self.classifier.classify(message, history).await;
        let mut state = IntentExecutionState::new(classification.intents.clone());
        let mut buffer = ResponseBuffer::new();
        let mut failure = None;

        loop {
            let route = state.route();
            let Some(intent) = route.intent() else {
                break;
            };
            let node = route.node_name();
            let input = NodeInput {
                message,
                history,
                accumulated: buffer.as_str(),
            };
            let result = self
                .controller
                .with_timeout(node, self.step_timeout, self.handler.handle(intent, input))
                .await;
            match result {
                Ok(output) => buffer.apply(intent, &output),
                Err(e) => {
                    warn!(node, error = %e, "intent node failed, keeping accumulated response");
                    failure = Some(e);
                    break;
                }
            }
        }

        let response = final_response(buffer, failure.is_some(), self.max_partial_chars);
        info!(
            intents = ?classification.intents,
            executed = state.executed_intents().len(),
            failed = failure.is_some(),
            "chat turn finished"
        );
        ChatTurn {
            classification,
            state,
            response,
            failure,
        }
    }
}

fn final_response(buffer: ResponseBuffer, failed: bool, max_partial_chars: usize) -> String {
    match (buffer.is_empty(), failed) {
        (true, _) => NOTHING_PRODUCED.to_owned(),
        (false, true) => {
            let kept = truncate_chars(buffer.as_str(), max_partial_chars);
            if kept.truncated {
                warn!(
                    original_chars = kept.original_chars,
                    max_chars = max_partial_chars,
                    "partial response truncated"
                );
            }
            format!("{}\n\n{INCOMPLETE_NOTE}", kept.text)
        }
        (false, false) => buffer.into_string(),
    }
}
