//! Intent node handlers.

use std::sync::Arc;

use async_trait::async_trait;
use inquest_llm::{ChatMessage, ModelClient, ModelRequest, ResolvedModel};

use crate::errors::IntentError;
use crate::intent::Intent;

/// What a node sees when it runs.
#[derive(Clone, Copy, Debug)]
pub struct NodeInput<'a> {
    /// The user's message.
    pub message: &'a str,
    /// Earlier turns.
    pub history: &'a [ChatMessage],
    /// Response accumulated by earlier nodes this turn.
    pub accumulated: &'a str,
}

/// Produces the output of one intent node.
#[async_trait]
pub trait IntentHandler: Send + Sync {
    /// Run the node for `intent`.
    async fn handle(&self, intent: Intent, input: NodeInput<'_>) -> Result<String, IntentError>;
}

/// Handler that answers every intent with one model call.
pub struct ModelIntentHandler {
    client: Arc<dyn ModelClient>,
    model: ResolvedModel,
    max_tokens: u32,
}

impl ModelIntentHandler {
    /// Handler calling `model` through `client`.
    pub fn new(client: Arc<dyn ModelClient>, model: ResolvedModel, max_tokens: u32) -> Self {
        Self {
            client,
            model,
            max_tokens,
        }
    }
}

fn system_prompt(intent: Intent) -> &'static str {
    match intent {
        Intent::FindInformation => {
            "Find factual information that answers the user's message. Cite what you rely on."
        }
        Intent::Summarize => "Summarize the material below for the user in a few sentences.",
        Intent::Translate => {
            "Translate the material below into the language the user asked for. Output only the translation."
        }
        Intent::GeneralResponse => "Answer the user's message helpfully and concisely.",
    }
}

fn node_prompt(intent: Intent, input: NodeInput<'_>) -> String {
    match intent {
        Intent::Summarize | Intent::Translate if !input.accumulated.is_empty() => format!(
            "User message: {}\n\nMaterial:\n{}",
            input.message, input.accumulated
        ),
        _ => input.message.to_owned(),
    }
}

#[async_trait]
impl IntentHandler for ModelIntentHandler {
    async fn handle(&self, intent: Intent, input: NodeInput<'_>) -> Result<String, IntentError> {
        let mut messages = input.history.to_vec();
        messages.push(ChatMessage::user(node_prompt(intent, input)));
        let request = ModelRequest {
            system_prompt: system_prompt(intent).to_owned(),
            messages,
            tools: Vec::new(),
            temperature: 0.0,
            max_tokens: self.max_tokens,
        };
        let response = self.client.invoke(&self.model, &request).await?;
        Ok(response.content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use inquest_core::Provider;
    use inquest_llm::mock::{ScriptedModel, ScriptedReply};
    use inquest_llm::resolve_model;

    #[tokio::test]
    async fn summarize_sees_accumulated_material() {
        let model = Arc::new(ScriptedModel::new(vec![ScriptedReply::text("short")]));
        let handler = ModelIntentHandler::new(model.clone(), resolve_model(Provider::Anthropic, None), 500);

        let out = handler
            .handle(
                Intent::Summarize,
                NodeInput {
                    message: "tell me about tokio",
                    history: &[],
                    accumulated: "tokio is an async runtime",
                },
            )
            .await
            .unwrap();

        assert_eq!(out, "short");
        let sent = &model.requests()[0];
        assert!(sent.system_prompt.starts_with("Summarize"));
        assert!(sent.messages[0].content.ends_with("Material:\ntokio is an async runtime"));
    }
}
