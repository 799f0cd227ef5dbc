//! Scripted model for deterministic tests without network calls.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::client::ModelClient;
use crate::errors::ModelError;
use crate::models::ResolvedModel;
use crate::types::{ModelRequest, ModelResponse};

/// One pre-programmed reply.
#[derive(Clone, Debug)]
pub enum ScriptedReply {
    /// Return this response.
    Respond(ModelResponse),
    /// Fail the call.
    Fail(ModelError),
    /// Sleep, then resolve the inner reply.
    Delay(Duration, Box<ScriptedReply>),
}

impl ScriptedReply {
    /// Plain text response.
    pub fn text(content: &str) -> Self {
        Self::Respond(ModelResponse::text(content))
    }

    /// Wrap any reply with a delay.
    pub fn delayed(delay: Duration, inner: ScriptedReply) -> Self {
        Self::Delay(delay, Box::new(inner))
    }
}

impl From<ModelResponse> for ScriptedReply {
    fn from(response: ModelResponse) -> Self {
        Self::Respond(response)
    }
}

type Responder = Box<dyn Fn(&ModelRequest) -> ScriptedReply + Send + Sync>;

enum Script {
    Sequence(Vec<ScriptedReply>),
    Responder(Responder),
}

/// Model that replays a script.
///
/// A sequence script returns replies in order and fails with
/// [`ModelError::Exhausted`] once they run out. A responder script computes
/// each reply from the request.
pub struct ScriptedModel {
    script: Script,
    call_count: AtomicUsize,
    requests: Mutex<Vec<ModelRequest>>,
}

impl ScriptedModel {
    /// Replay `replies` in order.
    pub fn new(replies: Vec<ScriptedReply>) -> Self {
        Self::with_script(Script::Sequence(replies))
    }

    /// Compute every reply from the incoming request.
    pub fn from_fn<F>(responder: F) -> Self
    where
        F: Fn(&ModelRequest) -> ScriptedReply + Send + Sync + 'static,
    {
        Self::with_script(Script::Responder(Box::new(responder)))
    }

    fn with_script(script: Script) -> Self {
        Self {
            script,
            call_count: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Number of `invoke` calls so far.
    pub fn call_count(&self) -> usize {
        self.call_count.load(Ordering::Relaxed)
    }

    /// Every request received, in call order.
    pub fn requests(&self) -> Vec<ModelRequest> {
        self.requests.lock().clone()
    }
}

#[async_trait]
impl ModelClient for ScriptedModel {
    async fn invoke(
        &self,
        _model: &ResolvedModel,
        request: &ModelRequest,
    ) -> Result<ModelResponse, ModelError> {
        let idx = self.call_count.fetch_add(1, Ordering::Relaxed);
        self.requests.lock().push(request.clone());

        let reply = match &self.script {
            Script::Sequence(replies) => replies
                .get(idx)
                .cloned()
                .ok_or(ModelError::Exhausted { call: idx })?,
            Script::Responder(responder) => responder(request),
        };
        resolve(reply).await
    }
}

/// Unrolls nested delays iteratively.
async fn resolve(mut reply: ScriptedReply) -> Result<ModelResponse, ModelError> {
    loop {
        match reply {
            ScriptedReply::Respond(response) => return Ok(response),
            ScriptedReply::Fail(err) => return Err(err),
            ScriptedReply::Delay(duration, inner) => {
                tokio::time::sleep(duration).await;
                reply = *inner;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::resolve_model;
    use crate::types::ChatMessage;
    use assert_matches::assert_matches;
    use inquest_core::Provider;

    fn request(text: &str) -> ModelRequest {
        ModelRequest {
            system_prompt: "sys".into(),
            messages: vec![ChatMessage::user(text)],
            tools: Vec::new(),
            temperature: 0.0,
            max_tokens: 1000,
        }
    }

    fn model() -> ResolvedModel {
        resolve_model(Provider::Anthropic, None)
    }

    #[tokio::test]
    async fn sequential_replies_then_exhausted() {
        let mock = ScriptedModel::new(vec![
            ScriptedReply::text("first"),
            ScriptedReply::Fail(ModelError::Request("overloaded".into())),
        ]);
        let m = model();

        assert_eq!(mock.invoke(&m, &request("a")).await.unwrap().content, "first");
        assert_matches!(mock.invoke(&m, &request("b")).await, Err(ModelError::Request(_)));
        assert_matches!(
            mock.invoke(&m, &request("c")).await,
            Err(ModelError::Exhausted { call: 2 })
        );
        assert_eq!(mock.call_count(), 3);
        assert_eq!(mock.requests().len(), 3);
    }

    #[tokio::test]
    async fn responder_sees_request() {
        let mock = ScriptedModel::from_fn(|req| {
            ScriptedReply::text(&format!("echo: {}", req.messages[0].content))
        });
        let response = mock.invoke(&model(), &request("ping")).await.unwrap();
        assert_eq!(response.content, "echo: ping");
    }

    #[tokio::test(start_paused = true)]
    async fn delayed_reply_waits() {
        let mock = ScriptedModel::new(vec![ScriptedReply::delayed(
            Duration::from_secs(5),
            ScriptedReply::text("late"),
        )]);
        let start = tokio::time::Instant::now();
        let response = mock.invoke(&model(), &request("x")).await.unwrap();
        assert_eq!(response.content, "late");
        assert!(start.elapsed() >= Duration::from_secs(5));
    }
}
