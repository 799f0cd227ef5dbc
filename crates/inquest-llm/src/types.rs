//! Request and response types for the model collaborator.

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::usage::{TokenCounts, extract_usage};

/// Message author role.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Instructions from the caller.
    System,
    /// End-user or supervisor input.
    User,
    /// Model output.
    Assistant,
    /// Result of a tool call, fed back to the model.
    Tool,
}

/// One message in a conversation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    /// Who wrote it.
    pub role: Role,
    /// Text content.
    pub content: String,
    /// Tool call this message answers, for [`Role::Tool`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
    /// Tool calls requested by an assistant message.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCallRequest>,
}

impl ChatMessage {
    /// User message.
    pub fn user(content: impl Into<String>) -> Self {
        Self::plain(Role::User, content)
    }

    /// Assistant message without tool calls.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::plain(Role::Assistant, content)
    }

    /// Tool result answering `tool_call_id`.
    pub fn tool_result(tool_call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            tool_call_id: Some(tool_call_id.into()),
            ..Self::plain(Role::Tool, content)
        }
    }

    fn plain(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            tool_call_id: None,
            tool_calls: Vec::new(),
        }
    }
}

/// A tool the model may call.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolSpec {
    /// Tool name as the model sees it.
    pub name: String,
    /// What the tool does.
    pub description: String,
    /// JSON Schema of the input object.
    pub input_schema: Value,
}

/// A tool call the model asked for.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ToolCallRequest {
    /// Backend-assigned call id.
    pub id: String,
    /// Tool name.
    pub name: String,
    /// Arguments object.
    pub arguments: Value,
}

/// Input to one model call.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelRequest {
    /// System prompt.
    pub system_prompt: String,
    /// Conversation so far.
    pub messages: Vec<ChatMessage>,
    /// Tools offered on this call.
    #[serde(default)]
    pub tools: Vec<ToolSpec>,
    /// Sampling temperature.
    pub temperature: f64,
    /// Completion token cap.
    pub max_tokens: u32,
}

/// Output of one model call.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelResponse {
    /// Text content.
    pub content: String,
    /// Follow-up tool calls requested.
    #[serde(default)]
    pub tool_calls: Vec<ToolCallRequest>,
    /// Raw backend metadata, including usage in whatever shape the
    /// backend reports it.
    #[serde(default)]
    pub metadata: Value,
}

impl ModelResponse {
    /// Plain text response with no metadata.
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            ..Self::default()
        }
    }

    /// Add a requested tool call. The call id is derived from its position.
    #[must_use]
    pub fn with_tool_call(mut self, name: impl Into<String>, arguments: Value) -> Self {
        let id = format!("call_{}", self.tool_calls.len() + 1);
        self.tool_calls.push(ToolCallRequest {
            id,
            name: name.into(),
            arguments,
        });
        self
    }

    /// Attach usage in the normalized `usage_metadata` shape.
    #[must_use]
    pub fn with_usage(mut self, input_tokens: u64, output_tokens: u64) -> Self {
        self.metadata = json!({
            "usage_metadata": {"input_tokens": input_tokens, "output_tokens": output_tokens}
        });
        self
    }

    /// Replace the raw metadata.
    #[must_use]
    pub fn with_metadata(mut self, metadata: Value) -> Self {
        self.metadata = metadata;
        self
    }

    /// Token usage extracted from metadata, zero if unrecognized.
    pub fn usage(&self) -> TokenCounts {
        extract_usage(&self.metadata)
    }

    /// Names of requested tool calls, in request order.
    pub fn tool_call_names(&self) -> Vec<String> {
        self.tool_calls.iter().map(|c| c.name.clone()).collect()
    }

    /// The assistant message to append to the conversation.
    pub fn to_message(&self) -> ChatMessage {
        ChatMessage {
            tool_calls: self.tool_calls.clone(),
            ..ChatMessage::assistant(self.content.clone())
        }
    }
}
