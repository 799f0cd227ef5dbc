//! Token usage extraction from raw model response metadata.
//!
//! Each backend reports usage in its own shape. Shapes are distinct types,
//! tried in priority order; the first one that deserializes wins and an
//! unrecognized payload yields zero counts. Extraction never fails.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Input/output token counts for one model call.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenCounts {
    /// Prompt tokens.
    pub input_tokens: u64,
    /// Completion tokens.
    pub output_tokens: u64,
}

impl TokenCounts {
    /// Build from both counts.
    pub const fn new(input_tokens: u64, output_tokens: u64) -> Self {
        Self {
            input_tokens,
            output_tokens,
        }
    }

    /// `input_tokens + output_tokens`.
    pub const fn total(self) -> u64 {
        self.input_tokens.saturating_add(self.output_tokens)
    }
}

/// Which reporting convention matched.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UsageShape {
    /// `usage_metadata { input_tokens, output_tokens }`.
    Normalized,
    /// `response_metadata.usage { input_tokens, output_tokens }`.
    Anthropic,
    /// `response_metadata.tokenUsage { promptTokens, completionTokens }`.
    OpenAiCamel,
    /// `usage { prompt_tokens, completion_tokens }`.
    OpenAiSnake,
    /// `usageMetadata { promptTokenCount, candidatesTokenCount }`.
    Google,
}

#[derive(Deserialize)]
struct NormalizedUsage {
    input_tokens: u64,
    output_tokens: u64,
}

#[derive(Deserialize)]
struct AnthropicUsage {
    input_tokens: u64,
    output_tokens: u64,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct OpenAiTokenUsage {
    prompt_tokens: u64,
    completion_tokens: u64,
}

#[derive(Deserialize)]
struct OpenAiUsage {
    prompt_tokens: u64,
    completion_tokens: u64,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GoogleUsageMetadata {
    prompt_token_count: u64,
    #[serde(default)]
    candidates_token_count: u64,
}

impl From<NormalizedUsage> for TokenCounts {
    fn from(u: NormalizedUsage) -> Self {
        Self::new(u.input_tokens, u.output_tokens)
    }
}

impl From<AnthropicUsage> for TokenCounts {
    fn from(u: AnthropicUsage) -> Self {
        Self::new(u.input_tokens, u.output_tokens)
    }
}

impl From<OpenAiTokenUsage> for TokenCounts {
    fn from(u: OpenAiTokenUsage) -> Self {
        Self::new(u.prompt_tokens, u.completion_tokens)
    }
}

impl From<OpenAiUsage> for TokenCounts {
    fn from(u: OpenAiUsage) -> Self {
        Self::new(u.prompt_tokens, u.completion_tokens)
    }
}

impl From<GoogleUsageMetadata> for TokenCounts {
    fn from(u: GoogleUsageMetadata) -> Self {
        Self::new(u.prompt_token_count, u.candidates_token_count)
    }
}

fn try_shape<T>(node: Option<&Value>) -> Option<TokenCounts>
where
    T: DeserializeOwned + Into<TokenCounts>,
{
    T::deserialize(node?).ok().map(Into::into)
}

type Extractor = fn(&Value) -> Option<TokenCounts>;

fn normalized(root: &Value) -> Option<TokenCounts> {
    try_shape::<NormalizedUsage>(root.get("usage_metadata"))
}

fn anthropic(root: &Value) -> Option<TokenCounts> {
    try_shape::<AnthropicUsage>(root.pointer("/response_metadata/usage"))
}

fn openai_camel(root: &Value) -> Option<TokenCounts> {
    try_shape::<OpenAiTokenUsage>(root.pointer("/response_metadata/tokenUsage"))
}

fn openai_snake(root: &Value) -> Option<TokenCounts> {
    try_shape::<OpenAiUsage>(root.get("usage"))
}

fn google(root: &Value) -> Option<TokenCounts> {
    try_shape::<GoogleUsageMetadata>(root.get("usageMetadata"))
}

/// Extractors in priority order.
const CHAIN: [(UsageShape, Extractor); 5] = [
    (UsageShape::Normalized, normalized),
    (UsageShape::Anthropic, anthropic),
    (UsageShape::OpenAiCamel, openai_camel),
    (UsageShape::OpenAiSnake, openai_snake),
    (UsageShape::Google, google),
];

/// Find the first matching shape and its counts.
pub fn detect_usage(metadata: &Value) -> Option<(UsageShape, TokenCounts)> {
    CHAIN
        .iter()
        .find_map(|(shape, extract)| extract(metadata).map(|counts| (*shape, counts)))
}

/// Token counts from response metadata, zero if no shape matches.
pub fn extract_usage(metadata: &Value) -> TokenCounts {
    detect_usage(metadata).map(|(_, counts)| counts).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn normalized_shape() {
        let meta = json!({"usage_metadata": {"input_tokens": 120, "output_tokens": 30}});
        assert_eq!(detect_usage(&meta), Some((UsageShape::Normalized, TokenCounts::new(120, 30))));
    }

    #[test]
    fn anthropic_shape() {
        let meta = json!({"response_metadata": {"usage": {
            "input_tokens": 500, "output_tokens": 42, "cache_read_input_tokens": 0
        }}});
        assert_eq!(detect_usage(&meta), Some((UsageShape::Anthropic, TokenCounts::new(500, 42))));
    }

    #[test]
    fn openai_camel_shape() {
        let meta = json!({"response_metadata": {"tokenUsage": {
            "promptTokens": 10, "completionTokens": 5, "totalTokens": 15
        }}});
        assert_eq!(extract_usage(&meta), TokenCounts::new(10, 5));
    }

    #[test]
    fn openai_snake_shape() {
        let meta = json!({"usage": {"prompt_tokens": 7, "completion_tokens": 3, "total_tokens": 10}});
        assert_eq!(detect_usage(&meta).map(|(s, _)| s), Some(UsageShape::OpenAiSnake));
        assert_eq!(extract_usage(&meta).total(), 10);
    }

    #[test]
    fn google_shape() {
        let meta = json!({"usageMetadata": {"promptTokenCount": 64, "candidatesTokenCount": 16}});
        assert_eq!(extract_usage(&meta), TokenCounts::new(64, 16));
    }

    #[test]
    fn first_match_wins() {
        let meta = json!({
            "usage_metadata": {"input_tokens": 1, "output_tokens": 2},
            "usage": {"prompt_tokens": 100, "completion_tokens": 200},
        });
        assert_eq!(extract_usage(&meta), TokenCounts::new(1, 2));
    }

    #[test]
    fn malformed_higher_priority_shape_falls_through() {
        let meta = json!({
            "usage_metadata": {"input_tokens": "many"},
            "usageMetadata": {"promptTokenCount": 9, "candidatesTokenCount": 1},
        });
        assert_eq!(detect_usage(&meta), Some((UsageShape::Google, TokenCounts::new(9, 1))));
    }

    #[test]
    fn unknown_shapes_default_to_zero() {
        for meta in [json!(null), json!({}), json!("text"), json!([1, 2]), json!({"usage": 5})] {
            assert_eq!(extract_usage(&meta), TokenCounts::default());
        }
    }
}
