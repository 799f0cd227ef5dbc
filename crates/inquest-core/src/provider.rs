//! The closed set of supported model backends.
//!
//! Every consumer matches on [`Provider`] exhaustively, so adding a backend
//! is a compile error at each dispatch site until it is handled.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// A supported model backend.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    /// Anthropic Messages API.
    Anthropic,
    /// `OpenAI` chat completions.
    #[serde(rename = "openai")]
    OpenAi,
    /// Google Gemini.
    Google,
    /// AWS Bedrock hosted models.
    Bedrock,
    /// Local Ollama server. Always free.
    Ollama,
}

impl Provider {
    /// Every supported provider, in display order.
    pub const ALL: [Provider; 5] = [
        Provider::Anthropic,
        Provider::OpenAi,
        Provider::Google,
        Provider::Bedrock,
        Provider::Ollama,
    ];

    /// Wire name used in settings files and env vars.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Anthropic => "anthropic",
            Self::OpenAi => "openai",
            Self::Google => "google",
            Self::Bedrock => "bedrock",
            Self::Ollama => "ollama",
        }
    }

    /// Whether calls to this backend run offline and carry no cost.
    pub fn is_local(self) -> bool {
        match self {
            Self::Ollama => true,
            Self::Anthropic | Self::OpenAi | Self::Google | Self::Bedrock => false,
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A provider name outside the supported set. Fatal at construction.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("unknown provider `{0}` (expected one of: anthropic, openai, google, bedrock, ollama)")]
pub struct UnknownProviderError(pub String);

impl FromStr for Provider {
    type Err = UnknownProviderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase();
        Provider::ALL
            .into_iter()
            .find(|p| p.as_str() == normalized)
            .ok_or_else(|| UnknownProviderError(s.to_owned()))
    }
}
