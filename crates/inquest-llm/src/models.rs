//! Effective model resolution.

use std::fmt;

use inquest_core::Provider;
use serde::{Deserialize, Serialize};

/// Default model id for each backend.
pub fn default_model(provider: Provider) -> &'static str {
    match provider {
        Provider::Anthropic => "claude-sonnet-4-5",
        Provider::OpenAi => "gpt-4.1",
        Provider::Google => "gemini-2.5-pro",
        Provider::Bedrock => "anthropic.claude-sonnet-4-5-20250929-v1:0",
        Provider::Ollama => "llama3.1",
    }
}

/// The model a run talks to. Resolved once, then shared by every call and
/// by the cost estimator.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedModel {
    /// Backend serving the model.
    pub provider: Provider,
    /// Model identifier sent to the backend.
    pub model: String,
}

impl fmt::Display for ResolvedModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.provider, self.model)
    }
}

/// Explicit override if present and non-blank, else the provider default.
pub fn resolve_model(provider: Provider, model_override: Option<&str>) -> ResolvedModel {
    let model = model_override
        .map(str::trim)
        .filter(|m| !m.is_empty())
        .unwrap_or_else(|| default_model(provider));
    ResolvedModel {
        provider,
        model: model.to_owned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pricing::price_tier;

    #[test]
    fn override_wins() {
        let resolved = resolve_model(Provider::OpenAi, Some("gpt-4.1-mini"));
        assert_eq!(resolved.model, "gpt-4.1-mini");
        assert_eq!(resolved.provider, Provider::OpenAi);
    }

    #[test]
    fn blank_override_falls_back_to_default() {
        assert_eq!(resolve_model(Provider::Google, Some("  ")).model, "gemini-2.5-pro");
        assert_eq!(resolve_model(Provider::Google, None).model, "gemini-2.5-pro");
    }

    #[test]
    fn every_remote_default_is_priced() {
        for provider in Provider::ALL.into_iter().filter(|p| !p.is_local()) {
            assert!(
                price_tier(default_model(provider), provider).is_some(),
                "{provider} default has no price"
            );
        }
    }

    #[test]
    fn display_joins_provider_and_model() {
        assert_eq!(
            resolve_model(Provider::Anthropic, None).to_string(),
            "anthropic/claude-sonnet-4-5"
        );
    }
}
