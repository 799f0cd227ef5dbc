//! Model call errors.

use thiserror::Error;

/// Errors from a model collaborator.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ModelError {
    /// The backend rejected or failed the request.
    #[error("model request failed: {0}")]
    Request(String),
    /// The backend answered with something unusable.
    #[error("invalid model response: {0}")]
    InvalidResponse(String),
    /// A scripted model ran out of responses.
    #[error("no scripted response for call {call}")]
    Exhausted {
        /// Zero-based index of the call that had no response.
        call: usize,
    },
}

impl ModelError {
    /// Stable category string for logs and reports.
    pub fn category(&self) -> &'static str {
        match self {
            Self::Request(_) => "request",
            Self::InvalidResponse(_) => "invalid_response",
            Self::Exhausted { .. } => "exhausted",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_and_category() {
        let err = ModelError::Exhausted { call: 3 };
        assert_eq!(err.to_string(), "no scripted response for call 3");
        assert_eq!(err.category(), "exhausted");
        assert_eq!(ModelError::Request("503".into()).category(), "request");
    }
}
