//! Chat workflow errors.

use inquest_llm::ModelError;
use inquest_runtime::TimeoutError;
use thiserror::Error;

/// Errors raised while classifying or handling a chat turn.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum IntentError {
    /// A label outside the fixed set.
    #[error("unknown intent `{0}`")]
    UnknownIntent(String),
    /// The classifier answered with something that is not a classification.
    #[error("invalid classification: {0}")]
    InvalidClassification(String),
    /// A model call failed.
    #[error(transparent)]
    Model(#[from] ModelError),
    /// A node exceeded its step deadline.
    #[error(transparent)]
    Timeout(#[from] TimeoutError),
    /// An intent handler failed.
    #[error("{intent} handler failed: {message}")]
    Handler {
        /// Intent being handled.
        intent: String,
        /// Failure description.
        message: String,
    },
}
