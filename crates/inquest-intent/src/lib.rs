//! # inquest-intent
//!
//! The chat entry point: classify a message into ordered intents, then run
//! one node per intent through a small router state machine.
//!
//! - **Intents**: the fixed [`Intent`] label set
//! - **Classify**: model-backed classification with the summarize rule and
//!   a `[general-response]` default
//! - **State**: [`IntentExecutionState`] cursor and [`Route`]s
//! - **Workflow**: [`ChatWorkflow`] with per-node deadlines and a
//!   [`ResponseBuffer`] that survives node failures

#![deny(unsafe_code)]

pub mod buffer;
pub mod classify;
pub mod errors;
pub mod handler;
pub mod intent;
pub mod state;
pub mod workflow;

pub use buffer::ResponseBuffer;
pub use classify::{Classification, IntentClassifier};
pub use errors::IntentError;
pub use handler::{IntentHandler, ModelIntentHandler, NodeInput};
pub use intent::Intent;
pub use state::{FINAL_NODE, IntentExecutionState, Route};
pub use workflow::{ChatTurn, ChatWorkflow};
