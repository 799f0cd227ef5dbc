//! Sequential intent execution state.
//!
//! The cursor starts at -1. Each [`IntentExecutionState::route`] call marks
//! the current intent executed, advances the cursor and says where to go
//! next. Once the cursor reaches the end it stays there and every later
//! call routes to [`Route::Final`].

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::intent::Intent;

/// Node name for the final response.
pub const FINAL_NODE: &str = "final-response";

/// Where the router sends the workflow next.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Route {
    /// Run the node for this intent.
    Execute(Intent),
    /// Answer directly, bypassing the intent node table.
    DirectResponse,
    /// Produce the final response.
    Final,
}

impl Route {
    /// Name of the node to run.
    pub fn node_name(self) -> &'static str {
        match self {
            Self::Execute(intent) => intent.as_str(),
            Self::DirectResponse => Intent::GeneralResponse.as_str(),
            Self::Final => FINAL_NODE,
        }
    }

    /// Intent handled at this stop, if any.
    pub fn intent(self) -> Option<Intent> {
        match self {
            Self::Execute(intent) => Some(intent),
            Self::DirectResponse => Some(Intent::GeneralResponse),
            Self::Final => None,
        }
    }

    fn for_intent(intent: Intent) -> Self {
        match intent {
            Intent::GeneralResponse => Self::DirectResponse,
            other => Self::Execute(other),
        }
    }
}

/// Progress through one turn's classified intents.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IntentExecutionState {
    intents_to_execute: Vec<Intent>,
    executed_intents: Vec<Intent>,
    current_intent_index: i32,
}

impl IntentExecutionState {
    /// Fresh state with the cursor before the first intent.
    pub fn new(intents: Vec<Intent>) -> Self {
        Self {
            intents_to_execute: intents,
            executed_intents: Vec::new(),
            current_intent_index: -1,
        }
    }

    /// Intents in execution order.
    pub fn intents_to_execute(&self) -> &[Intent] {
        &self.intents_to_execute
    }

    /// Intents already completed, in order.
    pub fn executed_intents(&self) -> &[Intent] {
        &self.executed_intents
    }

    /// Cursor: -1 before the first route, `len` once finished.
    pub fn current_intent_index(&self) -> i32 {
        self.current_intent_index
    }

    /// Whether every intent has been routed past.
    pub fn is_finished(&self) -> bool {
        self.position() >= self.len()
    }

    /// Intent at the cursor.
    pub fn current(&self) -> Option<Intent> {
        usize::try_from(self.current_intent_index)
            .ok()
            .and_then(|i| self.intents_to_execute.get(i).copied())
    }

    /// Mark the current intent executed, advance and return the next stop.
    pub fn route(&mut self) -> Route {
        if let Some(done) = self.current() {
            self.executed_intents.push(done);
        }
        if !self.is_finished() {
            self.current_intent_index += 1;
        }
        let route = self.current().map_or(Route::Final, Route::for_intent);
        debug!(
            cursor = self.current_intent_index,
            node = route.node_name(),
            "intent routed"
        );
        route
    }

    fn len(&self) -> i64 {
        i64::try_from(self.intents_to_execute.len()).unwrap_or(i64::MAX)
    }

    fn position(&self) -> i64 {
        i64::from(self.current_intent_index)
    }
}
