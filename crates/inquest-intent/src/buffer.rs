//! Accumulated chat response.

use crate::intent::Intent;

/// Separator between outputs of successive intent nodes.
pub const SECTION_SEPARATOR: &str = "\n\n";

/// Response text built up across intent nodes.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ResponseBuffer {
    text: String,
}

impl ResponseBuffer {
    /// Empty buffer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `output` after a separator. Blank output is skipped.
    pub fn append(&mut self, output: &str) {
        let output = output.trim();
        if output.is_empty() {
            return;
        }
        if !self.text.is_empty() {
            self.text.push_str(SECTION_SEPARATOR);
        }
        self.text.push_str(output);
    }

    /// Replace everything accumulated so far.
    pub fn replace(&mut self, output: &str) {
        output.trim().clone_into(&mut self.text);
    }

    /// Fold in the output of `intent`'s node.
    pub fn apply(&mut self, intent: Intent, output: &str) {
        if intent.replaces_buffer() {
            self.replace(output);
        } else {
            self.append(output);
        }
    }

    /// Current text.
    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// Whether nothing has been produced yet.
    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    /// Take the text.
    pub fn into_string(self) -> String {
        self.text
    }
}
