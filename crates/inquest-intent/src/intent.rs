//! The fixed intent label set.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::IntentError;

/// A classified category of chat request.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Intent {
    /// Retrieve information about a subject.
    FindInformation,
    /// Condense what has been produced so far.
    Summarize,
    /// Translate the accumulated response.
    Translate,
    /// Answer directly without a specialized node.
    GeneralResponse,
}

impl Intent {
    /// Every label, in declaration order.
    pub const ALL: [Self; 4] = [
        Self::FindInformation,
        Self::Summarize,
        Self::Translate,
        Self::GeneralResponse,
    ];

    /// Wire label.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::FindInformation => "find-information",
            Self::Summarize => "summarize",
            Self::Translate => "translate",
            Self::GeneralResponse => "general-response",
        }
    }

    /// Whether this intent's output replaces the response buffer instead of
    /// extending it.
    pub fn replaces_buffer(self) -> bool {
        matches!(self, Self::Translate)
    }
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Intent {
    type Err = IntentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let label = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|intent| intent.as_str() == label)
            .ok_or_else(|| IntentError::UnknownIntent(s.to_owned()))
    }
}
