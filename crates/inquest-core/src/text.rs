//! Bounded text truncation.

/// Result of truncating a piece of text to a character budget.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Truncated {
    /// The (possibly shortened) text, including the marker when cut.
    pub text: String,
    /// Whether anything was removed.
    pub truncated: bool,
    /// Character count of the input.
    pub original_chars: usize,
}

/// Truncate `text` to at most `max_chars` characters.
///
/// Cuts on a char boundary and appends a marker showing original vs kept
/// length. Text within the budget is returned unchanged.
pub fn truncate_chars(text: &str, max_chars: usize) -> Truncated {
    let original_chars = text.chars().count();
    if original_chars <= max_chars {
        return Truncated {
            text: text.to_owned(),
            truncated: false,
            original_chars,
        };
    }
    let cut = text
        .char_indices()
        .nth(max_chars)
        .map_or(text.len(), |(idx, _)| idx);
    Truncated {
        text: format!(
            "{}\n\n[truncated: {original_chars} chars -> {max_chars} chars]",
            &text[..cut]
        ),
        truncated: true,
        original_chars,
    }
}
