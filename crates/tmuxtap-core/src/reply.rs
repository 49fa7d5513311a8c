//! Reply parser
//!
//! Classifies a raw reply string into a structured intent: a 1-based menu
//! selection or literal free text.

/// Parsed reply intent
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplyIntent {
    /// Menu selection. `index` is zero-based; the human typed it 1-based.
    Option { index: usize },
    /// Literal free text (trimmed)
    Text { content: String },
}

/// Parse a reply string into an intent.
///
/// A trimmed string of only ASCII digits is always an `Option` selection
/// ("2" selects index 1, "10" selects index 9). Everything else is `Text`.
/// Range validation against the menu is the compiler's job, not ours.
/// Callers never pass an empty reply; that is rejected upstream.
pub fn parse_reply(raw: &str) -> ReplyIntent {
    let reply = raw.trim();
    if !reply.is_empty() && reply.bytes().all(|b| b.is_ascii_digit()) {
        // A digit run too long for usize is not a plausible menu position,
        // treat it as text.
        if let Ok(n) = reply.parse::<usize>() {
            return ReplyIntent::Option {
                index: n.saturating_sub(1),
            };
        }
    }
    ReplyIntent::Text {
        content: reply.to_string(),
    }
}
