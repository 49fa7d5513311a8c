//! Keystroke compiler
//!
//! Turns a parsed reply intent into an ordered, declarative sequence of
//! logical key events. The sequence is pure data; delivery (and the actual
//! tmux key names) lives in the `tmux` module.

use crate::error::RelayError;
use crate::reply::ReplyIntent;

/// A logical key event targeting the session's input line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyEvent {
    /// Move the menu selection down one entry
    Down,
    /// Commit the current selection or input line
    Enter,
    /// Erase the current input buffer
    ClearLine,
    /// Inject text verbatim, never interpreted as control keys
    Literal(String),
}

impl KeyEvent {
    /// Name echoed back in the `keysSent` result field
    pub fn display_name(&self) -> &str {
        match self {
            KeyEvent::Down => "Down",
            KeyEvent::Enter => "Enter",
            KeyEvent::ClearLine => "ClearLine",
            KeyEvent::Literal(text) => text,
        }
    }
}

/// Ordered key events, no delivery mechanism attached
pub type KeySequence = Vec<KeyEvent>;

/// A compiled sequence plus the echoed option label, when known
#[derive(Debug, Clone)]
pub struct CompiledKeys {
    pub sequence: KeySequence,
    /// Human-readable label of the selected option, informational only
    pub option_text: Option<String>,
}

/// Compile an intent into a key sequence.
///
/// Menu prompts are navigated by repeated downward movement from a default
/// top selection, so position n needs exactly n down-moves; position 1
/// needs zero. Free text clears the input line first so stale or
/// placeholder characters are never concatenated into the reply.
///
/// When `known_options` is supplied, an `Option` index past the end fails
/// with [`RelayError::OutOfRange`].
pub fn compile(
    intent: &ReplyIntent,
    known_options: Option<&[String]>,
) -> Result<CompiledKeys, RelayError> {
    match intent {
        ReplyIntent::Option { index } => {
            let option_text = match known_options {
                Some(options) => {
                    if *index >= options.len() {
                        return Err(RelayError::OutOfRange {
                            requested: index + 1,
                            available: options.len(),
                        });
                    }
                    Some(options[*index].clone())
                }
                None => None,
            };

            let mut sequence = Vec::with_capacity(index + 1);
            for _ in 0..*index {
                sequence.push(KeyEvent::Down);
            }
            sequence.push(KeyEvent::Enter);

            Ok(CompiledKeys {
                sequence,
                option_text,
            })
        }
        ReplyIntent::Text { content } => Ok(CompiledKeys {
            sequence: vec![
                KeyEvent::ClearLine,
                KeyEvent::Literal(content.clone()),
                KeyEvent::Enter,
            ],
            option_text: None,
        }),
    }
}
