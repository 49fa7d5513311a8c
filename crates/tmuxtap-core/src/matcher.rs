//! Session matcher
//!
//! Resolves the opaque identifier attached to an inbound chat reply to
//! exactly one pending session. Thread bindings are the precise, intended
//! path; the single-pending fallback exists because most deployments run
//! one session at a time and a plain channel message may not surface a
//! thread id at all. With several live sessions and no binding match we
//! report ambiguity rather than guess.

use std::path::PathBuf;

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{json, Value};
use tracing::debug;

use crate::registry::{PendingSession, ThreadBinding};

/// Long numeric tokens, the shape of platform-assigned snowflake ids
static ID_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d{17,19}").unwrap());

/// Extract candidate identifiers from an arbitrary string, deduplicated
/// preserving first-seen order.
pub fn extract_ids(raw: &str) -> Vec<String> {
    let mut seen = Vec::new();
    for m in ID_PATTERN.find_iter(raw) {
        let id = m.as_str().to_string();
        if !seen.contains(&id) {
            seen.push(id);
        }
    }
    seen
}

/// Outcome of resolving an identifier against the registries
#[derive(Debug, Clone)]
pub enum MatchOutcome {
    Matched {
        state_file: PathBuf,
        record: PendingSession,
        /// True when matched via the single-pending heuristic rather than
        /// a thread binding
        fallback: bool,
    },
    Ambiguous {
        sessions: Vec<String>,
    },
    NoMatch {
        reason: String,
    },
}

impl MatchOutcome {
    pub fn matched(&self) -> bool {
        matches!(self, MatchOutcome::Matched { .. })
    }

    /// Stable wire shape for the `check` result line.
    pub fn to_json(&self) -> Value {
        match self {
            MatchOutcome::Matched {
                state_file,
                record,
                fallback,
            } => {
                let mut out = json!({
                    "matched": true,
                    "session": record.session,
                    "pane": record.pane,
                    "stateFile": state_file.to_string_lossy(),
                    "fallback": fallback,
                });
                if let Some(socket) = &record.socket {
                    out["socket"] = json!(socket.to_string_lossy());
                }
                out
            }
            MatchOutcome::Ambiguous { sessions } => json!({
                "matched": false,
                "ambiguous": true,
                "pendingSessions": sessions,
                "reason": "multiple pending relays, thread match required",
            }),
            MatchOutcome::NoMatch { reason } => json!({
                "matched": false,
                "reason": reason,
            }),
        }
    }
}

/// Resolve an inbound identifier to a pending session.
///
/// Candidates are tried in extraction order against the (already
/// TTL-filtered) bindings; the first binding whose bound session has a
/// pending record wins. Only when no binding matches does the
/// single-pending fallback apply. Deterministic over an unchanged registry
/// snapshot.
pub fn match_identifier(
    raw_identifier: &str,
    pending: &[(PathBuf, PendingSession)],
    bindings: &[ThreadBinding],
) -> MatchOutcome {
    let candidates = extract_ids(raw_identifier);
    if candidates.is_empty() {
        return MatchOutcome::NoMatch {
            reason: "no identifiers found".to_string(),
        };
    }

    for candidate in &candidates {
        let Some(binding) = bindings.iter().find(|b| &b.thread_id == candidate) else {
            continue;
        };
        if let Some((path, record)) = pending
            .iter()
            .find(|(_, r)| r.session == binding.session_name)
        {
            debug!(thread = %candidate, session = %record.session, "Thread binding matched");
            return MatchOutcome::Matched {
                state_file: path.clone(),
                record: record.clone(),
                fallback: false,
            };
        }
    }

    match pending {
        [] => MatchOutcome::NoMatch {
            reason: "no pending relay found".to_string(),
        },
        [(path, record)] => {
            debug!(session = %record.session, "Single-pending fallback matched");
            MatchOutcome::Matched {
                state_file: path.clone(),
                record: record.clone(),
                fallback: true,
            }
        }
        many => MatchOutcome::Ambiguous {
            sessions: many.iter().map(|(_, r)| r.session.clone()).collect(),
        },
    }
}
