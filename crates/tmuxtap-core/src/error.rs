//! Relay errors
//!
//! Every expected failure mode crosses component boundaries as a variant
//! here, never as a panic or a bare anyhow error. The CLI serializes these
//! into the `{ok: false, error: ...}` result line.

/// Relay error taxonomy
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    /// No target session was supplied (caller-correctable)
    #[error("session is required")]
    MissingSession,

    /// No reply text was supplied (caller-correctable)
    #[error("reply is required")]
    MissingReply,

    /// Selected option exceeds the known option count
    #[error("option index {requested} out of range ({available} options available)")]
    OutOfRange { requested: usize, available: usize },

    /// The tmux binary is missing or unresponsive
    #[error("tmux not found on PATH")]
    ToolUnavailable,

    /// tmux reported that the target session no longer exists
    #[error("tmux session not found: {session}")]
    SessionNotFound { session: String },

    /// Any other delivery failure, surfaced with the raw tmux message
    #[error("{message}")]
    InjectionFailed { message: String },
}
