//! Session injector
//!
//! Executes a compiled key sequence against a live tmux session through its
//! control socket, and captures pane content for the notifier. Every tmux
//! invocation is bounded by a timeout; failures are classified into the
//! relay error taxonomy. No retries happen here; retry policy, if any,
//! belongs to the caller.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use tokio::process::Command;
use tokio::time::{sleep, timeout};
use tracing::{debug, warn};

use crate::error::RelayError;
use crate::keys::KeyEvent;

/// Bound on every tmux call
const TMUX_CALL_TIMEOUT: Duration = Duration::from_secs(5);

/// Settle delay after clearing the line or typing a literal, before the
/// committing Enter. Mirrors a human typing then pressing submit.
const SETTLE_DELAY: Duration = Duration::from_millis(100);

/// tmux stderr phrasings that mean the session is gone
const SESSION_GONE_PHRASES: &[&str] = &["can't find session", "session not found", "no server"];

/// A session + pane addressed through an optional control socket
#[derive(Debug, Clone)]
pub struct RelayTarget {
    pub session: String,
    /// Control socket path (`tmux -S`); `None` means the ambient default
    pub socket: Option<PathBuf>,
    /// `"<window>.<pane>"`, first pane of the first window by default
    pub pane: String,
}

impl RelayTarget {
    /// tmux `-t` argument, `session:window.pane`
    pub fn pane_target(&self) -> String {
        format!("{}:{}", self.session, self.pane)
    }
}

/// Injection behavior knobs
#[derive(Debug, Clone)]
pub struct InjectOptions {
    /// Pause between discrete menu keystrokes
    pub inter_key_delay: Duration,
    /// Simulate without contacting tmux
    pub dry_run: bool,
}

/// Verify the tmux binary is reachable.
pub async fn ensure_available() -> Result<(), RelayError> {
    let mut cmd = Command::new("tmux");
    cmd.arg("-V")
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null());
    match timeout(TMUX_CALL_TIMEOUT, cmd.status()).await {
        Ok(Ok(status)) if status.success() => Ok(()),
        _ => Err(RelayError::ToolUnavailable),
    }
}

/// Run one tmux command, bounded by [`TMUX_CALL_TIMEOUT`].
async fn run_tmux(socket: Option<&Path>, args: &[&str]) -> Result<String, RelayError> {
    let mut cmd = Command::new("tmux");
    if let Some(socket) = socket {
        cmd.arg("-S").arg(socket);
    }
    cmd.args(args).stdin(Stdio::null());

    let output = timeout(TMUX_CALL_TIMEOUT, cmd.output())
        .await
        .map_err(|_| RelayError::InjectionFailed {
            message: format!("tmux call timed out after {}s", TMUX_CALL_TIMEOUT.as_secs()),
        })?
        .map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                RelayError::ToolUnavailable
            } else {
                RelayError::InjectionFailed {
                    message: e.to_string(),
                }
            }
        })?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        let message = if stderr.is_empty() {
            format!("tmux exited with {}", output.status)
        } else {
            stderr
        };
        return Err(RelayError::InjectionFailed { message });
    }

    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

/// Rewrite a raw delivery failure into `SessionNotFound` when the tmux
/// message says the session is gone.
fn classify(err: RelayError, session: &str) -> RelayError {
    if let RelayError::InjectionFailed { message } = &err {
        let lower = message.to_lowercase();
        if SESSION_GONE_PHRASES.iter().any(|p| lower.contains(p)) {
            return RelayError::SessionNotFound {
                session: session.to_string(),
            };
        }
    }
    err
}

/// Deliver a key sequence to the target session.
///
/// `Down` steps are paced by `inter_key_delay`; the committing `Enter` goes
/// out immediately after the last `Down`. `ClearLine` and `Literal` get the
/// fixed [`SETTLE_DELAY`] before the next key. On success the session's
/// input buffer reflects the injected keys and Enter-terminated sequences
/// are submitted.
pub async fn inject(
    target: &RelayTarget,
    sequence: &[KeyEvent],
    options: &InjectOptions,
) -> Result<(), RelayError> {
    if options.dry_run {
        debug!(
            session = %target.session,
            keys = sequence.len(),
            "Dry run, not contacting tmux"
        );
        return Ok(());
    }

    ensure_available().await?;

    let pane = target.pane_target();
    let socket = target.socket.as_deref();

    for (i, event) in sequence.iter().enumerate() {
        let args: Vec<&str> = match event {
            KeyEvent::Down => vec!["send-keys", "-t", pane.as_str(), "Down"],
            KeyEvent::Enter => vec!["send-keys", "-t", pane.as_str(), "Enter"],
            KeyEvent::ClearLine => vec!["send-keys", "-t", pane.as_str(), "C-u"],
            KeyEvent::Literal(text) => {
                vec!["send-keys", "-t", pane.as_str(), "-l", "--", text.as_str()]
            }
        };

        run_tmux(socket, &args)
            .await
            .map_err(|e| classify(e, &target.session))?;

        match event {
            KeyEvent::Down if matches!(sequence.get(i + 1), Some(KeyEvent::Down)) => {
                sleep(options.inter_key_delay).await;
            }
            KeyEvent::ClearLine | KeyEvent::Literal(_) if i + 1 < sequence.len() => {
                sleep(SETTLE_DELAY).await;
            }
            _ => {}
        }
    }

    debug!(session = %target.session, pane = %pane, keys = sequence.len(), "Keys injected");
    Ok(())
}

/// Capture the last `lines` joined lines of the target pane's visible
/// output. Used by the notifier for prompt summaries.
pub async fn capture_pane(target: &RelayTarget, lines: u32) -> Result<String, RelayError> {
    let pane = target.pane_target();
    let start = format!("-{lines}");
    let args = [
        "capture-pane",
        "-p",
        "-J",
        "-t",
        pane.as_str(),
        "-S",
        start.as_str(),
    ];

    match run_tmux(target.socket.as_deref(), &args).await {
        Ok(out) => Ok(out),
        Err(e) => {
            warn!(session = %target.session, error = %e, "Pane capture failed");
            Err(classify(e, &target.session))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn target() -> RelayTarget {
        RelayTarget {
            session: "claude-nomads".to_string(),
            socket: None,
            pane: "0.0".to_string(),
        }
    }

    #[test]
    fn test_pane_target_format() {
        assert_eq!(target().pane_target(), "claude-nomads:0.0");
        let t = RelayTarget {
            session: "s".to_string(),
            socket: None,
            pane: "1.2".to_string(),
        };
        assert_eq!(t.pane_target(), "s:1.2");
    }

    #[tokio::test]
    async fn test_dry_run_has_no_side_effects() {
        let sequence = vec![KeyEvent::Down, KeyEvent::Enter];
        let options = InjectOptions {
            inter_key_delay: Duration::from_millis(200),
            dry_run: true,
        };
        // Must succeed without tmux and without waiting out any delays
        inject(&target(), &sequence, &options).await.unwrap();
    }

    #[test]
    fn test_session_gone_classification() {
        let err = classify(
            RelayError::InjectionFailed {
                message: "can't find session: claude-nomads".to_string(),
            },
            "claude-nomads",
        );
        assert!(matches!(err, RelayError::SessionNotFound { .. }));
        assert!(err.to_string().contains("claude-nomads"));

        let err = classify(
            RelayError::InjectionFailed {
                message: "No Server running on /tmp/x.sock".to_string(),
            },
            "s",
        );
        assert!(matches!(err, RelayError::SessionNotFound { .. }));
    }

    #[test]
    fn test_other_failures_surface_verbatim() {
        let err = classify(
            RelayError::InjectionFailed {
                message: "invalid key: Floop".to_string(),
            },
            "s",
        );
        match err {
            RelayError::InjectionFailed { message } => assert_eq!(message, "invalid key: Floop"),
            other => panic!("unexpected: {other:?}"),
        }
    }
}
