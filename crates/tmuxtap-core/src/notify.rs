//! Notifier
//!
//! Hook entry for the agent's Notification events: records the blocked
//! session in the registries, captures the pane for context, and publishes
//! a summary to the chat channel. There is exactly one formatter; the
//! fragile screen-scrape heuristics are isolated behind [`summarize_pane`]
//! so the matching/injection core never depends on their accuracy.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::config::RelayConfig;
use crate::matcher::extract_ids;
use crate::registry::{record_binding, record_pending, PendingSession, PromptKind, ThreadBinding};
use crate::store::RecordStore;
use crate::tmux::{capture_pane, RelayTarget};

/// Bound on every messenger CLI call
const MESSENGER_TIMEOUT: Duration = Duration::from_secs(8);

/// Summary keeps at most this many trailing non-empty pane lines
const SUMMARY_MAX_LINES: usize = 15;
/// ...and at most this many trailing characters, to stay readable in chat
const SUMMARY_MAX_CHARS: usize = 600;

/// Notification event as delivered on the hook's stdin
#[derive(Debug, Clone, Deserialize)]
pub struct NotifyEvent {
    #[serde(default)]
    pub notification_type: String,
    #[serde(default)]
    pub cwd: Option<PathBuf>,
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

/// Map a notification type to the prompt kind it represents. Anything else
/// is not actionable and the hook stays quiet.
pub fn prompt_kind_for(notification_type: &str) -> Option<PromptKind> {
    match notification_type {
        "idle_prompt" => Some(PromptKind::Idle),
        "elicitation_dialog" => Some(PromptKind::Elicitation),
        "permission_prompt" => Some(PromptKind::Permission),
        _ => None,
    }
}

/// Derive the tmux session name from the working directory.
/// Convention: `claude-<project-folder-name>`.
pub fn session_name_for(cwd: &Path) -> String {
    let name = cwd
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "session".to_string());
    format!("claude-{name}")
}

/// Reduce raw pane text to the meaningful tail: the question plus its
/// options. Last non-empty lines, then a character cap.
pub fn summarize_pane(text: &str) -> String {
    let lines: Vec<&str> = text
        .lines()
        .map(str::trim_end)
        .filter(|l| !l.trim().is_empty())
        .collect();
    let start = lines.len().saturating_sub(SUMMARY_MAX_LINES);
    let tail = lines[start..].join("\n");

    let chars = tail.chars().count();
    if chars > SUMMARY_MAX_CHARS {
        tail.chars().skip(chars - SUMMARY_MAX_CHARS).collect()
    } else {
        tail
    }
}

/// The one notification template.
pub fn format_notification(session: &str, summary: &str) -> String {
    format!(
        "🤖 **{session}** needs your input\n```\n{summary}\n```\n\
         Reply with a number or free text — I'll route it back.\n\
         _(session: {session})_"
    )
}

/// The remote chat capability: exactly four operations. Everything the
/// notifier knows about the transport goes through this seam.
#[async_trait]
pub trait ChatTransport: Send + Sync {
    async fn send_message(&self, channel: &str, text: &str) -> Result<()>;
    /// Open a thread in the channel; returns the platform-assigned id when
    /// the transport surfaces one.
    async fn create_thread(&self, channel: &str, name: &str) -> Result<Option<String>>;
    async fn reply_in_thread(&self, thread_id: &str, text: &str) -> Result<()>;
    /// Fetch the transport's view of a thread (recent messages etc).
    async fn query(&self, thread_id: &str) -> Result<serde_json::Value>;
}

/// Chat transport backed by a messenger CLI binary
pub struct MessengerCli {
    bin: PathBuf,
}

impl MessengerCli {
    pub fn new(bin: impl Into<PathBuf>) -> Self {
        Self { bin: bin.into() }
    }

    async fn run(&self, args: &[&str]) -> Result<String> {
        let mut cmd = Command::new(&self.bin);
        cmd.args(args).stdin(Stdio::null());

        let output = timeout(MESSENGER_TIMEOUT, cmd.output())
            .await
            .map_err(|_| anyhow!("messenger call timed out after {}s", MESSENGER_TIMEOUT.as_secs()))?
            .with_context(|| format!("Failed to run {}", self.bin.display()))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            anyhow::bail!("messenger exited with {}: {stderr}", output.status);
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

#[async_trait]
impl ChatTransport for MessengerCli {
    async fn send_message(&self, channel: &str, text: &str) -> Result<()> {
        self.run(&["message", "send", "--target", channel, "--message", text])
            .await?;
        Ok(())
    }

    async fn create_thread(&self, channel: &str, name: &str) -> Result<Option<String>> {
        let out = self
            .run(&["thread", "create", "--target", channel, "--name", name])
            .await?;
        Ok(extract_ids(&out).into_iter().next())
    }

    async fn reply_in_thread(&self, thread_id: &str, text: &str) -> Result<()> {
        self.run(&["message", "send", "--thread", thread_id, "--message", text])
            .await?;
        Ok(())
    }

    async fn query(&self, thread_id: &str) -> Result<serde_json::Value> {
        let out = self
            .run(&["message", "list", "--thread", thread_id, "--json"])
            .await?;
        Ok(serde_json::from_str(&out).unwrap_or(serde_json::Value::String(out)))
    }
}

/// Hook outcome, echoed as the result line
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NotifyResult {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skipped: Option<String>,
    pub notified: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thread_id: Option<String>,
}

impl NotifyResult {
    fn skipped(reason: impl Into<String>) -> Self {
        Self {
            ok: true,
            session: None,
            skipped: Some(reason.into()),
            notified: false,
            thread_id: None,
        }
    }
}

/// Handle one notification event. Best-effort throughout: the pending
/// record is the one thing that must land; a failed capture falls back to
/// the event message and a failed send is logged, not fatal.
pub async fn run_notify(
    event: &NotifyEvent,
    config: &RelayConfig,
    store: &RecordStore,
    transport: Option<&dyn ChatTransport>,
) -> NotifyResult {
    let Some(kind) = prompt_kind_for(&event.notification_type) else {
        debug!(kind = %event.notification_type, "Notification type not actionable");
        return NotifyResult::skipped(format!(
            "notification type not actionable: {}",
            event.notification_type
        ));
    };

    let cwd = match event.cwd.clone().or_else(|| std::env::current_dir().ok()) {
        Some(cwd) => cwd,
        None => return NotifyResult::skipped("no working directory"),
    };
    let session = session_name_for(&cwd);
    let message = event
        .message
        .clone()
        .unwrap_or_else(|| "Agent is waiting for input".to_string());

    let record = PendingSession {
        session: session.clone(),
        socket: config.socket.clone(),
        pane: config.pane.clone(),
        prompt_kind: kind,
        message: message.clone(),
        conversation_id: event.session_id.clone(),
        cwd: Some(cwd),
        created_at: Utc::now().timestamp_millis(),
    };
    if let Err(e) = record_pending(store, &record) {
        warn!(session = %session, error = %e, "Failed to write pending record");
    }

    let target = RelayTarget {
        session: session.clone(),
        socket: config.socket.clone(),
        pane: config.pane.clone(),
    };
    let captured = match capture_pane(&target, config.capture_lines).await {
        Ok(text) if !text.trim().is_empty() => text,
        _ => message.clone(),
    };
    let summary = summarize_pane(&captured);
    let summary = if summary.is_empty() { message } else { summary };
    let text = format_notification(&session, &summary);

    let mut notified = false;
    let mut thread_id = None;
    match (config.channel.as_deref(), transport) {
        (Some(channel), Some(transport)) => {
            match transport.send_message(channel, &text).await {
                Ok(()) => {
                    info!(session = %session, channel = %channel, "Notification sent");
                    notified = true;
                }
                Err(e) => warn!(session = %session, error = %e, "Notification send failed"),
            }

            // Binding is best-effort; without it the matcher still has the
            // single-pending fallback
            if notified {
                match transport.create_thread(channel, &session).await {
                    Ok(Some(id)) => {
                        let binding = ThreadBinding {
                            thread_id: id.clone(),
                            session_name: session.clone(),
                            created_at: Utc::now().timestamp_millis(),
                        };
                        if let Err(e) = record_binding(store, &binding) {
                            warn!(session = %session, error = %e, "Failed to write thread binding");
                        } else {
                            thread_id = Some(id);
                        }
                    }
                    Ok(None) => debug!(session = %session, "Transport returned no thread id"),
                    Err(e) => warn!(session = %session, error = %e, "Thread creation failed"),
                }
            }
        }
        _ => debug!("No channel or transport configured, pending record only"),
    }

    NotifyResult {
        ok: true,
        session: Some(session),
        skipped: None,
        notified,
        thread_id,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::load_pending;
    use tempfile::tempdir;

    #[test]
    fn test_prompt_kind_mapping() {
        assert_eq!(prompt_kind_for("idle_prompt"), Some(PromptKind::Idle));
        assert_eq!(
            prompt_kind_for("elicitation_dialog"),
            Some(PromptKind::Elicitation)
        );
        assert_eq!(
            prompt_kind_for("permission_prompt"),
            Some(PromptKind::Permission)
        );
        assert_eq!(prompt_kind_for("tool_result"), None);
        assert_eq!(prompt_kind_for(""), None);
    }

    #[test]
    fn test_session_name_convention() {
        assert_eq!(
            session_name_for(Path::new("/home/w/projects/nomads")),
            "claude-nomads"
        );
        assert_eq!(session_name_for(Path::new("nomads")), "claude-nomads");
    }

    #[test]
    fn test_summarize_keeps_trailing_lines() {
        let mut text = String::new();
        for i in 0..40 {
            text.push_str(&format!("line {i}\n\n"));
        }
        let summary = summarize_pane(&text);
        let lines: Vec<&str> = summary.lines().collect();
        assert_eq!(lines.len(), SUMMARY_MAX_LINES);
        assert_eq!(lines[0], "line 25");
        assert_eq!(lines[lines.len() - 1], "line 39");
    }

    #[test]
    fn test_summarize_caps_characters() {
        let long = "x".repeat(2000);
        let summary = summarize_pane(&long);
        assert_eq!(summary.chars().count(), SUMMARY_MAX_CHARS);
    }

    #[test]
    fn test_summarize_drops_blank_lines() {
        let summary = summarize_pane("question?\n\n\n  \n1. yes\n2. no\n");
        assert_eq!(summary, "question?\n1. yes\n2. no");
    }

    #[test]
    fn test_notification_template() {
        let text = format_notification("claude-nomads", "Choose an option:\n1. yes\n2. no");
        assert!(text.contains("**claude-nomads**"));
        assert!(text.contains("```\nChoose an option:"));
        assert!(text.contains("_(session: claude-nomads)_"));
    }

    fn event(notification_type: &str) -> NotifyEvent {
        NotifyEvent {
            notification_type: notification_type.to_string(),
            cwd: Some(PathBuf::from("/home/w/projects/nomads")),
            session_id: Some("abc-123".to_string()),
            message: Some("Agent needs permission".to_string()),
        }
    }

    #[tokio::test]
    async fn test_actionable_event_records_pending() {
        let dir = tempdir().unwrap();
        let store = RecordStore::new(dir.path());
        let config = RelayConfig {
            state_dir: dir.path().to_path_buf(),
            ..RelayConfig::default()
        };

        let result = run_notify(&event("permission_prompt"), &config, &store, None).await;
        assert!(result.ok);
        assert_eq!(result.session.as_deref(), Some("claude-nomads"));
        assert!(!result.notified);

        let pending = load_pending(&store);
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].1.session, "claude-nomads");
        assert_eq!(pending[0].1.prompt_kind, PromptKind::Permission);
        assert_eq!(pending[0].1.conversation_id.as_deref(), Some("abc-123"));
    }

    #[tokio::test]
    async fn test_non_actionable_event_writes_nothing() {
        let dir = tempdir().unwrap();
        let store = RecordStore::new(dir.path());
        let config = RelayConfig {
            state_dir: dir.path().to_path_buf(),
            ..RelayConfig::default()
        };

        let result = run_notify(&event("tool_result"), &config, &store, None).await;
        assert!(result.ok);
        assert!(result.skipped.is_some());
        assert!(load_pending(&store).is_empty());
    }
}
