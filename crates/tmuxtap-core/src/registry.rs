//! Pending-session and thread-binding registries
//!
//! Two sets of small, self-describing, time-stamped records on top of the
//! record store. The notifier writes them; the matcher reads them. Records
//! are never mutated, only superseded by overwrite and deleted after a
//! successful relay. Thread bindings carry a hard absolute expiry.

use std::path::{Path, PathBuf};

use anyhow::Result;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::store::RecordStore;

/// Filename prefix for pending-session records
pub const PENDING_PREFIX: &str = "pending-relay-";
/// Filename prefix for thread-binding records
pub const BINDING_PREFIX: &str = "discord-thread-";

/// Thread bindings expire 2 hours after creation, measured from
/// `createdAt` regardless of activity.
pub const BINDING_TTL_MS: i64 = 2 * 60 * 60 * 1000;

/// What kind of prompt the session is blocked on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PromptKind {
    Idle,
    Elicitation,
    Permission,
}

/// A session currently blocked awaiting a human reply
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingSession {
    /// tmux session name, the unique key
    pub session: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub socket: Option<PathBuf>,
    #[serde(default = "default_pane")]
    pub pane: String,
    pub prompt_kind: PromptKind,
    /// Original notification message shown to the human
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cwd: Option<PathBuf>,
    /// Epoch millis
    pub created_at: i64,
}

fn default_pane() -> String {
    "0.0".to_string()
}

/// Maps a remote chat thread to the session that opened it
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThreadBinding {
    pub thread_id: String,
    pub session_name: String,
    /// Epoch millis
    pub created_at: i64,
}

impl ThreadBinding {
    pub fn is_expired(&self, now_ms: i64) -> bool {
        now_ms - self.created_at >= BINDING_TTL_MS
    }
}

/// Record (or supersede) the pending state for a session.
pub fn record_pending(store: &RecordStore, record: &PendingSession) -> Result<PathBuf> {
    let path = store.put(&format!("{PENDING_PREFIX}{}", record.session), record)?;
    info!(session = %record.session, kind = ?record.prompt_kind, "Pending relay recorded");
    Ok(path)
}

/// All pending records, newest first. Only the newest record per session
/// exists on disk; overwrites replace older ones.
pub fn load_pending(store: &RecordStore) -> Vec<(PathBuf, PendingSession)> {
    let mut records: Vec<(PathBuf, PendingSession)> = store.get_all(PENDING_PREFIX);
    records.sort_by(|a, b| b.1.created_at.cmp(&a.1.created_at));
    records
}

/// Record the thread a session's notification opened.
pub fn record_binding(store: &RecordStore, binding: &ThreadBinding) -> Result<PathBuf> {
    let path = store.put(&format!("{BINDING_PREFIX}{}", binding.session_name), binding)?;
    info!(
        session = %binding.session_name,
        thread = %binding.thread_id,
        "Thread binding recorded"
    );
    Ok(path)
}

/// Live (non-expired) thread bindings as of `now_ms`.
pub fn load_bindings(store: &RecordStore, now_ms: i64) -> Vec<ThreadBinding> {
    store
        .get_all::<ThreadBinding>(BINDING_PREFIX)
        .into_iter()
        .map(|(_, binding)| binding)
        .filter(|b| !b.is_expired(now_ms))
        .collect()
}

/// Delete a consumed pending record after a successful relay. Failure to
/// clean up is logged, never fatal; a stale record cannot corrupt matching.
pub fn consume_pending(store: &RecordStore, path: &Path) {
    if let Err(e) = store.remove(path) {
        warn!(path = %path.display(), error = %e, "Failed to consume pending record");
    }
}
