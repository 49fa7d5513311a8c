//! Relay configuration
//!
//! Loaded from `~/.tmuxtap/config.yaml` (override via `TMUXTAP_CONFIG`).
//! A missing or unparseable file falls back to defaults with a logged
//! error; configuration trouble never takes the relay down.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::store::RecordStore;

/// Default pause between menu keystrokes, in milliseconds
pub const DEFAULT_DELAY_MS: u64 = 200;

/// How many pane lines the notifier captures for context
pub const DEFAULT_CAPTURE_LINES: u32 = 20;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RelayConfig {
    /// tmux control socket path; `None` drives the ambient default server
    pub socket: Option<PathBuf>,
    /// Default pane address, `"<window>.<pane>"`
    pub pane: String,
    /// Pause between menu keystrokes (ms)
    pub delay_ms: u64,
    /// Scratch directory holding the registries
    pub state_dir: PathBuf,
    /// Remote chat channel id notifications go to
    pub channel: Option<String>,
    /// Messenger CLI binary used as the chat transport
    pub messenger_bin: Option<PathBuf>,
    /// Pane lines captured for the notification summary
    pub capture_lines: u32,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            socket: None,
            pane: "0.0".to_string(),
            delay_ms: DEFAULT_DELAY_MS,
            state_dir: default_state_dir(),
            channel: None,
            messenger_bin: None,
            capture_lines: DEFAULT_CAPTURE_LINES,
        }
    }
}

fn default_state_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("TMUXTAP_STATE_DIR") {
        return PathBuf::from(dir);
    }
    std::env::temp_dir()
}

/// Resolve the config file location.
pub fn config_path() -> PathBuf {
    if let Ok(path) = std::env::var("TMUXTAP_CONFIG") {
        return PathBuf::from(path);
    }
    dirs::home_dir()
        .map(|h| h.join(".tmuxtap").join("config.yaml"))
        .unwrap_or_else(|| PathBuf::from(".tmuxtap/config.yaml"))
}

impl RelayConfig {
    /// Load the configuration, falling back to defaults on any problem.
    pub fn load() -> Self {
        Self::load_from(&config_path())
    }

    pub fn load_from(path: &Path) -> Self {
        if !path.exists() {
            return Self::default();
        }
        match std::fs::read_to_string(path) {
            Ok(content) => match serde_yaml::from_str(&content) {
                Ok(config) => {
                    info!(path = ?path, "Config loaded");
                    config
                }
                Err(e) => {
                    error!(error = %e, path = ?path, "Failed to parse config, using defaults");
                    Self::default()
                }
            },
            Err(e) => {
                error!(error = %e, path = ?path, "Failed to read config, using defaults");
                Self::default()
            }
        }
    }

    /// The record store backing both registries.
    pub fn store(&self) -> RecordStore {
        RecordStore::new(&self.state_dir)
    }
}
