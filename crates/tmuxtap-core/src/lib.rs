//! tmuxtap-core - route remote chat replies back into blocked tmux sessions
//!
//! A long-running terminal agent cannot wait synchronously for a remote
//! human's answer. Instead the session is "tapped": a notification hook
//! records the blocked session and publishes a summary of the on-screen
//! prompt to a chat channel; when the human replies, the reply is matched
//! back to the pending session and translated into keystrokes on its tmux
//! input line.
//!
//! Pipeline:
//! - [`notify`] writes a [`registry::PendingSession`] record and a
//!   [`registry::ThreadBinding`], then sends the channel message
//! - [`matcher`] resolves an inbound identifier to the pending session
//! - [`reply`] + [`keys`] turn the reply text into a [`keys::KeySequence`]
//! - [`tmux`] delivers the sequence over the tmux control socket

pub mod config;
pub mod error;
pub mod keys;
pub mod matcher;
pub mod notify;
pub mod registry;
pub mod relay;
pub mod reply;
pub mod store;
pub mod tmux;

pub use config::RelayConfig;
pub use error::RelayError;
pub use keys::{compile, CompiledKeys, KeyEvent, KeySequence};
pub use matcher::{extract_ids, match_identifier, MatchOutcome};
pub use registry::{PendingSession, PromptKind, ThreadBinding};
pub use relay::{run_relay, RelayRequest, RelayResult};
pub use reply::{parse_reply, ReplyIntent};
pub use store::RecordStore;
pub use tmux::{InjectOptions, RelayTarget};
