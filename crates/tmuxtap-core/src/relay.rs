//! Relay orchestration
//!
//! Composes parse, compile, and inject into the one externally observed
//! contract: a single stable result object. Every expected failure ends up
//! as `{ok: false, error: ...}`; nothing here panics or propagates.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::RelayConfig;
use crate::error::RelayError;
use crate::keys::compile;
use crate::reply::{parse_reply, ReplyIntent};
use crate::tmux::{inject, InjectOptions, RelayTarget};

/// A relay request, assembled from CLI flags and/or a piped JSON object
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RelayRequest {
    pub reply: Option<String>,
    pub session: Option<String>,
    pub options: Option<Vec<String>>,
    pub socket: Option<PathBuf>,
    pub pane: Option<String>,
    pub delay_ms: Option<u64>,
    pub dry_run: bool,
}

/// How the reply was interpreted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RelayMode {
    Option,
    Text,
}

/// The stable result object of a relay operation
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RelayResult {
    pub ok: bool,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub dry_run: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pane: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mode: Option<RelayMode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub keys_sent: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub option_index: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub option_text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl RelayResult {
    fn failure(err: &RelayError, session: Option<&str>) -> Self {
        Self {
            ok: false,
            dry_run: false,
            session: session.map(str::to_string),
            pane: None,
            mode: None,
            keys_sent: None,
            option_index: None,
            option_text: None,
            text: None,
            error: Some(err.to_string()),
        }
    }
}

/// Run one relay operation end to end.
pub async fn run_relay(request: &RelayRequest, config: &RelayConfig) -> RelayResult {
    let session = match request.session.as_deref() {
        Some(s) if !s.is_empty() => s,
        _ => return RelayResult::failure(&RelayError::MissingSession, None),
    };
    let reply = match request.reply.as_deref() {
        Some(r) if !r.trim().is_empty() => r,
        _ => return RelayResult::failure(&RelayError::MissingReply, Some(session)),
    };

    let intent = parse_reply(reply);
    let compiled = match compile(&intent, request.options.as_deref()) {
        Ok(compiled) => compiled,
        Err(e) => return RelayResult::failure(&e, Some(session)),
    };

    let target = RelayTarget {
        session: session.to_string(),
        socket: request.socket.clone().or_else(|| config.socket.clone()),
        pane: request.pane.clone().unwrap_or_else(|| config.pane.clone()),
    };
    let options = InjectOptions {
        inter_key_delay: Duration::from_millis(request.delay_ms.unwrap_or(config.delay_ms)),
        dry_run: request.dry_run,
    };

    if let Err(e) = inject(&target, &compiled.sequence, &options).await {
        return RelayResult::failure(&e, Some(session));
    }

    let keys_sent: Vec<String> = compiled
        .sequence
        .iter()
        .map(|k| k.display_name().to_string())
        .collect();

    info!(
        session = %target.session,
        dry_run = options.dry_run,
        keys = keys_sent.len(),
        "Reply relayed"
    );

    let mut result = RelayResult {
        ok: true,
        dry_run: request.dry_run,
        session: Some(target.session.clone()),
        pane: Some(target.pane_target()),
        mode: None,
        keys_sent: Some(keys_sent),
        option_index: None,
        option_text: None,
        text: None,
        error: None,
    };
    match &intent {
        ReplyIntent::Option { index } => {
            result.mode = Some(RelayMode::Option);
            result.option_index = Some(*index);
            result.option_text = compiled.option_text;
        }
        ReplyIntent::Text { content } => {
            result.mode = Some(RelayMode::Text);
            result.text = Some(content.clone());
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(reply: &str, options: Option<&[&str]>) -> RelayRequest {
        RelayRequest {
            reply: Some(reply.to_string()),
            session: Some("claude-nomads".to_string()),
            options: options.map(|o| o.iter().map(|s| s.to_string()).collect()),
            socket: None,
            pane: None,
            delay_ms: Some(0),
            dry_run: true,
        }
    }

    #[tokio::test]
    async fn test_dry_run_option_scenario() {
        let req = request("2", Some(&["Trust and proceed", "Abort", "Show diff"]));
        let result = run_relay(&req, &RelayConfig::default()).await;

        assert!(result.ok);
        assert_eq!(result.mode, Some(RelayMode::Option));
        assert_eq!(result.option_index, Some(1));
        assert_eq!(result.option_text.as_deref(), Some("Abort"));
        assert_eq!(
            result.keys_sent.as_deref(),
            Some(&["Down".to_string(), "Enter".to_string()][..])
        );
        assert_eq!(result.pane.as_deref(), Some("claude-nomads:0.0"));
    }

    #[tokio::test]
    async fn test_dry_run_text_scenario() {
        let req = request("fix the imports", None);
        let result = run_relay(&req, &RelayConfig::default()).await;

        assert!(result.ok);
        assert_eq!(result.mode, Some(RelayMode::Text));
        assert_eq!(result.text.as_deref(), Some("fix the imports"));
        assert_eq!(
            result.keys_sent.as_deref(),
            Some(
                &[
                    "ClearLine".to_string(),
                    "fix the imports".to_string(),
                    "Enter".to_string()
                ][..]
            )
        );
    }

    #[tokio::test]
    async fn test_out_of_range_scenario() {
        let req = request("5", Some(&["A", "B", "C"]));
        let result = run_relay(&req, &RelayConfig::default()).await;

        assert!(!result.ok);
        assert!(result.error.as_deref().unwrap().contains("out of range"));
        assert_eq!(result.session.as_deref(), Some("claude-nomads"));
    }

    #[tokio::test]
    async fn test_missing_session() {
        let mut req = request("2", None);
        req.session = None;
        let result = run_relay(&req, &RelayConfig::default()).await;

        assert!(!result.ok);
        assert_eq!(result.error.as_deref(), Some("session is required"));
    }

    #[tokio::test]
    async fn test_missing_reply() {
        let mut req = request("", None);
        req.reply = Some("   ".to_string());
        let result = run_relay(&req, &RelayConfig::default()).await;

        assert!(!result.ok);
        assert_eq!(result.error.as_deref(), Some("reply is required"));
        assert_eq!(result.session.as_deref(), Some("claude-nomads"));
    }

    #[test]
    fn test_result_wire_shape() {
        let result = RelayResult {
            ok: true,
            dry_run: true,
            session: Some("claude-nomads".to_string()),
            pane: Some("claude-nomads:0.0".to_string()),
            mode: Some(RelayMode::Option),
            keys_sent: Some(vec!["Down".to_string(), "Enter".to_string()]),
            option_index: Some(1),
            option_text: Some("Abort".to_string()),
            text: None,
            error: None,
        };
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["ok"], true);
        assert_eq!(json["dryRun"], true);
        assert_eq!(json["mode"], "option");
        assert_eq!(json["optionIndex"], 1);
        assert_eq!(json["optionText"], "Abort");
        assert_eq!(json["keysSent"], serde_json::json!(["Down", "Enter"]));
        // Absent fields must not appear at all
        assert!(json.get("text").is_none());
        assert!(json.get("error").is_none());
    }

    #[test]
    fn test_request_accepts_original_json_shape() {
        let raw = r#"{"reply":"2","session":"claude-nomads","options":["A","B"],"delayMs":50,"dryRun":true,"pane":"1.0"}"#;
        let req: RelayRequest = serde_json::from_str(raw).unwrap();
        assert_eq!(req.reply.as_deref(), Some("2"));
        assert_eq!(req.delay_ms, Some(50));
        assert!(req.dry_run);
        assert_eq!(req.pane.as_deref(), Some("1.0"));
    }
}
