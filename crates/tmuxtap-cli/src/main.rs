//! tmuxtap - route remote chat replies back into blocked tmux sessions
//!
//! Subcommands:
//!   send    relay a reply into a session's input line
//!   check   resolve a channel/thread identifier to a pending session
//!   list    show pending relays and live thread bindings
//!   notify  Notification-hook entry, reads the event JSON from stdin
//!
//! Every invocation emits exactly one JSON result line on stdout; logs go
//! to stderr so calling automation can branch without parsing free text.
//! Exit code is 0 on `ok:true` / `matched:true`, 1 otherwise.

use std::io::{IsTerminal, Read};
use std::path::PathBuf;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use tracing::{debug, warn};

use tmuxtap_core::matcher::match_identifier;
use tmuxtap_core::notify::{run_notify, ChatTransport, MessengerCli, NotifyEvent};
use tmuxtap_core::registry::{consume_pending, load_bindings, load_pending};
use tmuxtap_core::relay::run_relay;
use tmuxtap_core::{RelayConfig, RelayRequest};

#[derive(Debug, Parser)]
#[command(name = "tmuxtap")]
#[command(about = "Relay remote chat replies into blocked tmux sessions")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Relay a reply into a session's input line
    Send(SendArgs),
    /// Resolve a channel/thread identifier to a pending session
    Check(CheckArgs),
    /// List pending relays and live thread bindings
    List,
    /// Notification-hook entry; reads the event JSON from stdin
    Notify,
}

#[derive(Debug, Args)]
struct SendArgs {
    /// tmux session name
    #[arg(long)]
    session: Option<String>,

    /// The human's reply: a 1-based option number or free text
    #[arg(long)]
    reply: Option<String>,

    /// Comma-separated option labels, for validation and echo
    #[arg(long, value_delimiter = ',')]
    options: Option<Vec<String>>,

    /// tmux control socket path (default: ambient server or config)
    #[arg(long)]
    socket: Option<PathBuf>,

    /// Pane address "window.pane"
    #[arg(long)]
    pane: Option<String>,

    /// Pause between menu keystrokes, in milliseconds
    #[arg(long)]
    delay_ms: Option<u64>,

    /// Report what would be sent without contacting tmux
    #[arg(long)]
    dry_run: bool,

    /// Pending-record file to delete after a successful relay
    #[arg(long)]
    consume: Option<PathBuf>,
}

#[derive(Debug, Args)]
struct CheckArgs {
    /// Raw identifier from the inbound reply event, e.g.
    /// "channel:1476953824911425617:thread:1477207778727563457"
    identifier: String,
}

fn log_filter() -> tracing_subscriber::EnvFilter {
    let level = if let Ok(v) = std::env::var("RUST_LOG") {
        v
    } else if let Ok(v) = std::env::var("TMUXTAP_LOG_LEVEL") {
        match v.as_str() {
            "silent" => "off".to_string(),
            "fatal" => "error".to_string(),
            other => other.to_string(),
        }
    } else {
        "warn".to_string()
    };

    tracing_subscriber::EnvFilter::try_new(level)
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"))
}

/// A piped stdin may carry a full JSON request object or a raw reply
/// string; an attached terminal carries nothing.
fn request_from_stdin() -> Option<RelayRequest> {
    let stdin = std::io::stdin();
    if stdin.is_terminal() {
        return None;
    }
    let mut raw = String::new();
    stdin.lock().read_to_string(&mut raw).ok()?;
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    if raw.starts_with('{') {
        match serde_json::from_str::<RelayRequest>(raw) {
            Ok(request) => return Some(request),
            Err(e) => debug!(error = %e, "Stdin is not a request object, treating as raw reply"),
        }
    }
    Some(RelayRequest {
        reply: Some(raw.to_string()),
        ..RelayRequest::default()
    })
}

async fn cmd_send(args: SendArgs, config: &RelayConfig) -> Result<i32> {
    let mut request = request_from_stdin().unwrap_or_default();

    // CLI flags override stdin values
    if args.session.is_some() {
        request.session = args.session;
    }
    if args.reply.is_some() {
        request.reply = args.reply;
    }
    if args.options.is_some() {
        request.options = args.options;
    }
    if args.socket.is_some() {
        request.socket = args.socket;
    }
    if args.pane.is_some() {
        request.pane = args.pane;
    }
    if args.delay_ms.is_some() {
        request.delay_ms = args.delay_ms;
    }
    if args.dry_run {
        request.dry_run = true;
    }

    let result = run_relay(&request, config).await;

    if result.ok && !result.dry_run {
        if let Some(path) = &args.consume {
            consume_pending(&config.store(), path);
        }
    }

    println!("{}", serde_json::to_string(&result)?);
    if result.ok {
        Ok(0)
    } else {
        if let Some(error) = &result.error {
            eprintln!("{error}");
        }
        Ok(1)
    }
}

fn cmd_check(args: &CheckArgs, config: &RelayConfig) -> Result<i32> {
    let store = config.store();
    let pending = load_pending(&store);
    let bindings = load_bindings(&store, chrono::Utc::now().timestamp_millis());

    let outcome = match_identifier(&args.identifier, &pending, &bindings);
    println!("{}", serde_json::to_string(&outcome.to_json())?);
    Ok(if outcome.matched() { 0 } else { 1 })
}

fn cmd_list(config: &RelayConfig) -> Result<i32> {
    let store = config.store();
    let now = chrono::Utc::now().timestamp_millis();

    let pending: Vec<serde_json::Value> = load_pending(&store)
        .iter()
        .map(|(path, record)| {
            serde_json::json!({
                "session": record.session,
                "promptKind": record.prompt_kind,
                "age": format!("{}s ago", (now - record.created_at).max(0) / 1000),
                "stateFile": path.to_string_lossy(),
            })
        })
        .collect();
    let bindings = load_bindings(&store, now);

    let out = serde_json::json!({
        "pendingRelays": pending,
        "threadBindings": bindings,
    });
    println!("{}", serde_json::to_string(&out)?);
    Ok(0)
}

async fn cmd_notify(config: &RelayConfig) -> Result<i32> {
    let mut raw = String::new();
    if let Err(e) = std::io::stdin().lock().read_to_string(&mut raw) {
        warn!(error = %e, "Failed to read hook stdin");
        return Ok(0);
    }
    let raw = raw.trim();
    if raw.is_empty() {
        warn!("Hook stdin empty");
        return Ok(0);
    }

    let event: NotifyEvent = match serde_json::from_str(raw) {
        Ok(event) => event,
        Err(e) => {
            warn!(error = %e, "Hook stdin is not valid event JSON");
            return Ok(0);
        }
    };

    let transport = config.messenger_bin.as_ref().map(MessengerCli::new);
    let transport_ref = transport.as_ref().map(|t| t as &dyn ChatTransport);

    let result = run_notify(&event, config, &config.store(), transport_ref).await;
    println!("{}", serde_json::to_string(&result)?);

    // Hook semantics: never fail the host application
    Ok(0)
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(log_filter())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = RelayConfig::load();

    let code = match cli.command {
        Commands::Send(args) => cmd_send(args, &config).await?,
        Commands::Check(args) => cmd_check(&args, &config)?,
        Commands::List => cmd_list(&config)?,
        Commands::Notify => cmd_notify(&config).await?,
    };
    std::process::exit(code);
}
