//! Callwarden host simulator.
//!
//! Usage: callwarden [--number <n>] [--foreground] [--answer] [--revive-failures <k>]
//!
//! Replays one incoming call through the pipeline the way a telephony host
//! would: ringing signal, screening hook, then answer or miss. Without
//! `--foreground` the call is delivered through background dispatch.

mod demo;

use anyhow::Context;
use callwarden::{CallDetails, CallWarden, Collaborators, TelephonySignal, WardenConfig};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{info, warn};

/// Callwarden: incoming call screening and relay.
#[derive(Parser, Debug)]
#[command(name = "callwarden")]
#[command(about = "Simulate an incoming call through the screening and relay pipeline")]
struct Args {
    /// Config file. Defaults to ~/.callwarden/config.json.
    #[arg(long, env = "CALLWARDEN_CONFIG")]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long)]
    log_level: Option<String>,

    /// Write JSONL logs to this file as well as stderr.
    #[arg(long, env = "CALLWARDEN_LOG_FILE")]
    log_file: Option<PathBuf>,

    /// Incoming caller number. Omit to simulate a withheld number.
    #[arg(long)]
    number: Option<String>,

    /// Attach a foreground runtime before the call arrives.
    #[arg(long)]
    foreground: bool,

    /// Answer the call instead of letting it ring out.
    #[arg(long)]
    answer: bool,

    /// Block every call.
    #[arg(long)]
    block: bool,

    /// Background revivals that fail before one succeeds.
    #[arg(long, default_value = "0")]
    revive_failures: u32,

    /// Override the delay between revival attempts.
    #[arg(long, env = "CALLWARDEN_RETRY_DELAY_MS")]
    retry_delay_ms: Option<u64>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let config_path = match args.config.clone() {
        Some(path) => path,
        None => WardenConfig::default_path()?,
    };
    let mut config = WardenConfig::load(&config_path)
        .with_context(|| format!("loading {}", config_path.display()))?;
    if let Some(level) = args.log_level.clone() {
        config.log_level = level;
    }
    if let Some(delay) = args.retry_delay_ms {
        config.retry_delay_ms = delay;
    }
    config.validate()?;

    observability::init_with_config(observability::LogConfig {
        service_name: "callwarden".into(),
        default_level: config.log_level.clone(),
        log_path: args.log_file.clone(),
        also_stderr: true,
    });

    info!(config = %config_path.display(), "Callwarden starting...");

    let (reports_tx, mut reports_rx) = mpsc::unbounded_channel();
    let mut collaborators = Collaborators::new(
        Arc::new(demo::LoggingNotifier),
        Arc::new(demo::ScriptedRuntime::new(args.revive_failures)),
    );
    collaborators.dispatch_sink = Arc::new(demo::ChannelSink(reports_tx));
    if args.block {
        collaborators.classifier = Some(Arc::new(demo::BlockAll));
    }

    let warden = CallWarden::start(&config, collaborators)?;
    if args.foreground {
        warden.lifecycle().on_resume(Arc::new(demo::LoggingForeground));
    }

    let number = args.number.as_deref();
    warden.on_signal(&TelephonySignal::ringing(number));

    let handle = format!("tel:{}", number.unwrap_or_default());
    let outcome = warden.screen_call(&CallDetails::from_handle(handle)).await;
    info!(
        call_id = %outcome.event.call_id(),
        block = outcome.decision.blocks(),
        source = ?outcome.source,
        elapsed_ms = outcome.elapsed.as_millis() as u64,
        "screening hook answered"
    );

    if args.answer && !outcome.decision.blocks() {
        warden.on_signal(&TelephonySignal::offhook());
    }
    warden.on_signal(&TelephonySignal::idle());

    if !args.foreground {
        let wait = config.dispatch_timeout() + Duration::from_secs(1);
        match tokio::time::timeout(wait, reports_rx.recv()).await {
            Ok(Some(report)) => info!(
                task_id = %report.task_id,
                outcome = ?report.outcome,
                attempts = report.attempts,
                "background dispatch finished"
            ),
            Ok(None) | Err(_) => warn!("no background dispatch report received"),
        }
    }

    warden.lifecycle().on_destroy();
    warden.shutdown().await;
    info!("Callwarden stopped");
    Ok(())
}
