//! # Observability
//!
//! Shared logging setup for callwarden services.
//!
//! Services call [`init`] or [`init_with_config`] once at startup and use the
//! standard `tracing` macros everywhere else. Where the logs end up (a JSONL
//! file, stderr, or both) is decided here and nowhere else.
//!
//! ## Output modes
//!
//! - With [`LogConfig::log_path`] set, every event is appended to that file as
//!   one JSON object per line. `tail -f <path> | jq` is the intended way to
//!   read it.
//! - Without a log path, a compact human-readable format goes to stderr.
//!
//! `RUST_LOG` always wins over [`LogConfig::default_level`].
//!
//! ## Usage
//!
//! ```rust,ignore
//! observability::init_with_config(observability::LogConfig {
//!     service_name: "callwarden".into(),
//!     default_level: "debug".into(),
//!     log_path: Some(observability::default_log_path()),
//!     also_stderr: true,
//! });
//! tracing::info!("ready");
//! ```

mod json_layer;
mod writer;

use std::path::PathBuf;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

pub use json_layer::{JsonLayer, LogEntry};
pub use writer::{AppendLogWriter, AppendWriterFactory};

/// Configuration for the logging system.
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Name of the service, included in every JSON log line.
    pub service_name: String,

    /// Default filter (e.g. "debug", "info", "callwarden=trace").
    /// Overridden by `RUST_LOG`.
    pub default_level: String,

    /// JSONL output file. `None` means stderr only.
    pub log_path: Option<PathBuf>,

    /// Also emit compact logs to stderr when writing to a file.
    pub also_stderr: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            service_name: "unknown".into(),
            default_level: "info".into(),
            log_path: None,
            also_stderr: false,
        }
    }
}

/// Default JSONL location: `~/.callwarden/logs/dev.jsonl`.
///
/// Falls back to the current directory when no home directory is known.
pub fn default_log_path() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".callwarden")
        .join("logs")
        .join("dev.jsonl")
}

/// Initialize logging with defaults for the given service.
pub fn init(service_name: &str) {
    init_with_config(LogConfig {
        service_name: service_name.into(),
        ..Default::default()
    });
}

/// Initialize logging with a custom configuration.
///
/// Calling this more than once is harmless: later calls leave the first
/// subscriber in place.
pub fn init_with_config(config: LogConfig) {
    let filter = || {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.default_level))
    };

    let Some(log_path) = config.log_path.clone() else {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter())
            .with_target(true)
            .with_writer(std::io::stderr)
            .compact()
            .try_init();
        return;
    };

    let writer = match AppendLogWriter::new(&log_path) {
        Ok(writer) => writer,
        Err(e) => {
            // Could not open the file; keep the service observable on stderr.
            let _ = tracing_subscriber::fmt()
                .with_env_filter(filter())
                .with_writer(std::io::stderr)
                .compact()
                .try_init();
            tracing::warn!(
                log_path = %log_path.display(),
                error = %e,
                "failed to open log file, logging to stderr"
            );
            return;
        }
    };

    let json_layer = JsonLayer::new(config.service_name.clone(), AppendWriterFactory::new(writer));

    let stderr_layer = config.also_stderr.then(|| {
        tracing_subscriber::fmt::layer()
            .with_target(true)
            .with_file(false)
            .with_line_number(false)
            .compact()
            .with_writer(std::io::stderr)
            .with_filter(filter())
    });

    let installed = tracing_subscriber::registry()
        .with(json_layer.with_filter(filter()))
        .with(stderr_layer)
        .try_init()
        .is_ok();

    if installed {
        tracing::info!(
            service = %config.service_name,
            log_path = %log_path.display(),
            "observability initialized"
        );
    }
}

pub use tracing::{debug, error, info, instrument, trace, warn, Level};
