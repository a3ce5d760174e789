//! Logging initialization and configuration
//!
//! Workflow code only emits `tracing` events. Where those events end up
//! (terminal or a log file) and how they are rendered is decided here, once,
//! by the binary.

use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::Mutex;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Log output format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable format with colors (default)
    #[default]
    Pretty,
    /// JSON format for structured logging (better for log aggregation)
    Json,
    /// Compact format (less verbose than pretty)
    Compact,
}

impl LogFormat {
    /// Parse from string (case-insensitive)
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "pretty" => Some(Self::Pretty),
            "json" => Some(Self::Json),
            "compact" => Some(Self::Compact),
            _ => None,
        }
    }
}

impl std::str::FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| format!("unknown log format: {}", s))
    }
}

/// Where log lines are written
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum LogSink {
    /// Standard error of the running process
    #[default]
    Stderr,
    /// Append to a file (created if missing)
    File(PathBuf),
}

/// Initialize the logging system
///
/// The log level can be controlled via the `RUST_LOG` environment variable.
///
/// # Arguments
///
/// * `service_name` - Name of the service for log identification
/// * `format` - Output format (pretty, json, or compact)
/// * `sink` - Destination for log lines
///
/// # Environment Variables
///
/// * `RUST_LOG` - Controls log level (e.g., `info`, `debug`, `portal_client=debug,info`)
pub fn init_logging(service_name: &str, format: LogFormat, sink: LogSink) -> anyhow::Result<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    match &sink {
        LogSink::Stderr => {
            let layer = fmt::layer().with_writer(std::io::stderr);
            match format {
                LogFormat::Pretty => tracing_subscriber::registry()
                    .with(env_filter)
                    .with(
                        layer
                            .with_target(true)
                            .with_file(true)
                            .with_line_number(true)
                            .with_ansi(true),
                    )
                    .try_init()?,
                LogFormat::Json => tracing_subscriber::registry()
                    .with(env_filter)
                    .with(layer.json())
                    .try_init()?,
                LogFormat::Compact => tracing_subscriber::registry()
                    .with(env_filter)
                    .with(layer.compact())
                    .try_init()?,
            }
        }
        LogSink::File(path) => {
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            let layer = fmt::layer().with_writer(Mutex::new(file)).with_ansi(false);
            match format {
                LogFormat::Pretty => tracing_subscriber::registry()
                    .with(env_filter)
                    .with(layer.with_target(true))
                    .try_init()?,
                LogFormat::Json => tracing_subscriber::registry()
                    .with(env_filter)
                    .with(layer.json())
                    .try_init()?,
                LogFormat::Compact => tracing_subscriber::registry()
                    .with(env_filter)
                    .with(layer.compact())
                    .try_init()?,
            }
        }
    }

    tracing::info!(
        service = service_name,
        format = ?format,
        sink = ?sink,
        "Logging initialized"
    );

    Ok(())
}
