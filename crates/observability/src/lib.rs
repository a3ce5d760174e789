//! Observability infrastructure for lmctl
//!
//! This crate provides:
//! - Structured logging via tracing, with the output sink chosen once at startup
//! - Prometheus counters for portal requests and instance updates, written to
//!   a textfile at exit
//!
//! # Quick Start
//!
//! ```ignore
//! use observability::{init_logging, LogFormat, LogSink};
//!
//! init_logging("lmctl", LogFormat::Pretty, LogSink::Stderr)?;
//!
//! // Optional, flushed with `flush_metrics` before exit
//! observability::init_metrics("/var/lib/node_exporter/lmctl.prom")?;
//! ```

pub mod logging;
pub mod metrics;

pub use logging::{init_logging, LogFormat, LogSink};
pub use metrics::{flush_metrics, init_metrics, MetricsExporter, PortalMetrics};
