//! Prometheus metrics infrastructure
//!
//! Counters are recorded through the `metrics` facade and are no-ops until
//! an exporter is installed with [`init_metrics`].

use anyhow::Context;
use metrics::{counter, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::Duration;

static EXPORTER: OnceLock<MetricsExporter> = OnceLock::new();

/// Install the Prometheus recorder for this run
///
/// No HTTP listener is started. The exposition is written to `textfile` by
/// [`flush_metrics`] before the process exits, in the format read by the
/// node_exporter textfile collector.
pub fn init_metrics(textfile: impl Into<PathBuf>) -> anyhow::Result<()> {
    let handle = PrometheusBuilder::new()
        .install_recorder()
        .context("Failed to install Prometheus recorder")?;

    let exporter = MetricsExporter {
        handle,
        textfile: textfile.into(),
    };
    tracing::debug!(textfile = ?exporter.textfile, "Metrics recorder installed");
    EXPORTER
        .set(exporter)
        .map_err(|_| anyhow::anyhow!("Metrics already initialized"))?;
    Ok(())
}

/// Write the current metrics to the configured textfile
///
/// Does nothing when [`init_metrics`] was never called.
pub fn flush_metrics() -> anyhow::Result<()> {
    match EXPORTER.get() {
        Some(exporter) => exporter.flush(),
        None => Ok(()),
    }
}

/// Renders recorded metrics into a Prometheus textfile
pub struct MetricsExporter {
    handle: PrometheusHandle,
    textfile: PathBuf,
}

impl MetricsExporter {
    pub fn new(handle: PrometheusHandle, textfile: impl Into<PathBuf>) -> Self {
        Self {
            handle,
            textfile: textfile.into(),
        }
    }

    pub fn flush(&self) -> anyhow::Result<()> {
        write_textfile(&self.textfile, &self.handle.render())?;
        tracing::debug!(textfile = ?self.textfile, "Metrics written");
        Ok(())
    }
}

/// Collectors may read at any time, so write beside the target and rename
fn write_textfile(path: &Path, contents: &str) -> anyhow::Result<()> {
    let tmp = path.with_extension("prom.tmp");
    std::fs::write(&tmp, contents)
        .with_context(|| format!("Failed to write metrics to {:?}", tmp))?;
    std::fs::rename(&tmp, path)
        .with_context(|| format!("Failed to move metrics into {:?}", path))?;
    Ok(())
}

/// Metrics for calls made against the portal REST API
///
/// # Metrics
///
/// * `portal_requests_total{method,status}` - Requests issued, by verb and HTTP status
///   (`status="error"` when no response was received)
/// * `portal_request_duration_seconds{method}` - Request latency
/// * `instance_mutations_total{outcome}` - Instance updates, `outcome` is `applied` or `failed`
#[derive(Debug, Clone)]
pub struct PortalMetrics {
    account: String,
}

impl PortalMetrics {
    /// Create metrics labelled with the portal account
    pub fn new(account: &str) -> Self {
        Self {
            account: account.to_string(),
        }
    }

    /// Record a completed request. `status` is `None` when the request failed
    /// before a response arrived.
    pub fn record_request(&self, method: &str, status: Option<u16>, duration: Duration) {
        let status = status.map(|s| s.to_string()).unwrap_or_else(|| "error".to_string());
        counter!(
            "portal_requests_total",
            "account" => self.account.clone(),
            "method" => method.to_string(),
            "status" => status
        )
        .increment(1);
        histogram!(
            "portal_request_duration_seconds",
            "account" => self.account.clone(),
            "method" => method.to_string()
        )
        .record(duration.as_secs_f64());
    }

    /// Record the outcome of one instance update
    pub fn record_mutation(&self, applied: bool) {
        let outcome = if applied { "applied" } else { "failed" };
        counter!(
            "instance_mutations_total",
            "account" => self.account.clone(),
            "outcome" => outcome
        )
        .increment(1);
    }

    pub fn account(&self) -> &str {
        &self.account
    }
}
