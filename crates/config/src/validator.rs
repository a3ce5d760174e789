use crate::*;
use common::is_valid_account;
use thiserror::Error;
use url::Url;

/// Longest per-request timeout accepted without a warning
const TIMEOUT_WARNING_SECONDS: u64 = 300;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("portal.account is required")]
    MissingAccount,

    #[error("portal.account '{0}' is not a valid subdomain (letters, digits and inner hyphens)")]
    InvalidAccount(String),

    #[error("portal.access_id is required")]
    MissingAccessId,

    #[error("portal.access_key is required")]
    MissingAccessKey,

    #[error("Environment variable placeholder in '{field}' was not resolved")]
    UnresolvedPlaceholder { field: String },

    #[error("portal.base_url '{url}' is invalid: {message}")]
    InvalidBaseUrl { url: String, message: String },

    #[error("portal.api_version must be a positive integer")]
    InvalidApiVersion,

    #[error("client.batch_size must be between 1 and 1000, got {0}")]
    InvalidBatchSize(u64),

    #[error("client.timeout_seconds must be a positive integer")]
    InvalidTimeout,

    #[error("Invalid logging.format: {0}. Must be one of: pretty, json, compact")]
    InvalidLogFormat(String),

    #[error("metrics.textfile must name a file")]
    InvalidMetricsTextfile,
}

#[derive(Debug, Clone)]
pub struct ValidationWarning {
    pub field: String,
    pub message: String,
}

#[derive(Debug, Clone)]
pub struct DefaultApplied {
    pub field: String,
    pub value: String,
}

#[derive(Debug, Clone)]
pub struct ValidationReport {
    pub errors: Vec<ValidationError>,
    pub warnings: Vec<ValidationWarning>,
    pub defaults_applied: Vec<DefaultApplied>,
}

impl ValidationReport {
    pub fn new() -> Self {
        Self {
            errors: Vec::new(),
            warnings: Vec::new(),
            defaults_applied: Vec::new(),
        }
    }

    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn add_error(&mut self, error: ValidationError) {
        self.errors.push(error);
    }

    pub fn add_warning(&mut self, field: &str, message: &str) {
        self.warnings.push(ValidationWarning {
            field: field.to_string(),
            message: message.to_string(),
        });
    }

    pub fn add_default(&mut self, field: &str, value: &str) {
        self.defaults_applied.push(DefaultApplied {
            field: field.to_string(),
            value: value.to_string(),
        });
    }
}

impl Default for ValidationReport {
    fn default() -> Self {
        Self::new()
    }
}

pub fn validate_config(config: &LmctlConfig) -> ValidationReport {
    let mut report = ValidationReport::new();

    validate_portal(&config.portal, &mut report);
    validate_client(&config.client, &mut report);
    validate_logging(&config.logging, &mut report);

    match &config.metrics {
        Some(metrics) if metrics.textfile.file_name().is_none() => {
            report.add_error(ValidationError::InvalidMetricsTextfile)
        }
        Some(_) => {}
        None => report.add_default("metrics", "disabled"),
    }

    report
}

fn validate_portal(portal: &PortalConfig, report: &mut ValidationReport) {
    if has_unresolved_env_vars(&portal.account) {
        report.add_error(ValidationError::UnresolvedPlaceholder {
            field: "portal.account".to_string(),
        });
    } else if portal.account.is_empty() {
        report.add_error(ValidationError::MissingAccount);
    } else if !is_valid_account(&portal.account) {
        report.add_error(ValidationError::InvalidAccount(portal.account.clone()));
    }

    if has_unresolved_env_vars(&portal.access_id) {
        report.add_error(ValidationError::UnresolvedPlaceholder {
            field: "portal.access_id".to_string(),
        });
    } else if portal.access_id.trim().is_empty() {
        report.add_error(ValidationError::MissingAccessId);
    }

    let key_unresolved = portal
        .access_key
        .expose(|key| std::str::from_utf8(key).map(has_unresolved_env_vars).unwrap_or(false));
    if key_unresolved {
        report.add_error(ValidationError::UnresolvedPlaceholder {
            field: "portal.access_key".to_string(),
        });
    } else if portal.access_key.is_empty() {
        report.add_error(ValidationError::MissingAccessKey);
    }

    if portal.api_version == 0 {
        report.add_error(ValidationError::InvalidApiVersion);
    }

    match &portal.base_url {
        Some(raw) => match Url::parse(raw) {
            Ok(url) => {
                if url.scheme() != "https" {
                    report.add_warning(
                        "portal.base_url",
                        "base_url is not HTTPS; request signatures and credentials travel in clear text",
                    );
                }
            }
            Err(e) => report.add_error(ValidationError::InvalidBaseUrl {
                url: raw.clone(),
                message: e.to_string(),
            }),
        },
        None => report.add_default("portal.base_url", &portal.rest_base_url()),
    }
}

fn validate_client(client: &ClientConfig, report: &mut ValidationReport) {
    if client.batch_size == 0 || client.batch_size > 1000 {
        report.add_error(ValidationError::InvalidBatchSize(client.batch_size));
    }

    if client.timeout_seconds == 0 {
        report.add_error(ValidationError::InvalidTimeout);
    } else if client.timeout_seconds > TIMEOUT_WARNING_SECONDS {
        report.add_warning(
            "client.timeout_seconds",
            "A hung instance update blocks the rest of the batch for this long",
        );
    }
}

fn validate_logging(logging: &LoggingConfig, report: &mut ValidationReport) {
    let valid_formats = ["pretty", "json", "compact"];
    if !valid_formats.contains(&logging.format.to_lowercase().as_str()) {
        report.add_error(ValidationError::InvalidLogFormat(logging.format.clone()));
    }

    if logging.file.is_none() {
        report.add_default("logging.file", "stderr");
    }
}
