use common::{Credentials, SecretKey};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

pub mod defaults;
pub mod parser;
pub mod substitution;
pub mod validator;

pub use defaults::*;
pub use parser::*;
pub use substitution::*;
pub use validator::*;

/// Default config file looked up in the working directory
pub const DEFAULT_CONFIG_FILE: &str = "lmctl.yaml";

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct LmctlConfig {
    #[serde(default)]
    pub portal: PortalConfig,
    #[serde(default)]
    pub client: ClientConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metrics: Option<MetricsConfig>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PortalConfig {
    /// Portal account, used as the subdomain
    #[serde(default)]
    pub account: String,
    #[serde(default)]
    pub access_id: String,
    #[serde(
        default = "default_access_key",
        serialize_with = "serialize_access_key"
    )]
    pub access_key: SecretKey,
    #[serde(default = "default_domain")]
    pub domain: String,
    /// Full REST root, overrides `account` + `domain`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    #[serde(default = "default_api_version")]
    pub api_version: u32,
}

impl Default for PortalConfig {
    fn default() -> Self {
        Self {
            account: String::new(),
            access_id: String::new(),
            access_key: default_access_key(),
            domain: default_domain(),
            base_url: None,
            api_version: default_api_version(),
        }
    }
}

impl PortalConfig {
    pub fn credentials(&self) -> Credentials {
        Credentials::new(self.access_id.clone(), self.access_key.clone(), self.account.clone())
    }

    /// REST root for this portal
    pub fn rest_base_url(&self) -> String {
        match &self.base_url {
            Some(url) => url.clone(),
            None => format!("https://{}.{}/santaba/rest", self.account, self.domain),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ClientConfig {
    /// Page size for paginated listings (1..=1000)
    #[serde(default = "default_batch_size")]
    pub batch_size: u64,
    /// Upper bound for each HTTP request
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            timeout_seconds: default_timeout_seconds(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// pretty, json or compact
    #[serde(default = "default_log_format")]
    pub format: String,
    /// Append logs to this file instead of stderr
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            format: default_log_format(),
            file: None,
        }
    }
}

/// Prometheus textfile written when a run exits
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MetricsConfig {
    #[serde(default = "default_metrics_textfile")]
    pub textfile: PathBuf,
}

/// Values taken from CLI flags or the environment, applied over the file
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub account: Option<String>,
    pub access_id: Option<String>,
    pub access_key: Option<SecretKey>,
    pub batch_size: Option<u64>,
    pub base_url: Option<String>,
}

impl LmctlConfig {
    /// Apply overrides; `None` leaves the file value in place
    pub fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(account) = overrides.account {
            self.portal.account = account;
        }
        if let Some(access_id) = overrides.access_id {
            self.portal.access_id = access_id;
        }
        if let Some(access_key) = overrides.access_key {
            self.portal.access_key = access_key;
        }
        if let Some(batch_size) = overrides.batch_size {
            self.client.batch_size = batch_size;
        }
        if let Some(base_url) = overrides.base_url {
            self.portal.base_url = Some(base_url);
        }
    }
}
