//! Signed HTTP transport for the portal REST API
//!
//! Every request is signed independently with a fresh timestamp. GET requests
//! sign an empty body; PATCH requests sign the exact bytes that are sent.

use crate::signer::RequestSigner;
use common::{Credentials, Error, Result};
use observability::PortalMetrics;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Client, Method};
use serde_json::Value;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Default REST API version, sent as `X-Version`
pub const DEFAULT_API_VERSION: u32 = 3;

/// Default per-request timeout
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Default portal domain; the account name is its subdomain
pub const DEFAULT_DOMAIN: &str = "logicmonitor.com";

/// REST root for an account
pub fn account_base_url(account: &str, domain: &str) -> String {
    format!("https://{}.{}/santaba/rest", account, domain)
}

/// Resource paths used by the instance workflow
pub mod paths {
    pub fn applied_modules(device_id: u64) -> String {
        format!("/device/devices/{}/devicedatasources", device_id)
    }

    pub fn instances(device_id: u64, module_id: u64) -> String {
        format!(
            "/device/devices/{}/devicedatasources/{}/instances",
            device_id, module_id
        )
    }

    pub fn instance(device_id: u64, module_id: u64, instance_id: u64) -> String {
        format!(
            "/device/devices/{}/devicedatasources/{}/instances/{}",
            device_id, module_id, instance_id
        )
    }
}

/// Connection settings for [`HttpPortalClient`]
#[derive(Debug, Clone)]
pub struct ClientSettings {
    /// REST root, e.g. `https://acme.logicmonitor.com/santaba/rest`
    pub base_url: String,
    pub api_version: u32,
    /// Upper bound for each individual request
    pub timeout: Duration,
}

impl ClientSettings {
    /// Settings for an account on the default domain
    pub fn for_account(account: &str) -> Self {
        Self {
            base_url: account_base_url(account, DEFAULT_DOMAIN),
            api_version: DEFAULT_API_VERSION,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// HTTP client bound to one account's credentials
#[derive(Debug)]
pub struct HttpPortalClient {
    http: Client,
    credentials: Credentials,
    base_url: String,
    api_version: u32,
    metrics: PortalMetrics,
}

impl HttpPortalClient {
    /// Create a client. Credentials are validated here so that no request is
    /// ever attempted with an empty id or key.
    pub fn new(credentials: Credentials, settings: ClientSettings) -> Result<Self> {
        credentials.validate()?;

        let http = Client::builder()
            .timeout(settings.timeout)
            .build()
            .map_err(|e| Error::config(format!("Failed to build HTTP client: {}", e)))?;

        let metrics = PortalMetrics::new(&credentials.account);

        Ok(Self {
            http,
            credentials,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            api_version: settings.api_version,
            metrics,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn metrics(&self) -> &PortalMetrics {
        &self.metrics
    }

    /// Signed GET. `query` is appended verbatim after `?`.
    pub async fn get(&self, resource_path: &str, query: Option<&str>) -> Result<Value> {
        self.execute(Method::GET, resource_path, query, None).await
    }

    /// Signed PATCH with a pre-serialized JSON body
    pub async fn patch(&self, resource_path: &str, body: &str) -> Result<Value> {
        self.execute(Method::PATCH, resource_path, None, Some(body)).await
    }

    fn request_url(&self, resource_path: &str, query: Option<&str>) -> String {
        match query {
            Some(q) if !q.is_empty() => format!("{}{}?{}", self.base_url, resource_path, q),
            _ => format!("{}{}", self.base_url, resource_path),
        }
    }

    fn headers(&self, method: &Method, resource_path: &str, body: Option<&str>) -> Result<HeaderMap> {
        let signer = RequestSigner::new(&self.credentials);
        let (authorization, _) = signer.sign_now(method.as_str(), resource_path, body)?;

        let mut headers = HeaderMap::new();
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&authorization)
                .map_err(|e| Error::invalid_input(format!("Invalid authorization value: {}", e)))?,
        );
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert("x-version", HeaderValue::from(self.api_version));
        Ok(headers)
    }

    async fn execute(
        &self,
        method: Method,
        resource_path: &str,
        query: Option<&str>,
        body: Option<&str>,
    ) -> Result<Value> {
        let url = self.request_url(resource_path, query);
        let headers = self.headers(&method, resource_path, body)?;

        debug!(method = %method, path = resource_path, query = query.unwrap_or(""), "Portal request");

        let mut request = self.http.request(method.clone(), url.as_str()).headers(headers);
        if let Some(body) = body {
            request = request.body(body.to_string());
        }

        let started = Instant::now();
        let response = match request.send().await {
            Ok(response) => response,
            Err(e) => {
                self.metrics.record_request(method.as_str(), None, started.elapsed());
                warn!(method = %method, path = resource_path, error = %e, "Portal request failed");
                return Err(Error::transport(e.to_string()));
            }
        };

        let status = response.status();
        self.metrics
            .record_request(method.as_str(), Some(status.as_u16()), started.elapsed());

        let text = response
            .text()
            .await
            .map_err(|e| Error::transport(format!("Failed to read response body: {}", e)))?;

        if !status.is_success() {
            return Err(Error::api(status.as_u16(), error_message(&text)));
        }

        let value: Value = if text.trim().is_empty() {
            Value::Null
        } else {
            serde_json::from_str(&text)?
        };

        check_envelope(&value)?;
        Ok(value)
    }
}

/// Older endpoints answer 200 with `{"status": <code>, "errmsg": ...}`
fn check_envelope(value: &Value) -> Result<()> {
    let status = value.get("status").and_then(Value::as_u64);
    let errmsg = value.get("errmsg").and_then(Value::as_str);
    match (status, errmsg) {
        (Some(code), Some(msg)) if code != 200 => {
            Err(Error::api(u16::try_from(code).unwrap_or(500), msg))
        }
        _ => Ok(()),
    }
}

/// Pull a readable message out of an error body
fn error_message(text: &str) -> String {
    serde_json::from_str::<Value>(text)
        .ok()
        .and_then(|v| {
            v.get("errorMessage")
                .or_else(|| v.get("errmsg"))
                .and_then(Value::as_str)
                .map(str::to_string)
        })
        .unwrap_or_else(|| text.to_string())
}
