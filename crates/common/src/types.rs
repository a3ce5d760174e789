//! Common types used across lmctl
//!
//! This module provides the domain types shared by the portal client and
//! the instance workflow: credentials, device references, applied modules,
//! module instances and the per-instance mutation results.

use crate::error::{Error, Result};
use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

// ==================== Credentials ====================

/// Portal access key
///
/// The key is never exposed as a plain value. Callers borrow its bytes for
/// the duration of a closure via [`SecretKey::expose`]; the backing buffer
/// is wiped when the key is dropped.
#[derive(Clone)]
pub struct SecretKey(Zeroizing<String>);

impl SecretKey {
    /// Wrap a raw key. The string is moved, not copied.
    pub fn new(raw: String) -> Self {
        Self(Zeroizing::new(raw))
    }

    /// Run `f` with the key bytes
    pub fn expose<R>(&self, f: impl FnOnce(&[u8]) -> R) -> R {
        f(self.0.as_bytes())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Default for SecretKey {
    fn default() -> Self {
        Self::new(String::new())
    }
}

impl std::fmt::Debug for SecretKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SecretKey([REDACTED])")
    }
}

impl<'de> Deserialize<'de> for SecretKey {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        String::deserialize(deserializer).map(SecretKey::new)
    }
}

/// API token triple for one portal account
#[derive(Debug, Clone)]
pub struct Credentials {
    /// Access id (public half of the API token)
    pub access_id: String,
    /// Access key (secret half of the API token)
    pub access_key: SecretKey,
    /// Account name, used as the portal subdomain
    pub account: String,
}

impl Credentials {
    pub fn new(access_id: impl Into<String>, access_key: SecretKey, account: impl Into<String>) -> Self {
        Self {
            access_id: access_id.into(),
            access_key,
            account: account.into(),
        }
    }

    /// Check that all three parts are present and the account is a valid subdomain
    pub fn validate(&self) -> Result<()> {
        if self.access_id.trim().is_empty() {
            return Err(Error::invalid_input("access id is required"));
        }
        if self.access_key.is_empty() {
            return Err(Error::invalid_input("access key is required"));
        }
        if !is_valid_account(&self.account) {
            return Err(Error::invalid_input(format!(
                "account '{}' is not a valid portal subdomain",
                self.account
            )));
        }
        Ok(())
    }
}

/// Account names are DNS labels: alphanumerics and inner hyphens
pub fn is_valid_account(account: &str) -> bool {
    !account.is_empty()
        && account.len() <= 63
        && !account.starts_with('-')
        && !account.ends_with('-')
        && account.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
}

// ==================== Devices ====================

/// A monitored device
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Device {
    pub id: u64,
    #[serde(default)]
    pub display_name: Option<String>,
}

impl Device {
    pub fn from_id(id: u64) -> Self {
        Self {
            id,
            display_name: None,
        }
    }

    /// Display name if known, otherwise the id
    pub fn label(&self) -> String {
        match &self.display_name {
            Some(name) => name.clone(),
            None => self.id.to_string(),
        }
    }
}

/// How the caller identified the device. Exactly one form is supplied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceRef {
    /// A device object, usually the output of a previous lookup
    Object(Device),
    /// A bare device id
    Id(u64),
}

impl DeviceRef {
    /// Parse a device object from JSON (`{"id": 42, "displayName": "core-sw-01"}`)
    pub fn from_json(raw: &str) -> Result<Self> {
        let device: Device = serde_json::from_str(raw)
            .map_err(|e| Error::invalid_input(format!("malformed device object: {}", e)))?;
        Ok(Self::Object(device))
    }

    /// Validate and turn the reference into a device
    pub fn resolve(self) -> Result<Device> {
        let device = match self {
            DeviceRef::Object(device) => device,
            DeviceRef::Id(id) => Device::from_id(id),
        };
        if device.id == 0 {
            return Err(Error::invalid_input("device id must be a positive integer"));
        }
        Ok(device)
    }
}

// ==================== Applied modules ====================

/// A monitoring module applied to one device
///
/// `id` is device-scoped and differs from the catalog id in `data_source_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppliedModule {
    pub id: u64,
    #[serde(default)]
    pub data_source_id: Option<u64>,
    pub data_source_name: String,
    #[serde(default)]
    pub data_source_display_name: Option<String>,
    #[serde(default)]
    pub instance_number: u64,
}

impl AppliedModule {
    pub fn has_instances(&self) -> bool {
        self.instance_number > 0
    }
}

/// Selects applied modules by name or by device-scoped id
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ModuleSelector {
    ByName(String),
    ById(u64),
}

impl ModuleSelector {
    pub fn matches(&self, module: &AppliedModule) -> bool {
        match self {
            ModuleSelector::ByName(name) => module.data_source_name == *name,
            ModuleSelector::ById(id) => module.id == *id,
        }
    }
}

impl std::fmt::Display for ModuleSelector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ModuleSelector::ByName(name) => write!(f, "name '{}'", name),
            ModuleSelector::ById(id) => write!(f, "id {}", id),
        }
    }
}

// ==================== Instances ====================

/// A monitored sub-resource of an applied module
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModuleInstance {
    pub id: u64,
    #[serde(default)]
    pub display_name: String,
    #[serde(default, deserialize_with = "flexible_bool")]
    pub disable_alerting: bool,
    #[serde(default, deserialize_with = "flexible_bool")]
    pub stop_monitoring: bool,
}

/// Alerting/monitoring flags as echoed back by a PATCH
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstanceState {
    #[serde(default, deserialize_with = "flexible_bool")]
    pub disable_alerting: bool,
    #[serde(default, deserialize_with = "flexible_bool")]
    pub stop_monitoring: bool,
}

impl InstanceState {
    pub fn alerting_enabled(&self) -> bool {
        !self.disable_alerting
    }

    pub fn monitoring_enabled(&self) -> bool {
        !self.stop_monitoring
    }
}

/// Accepts JSON booleans and the string forms some endpoints return
/// (`"False"`, `"true"`, ...). Null reads as false.
pub fn flexible_bool<'de, D>(deserializer: D) -> std::result::Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::Bool(b) => Ok(b),
        serde_json::Value::Null => Ok(false),
        serde_json::Value::String(s) => {
            if s.eq_ignore_ascii_case("false") {
                Ok(false)
            } else if s.eq_ignore_ascii_case("true") {
                Ok(true)
            } else {
                Err(de::Error::custom(format!("expected boolean string, got '{}'", s)))
            }
        }
        other => Err(de::Error::custom(format!("expected boolean, got {}", other))),
    }
}

// ==================== Mutations ====================

/// Direction of an instance update
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum MutationAction {
    /// Clear the disable/stop flags
    #[default]
    Enable,
    /// Set the disable/stop flags
    Disable,
}

impl MutationAction {
    /// Value written to `disableAlerting` / `stopMonitoring`
    pub fn flag_value(&self) -> bool {
        matches!(self, MutationAction::Disable)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MutationAction::Enable => "enable",
            MutationAction::Disable => "disable",
        }
    }
}

impl std::fmt::Display for MutationAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// PATCH body for one instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InstancePatch {
    pub disable_alerting: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop_monitoring: Option<bool>,
}

impl InstancePatch {
    /// Build the body for an action; `alerting_only` leaves monitoring untouched
    pub fn new(action: MutationAction, alerting_only: bool) -> Self {
        let value = action.flag_value();
        Self {
            disable_alerting: value,
            stop_monitoring: if alerting_only { None } else { Some(value) },
        }
    }
}

/// Outcome of one instance PATCH
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MutationOutcome {
    /// The portal accepted the update and echoed this state
    Applied(InstanceState),
    /// The update failed; the message is the transport or API error
    Failed(String),
}

/// Per-instance result, consumed for logging and exit-code aggregation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MutationResult {
    pub instance_id: u64,
    pub display_name: String,
    pub outcome: MutationOutcome,
}

impl MutationResult {
    pub fn applied(instance: &ModuleInstance, state: InstanceState) -> Self {
        Self {
            instance_id: instance.id,
            display_name: instance.display_name.clone(),
            outcome: MutationOutcome::Applied(state),
        }
    }

    pub fn failed(instance: &ModuleInstance, message: impl Into<String>) -> Self {
        Self {
            instance_id: instance.id,
            display_name: instance.display_name.clone(),
            outcome: MutationOutcome::Failed(message.into()),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self.outcome, MutationOutcome::Applied(_))
    }
}
