use common::SecretKey;
use std::path::PathBuf;

pub fn default_domain() -> String {
    "logicmonitor.com".to_string()
}

pub fn default_api_version() -> u32 {
    3
}

pub fn default_batch_size() -> u64 {
    1000
}

pub fn default_timeout_seconds() -> u64 {
    30
}

pub fn default_log_format() -> String {
    "pretty".to_string()
}

pub fn default_metrics_textfile() -> PathBuf {
    PathBuf::from("lmctl.prom")
}

/// Written in place of the access key whenever a config is serialized
pub const ACCESS_KEY_PLACEHOLDER: &str = "${LM_ACCESS_KEY}";

pub fn default_access_key() -> SecretKey {
    SecretKey::default()
}

/// Serializer for `portal.access_key`: the key itself is never written out
pub fn serialize_access_key<S>(_key: &SecretKey, serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    serializer.serialize_str(ACCESS_KEY_PLACEHOLDER)
}
