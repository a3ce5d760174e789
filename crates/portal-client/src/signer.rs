//! LMv1 request signing
//!
//! The signed string is `verb + epoch_millis + body + resource_path`. The
//! HMAC-SHA256 digest is rendered as lower-case hex and that hex string is
//! then base64 encoded. The portal expects exactly this double encoding.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::Utc;
use common::{Credentials, Error, Result};
use hmac::{Hmac, Mac};
use sha2::Sha256;

/// HMAC SHA256 type alias
type HmacSha256 = Hmac<Sha256>;

/// Builds `Authorization` header values for one set of credentials
///
/// Every call computes a fresh signature; nothing is cached between requests.
#[derive(Debug, Clone, Copy)]
pub struct RequestSigner<'a> {
    credentials: &'a Credentials,
}

impl<'a> RequestSigner<'a> {
    pub fn new(credentials: &'a Credentials) -> Self {
        Self { credentials }
    }

    /// Sign a request at an explicit timestamp
    ///
    /// # Arguments
    /// * `verb` - HTTP method, upper case (`GET`, `PATCH`)
    /// * `epoch_millis` - Unix time in milliseconds, also embedded in the header
    /// * `resource_path` - Path below the REST root, without query string
    /// * `body` - Serialized request body; `None` for bodiless requests
    pub fn sign(
        &self,
        verb: &str,
        epoch_millis: i64,
        resource_path: &str,
        body: Option<&str>,
    ) -> Result<String> {
        let signature = self.signature(verb, epoch_millis, resource_path, body)?;
        Ok(format!(
            "LMv1 {}:{}:{}",
            self.credentials.access_id, signature, epoch_millis
        ))
    }

    /// Sign a request at the current time. Returns the header and the timestamp used.
    pub fn sign_now(&self, verb: &str, resource_path: &str, body: Option<&str>) -> Result<(String, i64)> {
        let epoch_millis = Utc::now().timestamp_millis();
        let header = self.sign(verb, epoch_millis, resource_path, body)?;
        Ok((header, epoch_millis))
    }

    /// The base64(hex(hmac)) part of the header
    pub fn signature(
        &self,
        verb: &str,
        epoch_millis: i64,
        resource_path: &str,
        body: Option<&str>,
    ) -> Result<String> {
        let message = format!(
            "{}{}{}{}",
            verb,
            epoch_millis,
            body.unwrap_or(""),
            resource_path
        );

        let digest = self.credentials.access_key.expose(|key| {
            let mut mac = <HmacSha256 as Mac>::new_from_slice(key)
                .map_err(|e| Error::invalid_input(format!("Invalid access key: {e}")))?;
            mac.update(message.as_bytes());
            Ok::<_, Error>(mac.finalize().into_bytes())
        })?;

        let hex_digest = hex::encode(digest).to_lowercase();
        Ok(STANDARD.encode(hex_digest.as_bytes()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::SecretKey;

    const PATH: &str = "/device/devices/42/devicedatasources";

    fn test_credentials() -> Credentials {
        Credentials::new(
            "test-access-id",
            SecretKey::new("test-access-key".to_string()),
            "acme",
        )
    }

    #[test]
    fn test_known_get_signature() {
        let creds = test_credentials();
        let signer = RequestSigner::new(&creds);

        let header = signer.sign("GET", 1_700_000_000_000, PATH, None).unwrap();
        assert_eq!(
            header,
            "LMv1 test-access-id:MTkyZTliYjU0MWQwNzYzMTMwNjM2YjMwNDM0MDg4Yjg5YjgzNzMwZGU1YTc5NTQ5YmYwMGVhY2E4M2JkYzY1YQ==:1700000000000"
        );
    }

    #[test]
    fn test_known_patch_signature_includes_body() {
        let creds = test_credentials();
        let signer = RequestSigner::new(&creds);
        let path = "/device/devices/42/devicedatasources/1234/instances/7";
        let body = r#"{"disableAlerting":false,"stopMonitoring":false}"#;

        let with_body = signer.signature("PATCH", 1_700_000_000_000, path, Some(body)).unwrap();
        assert_eq!(
            with_body,
            "Zjc2NDkwNjM4MGE1MjAzNzBlNTA4MDM5NGZlNGEyYzUzYmEyNjkxYTdhOWNmZWNmNTQxODgyMTA4YTFiNWQwYQ=="
        );

        let without_body = signer.signature("PATCH", 1_700_000_000_000, path, None).unwrap();
        assert_eq!(
            without_body,
            "NzZmYWFiYWVjNTIyMDZmNjcxZjg4MzdhNDFhOTQyMGMwZmU5NjA4YTE0NDgxODg5NGRiNzdhYWVjNGRiYTFmZg=="
        );
    }

    #[test]
    fn test_signature_is_deterministic() {
        let creds = test_credentials();
        let signer = RequestSigner::new(&creds);

        let a = signer.sign("GET", 1_700_000_000_000, PATH, None).unwrap();
        let b = signer.sign("GET", 1_700_000_000_000, PATH, None).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_signature_changes_with_epoch() {
        let creds = test_credentials();
        let signer = RequestSigner::new(&creds);

        let a = signer.signature("GET", 1_700_000_000_000, PATH, None).unwrap();
        let b = signer.signature("GET", 1_700_000_000_001, PATH, None).unwrap();
        assert_ne!(a, b);
        assert_eq!(
            b,
            "MzNjMDc4NjdjYzg2NWQ0YzUzZDNiN2MxMmMyNzYyYmQxYzNlYTM3YTRiZDg3NmNlYjQzY2RhN2VlNGI2OGFiYg=="
        );
    }

    #[test]
    fn test_signature_decodes_to_lower_hex() {
        let creds = test_credentials();
        let signer = RequestSigner::new(&creds);

        let signature = signer.signature("GET", 1_700_000_000_000, PATH, None).unwrap();
        let decoded = STANDARD.decode(signature).unwrap();
        let hex_text = String::from_utf8(decoded).unwrap();
        assert_eq!(hex_text.len(), 64);
        assert!(hex_text.chars().all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c)));
    }

    #[test]
    fn test_sign_now_embeds_timestamp() {
        let creds = test_credentials();
        let signer = RequestSigner::new(&creds);

        let (header, epoch) = signer.sign_now("GET", PATH, None).unwrap();
        assert!(header.starts_with("LMv1 test-access-id:"));
        assert!(header.ends_with(&format!(":{}", epoch)));
    }
}
