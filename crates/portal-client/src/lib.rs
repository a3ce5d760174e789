//! Portal REST client for lmctl
//!
//! This crate talks to the monitoring portal's REST API:
//!
//! - [`signer`] - LMv1 HMAC request signing
//! - [`filter`] - Percent-encoding of quoted literals in filter expressions
//! - [`paging`] - Offset pagination until the reported total is reached
//! - [`client`] - Signed HTTP transport with per-request timeout and metrics
//! - [`api`] - The [`PortalApi`] trait used by the instance workflow
//! - [`mock`] - In-memory [`MockPortalApi`] for tests
//!
//! # Example
//!
//! ```ignore
//! use common::{Credentials, SecretKey};
//! use portal_client::{ClientSettings, HttpPortalClient, PortalApi};
//!
//! let creds = Credentials::new("id", SecretKey::new(key), "acme");
//! let client = HttpPortalClient::new(creds, ClientSettings::for_account("acme"))?;
//! let modules = client.list_applied_modules(42, 1000).await?;
//! ```

pub mod api;
pub mod client;
pub mod filter;
pub mod mock;
pub mod paging;
pub mod signer;

pub use api::PortalApi;
pub use client::{account_base_url, ClientSettings, HttpPortalClient, DEFAULT_API_VERSION, DEFAULT_DOMAIN, DEFAULT_TIMEOUT};
pub use filter::escape_filter;
pub use mock::{MockPortalApi, PortalCall};
pub use paging::{fetch_all, Page, PageSource, MAX_BATCH_SIZE};
pub use signer::RequestSigner;
