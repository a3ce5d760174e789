//! Common types and utilities for lmctl
//!
//! This crate provides the domain model and error type shared by the
//! portal client, the instance workflow and the binary.
//!
//! # Modules
//!
//! - [`error`] - Error taxonomy for portal calls and workflow input
//! - [`types`] - Credentials, devices, applied modules, instances, mutation results

pub mod error;
pub mod types;

pub use error::{Error, Result};
pub use types::*;
