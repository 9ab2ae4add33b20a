//! Client side of the protocol
//!
//! A [`Client`] holds a provisioned signing key pair and a per-process
//! encryption key pair, and fetches one secret per request.

#[allow(clippy::module_inception)]
mod client;
mod error;

pub use client::Client;
pub use error::{ClientError, Rejection};

/// Environment variable carrying the client's signing public key (PEM)
pub const SIGNING_PUBLIC_ENV: &str = "STRONGBOX_SIGNING_PUBLIC";
/// Environment variable carrying the client's signing private key (PEM)
pub const SIGNING_PRIVATE_ENV: &str = "STRONGBOX_SIGNING_PRIVATE";
