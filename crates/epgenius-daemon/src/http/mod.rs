//! reqwest-backed implementations of the core collaborator traits.
//!
//! - [`HttpRegistrySource`]: registry endpoint (GET, JSON array)
//! - [`HttpRecordSource`]: per-user record endpoint (POST, bearer token)
//! - [`HttpHealthProbe`]: availability probe
//! - [`WebhookSink`]: Discord-compatible webhook notifications

mod probe;
mod records;
mod registry;
mod webhook;

use std::time::Duration;

use epgenius_core::FetchError;
use reqwest::header::HeaderMap;
use thiserror::Error;

pub use probe::HttpHealthProbe;
pub use records::HttpRecordSource;
pub use registry::HttpRegistrySource;
pub use webhook::{WebhookPayload, WebhookSink};

/// Errors constructing an HTTP adapter.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("HTTP client setup failed: {0}")]
    Build(#[from] reqwest::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

const USER_AGENT: &str = concat!("epgenius/", env!("CARGO_PKG_VERSION"));

/// Client builder with the crate's user agent and an overall timeout.
pub fn client_builder(timeout: Duration) -> reqwest::ClientBuilder {
    // Ensure a TLS crypto provider is installed (reqwest uses rustls-no-provider).
    // The `Err` case just means it was already installed.
    let _ = rustls::crypto::ring::default_provider().install_default();

    reqwest::Client::builder()
        .timeout(timeout)
        .user_agent(USER_AGENT)
}

/// Build a reqwest client with the given overall timeout.
pub fn http_client(timeout: Duration) -> Result<reqwest::Client, ClientError> {
    Ok(client_builder(timeout).build()?)
}

/// Build a reqwest client that sends `headers` on every request.
pub fn http_client_with_headers(
    timeout: Duration,
    headers: HeaderMap,
) -> Result<reqwest::Client, ClientError> {
    Ok(client_builder(timeout).default_headers(headers).build()?)
}

fn require_url(url: &str, what: &str) -> Result<String, ClientError> {
    let trimmed = url.trim();
    if trimmed.is_empty() {
        return Err(ClientError::Config(format!("{what} url is empty")));
    }
    reqwest::Url::parse(trimmed)
        .map_err(|e| ClientError::Config(format!("{what} url is invalid: {e}")))?;
    Ok(trimmed.to_string())
}

/// Map a transport-level reqwest error onto the core taxonomy.
fn fetch_error(e: &reqwest::Error) -> FetchError {
    if e.is_decode() {
        FetchError::Decode(e.to_string())
    } else if let Some(status) = e.status() {
        FetchError::Status(status.as_u16())
    } else {
        FetchError::Unreachable(e.to_string())
    }
}
