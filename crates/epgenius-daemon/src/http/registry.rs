//! Registry endpoint client.

use std::time::Duration;

use async_trait::async_trait;
use epgenius_core::FetchError;
use epgenius_core::registry::{RegistrySnapshot, WireEntry};
use epgenius_core::source::RegistrySource;
use reqwest::StatusCode;
use tracing::debug;

use super::{ClientError, fetch_error, http_client, require_url};

/// Fetches the full registry with a single GET.
#[derive(Debug, Clone)]
pub struct HttpRegistrySource {
    http: reqwest::Client,
    url: String,
}

impl HttpRegistrySource {
    pub fn new(url: &str, timeout: Duration) -> Result<Self, ClientError> {
        Ok(Self {
            http: http_client(timeout)?,
            url: require_url(url, "registry")?,
        })
    }
}

#[async_trait]
impl RegistrySource for HttpRegistrySource {
    async fn fetch(&self) -> Result<RegistrySnapshot, FetchError> {
        let resp = self
            .http
            .get(&self.url)
            .send()
            .await
            .map_err(|e| fetch_error(&e))?;
        if resp.status() != StatusCode::OK {
            return Err(FetchError::Status(resp.status().as_u16()));
        }
        let rows: Vec<WireEntry> = resp
            .json()
            .await
            .map_err(|e| FetchError::Decode(e.to_string()))?;
        debug!(rows = rows.len(), url = %self.url, "Fetched registry rows");
        Ok(RegistrySnapshot::from_wire(rows))
    }
}
