//! Per-user record endpoint client.

use std::time::Duration;

use async_trait::async_trait;
use epgenius_core::FetchError;
use epgenius_core::records::{RecordLookup, RecordRequest, RecordResponse, UserRecordSource};
use reqwest::StatusCode;
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use tracing::debug;

use super::{ClientError, fetch_error, http_client_with_headers, require_url};

/// Looks up user records with an authenticated POST.
#[derive(Debug, Clone)]
pub struct HttpRecordSource {
    http: reqwest::Client,
    url: String,
}

impl HttpRecordSource {
    pub fn new(url: &str, token: &str, timeout: Duration) -> Result<Self, ClientError> {
        if token.is_empty() {
            return Err(ClientError::Config("records token is empty".into()));
        }

        let mut headers = HeaderMap::new();
        let mut token_val = HeaderValue::from_str(&format!("Bearer {token}"))
            .map_err(|_| ClientError::Config("Invalid token format".into()))?;
        token_val.set_sensitive(true);
        headers.insert(AUTHORIZATION, token_val);

        Ok(Self {
            http: http_client_with_headers(timeout, headers)?,
            url: require_url(url, "records")?,
        })
    }
}

#[async_trait]
impl UserRecordSource for HttpRecordSource {
    async fn fetch_record(
        &self,
        duid: &str,
        file_id: Option<&str>,
    ) -> Result<RecordLookup, FetchError> {
        let resp = self
            .http
            .post(&self.url)
            .json(&RecordRequest { duid, file_id })
            .send()
            .await
            .map_err(|e| fetch_error(&e))?;

        match resp.status() {
            StatusCode::OK => {}
            StatusCode::NOT_FOUND => return Ok(RecordLookup::NotFound),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                return Err(FetchError::Unauthorized);
            }
            other => return Err(FetchError::Status(other.as_u16())),
        }

        let body: RecordResponse = resp
            .json()
            .await
            .map_err(|e| FetchError::Decode(e.to_string()))?;
        debug!(duid, status = ?body.status, "Fetched user record");
        body.into_lookup()
    }
}
