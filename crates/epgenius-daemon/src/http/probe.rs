//! HTTP availability probe.

use std::error::Error as _;
use std::time::Duration;

use async_trait::async_trait;
use epgenius_core::monitor::{Classification, DownCause, HealthProbe, Probe};
use reqwest::StatusCode;
use reqwest::redirect::Policy;

use super::{ClientError, client_builder};

/// Upper bound for the underlying client; each poll sets its own timeout.
const CLIENT_TIMEOUT: Duration = Duration::from_secs(60);

/// Health probe that GETs the target and accepts only `200 OK`.
///
/// Redirects are not followed: a 3xx from the target is a down status.
#[derive(Debug, Clone)]
pub struct HttpHealthProbe {
    http: reqwest::Client,
}

impl HttpHealthProbe {
    pub fn new() -> Result<Self, ClientError> {
        Ok(Self {
            http: client_builder(CLIENT_TIMEOUT)
                .redirect(Policy::none())
                .build()?,
        })
    }
}

#[async_trait]
impl HealthProbe for HttpHealthProbe {
    async fn poll_once(&self, url: &str, timeout: Duration) -> Probe {
        let target = match reqwest::Url::parse(url) {
            Ok(u) if matches!(u.scheme(), "http" | "https") => u,
            Ok(u) => {
                return down(
                    DownCause::InvalidUrl,
                    Some(format!("unsupported scheme '{}'", u.scheme())),
                );
            }
            Err(e) => return down(DownCause::InvalidUrl, Some(e.to_string())),
        };

        match self.http.get(target).timeout(timeout).send().await {
            Ok(resp) if resp.status() == StatusCode::OK => Probe {
                classification: Classification::Up,
                detail: None,
            },
            Ok(resp) => {
                let status = resp.status();
                down(
                    DownCause::HttpStatus(status.as_u16()),
                    status.canonical_reason().map(str::to_string),
                )
            }
            Err(e) => down(classify(&e), Some(error_chain(&e))),
        }
    }
}

fn down(cause: DownCause, detail: Option<String>) -> Probe {
    Probe {
        classification: Classification::Down(cause),
        detail,
    }
}

fn classify(e: &reqwest::Error) -> DownCause {
    if e.is_timeout() {
        DownCause::Timeout
    } else if is_tls_failure(e) {
        DownCause::TlsError
    } else if e.is_connect() {
        DownCause::ConnectionError
    } else if e.is_builder() {
        DownCause::InvalidUrl
    } else {
        DownCause::Other
    }
}

/// Whether any error in the source chain comes from the TLS layer.
fn is_tls_failure(e: &reqwest::Error) -> bool {
    let mut source = e.source();
    while let Some(err) = source {
        if err.downcast_ref::<rustls::Error>().is_some() {
            return true;
        }
        let message = err.to_string().to_ascii_lowercase();
        if message.contains("certificate") || message.contains("tls") {
            return true;
        }
        source = err.source();
    }
    false
}

/// `outer: inner: innermost`, for the alert detail field.
fn error_chain(e: &reqwest::Error) -> String {
    let mut parts = vec![e.to_string()];
    let mut source = e.source();
    while let Some(err) = source {
        let text = err.to_string();
        if parts.last() != Some(&text) {
            parts.push(text);
        }
        source = err.source();
    }
    parts.join(": ")
}
