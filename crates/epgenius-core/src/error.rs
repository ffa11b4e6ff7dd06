//! Error types for the EPGenius core library.

use thiserror::Error;

/// Result type alias using the EPGenius [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// Core error types for EPGenius operations.
///
/// Only [`Error::Authorization`] is expected to reach a user: every other
/// class is resolved by the caches and services into a defined value
/// (stale data, `Unavailable`, or a plain-language message).
#[derive(Debug, Error)]
pub enum Error {
    /// Upstream fetch failed
    #[error(transparent)]
    Fetch(#[from] FetchError),

    /// Durable snapshot read/write failed
    #[error(transparent)]
    Persist(#[from] PersistError),

    /// Bearer token rejected by a protected endpoint
    #[error("Authorization failed: {0}")]
    Authorization(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Failure talking to an upstream HTTP endpoint.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FetchError {
    /// Timeout, DNS, TLS or connect failure.
    #[error("upstream unreachable: {0}")]
    Unreachable(String),

    /// Upstream answered with an unexpected status code.
    #[error("upstream returned HTTP {0}")]
    Status(u16),

    /// Response body could not be decoded.
    #[error("failed to decode upstream response: {0}")]
    Decode(String),

    /// Bearer token was rejected (401/403).
    #[error("upstream rejected credentials")]
    Unauthorized,
}

/// Failure reading or writing the durable snapshot.
#[derive(Debug, Error)]
pub enum PersistError {
    /// Snapshot file does not exist yet.
    #[error("snapshot file not found")]
    Missing,

    #[error("snapshot I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("snapshot file is corrupt: {0}")]
    Corrupt(#[from] serde_json::Error),
}
