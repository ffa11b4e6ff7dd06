//! Collaborator seams for the registry caches.
//!
//! The caches never talk to the network or the filesystem directly; they go
//! through these traits so the fallback logic can be exercised with fakes.

use async_trait::async_trait;

use crate::error::{FetchError, PersistError};
use crate::registry::RegistrySnapshot;
use crate::snapshot::CacheSnapshot;

/// Live registry endpoint.
#[async_trait]
pub trait RegistrySource: Send + Sync {
    /// Fetch the full registry. Implementations bound the call with a timeout.
    async fn fetch(&self) -> Result<RegistrySnapshot, FetchError>;
}

/// Durable snapshot storage.
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    async fn load(&self) -> Result<CacheSnapshot, PersistError>;

    async fn save(&self, snapshot: &CacheSnapshot) -> Result<(), PersistError>;
}

/// A store that remembers nothing. Used when no snapshot path is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopStore;

#[async_trait]
impl SnapshotStore for NoopStore {
    async fn load(&self) -> Result<CacheSnapshot, PersistError> {
        Err(PersistError::Missing)
    }

    async fn save(&self, _snapshot: &CacheSnapshot) -> Result<(), PersistError> {
        Ok(())
    }
}
