//! Cached registry snapshots and their on-disk form.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::PersistError;
use crate::registry::{RegistrySnapshot, WireEntry};
use crate::source::SnapshotStore;

/// Registry data together with the instant it was fetched.
///
/// Always replaced wholesale; never patched in place.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheSnapshot {
    pub data: Arc<RegistrySnapshot>,
    pub fetched_at: DateTime<Utc>,
}

impl CacheSnapshot {
    pub fn new(data: RegistrySnapshot, fetched_at: DateTime<Utc>) -> Self {
        Self {
            data: Arc::new(data),
            fetched_at,
        }
    }

    /// Time since the snapshot was fetched, saturating at zero.
    pub fn age(&self, now: DateTime<Utc>) -> chrono::Duration {
        (now - self.fetched_at).max(chrono::Duration::zero())
    }
}

/// JSON layout of the durable snapshot file.
#[derive(Debug, Serialize, Deserialize)]
struct SnapshotFile {
    timestamp: DateTime<Utc>,
    playlists: Vec<WireEntry>,
}

/// Durable snapshot kept in a single JSON file.
///
/// Writes go to a sibling temp file that is renamed over the target, so a
/// crash mid-write leaves the previous snapshot intact.
#[derive(Debug, Clone)]
pub struct FileSnapshotStore {
    path: PathBuf,
}

impl FileSnapshotStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(std::ffi::OsStr::to_os_string)
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

#[async_trait]
impl SnapshotStore for FileSnapshotStore {
    async fn load(&self) -> Result<CacheSnapshot, PersistError> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(PersistError::Missing);
            }
            Err(e) => return Err(e.into()),
        };
        let file: SnapshotFile = serde_json::from_slice(&bytes)?;
        debug!(
            path = %self.path.display(),
            entries = file.playlists.len(),
            "Loaded durable snapshot"
        );
        Ok(CacheSnapshot::new(
            RegistrySnapshot::from_wire(file.playlists),
            file.timestamp,
        ))
    }

    async fn save(&self, snapshot: &CacheSnapshot) -> Result<(), PersistError> {
        let file = SnapshotFile {
            timestamp: snapshot.fetched_at,
            playlists: snapshot.data.to_wire(),
        };
        let json = serde_json::to_vec_pretty(&file)?;
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        let tmp = self.temp_path();
        tokio::fs::write(&tmp, json).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        debug!(path = %self.path.display(), "Saved durable snapshot");
        Ok(())
    }
}
