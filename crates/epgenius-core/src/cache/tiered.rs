//! Tiered registry cache: live → memory → durable → unavailable.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::clock::Clock;
use crate::error::PersistError;
use crate::registry::RegistrySnapshot;
use crate::snapshot::CacheSnapshot;
use crate::source::{RegistrySource, SnapshotStore};

use super::{
    DEFAULT_FETCH_TIMEOUT, RegistryView, SingleFlight, fetch_bounded, log_fetch_failure,
};

/// Where a snapshot read was served from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SnapshotRead {
    /// Fresh from the upstream endpoint.
    Live(Arc<RegistrySnapshot>),
    /// Last successful fetch held in memory, of any age.
    Memory(Arc<RegistrySnapshot>),
    /// Loaded from the durable snapshot file.
    Durable(Arc<RegistrySnapshot>),
    /// Nothing could be served.
    Unavailable,
}

impl SnapshotRead {
    pub fn snapshot(&self) -> Option<&Arc<RegistrySnapshot>> {
        match self {
            Self::Live(s) | Self::Memory(s) | Self::Durable(s) => Some(s),
            Self::Unavailable => None,
        }
    }

    pub fn into_snapshot(self) -> Option<Arc<RegistrySnapshot>> {
        match self {
            Self::Live(s) | Self::Memory(s) | Self::Durable(s) => Some(s),
            Self::Unavailable => None,
        }
    }

    pub const fn is_unavailable(&self) -> bool {
        matches!(self, Self::Unavailable)
    }

    /// Short label for logs.
    pub const fn source_name(&self) -> &'static str {
        match self {
            Self::Live(_) => "live",
            Self::Memory(_) => "memory",
            Self::Durable(_) => "durable",
            Self::Unavailable => "unavailable",
        }
    }
}

/// Registry cache for lookups and listings.
pub struct TieredRegistryCache {
    source: Arc<dyn RegistrySource>,
    store: Arc<dyn SnapshotStore>,
    clock: Arc<dyn Clock>,
    fetch_timeout: Duration,
    memory: RwLock<Option<CacheSnapshot>>,
    flight: SingleFlight,
}

impl TieredRegistryCache {
    pub fn new(
        source: Arc<dyn RegistrySource>,
        store: Arc<dyn SnapshotStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            source,
            store,
            clock,
            fetch_timeout: DEFAULT_FETCH_TIMEOUT,
            memory: RwLock::new(None),
            flight: SingleFlight::default(),
        }
    }

    #[must_use]
    pub const fn with_fetch_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout = timeout;
        self
    }

    /// Current registry snapshot.
    ///
    /// Unless `bypass_live` is set, tries the upstream first. Failures never
    /// surface: they fall through to memory, then disk, then `Unavailable`.
    pub async fn get_full_snapshot(&self, bypass_live: bool) -> SnapshotRead {
        if !bypass_live {
            if let Some(fresh) = self.flight.run(|| self.refresh()).await {
                return SnapshotRead::Live(fresh);
            }
        }

        if let Some(cached) = self.memory.read().await.as_ref() {
            debug!(fetched_at = %cached.fetched_at, "Serving in-memory registry snapshot");
            return SnapshotRead::Memory(Arc::clone(&cached.data));
        }

        match self.store.load().await {
            Ok(durable) => {
                info!(
                    fetched_at = %durable.fetched_at,
                    entries = durable.data.len(),
                    "Serving durable registry snapshot"
                );
                let data = Arc::clone(&durable.data);
                let mut memory = self.memory.write().await;
                if memory.is_none() {
                    *memory = Some(durable);
                }
                SnapshotRead::Durable(data)
            }
            Err(PersistError::Missing) => {
                warn!("Registry unavailable: no live data and no durable snapshot");
                SnapshotRead::Unavailable
            }
            Err(e) => {
                warn!(error = %e, "Registry unavailable: durable snapshot unreadable");
                SnapshotRead::Unavailable
            }
        }
    }

    async fn refresh(&self) -> Option<Arc<RegistrySnapshot>> {
        let data = match fetch_bounded(self.source.as_ref(), self.fetch_timeout).await {
            Ok(data) => data,
            Err(e) => {
                log_fetch_failure("tiered", &e);
                return None;
            }
        };

        let snapshot = CacheSnapshot::new(data, self.clock.now());
        let fresh = Arc::clone(&snapshot.data);
        debug!(entries = fresh.len(), "Fetched live registry snapshot");

        if let Err(e) = self.store.save(&snapshot).await {
            warn!(error = %e, "Failed to persist registry snapshot");
        }
        *self.memory.write().await = Some(snapshot);
        Some(fresh)
    }
}

#[async_trait]
impl RegistryView for TieredRegistryCache {
    async fn snapshot(&self) -> Option<Arc<RegistrySnapshot>> {
        self.get_full_snapshot(false).await.into_snapshot()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::error::FetchError;
    use crate::snapshot::FileSnapshotStore;
    use crate::testing::{FakeRegistrySource, MemoryStore, fixed_clock, sample_snapshot};

    fn cache_with(
        source: &Arc<FakeRegistrySource>,
        store: Arc<dyn SnapshotStore>,
    ) -> TieredRegistryCache {
        TieredRegistryCache::new(
            Arc::clone(source) as Arc<dyn RegistrySource>,
            store,
            fixed_clock(),
        )
    }

    #[tokio::test]
    async fn live_fetch_then_bypass_returns_same_snapshot() {
        let source = Arc::new(FakeRegistrySource::new(vec![Ok(sample_snapshot())]));
        let cache = cache_with(&source, Arc::new(MemoryStore::default()));

        let live = cache.get_full_snapshot(false).await;
        let served_from = live.source_name();
        let SnapshotRead::Live(fetched) = live else {
            panic!("expected live read, got {served_from}");
        };

        let cached = cache.get_full_snapshot(true).await;
        assert_eq!(cached, SnapshotRead::Memory(Arc::clone(&fetched)));
        assert_eq!(*fetched, sample_snapshot());
        assert_eq!(source.calls(), 1);
    }

    #[tokio::test]
    async fn live_fetch_persists_durable_snapshot() {
        let source = Arc::new(FakeRegistrySource::new(vec![Ok(sample_snapshot())]));
        let store = Arc::new(MemoryStore::default());
        let cache = cache_with(&source, Arc::clone(&store) as Arc<dyn SnapshotStore>);

        cache.get_full_snapshot(false).await;

        let saved = store.saved().unwrap();
        assert_eq!(*saved.data, sample_snapshot());
    }

    #[tokio::test]
    async fn fetch_failure_serves_memory_regardless_of_age() {
        let source = Arc::new(FakeRegistrySource::new(vec![
            Ok(sample_snapshot()),
            Err(FetchError::Status(502)),
        ]));
        let cache = cache_with(&source, Arc::new(MemoryStore::default()));

        cache.get_full_snapshot(false).await;
        let read = cache.get_full_snapshot(false).await;

        assert!(matches!(read, SnapshotRead::Memory(_)));
        assert_eq!(source.calls(), 2);
    }

    #[tokio::test]
    async fn fetch_failure_without_memory_falls_back_to_disk() {
        let source = Arc::new(FakeRegistrySource::new(vec![Err(FetchError::Unreachable(
            "connection refused".into(),
        ))]));
        let store = Arc::new(MemoryStore::with_snapshot(sample_snapshot()));
        let cache = cache_with(&source, store);

        let read = cache.get_full_snapshot(false).await;
        assert!(matches!(read, SnapshotRead::Durable(_)));
        assert_eq!(**read.snapshot().unwrap(), sample_snapshot());

        // promoted into memory
        assert!(matches!(
            cache.get_full_snapshot(true).await,
            SnapshotRead::Memory(_)
        ));
    }

    #[tokio::test]
    async fn nothing_anywhere_is_unavailable() {
        let source = Arc::new(FakeRegistrySource::new(vec![Err(FetchError::Status(500))]));
        let cache = cache_with(&source, Arc::new(MemoryStore::default()));

        assert!(cache.get_full_snapshot(false).await.is_unavailable());
    }

    #[tokio::test]
    async fn corrupt_durable_file_is_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("registry.json");
        std::fs::write(&path, "this is not json").unwrap();

        let source = Arc::new(FakeRegistrySource::new(vec![Err(FetchError::Unreachable(
            "dns".into(),
        ))]));
        let cache = cache_with(&source, Arc::new(FileSnapshotStore::new(path)));

        assert_eq!(cache.get_full_snapshot(false).await, SnapshotRead::Unavailable);
    }

    #[tokio::test]
    async fn persistence_failure_does_not_hide_fresh_data() {
        let source = Arc::new(FakeRegistrySource::new(vec![Ok(sample_snapshot())]));
        let cache = cache_with(&source, Arc::new(MemoryStore::failing()));

        assert!(matches!(
            cache.get_full_snapshot(false).await,
            SnapshotRead::Live(_)
        ));
    }

    #[tokio::test]
    async fn bypass_never_calls_upstream() {
        let source = Arc::new(FakeRegistrySource::new(vec![Ok(sample_snapshot())]));
        let cache = cache_with(&source, Arc::new(MemoryStore::default()));

        assert!(cache.get_full_snapshot(true).await.is_unavailable());
        assert_eq!(source.calls(), 0);
    }

    #[tokio::test]
    async fn concurrent_refreshes_share_one_upstream_call() {
        let source = Arc::new(
            FakeRegistrySource::new(vec![Ok(sample_snapshot()), Ok(sample_snapshot())])
                .with_delay(Duration::from_millis(50)),
        );
        let cache = cache_with(&source, Arc::new(MemoryStore::default()));

        let (a, b) = tokio::join!(
            cache.get_full_snapshot(false),
            cache.get_full_snapshot(false)
        );

        assert!(matches!(a, SnapshotRead::Live(_)));
        assert!(matches!(b, SnapshotRead::Live(_)));
        assert_eq!(source.calls(), 1);
    }

    #[tokio::test]
    async fn slow_upstream_is_cut_off_by_timeout() {
        let source = Arc::new(
            FakeRegistrySource::new(vec![Ok(sample_snapshot())])
                .with_delay(Duration::from_secs(5)),
        );
        let cache = cache_with(&source, Arc::new(MemoryStore::default()))
            .with_fetch_timeout(Duration::from_millis(20));

        assert!(cache.get_full_snapshot(false).await.is_unavailable());
    }
}
