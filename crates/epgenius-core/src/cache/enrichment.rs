//! TTL-gated registry view used to decorate status reports.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;

use crate::clock::Clock;
use crate::registry::RegistrySnapshot;
use crate::snapshot::CacheSnapshot;
use crate::source::RegistrySource;

use super::{
    DEFAULT_ENRICHMENT_TTL, DEFAULT_FETCH_TIMEOUT, RegistryView, SingleFlight, fetch_bounded,
    log_fetch_failure,
};

/// Stale-serving registry cache.
///
/// Within the TTL the cached value is returned untouched. Past it, one live
/// fetch is attempted; on failure the stale value keeps being served.
pub struct EnrichmentCache {
    source: Arc<dyn RegistrySource>,
    clock: Arc<dyn Clock>,
    ttl: chrono::Duration,
    fetch_timeout: Duration,
    current: RwLock<Option<CacheSnapshot>>,
    flight: SingleFlight,
}

impl EnrichmentCache {
    pub fn new(source: Arc<dyn RegistrySource>, clock: Arc<dyn Clock>) -> Self {
        Self {
            source,
            clock,
            ttl: to_chrono(DEFAULT_ENRICHMENT_TTL),
            fetch_timeout: DEFAULT_FETCH_TIMEOUT,
            current: RwLock::new(None),
            flight: SingleFlight::default(),
        }
    }

    #[must_use]
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = to_chrono(ttl);
        self
    }

    #[must_use]
    pub const fn with_fetch_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout = timeout;
        self
    }

    /// Registry snapshot for enrichment, or `None` if nothing was ever
    /// fetched successfully.
    pub async fn get_enrichment_snapshot(&self) -> Option<Arc<RegistrySnapshot>> {
        if let Some(cached) = self.current.read().await.as_ref() {
            if cached.age(self.clock.now()) < self.ttl {
                return Some(Arc::clone(&cached.data));
            }
        }

        if let Some(fresh) = self.flight.run(|| self.refresh()).await {
            return Some(fresh);
        }

        let stale = self.current.read().await;
        if let Some(cached) = stale.as_ref() {
            debug!(fetched_at = %cached.fetched_at, "Serving stale enrichment snapshot");
        }
        stale.as_ref().map(|c| Arc::clone(&c.data))
    }

    async fn refresh(&self) -> Option<Arc<RegistrySnapshot>> {
        match fetch_bounded(self.source.as_ref(), self.fetch_timeout).await {
            Ok(data) => {
                let snapshot = CacheSnapshot::new(data, self.clock.now());
                let fresh = Arc::clone(&snapshot.data);
                *self.current.write().await = Some(snapshot);
                Some(fresh)
            }
            Err(e) => {
                log_fetch_failure("enrichment", &e);
                None
            }
        }
    }
}

fn to_chrono(duration: Duration) -> chrono::Duration {
    chrono::Duration::from_std(duration).unwrap_or(chrono::Duration::MAX)
}

#[async_trait]
impl RegistryView for EnrichmentCache {
    async fn snapshot(&self) -> Option<Arc<RegistrySnapshot>> {
        self.get_enrichment_snapshot().await
    }
}
