//! Registry caches.
//!
//! Two strategies with different fallback rules share one read interface:
//! - [`TieredRegistryCache`]: live fetch, then memory, then the durable
//!   snapshot, then `Unavailable`. Used for lookups and listings.
//! - [`EnrichmentCache`]: TTL-gated, serves stale data when a refresh fails.
//!   Used to decorate per-user status reports.
//!
//! Both coalesce concurrent refreshes through [`SingleFlight`].

mod enrichment;
mod tiered;

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::error::FetchError;
use crate::registry::RegistrySnapshot;
use crate::source::RegistrySource;

pub use enrichment::EnrichmentCache;
pub use tiered::{SnapshotRead, TieredRegistryCache};

/// Default bound on a live registry fetch.
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(10);

/// Default enrichment TTL.
pub const DEFAULT_ENRICHMENT_TTL: Duration = Duration::from_secs(300);

/// Read access to "the registry as best we currently know it".
#[async_trait]
pub trait RegistryView: Send + Sync {
    /// Current snapshot, or `None` when nothing can be served.
    async fn snapshot(&self) -> Option<Arc<RegistrySnapshot>>;
}

/// Fetch from `source`, bounded by `timeout`.
async fn fetch_bounded(
    source: &dyn RegistrySource,
    timeout: Duration,
) -> Result<RegistrySnapshot, FetchError> {
    match tokio::time::timeout(timeout, source.fetch()).await {
        Ok(result) => result,
        Err(_) => Err(FetchError::Unreachable(format!(
            "registry fetch timed out after {}s",
            timeout.as_secs()
        ))),
    }
}

#[derive(Debug, Default)]
struct FlightSlot {
    epoch: u64,
    outcome: Option<Arc<RegistrySnapshot>>,
}

/// Coalesces concurrent refreshes into one upstream call.
///
/// A caller records the completed-attempt epoch before queueing on the lock.
/// If the epoch moved while it waited, another caller already refreshed and
/// its outcome (success or failure) is reused.
#[derive(Debug, Default)]
pub(crate) struct SingleFlight {
    completed: AtomicU64,
    slot: tokio::sync::Mutex<FlightSlot>,
}

impl SingleFlight {
    pub(crate) async fn run<F, Fut>(&self, refresh: F) -> Option<Arc<RegistrySnapshot>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Option<Arc<RegistrySnapshot>>>,
    {
        let observed = self.completed.load(Ordering::Acquire);
        let mut slot = self.slot.lock().await;
        if slot.epoch != observed {
            debug!(epoch = slot.epoch, "Joined in-flight registry refresh");
            return slot.outcome.clone();
        }

        let outcome = refresh().await;
        slot.epoch += 1;
        slot.outcome.clone_from(&outcome);
        self.completed.store(slot.epoch, Ordering::Release);
        outcome
    }
}

fn log_fetch_failure(cache: &'static str, err: &FetchError) {
    warn!(cache, error = %err, "Registry fetch failed");
}
