//! Wiring of core services from a resolved [`Config`].

use std::sync::Arc;

use epgenius_core::cache::{EnrichmentCache, RegistryView, TieredRegistryCache};
use epgenius_core::clock::{Clock, SystemClock};
use epgenius_core::config::{Config, MonitorTargetConfig};
use epgenius_core::eligibility::EligibilityEngine;
use epgenius_core::lookup::RegistryLookup;
use epgenius_core::monitor::{AvailabilityMonitor, HealthProbe, MonitorTarget};
use epgenius_core::notify::{LogSink, NotificationSink};
use epgenius_core::resolver::FuzzyOwnerResolver;
use epgenius_core::snapshot::FileSnapshotStore;
use epgenius_core::source::{NoopStore, RegistrySource, SnapshotStore};
use epgenius_core::status::StatusService;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::http::{
    ClientError, HttpHealthProbe, HttpRecordSource, HttpRegistrySource, WebhookSink,
};

/// Query-side services.
pub struct Services {
    pub registry: Arc<TieredRegistryCache>,
    pub lookup: RegistryLookup,
    /// `None` when no record endpoint is configured.
    pub status: Option<StatusService>,
}

impl Services {
    pub fn from_config(config: &Config) -> Result<Self, ClientError> {
        let url = config
            .registry
            .url
            .as_deref()
            .ok_or_else(|| ClientError::Config("registry.url is not set".into()))?;
        let source: Arc<dyn RegistrySource> =
            Arc::new(HttpRegistrySource::new(url, config.registry.timeout())?);

        let store: Arc<dyn SnapshotStore> = match config.snapshot_path() {
            Some(path) => {
                info!(path = %path.display(), "Using durable registry snapshot");
                Arc::new(FileSnapshotStore::new(path))
            }
            None => {
                warn!("No snapshot path available; registry will not survive restarts");
                Arc::new(NoopStore)
            }
        };

        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let registry = Arc::new(
            TieredRegistryCache::new(Arc::clone(&source), store, Arc::clone(&clock))
                .with_fetch_timeout(config.registry.timeout()),
        );
        let lookup = RegistryLookup::new(
            Arc::clone(&registry) as Arc<dyn RegistryView>,
            Arc::new(FuzzyOwnerResolver::new(config.resolver.threshold)),
        );

        let status = match (&config.records.url, &config.records.token) {
            (Some(url), Some(token)) => {
                let records = HttpRecordSource::new(url, token, config.records.timeout())?;
                let enrichment = EnrichmentCache::new(source, Arc::clone(&clock))
                    .with_ttl(config.enrichment.ttl())
                    .with_fetch_timeout(config.registry.timeout());
                Some(StatusService::new(
                    Arc::new(records),
                    Arc::new(enrichment),
                    EligibilityEngine::new(config.eligibility),
                    clock,
                ))
            }
            (Some(_), None) => {
                warn!("records.url is set but records.token is missing; status disabled");
                None
            }
            _ => None,
        };

        Ok(Self {
            registry,
            lookup,
            status,
        })
    }
}

/// Build one monitor per configured target.
///
/// Each monitor gets its own sink: the target's webhook, else the global
/// one, else [`LogSink`].
pub fn monitors_from_config(config: &Config) -> Result<Vec<AvailabilityMonitor>, ClientError> {
    let probe: Arc<dyn HealthProbe> = Arc::new(HttpHealthProbe::new()?);
    config
        .monitor
        .targets
        .iter()
        .map(|target| {
            let sink = sink_for(target, config)?;
            Ok(AvailabilityMonitor::new(
                monitor_target(target, config),
                Arc::clone(&probe),
                sink,
            )
            .with_interval(config.monitor.interval())
            .with_timeout(config.monitor.timeout()))
        })
        .collect()
}

/// Wait for every monitor task to finish.
///
/// Returns how many ended abnormally (panicked or were aborted).
pub async fn join_monitors(handles: Vec<JoinHandle<()>>) -> usize {
    let mut failed = 0;
    for handle in handles {
        if let Err(e) = handle.await {
            warn!(error = %e, "Monitor task ended abnormally");
            failed += 1;
        }
    }
    failed
}

fn monitor_target(target: &MonitorTargetConfig, config: &Config) -> MonitorTarget {
    let mentions = if target.mentions.is_empty() {
        config.notifications.mentions.clone()
    } else {
        target.mentions.clone()
    };
    MonitorTarget {
        name: target.name.clone(),
        url: target.url.clone(),
        mentions,
    }
}

fn sink_for(
    target: &MonitorTargetConfig,
    config: &Config,
) -> Result<Arc<dyn NotificationSink>, ClientError> {
    match target
        .webhook_url
        .as_deref()
        .or(config.notifications.webhook_url.as_deref())
    {
        Some(url) => Ok(Arc::new(WebhookSink::new(url)?)),
        None => {
            warn!(target_name = %target.name, "No webhook configured; notifications go to the log");
            Ok(Arc::new(LogSink))
        }
    }
}
