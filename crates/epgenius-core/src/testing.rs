//! In-memory fakes for the collaborator traits.
//!
//! Compiled for unit tests and behind the `test-utils` feature for
//! downstream crates.

#![allow(clippy::unwrap_used, clippy::missing_panics_doc)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};

use crate::clock::{Clock, ManualClock};
use crate::error::{FetchError, PersistError};
use crate::monitor::{Classification, HealthProbe, Probe};
use crate::notify::{Notification, NotificationSink, NotifyError};
use crate::records::{RecordLookup, UserRecordSource};
use crate::registry::{RegistryEntry, RegistrySnapshot};
use crate::snapshot::CacheSnapshot;
use crate::source::{RegistrySource, SnapshotStore};

/// 2025-10-07 12:00:00 UTC, the reference "now" for tests.
pub fn reference_now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 10, 7, 12, 0, 0).unwrap()
}

pub fn manual_clock() -> Arc<ManualClock> {
    Arc::new(ManualClock::new(reference_now()))
}

pub fn fixed_clock() -> Arc<dyn Clock> {
    manual_clock()
}

pub fn entry(id: i64, owner: Option<&str>, provider: &str) -> RegistryEntry {
    RegistryEntry {
        id,
        owner_name: owner.map(str::to_string),
        provider_name: provider.to_string(),
        epg_url: Some(format!("https://example.com/epg{id}.xml.gz")),
        donation_url: None,
        last_owner_update_at: None,
        thank_you_text: None,
    }
}

/// A small registry shaped like production data.
pub fn sample_snapshot() -> RegistrySnapshot {
    RegistrySnapshot::from_entries([
        entry(1, Some("ferteque"), "Strong"),
        entry(3, None, "France OTT"),
        entry(6, Some("GanjaRelease"), "Strong"),
        entry(8, Some("GanjaRelease"), "Lion"),
        entry(14, Some("tropaz"), "Strong"),
        entry(15, Some("tropaz"), "Trex"),
    ])
}

/// Registry source that replays scripted responses in order.
pub struct FakeRegistrySource {
    responses: Mutex<VecDeque<Result<RegistrySnapshot, FetchError>>>,
    calls: AtomicUsize,
    delay: Option<Duration>,
}

impl FakeRegistrySource {
    pub fn new(responses: Vec<Result<RegistrySnapshot, FetchError>>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            calls: AtomicUsize::new(0),
            delay: None,
        }
    }

    #[must_use]
    pub const fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RegistrySource for FakeRegistrySource {
    async fn fetch(&self) -> Result<RegistrySnapshot, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(FetchError::Unreachable("no scripted response".into())))
    }
}

/// Snapshot store kept in memory.
#[derive(Default)]
pub struct MemoryStore {
    stored: Mutex<Option<CacheSnapshot>>,
    failing: bool,
}

impl MemoryStore {
    pub fn with_snapshot(data: RegistrySnapshot) -> Self {
        Self {
            stored: Mutex::new(Some(CacheSnapshot::new(data, reference_now()))),
            failing: false,
        }
    }

    /// A store whose writes always fail.
    pub fn failing() -> Self {
        Self {
            stored: Mutex::new(None),
            failing: true,
        }
    }

    pub fn saved(&self) -> Option<CacheSnapshot> {
        self.stored.lock().unwrap().clone()
    }
}

#[async_trait]
impl SnapshotStore for MemoryStore {
    async fn load(&self) -> Result<CacheSnapshot, PersistError> {
        self.stored.lock().unwrap().clone().ok_or(PersistError::Missing)
    }

    async fn save(&self, snapshot: &CacheSnapshot) -> Result<(), PersistError> {
        if self.failing {
            return Err(PersistError::Io(std::io::Error::other("disk full")));
        }
        *self.stored.lock().unwrap() = Some(snapshot.clone());
        Ok(())
    }
}

/// Health probe that replays scripted classifications.
pub struct ScriptedProbe {
    script: Mutex<VecDeque<Classification>>,
}

impl ScriptedProbe {
    pub fn new(script: impl IntoIterator<Item = Classification>) -> Self {
        Self {
            script: Mutex::new(script.into_iter().collect()),
        }
    }
}

#[async_trait]
impl HealthProbe for ScriptedProbe {
    async fn poll_once(&self, _url: &str, _timeout: Duration) -> Probe {
        let classification = self
            .script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Classification::Up);
        Probe {
            classification,
            detail: None,
        }
    }
}

/// Sink that records every notification it receives.
#[derive(Default)]
pub struct RecordingSink {
    sent: Mutex<Vec<Notification>>,
    failing: bool,
}

impl RecordingSink {
    /// A sink whose deliveries always fail (after recording them).
    pub fn failing() -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            failing: true,
        }
    }

    pub fn sent(&self) -> Vec<Notification> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl NotificationSink for RecordingSink {
    async fn send(&self, notification: &Notification) -> Result<(), NotifyError> {
        self.sent.lock().unwrap().push(notification.clone());
        if self.failing {
            return Err(NotifyError::Rejected { status: 500 });
        }
        Ok(())
    }
}

/// User-record source that always answers the same thing.
pub struct FakeRecordSource {
    answer: Result<RecordLookup, FetchError>,
    calls: AtomicUsize,
}

impl FakeRecordSource {
    pub const fn new(answer: Result<RecordLookup, FetchError>) -> Self {
        Self {
            answer,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl UserRecordSource for FakeRecordSource {
    async fn fetch_record(
        &self,
        _duid: &str,
        _file_id: Option<&str>,
    ) -> Result<RecordLookup, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.answer.clone()
    }
}
