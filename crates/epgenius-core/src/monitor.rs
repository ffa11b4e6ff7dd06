//! Upstream availability monitoring.
//!
//! Each [`AvailabilityMonitor`] polls one health-check URL on a fixed
//! interval and notifies only when the up/down state flips. A target found
//! down on the first poll is reported; one found up is not.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::notify::{Notification, NotificationSink, Severity};
use crate::timestamp::NOT_AVAILABLE;

/// Default poll interval.
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(60);

/// Default bound on a single probe.
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(10);

/// Why a target was classified as down.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DownCause {
    Timeout,
    ConnectionError,
    TlsError,
    InvalidUrl,
    HttpStatus(u16),
    Other,
}

impl DownCause {
    /// Status code, when the target answered at all.
    pub const fn status_code(self) -> Option<u16> {
        match self {
            Self::HttpStatus(code) => Some(code),
            _ => None,
        }
    }
}

impl fmt::Display for DownCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Timeout => f.write_str("timeout"),
            Self::ConnectionError => f.write_str("connection error"),
            Self::TlsError => f.write_str("TLS error"),
            Self::InvalidUrl => f.write_str("invalid URL"),
            Self::HttpStatus(code) => write!(f, "HTTP {code}"),
            Self::Other => f.write_str("other error"),
        }
    }
}

/// Result of one health check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Classification {
    Up,
    Down(DownCause),
}

impl Classification {
    pub const fn is_up(self) -> bool {
        matches!(self, Self::Up)
    }
}

/// A classification plus free-form detail (usually the underlying error).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Probe {
    pub classification: Classification,
    pub detail: Option<String>,
}

/// Performs a single health check.
#[async_trait]
pub trait HealthProbe: Send + Sync {
    /// Poll `url` once. Only HTTP 200 counts as up. Never fails: every
    /// error is folded into a [`DownCause`].
    async fn poll_once(&self, url: &str, timeout: Duration) -> Probe;
}

/// Stored binary state of a target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LastClassification {
    #[default]
    Unknown,
    Up,
    Down,
}

/// A state change worth telling someone about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    WentDown,
    Recovered,
}

/// Edge-trigger state for one target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonitorState {
    pub target: String,
    pub last: LastClassification,
}

impl MonitorState {
    pub fn new(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            last: LastClassification::Unknown,
        }
    }

    /// Record `classification` and report whether the state flipped.
    ///
    /// The cause of a `Down` is ignored for comparison. `Unknown -> Up` is
    /// silent: a recovery needs a recorded `Down`.
    pub fn observe(&mut self, classification: Classification) -> Option<Transition> {
        let next = if classification.is_up() {
            LastClassification::Up
        } else {
            LastClassification::Down
        };
        let transition = match (self.last, next) {
            (LastClassification::Unknown | LastClassification::Up, LastClassification::Down) => {
                Some(Transition::WentDown)
            }
            (LastClassification::Down, LastClassification::Up) => Some(Transition::Recovered),
            _ => None,
        };
        self.last = next;
        transition
    }
}

/// One monitored endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonitorTarget {
    pub name: String,
    pub url: String,
    #[serde(default)]
    pub mentions: Vec<String>,
}

/// Alert or recovery produced by a tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MonitorEvent {
    Alert {
        target: String,
        url: String,
        cause: DownCause,
        detail: Option<String>,
    },
    Recovery {
        target: String,
        url: String,
    },
}

impl MonitorEvent {
    pub const fn is_alert(&self) -> bool {
        matches!(self, Self::Alert { .. })
    }

    pub fn to_notification(&self, mentions: &[String]) -> Notification {
        let notification = match self {
            Self::Alert {
                target,
                url,
                cause,
                detail,
            } => {
                let status = cause
                    .status_code()
                    .map_or_else(|| NOT_AVAILABLE.to_string(), |c| c.to_string());
                let n = Notification::new(format!("{target} is DOWN"), Severity::Alert)
                    .field("URL", url.as_str())
                    .inline_field("Status", status)
                    .inline_field("Cause", cause.to_string());
                match detail {
                    Some(detail) => n.field("Detail", detail.as_str()),
                    None => n,
                }
            }
            Self::Recovery { target, url } => {
                Notification::new(format!("{target} is back UP"), Severity::Recovery)
                    .field("URL", url.as_str())
                    .inline_field("Status", "200")
            }
        };
        notification.with_mentions(mentions.iter().cloned())
    }
}

/// Polls one target and notifies on transitions.
pub struct AvailabilityMonitor {
    target: MonitorTarget,
    probe: Arc<dyn HealthProbe>,
    sink: Arc<dyn NotificationSink>,
    interval: Duration,
    timeout: Duration,
    state: MonitorState,
}

impl AvailabilityMonitor {
    pub fn new(
        target: MonitorTarget,
        probe: Arc<dyn HealthProbe>,
        sink: Arc<dyn NotificationSink>,
    ) -> Self {
        let state = MonitorState::new(target.name.clone());
        Self {
            target,
            probe,
            sink,
            interval: DEFAULT_INTERVAL,
            timeout: DEFAULT_PROBE_TIMEOUT,
            state,
        }
    }

    #[must_use]
    pub const fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub const fn state(&self) -> &MonitorState {
        &self.state
    }

    /// Poll once, update state, deliver any resulting event.
    ///
    /// Sink failures are logged; the event is still returned.
    pub async fn tick(&mut self) -> Option<MonitorEvent> {
        let probe = self.probe.poll_once(&self.target.url, self.timeout).await;
        debug!(
            target_name = %self.target.name,
            classification = ?probe.classification,
            "Health probe finished"
        );

        let event = match (self.state.observe(probe.classification), probe.classification) {
            (Some(Transition::WentDown), Classification::Down(cause)) => Some(MonitorEvent::Alert {
                target: self.target.name.clone(),
                url: self.target.url.clone(),
                cause,
                detail: probe.detail,
            }),
            (Some(Transition::Recovered), _) => Some(MonitorEvent::Recovery {
                target: self.target.name.clone(),
                url: self.target.url.clone(),
            }),
            _ => None,
        };

        if let Some(event) = &event {
            if event.is_alert() {
                warn!(target_name = %self.target.name, url = %self.target.url, "Target went down");
            } else {
                info!(target_name = %self.target.name, url = %self.target.url, "Target recovered");
            }
            let notification = event.to_notification(&self.target.mentions);
            if let Err(e) = self.sink.send(&notification).await {
                warn!(target_name = %self.target.name, error = %e, "Failed to deliver notification");
            }
        }
        event
    }

    /// Spawn the polling loop.
    ///
    /// Nothing is polled until `readiness` reads `true`. The loop stops when
    /// `shutdown` changes or its sender is dropped.
    pub fn spawn(
        mut self,
        mut readiness: watch::Receiver<bool>,
        mut shutdown: watch::Receiver<bool>,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            while !*readiness.borrow_and_update() {
                tokio::select! {
                    changed = readiness.changed() => {
                        if changed.is_err() {
                            debug!(target_name = %self.target.name, "Readiness sender dropped");
                            return;
                        }
                    }
                    _ = shutdown.changed() => return,
                }
            }

            info!(
                target_name = %self.target.name,
                url = %self.target.url,
                interval_secs = self.interval.as_secs(),
                "Availability monitor started"
            );
            let mut timer = tokio::time::interval(self.interval);
            timer.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = timer.tick() => {
                        self.tick().await;
                    }
                    _ = shutdown.changed() => {
                        info!(target_name = %self.target.name, "Availability monitor shutting down");
                        return;
                    }
                }
            }
        })
    }
}
