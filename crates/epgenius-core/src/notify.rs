//! Notification events and sinks.
//!
//! The monitor builds a [`Notification`] and hands it to a
//! [`NotificationSink`]. The daemon ships a webhook sink; [`LogSink`] writes
//! events through tracing and is used when no webhook is configured.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// Errors that can occur while delivering a notification.
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum NotifyError {
    /// HTTP request to the sink failed.
    #[error("notification request error: {0}")]
    Request(String),

    /// Sink answered with a non-success status code.
    #[error("notification rejected (status {status})")]
    Rejected {
        /// HTTP status code returned by the sink.
        status: u16,
    },
}

/// How loud a notification is. Maps to an embed colour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Alert,
    Recovery,
    Info,
}

impl Severity {
    /// RGB colour as a 24-bit integer.
    pub const fn color(self) -> u32 {
        match self {
            Self::Alert => 0x00E7_4C3C,
            Self::Recovery => 0x002E_CC71,
            Self::Info => 0x0034_98DB,
        }
    }
}

/// One name/value row of a notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationField {
    pub name: String,
    pub value: String,
    pub inline: bool,
}

/// A structured event for a notification sink.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub title: String,
    pub severity: Severity,
    pub fields: Vec<NotificationField>,
    /// Mention strings prepended to the message, e.g. `<@&1234>`.
    pub mentions: Vec<String>,
}

impl Notification {
    pub fn new(title: impl Into<String>, severity: Severity) -> Self {
        Self {
            title: title.into(),
            severity,
            fields: Vec::new(),
            mentions: Vec::new(),
        }
    }

    #[must_use]
    pub fn field(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.push(NotificationField {
            name: name.into(),
            value: value.into(),
            inline: false,
        });
        self
    }

    #[must_use]
    pub fn inline_field(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.push(NotificationField {
            name: name.into(),
            value: value.into(),
            inline: true,
        });
        self
    }

    #[must_use]
    pub fn with_mentions(mut self, mentions: impl IntoIterator<Item = String>) -> Self {
        self.mentions.extend(mentions);
        self
    }

    /// Value of the first field called `name`.
    pub fn field_value(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|f| f.name == name)
            .map(|f| f.value.as_str())
    }
}

/// Destination for notifications.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    /// Deliver one notification.
    async fn send(&self, notification: &Notification) -> Result<(), NotifyError>;
}

/// Sink that logs notifications instead of delivering them.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogSink;

#[async_trait]
impl NotificationSink for LogSink {
    async fn send(&self, notification: &Notification) -> Result<(), NotifyError> {
        let fields = notification
            .fields
            .iter()
            .map(|f| format!("{}={}", f.name, f.value))
            .collect::<Vec<_>>()
            .join(", ");
        match notification.severity {
            Severity::Alert => warn!(title = %notification.title, %fields, "Notification"),
            Severity::Recovery | Severity::Info => {
                info!(title = %notification.title, %fields, "Notification");
            }
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn builder_keeps_field_order() {
        let n = Notification::new("Down", Severity::Alert)
            .field("URL", "https://a")
            .inline_field("Status", "N/A")
            .with_mentions(["<@&1>".to_string()]);

        let names: Vec<&str> = n.fields.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["URL", "Status"]);
        assert!(!n.fields[0].inline);
        assert!(n.fields[1].inline);
        assert_eq!(n.field_value("Status"), Some("N/A"));
        assert_eq!(n.field_value("Cause"), None);
        assert_eq!(n.mentions, vec!["<@&1>"]);
    }

    #[test]
    fn severities_have_distinct_colours() {
        assert_ne!(Severity::Alert.color(), Severity::Recovery.color());
        assert_ne!(Severity::Recovery.color(), Severity::Info.color());
    }

    #[tokio::test]
    async fn log_sink_always_succeeds() {
        let n = Notification::new("Recovered", Severity::Recovery);
        assert!(LogSink.send(&n).await.is_ok());
    }
}
