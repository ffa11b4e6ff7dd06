//! Discord-compatible webhook sink.

use std::time::Duration;

use async_trait::async_trait;
use epgenius_core::notify::{Notification, NotificationSink, NotifyError};
use serde::Serialize;
use tracing::debug;

use super::{ClientError, http_client, require_url};

const WEBHOOK_TIMEOUT: Duration = Duration::from_secs(10);

/// Webhook request body.
#[derive(Debug, Serialize)]
pub struct WebhookPayload<'a> {
    /// Mentions, space separated. Omitted when there are none.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    pub embeds: Vec<WebhookEmbed<'a>>,
}

#[derive(Debug, Serialize)]
pub struct WebhookEmbed<'a> {
    pub title: &'a str,
    pub color: u32,
    pub fields: Vec<WebhookField<'a>>,
}

#[derive(Debug, Serialize)]
pub struct WebhookField<'a> {
    pub name: &'a str,
    pub value: &'a str,
    pub inline: bool,
}

impl<'a> From<&'a Notification> for WebhookPayload<'a> {
    fn from(n: &'a Notification) -> Self {
        let content = (!n.mentions.is_empty()).then(|| n.mentions.join(" "));
        Self {
            content,
            embeds: vec![WebhookEmbed {
                title: &n.title,
                color: n.severity.color(),
                fields: n
                    .fields
                    .iter()
                    .map(|f| WebhookField {
                        name: &f.name,
                        value: &f.value,
                        inline: f.inline,
                    })
                    .collect(),
            }],
        }
    }
}

/// Posts notifications to a webhook URL.
#[derive(Debug, Clone)]
pub struct WebhookSink {
    http: reqwest::Client,
    url: String,
}

impl WebhookSink {
    pub fn new(url: &str) -> Result<Self, ClientError> {
        Ok(Self {
            http: http_client(WEBHOOK_TIMEOUT)?,
            url: require_url(url, "webhook")?,
        })
    }
}

#[async_trait]
impl NotificationSink for WebhookSink {
    async fn send(&self, notification: &Notification) -> Result<(), NotifyError> {
        let resp = self
            .http
            .post(&self.url)
            .json(&WebhookPayload::from(notification))
            .send()
            .await
            .map_err(|e| NotifyError::Request(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(NotifyError::Rejected {
                status: status.as_u16(),
            });
        }
        debug!(title = %notification.title, "Webhook notification delivered");
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use epgenius_core::notify::Severity;
    use serde_json::json;

    use super::*;

    #[test]
    fn payload_has_embed_shape() {
        let n = Notification::new("registry is DOWN", Severity::Alert)
            .field("URL", "https://r.example")
            .inline_field("Status", "N/A")
            .with_mentions(["<@&1>".to_string(), "<@2>".to_string()]);

        let value = serde_json::to_value(WebhookPayload::from(&n)).unwrap();
        assert_eq!(
            value,
            json!({
                "content": "<@&1> <@2>",
                "embeds": [{
                    "title": "registry is DOWN",
                    "color": Severity::Alert.color(),
                    "fields": [
                        {"name": "URL", "value": "https://r.example", "inline": false},
                        {"name": "Status", "value": "N/A", "inline": true}
                    ]
                }]
            })
        );
    }

    #[test]
    fn no_mentions_omits_content() {
        let n = Notification::new("ok", Severity::Recovery);
        let value = serde_json::to_value(WebhookPayload::from(&n)).unwrap();
        assert!(value.get("content").is_none());
    }
}
