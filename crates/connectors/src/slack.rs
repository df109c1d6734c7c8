//! Operations channel notifications through an incoming webhook.

use std::time::Duration;

use async_trait::async_trait;
use fulfillment::Notifier;
use reqwest::Client;
use serde::Serialize;
use serde_json::Value;

use crate::error::Result;
use crate::http;

/// Posts messages to an incoming webhook.
///
/// Without a webhook URL every message is dropped with a warning.
pub struct SlackNotifier {
    client: Client,
    webhook_url: Option<String>,
}

#[derive(Debug, Serialize)]
struct Payload<'a> {
    text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    blocks: Option<&'a [Value]>,
}

impl SlackNotifier {
    /// Creates a notifier; `None` or an empty URL disables sending.
    pub fn new(webhook_url: Option<String>, timeout: Duration) -> Result<Self> {
        Ok(Self {
            client: http::client(timeout)?,
            webhook_url: webhook_url.filter(|u| !u.trim().is_empty()),
        })
    }

    /// Returns true if messages are actually sent.
    pub fn is_enabled(&self) -> bool {
        self.webhook_url.is_some()
    }

    /// Sends `text` with optional layout blocks. Failures are logged only.
    pub async fn send(&self, text: &str, blocks: Option<&[Value]>) {
        let Some(url) = &self.webhook_url else {
            tracing::warn!("notification webhook not configured; skipping message");
            return;
        };

        let result = self
            .client
            .post(url)
            .json(&Payload { text, blocks })
            .send()
            .await;

        match result {
            Ok(response) if response.status().is_success() => {
                tracing::debug!("notification sent");
            }
            Ok(response) => {
                let (status, body) = http::failure(response).await;
                tracing::error!(status, %body, "notification rejected");
            }
            Err(e) => {
                tracing::error!(error = %e, "notification failed");
            }
        }
    }
}

#[async_trait]
impl Notifier for SlackNotifier {
    async fn notify(&self, message: &str) {
        self.send(message, None).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_omits_missing_blocks() {
        let json = serde_json::to_value(Payload {
            text: "hello",
            blocks: None,
        })
        .unwrap();
        assert_eq!(json, serde_json::json!({ "text": "hello" }));
    }

    #[tokio::test]
    async fn test_unconfigured_is_a_no_op() {
        let notifier = SlackNotifier::new(Some("  ".to_string()), Duration::from_secs(1)).unwrap();
        assert!(!notifier.is_enabled());
        notifier.notify("dropped").await;
    }
}
