//! Notifier trait and recording implementation.

use std::sync::Arc;

use async_trait::async_trait;
use domain::messages;
use tokio::sync::RwLock;

/// Trait for posting messages to the operations channel.
///
/// Sending never fails from the caller's point of view: implementations log
/// transport problems and return.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Sends a plain-text message.
    async fn notify(&self, message: &str);

    /// Sends an error report with the context it happened in.
    async fn notify_error(&self, context: &str, error: &str) {
        self.notify(&messages::error_report(context, error)).await;
    }
}

/// Notifier that keeps every message in memory, for testing.
#[derive(Debug, Clone, Default)]
pub struct RecordingNotifier {
    messages: Arc<RwLock<Vec<String>>>,
}

impl RecordingNotifier {
    /// Creates an empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns every message sent so far.
    pub async fn messages(&self) -> Vec<String> {
        self.messages.read().await.clone()
    }

    /// Returns the number of messages sent so far.
    pub async fn count(&self) -> usize {
        self.messages.read().await.len()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, message: &str) {
        tracing::debug!(message, "recording notification");
        self.messages.write().await.push(message.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_records_messages_in_order() {
        let notifier = RecordingNotifier::new();
        notifier.notify("first").await;
        notifier.notify_error("ledger write failed", "HTTP 500").await;

        let messages = notifier.messages().await;
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0], "first");
        assert!(messages[1].contains("ledger write failed"));
        assert!(messages[1].contains("HTTP 500"));
    }
}
