//! Outbound delivery of broadcast messages.

use async_trait::async_trait;
use engine::Recipient;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum NotifyError {
    #[error("delivery to {recipient} failed: {reason}")]
    Delivery { recipient: String, reason: String },
}

/// Delivers a broadcast text to customers.
///
/// Returns the ids of the users the text reached; failures for single
/// recipients are reported through `tracing` and do not abort the batch.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn deliver(&self, recipients: &[Recipient], text: &str) -> Vec<i64>;
}

/// Notifier used when no delivery channel is configured.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn deliver(&self, recipients: &[Recipient], text: &str) -> Vec<i64> {
        tracing::info!(
            recipients = recipients.len(),
            chars = text.chars().count(),
            "no delivery channel configured, broadcast only logged"
        );
        Vec::new()
    }
}

/// Text sent to customers for a broadcast.
pub(crate) fn broadcast_text(title: &str, content: &str) -> String {
    format!("{title}\n\n{content}")
}
