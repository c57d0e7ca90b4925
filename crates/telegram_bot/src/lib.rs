//! Telegram delivery of broadcast messages.
//!
//! Customers are addressed by the `telegram_id` stored on their account,
//! which is the private chat id of the customer with the bot.

use std::time::Duration;

use async_trait::async_trait;
use engine::Recipient;
use server::{Notifier, NotifyError};
use teloxide::{prelude::*, types::ChatId};

/// Pause between two messages, keeping a broadcast under the Bot API limit
/// of about 30 messages per second.
const SEND_INTERVAL: Duration = Duration::from_millis(40);

pub struct TelegramNotifier {
    bot: teloxide::Bot,
    interval: Duration,
}

impl TelegramNotifier {
    pub fn new(token: &str) -> Self {
        Self {
            bot: teloxide::Bot::new(token),
            interval: SEND_INTERVAL,
        }
    }

    async fn send(&self, recipient: &Recipient, text: &str) -> Result<(), NotifyError> {
        let chat_id = parse_chat_id(&recipient.telegram_id)?;
        self.bot
            .send_message(chat_id, text)
            .await
            .map_err(|err| NotifyError::Delivery {
                recipient: recipient.telegram_id.clone(),
                reason: err.to_string(),
            })?;
        Ok(())
    }
}

fn parse_chat_id(telegram_id: &str) -> Result<ChatId, NotifyError> {
    telegram_id
        .trim()
        .parse::<i64>()
        .map(ChatId)
        .map_err(|_| NotifyError::Delivery {
            recipient: telegram_id.to_string(),
            reason: "telegram id is not a chat id".to_string(),
        })
}

#[async_trait]
impl Notifier for TelegramNotifier {
    async fn deliver(&self, recipients: &[Recipient], text: &str) -> Vec<i64> {
        tracing::info!(recipients = recipients.len(), "delivering broadcast over telegram");

        let mut delivered = Vec::with_capacity(recipients.len());
        for (i, recipient) in recipients.iter().enumerate() {
            if i > 0 {
                tokio::time::sleep(self.interval).await;
            }
            match self.send(recipient, text).await {
                Ok(()) => delivered.push(recipient.user_id),
                Err(err) => tracing::warn!(user_id = recipient.user_id, "{err}"),
            }
        }

        tracing::info!(
            delivered = delivered.len(),
            failed = recipients.len() - delivered.len(),
            "telegram broadcast finished"
        );
        delivered
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chat_ids_are_numeric() {
        assert_eq!(parse_chat_id("123456789").ok(), Some(ChatId(123456789)));
        assert_eq!(parse_chat_id(" -1001 ").ok(), Some(ChatId(-1001)));
        assert!(parse_chat_id("@someone").is_err());
    }

    #[tokio::test]
    async fn unparsable_ids_are_skipped() {
        let notifier = TelegramNotifier::new("123:TEST");
        let recipients = vec![Recipient {
            user_id: 7,
            telegram_id: "not-a-chat".to_string(),
        }];
        let delivered = notifier.deliver(&recipients, "hello").await;
        assert!(delivered.is_empty());
    }
}
