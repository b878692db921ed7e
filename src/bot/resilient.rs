//! Telegram API calls with automatic retry on transient network failures.
//!
//! Sends go through [`crate::utils::retry_telegram_operation`]; deletions
//! degrade gracefully since a leftover status message is harmless.

use anyhow::Result;
use teloxide::prelude::*;
use teloxide::types::{ChatId, Message, MessageId};
use tracing::{debug, warn};

/// Send a plain-text message, retrying on network failures.
///
/// # Errors
///
/// Returns the last error once all attempts are exhausted.
pub async fn send_message_resilient(
    bot: &Bot,
    chat_id: ChatId,
    text: impl Into<String>,
) -> Result<Message> {
    let text = text.into();
    crate::utils::retry_telegram_operation(|| async {
        bot.send_message(chat_id, text.clone())
            .await
            .map_err(|e| anyhow::anyhow!("Telegram send error: {e}"))
    })
    .await
}

/// Delete a message, retrying on network failures.
///
/// Returns `true` if the message is gone, `false` if deletion failed.
pub async fn delete_message_safe(bot: &Bot, chat_id: ChatId, msg_id: MessageId) -> bool {
    const ERROR_NOT_FOUND: &str = "message to delete not found";

    let outcome = crate::utils::retry_telegram_operation(|| async {
        bot.delete_message(chat_id, msg_id)
            .await
            .map_err(|e| anyhow::anyhow!("Telegram delete error: {e}"))
    })
    .await;

    match outcome {
        Ok(_) => true,
        Err(e) if e.to_string().contains(ERROR_NOT_FOUND) => {
            debug!("Status message already gone: {e}");
            true
        }
        Err(e) => {
            warn!("Failed to delete status message after retries: {e}");
            false
        }
    }
}
