//! Outbound delivery.
//!
//! [`Messenger`] is the seam between the dispatcher and the Bot API.
//! Production code sends through [`TelegramMessenger`]; tests substitute a
//! recording implementation.

use std::future::IntoFuture;
use std::time::Duration;

use async_trait::async_trait;
use teloxide::RequestError;
use teloxide::adaptors::Throttle;
use teloxide::prelude::*;
use teloxide::types::{MessageId, ParseMode};
use thiserror::Error;
use tracing::{debug, warn};

use super::dispatcher::{OutboundAction, OutboundMessage};

/// Bot type with Throttle adaptor for automatic rate limiting.
pub type ThrottledBot = Throttle<Bot>;

/// A Bot API call that did not succeed.
#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("telegram request failed: {0}")]
    Api(#[from] RequestError),

    #[error("telegram request timed out after {0:?}")]
    Timeout(Duration),
}

/// The Bot API operations the bot needs.
#[async_trait]
pub trait Messenger: Send + Sync {
    async fn send(&self, message: &OutboundMessage) -> Result<(), DeliveryError>;

    async fn edit_text(
        &self,
        chat_id: ChatId,
        message_id: MessageId,
        text: &str,
    ) -> Result<(), DeliveryError>;

    /// Stop the client-side loading indicator of a pressed button.
    async fn answer_callback(&self, query_id: &str) -> Result<(), DeliveryError>;
}

/// [`Messenger`] backed by teloxide, with every call bounded by a timeout.
#[derive(Clone)]
pub struct TelegramMessenger {
    bot: ThrottledBot,
    timeout: Duration,
}

impl TelegramMessenger {
    pub fn new(bot: ThrottledBot, timeout: Duration) -> Self {
        Self { bot, timeout }
    }

    pub fn bot(&self) -> &ThrottledBot {
        &self.bot
    }

    /// Await a Bot API request, failing with [`DeliveryError::Timeout`] once
    /// the configured bound elapses.
    pub async fn bounded<R, T>(&self, request: R) -> Result<T, DeliveryError>
    where
        R: IntoFuture<Output = Result<T, RequestError>>,
    {
        match tokio::time::timeout(self.timeout, request).await {
            Ok(result) => Ok(result?),
            Err(_) => Err(DeliveryError::Timeout(self.timeout)),
        }
    }
}

#[async_trait]
impl Messenger for TelegramMessenger {
    async fn send(&self, message: &OutboundMessage) -> Result<(), DeliveryError> {
        let mut request = self
            .bot
            .send_message(message.chat_id, message.text.clone())
            .parse_mode(ParseMode::Html);

        if let Some(keyboard) = &message.keyboard {
            request = request.reply_markup(keyboard.clone());
        }

        let sent = self.bounded(request).await?;
        debug!(chat_id = message.chat_id.0, message_id = sent.id.0, "Message sent");
        Ok(())
    }

    async fn edit_text(
        &self,
        chat_id: ChatId,
        message_id: MessageId,
        text: &str,
    ) -> Result<(), DeliveryError> {
        let request = self
            .bot
            .edit_message_text(chat_id, message_id, text)
            .parse_mode(ParseMode::Html);

        self.bounded(request).await?;
        debug!(chat_id = chat_id.0, message_id = message_id.0, "Message edited");
        Ok(())
    }

    async fn answer_callback(&self, query_id: &str) -> Result<(), DeliveryError> {
        self.bounded(self.bot.answer_callback_query(query_id)).await?;
        Ok(())
    }
}

/// Perform `action` through `messenger`.
///
/// A callback that cannot be answered does not prevent the edit; only the
/// edit's own failure is returned.
pub async fn execute(messenger: &dyn Messenger, action: &OutboundAction) -> Result<(), DeliveryError> {
    match action {
        OutboundAction::Send(message) => messenger.send(message).await,
        OutboundAction::EditText {
            chat_id,
            message_id,
            text,
            callback_id,
        } => {
            if let Some(query_id) = callback_id {
                if let Err(err) = messenger.answer_callback(query_id).await {
                    warn!(error = %err, query_id = %query_id, "Failed to answer callback query");
                }
            }
            messenger.edit_text(*chat_id, *message_id, text).await
        }
    }
}
