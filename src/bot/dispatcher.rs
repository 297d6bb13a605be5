//! Update dispatcher.
//!
//! Maps an inbound [`Update`] to the answer the bot should give. [`dispatch`]
//! is pure: the returned [`OutboundAction`] is executed by `bot::messenger`.
//! Polling mode feeds the same function through a teloxide [`Dispatcher`].

use std::sync::Arc;

use teloxide::dispatching::{DefaultKey, Dispatcher, UpdateHandler};
use teloxide::dptree;
use teloxide::types::{ChatId, InlineKeyboardMarkup, MessageId};
use tracing::error;

use super::messenger::{Messenger, ThrottledBot, execute};
use super::update::Update;
use crate::config::DocumentLinks;
use crate::plugins::help::HELP_TEXT;
use crate::plugins::start::{GREETING_TEXT, HELP_CALLBACK, build_main_keyboard};

/// The only command the bot reacts to.
pub const START_COMMAND: &str = "/start";

/// A new message to send. Always formatted as HTML.
#[derive(Debug, Clone, PartialEq)]
pub struct OutboundMessage {
    pub chat_id: ChatId,
    pub text: String,
    pub keyboard: Option<InlineKeyboardMarkup>,
}

/// What the bot does in response to an update.
#[derive(Debug, Clone, PartialEq)]
pub enum OutboundAction {
    Send(OutboundMessage),

    /// Replace the text of an existing message, answering the button press
    /// that triggered it first.
    EditText {
        chat_id: ChatId,
        message_id: MessageId,
        text: String,
        callback_id: Option<String>,
    },
}

/// Decide how to answer `update`.
///
/// Unknown commands and callback data are ignored and yield `None`.
pub fn dispatch(update: &Update, links: &DocumentLinks) -> Option<OutboundAction> {
    match update {
        Update::CommandMessage { chat_id, text } if text == START_COMMAND => {
            Some(OutboundAction::Send(OutboundMessage {
                chat_id: *chat_id,
                text: GREETING_TEXT.to_string(),
                keyboard: Some(build_main_keyboard(links)),
            }))
        }
        Update::CallbackQuery {
            query_id,
            chat_id,
            message_id,
            data,
        } if data == HELP_CALLBACK => Some(OutboundAction::EditText {
            chat_id: *chat_id,
            message_id: *message_id,
            text: HELP_TEXT.to_string(),
            callback_id: query_id.clone(),
        }),
        _ => None,
    }
}

/// Build the long-polling dispatcher.
pub fn build_dispatcher(
    bot: ThrottledBot,
    messenger: Arc<dyn Messenger>,
    links: DocumentLinks,
) -> Dispatcher<ThrottledBot, anyhow::Error, DefaultKey> {
    Dispatcher::builder(bot, schema())
        .dependencies(dptree::deps![messenger, links])
        .enable_ctrlc_handler()
        .build()
}

/// Build the handler schema.
fn schema() -> UpdateHandler<anyhow::Error> {
    dptree::entry().endpoint(handle_polled_update)
}

async fn handle_polled_update(
    update: teloxide::types::Update,
    messenger: Arc<dyn Messenger>,
    links: DocumentLinks,
) -> anyhow::Result<()> {
    let Some(update) = Update::from_telegram(&update) else {
        return Ok(());
    };

    if let Some(action) = dispatch(&update, &links) {
        if let Err(err) = execute(messenger.as_ref(), &action).await {
            error!(chat_id = update.chat_id().0, error = %err, "Failed to deliver response");
        }
    }
    Ok(())
}
