//! Inbound update model.
//!
//! Webhook bodies are decoded leniently: only the fields the bot reads are
//! modelled and everything else is ignored, so partial payloads still route.

use serde::Deserialize;
use teloxide::types::{ChatId, MessageId, UpdateKind};
use thiserror::Error;

/// One inbound event the bot knows how to route.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Update {
    /// A text message, possibly a command.
    CommandMessage { chat_id: ChatId, text: String },

    /// A press on an inline button carrying callback data.
    CallbackQuery {
        /// Absent in hand-crafted payloads; without it the query cannot be answered.
        query_id: Option<String>,
        chat_id: ChatId,
        message_id: MessageId,
        data: String,
    },
}

/// Failure to turn a webhook body into an [`Update`].
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("malformed update body: {0}")]
    Json(#[from] serde_json::Error),

    #[error("update is missing required field `{0}`")]
    MissingField(&'static str),
}

#[derive(Debug, Deserialize)]
pub struct RawUpdate {
    pub update_id: Option<i64>,
    message: Option<RawMessage>,
    callback_query: Option<RawCallbackQuery>,
}

#[derive(Debug, Deserialize)]
struct RawMessage {
    chat: Option<RawChat>,
    message_id: Option<i32>,
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawChat {
    id: i64,
}

#[derive(Debug, Deserialize)]
struct RawCallbackQuery {
    id: Option<String>,
    data: Option<String>,
    message: Option<RawMessage>,
}

impl RawUpdate {
    pub fn from_slice(body: &[u8]) -> Result<Self, DecodeError> {
        Ok(serde_json::from_slice(body)?)
    }

    /// Resolve the routable part of the update.
    ///
    /// Returns `Ok(None)` for updates the bot does not react to (non-text
    /// messages, buttons without data, other update kinds).
    pub fn into_update(self) -> Result<Option<Update>, DecodeError> {
        if let Some(message) = self.message {
            let Some(text) = message.text else {
                return Ok(None);
            };
            let chat = message.chat.ok_or(DecodeError::MissingField("message.chat"))?;
            return Ok(Some(Update::CommandMessage {
                chat_id: ChatId(chat.id),
                text,
            }));
        }

        if let Some(query) = self.callback_query {
            let message = query
                .message
                .ok_or(DecodeError::MissingField("callback_query.message"))?;
            let chat = message
                .chat
                .ok_or(DecodeError::MissingField("callback_query.message.chat"))?;
            let message_id = message
                .message_id
                .ok_or(DecodeError::MissingField("callback_query.message.message_id"))?;

            let Some(data) = query.data else {
                return Ok(None);
            };
            return Ok(Some(Update::CallbackQuery {
                query_id: query.id,
                chat_id: ChatId(chat.id),
                message_id: MessageId(message_id),
                data,
            }));
        }

        Ok(None)
    }
}

impl Update {
    /// Convert an update received through long polling.
    pub fn from_telegram(update: &teloxide::types::Update) -> Option<Self> {
        match &update.kind {
            UpdateKind::Message(msg) => Some(Self::CommandMessage {
                chat_id: msg.chat.id,
                text: msg.text()?.to_string(),
            }),
            UpdateKind::CallbackQuery(q) => {
                let msg = q.message.as_ref()?;
                Some(Self::CallbackQuery {
                    query_id: Some(q.id.clone()),
                    chat_id: msg.chat().id,
                    message_id: msg.id(),
                    data: q.data.clone()?,
                })
            }
            _ => None,
        }
    }

    pub fn chat_id(&self) -> ChatId {
        match self {
            Self::CommandMessage { chat_id, .. } | Self::CallbackQuery { chat_id, .. } => *chat_id,
        }
    }
}
