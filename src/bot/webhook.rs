//! Webhook mode HTTP surface.
//!
//! Routes:
//! - `POST /webhook` - updates pushed by Telegram
//! - `GET /health` - liveness probe
//! - `GET /` - human-readable status
//! - `GET /setup-webhook` - re-run bot initialization and webhook registration

use std::sync::Arc;

use axum::Router;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Json};
use axum::routing::{get, post};
use once_cell::sync::OnceCell;
use serde_json::json;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use super::dispatcher::dispatch;
use super::messenger::{Messenger, execute};
use super::runtime::Startup;
use super::update::{DecodeError, RawUpdate};
use crate::config::DocumentLinks;

/// Header Telegram uses to echo the secret given to `setWebhook`.
pub const SECRET_HEADER: &str = "x-telegram-bot-api-secret-token";

const INDEX_TEXT: &str = "Бот для педагогических документов работает!";

/// Reasons a webhook call is rejected.
#[derive(Debug, Error)]
pub enum WebhookError {
    #[error("bot is not initialized yet")]
    NotReady,

    #[error("secret token mismatch")]
    Unauthorized,

    #[error(transparent)]
    Decode(#[from] DecodeError),
}

impl WebhookError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::NotReady => StatusCode::SERVICE_UNAVAILABLE,
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::Decode(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn body(&self) -> &'static str {
        match self {
            Self::NotReady => "Not ready",
            Self::Unauthorized => "Unauthorized",
            Self::Decode(_) => "Error",
        }
    }
}

/// One-shot holder of the initialized client.
///
/// Empty until startup has talked to Telegram successfully; set at most once.
#[derive(Clone, Default)]
pub struct Readiness(Arc<OnceCell<Arc<dyn Messenger>>>);

impl Readiness {
    /// Store the client. Returns `false` if the bot was already ready.
    pub fn mark_ready(&self, messenger: Arc<dyn Messenger>) -> bool {
        self.0.set(messenger).is_ok()
    }

    pub fn messenger(&self) -> Option<Arc<dyn Messenger>> {
        self.0.get().cloned()
    }
}

/// State shared by all routes.
#[derive(Clone)]
pub struct WebhookState {
    readiness: Readiness,
    links: Arc<DocumentLinks>,
    secret: Option<Arc<str>>,
    startup: Option<Arc<Startup>>,
}

impl WebhookState {
    pub fn new(links: DocumentLinks, secret: Option<String>) -> Self {
        Self {
            readiness: Readiness::default(),
            links: Arc::new(links),
            secret: secret.map(Arc::from),
            startup: None,
        }
    }

    /// Enable `/setup-webhook`.
    pub fn with_startup(mut self, startup: Arc<Startup>) -> Self {
        self.startup = Some(startup);
        self
    }

    pub fn readiness(&self) -> Readiness {
        self.readiness.clone()
    }

    fn authorize(&self, headers: &HeaderMap) -> Result<(), WebhookError> {
        let Some(secret) = self.secret.as_deref() else {
            return Ok(());
        };
        let provided = headers.get(SECRET_HEADER).and_then(|v| v.to_str().ok());
        if provided == Some(secret) {
            Ok(())
        } else {
            Err(WebhookError::Unauthorized)
        }
    }
}

/// Build the HTTP router.
pub fn router(state: WebhookState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/health", get(health))
        .route("/webhook", post(webhook))
        .route("/setup-webhook", get(setup_webhook))
        .with_state(state)
}

/// Handle one update pushed by Telegram.
///
/// Delivery failures are logged and still answered with 200 so Telegram does
/// not redeliver the same update.
pub async fn handle_webhook(
    state: &WebhookState,
    headers: &HeaderMap,
    body: &[u8],
) -> (StatusCode, &'static str) {
    match process(state, headers, body).await {
        Ok(()) => (StatusCode::OK, "OK"),
        Err(err) => {
            match &err {
                WebhookError::NotReady => warn!("Update received before initialization"),
                WebhookError::Unauthorized => warn!("Rejected update with invalid secret token"),
                // Logged inside `process` so the update id is attached
                WebhookError::Decode(_) => {}
            }
            (err.status(), err.body())
        }
    }
}

#[tracing::instrument(skip_all, fields(update_id))]
async fn process(state: &WebhookState, headers: &HeaderMap, body: &[u8]) -> Result<(), WebhookError> {
    let messenger = state.readiness.messenger().ok_or(WebhookError::NotReady)?;
    state.authorize(headers)?;

    let raw = RawUpdate::from_slice(body)
        .inspect_err(|e| error!(error = %e, "Failed to decode update"))?;
    if let Some(update_id) = raw.update_id {
        tracing::Span::current().record("update_id", update_id);
    }
    info!("Received update");

    let update = raw
        .into_update()
        .inspect_err(|e| error!(error = %e, "Failed to decode update"))?;
    let Some(update) = update else {
        debug!("Update carries nothing to route");
        return Ok(());
    };

    let Some(action) = dispatch(&update, &state.links) else {
        debug!(chat_id = update.chat_id().0, "No handler for update");
        return Ok(());
    };

    if let Err(err) = execute(messenger.as_ref(), &action).await {
        error!(chat_id = update.chat_id().0, error = %err, "Failed to deliver response");
    }
    Ok(())
}

async fn webhook(State(state): State<WebhookState>, headers: HeaderMap, body: Bytes) -> impl IntoResponse {
    handle_webhook(&state, &headers, &body).await
}

async fn health() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

async fn index() -> &'static str {
    INDEX_TEXT
}

async fn setup_webhook(State(state): State<WebhookState>) -> impl IntoResponse {
    let Some(startup) = state.startup.as_ref() else {
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({"ok": false, "error": "webhook registration is not configured"})),
        );
    };

    match startup.initialize().await {
        Ok(messenger) => {
            if state.readiness.mark_ready(Arc::new(messenger)) {
                info!("Bot initialized via /setup-webhook");
            }
            (
                StatusCode::OK,
                Json(json!({"ok": true, "url": startup.webhook_url().as_str()})),
            )
        }
        Err(err) => {
            error!(error = %err, "Webhook registration failed");
            (
                StatusCode::BAD_GATEWAY,
                Json(json!({"ok": false, "error": err.to_string()})),
            )
        }
    }
}
