//! Bot runtime - Polling and Webhook runners.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use again::RetryPolicy;
use anyhow::Context as _;
use teloxide::prelude::*;
use teloxide::types::AllowedUpdate;
use teloxide::utils::command::BotCommands;
use tokio::net::TcpListener;
use tracing::{error, info};
use url::Url;

use super::dispatcher::build_dispatcher;
use super::messenger::{DeliveryError, Messenger, TelegramMessenger, ThrottledBot};
use super::webhook::{Readiness, WebhookState, router};
use crate::config::{BotMode, Config};
use crate::plugins::Command;

/// Retries after the first failed initialization attempt.
const INIT_RETRIES: usize = 4;

/// One-time client initialization for webhook mode.
///
/// Confirms the token with `getMe`, publishes the command menu and points
/// Telegram at our webhook. `setWebhook` is idempotent, so this is safe to
/// repeat.
pub struct Startup {
    messenger: TelegramMessenger,
    webhook_url: Url,
    secret: Option<String>,
}

impl Startup {
    pub fn new(bot: ThrottledBot, webhook_url: Url, secret: Option<String>, timeout: Duration) -> Self {
        Self {
            messenger: TelegramMessenger::new(bot, timeout),
            webhook_url,
            secret,
        }
    }

    pub fn webhook_url(&self) -> &Url {
        &self.webhook_url
    }

    pub async fn initialize(&self) -> Result<TelegramMessenger, DeliveryError> {
        let bot = self.messenger.bot();

        let me = self.messenger.bounded(bot.get_me()).await?;
        info!("Bot username: @{}", me.username());

        self.messenger
            .bounded(bot.set_my_commands(Command::bot_commands()))
            .await?;

        let mut request = bot
            .set_webhook(self.webhook_url.clone())
            .allowed_updates(vec![AllowedUpdate::Message, AllowedUpdate::CallbackQuery]);
        if let Some(secret) = &self.secret {
            request = request.secret_token(secret.clone());
        }
        self.messenger.bounded(request).await?;
        info!(url = %self.webhook_url, "🔗 Webhook registered");

        Ok(self.messenger.clone())
    }
}

/// Run the bot with the configured mode.
pub async fn run(config: &Config, bot: ThrottledBot) -> anyhow::Result<()> {
    match config.bot_mode {
        BotMode::Polling => {
            info!("Starting bot in polling mode...");
            run_polling(config, bot).await
        }
        BotMode::Webhook => {
            info!("Starting bot in webhook mode...");
            run_webhook(config, bot).await
        }
    }
}

async fn run_polling(config: &Config, bot: ThrottledBot) -> anyhow::Result<()> {
    let me = bot.get_me().await?;
    info!("Bot username: @{}", me.username());

    bot.set_my_commands(Command::bot_commands()).await?;

    let messenger: Arc<dyn Messenger> = Arc::new(TelegramMessenger::new(bot.clone(), config.send_timeout));
    let mut dispatcher = build_dispatcher(bot, messenger, config.links.clone());
    dispatcher.dispatch().await;
    Ok(())
}

/// Serve the webhook.
///
/// The listener is bound before Telegram is contacted; until initialization
/// succeeds `/webhook` answers 503.
async fn run_webhook(config: &Config, bot: ThrottledBot) -> anyhow::Result<()> {
    let webhook_url = config
        .webhook_url
        .clone()
        .context("WEBHOOK_URL must be set when using webhook mode")?;

    let startup = Arc::new(Startup::new(
        bot,
        webhook_url,
        config.webhook_secret.clone(),
        config.send_timeout,
    ));
    let state = WebhookState::new(config.links.clone(), config.webhook_secret.clone())
        .with_startup(startup.clone());
    if config.webhook_secret.is_some() {
        info!("Webhook secret token configured");
    }

    let address = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = TcpListener::bind(address)
        .await
        .with_context(|| format!("failed to bind {address}"))?;
    info!("📡 Listening on: {}", address);

    let readiness = state.readiness();
    tokio::spawn(async move { initialize_with_retry(&startup, &readiness).await });

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server failed")?;

    info!("Server stopped");
    Ok(())
}

async fn initialize_with_retry(startup: &Startup, readiness: &Readiness) {
    let policy = RetryPolicy::exponential(Duration::from_millis(500))
        .with_jitter(true)
        .with_max_delay(Duration::from_secs(30))
        .with_max_retries(INIT_RETRIES);

    match policy.retry(|| startup.initialize()).await {
        Ok(messenger) => {
            readiness.mark_ready(Arc::new(messenger));
            info!("✅ Webhook setup complete, waiting for updates...");
        }
        Err(err) => error!(
            error = %err,
            "Bot initialization failed; /webhook answers 503 until /setup-webhook succeeds"
        ),
    }
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        error!(error = %err, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutting down...");
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use serde_json::json;
    use teloxide::adaptors::throttle::Limits;
    use tower::ServiceExt;
    use wiremock::matchers::{method, path_regex};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::plugins::test_links;

    const WEBHOOK_URL: &str = "https://docbot.example.org/webhook";

    async fn mock_telegram(server: &MockServer) {
        Mock::given(method("POST"))
            .and(path_regex("(?i)/bot[^/]+/getme"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "ok": true,
                "result": {
                    "id": 987654321,
                    "is_bot": true,
                    "first_name": "DocBot",
                    "username": "doc_bot",
                    "can_join_groups": true,
                    "can_read_all_group_messages": false,
                    "supports_inline_queries": false,
                    "can_connect_to_business": false,
                    "has_main_web_app": false
                }
            })))
            .mount(server)
            .await;

        Mock::given(method("POST"))
            .and(path_regex("(?i)/bot[^/]+/setmycommands"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true, "result": true})))
            .mount(server)
            .await;

        Mock::given(method("POST"))
            .and(path_regex("(?i)/bot[^/]+/setwebhook"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true, "result": true})))
            .expect(1)
            .mount(server)
            .await;
    }

    async fn startup_for(server: &MockServer) -> Arc<Startup> {
        let bot = Bot::new("123456:TEST").set_api_url(server.uri().parse().unwrap());
        Arc::new(Startup::new(
            bot.throttle(Limits::default()),
            WEBHOOK_URL.parse().unwrap(),
            Some("s3cret".to_string()),
            Duration::from_secs(5),
        ))
    }

    #[tokio::test]
    async fn test_initialize_registers_webhook() {
        let server = MockServer::start().await;
        mock_telegram(&server).await;

        let startup = startup_for(&server).await;
        let readiness = Readiness::default();
        initialize_with_retry(&startup, &readiness).await;

        assert!(readiness.messenger().is_some());

        // setWebhook goes out as multipart/form-data
        let requests = server.received_requests().await.unwrap();
        let set_webhook = requests
            .iter()
            .find(|r| r.url.path().to_lowercase().ends_with("/setwebhook"))
            .expect("setWebhook was not called");
        let body = String::from_utf8_lossy(&set_webhook.body);
        assert!(body.contains(r#"name="url""#));
        assert!(body.contains(WEBHOOK_URL));
        assert!(body.contains(r#"name="secret_token""#));
        assert!(body.contains("s3cret"));
    }

    #[tokio::test]
    async fn test_initialize_failure_is_reported() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path_regex("(?i)/bot[^/]+/getme"))
            .respond_with(ResponseTemplate::new(401).set_body_json(json!({
                "ok": false,
                "error_code": 401,
                "description": "Unauthorized"
            })))
            .mount(&server)
            .await;

        let startup = startup_for(&server).await;
        assert!(startup.initialize().await.is_err());
    }

    #[tokio::test]
    async fn test_setup_webhook_route_marks_ready() {
        let server = MockServer::start().await;
        mock_telegram(&server).await;

        let state = WebhookState::new(test_links(), Some("s3cret".to_string()))
            .with_startup(startup_for(&server).await);
        let readiness = state.readiness();
        assert!(readiness.messenger().is_none());

        let response = router(state)
            .oneshot(Request::get("/setup-webhook").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert!(readiness.messenger().is_some());
    }
}
