//! docbot - school documents Telegram bot
//!
//! Answers `/start` with a keyboard of document links and the help button
//! with usage instructions.
//!
//! ## Architecture
//!
//! - `config` - Environment configuration
//! - `bot` - Update decoding, dispatch, delivery and the webhook server
//! - `plugins` - Message texts and keyboards

mod bot;
mod config;
mod plugins;

use teloxide::adaptors::throttle::Limits;
use teloxide::prelude::*;
use tracing::info;
use tracing_subscriber::EnvFilter;

use config::Config;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file first (before anything else)
    dotenvy::dotenv().ok();

    // If RUST_LOG is not set, default to "info" level for our crate
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("docbot=info,teloxide=warn"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .init();

    info!("Starting docbot...");

    let config = Config::from_env()?;
    info!("Configuration loaded successfully");
    info!("Bot mode: {:?}", config.bot_mode);

    // Throttle keeps us within Telegram's per-chat and global rate limits
    let bot: bot::ThrottledBot = Bot::new(&config.bot_token).throttle(Limits::default());

    bot::run(&config, bot).await
}
