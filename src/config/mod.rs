//! Configuration module for docbot.
//!
//! Loads configuration from environment variables.

use std::env;
use std::time::Duration;

use thiserror::Error;
use url::Url;

/// Default link to the pedagogical work spreadsheet.
pub const DEFAULT_PEDAGOGICAL_LINK: &str =
    "https://docs.google.com/spreadsheets/d/1v4xlteVMrNZJ4vp2x3T_FxEFwC_4yUX2/edit?gid=1331177780#gid=1331177780";

/// Default link to the educational work folder.
pub const DEFAULT_EDUCATIONAL_LINK: &str = "https://disk.360.yandex.net/your-working-link";

const DEFAULT_PORT: u16 = 10000;
const DEFAULT_SEND_TIMEOUT_SECS: u64 = 10;
const WEBHOOK_PATH: &str = "webhook";

/// Bot running mode
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum BotMode {
    Polling,
    #[default]
    Webhook,
}

/// Errors raised while reading the environment.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("invalid {name}: {reason}")]
    Invalid { name: &'static str, reason: String },
}

/// Links shown on the main keyboard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentLinks {
    pub pedagogical: Url,
    pub educational: Url,
}

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    // Telegram
    pub bot_token: String,
    pub bot_mode: BotMode,

    /// Full URL Telegram posts updates to (base URL + `/webhook`).
    pub webhook_url: Option<Url>,

    /// Secret echoed by Telegram in `X-Telegram-Bot-Api-Secret-Token`.
    pub webhook_secret: Option<String>,

    // HTTP
    pub port: u16,

    /// Upper bound for a single Bot API call.
    pub send_timeout: Duration,

    pub links: DocumentLinks,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    ///
    /// Blank values are treated as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let bot_token = var("BOT_TOKEN")
            .or_else(|| var("TELEGRAM_TOKEN"))
            .ok_or(ConfigError::Missing("BOT_TOKEN"))?;

        let bot_mode = match var("BOT_MODE").map(|m| m.to_lowercase()).as_deref() {
            None | Some("webhook") => BotMode::Webhook,
            Some("polling") => BotMode::Polling,
            Some(other) => {
                return Err(ConfigError::Invalid {
                    name: "BOT_MODE",
                    reason: format!("expected `webhook` or `polling`, got `{other}`"),
                });
            }
        };

        let webhook_url = var("WEBHOOK_URL")
            .or_else(|| var("RENDER_EXTERNAL_URL"))
            .map(|base| webhook_endpoint(&base))
            .transpose()?;

        // Validate webhook URL is set if mode is webhook
        if bot_mode == BotMode::Webhook && webhook_url.is_none() {
            return Err(ConfigError::Missing("WEBHOOK_URL"));
        }

        let webhook_secret = var("WEBHOOK_SECRET")
            .map(|secret| validate_secret(&secret).map(|()| secret))
            .transpose()?;

        let port = match var("PORT") {
            Some(raw) => raw.parse::<u16>().map_err(|e| ConfigError::Invalid {
                name: "PORT",
                reason: e.to_string(),
            })?,
            None => DEFAULT_PORT,
        };

        let send_timeout = match var("SEND_TIMEOUT_SECS") {
            Some(raw) => match raw.parse::<u64>() {
                Ok(0) => {
                    return Err(ConfigError::Invalid {
                        name: "SEND_TIMEOUT_SECS",
                        reason: "must be greater than zero".to_string(),
                    });
                }
                Ok(secs) => Duration::from_secs(secs),
                Err(e) => {
                    return Err(ConfigError::Invalid {
                        name: "SEND_TIMEOUT_SECS",
                        reason: e.to_string(),
                    });
                }
            },
            None => Duration::from_secs(DEFAULT_SEND_TIMEOUT_SECS),
        };

        let links = DocumentLinks {
            pedagogical: parse_url(
                "PEDAGOGICAL_LINK",
                &var("PEDAGOGICAL_LINK").unwrap_or_else(|| DEFAULT_PEDAGOGICAL_LINK.to_string()),
            )?,
            educational: parse_url(
                "EDUCATIONAL_LINK",
                &var("EDUCATIONAL_LINK").unwrap_or_else(|| DEFAULT_EDUCATIONAL_LINK.to_string()),
            )?,
        };

        Ok(Self {
            bot_token,
            bot_mode,
            webhook_url,
            webhook_secret,
            port,
            send_timeout,
            links,
        })
    }
}

fn parse_url(name: &'static str, raw: &str) -> Result<Url, ConfigError> {
    Url::parse(raw).map_err(|e| ConfigError::Invalid {
        name,
        reason: e.to_string(),
    })
}

/// Accepts either the public base URL or the full webhook URL.
fn webhook_endpoint(base: &str) -> Result<Url, ConfigError> {
    let base = base.trim_end_matches('/');
    if base.ends_with(&format!("/{WEBHOOK_PATH}")) {
        return parse_url("WEBHOOK_URL", base);
    }
    parse_url("WEBHOOK_URL", &format!("{base}/{WEBHOOK_PATH}"))
}

/// Telegram only accepts 1-256 characters from `A-Z`, `a-z`, `0-9`, `_` and `-`.
fn validate_secret(secret: &str) -> Result<(), ConfigError> {
    let valid_chars = secret
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');

    if secret.len() > 256 || !valid_chars {
        return Err(ConfigError::Invalid {
            name: "WEBHOOK_SECRET",
            reason: "expected 1-256 characters of A-Z, a-z, 0-9, _ or -".to_string(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn load(vars: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = load(&[
            ("BOT_TOKEN", "123:abc"),
            ("RENDER_EXTERNAL_URL", "https://docbot.onrender.com"),
        ])
        .unwrap();

        assert_eq!(config.bot_mode, BotMode::Webhook);
        assert_eq!(config.port, 10000);
        assert_eq!(config.send_timeout, Duration::from_secs(10));
        assert_eq!(
            config.webhook_url.unwrap().as_str(),
            "https://docbot.onrender.com/webhook"
        );
        assert_eq!(config.links.pedagogical.as_str(), DEFAULT_PEDAGOGICAL_LINK);
        assert_eq!(config.links.educational.as_str(), DEFAULT_EDUCATIONAL_LINK);
        assert!(config.webhook_secret.is_none());
    }

    #[test]
    fn test_token_fallback_and_missing() {
        let config = load(&[("TELEGRAM_TOKEN", "1:x"), ("BOT_MODE", "polling")]).unwrap();
        assert_eq!(config.bot_token, "1:x");
        assert_eq!(config.bot_mode, BotMode::Polling);

        assert_eq!(
            load(&[("BOT_MODE", "polling")]).unwrap_err(),
            ConfigError::Missing("BOT_TOKEN")
        );
    }

    #[test]
    fn test_webhook_mode_requires_url() {
        assert_eq!(
            load(&[("BOT_TOKEN", "1:x"), ("WEBHOOK_URL", "  ")]).unwrap_err(),
            ConfigError::Missing("WEBHOOK_URL")
        );
    }

    #[test]
    fn test_full_webhook_url_is_kept() {
        let config = load(&[
            ("BOT_TOKEN", "1:x"),
            ("WEBHOOK_URL", "https://example.org/bots/webhook/"),
        ])
        .unwrap();
        assert_eq!(
            config.webhook_url.unwrap().as_str(),
            "https://example.org/bots/webhook"
        );
    }

    #[test]
    fn test_invalid_values() {
        let base = [("BOT_TOKEN", "1:x"), ("BOT_MODE", "polling")];

        let err = load(&[base[0], base[1], ("PORT", "http")]).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { name: "PORT", .. }));

        let err = load(&[base[0], base[1], ("SEND_TIMEOUT_SECS", "0")]).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { name: "SEND_TIMEOUT_SECS", .. }));

        let err = load(&[base[0], base[1], ("WEBHOOK_SECRET", "has spaces")]).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { name: "WEBHOOK_SECRET", .. }));

        let err = load(&[base[0], base[1], ("EDUCATIONAL_LINK", "not a url")]).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { name: "EDUCATIONAL_LINK", .. }));

        let err = load(&[base[0], ("BOT_MODE", "carrier-pigeon")]).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { name: "BOT_MODE", .. }));
    }
}
