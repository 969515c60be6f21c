//! Runtime settings: file configuration plus chat credentials.

use crate::error::{AppError, Result};
use crate::models::Config;

/// Environment variable holding the bot token.
pub const TOKEN_VAR: &str = "TELEGRAM_BOT_TOKEN";
/// Environment variable holding the target chat id.
pub const CHAT_ID_VAR: &str = "TELEGRAM_CHAT_ID";
/// Optional environment variable overriding the chat API base URL.
pub const API_BASE_VAR: &str = "TELEGRAM_API_BASE";

const DEFAULT_API_BASE: &str = "https://api.telegram.org";

/// Chat endpoint credentials.
#[derive(Clone)]
pub struct Credentials {
    pub bot_token: String,
    pub chat_id: String,
    pub api_base: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("bot_token", &"<redacted>")
            .field("chat_id", &self.chat_id)
            .field("api_base", &self.api_base)
            .finish()
    }
}

impl Credentials {
    /// Read credentials from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read credentials through an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let required = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .ok_or_else(|| AppError::config(format!("{key} is not set")))
        };

        let bot_token = required(TOKEN_VAR)?;
        let chat_id = required(CHAT_ID_VAR)?;
        let api_base = lookup(API_BASE_VAR)
            .map(|v| v.trim().trim_end_matches('/').to_string())
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| DEFAULT_API_BASE.to_string());

        Ok(Self {
            bot_token,
            chat_id,
            api_base,
        })
    }
}

/// Everything a pipeline run needs, resolved once at startup.
#[derive(Debug, Clone)]
pub struct Settings {
    pub config: Config,
    pub credentials: Credentials,
}

impl Settings {
    /// Validate the configuration and pair it with credentials.
    pub fn new(config: Config, credentials: Credentials) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            credentials,
        })
    }
}
