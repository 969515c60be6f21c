// src/error.rs

//! Unified error handling for the watcher.

use std::fmt;

use thiserror::Error;

/// Result type alias for watcher operations.
pub type Result<T> = std::result::Result<T, AppError>;

/// Unified application error type.
#[derive(Error, Debug)]
pub enum AppError {
    /// I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP request failed
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML parsing failed
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// URL parsing failed
    #[error("URL parse error: {0}")]
    Url(#[from] url::ParseError),

    /// Missing credentials or invalid configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// A single fetch attempt failed
    #[error("Fetch error for {url}: {message}")]
    Fetch { url: String, message: String },

    /// Every candidate URL and transport failed
    #[error("Feed unavailable after {attempts} attempt(s): {last_error}")]
    FetchExhausted { attempts: usize, last_error: String },

    /// Feed structure could not be parsed
    #[error("Parse error: {0}")]
    Parse(String),

    /// Chat delivery failed
    #[error("Notification error: {0}")]
    Notification(String),

    /// Snapshot file exists but is unusable
    #[error("Snapshot error at {path}: {message}")]
    Snapshot { path: String, message: String },
}

impl AppError {
    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a fetch error with url context.
    pub fn fetch(url: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Fetch {
            url: url.into(),
            message: message.to_string(),
        }
    }

    /// Create a parse error.
    pub fn parse(message: impl Into<String>) -> Self {
        Self::Parse(message.into())
    }

    /// Create a notification error.
    pub fn notification(message: impl fmt::Display) -> Self {
        Self::Notification(message.to_string())
    }

    /// Create a snapshot error.
    pub fn snapshot(path: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Snapshot {
            path: path.into(),
            message: message.to_string(),
        }
    }

    /// Whether a failure of this kind should be reported to the chat before exiting.
    ///
    /// Configuration errors happen before a notifier exists and are never reported.
    pub fn is_reportable(&self) -> bool {
        !matches!(self, Self::Config(_) | Self::Toml(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fetch_error_display() {
        let err = AppError::fetch("https://example.com/feed.csv", "status 503");
        assert_eq!(
            err.to_string(),
            "Fetch error for https://example.com/feed.csv: status 503"
        );
    }

    #[test]
    fn test_config_errors_are_not_reported() {
        assert!(!AppError::config("TELEGRAM_BOT_TOKEN is not set").is_reportable());
        assert!(AppError::parse("feed has 1 line").is_reportable());
        assert!(
            AppError::FetchExhausted {
                attempts: 3,
                last_error: "timeout".into()
            }
            .is_reportable()
        );
    }
}
