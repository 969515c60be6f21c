// src/utils/http.rs

//! HTTP client utilities.

use std::time::Duration;

use crate::error::Result;
use crate::models::FeedConfig;

/// Create the asynchronous HTTP client used for the feed and the chat API.
pub fn create_client(config: &FeedConfig) -> Result<reqwest::Client> {
    let client = reqwest::Client::builder()
        .user_agent(&config.user_agent)
        .connect_timeout(Duration::from_secs(config.timeout_secs))
        .timeout(Duration::from_secs(config.timeout_secs))
        .build()?;
    Ok(client)
}

/// Read a response body, turning a non-2xx status into an error message.
pub async fn text_if_success(response: reqwest::Response) -> std::result::Result<String, String> {
    let status = response.status();
    let body = response.text().await.map_err(redacted)?;
    if status.is_success() {
        Ok(body)
    } else {
        Err(format!("status {}: {}", status, snippet(&body, 200)))
    }
}

/// Error text without the request URL, which may embed a bot token.
pub fn redacted(error: reqwest::Error) -> String {
    error.without_url().to_string()
}

/// First `max` characters of a body, for error messages.
pub fn snippet(body: &str, max: usize) -> String {
    let trimmed = body.trim();
    match trimmed.char_indices().nth(max) {
        Some((idx, _)) => format!("{}…", &trimmed[..idx]),
        None => trimmed.to_string(),
    }
}
