// src/services/fetcher.rs

//! Feed fetcher service.
//!
//! Downloads the registry CSV export with bounded retries, falling through
//! alternate URLs and then an alternate transport before giving up.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use scraper::{Html, Selector};
use tokio::process::Command;

use crate::error::{AppError, Result};
use crate::models::FeedConfig;
use crate::utils::http::{snippet, text_if_success};

/// One way of issuing a GET request.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Short name used in log lines.
    fn name(&self) -> &str;

    /// Return the body of a 2xx response, or a fetch error.
    async fn get(&self, url: &str) -> Result<String>;
}

/// Transport backed by the shared reqwest client.
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    fn name(&self) -> &str {
        "http"
    }

    async fn get(&self, url: &str) -> Result<String> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| AppError::fetch(url, e))?;
        text_if_success(response)
            .await
            .map_err(|message| AppError::fetch(url, message))
    }
}

/// Transport that shells out to a curl-compatible program.
pub struct CurlTransport {
    program: String,
    timeout_secs: u64,
    user_agent: String,
}

impl CurlTransport {
    pub fn new(config: &FeedConfig) -> Self {
        Self {
            program: config.curl_program.clone(),
            timeout_secs: config.timeout_secs,
            user_agent: config.user_agent.clone(),
        }
    }
}

#[async_trait]
impl Transport for CurlTransport {
    fn name(&self) -> &str {
        "curl"
    }

    async fn get(&self, url: &str) -> Result<String> {
        let output = Command::new(&self.program)
            .arg("--silent")
            .arg("--show-error")
            .arg("--location")
            .arg("--fail")
            .arg("--compressed")
            .arg("--max-time")
            .arg(self.timeout_secs.to_string())
            .arg("--user-agent")
            .arg(&self.user_agent)
            .arg(url)
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| AppError::fetch(url, format!("cannot run {}: {e}", self.program)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(AppError::fetch(
                url,
                format!("{} exited with {}: {}", self.program, output.status, stderr.trim()),
            ));
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

/// Fetches the feed payload from the configured candidates.
pub struct FeedFetcher {
    transports: Vec<Box<dyn Transport>>,
    urls: Vec<String>,
    max_attempts: usize,
    retry_delay: Duration,
    min_payload_bytes: usize,
    expected_tokens: Vec<String>,
    attempts: AtomicUsize,
}

impl FeedFetcher {
    /// Create a fetcher over explicit transports, tried in order.
    pub fn new(config: &FeedConfig, transports: Vec<Box<dyn Transport>>) -> Self {
        Self {
            transports,
            urls: config.candidate_urls().map(str::to_string).collect(),
            max_attempts: config.max_attempts.max(1),
            retry_delay: Duration::from_millis(config.retry_delay_ms),
            min_payload_bytes: config.min_payload_bytes,
            expected_tokens: config
                .expected_header_tokens
                .iter()
                .map(|t| t.trim().to_lowercase())
                .filter(|t| !t.is_empty())
                .collect(),
            attempts: AtomicUsize::new(0),
        }
    }

    /// HTTP client first, then curl when enabled.
    pub fn from_config(config: &FeedConfig, client: Client) -> Self {
        let mut transports: Vec<Box<dyn Transport>> = vec![Box::new(HttpTransport::new(client))];
        if config.curl_fallback {
            transports.push(Box::new(CurlTransport::new(config)));
        }
        Self::new(config, transports)
    }

    /// Number of attempts made by the latest `fetch` call.
    pub fn attempts_made(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    /// Fetch and validate the feed, trying every transport and URL.
    pub async fn fetch(&self) -> Result<String> {
        self.attempts.store(0, Ordering::SeqCst);
        let mut last_error = String::from("no transport configured");

        for transport in &self.transports {
            for url in &self.urls {
                for attempt in 1..=self.max_attempts {
                    self.attempts.fetch_add(1, Ordering::SeqCst);
                    log::debug!(
                        "[{}] GET {} (attempt {}/{})",
                        transport.name(),
                        url,
                        attempt,
                        self.max_attempts
                    );

                    let result = transport
                        .get(url)
                        .await
                        .and_then(|body| self.validate(url, body));

                    match result {
                        Ok(body) => {
                            log::info!(
                                "Fetched {} bytes from {} via {}",
                                body.len(),
                                url,
                                transport.name()
                            );
                            return Ok(body);
                        }
                        Err(error) => {
                            log::warn!(
                                "[{}] attempt {}/{} failed: {}",
                                transport.name(),
                                attempt,
                                self.max_attempts,
                                error
                            );
                            last_error = error.to_string();
                        }
                    }

                    if attempt < self.max_attempts && !self.retry_delay.is_zero() {
                        tokio::time::sleep(self.retry_delay * attempt as u32).await;
                    }
                }
            }
        }

        Err(AppError::FetchExhausted {
            attempts: self.attempts_made(),
            last_error,
        })
    }

    /// Reject payloads that are too small, HTML, or lack a recognizable header.
    fn validate(&self, url: &str, body: String) -> Result<String> {
        let text = body.trim_start_matches('\u{feff}');

        if text.len() < self.min_payload_bytes {
            return Err(AppError::fetch(
                url,
                format!(
                    "payload too short ({} bytes, need {})",
                    text.len(),
                    self.min_payload_bytes
                ),
            ));
        }

        if looks_like_html(text) {
            let title = html_title(text).unwrap_or_else(|| "untitled".to_string());
            return Err(AppError::fetch(
                url,
                format!("received HTML page '{title}' instead of CSV"),
            ));
        }

        let header = text.lines().next().unwrap_or_default().to_lowercase();
        if !self.expected_tokens.is_empty()
            && !self.expected_tokens.iter().any(|t| header.contains(t))
        {
            return Err(AppError::fetch(
                url,
                format!("no expected header token in first line: {}", snippet(&header, 120)),
            ));
        }

        Ok(body)
    }
}

fn looks_like_html(text: &str) -> bool {
    let head: String = text.trim_start().chars().take(512).collect::<String>().to_lowercase();
    head.starts_with('<') && (head.contains("<html") || head.contains("<!doctype"))
}

fn html_title(text: &str) -> Option<String> {
    let document = Html::parse_document(text);
    let selector = Selector::parse("title").ok()?;
    let title: String = document.select(&selector).next()?.text().collect();
    let title = title.split_whitespace().collect::<Vec<_>>().join(" ");
    (!title.is_empty()).then_some(title)
}
