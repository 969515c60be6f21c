//! Application configuration structures.

use std::fs;
use std::path::Path;

use chrono::FixedOffset;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{AppError, Result};

/// Root application configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Upstream feed location and fetch behavior
    #[serde(default)]
    pub feed: FeedConfig,

    /// Header aliases and category matching
    #[serde(default)]
    pub parser: ParserConfig,

    /// Chat delivery behavior
    #[serde(default)]
    pub notify: NotifyConfig,

    /// Display timezone and status-ping window
    #[serde(default)]
    pub status: StatusConfig,

    /// Snapshot location
    #[serde(default)]
    pub storage: StorageConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Validate configuration values for basic sanity.
    pub fn validate(&self) -> Result<()> {
        if self.feed.primary_url.trim().is_empty() {
            return Err(AppError::config("feed.primary_url is empty"));
        }
        for url in self.feed.candidate_urls() {
            let parsed = Url::parse(url)?;
            if !matches!(parsed.scheme(), "http" | "https") {
                return Err(AppError::config(format!(
                    "feed url {url} must use http or https"
                )));
            }
        }
        if self.feed.user_agent.trim().is_empty() {
            return Err(AppError::config("feed.user_agent is empty"));
        }
        if self.feed.timeout_secs == 0 {
            return Err(AppError::config("feed.timeout_secs must be > 0"));
        }
        if self.feed.max_attempts == 0 {
            return Err(AppError::config("feed.max_attempts must be > 0"));
        }
        if self.feed.curl_fallback && self.feed.curl_program.trim().is_empty() {
            return Err(AppError::config(
                "feed.curl_program is empty while curl_fallback is enabled",
            ));
        }
        if self.parser.keywords.is_empty() && self.parser.category_labels.is_empty() {
            return Err(AppError::config(
                "parser.keywords and parser.category_labels are both empty",
            ));
        }
        if self.parser.aliases.certificate_number.is_empty() {
            return Err(AppError::config(
                "parser.aliases.certificate_number must list at least one header",
            ));
        }
        if self.notify.max_attempts == 0 {
            return Err(AppError::config("notify.max_attempts must be > 0"));
        }
        if let Some(hour) = self.status.hours.iter().find(|h| **h > 23) {
            return Err(AppError::config(format!(
                "status.hours contains {hour}, expected 0..=23"
            )));
        }
        self.status.offset()?;
        if self.storage.snapshot_path.trim().is_empty() {
            return Err(AppError::config("storage.snapshot_path is empty"));
        }
        Ok(())
    }
}

/// Feed location and retry behavior.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedConfig {
    /// CSV export URL tried first
    #[serde(default = "defaults::primary_url")]
    pub primary_url: String,

    /// Alternate URLs tried in order after the primary
    #[serde(default)]
    pub fallback_urls: Vec<String>,

    /// User-Agent header for HTTP requests
    #[serde(default = "defaults::user_agent")]
    pub user_agent: String,

    /// Connect + read timeout in seconds (the registry is slow)
    #[serde(default = "defaults::feed_timeout")]
    pub timeout_secs: u64,

    /// Attempts per URL per transport
    #[serde(default = "defaults::attempts")]
    pub max_attempts: usize,

    /// Base delay between attempts; attempt n waits n times this
    #[serde(default = "defaults::feed_retry_delay")]
    pub retry_delay_ms: u64,

    /// Payloads shorter than this are rejected
    #[serde(default = "defaults::min_payload_bytes")]
    pub min_payload_bytes: usize,

    /// At least one of these must appear in the first line (case-insensitive)
    #[serde(default = "defaults::expected_header_tokens")]
    pub expected_header_tokens: Vec<String>,

    /// Retry all URLs through the curl program after the HTTP client gives up
    #[serde(default = "defaults::curl_fallback")]
    pub curl_fallback: bool,

    /// Program used for the alternate transport
    #[serde(default = "defaults::curl_program")]
    pub curl_program: String,
}

impl FeedConfig {
    /// Primary URL followed by the fallbacks.
    pub fn candidate_urls(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.primary_url.as_str())
            .chain(self.fallback_urls.iter().map(String::as_str))
    }
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            primary_url: defaults::primary_url(),
            fallback_urls: Vec::new(),
            user_agent: defaults::user_agent(),
            timeout_secs: defaults::feed_timeout(),
            max_attempts: defaults::attempts(),
            retry_delay_ms: defaults::feed_retry_delay(),
            min_payload_bytes: defaults::min_payload_bytes(),
            expected_header_tokens: defaults::expected_header_tokens(),
            curl_fallback: defaults::curl_fallback(),
            curl_program: defaults::curl_program(),
        }
    }
}

/// Parsing and category-matching settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParserConfig {
    /// Device-type labels accepted verbatim
    #[serde(default = "defaults::category_labels")]
    pub category_labels: Vec<String>,

    /// Device-type substrings accepted case-insensitively
    #[serde(default = "defaults::keywords")]
    pub keywords: Vec<String>,

    /// Rows with fewer fields are malformed
    #[serde(default = "defaults::min_fields")]
    pub min_fields: usize,

    /// Accepted source headers per logical field
    #[serde(default)]
    pub aliases: FieldAliases,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            category_labels: defaults::category_labels(),
            keywords: defaults::keywords(),
            min_fields: defaults::min_fields(),
            aliases: FieldAliases::default(),
        }
    }
}

/// Ordered header aliases for each logical record field.
///
/// Aliases are compared against normalized headers (trimmed, lowercased, unquoted).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldAliases {
    #[serde(default = "defaults::certificate_aliases")]
    pub certificate_number: Vec<String>,
    #[serde(default = "defaults::trade_name_aliases")]
    pub trade_name: Vec<String>,
    #[serde(default = "defaults::model_aliases")]
    pub model_code: Vec<String>,
    #[serde(default = "defaults::device_type_aliases")]
    pub device_type: Vec<String>,
    #[serde(default = "defaults::company_aliases")]
    pub company_name: Vec<String>,
}

impl Default for FieldAliases {
    fn default() -> Self {
        Self {
            certificate_number: defaults::certificate_aliases(),
            trade_name: defaults::trade_name_aliases(),
            model_code: defaults::model_aliases(),
            device_type: defaults::device_type_aliases(),
            company_name: defaults::company_aliases(),
        }
    }
}

/// Chat delivery settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotifyConfig {
    /// Attempts per message
    #[serde(default = "defaults::attempts")]
    pub max_attempts: usize,

    /// Fixed delay between attempts of one message
    #[serde(default = "defaults::notify_retry_delay")]
    pub retry_delay_ms: u64,

    /// Pause between consecutive messages (downstream rate limit)
    #[serde(default = "defaults::message_interval")]
    pub message_interval_ms: u64,

    /// Chat API parse mode
    #[serde(default = "defaults::parse_mode")]
    pub parse_mode: String,

    /// Free-text fields are cut to this many characters
    #[serde(default = "defaults::max_field_chars")]
    pub max_field_chars: usize,
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            max_attempts: defaults::attempts(),
            retry_delay_ms: defaults::notify_retry_delay(),
            message_interval_ms: defaults::message_interval(),
            parse_mode: defaults::parse_mode(),
            max_field_chars: defaults::max_field_chars(),
        }
    }
}

/// Display timezone and status-ping window.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusConfig {
    /// Local hours in which a "nothing new" ping is sent
    #[serde(default = "defaults::status_hours")]
    pub hours: Vec<u32>,

    /// Display offset from UTC in minutes (IST is +330)
    #[serde(default = "defaults::utc_offset_minutes")]
    pub utc_offset_minutes: i32,

    /// Label appended to rendered timestamps
    #[serde(default = "defaults::timezone_label")]
    pub timezone_label: String,
}

impl StatusConfig {
    /// The configured display offset.
    pub fn offset(&self) -> Result<FixedOffset> {
        let seconds = self.utc_offset_minutes.saturating_mul(60);
        let in_range = self.utc_offset_minutes.abs() <= 14 * 60;
        in_range.then(|| FixedOffset::east_opt(seconds)).flatten().ok_or_else(|| {
            AppError::config(format!(
                "status.utc_offset_minutes {} is out of range",
                self.utc_offset_minutes
            ))
        })
    }
}

impl Default for StatusConfig {
    fn default() -> Self {
        Self {
            hours: defaults::status_hours(),
            utc_offset_minutes: defaults::utc_offset_minutes(),
            timezone_label: defaults::timezone_label(),
        }
    }
}

/// Snapshot persistence settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Relative path of the snapshot JSON file
    #[serde(default = "defaults::snapshot_path")]
    pub snapshot_path: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            snapshot_path: defaults::snapshot_path(),
        }
    }
}

mod defaults {
    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    // Feed defaults
    pub fn primary_url() -> String {
        "https://mocheck.nbtc.go.th/search-equipments/export.csv".into()
    }
    pub fn user_agent() -> String {
        "Mozilla/5.0 (compatible; certwatch/0.1)".into()
    }
    pub fn feed_timeout() -> u64 {
        120
    }
    pub fn attempts() -> usize {
        3
    }
    pub fn feed_retry_delay() -> u64 {
        5_000
    }
    pub fn min_payload_bytes() -> usize {
        200
    }
    pub fn expected_header_tokens() -> Vec<String> {
        strings(&["certificate", "cert", "model", "brand", "type", "เลขที่", "รุ่น"])
    }
    pub fn curl_fallback() -> bool {
        true
    }
    pub fn curl_program() -> String {
        "curl".into()
    }

    // Parser defaults
    pub fn category_labels() -> Vec<String> {
        strings(&[
            "Cellular Mobile (GSM/WCDMA/LTE/NR)",
            "Cellular Mobile (GSM/WCDMA/LTE)",
        ])
    }
    pub fn keywords() -> Vec<String> {
        strings(&[
            "cellular", "mobile", "gsm", "lte", "wcdma", "umts", "5g", "nr",
        ])
    }
    pub fn min_fields() -> usize {
        3
    }
    pub fn certificate_aliases() -> Vec<String> {
        strings(&[
            "certificate_no",
            "certificate no",
            "certificate number",
            "certificate_number",
            "cert_no",
            "cert no",
            "certno",
            "เลขที่ใบรับรอง",
        ])
    }
    pub fn trade_name_aliases() -> Vec<String> {
        strings(&[
            "trade_name",
            "trade name",
            "tradename",
            "brand",
            "ชื่อทางการค้า",
            "ยี่ห้อ",
        ])
    }
    pub fn model_aliases() -> Vec<String> {
        strings(&["model_code", "model code", "model", "รุ่น"])
    }
    pub fn device_type_aliases() -> Vec<String> {
        strings(&[
            "device_type",
            "device type",
            "equipment_type",
            "equipment type",
            "sub_type",
            "type",
            "ประเภทย่อยเครื่องโทรคมนาคม",
            "ประเภท",
        ])
    }
    pub fn company_aliases() -> Vec<String> {
        strings(&[
            "company_name",
            "company name",
            "company",
            "applicant",
            "ผู้ยื่นคำขอ",
            "บริษัท",
        ])
    }

    // Notify defaults
    pub fn notify_retry_delay() -> u64 {
        2_000
    }
    pub fn message_interval() -> u64 {
        1_500
    }
    pub fn parse_mode() -> String {
        "Markdown".into()
    }
    pub fn max_field_chars() -> usize {
        200
    }

    // Status defaults
    pub fn status_hours() -> Vec<u32> {
        vec![5, 6]
    }
    pub fn utc_offset_minutes() -> i32 {
        330
    }
    pub fn timezone_label() -> String {
        "IST".into()
    }

    // Storage defaults
    pub fn snapshot_path() -> String {
        "known_devices.json".into()
    }
}
