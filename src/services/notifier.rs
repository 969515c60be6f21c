// src/services/notifier.rs

//! Chat notifier service.
//!
//! Formats records and run outcomes into chat messages and delivers them to
//! the bot API with bounded retries.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, Utc};
use reqwest::Client;
use serde::Serialize;

use crate::error::{AppError, Result};
use crate::models::{Credentials, NotifyConfig, Record, StatusConfig};
use crate::utils::http::{redacted, text_if_success};
use crate::utils::time::format_in_zone;
use crate::utils::{escape_markdown, or_na, truncate_graphemes};

/// A destination for chat messages.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Deliver one message; a non-2xx reply is an error.
    async fn send(&self, text: &str) -> Result<()>;
}

/// JSON body of a sendMessage call.
#[derive(Debug, Serialize)]
struct SendMessage<'a> {
    chat_id: &'a str,
    text: &'a str,
    parse_mode: &'a str,
}

/// Notifier posting to the Telegram bot API.
pub struct TelegramNotifier {
    client: Client,
    endpoint: String,
    chat_id: String,
    parse_mode: String,
}

impl TelegramNotifier {
    pub fn new(client: Client, credentials: &Credentials, parse_mode: &str) -> Self {
        Self {
            client,
            endpoint: format!(
                "{}/bot{}/sendMessage",
                credentials.api_base, credentials.bot_token
            ),
            chat_id: credentials.chat_id.clone(),
            parse_mode: parse_mode.to_string(),
        }
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    async fn send(&self, text: &str) -> Result<()> {
        let body = SendMessage {
            chat_id: &self.chat_id,
            text,
            parse_mode: &self.parse_mode,
        };
        // The endpoint embeds the token, so transport errors are logged without the url.
        let response = self
            .client
            .post(&self.endpoint)
            .json(&body)
            .send()
            .await
            .map_err(|e| AppError::notification(redacted(e)))?;
        text_if_success(response)
            .await
            .map(|_| ())
            .map_err(AppError::notification)
    }
}

/// Deliver one message, retrying with a fixed delay.
pub async fn deliver_with_retry(
    notifier: &dyn Notifier,
    text: &str,
    max_attempts: usize,
    retry_delay: Duration,
) -> Result<()> {
    let max_attempts = max_attempts.max(1);
    let mut last_error = None;

    for attempt in 1..=max_attempts {
        match notifier.send(text).await {
            Ok(()) => return Ok(()),
            Err(error) => {
                log::warn!(
                    "Message delivery attempt {}/{} failed: {}",
                    attempt,
                    max_attempts,
                    error
                );
                last_error = Some(error);
            }
        }
        if attempt < max_attempts && !retry_delay.is_zero() {
            tokio::time::sleep(retry_delay).await;
        }
    }

    Err(last_error.unwrap_or_else(|| AppError::notification("no delivery attempt made")))
}

/// Renders the fixed message templates.
#[derive(Debug, Clone)]
pub struct MessageFormatter {
    offset: FixedOffset,
    zone_label: String,
    max_field_chars: usize,
    markdown: bool,
}

impl MessageFormatter {
    pub fn new(notify: &NotifyConfig, status: &StatusConfig) -> Result<Self> {
        Ok(Self {
            offset: status.offset()?,
            zone_label: status.timezone_label.clone(),
            max_field_chars: notify.max_field_chars.max(1),
            markdown: notify.parse_mode.eq_ignore_ascii_case("markdown"),
        })
    }

    /// Announcement for one newly certified device.
    pub fn new_record(&self, record: &Record) -> String {
        format!(
            "📱 *New cellular device certified*\n\n\
             *Trade name:* {}\n\
             *Model:* {}\n\
             *Certificate:* {}\n\
             *Company:* {}\n\
             *Type:* {}\n\
             *Discovered:* {}",
            self.field(&record.trade_name),
            self.field(&record.model_code),
            self.field(&record.certificate_number),
            self.field(&record.company_name),
            self.field(&record.device_type),
            self.timestamp(record.discovered_at),
        )
    }

    /// Per-run totals.
    pub fn summary(&self, new_count: usize, total: usize, failed: usize, baseline: bool) -> String {
        let mut text = format!(
            "📊 *Run summary*\nNew devices: {new_count}\nTotal tracked: {total}"
        );
        if failed > 0 {
            text.push_str(&format!("\nUndelivered alerts: {failed}"));
        }
        if baseline {
            text.push_str("\nBaseline run: existing devices recorded without alerts.");
        }
        text
    }

    /// "Still alive, nothing new" status message.
    pub fn status_ping(&self, total: usize, now: DateTime<Utc>) -> String {
        format!(
            "✅ *Still watching*\nNo new devices since the last run.\n\
             Tracking {} device(s).\n*Checked:* {}",
            total,
            self.timestamp(now)
        )
    }

    /// Report for a run that could not complete.
    pub fn failure(&self, error: &AppError, now: DateTime<Utc>) -> String {
        format!(
            "⚠️ *Registry watch failed*\n{}\n*At:* {}",
            self.field(&error.to_string()),
            self.timestamp(now)
        )
    }

    /// Connectivity check message.
    pub fn test_message(&self, now: DateTime<Utc>) -> String {
        format!(
            "🧪 *Test notification*\nThe chat endpoint is reachable.\n*Time:* {}",
            self.timestamp(now)
        )
    }

    /// Discovery timestamp in the display zone.
    pub fn timestamp(&self, ts: DateTime<Utc>) -> String {
        format_in_zone(ts, self.offset, &self.zone_label)
    }

    fn field(&self, value: &str) -> String {
        let value = truncate_graphemes(or_na(value), self.max_field_chars);
        if self.markdown {
            escape_markdown(&value)
        } else {
            value
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::sync::Mutex;

    struct FlakyNotifier {
        failures_left: Mutex<usize>,
        sent: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl Notifier for FlakyNotifier {
        async fn send(&self, text: &str) -> Result<()> {
            let mut left = self.failures_left.lock().unwrap();
            if *left > 0 {
                *left -= 1;
                return Err(AppError::notification("status 429 Too Many Requests"));
            }
            self.sent.lock().unwrap().push(text.to_string());
            Ok(())
        }
    }

    fn flaky(failures: usize) -> FlakyNotifier {
        FlakyNotifier {
            failures_left: Mutex::new(failures),
            sent: Mutex::new(Vec::new()),
        }
    }

    fn formatter() -> MessageFormatter {
        MessageFormatter::new(&NotifyConfig::default(), &StatusConfig::default()).unwrap()
    }

    fn record() -> Record {
        Record {
            id: "B1234-56".into(),
            certificate_number: "B1234-56".into(),
            trade_name: "Galaxy_S".into(),
            model_code: "SM-S931B".into(),
            device_type: "Cellular Mobile (GSM/WCDMA/LTE/NR)".into(),
            company_name: String::new(),
            discovered_at: Utc.with_ymd_and_hms(2026, 10, 14, 3, 15, 0).unwrap(),
        }
    }

    #[test]
    fn test_telegram_request_shape() {
        let credentials = Credentials {
            bot_token: "123:abc".into(),
            chat_id: "-1001".into(),
            api_base: "http://localhost:8081".into(),
        };
        let notifier = TelegramNotifier::new(Client::new(), &credentials, "Markdown");
        assert_eq!(
            notifier.endpoint,
            "http://localhost:8081/bot123:abc/sendMessage"
        );

        let body = SendMessage {
            chat_id: &notifier.chat_id,
            text: "hello",
            parse_mode: &notifier.parse_mode,
        };
        assert_eq!(
            serde_json::to_value(&body).unwrap(),
            serde_json::json!({
                "chat_id": "-1001",
                "text": "hello",
                "parse_mode": "Markdown"
            })
        );
    }

    #[tokio::test]
    async fn test_retry_until_success() {
        let notifier = flaky(2);
        deliver_with_retry(&notifier, "hello", 3, Duration::ZERO)
            .await
            .unwrap();
        assert_eq!(notifier.sent.lock().unwrap().as_slice(), ["hello"]);
    }

    #[tokio::test]
    async fn test_retry_gives_up_after_bound() {
        let notifier = flaky(5);
        let result = deliver_with_retry(&notifier, "hello", 3, Duration::ZERO).await;
        assert!(matches!(result, Err(AppError::Notification(_))));
        assert_eq!(*notifier.failures_left.lock().unwrap(), 2);
    }

    #[test]
    fn test_new_record_message() {
        let text = formatter().new_record(&record());
        assert!(text.contains(r"*Trade name:* Galaxy\_S"));
        assert!(text.contains("*Model:* SM-S931B"));
        assert!(text.contains("*Certificate:* B1234-56"));
        assert!(text.contains("*Company:* N/A"));
        assert!(text.contains("*Type:* Cellular Mobile (GSM/WCDMA/LTE/NR)"));
        assert!(text.ends_with("*Discovered:* 2026-10-14 08:45:00 IST"));
    }

    #[test]
    fn test_plain_parse_mode_skips_escaping() {
        let notify = NotifyConfig {
            parse_mode: "HTML".into(),
            ..NotifyConfig::default()
        };
        let fmt = MessageFormatter::new(&notify, &StatusConfig::default()).unwrap();
        assert!(fmt.new_record(&record()).contains("Galaxy_S"));
    }

    #[test]
    fn test_long_fields_are_truncated() {
        let notify = NotifyConfig {
            max_field_chars: 5,
            ..NotifyConfig::default()
        };
        let fmt = MessageFormatter::new(&notify, &StatusConfig::default()).unwrap();
        let mut rec = record();
        rec.company_name = "Thai Samsung Electronics".into();
        assert!(fmt.new_record(&rec).contains("*Company:* Thai …"));
    }

    #[test]
    fn test_summary_message() {
        let fmt = formatter();
        assert_eq!(
            fmt.summary(0, 12, 0, true),
            "📊 *Run summary*\nNew devices: 0\nTotal tracked: 12\n\
             Baseline run: existing devices recorded without alerts."
        );
        assert!(fmt.summary(2, 14, 1, false).contains("Undelivered alerts: 1"));
    }

    #[test]
    fn test_failure_message_escapes_error() {
        let fmt = formatter();
        let now = Utc.with_ymd_and_hms(2026, 10, 14, 0, 0, 0).unwrap();
        let text = fmt.failure(&AppError::parse("no cert_no column"), now);
        assert!(text.contains(r"no cert\_no column"));
        assert!(text.ends_with("2026-10-14 05:30:00 IST"));
    }
}
