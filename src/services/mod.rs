// src/services/mod.rs

//! Service layer for the watcher.
//!
//! This module contains the stage logic for:
//! - Feed download with retry and fallback (`FeedFetcher`)
//! - CSV-to-record parsing (`RecordParser`)
//! - Chat delivery and message templates (`TelegramNotifier`, `MessageFormatter`)

mod fetcher;
mod notifier;
mod parser;

pub use fetcher::{CurlTransport, FeedFetcher, HttpTransport, Transport};
pub use notifier::{MessageFormatter, Notifier, TelegramNotifier, deliver_with_retry};
pub use parser::{CategoryMatcher, ParseOutput, ParseStats, RecordParser, detect_delimiter};
