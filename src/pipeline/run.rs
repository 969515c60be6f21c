// src/pipeline/run.rs

//! Watch pipeline: fetch, parse, detect, notify, persist.

use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::error::{AppError, Result};
use crate::models::{NotifyConfig, Record};
use crate::services::{
    FeedFetcher, MessageFormatter, Notifier, ParseStats, RecordParser, deliver_with_retry,
};
use crate::storage::SnapshotStorage;

use super::diff::detect_changes;
use super::status::StatusPolicy;

/// Collaborators for one run.
pub struct Watch<'a> {
    pub fetcher: &'a FeedFetcher,
    pub parser: &'a RecordParser,
    pub storage: &'a dyn SnapshotStorage,
    pub notifier: &'a dyn Notifier,
    pub formatter: &'a MessageFormatter,
    pub status: &'a dyn StatusPolicy,
    pub notify: &'a NotifyConfig,
}

/// Outcome of a completed run.
#[derive(Debug, Clone, Default)]
pub struct RunReport {
    /// No snapshot existed before this run
    pub baseline: bool,
    /// Records announced as new, in feed order
    pub new_records: Vec<Record>,
    /// Records in the persisted snapshot
    pub total: usize,
    /// Alerts delivered
    pub delivered: usize,
    /// Alerts that exhausted their retries
    pub failed_deliveries: usize,
    /// Previously known ids missing from this feed
    pub removed: usize,
    pub summary_sent: bool,
    pub status_sent: bool,
    /// Fetch attempts made across transports and URLs
    pub fetch_attempts: usize,
    pub parse_stats: ParseStats,
}

impl<'a> Watch<'a> {
    fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.notify.retry_delay_ms)
    }

    fn message_interval(&self) -> Duration {
        Duration::from_millis(self.notify.message_interval_ms)
    }

    async fn deliver(&self, text: &str) -> Result<()> {
        deliver_with_retry(self.notifier, text, self.notify.max_attempts, self.retry_delay()).await
    }

    async fn pause(&self) {
        let interval = self.message_interval();
        if !interval.is_zero() {
            tokio::time::sleep(interval).await;
        }
    }

    /// Run the pipeline once.
    ///
    /// The snapshot is written only after every message has been attempted.
    /// Any error returned leaves the previous snapshot untouched.
    pub async fn run(&self, now: DateTime<Utc>) -> Result<RunReport> {
        log::info!("Loading snapshot from {}", self.storage.location());
        let previous = self.storage.load().await?;
        match &previous {
            Some(records) => log::info!("Snapshot holds {} known record(s)", records.len()),
            None => log::info!("No snapshot found; this run records the baseline"),
        }

        let body = self.fetcher.fetch().await?;
        let fetch_attempts = self.fetcher.attempts_made();

        let output = self.parser.parse(&body, now)?;
        let stats = output.stats;
        log::info!(
            "Parsed {} row(s): {} retained, {} off-category, {} malformed, {} missing fields, {} duplicate(s)",
            stats.rows,
            stats.retained,
            stats.off_category,
            stats.malformed,
            stats.missing_fields,
            stats.duplicates
        );

        let mut current = output.records;
        if let Some(previous) = &previous {
            keep_first_seen(&mut current, previous);
        }

        let changes = detect_changes(previous.as_deref(), &current);
        if !changes.removed.is_empty() {
            log::info!(
                "{} previously known record(s) no longer in the feed",
                changes.removed.len()
            );
        }
        log::info!(
            "{} new record(s), {} known",
            changes.added.len(),
            changes.known
        );

        let mut report = RunReport {
            baseline: changes.baseline,
            total: current.len(),
            removed: changes.removed.len(),
            fetch_attempts,
            parse_stats: stats,
            ..RunReport::default()
        };

        let mut sent_any = false;
        for record in &changes.added {
            if sent_any {
                self.pause().await;
            }
            sent_any = true;
            match self.deliver(&self.formatter.new_record(record)).await {
                Ok(()) => report.delivered += 1,
                Err(error) => {
                    report.failed_deliveries += 1;
                    log::error!("Alert for {} not delivered: {}", record.id, error);
                }
            }
        }

        if sent_any {
            self.pause().await;
        }
        let summary = self.formatter.summary(
            changes.added.len(),
            report.total,
            report.failed_deliveries,
            report.baseline,
        );
        report.summary_sent = self.deliver_logged("summary", &summary).await;

        if !changes.has_new() && self.status.should_ping(now) {
            self.pause().await;
            let ping = self.formatter.status_ping(report.total, now);
            report.status_sent = self.deliver_logged("status", &ping).await;
        }

        self.storage.save(&current).await?;
        log::info!(
            "Saved {} record(s) to {}",
            current.len(),
            self.storage.location()
        );

        report.new_records = changes.added;
        Ok(report)
    }

    /// Run once; on a fatal error, send a best-effort failure report first.
    pub async fn run_and_report(&self, now: DateTime<Utc>) -> Result<RunReport> {
        match self.run(now).await {
            Ok(report) => Ok(report),
            Err(error) => {
                log::error!("Run failed: {}", error);
                if error.is_reportable() {
                    self.report_failure(&error, now).await;
                }
                Err(error)
            }
        }
    }

    /// Send one failure message; its own failure is only logged.
    pub async fn report_failure(&self, error: &AppError, now: DateTime<Utc>) {
        let text = self.formatter.failure(error, now);
        if let Err(e) = self.notifier.send(&text).await {
            log::warn!("Failure report not delivered: {}", e);
        }
    }

    async fn deliver_logged(&self, kind: &str, text: &str) -> bool {
        match self.deliver(text).await {
            Ok(()) => true,
            Err(error) => {
                log::error!("{} message not delivered: {}", kind, error);
                false
            }
        }
    }
}

/// Carry over discovery timestamps for records already in the snapshot.
fn keep_first_seen(current: &mut [Record], previous: &[Record]) {
    let first_seen: HashMap<&str, DateTime<Utc>> = previous
        .iter()
        .map(|r| (r.id.as_str(), r.discovered_at))
        .collect();
    for record in current.iter_mut() {
        if let Some(ts) = first_seen.get(record.id.as_str()) {
            record.discovered_at = *ts;
        }
    }
}
