// src/pipeline/manage.rs

//! Operator commands over the snapshot: export, delete, resend.

use std::time::Duration;

use crate::error::Result;
use crate::models::{NotifyConfig, Record};
use crate::services::{MessageFormatter, Notifier, deliver_with_retry};
use crate::storage::SnapshotStorage;

const EXPORT_HEADER: &str =
    "certificate_number,trade_name,model_code,device_type,company_name,discovered_at";

/// Render records as CSV with RFC 4180 quoting.
pub fn export_csv(records: &[Record]) -> String {
    let mut out = String::from(EXPORT_HEADER);
    out.push('\n');
    for record in records {
        let discovered = record.discovered_at.to_rfc3339();
        let fields = [
            record.certificate_number.as_str(),
            record.trade_name.as_str(),
            record.model_code.as_str(),
            record.device_type.as_str(),
            record.company_name.as_str(),
            discovered.as_str(),
        ];
        let line: Vec<String> = fields.iter().map(|f| csv_field(f)).collect();
        out.push_str(&line.join(","));
        out.push('\n');
    }
    out
}

fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

/// Remove one record from the snapshot.
///
/// Returns the removed record; the snapshot is rewritten only when it held the id.
pub async fn delete_record(storage: &dyn SnapshotStorage, id: &str) -> Result<Option<Record>> {
    let Some(mut records) = storage.load().await? else {
        return Ok(None);
    };
    let Some(index) = records.iter().position(|r| r.id == id) else {
        return Ok(None);
    };

    let removed = records.remove(index);
    storage.save(&records).await?;
    log::info!("Removed {} from {}", removed.id, storage.location());
    Ok(Some(removed))
}

/// Records to resend: the given id, or the latest discovery batch.
pub fn select_for_resend<'a>(records: &'a [Record], id: Option<&str>) -> Vec<&'a Record> {
    match id {
        Some(id) => records.iter().filter(|r| r.id == id).collect(),
        None => {
            let Some(latest) = records.iter().map(|r| r.discovered_at).max() else {
                return Vec::new();
            };
            records.iter().filter(|r| r.discovered_at == latest).collect()
        }
    }
}

/// Counters for a resend.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResendReport {
    pub delivered: usize,
    pub failed: usize,
}

/// Deliver the alert message for each record, paced like a normal run.
pub async fn resend(
    records: &[&Record],
    notifier: &dyn Notifier,
    formatter: &MessageFormatter,
    notify: &NotifyConfig,
) -> ResendReport {
    let retry_delay = Duration::from_millis(notify.retry_delay_ms);
    let interval = Duration::from_millis(notify.message_interval_ms);
    let mut report = ResendReport::default();

    for (i, record) in records.iter().enumerate() {
        if i > 0 && !interval.is_zero() {
            tokio::time::sleep(interval).await;
        }
        let text = formatter.new_record(record);
        match deliver_with_retry(notifier, &text, notify.max_attempts, retry_delay).await {
            Ok(()) => report.delivered += 1,
            Err(error) => {
                report.failed += 1;
                log::error!("Resend of {} failed: {}", record.id, error);
            }
        }
    }
    report
}
