//! Fixed-timezone timestamp rendering.

use chrono::{DateTime, FixedOffset, Timelike, Utc};

/// Render a timestamp in the display zone, e.g. `2026-10-14 15:30:00 IST`.
pub fn format_in_zone(ts: DateTime<Utc>, offset: FixedOffset, label: &str) -> String {
    let local = ts.with_timezone(&offset);
    let rendered = local.format("%Y-%m-%d %H:%M:%S").to_string();
    if label.is_empty() {
        format!("{} {}", rendered, local.format("%:z"))
    } else {
        format!("{rendered} {label}")
    }
}

/// Hour of day in the display zone.
pub fn local_hour(ts: DateTime<Utc>, offset: FixedOffset) -> u32 {
    ts.with_timezone(&offset).hour()
}
