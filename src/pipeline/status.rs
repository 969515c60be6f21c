//! Status-ping trigger.

use chrono::{DateTime, FixedOffset, Utc};

use crate::error::Result;
use crate::models::StatusConfig;
use crate::utils::time::local_hour;

/// Decides whether a "nothing new" status message is due.
pub trait StatusPolicy: Send + Sync {
    fn should_ping(&self, now: DateTime<Utc>) -> bool;
}

/// Fires when the local hour is one of a fixed set.
#[derive(Debug, Clone)]
pub struct HourWindow {
    hours: Vec<u32>,
    offset: FixedOffset,
}

impl HourWindow {
    pub fn new(hours: Vec<u32>, offset: FixedOffset) -> Self {
        Self { hours, offset }
    }

    pub fn from_config(config: &StatusConfig) -> Result<Self> {
        Ok(Self::new(config.hours.clone(), config.offset()?))
    }
}

impl StatusPolicy for HourWindow {
    fn should_ping(&self, now: DateTime<Utc>) -> bool {
        self.hours.contains(&local_hour(now, self.offset))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_default_window_uses_ist_hours() {
        let window = HourWindow::from_config(&StatusConfig::default()).unwrap();

        // 00:00 UTC is 05:30 IST
        assert!(window.should_ping(Utc.with_ymd_and_hms(2026, 10, 14, 0, 0, 0).unwrap()));
        // 01:29 UTC is 06:59 IST
        assert!(window.should_ping(Utc.with_ymd_and_hms(2026, 10, 14, 1, 29, 0).unwrap()));
        // 01:30 UTC is 07:00 IST
        assert!(!window.should_ping(Utc.with_ymd_and_hms(2026, 10, 14, 1, 30, 0).unwrap()));
        // 23:29 UTC is 04:59 IST
        assert!(!window.should_ping(Utc.with_ymd_and_hms(2026, 10, 13, 23, 29, 0).unwrap()));
    }

    #[test]
    fn test_empty_window_never_fires() {
        let window = HourWindow::new(vec![], FixedOffset::east_opt(0).unwrap());
        assert!(!window.should_ping(Utc::now()));
    }
}
