//! Certified device record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One certified device entry from the registry feed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Record {
    /// Stable identifier used for set membership (the certificate number)
    pub id: String,

    /// Certificate number as printed in the feed
    #[serde(default)]
    pub certificate_number: String,

    /// Brand / trade name
    #[serde(default)]
    pub trade_name: String,

    /// Model code
    #[serde(default)]
    pub model_code: String,

    /// Equipment category label
    #[serde(default)]
    pub device_type: String,

    /// Applicant company
    #[serde(default)]
    pub company_name: String,

    /// When this process observed the row (not sourced from the feed)
    #[serde(default = "Utc::now")]
    pub discovered_at: DateTime<Utc>,
}

impl Record {
    /// Record carrying only an id, used when reading a legacy id list.
    pub fn from_id(id: impl Into<String>, discovered_at: DateTime<Utc>) -> Self {
        Self {
            id: id.into(),
            certificate_number: String::new(),
            trade_name: String::new(),
            model_code: String::new(),
            device_type: String::new(),
            company_name: String::new(),
            discovered_at,
        }
    }

    /// Trade name, falling back to the model code.
    pub fn display_name(&self) -> &str {
        if self.trade_name.is_empty() {
            &self.model_code
        } else {
            &self.trade_name
        }
    }

    /// Case-insensitive substring match over the descriptive fields.
    pub fn matches(&self, needle: &str) -> bool {
        let needle = needle.to_lowercase();
        [
            &self.trade_name,
            &self.model_code,
            &self.company_name,
            &self.device_type,
            &self.certificate_number,
        ]
        .iter()
        .any(|field| field.to_lowercase().contains(&needle))
    }
}
