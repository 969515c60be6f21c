//! Storage abstractions for snapshot persistence.
//!
//! The snapshot is the only durable state between runs: a JSON array of
//! every target-category record seen by the latest successful run.
//!
//! ## Lifecycle
//!
//! ```text
//! (no file) ──first run──▶ known_devices.json ──each run──▶ known_devices.json
//!                          (baseline, no alerts)            (full replace)
//! ```

pub mod local;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::Record;

// Re-export for convenience
pub use local::LocalStorage;

/// Trait for snapshot storage backends.
#[async_trait]
pub trait SnapshotStorage: Send + Sync {
    /// Load the previous snapshot; `None` means no snapshot exists yet.
    async fn load(&self) -> Result<Option<Vec<Record>>>;

    /// Replace the snapshot with the given records.
    async fn save(&self, records: &[Record]) -> Result<()>;

    /// Human-readable location for log lines.
    fn location(&self) -> String;
}
