//! Local filesystem storage implementation.
//!
//! The snapshot file is written atomically (temp file, then rename) so a run
//! killed mid-write leaves the previous snapshot intact.
//!
//! Two on-disk forms are read:
//!
//! ```text
//! [{"id": "B001", "certificateNumber": "B001", ...}, ...]   # current
//! ["B001", "B002", ...]                                     # legacy id list
//! ```
//!
//! Only the current form is written.

use std::path::PathBuf;

use async_trait::async_trait;
use chrono::Utc;
use serde::Deserialize;
use tokio::io::AsyncWriteExt;

use crate::error::{AppError, Result};
use crate::models::Record;
use crate::storage::SnapshotStorage;

/// Accepted snapshot file layouts.
#[derive(Deserialize)]
#[serde(untagged)]
enum SnapshotFile {
    Records(Vec<Record>),
    Ids(Vec<String>),
}

/// Local filesystem storage backend.
#[derive(Debug, Clone)]
pub struct LocalStorage {
    path: PathBuf,
}

impl LocalStorage {
    /// Create a LocalStorage for the given snapshot file.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Ensure parent directory exists.
    async fn ensure_dir(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        Ok(())
    }

    /// Write bytes atomically (write to temp, then rename).
    async fn write_bytes(&self, bytes: &[u8]) -> Result<()> {
        self.ensure_dir().await?;

        let tmp = self.path.with_extension("tmp");
        let mut file = tokio::fs::File::create(&tmp).await?;
        file.write_all(bytes).await?;
        file.flush().await?;
        file.sync_all().await?;
        drop(file);

        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }

    /// Read bytes, returning None if file doesn't exist.
    async fn read_bytes(&self) -> Result<Option<Vec<u8>>> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(AppError::Io(e)),
        }
    }
}

#[async_trait]
impl SnapshotStorage for LocalStorage {
    async fn load(&self) -> Result<Option<Vec<Record>>> {
        let Some(bytes) = self.read_bytes().await? else {
            log::info!("No snapshot at {}", self.path.display());
            return Ok(None);
        };

        let file: SnapshotFile = serde_json::from_slice(&bytes)
            .map_err(|e| AppError::snapshot(self.path.display().to_string(), e))?;

        let records = match file {
            SnapshotFile::Records(records) => records,
            SnapshotFile::Ids(ids) => {
                log::info!("Converting legacy id list ({} ids)", ids.len());
                let now = Utc::now();
                ids.into_iter().map(|id| Record::from_id(id, now)).collect()
            }
        };

        if let Some(blank) = records.iter().position(|r| r.id.trim().is_empty()) {
            return Err(AppError::snapshot(
                self.path.display().to_string(),
                format!("entry {blank} has an empty id"),
            ));
        }

        Ok(Some(records))
    }

    async fn save(&self, records: &[Record]) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(records)?;
        self.write_bytes(&bytes).await?;
        log::info!(
            "Snapshot: {} records written to {}",
            records.len(),
            self.path.display()
        );
        Ok(())
    }

    fn location(&self) -> String {
        self.path.display().to_string()
    }
}
