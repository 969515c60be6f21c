//! Pipeline entry points for watch runs.
//!
//! - `Watch::run`: one fetch-detect-notify-persist cycle
//! - `Watch::run_and_report`: the same, with a failure message on fatal errors
//! - `manage`: operator commands (export, delete, resend) over the snapshot

pub mod diff;
pub mod manage;
pub mod run;
pub mod status;

pub use diff::{ChangeSet, detect_changes};
pub use manage::{ResendReport, delete_record, export_csv, resend, select_for_resend};
pub use run::{RunReport, Watch};
pub use status::{HourWindow, StatusPolicy};
