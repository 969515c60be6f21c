//! Change detection against the previous snapshot.
//!
//! Membership is by record id only. When no snapshot exists the current
//! records become the baseline and nothing is reported as new.

use std::collections::HashSet;

use crate::models::Record;

/// Partition of the current records.
#[derive(Debug, Clone, Default)]
pub struct ChangeSet {
    /// No previous snapshot existed
    pub baseline: bool,
    /// Records whose id was not in the previous snapshot, in feed order
    pub added: Vec<Record>,
    /// Current records already known
    pub known: usize,
    /// Previous ids absent from the current feed
    pub removed: Vec<String>,
}

impl ChangeSet {
    /// Check if there are any new records to announce.
    pub fn has_new(&self) -> bool {
        !self.added.is_empty()
    }
}

/// Compare the current records against the previous snapshot.
pub fn detect_changes(previous: Option<&[Record]>, current: &[Record]) -> ChangeSet {
    let Some(previous) = previous else {
        return ChangeSet {
            baseline: true,
            added: Vec::new(),
            known: current.len(),
            removed: Vec::new(),
        };
    };

    let prev_ids: HashSet<&str> = previous.iter().map(|r| r.id.as_str()).collect();
    let curr_ids: HashSet<&str> = current.iter().map(|r| r.id.as_str()).collect();

    let (added, known): (Vec<&Record>, Vec<&Record>) = current
        .iter()
        .partition(|r| !prev_ids.contains(r.id.as_str()));

    let removed = previous
        .iter()
        .filter(|r| !curr_ids.contains(r.id.as_str()))
        .map(|r| r.id.clone())
        .collect();

    ChangeSet {
        baseline: false,
        added: added.into_iter().cloned().collect(),
        known: known.len(),
        removed,
    }
}
