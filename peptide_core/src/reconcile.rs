//! Status reconciliation: merge expanded instances with persisted records.
//!
//! The reconciler is a pure merge keyed by [`DoseId`]. Records own status;
//! the expander only decides which instances exist.

use crate::{DoseId, DoseInstance, DoseRecord, DoseStatus, RecordStatus};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// What to do with past instances that nobody has acted on
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PastDuePolicy {
    /// Unrecorded instances stay `Scheduled` no matter their date
    #[default]
    LeaveScheduled,
    /// Unrecorded instances dated strictly before today are reported `Missed`
    MarkMissed,
}

/// A user mutation on one dose instance
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DoseAction {
    Log,
    Skip,
    Delete,
    /// Put a dose back to scheduled
    Reset,
}

impl DoseAction {
    pub fn target_status(self) -> RecordStatus {
        match self {
            DoseAction::Log => RecordStatus::Logged,
            DoseAction::Skip => RecordStatus::Missed,
            DoseAction::Delete => RecordStatus::Deleted,
            DoseAction::Reset => RecordStatus::Scheduled,
        }
    }
}

impl fmt::Display for DoseAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DoseAction::Log => "log",
            DoseAction::Skip => "skip",
            DoseAction::Delete => "delete",
            DoseAction::Reset => "reset",
        };
        f.write_str(s)
    }
}

/// Latest record per id.
///
/// Later `updated_at` wins; on equal timestamps the later entry in the slice
/// wins, matching append order in the store.
pub fn latest_records(records: &[DoseRecord]) -> HashMap<&DoseId, &DoseRecord> {
    let mut latest: HashMap<&DoseId, &DoseRecord> = HashMap::with_capacity(records.len());
    for record in records {
        let supersedes = latest
            .get(&record.id)
            .map_or(true, |existing| existing.updated_at <= record.updated_at);
        if supersedes {
            latest.insert(&record.id, record);
        }
    }
    latest
}

/// Merge expanded instances with persisted records.
///
/// - Recorded status wins over the default
/// - Deleted records drop the instance
/// - Unrecorded instances are `Scheduled`, or `Missed` if they are past due
///   and the policy says so
///
/// Input order is preserved.
pub fn reconcile(
    expanded: Vec<DoseInstance>,
    persisted: &[DoseRecord],
    policy: PastDuePolicy,
    today: NaiveDate,
) -> Vec<DoseInstance> {
    let latest = latest_records(persisted);
    let mut dropped = 0usize;

    let result: Vec<DoseInstance> = expanded
        .into_iter()
        .filter_map(|mut instance| {
            instance.status = match latest.get(&instance.id) {
                Some(record) => match record.status.as_dose_status() {
                    Some(status) => status,
                    None => {
                        dropped += 1;
                        return None;
                    }
                },
                None => default_status(&instance, policy, today),
            };
            Some(instance)
        })
        .collect();

    tracing::debug!(
        "Reconciled {} instances against {} records ({} deleted)",
        result.len() + dropped,
        latest.len(),
        dropped
    );

    result
}

fn default_status(instance: &DoseInstance, policy: PastDuePolicy, today: NaiveDate) -> DoseStatus {
    match policy {
        PastDuePolicy::MarkMissed if instance.date < today => DoseStatus::Missed,
        _ => DoseStatus::Scheduled,
    }
}
