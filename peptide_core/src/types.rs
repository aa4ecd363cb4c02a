//! Core domain types for the peptide cycle tracker.
//!
//! This module defines the fundamental types used throughout the system:
//! - Cycles (recurring administration plans)
//! - Dose instances and their deterministic identifiers
//! - Persisted dose records (status overrides)
//! - Calendar cells for month views

use crate::frequency::Frequency;
use crate::{Error, Result};
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

// ============================================================================
// Cycle Types
// ============================================================================

/// Lifecycle status of a cycle
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum CycleStatus {
    Active,
    Paused,
    Completed,
}

impl fmt::Display for CycleStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CycleStatus::Active => "active",
            CycleStatus::Paused => "paused",
            CycleStatus::Completed => "completed",
        };
        f.pad(s)
    }
}

/// A recurring administration plan for one substance
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Cycle {
    pub id: Uuid,
    pub substance: String,
    pub dose_amount: String,
    /// Overrides the configured default route when set
    #[serde(default)]
    pub route: Option<String>,
    pub frequency: Frequency,
    pub start_date: NaiveDate,
    /// Inclusive
    pub end_date: NaiveDate,
    pub status: CycleStatus,
    #[serde(default)]
    pub doses_logged: u32,
    #[serde(default)]
    pub total_expected_doses: u32,
    #[serde(default)]
    pub notes: Option<String>,
    /// Protocol template this cycle was batch-created from
    #[serde(default)]
    pub protocol_id: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
}

// ============================================================================
// Dose Types
// ============================================================================

/// Status of a materialized dose instance
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum DoseStatus {
    Scheduled,
    Logged,
    Missed,
}

impl fmt::Display for DoseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DoseStatus::Scheduled => "scheduled",
            DoseStatus::Logged => "logged",
            DoseStatus::Missed => "missed",
        };
        f.pad(s)
    }
}

/// Status as persisted. `Deleted` is a tombstone that hides the instance for good.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum RecordStatus {
    Scheduled,
    Logged,
    Missed,
    Deleted,
}

impl RecordStatus {
    /// The status an instance carries under this record, or None for a tombstone
    pub fn as_dose_status(self) -> Option<DoseStatus> {
        match self {
            RecordStatus::Scheduled => Some(DoseStatus::Scheduled),
            RecordStatus::Logged => Some(DoseStatus::Logged),
            RecordStatus::Missed => Some(DoseStatus::Missed),
            RecordStatus::Deleted => None,
        }
    }
}

impl From<DoseStatus> for RecordStatus {
    fn from(status: DoseStatus) -> Self {
        match status {
            DoseStatus::Scheduled => RecordStatus::Scheduled,
            DoseStatus::Logged => RecordStatus::Logged,
            DoseStatus::Missed => RecordStatus::Missed,
        }
    }
}

/// Deterministic identifier of a dose occurrence.
///
/// Composed as `<cycle-uuid>:<YYYY-MM-DD>:<HHMM>` so the same logical
/// occurrence maps to the same id across independent expansions. Records are
/// matched to instances through this value, so it must never be random.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(transparent)]
pub struct DoseId(String);

impl DoseId {
    pub fn new(cycle_id: Uuid, date: NaiveDate, time: NaiveTime) -> Self {
        DoseId(format!(
            "{}:{}:{}",
            cycle_id,
            date.format("%Y-%m-%d"),
            time.format("%H%M")
        ))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Split the id back into (cycle id, date, time slot)
    pub fn parts(&self) -> Result<(Uuid, NaiveDate, NaiveTime)> {
        let invalid = || Error::InvalidDoseId(self.0.clone());

        let mut pieces = self.0.split(':');
        let (Some(cycle), Some(date), Some(time), None) =
            (pieces.next(), pieces.next(), pieces.next(), pieces.next())
        else {
            return Err(invalid());
        };

        let cycle_id = Uuid::parse_str(cycle).map_err(|_| invalid())?;
        let date = NaiveDate::parse_from_str(date, "%Y-%m-%d").map_err(|_| invalid())?;
        let time = NaiveTime::parse_from_str(time, "%H%M").map_err(|_| invalid())?;

        Ok((cycle_id, date, time))
    }
}

impl fmt::Display for DoseId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for DoseId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let id = DoseId(s.trim().to_string());
        id.parts()?;
        Ok(id)
    }
}

/// One concrete, dated occurrence of a dose
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct DoseInstance {
    pub id: DoseId,
    pub cycle_id: Uuid,
    pub substance: String,
    pub dose_amount: String,
    pub route: String,
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub status: DoseStatus,
}

impl DoseInstance {
    /// Time of day as shown to the user, e.g. `08:00`
    pub fn time_label(&self) -> String {
        self.time.format("%H:%M").to_string()
    }
}

/// A persisted status override for one dose occurrence
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct DoseRecord {
    pub id: DoseId,
    pub cycle_id: Uuid,
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub status: RecordStatus,
    pub updated_at: DateTime<Utc>,
}

impl DoseRecord {
    /// Build a record for `id`, recovering cycle/date/time from the id itself
    pub fn new(id: DoseId, status: RecordStatus, updated_at: DateTime<Utc>) -> Result<Self> {
        let (cycle_id, date, time) = id.parts()?;
        Ok(DoseRecord {
            id,
            cycle_id,
            date,
            time,
            status,
            updated_at,
        })
    }
}

// ============================================================================
// Calendar Types
// ============================================================================

/// One position in the month grid
#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
pub struct CalendarCell {
    pub date: NaiveDate,
    pub is_current_month: bool,
    pub is_today: bool,
    pub is_past: bool,
    pub doses: Vec<DoseInstance>,
}
