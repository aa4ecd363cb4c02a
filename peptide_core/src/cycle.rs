//! Cycle lifecycle: creation, edits, pause/resume/complete and counters.
//!
//! Total expected doses is derived from the current frequency and date range
//! by [`expected_total_doses`]. The stored `total_expected_doses` field is a
//! snapshot refreshed on every create and edit, so readers can trust either.

use crate::frequency::{Frequency, FrequencyWarning};
use crate::{Cycle, CycleStatus, DoseStatus, Error, Result};
use chrono::{DateTime, NaiveDate, Utc};
use uuid::Uuid;

/// Length of a date range in weeks, `(end - start) / 7`
pub fn duration_weeks(start: NaiveDate, end: NaiveDate) -> f64 {
    (end - start).num_days().max(0) as f64 / 7.0
}

/// Whole weeks covered by a range, never less than one
pub fn total_weeks(start: NaiveDate, end: NaiveDate) -> u32 {
    (duration_weeks(start, end).ceil() as u32).max(1)
}

/// Whole weeks times doses per week, rounded to a whole dose count
pub fn expected_total_doses(frequency: &Frequency, start: NaiveDate, end: NaiveDate) -> u32 {
    let weeks = duration_weeks(start, end).ceil();
    (weeks * frequency.doses_per_week()).round() as u32
}

/// Parameters for a new cycle
#[derive(Clone, Debug)]
pub struct NewCycle {
    pub substance: String,
    pub dose_amount: String,
    pub frequency: Frequency,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub route: Option<String>,
    pub notes: Option<String>,
    pub protocol_id: Option<String>,
}

impl NewCycle {
    /// Validate and build the cycle.
    ///
    /// Rejects empty names, inverted ranges and unknown frequencies. Frequency
    /// inconsistencies are corrected and returned as warnings for the caller
    /// to show.
    pub fn build(self, now: DateTime<Utc>) -> Result<(Cycle, Vec<FrequencyWarning>)> {
        let substance = self.substance.trim().to_string();
        let dose_amount = self.dose_amount.trim().to_string();

        validate_fields(&substance, &dose_amount, self.start_date, self.end_date)?;
        if self.frequency == Frequency::Unrecognized {
            return Err(Error::InvalidCycle("unrecognized frequency".into()));
        }

        let (frequency, warnings) = self.frequency.normalized();
        let total_expected_doses =
            expected_total_doses(&frequency, self.start_date, self.end_date);

        let cycle = Cycle {
            id: Uuid::new_v4(),
            substance,
            dose_amount,
            route: self.route.filter(|r| !r.trim().is_empty()),
            frequency,
            start_date: self.start_date,
            end_date: self.end_date,
            status: CycleStatus::Active,
            doses_logged: 0,
            total_expected_doses,
            notes: self.notes.filter(|n| !n.trim().is_empty()),
            protocol_id: self.protocol_id,
            created_at: now,
            completed_at: None,
        };

        tracing::info!(
            "Created cycle {} for {} ({}), {} expected doses",
            cycle.id,
            cycle.substance,
            cycle.frequency,
            cycle.total_expected_doses
        );

        Ok((cycle, warnings))
    }
}

/// Partial update applied by [`Cycle::edit`]; `None` leaves a field alone
#[derive(Clone, Debug, Default)]
pub struct CycleEdit {
    pub substance: Option<String>,
    pub dose_amount: Option<String>,
    pub frequency: Option<Frequency>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub notes: Option<String>,
}

fn validate_fields(
    substance: &str,
    dose_amount: &str,
    start: NaiveDate,
    end: NaiveDate,
) -> Result<()> {
    if substance.is_empty() {
        return Err(Error::InvalidCycle("substance name is empty".into()));
    }
    if dose_amount.is_empty() {
        return Err(Error::InvalidCycle("dose amount is empty".into()));
    }
    if end < start {
        return Err(Error::InvalidCycle(format!(
            "end date {} is before start date {}",
            end, start
        )));
    }
    Ok(())
}

impl Cycle {
    /// Expected doses under the current frequency and range
    pub fn expected_total_doses(&self) -> u32 {
        expected_total_doses(&self.frequency, self.start_date, self.end_date)
    }

    pub fn route_or<'a>(&'a self, default_route: &'a str) -> &'a str {
        self.route.as_deref().unwrap_or(default_route)
    }

    pub fn is_completed(&self) -> bool {
        self.status == CycleStatus::Completed
    }

    fn ensure_not_completed(&self, action: &str) -> Result<()> {
        if self.is_completed() {
            return Err(Error::InvalidCycle(format!(
                "cannot {} completed cycle {}",
                action, self.id
            )));
        }
        Ok(())
    }

    /// Active → Paused. Pausing a paused cycle is a no-op.
    pub fn pause(&mut self) -> Result<()> {
        self.ensure_not_completed("pause")?;
        if self.status != CycleStatus::Paused {
            self.status = CycleStatus::Paused;
            tracing::info!("Paused cycle {}", self.id);
        }
        Ok(())
    }

    /// Paused → Active. Resuming an active cycle is a no-op.
    pub fn resume(&mut self) -> Result<()> {
        self.ensure_not_completed("resume")?;
        if self.status != CycleStatus::Active {
            self.status = CycleStatus::Active;
            tracing::info!("Resumed cycle {}", self.id);
        }
        Ok(())
    }

    /// Freeze the cycle. The first completion timestamp is kept.
    pub fn complete(&mut self, now: DateTime<Utc>) {
        if self.is_completed() {
            return;
        }
        self.status = CycleStatus::Completed;
        self.completed_at = Some(now);
        tracing::info!("Completed cycle {}", self.id);
    }

    /// Apply an edit and refresh the expected-dose snapshot
    pub fn edit(&mut self, edit: CycleEdit) -> Result<Vec<FrequencyWarning>> {
        self.ensure_not_completed("edit")?;

        let substance = edit
            .substance
            .map(|s| s.trim().to_string())
            .unwrap_or_else(|| self.substance.clone());
        let dose_amount = edit
            .dose_amount
            .map(|s| s.trim().to_string())
            .unwrap_or_else(|| self.dose_amount.clone());
        let start_date = edit.start_date.unwrap_or(self.start_date);
        let end_date = edit.end_date.unwrap_or(self.end_date);
        validate_fields(&substance, &dose_amount, start_date, end_date)?;

        let (frequency, warnings) = match edit.frequency {
            Some(Frequency::Unrecognized) => {
                return Err(Error::InvalidCycle("unrecognized frequency".into()))
            }
            Some(freq) => freq.normalized(),
            None => (self.frequency.clone(), Vec::new()),
        };

        self.substance = substance;
        self.dose_amount = dose_amount;
        self.start_date = start_date;
        self.end_date = end_date;
        self.frequency = frequency;
        if let Some(notes) = edit.notes {
            self.notes = Some(notes).filter(|n| !n.trim().is_empty());
        }
        self.total_expected_doses = self.expected_total_doses();

        tracing::info!(
            "Edited cycle {}: {} from {} to {}, {} expected doses",
            self.id,
            self.frequency,
            self.start_date,
            self.end_date,
            self.total_expected_doses
        );

        Ok(warnings)
    }

    /// Keep `doses_logged` in step with a dose status transition.
    ///
    /// `None` means "no visible status" (never recorded, or deleted).
    /// Re-logging a logged dose leaves the counter unchanged.
    pub fn apply_status_change(&mut self, before: Option<DoseStatus>, after: Option<DoseStatus>) {
        let was_logged = before == Some(DoseStatus::Logged);
        let is_logged = after == Some(DoseStatus::Logged);

        match (was_logged, is_logged) {
            (false, true) => self.doses_logged += 1,
            (true, false) => self.doses_logged = self.doses_logged.saturating_sub(1),
            _ => {}
        }
    }
}
