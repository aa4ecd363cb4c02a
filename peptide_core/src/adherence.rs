//! Adherence math for dashboard summaries.
//!
//! This module derives per-cycle progress:
//! - Percent complete: logged / expected, clamped to 0..=100
//! - Current week of the cycle
//! - A segmented bar with round-half-up fill

use crate::cycle::total_weeks;
use crate::{Cycle, DoseInstance, DoseStatus};
use chrono::NaiveDate;
use serde::Serialize;
use uuid::Uuid;

/// Progress snapshot for one cycle
#[derive(Clone, Debug, Serialize, PartialEq)]
pub struct CycleProgress {
    pub cycle_id: Uuid,
    pub substance: String,
    pub doses_logged: u32,
    pub total_expected: u32,
    pub percent: f64,
    pub current_week: u32,
    pub total_weeks: u32,
    pub segments: Vec<bool>,
}

/// `logged / expected` as a percentage in 0..=100. Zero expected reports 0.
pub fn percent_complete(doses_logged: u32, total_expected: u32) -> f64 {
    if total_expected == 0 {
        return 0.0;
    }
    let percent = f64::from(doses_logged) / f64::from(total_expected) * 100.0;
    percent.clamp(0.0, 100.0)
}

/// Whole weeks elapsed since `start`, plus one, clamped to the cycle length
pub fn current_week(start: NaiveDate, end: NaiveDate, today: NaiveDate) -> u32 {
    let elapsed = (today - start).num_days().div_euclid(7) + 1;
    let total = i64::from(total_weeks(start, end));
    elapsed.clamp(1, total) as u32
}

/// Number of filled buckets out of `count`, rounding half up
pub fn filled_segments(percent: f64, count: usize) -> usize {
    if count == 0 || !percent.is_finite() {
        return 0;
    }
    let exact = percent.clamp(0.0, 100.0) * count as f64 / 100.0;
    ((exact + 0.5).floor() as usize).min(count)
}

/// `count` equal buckets, the first [`filled_segments`] of them filled
pub fn segments(percent: f64, count: usize) -> Vec<bool> {
    let filled = filled_segments(percent, count);
    (0..count).map(|i| i < filled).collect()
}

fn build(cycle: &Cycle, logged: u32, expected: u32, today: NaiveDate, bars: usize) -> CycleProgress {
    let percent = percent_complete(logged, expected);
    CycleProgress {
        cycle_id: cycle.id,
        substance: cycle.substance.clone(),
        doses_logged: logged,
        total_expected: expected,
        percent,
        current_week: current_week(cycle.start_date, cycle.end_date, today),
        total_weeks: total_weeks(cycle.start_date, cycle.end_date),
        segments: segments(percent, bars),
    }
}

/// Progress from the cycle's persisted logged counter.
///
/// The expected total is recomputed from the current frequency rather than
/// read from the stored snapshot, so frequency edits are always reflected.
pub fn progress_from_counters(cycle: &Cycle, today: NaiveDate, bars: usize) -> CycleProgress {
    build(cycle, cycle.doses_logged, cycle.expected_total_doses(), today, bars)
}

/// Progress from materialized instances of this cycle.
///
/// Counts logged instances against every live (non-deleted) instance, so the
/// caller should pass the reconciled instances for the whole cycle range.
pub fn progress_from_instances(
    cycle: &Cycle,
    instances: &[DoseInstance],
    today: NaiveDate,
    bars: usize,
) -> CycleProgress {
    let own = instances.iter().filter(|i| i.cycle_id == cycle.id);
    let (total, logged) = own.fold((0u32, 0u32), |(total, logged), i| {
        (total + 1, logged + u32::from(i.status == DoseStatus::Logged))
    });
    build(cycle, logged, total, today, bars)
}
