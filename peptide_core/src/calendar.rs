//! Month grid construction and per-date bucketing of dose instances.
//!
//! The grid is always 6 weeks of 7 days, Monday first, so the presentation
//! layer never has to handle a variable row count.

use crate::{CalendarCell, DoseInstance};
use chrono::{Datelike, Duration, NaiveDate};
use std::collections::HashMap;

pub const DAYS_PER_WEEK: usize = 7;
pub const GRID_WEEKS: usize = 6;
pub const GRID_CELLS: usize = DAYS_PER_WEEK * GRID_WEEKS;

/// Dose instances keyed by calendar date, each bucket sorted by time
pub type DoseBuckets = HashMap<NaiveDate, Vec<DoseInstance>>;

fn first_of_month(year: i32, month: u32) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(year, month, 1)
}

fn shift_month(year: i32, month: u32, delta: i32) -> Option<NaiveDate> {
    let index = year * 12 + month as i32 - 1 + delta;
    first_of_month(index.div_euclid(12), index.rem_euclid(12) as u32 + 1)
}

/// Monday on or before the 1st of the month
pub fn grid_start(year: i32, month: u32) -> Option<NaiveDate> {
    let first = first_of_month(year, month)?;
    let leading = first.weekday().num_days_from_monday();
    first.checked_sub_signed(Duration::days(i64::from(leading)))
}

/// The 42 dates shown for a month, or None for an invalid year/month
pub fn grid_dates(year: i32, month: u32) -> Option<Vec<NaiveDate>> {
    let start = grid_start(year, month)?;
    let dates: Vec<NaiveDate> = start.iter_days().take(GRID_CELLS).collect();
    (dates.len() == GRID_CELLS).then_some(dates)
}

/// Date window to expand for a month view.
///
/// Runs from the first day of the previous month through the last day of the
/// next month, which always covers the 42-cell grid.
pub fn grid_window(year: i32, month: u32) -> Option<(NaiveDate, NaiveDate)> {
    first_of_month(year, month)?;
    let start = shift_month(year, month, -1)?;
    let end = shift_month(year, month, 2)?.pred_opt()?;
    Some((start, end))
}

/// Group instances by date for O(1) lookup per cell
pub fn bucket_by_date(instances: impl IntoIterator<Item = DoseInstance>) -> DoseBuckets {
    let mut buckets: DoseBuckets = HashMap::new();
    for instance in instances {
        buckets.entry(instance.date).or_default().push(instance);
    }
    for bucket in buckets.values_mut() {
        bucket.sort_by(|a, b| (a.time, &a.substance).cmp(&(b.time, &b.substance)));
    }
    buckets
}

/// Build the 42-cell grid for `year`/`month`.
///
/// `today` drives the today/past flags and is read fresh on every call.
/// Out-of-month cells still carry their doses. An invalid month yields an
/// empty grid.
pub fn build_grid(
    year: i32,
    month: u32,
    today: NaiveDate,
    buckets: &DoseBuckets,
) -> Vec<CalendarCell> {
    let Some(dates) = grid_dates(year, month) else {
        tracing::warn!("Cannot build calendar grid for {}-{:02}", year, month);
        return Vec::new();
    };

    dates
        .into_iter()
        .map(|date| CalendarCell {
            date,
            is_current_month: date.year() == year && date.month() == month,
            is_today: date == today,
            is_past: date < today,
            doses: buckets.get(&date).cloned().unwrap_or_default(),
        })
        .collect()
}
