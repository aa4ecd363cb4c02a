//! Recurrence expansion: turn a cycle's frequency into dated dose instances.
//!
//! Expansion is pure. The same cycle and range always produce the same
//! instances, with the same ids, in the same order. Status is always
//! `Scheduled` here; recorded statuses are merged in by the reconciler.

use crate::{Cycle, CycleStatus, DoseId, DoseInstance, DoseStatus};
use chrono::NaiveDate;

/// Expand one cycle over `[range_start, range_end]`.
///
/// The walk is clipped to the cycle's own dates and advances one calendar day
/// at a time, asking the frequency which slots fire on each day. Output is
/// ordered by date, then time. An empty or inverted window yields nothing.
pub fn expand(
    cycle: &Cycle,
    range_start: NaiveDate,
    range_end: NaiveDate,
    default_route: &str,
) -> Vec<DoseInstance> {
    let from = cycle.start_date.max(range_start);
    let to = cycle.end_date.min(range_end);

    if from > to {
        return Vec::new();
    }

    let rule = cycle.frequency.slot_rule();
    let route = cycle.route_or(default_route);
    let mut instances = Vec::new();

    for date in from.iter_days().take_while(|d| *d <= to) {
        for &time in rule.slots_on(date) {
            instances.push(DoseInstance {
                id: DoseId::new(cycle.id, date, time),
                cycle_id: cycle.id,
                substance: cycle.substance.clone(),
                dose_amount: cycle.dose_amount.clone(),
                route: route.to_string(),
                date,
                time,
                status: DoseStatus::Scheduled,
            });
        }
    }

    tracing::debug!(
        "Expanded cycle {} over {}..={}: {} instances",
        cycle.id,
        from,
        to,
        instances.len()
    );

    instances
}

/// Last date a cycle still produces doses for, given its lifecycle status.
///
/// - Active: its end date
/// - Paused: yesterday at the latest, so history stays but nothing is upcoming
/// - Completed: the completion date at the latest
pub fn schedule_end(cycle: &Cycle, today: NaiveDate) -> NaiveDate {
    match cycle.status {
        CycleStatus::Active => cycle.end_date,
        CycleStatus::Paused => {
            let yesterday = today.pred_opt().unwrap_or(today);
            cycle.end_date.min(yesterday)
        }
        CycleStatus::Completed => match cycle.completed_at {
            Some(at) => cycle.end_date.min(at.date_naive()),
            None => cycle.end_date,
        },
    }
}

/// Expand every cycle over the range and merge into a single ordered list.
///
/// Each cycle's window is cut at [`schedule_end`]. Ties on (date, time) are
/// broken by substance then cycle id so the order is total.
pub fn expand_all(
    cycles: &[Cycle],
    range_start: NaiveDate,
    range_end: NaiveDate,
    today: NaiveDate,
    default_route: &str,
) -> Vec<DoseInstance> {
    let mut instances: Vec<DoseInstance> = cycles
        .iter()
        .flat_map(|cycle| {
            let end = range_end.min(schedule_end(cycle, today));
            expand(cycle, range_start, end, default_route)
        })
        .collect();

    instances.sort_by(|a, b| {
        (a.date, a.time, &a.substance, a.cycle_id).cmp(&(b.date, b.time, &b.substance, b.cycle_id))
    });

    instances
}
