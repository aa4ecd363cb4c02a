//! Tracker service: the engine wired to a store.
//!
//! Every query reloads from the store and recomputes. The tracker holds no
//! schedule state between calls, only the store handle and config.

use crate::adherence::{progress_from_counters, progress_from_instances, CycleProgress};
use crate::calendar::{bucket_by_date, build_grid, grid_window};
use crate::cycle::{CycleEdit, NewCycle};
use crate::expand::{expand, expand_all};
use crate::frequency::FrequencyWarning;
use crate::protocol::find_protocol;
use crate::reconcile::{latest_records, reconcile, DoseAction};
use crate::store::ScheduleStore;
use crate::{
    CalendarCell, Config, Cycle, DoseId, DoseInstance, DoseRecord, Error, RecordStatus, Result,
};
use chrono::{DateTime, NaiveDate, Utc};
use uuid::Uuid;

/// Result of a log/skip/delete/reset
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ActionOutcome {
    pub id: DoseId,
    pub status: RecordStatus,
    /// False when the dose already had the requested status
    pub changed: bool,
}

/// Resolve a full or abbreviated cycle id against the known cycles
pub fn resolve_cycle_id(cycles: &[Cycle], needle: &str) -> Result<Uuid> {
    let needle = needle.trim().to_lowercase();
    if needle.is_empty() {
        return Err(Error::NotFound("empty cycle id".into()));
    }

    let matches: Vec<Uuid> = cycles
        .iter()
        .map(|c| c.id)
        .filter(|id| id.to_string().starts_with(&needle))
        .collect();

    match matches.as_slice() {
        [id] => Ok(*id),
        [] => Err(Error::NotFound(format!("cycle {}", needle))),
        _ => Err(Error::NotFound(format!(
            "cycle id '{}' is ambiguous ({} matches)",
            needle,
            matches.len()
        ))),
    }
}

pub struct Tracker<S: ScheduleStore> {
    store: S,
    config: Config,
}

impl<S: ScheduleStore> Tracker<S> {
    pub fn new(store: S, config: Config) -> Self {
        Self { store, config }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    pub fn cycles(&self) -> Result<Vec<Cycle>> {
        self.store.load_cycles()
    }

    pub fn resolve_cycle(&self, needle: &str) -> Result<Uuid> {
        resolve_cycle_id(&self.store.load_cycles()?, needle)
    }

    // ------------------------------------------------------------------
    // Cycle lifecycle
    // ------------------------------------------------------------------

    pub fn add_cycle(
        &mut self,
        draft: NewCycle,
        now: DateTime<Utc>,
    ) -> Result<(Cycle, Vec<FrequencyWarning>)> {
        let (cycle, warnings) = draft.build(now)?;
        self.store.update_cycles(|cycles| {
            cycles.push(cycle.clone());
            Ok(())
        })?;
        Ok((cycle, warnings))
    }

    pub fn apply_protocol(
        &mut self,
        protocol_id: &str,
        start: NaiveDate,
        now: DateTime<Utc>,
    ) -> Result<Vec<Cycle>> {
        let protocol = find_protocol(protocol_id)
            .ok_or_else(|| Error::NotFound(format!("protocol {}", protocol_id)))?;
        let created = protocol.apply(start, now)?;

        self.store.update_cycles(|cycles| {
            cycles.extend(created.iter().cloned());
            Ok(())
        })?;
        Ok(created)
    }

    /// Load, mutate one cycle, save. The closure's error aborts the save.
    fn update_cycle<T>(
        &mut self,
        id: Uuid,
        f: impl FnOnce(&mut Cycle) -> Result<T>,
    ) -> Result<(Cycle, T)> {
        self.store.update_cycles(|cycles| {
            let cycle = cycles
                .iter_mut()
                .find(|c| c.id == id)
                .ok_or_else(|| Error::NotFound(format!("cycle {}", id)))?;

            let value = f(cycle)?;
            Ok((cycle.clone(), value))
        })
    }

    pub fn pause_cycle(&mut self, id: Uuid) -> Result<Cycle> {
        self.update_cycle(id, |c| c.pause()).map(|(c, _)| c)
    }

    pub fn resume_cycle(&mut self, id: Uuid) -> Result<Cycle> {
        self.update_cycle(id, |c| c.resume()).map(|(c, _)| c)
    }

    pub fn complete_cycle(&mut self, id: Uuid, now: DateTime<Utc>) -> Result<Cycle> {
        self.update_cycle(id, |c| {
            c.complete(now);
            Ok(())
        })
        .map(|(c, _)| c)
    }

    /// Edit a cycle and recount its logged doses against the new schedule.
    ///
    /// Logged doses that fall outside the edited dates or slots stop counting.
    pub fn edit_cycle(
        &mut self,
        id: Uuid,
        edit: CycleEdit,
    ) -> Result<(Cycle, Vec<FrequencyWarning>)> {
        let records = self.store.load_dose_records(NaiveDate::MIN, NaiveDate::MAX)?;
        let route = self.config.schedule.default_route.clone();

        self.update_cycle(id, |c| {
            let warnings = c.edit(edit)?;
            let logged = count_logged(c, &records, &route);
            if logged != c.doses_logged {
                tracing::info!(
                    "Cycle {} logged count {} -> {} after edit",
                    c.id,
                    c.doses_logged,
                    logged
                );
                c.doses_logged = logged;
            }
            Ok(warnings)
        })
    }

    pub fn clear_all(&mut self) -> Result<()> {
        self.store.delete_all_cycles()
    }

    // ------------------------------------------------------------------
    // Schedule queries
    // ------------------------------------------------------------------

    /// Reconciled dose instances for every cycle over `[start, end]`
    pub fn schedule(
        &self,
        start: NaiveDate,
        end: NaiveDate,
        today: NaiveDate,
    ) -> Result<Vec<DoseInstance>> {
        if start > end {
            return Ok(Vec::new());
        }

        let cycles = self.store.load_cycles()?;
        let records = self.store.load_dose_records(start, end)?;
        let expanded = expand_all(
            &cycles,
            start,
            end,
            today,
            &self.config.schedule.default_route,
        );

        Ok(reconcile(
            expanded,
            &records,
            self.config.schedule.past_due,
            today,
        ))
    }

    /// 42-cell month grid with doses bucketed per day
    pub fn month_view(&self, year: i32, month: u32, today: NaiveDate) -> Result<Vec<CalendarCell>> {
        let (start, end) = grid_window(year, month)
            .ok_or_else(|| Error::InvalidDate(format!("no such month {}-{:02}", year, month)))?;

        let instances = self.schedule(start, end, today)?;
        let buckets = bucket_by_date(instances);
        Ok(build_grid(year, month, today, &buckets))
    }

    /// Progress per cycle from the stored logged counters
    pub fn progress(&self, today: NaiveDate) -> Result<Vec<CycleProgress>> {
        let segments = self.config.progress.segments;
        Ok(self
            .store
            .load_cycles()?
            .iter()
            .map(|c| progress_from_counters(c, today, segments))
            .collect())
    }

    /// Progress per cycle recounted from reconciled dose history
    pub fn progress_from_history(&self, today: NaiveDate) -> Result<Vec<CycleProgress>> {
        let segments = self.config.progress.segments;
        let route = &self.config.schedule.default_route;
        let cycles = self.store.load_cycles()?;

        cycles
            .iter()
            .map(|cycle| {
                let records = self
                    .store
                    .load_dose_records(cycle.start_date, cycle.end_date)?;
                let instances = reconcile(
                    expand(cycle, cycle.start_date, cycle.end_date, route),
                    &records,
                    self.config.schedule.past_due,
                    today,
                );
                Ok(progress_from_instances(cycle, &instances, today, segments))
            })
            .collect()
    }

    // ------------------------------------------------------------------
    // Dose mutations
    // ------------------------------------------------------------------

    /// Apply a user action to one dose.
    ///
    /// The dose must be one the schedule currently shows: a slot the cycle's
    /// frequency produces, not hidden by a pause or completion, not deleted.
    /// An action whose target matches the displayed status is a no-op.
    pub fn apply_action(
        &mut self,
        id: &DoseId,
        action: DoseAction,
        today: NaiveDate,
    ) -> Result<ActionOutcome> {
        let (cycle_id, date, _) = id.parts()?;

        let cycles = self.store.load_cycles()?;
        let cycle = cycles
            .iter()
            .find(|c| c.id == cycle_id)
            .ok_or_else(|| Error::NotFound(format!("cycle {}", cycle_id)))?;

        let route = &self.config.schedule.default_route;
        let instance = expand_all(std::slice::from_ref(cycle), date, date, today, route)
            .into_iter()
            .find(|i| &i.id == id)
            .ok_or_else(|| Error::NotFound(format!("dose {}", id)))?;

        let records = self.store.load_dose_records(date, date)?;
        let current = reconcile(
            vec![instance],
            &records,
            self.config.schedule.past_due,
            today,
        )
        .pop()
        .map(|i| i.status)
        .ok_or_else(|| Error::NotFound(format!("dose {} was deleted", id)))?;

        let target = action.target_status();
        if RecordStatus::from(current) == target {
            tracing::debug!("Dose {} already {:?}, nothing to {}", id, target, action);
            return Ok(ActionOutcome {
                id: id.clone(),
                status: target,
                changed: false,
            });
        }

        let record = match action {
            DoseAction::Delete => self.store.delete_dose_record(id)?,
            _ => {
                let status = target
                    .as_dose_status()
                    .ok_or_else(|| Error::Store(format!("cannot {} dose {}", action, id)))?;
                self.store.update_dose_status(id, status)?
            }
        };

        let before = Some(current);
        let after = record.status.as_dose_status();
        self.update_cycle(cycle_id, |c| {
            c.apply_status_change(before, after);
            Ok(())
        })?;

        tracing::info!("Dose {}: {}", id, action);

        Ok(ActionOutcome {
            id: id.clone(),
            status: record.status,
            changed: true,
        })
    }
}

/// Logged doses of `cycle` that its current schedule still produces
fn count_logged(cycle: &Cycle, records: &[DoseRecord], route: &str) -> u32 {
    let latest = latest_records(records);
    let logged = expand(cycle, cycle.start_date, cycle.end_date, route)
        .iter()
        .filter(|i| {
            latest
                .get(&i.id)
                .is_some_and(|r| r.status == RecordStatus::Logged)
        })
        .count();
    u32::try_from(logged).unwrap_or(u32::MAX)
}
