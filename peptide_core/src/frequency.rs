//! Frequency model: the closed set of recurrence rules a cycle can carry.
//!
//! A [`Frequency`] is resolved once per expansion into a [`SlotRule`], which
//! answers "which time slots fire on this date". Resolution is where the
//! deterministic fallbacks live:
//! - Weekly rules with too few days use [`default_weekdays`]
//! - Monthly rules with no dates produce nothing
//! - Unrecognized rules produce nothing (and trip a debug assertion)

use crate::{Error, Result};
use chrono::{Datelike, NaiveDate, NaiveTime, Weekday};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Hour of the single slot used by weekly and monthly rules
const SINGLE_SLOT_HOUR: u32 = 8;

/// Daily slot tables, indexed by times-per-day
const DAILY_SLOTS: [&[u32]; 4] = [&[], &[8], &[8, 20], &[6, 12, 20]];

/// Recurrence rule attached to a cycle
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Frequency {
    Daily {
        times_per_day: u32,
    },
    Weekly {
        times_per_week: u32,
        #[serde(default)]
        days_of_week: Vec<Weekday>,
    },
    Monthly {
        times_per_month: u32,
        #[serde(default)]
        dates_of_month: Vec<u32>,
    },
    /// A tag this build does not know. Stored data may carry one after a
    /// downgrade; it expands to nothing.
    #[serde(other)]
    Unrecognized,
}

/// Time slots that fire for a resolved frequency
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SlotRule {
    EveryDay(Vec<NaiveTime>),
    OnWeekdays(Vec<Weekday>, NaiveTime),
    OnDates(Vec<u32>, NaiveTime),
    Never,
}

impl SlotRule {
    /// Slots on `date`, ascending
    pub fn slots_on(&self, date: NaiveDate) -> &[NaiveTime] {
        match self {
            SlotRule::EveryDay(slots) => slots.as_slice(),
            SlotRule::OnWeekdays(days, time) if days.contains(&date.weekday()) => {
                std::slice::from_ref(time)
            }
            SlotRule::OnDates(dates, time) if dates.contains(&date.day()) => {
                std::slice::from_ref(time)
            }
            _ => &[],
        }
    }
}

/// A correction applied when normalizing a frequency at cycle creation
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FrequencyWarning {
    /// More than three daily doses requested; clamped to three slots
    DailyCountClamped { requested: u32 },
    /// Weekly day list was shorter than times-per-week and was replaced
    WeeklyDaysDefaulted {
        requested: u32,
        given: Vec<Weekday>,
        used: Vec<Weekday>,
    },
    /// Times-per-week disagreed with the day list; the day list wins
    WeeklyCountAdjusted { requested: u32, days: u32 },
    /// Days of month outside 1..=31 were dropped
    MonthlyDatesDropped { dropped: Vec<u32> },
    /// Monthly rule has no dates, so the cycle will never fire
    MonthlyEmpty,
    /// Times-per-month disagreed with the date list; the date list wins
    MonthlyCountAdjusted { requested: u32, dates: u32 },
}

impl fmt::Display for FrequencyWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FrequencyWarning::DailyCountClamped { requested } => {
                write!(f, "{} doses per day requested, using 3", requested)
            }
            FrequencyWarning::WeeklyDaysDefaulted {
                requested,
                given,
                used,
            } => write!(
                f,
                "{} weekly doses need {} days but {} given, using {}",
                requested,
                requested,
                given.len(),
                join_weekdays(used)
            ),
            FrequencyWarning::WeeklyCountAdjusted { requested, days } => write!(
                f,
                "{} weekly doses requested but {} days listed, using {}",
                requested, days, days
            ),
            FrequencyWarning::MonthlyDatesDropped { dropped } => {
                let dropped: Vec<String> = dropped.iter().map(|d| d.to_string()).collect();
                write!(f, "ignoring invalid days of month: {}", dropped.join(", "))
            }
            FrequencyWarning::MonthlyEmpty => {
                f.write_str("monthly frequency has no dates; no doses will be scheduled")
            }
            FrequencyWarning::MonthlyCountAdjusted { requested, dates } => write!(
                f,
                "{} monthly doses requested but {} dates listed, using {}",
                requested, dates, dates
            ),
        }
    }
}

/// Deterministic day set used when a weekly rule lists too few days
///
/// | count | days                 |
/// |-------|----------------------|
/// | 1     | Mon                  |
/// | 2     | Mon, Thu             |
/// | 3     | Mon, Wed, Fri        |
/// | 4     | Mon, Tue, Thu, Fri   |
/// | 5     | Mon–Fri              |
/// | 6     | Mon–Sat              |
/// | 7+    | every day            |
pub fn default_weekdays(count: u32) -> Vec<Weekday> {
    use Weekday::*;
    match count {
        0 => vec![],
        1 => vec![Mon],
        2 => vec![Mon, Thu],
        3 => vec![Mon, Wed, Fri],
        4 => vec![Mon, Tue, Thu, Fri],
        5 => vec![Mon, Tue, Wed, Thu, Fri],
        6 => vec![Mon, Tue, Wed, Thu, Fri, Sat],
        _ => vec![Mon, Tue, Wed, Thu, Fri, Sat, Sun],
    }
}

fn single_slot() -> NaiveTime {
    NaiveTime::from_hms_opt(SINGLE_SLOT_HOUR, 0, 0).unwrap_or(NaiveTime::MIN)
}

fn daily_slots(times_per_day: u32) -> Vec<NaiveTime> {
    let idx = (times_per_day as usize).min(DAILY_SLOTS.len() - 1);
    DAILY_SLOTS[idx]
        .iter()
        .filter_map(|&h| NaiveTime::from_hms_opt(h, 0, 0))
        .collect()
}

fn sorted_weekdays(days: &[Weekday]) -> Vec<Weekday> {
    let mut days = days.to_vec();
    days.sort_by_key(|d| d.num_days_from_monday());
    days.dedup();
    days
}

fn sorted_dates(dates: &[u32]) -> (Vec<u32>, Vec<u32>) {
    let (mut valid, dropped): (Vec<u32>, Vec<u32>) =
        dates.iter().partition(|d| (1..=31).contains(*d));
    valid.sort_unstable();
    valid.dedup();
    (valid, dropped)
}

fn join_weekdays(days: &[Weekday]) -> String {
    days.iter()
        .map(|d| d.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

fn ordinal(n: u32) -> String {
    let suffix = match (n % 10, n % 100) {
        (_, 11..=13) => "th",
        (1, _) => "st",
        (2, _) => "nd",
        (3, _) => "rd",
        _ => "th",
    };
    format!("{}{}", n, suffix)
}

impl Frequency {
    pub fn daily(times_per_day: u32) -> Self {
        Frequency::Daily { times_per_day }
    }

    pub fn weekly(days_of_week: Vec<Weekday>) -> Self {
        Frequency::Weekly {
            times_per_week: days_of_week.len() as u32,
            days_of_week,
        }
    }

    pub fn monthly(dates_of_month: Vec<u32>) -> Self {
        Frequency::Monthly {
            times_per_month: dates_of_month.len() as u32,
            dates_of_month,
        }
    }

    /// Resolve into the slot rule the expander walks with.
    ///
    /// Fallbacks are logged here, once per resolution, not once per day.
    pub fn slot_rule(&self) -> SlotRule {
        match self {
            Frequency::Daily { times_per_day } => SlotRule::EveryDay(daily_slots(*times_per_day)),
            Frequency::Weekly {
                times_per_week,
                days_of_week,
            } => {
                let days = sorted_weekdays(days_of_week);
                if days.is_empty() || days.len() < *times_per_week as usize {
                    let fallback = default_weekdays(*times_per_week);
                    tracing::warn!(
                        "Weekly frequency lists {} day(s) for {} dose(s); using default days [{}]",
                        days.len(),
                        times_per_week,
                        join_weekdays(&fallback)
                    );
                    if fallback.is_empty() {
                        return SlotRule::Never;
                    }
                    SlotRule::OnWeekdays(fallback, single_slot())
                } else {
                    SlotRule::OnWeekdays(days, single_slot())
                }
            }
            Frequency::Monthly { dates_of_month, .. } => {
                let (dates, _) = sorted_dates(dates_of_month);
                if dates.is_empty() {
                    tracing::debug!("Monthly frequency has no dates; nothing to expand");
                    return SlotRule::Never;
                }
                SlotRule::OnDates(dates, single_slot())
            }
            Frequency::Unrecognized => {
                debug_assert!(false, "unrecognized frequency reached the expander");
                tracing::error!("Unrecognized frequency; expanding to no doses");
                SlotRule::Never
            }
        }
    }

    /// Average doses per week, used for total-expected-dose math
    pub fn doses_per_week(&self) -> f64 {
        match self {
            Frequency::Daily { times_per_day } => f64::from(*times_per_day) * 7.0,
            Frequency::Weekly {
                times_per_week,
                days_of_week,
            } => {
                if days_of_week.is_empty() {
                    f64::from(*times_per_week)
                } else {
                    days_of_week.len() as f64
                }
            }
            Frequency::Monthly { dates_of_month, .. } => {
                dates_of_month.len() as f64 * (52.0 / 12.0)
            }
            Frequency::Unrecognized => 0.0,
        }
    }

    /// Canonicalize a user-supplied frequency, reporting every correction.
    ///
    /// After normalization the counts always agree with the day/date lists,
    /// so expansion never needs its fallbacks for cycles created through here.
    pub fn normalized(&self) -> (Frequency, Vec<FrequencyWarning>) {
        let mut warnings = Vec::new();

        let freq = match self {
            Frequency::Daily { times_per_day } => {
                let max = (DAILY_SLOTS.len() - 1) as u32;
                if *times_per_day > max {
                    warnings.push(FrequencyWarning::DailyCountClamped {
                        requested: *times_per_day,
                    });
                }
                Frequency::Daily {
                    times_per_day: (*times_per_day).min(max),
                }
            }
            Frequency::Weekly {
                times_per_week,
                days_of_week,
            } => {
                let days = sorted_weekdays(days_of_week);
                let days = if days.len() < *times_per_week as usize || days.is_empty() {
                    let used = default_weekdays(*times_per_week);
                    warnings.push(FrequencyWarning::WeeklyDaysDefaulted {
                        requested: *times_per_week,
                        given: days,
                        used: used.clone(),
                    });
                    used
                } else {
                    if days.len() != *times_per_week as usize {
                        warnings.push(FrequencyWarning::WeeklyCountAdjusted {
                            requested: *times_per_week,
                            days: days.len() as u32,
                        });
                    }
                    days
                };
                Frequency::weekly(days)
            }
            Frequency::Monthly {
                times_per_month,
                dates_of_month,
            } => {
                let (dates, dropped) = sorted_dates(dates_of_month);
                if !dropped.is_empty() {
                    warnings.push(FrequencyWarning::MonthlyDatesDropped { dropped });
                }
                if dates.is_empty() {
                    warnings.push(FrequencyWarning::MonthlyEmpty);
                } else if dates.len() != *times_per_month as usize {
                    warnings.push(FrequencyWarning::MonthlyCountAdjusted {
                        requested: *times_per_month,
                        dates: dates.len() as u32,
                    });
                }
                Frequency::monthly(dates)
            }
            Frequency::Unrecognized => Frequency::Unrecognized,
        };

        for warning in &warnings {
            tracing::warn!("Frequency corrected: {}", warning);
        }

        (freq, warnings)
    }
}

impl fmt::Display for Frequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Frequency::Daily { times_per_day: 1 } => f.write_str("Once daily"),
            Frequency::Daily { times_per_day: 2 } => f.write_str("Twice daily"),
            Frequency::Daily { times_per_day } => write!(f, "{}x daily", times_per_day),
            Frequency::Weekly {
                times_per_week,
                days_of_week,
            } => {
                if days_of_week.is_empty() {
                    write!(f, "{}x weekly", times_per_week)
                } else {
                    write!(
                        f,
                        "{}x weekly ({})",
                        times_per_week,
                        join_weekdays(&sorted_weekdays(days_of_week))
                    )
                }
            }
            Frequency::Monthly { dates_of_month, .. } => {
                let (dates, _) = sorted_dates(dates_of_month);
                if dates.is_empty() {
                    f.write_str("Monthly (no dates)")
                } else {
                    let dates: Vec<String> = dates.into_iter().map(ordinal).collect();
                    write!(f, "Monthly on the {}", dates.join(", "))
                }
            }
            Frequency::Unrecognized => f.write_str("Unknown frequency"),
        }
    }
}

/// Parses the compact form used on the command line:
/// `daily`, `daily:2`, `weekly:mon,thu`, `weekly:3`, `monthly:1,15`
impl FromStr for Frequency {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim().to_lowercase();
        let (kind, args) = s.split_once(':').unwrap_or((s.as_str(), ""));
        let invalid = |why: &str| Error::InvalidFrequency(format!("{:?}: {}", s, why));

        let list: Vec<&str> = args
            .split(',')
            .map(str::trim)
            .filter(|a| !a.is_empty())
            .collect();

        match kind {
            "daily" => {
                let times_per_day = match list.as_slice() {
                    [] => 1,
                    [n] => n.parse().map_err(|_| invalid("expected a count"))?,
                    _ => return Err(invalid("expected a single count")),
                };
                Ok(Frequency::Daily { times_per_day })
            }
            "weekly" => {
                if let [n] = list.as_slice() {
                    if let Ok(times_per_week) = n.parse::<u32>() {
                        return Ok(Frequency::Weekly {
                            times_per_week,
                            days_of_week: vec![],
                        });
                    }
                }
                let days = list
                    .iter()
                    .map(|d| d.parse::<Weekday>())
                    .collect::<std::result::Result<Vec<_>, _>>()
                    .map_err(|_| invalid("expected weekday names"))?;
                if days.is_empty() {
                    return Err(invalid("expected weekday names or a count"));
                }
                Ok(Frequency::weekly(days))
            }
            "monthly" => {
                let dates = list
                    .iter()
                    .map(|d| d.parse::<u32>())
                    .collect::<std::result::Result<Vec<_>, _>>()
                    .map_err(|_| invalid("expected days of month"))?;
                Ok(Frequency::monthly(dates))
            }
            _ => Err(invalid("expected daily, weekly or monthly")),
        }
    }
}
