//! Built-in protocol templates.
//!
//! A protocol bundles several substances that are usually run together.
//! Applying one creates one cycle per substance, all sharing the same dates.

use crate::cycle::NewCycle;
use crate::frequency::Frequency;
use crate::{Cycle, Error, Result};
use chrono::{DateTime, Duration, NaiveDate, Utc, Weekday};
use once_cell::sync::Lazy;
use std::collections::HashSet;

/// One substance within a protocol
#[derive(Clone, Debug)]
pub struct ProtocolItem {
    pub substance: String,
    pub dose_amount: String,
    pub frequency: Frequency,
}

/// A reusable multi-substance plan
#[derive(Clone, Debug)]
pub struct ProtocolTemplate {
    pub id: String,
    pub name: String,
    pub description: String,
    pub duration_weeks: u32,
    pub items: Vec<ProtocolItem>,
}

/// Cached built-in templates
static DEFAULT_PROTOCOLS: Lazy<Vec<ProtocolTemplate>> = Lazy::new(build_default_protocols);

/// The built-in templates, sorted by id
pub fn default_protocols() -> &'static [ProtocolTemplate] {
    &DEFAULT_PROTOCOLS
}

/// Look up a built-in template by id
pub fn find_protocol(id: &str) -> Option<&'static ProtocolTemplate> {
    DEFAULT_PROTOCOLS.iter().find(|p| p.id == id)
}

fn item(substance: &str, dose_amount: &str, frequency: Frequency) -> ProtocolItem {
    ProtocolItem {
        substance: substance.into(),
        dose_amount: dose_amount.into(),
        frequency,
    }
}

fn build_default_protocols() -> Vec<ProtocolTemplate> {
    use Weekday::*;

    let mut protocols = vec![
        ProtocolTemplate {
            id: "healing_stack".into(),
            name: "Healing Stack".into(),
            description: "BPC-157 twice daily with TB-500 twice weekly".into(),
            duration_weeks: 6,
            items: vec![
                item("BPC-157", "250 mcg", Frequency::daily(2)),
                item("TB-500", "2.5 mg", Frequency::weekly(vec![Mon, Thu])),
            ],
        },
        ProtocolTemplate {
            id: "gh_secretagogue".into(),
            name: "GH Secretagogue".into(),
            description: "Ipamorelin and CJC-1295 (no DAC) once daily before bed".into(),
            duration_weeks: 12,
            items: vec![
                item("Ipamorelin", "200 mcg", Frequency::daily(1)),
                item("CJC-1295 (no DAC)", "100 mcg", Frequency::daily(1)),
            ],
        },
        ProtocolTemplate {
            id: "skin_repair".into(),
            name: "Skin Repair".into(),
            description: "GHK-Cu daily".into(),
            duration_weeks: 8,
            items: vec![item("GHK-Cu", "1 mg", Frequency::daily(1))],
        },
        ProtocolTemplate {
            id: "immune_support".into(),
            name: "Immune Support".into(),
            description: "Thymosin Alpha-1 three times weekly, NAD+ twice monthly".into(),
            duration_weeks: 8,
            items: vec![
                item("Thymosin Alpha-1", "1.5 mg", Frequency::weekly(vec![Mon, Wed, Fri])),
                item("NAD+", "100 mg", Frequency::monthly(vec![1, 15])),
            ],
        },
    ];

    protocols.sort_by(|a, b| a.id.cmp(&b.id));
    protocols
}

impl ProtocolTemplate {
    /// Check the template for structural problems. Empty means valid.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.items.is_empty() {
            errors.push(format!("Protocol '{}' has no items", self.id));
        }
        if self.duration_weeks == 0 {
            errors.push(format!("Protocol '{}' has zero duration", self.id));
        }

        let mut substances = HashSet::new();
        for item in &self.items {
            if !substances.insert(item.substance.as_str()) {
                errors.push(format!(
                    "Protocol '{}' lists '{}' twice",
                    self.id, item.substance
                ));
            }
            let (_, warnings) = item.frequency.normalized();
            if !warnings.is_empty() {
                errors.push(format!(
                    "Protocol '{}' item '{}' has an inconsistent frequency",
                    self.id, item.substance
                ));
            }
        }

        errors
    }

    /// Inclusive end date when started on `start`
    pub fn end_date(&self, start: NaiveDate) -> NaiveDate {
        start + Duration::weeks(i64::from(self.duration_weeks))
    }

    /// Create one active cycle per item, all starting on `start`
    pub fn apply(&self, start: NaiveDate, now: DateTime<Utc>) -> Result<Vec<Cycle>> {
        let errors = self.validate();
        if !errors.is_empty() {
            return Err(Error::Protocol(errors.join("; ")));
        }

        let end = self.end_date(start);
        let cycles = self
            .items
            .iter()
            .map(|item| {
                NewCycle {
                    substance: item.substance.clone(),
                    dose_amount: item.dose_amount.clone(),
                    frequency: item.frequency.clone(),
                    start_date: start,
                    end_date: end,
                    route: None,
                    notes: None,
                    protocol_id: Some(self.id.clone()),
                }
                .build(now)
                .map(|(cycle, _)| cycle)
            })
            .collect::<Result<Vec<_>>>()?;

        tracing::info!(
            "Applied protocol '{}': {} cycles from {} to {}",
            self.id,
            cycles.len(),
            start,
            end
        );

        Ok(cycles)
    }
}

/// Validate every built-in template and check ids are unique
pub fn validate_catalog(protocols: &[ProtocolTemplate]) -> Vec<String> {
    let mut errors = Vec::new();
    let mut ids = HashSet::new();

    for protocol in protocols {
        if !ids.insert(protocol.id.as_str()) {
            errors.push(format!("Duplicate protocol id '{}'", protocol.id));
        }
        errors.extend(protocol.validate());
    }

    errors
}
