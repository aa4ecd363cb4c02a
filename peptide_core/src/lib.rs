#![forbid(unsafe_code)]

//! Core domain model and scheduling engine for the peptide cycle tracker.
//!
//! This crate provides:
//! - Domain types (cycles, frequencies, dose instances, dose records)
//! - Recurrence expansion and status reconciliation
//! - Month grid and adherence summaries
//! - Protocol templates
//! - Persistence (JSON cycles, JSONL dose log)

pub mod types;
pub mod error;
pub mod config;
pub mod logging;
pub mod frequency;
pub mod cycle;
pub mod expand;
pub mod reconcile;
pub mod calendar;
pub mod adherence;
pub mod protocol;
pub mod store;
pub mod tracker;

// Re-export commonly used types
pub use error::{Error, Result};
pub use types::*;
pub use config::Config;
pub use frequency::{Frequency, FrequencyWarning};
pub use cycle::{CycleEdit, NewCycle};
pub use expand::{expand, expand_all};
pub use reconcile::{reconcile, DoseAction, PastDuePolicy};
pub use calendar::build_grid;
pub use adherence::CycleProgress;
pub use protocol::{default_protocols, find_protocol, ProtocolTemplate};
pub use store::{JsonStore, ScheduleStore};
pub use tracker::{ActionOutcome, Tracker};
