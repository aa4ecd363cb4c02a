//! Error types for the peptide_core library.

use std::io;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for peptide_core operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// IO error occurred
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML parsing error
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Configuration validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Cycle definition rejected at creation or edit
    #[error("Invalid cycle: {0}")]
    InvalidCycle(String),

    /// Frequency text could not be parsed
    #[error("Invalid frequency: {0}")]
    InvalidFrequency(String),

    /// Dose identifier is not of the form `<cycle>:<date>:<HHMM>`
    #[error("Invalid dose id: {0}")]
    InvalidDoseId(String),

    /// Protocol template catalog problem
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Calendar date or month does not exist
    #[error("Invalid date: {0}")]
    InvalidDate(String),

    /// Lookup by identifier failed
    #[error("Not found: {0}")]
    NotFound(String),

    /// Persistence layer error
    #[error("Store error: {0}")]
    Store(String),
}
