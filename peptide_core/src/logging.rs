//! Tracing setup shared by the `ptrack` binary and tests.
//!
//! Log lines go to stderr in the compact format. Stdout is reserved for
//! command output, so scripts can parse it while `RUST_LOG=debug` is set.

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Install the global subscriber at INFO.
///
/// `RUST_LOG` takes precedence when set.
pub fn init() {
    init_with_level("info")
}

/// Install the global subscriber with a fallback filter.
///
/// # Arguments
/// * `default_level` - Filter used when `RUST_LOG` is unset or invalid,
///   e.g. `warn` or `peptide_core=debug`
///
/// # Panics
/// Panics if a global subscriber is already installed.
pub fn init_with_level(default_level: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact().with_writer(std::io::stderr))
        .init();
}

/// Debug-level subscriber that writes through the test harness.
///
/// Safe to call from every test; only the first call installs it.
#[cfg(test)]
pub fn init_test() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_env_filter(EnvFilter::new("debug"))
        .try_init();
}
