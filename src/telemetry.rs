//! Tracing/logging initialization.
//!
//! The ledger emits `tracing` events for every mutating operation; hosts
//! that do not install their own subscriber can call [`init`].

use tracing_subscriber::EnvFilter;

/// Initialize tracing/logging for the process, filtered by `RUST_LOG`
/// (default `info`).
///
/// Safe to call multiple times (subsequent calls are no-ops).
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}
