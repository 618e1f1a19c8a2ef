//! Tracing/logging initialization.
//!
//! Structured JSON logs filtered via `RUST_LOG`. The sync service and the
//! webhook processors log order numbers and ERP ids as structured fields, so
//! JSON output keeps them queryable in aggregation.

use tracing_subscriber::EnvFilter;

const DEFAULT_FILTER: &str = "info,orderbridge_erp=debug";

/// Initialize tracing/logging for the process.
///
/// Safe to call multiple times (subsequent calls are no-ops).
pub fn init() {
    init_with_filter(DEFAULT_FILTER);
}

/// Initialize with an explicit fallback filter, still overridable by
/// `RUST_LOG`.
pub fn init_with_filter(fallback: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .json()
        .with_timer(tracing_subscriber::fmt::time::SystemTime)
        .with_target(false)
        .try_init();
}
