//! Logging infrastructure for the loader and query runner.
//!
//! All events are emitted through `tracing` with target "flight_aggregation"
//! and carry an `event` field for filtering.
//!
//! ## Library Integration
//!
//! The library never initializes a global subscriber. The binary installs a
//! `tracing_subscriber` formatter; embedders configure their own.
//!
//! ## Conventions
//!
//! - `event`: snake_case event name (required)
//! - `component`: subsystem (e.g., "loader", "query", "store")
//! - Use `%` for Display, `?` for Debug formatting

/// Target for all crate log events.
pub(crate) const LOG_TARGET: &str = "flight_aggregation";

/// Macro for info-level log events.
///
/// # Example
/// ```ignore
/// log_info!(
///     component = "loader",
///     event = "index_ready",
///     index = %spec.index_name,
/// );
/// ```
macro_rules! log_info {
    ($($field:tt)*) => {
        ::tracing::info!(target: $crate::observability::LOG_TARGET, $($field)*)
    };
}

/// Macro for debug-level log events.
macro_rules! log_debug {
    ($($field:tt)*) => {
        ::tracing::debug!(target: $crate::observability::LOG_TARGET, $($field)*)
    };
}

/// Macro for warn-level log events.
macro_rules! log_warn {
    ($($field:tt)*) => {
        ::tracing::warn!(target: $crate::observability::LOG_TARGET, $($field)*)
    };
}

/// Macro for error-level log events.
macro_rules! log_error {
    ($($field:tt)*) => {
        ::tracing::error!(target: $crate::observability::LOG_TARGET, $($field)*)
    };
}

pub(crate) use log_debug;
pub(crate) use log_error;
pub(crate) use log_info;
pub(crate) use log_warn;
