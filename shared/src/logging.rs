//! Shared logging utilities for consistent tracing across the primary and workers

use chrono::{DateTime, Utc};
use tracing::{error, info};

use crate::types::{ProcessIdentity, ProcessRole};

/// Build the env-filter directive for a process role
pub fn filter_for(role: ProcessRole, base_level: &str) -> String {
    match role {
        ProcessRole::Primary => format!("primary={base_level},shared={base_level}"),
        ProcessRole::Worker => format!("worker={base_level},shared={base_level}"),
    }
}

/// Initialize the tracing subscriber for the current process.
///
/// Uses the global identity, so `ProcessIdentity::init_*` must run first.
/// `RUST_LOG` overrides the computed filter when set.
pub fn init_tracing_with_level(log_level: Option<&str>) {
    use tracing_subscriber::{fmt, EnvFilter};

    let identity = ProcessIdentity::current();
    let base_level = log_level.unwrap_or("info");

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter_for(identity.role, base_level)));

    let result = fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .try_init();

    if let Err(e) = result {
        eprintln!("Tracing already initialized: {e}");
    }
}

/// Get formatted timestamp for consistent logging
pub fn format_timestamp() -> String {
    let now: DateTime<Utc> = Utc::now();
    now.format("%H:%M:%S%.3f").to_string()
}

/// Macro for process-aware info logging
#[macro_export]
macro_rules! process_info {
    ($process:expr, $($arg:tt)*) => {
        tracing::info!(
            process = %$process,
            timestamp = $crate::logging::format_timestamp(),
            $($arg)*
        );
    };
}

/// Macro for process-aware warning logging
#[macro_export]
macro_rules! process_warn {
    ($process:expr, $($arg:tt)*) => {
        tracing::warn!(
            process = %$process,
            timestamp = $crate::logging::format_timestamp(),
            $($arg)*
        );
    };
}

/// Macro for process-aware error logging
#[macro_export]
macro_rules! process_error {
    ($process:expr, $($arg:tt)*) => {
        tracing::error!(
            process = %$process,
            timestamp = $crate::logging::format_timestamp(),
            $($arg)*
        );
    };
}

/// Macro for process-aware debug logging
#[macro_export]
macro_rules! process_debug {
    ($process:expr, $($arg:tt)*) => {
        tracing::debug!(
            process = %$process,
            timestamp = $crate::logging::format_timestamp(),
            $($arg)*
        );
    };
}

/// Contextual logging helper for startup messages
pub fn log_startup(process: &ProcessIdentity, details: &str) {
    info!(
        process = %process,
        timestamp = format_timestamp(),
        "🚀 Starting {}",
        details
    );
}

/// Contextual logging helper for shutdown messages
pub fn log_shutdown(process: &ProcessIdentity, reason: &str) {
    info!(
        process = %process,
        timestamp = format_timestamp(),
        "🛑 Shutting down: {}",
        reason
    );
}

/// Contextual logging helper for error conditions
pub fn log_error(process: &ProcessIdentity, context: &str, error: &dyn std::fmt::Display) {
    error!(
        process = %process,
        timestamp = format_timestamp(),
        error = %error,
        "❌ {} failed: {}",
        context,
        error
    );
}

/// Contextual logging helper for success conditions
pub fn log_success(process: &ProcessIdentity, message: &str) {
    info!(
        process = %process,
        timestamp = format_timestamp(),
        "✅ {}",
        message
    );
}
