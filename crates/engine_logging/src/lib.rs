#![deny(missing_docs)]
//! Shared logging utilities for the aggregator workspace.
//!
//! This crate provides the `engine_*` logging macros used across the codebase,
//! a process-wide switch mirroring the `loggingEnabled` setting, and a minimal
//! test initializer for the global logger.

use std::sync::atomic::{AtomicBool, Ordering};

static ENABLED: AtomicBool = AtomicBool::new(true);

/// Turns diagnostic output from the `engine_*` macros on or off.
///
/// Called once at startup from the persisted settings and again whenever the
/// user flips the logging toggle.
pub fn set_enabled(enabled: bool) {
    ENABLED.store(enabled, Ordering::Relaxed);
}

/// Returns whether the `engine_*` macros currently forward to the logger.
pub fn is_enabled() -> bool {
    ENABLED.load(Ordering::Relaxed)
}

/// Logs a trace-level message using the global logging facade.
#[macro_export]
macro_rules! engine_trace {
    ($($arg:tt)*) => {{
        if $crate::is_enabled() {
            log::trace!($($arg)*);
        }
    }};
}

/// Logs an info-level message using the global logging facade.
#[macro_export]
macro_rules! engine_info {
    ($($arg:tt)*) => {{
        if $crate::is_enabled() {
            log::info!($($arg)*);
        }
    }};
}

/// Logs a debug-level message using the global logging facade.
#[macro_export]
macro_rules! engine_debug {
    ($($arg:tt)*) => {{
        if $crate::is_enabled() {
            log::debug!($($arg)*);
        }
    }};
}

/// Logs a warn-level message using the global logging facade.
#[macro_export]
macro_rules! engine_warn {
    ($($arg:tt)*) => {{
        if $crate::is_enabled() {
            log::warn!($($arg)*);
        }
    }};
}

/// Logs an error-level message.
///
/// Errors bypass the enable switch so failures are never silent.
#[macro_export]
macro_rules! engine_error {
    ($($arg:tt)*) => {{
        log::error!($($arg)*);
    }};
}

/// Initializes a simple terminal logger for use in unit tests.
///
/// This safely no-ops if another logger has already been initialized.
pub fn initialize_for_tests() {
    use simplelog::{ColorChoice, CombinedLogger, Config, TermLogger, TerminalMode};

    // Use debug level in debug builds, info in release builds.
    let level = if cfg!(debug_assertions) {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };

    // Ignore the error if a logger was already set by another test.
    let _ = CombinedLogger::init(vec![TermLogger::new(
        level,
        Config::default(),
        TerminalMode::Mixed,
        ColorChoice::Auto,
    )]);
}
