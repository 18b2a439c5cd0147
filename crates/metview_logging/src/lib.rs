#![deny(missing_docs)]
//! Shared logging utilities for the metview workspace.
//!
//! This crate provides the `met_*` logging macros used across the codebase,
//! the mapping from CLI verbosity to a level filter, and a minimal test
//! initializer for the global logger.

use log::LevelFilter;

/// Logs a trace-level message using the global logging facade.
#[macro_export]
macro_rules! met_trace {
    ($($arg:tt)*) => {{
        log::trace!($($arg)*);
    }};
}

/// Logs a debug-level message using the global logging facade.
#[macro_export]
macro_rules! met_debug {
    ($($arg:tt)*) => {{
        log::debug!($($arg)*);
    }};
}

/// Logs an info-level message using the global logging facade.
#[macro_export]
macro_rules! met_info {
    ($($arg:tt)*) => {{
        log::info!($($arg)*);
    }};
}

/// Logs a warn-level message using the global logging facade.
#[macro_export]
macro_rules! met_warn {
    ($($arg:tt)*) => {{
        log::warn!($($arg)*);
    }};
}

/// Logs an error-level message using the global logging facade.
#[macro_export]
macro_rules! met_error {
    ($($arg:tt)*) => {{
        log::error!($($arg)*);
    }};
}

/// Shifts a base level by a signed verbosity offset.
///
/// Positive values make logging chattier (`-v`), negative values quieter
/// (`-q`). The result saturates at `Off` and `Trace`.
pub fn level_with_verbosity(base: LevelFilter, verbosity: i8) -> LevelFilter {
    const LEVELS: [LevelFilter; 6] = [
        LevelFilter::Off,
        LevelFilter::Error,
        LevelFilter::Warn,
        LevelFilter::Info,
        LevelFilter::Debug,
        LevelFilter::Trace,
    ];
    let current = LEVELS.iter().position(|l| *l == base).unwrap_or(3) as i16;
    let shifted = (current + i16::from(verbosity)).clamp(0, (LEVELS.len() - 1) as i16);
    LEVELS[shifted as usize]
}

/// Parses a level name such as `"info"` or `"debug"` (case-insensitive).
pub fn parse_level(name: &str) -> Option<LevelFilter> {
    name.trim().parse::<LevelFilter>().ok()
}

/// Initializes a simple terminal logger for use in unit tests.
///
/// This safely no-ops if another logger has already been initialized.
pub fn initialize_for_tests() {
    use simplelog::{ColorChoice, CombinedLogger, Config, TermLogger, TerminalMode};

    // Use debug level in debug builds, info in release builds.
    let level = if cfg!(debug_assertions) {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };

    // Ignore the error if a logger was already set by another test.
    let _ = CombinedLogger::init(vec![TermLogger::new(
        level,
        Config::default(),
        TerminalMode::Mixed,
        ColorChoice::Auto,
    )]);
}
