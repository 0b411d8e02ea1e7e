//! Logging setup for stencil
//!
//! Library code logs through `tracing` macros. Binaries and tests call [`init`]
//! once to install a fmt subscriber with the configured minimum level.

use std::str::FromStr;

use thiserror::Error;
use tracing::Level;

/// Log levels accepted in configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Trace = 0,
    Debug = 1,
    Info = 2,
    Warn = 3,
    Error = 4,
}

impl LogLevel {
    /// Convert to string
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Trace => "TRACE",
            LogLevel::Debug => "DEBUG",
            LogLevel::Info => "INFO",
            LogLevel::Warn => "WARN",
            LogLevel::Error => "ERROR",
        }
    }

    fn as_tracing_level(self) -> Level {
        match self {
            LogLevel::Trace => Level::TRACE,
            LogLevel::Debug => Level::DEBUG,
            LogLevel::Info => Level::INFO,
            LogLevel::Warn => Level::WARN,
            LogLevel::Error => Level::ERROR,
        }
    }
}

impl FromStr for LogLevel {
    type Err = LoggingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "TRACE" => Ok(LogLevel::Trace),
            "DEBUG" => Ok(LogLevel::Debug),
            "INFO" => Ok(LogLevel::Info),
            "WARN" | "WARNING" => Ok(LogLevel::Warn),
            "ERROR" => Ok(LogLevel::Error),
            other => Err(LoggingError::InvalidLevel(other.to_string())),
        }
    }
}

/// Logging errors
#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("Unknown log level: {0}")]
    InvalidLevel(String),
}

/// Logging configuration options
#[derive(Debug, Clone)]
pub struct LogOptions {
    /// Minimum log level
    pub level: LogLevel,
    /// Include the event target (module path) in output
    pub with_target: bool,
    /// Write through the test writer so output is captured by `cargo test`
    pub test_writer: bool,
}

impl Default for LogOptions {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            with_target: true,
            test_writer: false,
        }
    }
}

/// Install a global fmt subscriber.
///
/// Returns `false` when a global subscriber was already installed, which is
/// not an error: tests and embedding hosts commonly initialise more than once.
pub fn init(options: LogOptions) -> bool {
    let builder = tracing_subscriber::fmt()
        .with_max_level(options.level.as_tracing_level())
        .with_target(options.with_target);

    let installed = if options.test_writer {
        builder.with_test_writer().try_init().is_ok()
    } else {
        builder.try_init().is_ok()
    };

    if installed {
        tracing::debug!(level = options.level.as_str(), "Logging initialized");
    }
    installed
}

/// Format an error with its cause chain
pub fn format_error(error: &dyn std::error::Error) -> String {
    format_error_recursive(error, 0)
}

fn format_error_recursive(error: &dyn std::error::Error, depth: usize) -> String {
    const MAX_DEPTH: usize = 10;

    if depth >= MAX_DEPTH {
        return error.to_string();
    }

    let base = error.to_string();

    if let Some(source) = error.source() {
        format!("{} Caused by: {}", base, format_error_recursive(source, depth + 1))
    } else {
        base
    }
}
