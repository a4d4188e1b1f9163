//! Shared logging utilities for the tabnorm binary and library callers.
//!
//! Provides consistent logging configuration with a human-readable and a
//! JSON output format.

use serde::{Deserialize, Serialize};
use tracing_subscriber::EnvFilter;

use crate::Result;

/// Log output format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable single-line records
    #[default]
    Plain,
    /// One JSON object per record
    Json,
}

/// Maps the CLI verbosity flags onto a tracing level.
pub fn level_for(verbose: u8, quiet: bool) -> tracing::Level {
    match (quiet, verbose) {
        (true, _) => tracing::Level::ERROR,
        (false, 0) => tracing::Level::INFO,
        (false, 1) => tracing::Level::DEBUG,
        (false, _) => tracing::Level::TRACE,
    }
}

/// Filter directive used when `RUST_LOG` is unset.
pub fn default_directive(verbose: u8, quiet: bool) -> String {
    level_for(verbose, quiet).to_string().to_lowercase()
}

/// Initializes structured logging based on verbosity level.
///
/// # Arguments
/// * `verbose` - Verbosity level (0=INFO, 1=DEBUG, 2+=TRACE)
/// * `quiet` - If true, only show ERROR level logs
/// * `format` - Plain text or JSON records
///
/// A `RUST_LOG` directive, when set, replaces the level from the flags.
/// Records are written to stderr so reports printed on stdout stay clean.
///
/// # Example
/// ```rust,no_run
/// use tabnorm_core::logging::{init_logging, LogFormat};
///
/// init_logging(1, false, LogFormat::Plain).expect("Failed to initialize logging");
/// ```
pub fn init_logging(verbose: u8, quiet: bool, format: LogFormat) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(verbose, quiet)));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false);

    let initialized = match format {
        LogFormat::Plain => builder.try_init(),
        LogFormat::Json => builder.json().try_init(),
    };

    initialized.map_err(|e| {
        crate::error::NormalizeError::configuration(format!(
            "Failed to initialize logging: {}",
            e
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    // Logging can only be initialized once per test process, so only the
    // level mapping is checked here.
    #[test]
    fn test_verbosity_levels() {
        let test_cases = [
            ((true, 0), tracing::Level::ERROR),
            ((true, 5), tracing::Level::ERROR),
            ((false, 0), tracing::Level::INFO),
            ((false, 1), tracing::Level::DEBUG),
            ((false, 2), tracing::Level::TRACE),
            ((false, 10), tracing::Level::TRACE),
        ];

        for ((quiet, verbose), expected) in test_cases {
            assert_eq!(
                level_for(verbose, quiet),
                expected,
                "Failed for quiet={}, verbose={}",
                quiet,
                verbose
            );
        }
    }

    #[test]
    fn test_default_directive_is_lowercase_level() {
        assert_eq!(default_directive(0, false), "info");
        assert_eq!(default_directive(1, false), "debug");
        assert_eq!(default_directive(3, true), "error");
        assert!(EnvFilter::try_new(default_directive(2, false)).is_ok());
    }

    #[test]
    fn test_log_format_parsing() {
        let format: LogFormat = serde_json::from_str("\"json\"").unwrap();
        assert_eq!(format, LogFormat::Json);
        assert_eq!(LogFormat::default(), LogFormat::Plain);
    }
}
