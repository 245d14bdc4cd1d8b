//! Logging setup shared by the library and the command-line front end.

use serde::{Deserialize, Serialize};
use tracing_subscriber::EnvFilter;

use crate::Result;
use crate::error::SourceSenseError;

/// Output format for log lines.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable single-line output
    #[default]
    Text,
    /// One JSON object per event
    Json,
}

/// Maps the verbosity flags onto a tracing level.
///
/// `quiet` always wins; otherwise 0 is INFO, 1 is DEBUG and anything above is
/// TRACE.
pub const fn level_for(verbose: u8, quiet: bool) -> tracing::Level {
    match (quiet, verbose) {
        (true, _) => tracing::Level::ERROR,
        (false, 0) => tracing::Level::INFO,
        (false, 1) => tracing::Level::DEBUG,
        (false, _) => tracing::Level::TRACE,
    }
}

/// Initializes structured logging based on verbosity level.
///
/// When `RUST_LOG` is set it takes precedence over the verbosity flags.
///
/// # Arguments
/// * `verbose` - Verbosity level (0=INFO, 1=DEBUG, 2+=TRACE)
/// * `quiet` - If true, only show ERROR level logs
/// * `format` - Text or JSON output
///
/// # Example
/// ```rust,no_run
/// use sourcesense_core::logging::{LogFormat, init_logging};
///
/// init_logging(1, false, LogFormat::Text).expect("Failed to initialize logging");
/// ```
pub fn init_logging(verbose: u8, quiet: bool, format: LogFormat) -> Result<()> {
    let level = level_for(verbose, quiet);
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.as_str().to_ascii_lowercase()));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .with_writer(std::io::stderr);

    let initialized = match format {
        LogFormat::Text => builder.try_init(),
        LogFormat::Json => builder.json().try_init(),
    };

    initialized.map_err(|e| {
        SourceSenseError::configuration(format!("Failed to initialize logging: {}", e))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quiet_overrides_verbose() {
        assert_eq!(level_for(0, true), tracing::Level::ERROR);
        assert_eq!(level_for(3, true), tracing::Level::ERROR);
    }

    #[test]
    fn test_verbose_count_raises_level() {
        let levels: Vec<_> = (0..4).map(|verbose| level_for(verbose, false)).collect();
        assert_eq!(
            levels,
            vec![
                tracing::Level::INFO,
                tracing::Level::DEBUG,
                tracing::Level::TRACE,
                tracing::Level::TRACE,
            ]
        );
    }

    #[test]
    fn test_second_initialization_is_configuration_error() {
        // Whichever call installs the global subscriber, the next one must fail
        let _ = init_logging(0, true, LogFormat::Text);
        let err = init_logging(0, true, LogFormat::Json).unwrap_err();
        assert!(matches!(err, SourceSenseError::Configuration { .. }));
    }

    #[test]
    fn test_log_format_serde() {
        let format: LogFormat = serde_json::from_str("\"json\"").unwrap();
        assert_eq!(format, LogFormat::Json);
        assert_eq!(LogFormat::default(), LogFormat::Text);
    }
}
