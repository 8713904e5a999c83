//! Logging initialization for regwiz.
//!
//! Interactive sessions log to `<state>/logs/regwiz-{datetime}.log` when
//! `logging.to_file` is set so the log does not interleave with prompts;
//! otherwise logs go to stderr.

use anyhow::{Context, Result};
use std::path::PathBuf;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::Config;

/// Result of logging initialization
pub struct LoggingHandle {
    /// Guard that must be kept alive for the duration of the program.
    /// When dropped, ensures all buffered logs are flushed.
    pub _guard: Option<WorkerGuard>,

    /// Path to the log file (only set with file logging enabled)
    pub log_file_path: Option<PathBuf>,
}

/// Level filter: `--debug` wins, then `RUST_LOG`, then the configured level
fn filter_directive(config: &Config, debug_override: bool) -> String {
    if debug_override {
        return "debug".to_string();
    }
    std::env::var("RUST_LOG").unwrap_or_else(|_| config.logging.level.clone())
}

/// File name for a log started at `now`
fn log_file_name(now: chrono::DateTime<chrono::Utc>) -> String {
    format!("regwiz-{}.log", now.format("%Y%m%dT%H%M%SZ"))
}

/// Initialize logging from configuration.
///
/// # Arguments
/// * `config` - Application configuration
/// * `debug_override` - If true, override log level to "debug" (from --debug flag)
///
/// # Returns
/// A `LoggingHandle` that must be kept alive for the duration of the program.
pub fn init_logging(config: &Config, debug_override: bool) -> Result<LoggingHandle> {
    let filter = tracing_subscriber::EnvFilter::new(filter_directive(config, debug_override));

    if config.logging.to_file {
        let logs_dir = config.logs_path();
        std::fs::create_dir_all(&logs_dir).context("Failed to create logs directory")?;

        let log_filename = log_file_name(chrono::Utc::now());
        let log_file_path = logs_dir.join(&log_filename);

        let file_appender = tracing_appender::rolling::never(&logs_dir, &log_filename);
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

        tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(false)
                    .with_ansi(false)
                    .with_writer(non_blocking),
            )
            .init();

        Ok(LoggingHandle {
            _guard: Some(guard),
            log_file_path: Some(log_file_path),
        })
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(false)
                    .with_writer(std::io::stderr),
            )
            .init();

        Ok(LoggingHandle {
            _guard: None,
            log_file_path: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_debug_override_wins() {
        let config = Config::default();
        assert_eq!(filter_directive(&config, true), "debug");
    }

    #[test]
    fn test_log_file_name_format() {
        let now = chrono::Utc.with_ymd_and_hms(2026, 4, 1, 13, 5, 9).unwrap();
        assert_eq!(log_file_name(now), "regwiz-20260401T130509Z.log");
    }

    #[test]
    fn test_logs_live_under_state_dir() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let mut config = Config::default();
        config.paths.state = temp_dir.path().to_string_lossy().to_string();

        let logs_dir = config.logs_path();
        assert!(logs_dir.starts_with(temp_dir.path()));
        assert!(logs_dir.ends_with("logs"));
    }
}
