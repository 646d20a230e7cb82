//! Tracing subscriber setup for the binary.
//!
//! `RUST_LOG` wins over the configured level. Output goes to stderr unless a
//! log file is configured, in which case it is appended without colors.

use crate::config::{LogFormat, LoggingConfig};
use crate::error::{AppError, AppResult};
use std::fs::OpenOptions;
use std::sync::Mutex;
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::EnvFilter;

/// Build the filter: `RUST_LOG` if set and valid, else the configured level.
pub fn env_filter(config: &LoggingConfig) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Install the global subscriber. Fails if one is already installed or the
/// log file cannot be opened.
pub fn init(config: &LoggingConfig) -> AppResult<()> {
    let (writer, ansi) = match &config.file {
        Some(path) => {
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            (BoxMakeWriter::new(Mutex::new(file)), false)
        }
        None => (BoxMakeWriter::new(std::io::stderr), true),
    };

    let builder = tracing_subscriber::fmt()
        .with_env_filter(env_filter(config))
        .with_writer(writer)
        .with_ansi(ansi)
        .with_thread_names(true);

    match config.format {
        LogFormat::Pretty => builder.pretty().try_init(),
        LogFormat::Compact => builder.compact().try_init(),
    }
    .map_err(|e| AppError::Logging(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn test_configured_level_used_without_rust_log() {
        std::env::remove_var("RUST_LOG");
        let config = LoggingConfig {
            level: "pumpctl=debug".into(),
            ..LoggingConfig::default()
        };
        assert_eq!(env_filter(&config).to_string().to_lowercase(), "pumpctl=debug");
    }

    #[test]
    #[serial]
    fn test_invalid_level_falls_back_to_info() {
        std::env::remove_var("RUST_LOG");
        let config = LoggingConfig {
            level: "pumpctl=loudest".into(),
            ..LoggingConfig::default()
        };
        assert_eq!(env_filter(&config).to_string().to_lowercase(), "info");
    }
}
