//! Error taxonomy.
//!
//! Hardware faults live in [`crate::port::PortError`] and settings faults in
//! [`crate::config::ConfigError`]. This module holds the two kinds that never
//! touch the connection: rejected user input and unrecognised telemetry.
//! [`AppError`] gathers everything for the binary.

use crate::config::ConfigError;
use crate::port::PortError;
use crate::service::ServiceError;
use thiserror::Error;

/// User input rejected before anything is transmitted.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("setpoint for {pump} must be between 0 and {max} A, got {amps} A")]
    OutOfRange {
        pump: &'static str,
        amps: f64,
        max: f64,
    },

    #[error("'{0}' is not a valid number")]
    NotNumeric(String),

    #[error("invalid hex input: {0}")]
    InvalidHex(String),

    #[error("sampling interval must be between {min} and {max} ms, got {value} ms")]
    IntervalOutOfRange { value: u64, min: u64, max: u64 },

    #[error("unknown pump '{0}'")]
    UnknownPump(String),
}

/// A telemetry line that could not be mapped to a pump reading.
///
/// These are logged and the line is dropped; they never reach the host.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("expected at least 3 tokens, got {0}")]
    TooFewTokens(usize),

    #[error("unrecognised device family '{0}'")]
    UnknownFamily(String),

    #[error("pump index '{0}' is not an integer")]
    InvalidIndex(String),

    #[error("{family} index {index} is out of range")]
    IndexOutOfRange { family: &'static str, index: i64 },

    #[error("unrecognised attribute '{0}'")]
    UnknownAttribute(String),
}

/// Unified application error for the command-line host.
#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Port(#[from] PortError),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Service(#[from] ServiceError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("failed to initialise logging: {0}")]
    Logging(String),

    #[error("{0}")]
    Usage(String),
}

/// A specialized `Result` type for the host binary.
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_display() {
        let err = ValidationError::OutOfRange {
            pump: "HIPUMP 1",
            amps: 11.6,
            max: 11.5,
        };
        assert_eq!(
            err.to_string(),
            "setpoint for HIPUMP 1 must be between 0 and 11.5 A, got 11.6 A"
        );
        assert_eq!(
            ValidationError::NotNumeric("abc".into()).to_string(),
            "'abc' is not a valid number"
        );
    }

    #[test]
    fn test_parse_error_display() {
        let err = ParseError::IndexOutOfRange {
            family: "PUMP",
            index: 5,
        };
        assert_eq!(err.to_string(), "PUMP index 5 is out of range");
    }

    #[test]
    fn test_app_error_is_transparent() {
        let err: AppError = PortError::not_found("COM9").into();
        assert_eq!(err.to_string(), "Serial port not found: COM9");
    }
}
