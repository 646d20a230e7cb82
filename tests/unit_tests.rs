//! Unit tests for pumpctl's public value types
//!
//! This module covers:
//! - `state.rs`: PortConfig defaults and JSON mapping
//! - `config`: flat key access and TOML round trips through `ConfigLoader`
//! - `error.rs`: AppError display and conversions
//!
//! Tests follow the Arrange-Act-Assert pattern.

use pumpctl::config::{Config, ConfigError, ConfigLoader, LogFormat};
use pumpctl::error::{AppError, ParseError, ValidationError};
use pumpctl::port::{BaudRate, DataBits, Parity, PortError, StopBits};
use pumpctl::protocol::PumpId;
use pumpctl::service::ServiceError;
use pumpctl::state::PortConfig;
use pumpctl::TextEncoding;

// ============================================================================
// PortConfig Tests
// ============================================================================

mod port_config_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_port_config_default_values() {
        // Arrange: only the device is given
        let json = r#"{"device": "/dev/ttyUSB0"}"#;

        // Act
        let config: PortConfig = serde_json::from_str(json).expect("Failed to deserialize");

        // Assert: 115200 8N1, UTF-8
        assert_eq!(config, PortConfig::new("/dev/ttyUSB0"));
        assert_eq!(config.baud_rate, BaudRate::B115200);
        assert_eq!(config.data_bits, DataBits::Eight);
        assert_eq!(config.stop_bits, StopBits::One);
        assert_eq!(config.parity, Parity::None);
        assert_eq!(config.encoding, TextEncoding::Utf8);
    }

    #[test]
    fn test_port_config_json_mapping() {
        // Arrange
        let json = r#"{
            "device": "COM3",
            "baud_rate": 9600,
            "data_bits": "seven",
            "stop_bits": "two",
            "parity": "even",
            "encoding": "gbk"
        }"#;

        // Act
        let config: PortConfig = serde_json::from_str(json).unwrap();
        let back = serde_json::to_value(&config).unwrap();

        // Assert
        assert_eq!(config.baud_rate, BaudRate::B9600);
        assert_eq!(config.data_bits, DataBits::Seven);
        assert_eq!(config.stop_bits, StopBits::Two);
        assert_eq!(config.parity, Parity::Even);
        assert_eq!(config.encoding, TextEncoding::Gbk);
        assert_eq!(back["baud_rate"], 9600);
        assert_eq!(back["encoding"], "gbk");
    }

    #[test]
    fn test_port_config_rejects_unsupported_baud() {
        let json = r#"{"device": "COM3", "baud_rate": 12345}"#;

        let result = serde_json::from_str::<PortConfig>(json);

        assert!(result.is_err(), "12345 baud is not offered");
    }

    #[test]
    fn test_legacy_encoding_names_accepted() {
        // Arrange: names as saved by older settings files
        let cases = [
            ("\"Unicode\"", TextEncoding::Utf16Le),
            ("\"BigEndianUnicode\"", TextEncoding::Utf16Be),
            ("\"UTF-8\"", TextEncoding::Utf8),
            ("\"GB2312\"", TextEncoding::Gb2312),
        ];

        for (json, expected) in cases {
            // Act
            let encoding: TextEncoding = serde_json::from_str(json).unwrap();

            // Assert
            assert_eq!(encoding, expected, "decoding {json}");
        }
    }
}

// ============================================================================
// Config Tests
// ============================================================================

mod config_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_flat_keys_read_and_write() {
        // Arrange
        let mut config = Config::default();

        // Act
        config.set("hex_send", "yes").unwrap();
        config.set("sampling_interval_ms", "250").unwrap();
        config.set("encoding", "utf-16be").unwrap();
        config.set("serial.port", " /dev/ttyACM0 ").unwrap();
        config.set("setpoint.pump_4", "2500").unwrap();

        // Assert
        assert_eq!(config.get("hex_send").as_deref(), Some("true"));
        assert_eq!(config.get("sampling_interval_ms").as_deref(), Some("250"));
        assert_eq!(config.encoding, TextEncoding::Utf16Be);
        assert_eq!(config.serial.port.as_deref(), Some("/dev/ttyACM0"));
        assert_eq!(config.setpoint(PumpId::Pump4), "2500");
        assert_eq!(config.get("setpoint.PUMP 4").as_deref(), Some("2500"));
    }

    #[test]
    fn test_invalid_values_leave_config_unchanged() {
        // Arrange
        let mut config = Config::default();
        let before = config.clone();

        // Act
        let interval = config.set("sampling_interval_ms", "50");
        let width = config.set("window.width", "0");
        let unknown = config.set("colour", "blue");

        // Assert
        assert!(matches!(interval, Err(ConfigError::ValidationError { .. })));
        assert!(matches!(width, Err(ConfigError::ValidationError { .. })));
        assert!(matches!(unknown, Err(ConfigError::UnknownKey(key)) if key == "colour"));
        assert_eq!(config, before);
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        // Arrange
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pumpctl.toml");
        std::fs::write(
            &path,
            "sampling_interval_ms = 500\n\n[logging]\nformat = \"compact\"\n",
        )
        .unwrap();

        // Act
        let loader = ConfigLoader::load_from(&path).unwrap();
        let config = loader.config();

        // Assert
        assert_eq!(config.sampling_interval_ms, 500);
        assert_eq!(config.logging.format, LogFormat::Compact);
        assert_eq!(config.logging.level, "info");
        assert!(!config.add_newline);
        assert_eq!(config.window.width, 1920);
        assert_eq!(config.setpoints.len(), PumpId::ALL.len());
    }

    #[test]
    fn test_saved_settings_survive_reload() {
        // Arrange
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pumpctl.toml");
        let mut loader = ConfigLoader::with_defaults();
        loader.config_mut().set_setpoint(PumpId::HiPump2, "4.75");
        loader.config_mut().serial.baud_rate = BaudRate::B57600;

        // Act
        loader.save_to(&path).unwrap();
        let reloaded = ConfigLoader::load_from(&path).unwrap();

        // Assert
        assert_eq!(reloaded.config().setpoint(PumpId::HiPump2), "4.75");
        assert_eq!(reloaded.config().serial.baud_rate, BaudRate::B57600);
    }

    #[test]
    fn test_port_config_from_settings() {
        // Arrange
        let mut config = Config::default();
        config.set("serial.baud_rate", "38400").unwrap();
        config.encoding = TextEncoding::Ascii;

        // Act
        let port = config.port_config("COM7");

        // Assert
        assert_eq!(port.device, "COM7");
        assert_eq!(port.baud_rate, BaudRate::B38400);
        assert_eq!(port.encoding, TextEncoding::Ascii);
    }
}

// ============================================================================
// Error Tests
// ============================================================================

mod error_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_validation_error_display() {
        let err = ValidationError::OutOfRange {
            pump: "PUMP 4",
            amps: 11.6,
            max: 11.5,
        };

        assert_eq!(
            err.to_string(),
            "setpoint for PUMP 4 must be between 0 and 11.5 A, got 11.6 A"
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
    fn test_app_error_is_transparent_over_sources() {
        // Arrange
        let port = PortError::not_found("/dev/ttyUSB9");
        let validation = ValidationError::NotNumeric("abc".into());

        // Act
        let from_port: AppError = port.into();
        let from_validation: AppError = validation.into();

        // Assert
        assert_eq!(from_port.to_string(), "Serial port not found: /dev/ttyUSB9");
        assert_eq!(from_validation.to_string(), "'abc' is not a valid number");
    }

    #[test]
    fn test_service_error_wraps_validation() {
        // Arrange
        let err: ServiceError = ValidationError::UnknownPump("pump9".into()).into();

        // Act
        let app: AppError = err.into();

        // Assert
        assert!(matches!(
            app,
            AppError::Service(ServiceError::Validation(ValidationError::UnknownPump(_)))
        ));
        assert_eq!(app.to_string(), "Invalid input: unknown pump 'pump9'");
    }

    #[test]
    fn test_io_error_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");

        let app: AppError = io.into();

        assert!(matches!(app, AppError::Io(_)));
        assert!(app.to_string().starts_with("I/O error"));
    }
}
