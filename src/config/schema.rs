//! Configuration schema definitions.
//!
//! This module defines the structure of the settings file using serde.
//! Every section carries `#[serde(default)]`, so a partial or older file
//! still loads.

use super::error::{ConfigError, ConfigResult};
use crate::encoding::TextEncoding;
use crate::port::{BaudRate, DataBits, Parity, StopBits};
use crate::protocol::PumpId;
use crate::scheduler::{validate_interval, DEFAULT_SAMPLING_INTERVAL_MS};
use crate::state::PortConfig;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Keys understood by [`Config::get`] and [`Config::set`], besides
/// `setpoint.<pump>`.
pub const KEYS: [&str; 8] = [
    "hex_send",
    "add_newline",
    "sampling_interval_ms",
    "encoding",
    "window.width",
    "window.height",
    "serial.port",
    "serial.baud_rate",
];

/// Root configuration structure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Interpret manual input as hex digits
    pub hex_send: bool,
    /// Append CRLF to manual text
    pub add_newline: bool,
    /// Last confirmed setpoint text per pump, indexed by `PumpId::slot`
    pub setpoints: Vec<String>,
    /// Poll period in milliseconds (100..=5000)
    pub sampling_interval_ms: u64,
    /// Text encoding for new connections
    pub encoding: TextEncoding,
    pub window: WindowConfig,
    pub serial: SerialConfig,
    pub logging: LoggingConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            hex_send: false,
            add_newline: false,
            setpoints: vec![String::new(); PumpId::ALL.len()],
            sampling_interval_ms: DEFAULT_SAMPLING_INTERVAL_MS,
            encoding: TextEncoding::default(),
            window: WindowConfig::default(),
            serial: SerialConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Config {
    /// Saved setpoint text for `pump`; empty when never set.
    pub fn setpoint(&self, pump: PumpId) -> &str {
        self.setpoints
            .get(pump.slot())
            .map(String::as_str)
            .unwrap_or_default()
    }

    pub fn set_setpoint(&mut self, pump: PumpId, value: impl Into<String>) {
        if self.setpoints.len() < PumpId::ALL.len() {
            self.setpoints.resize(PumpId::ALL.len(), String::new());
        }
        self.setpoints[pump.slot()] = value.into();
    }

    pub fn sampling_interval(&self) -> Duration {
        Duration::from_millis(self.sampling_interval_ms)
    }

    /// Connection parameters for `device`, from the saved serial settings.
    pub fn port_config(&self, device: impl Into<String>) -> PortConfig {
        PortConfig {
            device: device.into(),
            baud_rate: self.serial.baud_rate,
            data_bits: self.serial.data_bits,
            stop_bits: self.serial.stop_bits,
            parity: self.serial.parity,
            encoding: self.encoding,
        }
    }

    /// Check value ranges that serde cannot express.
    pub fn validate(&self) -> ConfigResult<()> {
        validate_interval(self.sampling_interval_ms)
            .map_err(|e| ConfigError::validation("sampling_interval_ms", e.to_string()))?;
        if self.window.width == 0 || self.window.height == 0 {
            return Err(ConfigError::validation(
                "window",
                "width and height must be positive",
            ));
        }
        if self.setpoints.len() > PumpId::ALL.len() {
            return Err(ConfigError::validation(
                "setpoints",
                format!("at most {} entries", PumpId::ALL.len()),
            ));
        }
        Ok(())
    }

    /// Read a setting by its flat key.
    pub fn get(&self, key: &str) -> Option<String> {
        if let Some(pump) = key.strip_prefix("setpoint.") {
            let pump: PumpId = pump.parse().ok()?;
            return Some(self.setpoint(pump).to_string());
        }
        let value = match key {
            "hex_send" => self.hex_send.to_string(),
            "add_newline" => self.add_newline.to_string(),
            "sampling_interval_ms" => self.sampling_interval_ms.to_string(),
            "encoding" => self.encoding.to_string(),
            "window.width" => self.window.width.to_string(),
            "window.height" => self.window.height.to_string(),
            "serial.port" => self.serial.port.clone().unwrap_or_default(),
            "serial.baud_rate" => self.serial.baud_rate.to_string(),
            _ => return None,
        };
        Some(value)
    }

    /// Update a setting by its flat key. The value is validated before it is
    /// stored; on error the configuration is unchanged.
    pub fn set(&mut self, key: &str, value: &str) -> ConfigResult<()> {
        let invalid = |message: String| ConfigError::validation(key, message);

        if let Some(pump) = key.strip_prefix("setpoint.") {
            let pump: PumpId = pump.parse().map_err(|e| invalid(format!("{e}")))?;
            self.set_setpoint(pump, value.trim());
            return Ok(());
        }

        match key {
            "hex_send" => self.hex_send = parse_bool(value).ok_or_else(|| invalid(bool_msg(value)))?,
            "add_newline" => {
                self.add_newline = parse_bool(value).ok_or_else(|| invalid(bool_msg(value)))?
            }
            "sampling_interval_ms" => {
                let ms: u64 = value
                    .trim()
                    .parse()
                    .map_err(|_| invalid(format!("'{value}' is not a number")))?;
                validate_interval(ms).map_err(|e| invalid(e.to_string()))?;
                self.sampling_interval_ms = ms;
            }
            "encoding" => self.encoding = value.parse().map_err(|e| invalid(format!("{e}")))?,
            "window.width" => self.window.width = parse_dimension(value).map_err(invalid)?,
            "window.height" => self.window.height = parse_dimension(value).map_err(invalid)?,
            "serial.port" => {
                let trimmed = value.trim();
                self.serial.port = (!trimmed.is_empty()).then(|| trimmed.to_string());
            }
            "serial.baud_rate" => {
                self.serial.baud_rate = value.parse().map_err(|e| invalid(format!("{e}")))?
            }
            _ => return Err(ConfigError::UnknownKey(key.to_string())),
        }
        Ok(())
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn bool_msg(value: &str) -> String {
    format!("'{value}' is not a boolean")
}

fn parse_dimension(value: &str) -> Result<u32, String> {
    match value.trim().parse::<u32>() {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(format!("'{value}' is not a positive integer")),
    }
}

/// Main window geometry, kept for front ends that draw one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    pub width: u32,
    pub height: u32,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            width: 1920,
            height: 1440,
        }
    }
}

/// Serial port configuration section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct SerialConfig {
    /// Device opened by `run` when none is given on the command line
    pub port: Option<String>,
    pub baud_rate: BaudRate,
    pub data_bits: DataBits,
    pub stop_bits: StopBits,
    pub parity: Parity,
}

/// Logging configuration section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter directive; `RUST_LOG` takes precedence
    pub level: String,
    /// Log format: "pretty" or "compact"
    pub format: LogFormat,
    /// Log file path (optional); stderr when unset
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
            file: None,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Pretty format with colors
    #[default]
    Pretty,
    /// Compact single-line format
    Compact,
}
