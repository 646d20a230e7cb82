//! Core traits for serial port abstraction.
//!
//! Defines the `SerialPortAdapter` trait that allows both real serial ports
//! and mock implementations to be used interchangeably, plus the framing
//! parameters a pump controller link can be opened with.

use super::error::PortError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Line framing parameters for a serial port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortConfiguration {
    /// Baud rate (bits per second).
    pub baud_rate: BaudRate,

    /// Number of data bits (5, 6, 7, or 8).
    pub data_bits: DataBits,

    /// Parity checking mode.
    pub parity: Parity,

    /// Number of stop bits.
    pub stop_bits: StopBits,

    /// Blocking read/write timeout of the underlying handle.
    pub timeout: Duration,
}

impl Default for PortConfiguration {
    fn default() -> Self {
        Self {
            baud_rate: BaudRate::default(),
            data_bits: DataBits::Eight,
            parity: Parity::None,
            stop_bits: StopBits::One,
            timeout: Duration::from_millis(50),
        }
    }
}

/// Baud rates offered for pump controllers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub enum BaudRate {
    B9600,
    B14400,
    B19200,
    B38400,
    B57600,
    #[default]
    B115200,
}

impl BaudRate {
    /// All supported rates, default first.
    pub const ALL: [BaudRate; 6] = [
        BaudRate::B115200,
        BaudRate::B9600,
        BaudRate::B14400,
        BaudRate::B19200,
        BaudRate::B38400,
        BaudRate::B57600,
    ];

    pub fn as_u32(self) -> u32 {
        match self {
            BaudRate::B9600 => 9600,
            BaudRate::B14400 => 14400,
            BaudRate::B19200 => 19200,
            BaudRate::B38400 => 38400,
            BaudRate::B57600 => 57600,
            BaudRate::B115200 => 115200,
        }
    }
}

impl From<BaudRate> for u32 {
    fn from(rate: BaudRate) -> Self {
        rate.as_u32()
    }
}

impl TryFrom<u32> for BaudRate {
    type Error = PortError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        BaudRate::ALL
            .into_iter()
            .find(|rate| rate.as_u32() == value)
            .ok_or_else(|| PortError::config(format!("unsupported baud rate {value}")))
    }
}

impl FromStr for BaudRate {
    type Err = PortError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value: u32 = s
            .trim()
            .parse()
            .map_err(|_| PortError::config(format!("invalid baud rate '{s}'")))?;
        BaudRate::try_from(value)
    }
}

impl fmt::Display for BaudRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_u32())
    }
}

/// Number of data bits per character.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataBits {
    Five,
    Six,
    Seven,
    #[default]
    Eight,
}

impl From<DataBits> for serialport::DataBits {
    fn from(bits: DataBits) -> Self {
        match bits {
            DataBits::Five => serialport::DataBits::Five,
            DataBits::Six => serialport::DataBits::Six,
            DataBits::Seven => serialport::DataBits::Seven,
            DataBits::Eight => serialport::DataBits::Eight,
        }
    }
}

impl FromStr for DataBits {
    type Err = PortError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "5" | "five" => Ok(DataBits::Five),
            "6" | "six" => Ok(DataBits::Six),
            "7" | "seven" => Ok(DataBits::Seven),
            "8" | "eight" => Ok(DataBits::Eight),
            other => Err(PortError::config(format!("invalid data bits '{other}'"))),
        }
    }
}

/// Parity checking modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Parity {
    #[default]
    None,
    Odd,
    Even,
}

impl From<Parity> for serialport::Parity {
    fn from(parity: Parity) -> Self {
        match parity {
            Parity::None => serialport::Parity::None,
            Parity::Odd => serialport::Parity::Odd,
            Parity::Even => serialport::Parity::Even,
        }
    }
}

impl FromStr for Parity {
    type Err = PortError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "none" | "n" => Ok(Parity::None),
            "odd" | "o" => Ok(Parity::Odd),
            "even" | "e" => Ok(Parity::Even),
            other => Err(PortError::config(format!("invalid parity '{other}'"))),
        }
    }
}

/// Number of stop bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopBits {
    #[default]
    One,
    Two,
}

impl From<StopBits> for serialport::StopBits {
    fn from(bits: StopBits) -> Self {
        match bits {
            StopBits::One => serialport::StopBits::One,
            StopBits::Two => serialport::StopBits::Two,
        }
    }
}

impl FromStr for StopBits {
    type Err = PortError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "1" | "one" => Ok(StopBits::One),
            "2" | "two" => Ok(StopBits::Two),
            other => Err(PortError::config(format!("invalid stop bits '{other}'"))),
        }
    }
}

/// Trait for serial port I/O operations.
///
/// This trait abstracts over synchronous serial port operations, allowing both
/// real hardware ports and mock implementations for testing.
pub trait SerialPortAdapter: Send + fmt::Debug {
    /// Write all of `data` to the serial port.
    ///
    /// Returns the number of bytes written.
    fn write_bytes(&mut self, data: &[u8]) -> Result<usize, PortError>;

    /// Read whatever is currently pending without blocking.
    ///
    /// `Ok` with an empty vector means "no data yet"; any `Err` means the
    /// connection is broken and must be reopened.
    fn read_available(&mut self) -> Result<Vec<u8>, PortError>;

    /// Get the name/path of this serial port.
    fn name(&self) -> &str;

    /// Open a second handle onto the same connection.
    ///
    /// The reader thread owns the clone so that writes never wait behind reads.
    fn try_clone_adapter(&self) -> Result<Box<dyn SerialPortAdapter>, PortError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_configuration() {
        let config = PortConfiguration::default();
        assert_eq!(config.baud_rate, BaudRate::B115200);
        assert_eq!(config.data_bits, DataBits::Eight);
        assert_eq!(config.parity, Parity::None);
        assert_eq!(config.stop_bits, StopBits::One);
    }

    #[test]
    fn test_baud_rate_parsing() {
        assert_eq!("9600".parse::<BaudRate>().unwrap(), BaudRate::B9600);
        assert_eq!(BaudRate::try_from(57600).unwrap(), BaudRate::B57600);
        assert!("4800".parse::<BaudRate>().is_err());
        assert!("fast".parse::<BaudRate>().is_err());
        assert_eq!(BaudRate::B14400.to_string(), "14400");
    }

    #[test]
    fn test_baud_rate_serde_as_number() {
        let json = serde_json::to_string(&BaudRate::B38400).unwrap();
        assert_eq!(json, "38400");
        let rate: BaudRate = serde_json::from_str("19200").unwrap();
        assert_eq!(rate, BaudRate::B19200);
        assert!(serde_json::from_str::<BaudRate>("1234").is_err());
    }

    #[test]
    fn test_framing_parsing() {
        assert_eq!("7".parse::<DataBits>().unwrap(), DataBits::Seven);
        assert_eq!("Odd".parse::<Parity>().unwrap(), Parity::Odd);
        assert_eq!("2".parse::<StopBits>().unwrap(), StopBits::Two);
        assert!("1.5".parse::<StopBits>().is_err());
        assert!("mark".parse::<Parity>().is_err());
    }

    #[test]
    fn test_data_bits_conversion() {
        let serialport_bits: serialport::DataBits = DataBits::Eight.into();
        assert_eq!(serialport_bits, serialport::DataBits::Eight);
    }

    #[test]
    fn test_parity_conversion() {
        let serialport_parity: serialport::Parity = Parity::Even.into();
        assert_eq!(serialport_parity, serialport::Parity::Even);
    }

    #[test]
    fn test_stop_bits_conversion() {
        let serialport_stop_bits: serialport::StopBits = StopBits::Two.into();
        assert_eq!(serialport_stop_bits, serialport::StopBits::Two);
    }
}
