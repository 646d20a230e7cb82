//! Port-specific error types.
//!
//! Everything that can go wrong while talking to the hardware lands here.
//! The service layer treats any of these as a connection fault: the
//! connection is closed and the host has to reopen it explicitly.

use thiserror::Error;

/// Errors that can occur during serial port operations.
#[derive(Debug, Error)]
pub enum PortError {
    /// The specified serial port was not found on the system.
    #[error("Serial port not found: {0}")]
    NotFound(String),

    /// The port exists but is exclusively claimed by another process
    /// (or the current user may not open it).
    #[error("Serial port is busy or access was denied: {0}")]
    Busy(String),

    /// An I/O error occurred during port operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Port configuration failed.
    #[error("Configuration error: {0}")]
    Config(String),

    /// The device went away while the connection was open.
    #[error("Connection lost: {0}")]
    Disconnected(String),

    /// A serialport-specific error occurred.
    #[error("Serial port error: {0}")]
    Serial(#[from] serialport::Error),
}

impl PortError {
    /// Create a NotFound error from a port name.
    pub fn not_found(port_name: impl Into<String>) -> Self {
        Self::NotFound(port_name.into())
    }

    /// Create a Busy error from a port name.
    pub fn busy(port_name: impl Into<String>) -> Self {
        Self::Busy(port_name.into())
    }

    /// Create a Config error from a message.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a Disconnected error from a message.
    pub fn disconnected(message: impl Into<String>) -> Self {
        Self::Disconnected(message.into())
    }

    /// Map a `serialport` open failure onto our taxonomy.
    pub(crate) fn from_open(port_name: &str, err: serialport::Error) -> Self {
        match err.kind() {
            serialport::ErrorKind::NoDevice => Self::not_found(port_name),
            serialport::ErrorKind::InvalidInput => Self::config(err.to_string()),
            serialport::ErrorKind::Io(std::io::ErrorKind::NotFound) => {
                Self::not_found(port_name)
            }
            serialport::ErrorKind::Io(std::io::ErrorKind::PermissionDenied) => {
                Self::busy(port_name)
            }
            _ => Self::Serial(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = PortError::not_found("/dev/ttyUSB0");
        assert_eq!(err.to_string(), "Serial port not found: /dev/ttyUSB0");

        let err = PortError::config("Invalid baud rate");
        assert_eq!(err.to_string(), "Configuration error: Invalid baud rate");

        let err = PortError::busy("COM3");
        assert!(err.to_string().contains("COM3"));
    }

    #[test]
    fn test_open_error_mapping() {
        let err = serialport::Error::new(serialport::ErrorKind::NoDevice, "gone");
        assert!(matches!(
            PortError::from_open("/dev/ttyACM0", err),
            PortError::NotFound(name) if name == "/dev/ttyACM0"
        ));

        let err = serialport::Error::new(
            serialport::ErrorKind::Io(std::io::ErrorKind::PermissionDenied),
            "denied",
        );
        assert!(matches!(
            PortError::from_open("COM4", err),
            PortError::Busy(_)
        ));

        let err = serialport::Error::new(serialport::ErrorKind::Unknown, "weird");
        assert!(matches!(
            PortError::from_open("COM4", err),
            PortError::Serial(_)
        ));
    }
}
