//! Serial port enumeration.
//!
//! Lists the devices currently present and tracks how that list changes
//! between refreshes, so a host can keep its device picker current.

use super::error::PortError;
use serde::{Deserialize, Serialize};
use serialport::{SerialPortInfo, SerialPortType};
use std::fmt;

/// A device the host can offer for opening.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortDescriptor {
    /// System path or name, e.g. `/dev/ttyUSB0` or `COM3`.
    pub device: String,
    /// Human readable description of the device.
    pub description: String,
}

impl PortDescriptor {
    /// Build a descriptor from `serialport` enumeration output.
    pub fn from_info(info: &SerialPortInfo) -> Self {
        let description = match &info.port_type {
            SerialPortType::UsbPort(usb) => usb
                .product
                .clone()
                .or_else(|| usb.manufacturer.clone())
                .unwrap_or_else(|| format!("USB device {:04X}:{:04X}", usb.vid, usb.pid)),
            SerialPortType::BluetoothPort => "Bluetooth serial port".to_string(),
            SerialPortType::PciPort => "PCI serial port".to_string(),
            SerialPortType::Unknown => "n/a".to_string(),
        };

        Self {
            device: info.port_name.clone(),
            description,
        }
    }

    /// Recover the device path from a `"device: description"` label.
    pub fn device_from_label(label: &str) -> &str {
        label.split(": ").next().unwrap_or(label).trim()
    }
}

impl fmt::Display for PortDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.device, self.description)
    }
}

/// List the serial ports currently available on the system.
pub fn available_ports() -> Result<Vec<PortDescriptor>, PortError> {
    let ports = serialport::available_ports()?;
    Ok(ports.iter().map(PortDescriptor::from_info).collect())
}

/// Difference between two consecutive port listings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PortChanges {
    pub added: Vec<PortDescriptor>,
    pub removed: Vec<PortDescriptor>,
}

impl PortChanges {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }
}

/// Remembers the last listing and reports what changed.
#[derive(Debug, Default)]
pub struct PortWatcher {
    known: Vec<PortDescriptor>,
}

impl PortWatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ports seen at the last refresh.
    pub fn known(&self) -> &[PortDescriptor] {
        &self.known
    }

    /// Replace the known listing with `current`, returning the difference.
    pub fn update(&mut self, current: Vec<PortDescriptor>) -> PortChanges {
        let added = current
            .iter()
            .filter(|p| !self.known.contains(p))
            .cloned()
            .collect();
        let removed = self
            .known
            .iter()
            .filter(|p| !current.contains(p))
            .cloned()
            .collect();
        self.known = current;
        PortChanges { added, removed }
    }

    /// Enumerate the system ports and update the listing.
    pub fn refresh(&mut self) -> Result<PortChanges, PortError> {
        Ok(self.update(available_ports()?))
    }
}
