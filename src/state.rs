use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc;
use std::time::Instant;

use crate::decoder::LineDecoder;
use crate::encoding::TextEncoding;
use crate::port::{BaudRate, DataBits, Parity, PortConfiguration, SerialPortAdapter, StopBits};
use crate::reader::{ReaderEvent, ReaderTask};

/// Type alias for the port adapter held by an open connection.
///
/// Boxed so tests can inject `MockSerialPort` where production opens a
/// `SyncSerialPort`.
pub type PortAdapter = Box<dyn SerialPortAdapter>;

/// Everything needed to open a connection.
///
/// Fixed for the lifetime of the connection; changing any field means
/// closing and reopening.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct PortConfig {
    pub device: String,
    #[serde(default)]
    pub baud_rate: BaudRate,
    #[serde(default)]
    pub data_bits: DataBits,
    #[serde(default)]
    pub stop_bits: StopBits,
    #[serde(default)]
    pub parity: Parity,
    #[serde(default)]
    pub encoding: TextEncoding,
}

impl PortConfig {
    /// Defaults for everything but the device: 115200 8N1, UTF-8.
    pub fn new(device: impl Into<String>) -> Self {
        Self {
            device: device.into(),
            baud_rate: BaudRate::default(),
            data_bits: DataBits::default(),
            stop_bits: StopBits::default(),
            parity: Parity::default(),
            encoding: TextEncoding::default(),
        }
    }

    /// Line parameters handed to the serial driver.
    pub fn framing(&self) -> PortConfiguration {
        PortConfiguration {
            baud_rate: self.baud_rate,
            data_bits: self.data_bits,
            parity: self.parity,
            stop_bits: self.stop_bits,
            ..PortConfiguration::default()
        }
    }
}

/// Byte counters, shared between the reader thread and the write path.
///
/// Never reset; totals span every connection made by one service.
#[derive(Debug, Default)]
pub struct Counters {
    bytes_sent: AtomicU64,
    bytes_received: AtomicU64,
}

impl Counters {
    pub fn add_sent(&self, n: u64) {
        self.bytes_sent.fetch_add(n, Ordering::Relaxed);
    }

    pub fn add_received(&self, n: u64) {
        self.bytes_received.fetch_add(n, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> CounterSnapshot {
        CounterSnapshot {
            bytes_sent: self.bytes_sent.load(Ordering::Relaxed),
            bytes_received: self.bytes_received.load(Ordering::Relaxed),
        }
    }
}

#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CounterSnapshot {
    pub bytes_sent: u64,
    pub bytes_received: u64,
}

/// A live connection and the machinery attached to it.
#[derive(Debug)]
pub struct OpenConnection {
    /// Write handle; the reader thread owns a clone.
    pub port: PortAdapter,
    pub config: PortConfig,
    pub reader: ReaderTask,
    pub events: mpsc::Receiver<ReaderEvent>,
    pub decoder: LineDecoder,
    pub opened_at: Instant,
}

/// Represents the current state of the serial connection.
#[derive(Debug, Default)]
pub enum ConnectionState {
    #[default]
    Closed,
    Open(Box<OpenConnection>),
}

impl ConnectionState {
    pub fn is_open(&self) -> bool {
        matches!(self, ConnectionState::Open(_))
    }

    pub fn config(&self) -> Option<&PortConfig> {
        match self {
            ConnectionState::Open(conn) => Some(&conn.config),
            ConnectionState::Closed => None,
        }
    }
}
