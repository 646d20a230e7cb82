//! pumpctl library
//!
//! Serial communication and protocol engine for a multi-channel laser pump
//! controller: it opens the link, reads it on a background thread, frames
//! the inbound text, alternates automatic telemetry polling with user
//! commands, and keeps a table of the latest readings.
//!
//! # Modules
//!
//! - `port`: Port abstraction layer (adapter trait, `serialport` backend, mock, discovery)
//! - `reader`: Background reader thread
//! - `encoding`, `decoder`: Incremental text decoding and line framing
//! - `scheduler`: Automatic polling vs. manual override
//! - `protocol`, `payload`: Command vocabulary, setpoints and manual sends
//! - `parser`, `telemetry`: Telemetry line parsing and the reading table
//! - `service`: `PumpService`, the control surface tying it all together
//! - `state`: Connection state and shared counters
//! - `config`: TOML settings with environment overrides
//! - `logging`: Tracing subscriber setup
//! - `error`: Validation, parse and application errors

pub mod config;
pub mod decoder;
pub mod encoding;
pub mod error;
pub mod logging;
pub mod parser;
pub mod payload;
pub mod port;
pub mod protocol;
pub mod reader;
pub mod scheduler;
pub mod service;
pub mod state;
pub mod telemetry;

// Re-export commonly used types for convenience
pub use decoder::{Line, LineDecoder};
pub use encoding::TextEncoding;
pub use error::{AppError, AppResult, ParseError, ValidationError};
pub use parser::{parse_reading, PumpReading, TelemetryParser};
pub use payload::ManualPayload;
pub use port::{
    BaudRate, DataBits, MockSerialPort, Parity, PortDescriptor, PortError, SerialPortAdapter,
    StopBits, SyncSerialPort,
};
pub use protocol::{Attribute, PumpFamily, PumpId, Setpoint};
pub use scheduler::{CommandScheduler, SchedulerEvent, SchedulerMode};
pub use service::{
    CloseResult, Notification, OpenResult, PumpService, ServiceError, ServiceResult,
    SetpointResult, StatusResult, TickSummary, WriteResult,
};
pub use state::{CounterSnapshot, PortConfig};
pub use telemetry::{PumpTelemetry, TelemetryTable};

// Re-export config types
pub use config::{Config, ConfigError, ConfigLoader, ConfigResult};
