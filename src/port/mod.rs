//! Port abstraction layer for serial communication.
//!
//! Provides the adapter trait, the `serialport`-backed implementation, a mock
//! for tests, and device enumeration.

pub mod discovery;
pub mod error;
pub mod mock;
pub mod sync_port;
pub mod traits;

pub use discovery::{available_ports, PortChanges, PortDescriptor, PortWatcher};
pub use error::PortError;
pub use mock::MockSerialPort;
pub use sync_port::*;
pub use traits::*;
