//! Mock serial port implementation for testing.
//!
//! Provides a `MockSerialPort` that simulates a pump controller link without
//! requiring actual hardware. Clones share one state, so a test can keep a
//! handle to inject inbound data while the reader thread owns another.

use super::error::PortError;
use super::traits::SerialPortAdapter;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;

/// Inner state of the mock port, shared between clones.
#[derive(Debug, Default)]
struct MockPortState {
    /// Chunks to be returned by read operations, one chunk per read.
    read_queue: VecDeque<Vec<u8>>,
    /// Log of all writes, one entry per `write_bytes` call.
    write_log: Vec<Vec<u8>>,
    /// When set, every read fails as if the cable was pulled.
    fail_reads: bool,
    /// When set, every write fails.
    fail_writes: bool,
    /// Number of handles currently alive.
    open_handles: usize,
    /// Number of reads that returned an error.
    failed_reads: usize,
}

/// Mock serial port implementation for testing.
///
/// # Example
/// ```
/// use pumpctl::port::{MockSerialPort, SerialPortAdapter};
///
/// let mut port = MockSerialPort::new("MOCK0");
/// port.enqueue_read(b"HIPUMP 1 ILD: 3.21\r\n");
///
/// let chunk = port.read_available().unwrap();
/// assert_eq!(chunk, b"HIPUMP 1 ILD: 3.21\r\n");
/// assert!(port.read_available().unwrap().is_empty());
///
/// port.write_bytes(b"hipump\r\n").unwrap();
/// assert_eq!(port.get_write_log(), vec![b"hipump\r\n".to_vec()]);
/// ```
pub struct MockSerialPort {
    /// The port name/identifier.
    name: String,
    /// The shared state.
    state: Arc<Mutex<MockPortState>>,
}

impl MockSerialPort {
    /// Create a new mock serial port with the given name.
    pub fn new(name: impl Into<String>) -> Self {
        let state = Arc::new(Mutex::new(MockPortState {
            open_handles: 1,
            ..Default::default()
        }));
        Self {
            name: name.into(),
            state,
        }
    }

    /// Enqueue one chunk to be returned by a subsequent read.
    pub fn enqueue_read(&self, data: &[u8]) {
        self.state.lock().read_queue.push_back(data.to_vec());
    }

    /// Get a copy of all data written to the port.
    pub fn get_write_log(&self) -> Vec<Vec<u8>> {
        self.state.lock().write_log.clone()
    }

    /// All writes concatenated, handy for asserting on command text.
    pub fn written_text(&self) -> String {
        let state = self.state.lock();
        String::from_utf8_lossy(&state.write_log.concat()).into_owned()
    }

    /// Clear the write log.
    pub fn clear_write_log(&self) {
        self.state.lock().write_log.clear();
    }

    /// Make every following read fail.
    pub fn set_fail_reads(&self, fail: bool) {
        self.state.lock().fail_reads = fail;
    }

    /// Make every following write fail.
    pub fn set_fail_writes(&self, fail: bool) {
        self.state.lock().fail_writes = fail;
    }

    /// Number of chunks not yet consumed by a reader.
    pub fn pending_chunks(&self) -> usize {
        self.state.lock().read_queue.len()
    }

    /// Number of live handles (this one and every clone not yet dropped).
    pub fn open_handles(&self) -> usize {
        self.state.lock().open_handles
    }

    /// Number of reads that returned an error. A reader that stops at the
    /// first failure leaves this at one.
    pub fn failed_reads(&self) -> usize {
        self.state.lock().failed_reads
    }

    fn share(&self) -> Self {
        self.state.lock().open_handles += 1;
        Self {
            name: self.name.clone(),
            state: Arc::clone(&self.state),
        }
    }
}

impl Clone for MockSerialPort {
    fn clone(&self) -> Self {
        self.share()
    }
}

impl Drop for MockSerialPort {
    fn drop(&mut self) {
        let mut state = self.state.lock();
        state.open_handles = state.open_handles.saturating_sub(1);
    }
}

impl SerialPortAdapter for MockSerialPort {
    fn write_bytes(&mut self, data: &[u8]) -> Result<usize, PortError> {
        let mut state = self.state.lock();
        if state.fail_writes {
            return Err(PortError::disconnected(format!("{} write failed", self.name)));
        }
        state.write_log.push(data.to_vec());
        Ok(data.len())
    }

    fn read_available(&mut self) -> Result<Vec<u8>, PortError> {
        let mut state = self.state.lock();
        if state.fail_reads {
            state.failed_reads += 1;
            return Err(PortError::disconnected(format!("{} read failed", self.name)));
        }
        Ok(state.read_queue.pop_front().unwrap_or_default())
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn try_clone_adapter(&self) -> Result<Box<dyn SerialPortAdapter>, PortError> {
        Ok(Box::new(self.share()))
    }
}

impl std::fmt::Debug for MockSerialPort {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockSerialPort")
            .field("name", &self.name)
            .field("pending_chunks", &self.pending_chunks())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_enqueue_and_read_chunkwise() {
        let mut port = MockSerialPort::new("MOCK0");
        port.enqueue_read(b"PUMP 1 ");
        port.enqueue_read(b"TMP: 25.0\r\n");

        assert_eq!(port.read_available().unwrap(), b"PUMP 1 ");
        assert_eq!(port.pending_chunks(), 1);
        assert_eq!(port.read_available().unwrap(), b"TMP: 25.0\r\n");
        assert!(port.read_available().unwrap().is_empty());
    }

    #[test]
    fn test_write_logging() {
        let mut port = MockSerialPort::new("MOCK0");
        port.write_bytes(b"hipump\r\n").unwrap();
        port.write_bytes(b"pump\r\n").unwrap();

        let log = port.get_write_log();
        assert_eq!(log.len(), 2);
        assert_eq!(port.written_text(), "hipump\r\npump\r\n");

        port.clear_write_log();
        assert!(port.get_write_log().is_empty());
    }

    #[test]
    fn test_clones_share_state() {
        let port = MockSerialPort::new("MOCK0");
        let mut reader = port.try_clone_adapter().unwrap();
        assert_eq!(port.open_handles(), 2);

        port.enqueue_read(b"x");
        assert_eq!(reader.read_available().unwrap(), b"x");

        drop(reader);
        assert_eq!(port.open_handles(), 1);
    }

    #[test]
    fn test_failure_injection() {
        let mut port = MockSerialPort::new("MOCK0");
        port.set_fail_reads(true);
        assert!(matches!(
            port.read_available(),
            Err(PortError::Disconnected(_))
        ));
        assert_eq!(port.failed_reads(), 1);

        port.set_fail_writes(true);
        assert!(port.write_bytes(b"pump\r\n").is_err());
        assert!(port.get_write_log().is_empty());
    }
}
