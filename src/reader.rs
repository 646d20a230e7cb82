//! Background reader thread.
//!
//! The reader owns a cloned port handle and forwards every non-empty chunk
//! through an mpsc channel. It never decodes; framing happens on the
//! consumer side so chunk boundaries cannot leak into line handling.

use crate::port::{PortError, SerialPortAdapter};
use crate::state::Counters;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::{debug, warn};

/// Pause between empty reads.
pub const DEFAULT_IDLE_BACKOFF: Duration = Duration::from_millis(5);

/// Events produced by the reader thread.
#[derive(Debug)]
pub enum ReaderEvent {
    /// Bytes received, in arrival order.
    Data(Vec<u8>),
    /// The connection broke. Sent at most once; the thread exits after it.
    Failed(PortError),
}

/// Handle to a running reader thread.
#[derive(Debug)]
pub struct ReaderTask {
    running: Arc<AtomicBool>,
    handle: Option<thread::JoinHandle<()>>,
}

impl ReaderTask {
    /// Start reading from `port` on a dedicated thread.
    pub fn spawn(
        mut port: Box<dyn SerialPortAdapter>,
        counters: Arc<Counters>,
        sender: mpsc::Sender<ReaderEvent>,
        idle_backoff: Duration,
    ) -> Result<Self, PortError> {
        let running = Arc::new(AtomicBool::new(true));
        let flag = running.clone();
        let name = format!("reader-{}", port.name());

        let handle = thread::Builder::new().name(name).spawn(move || {
            debug!(port = port.name(), "reader started");
            while flag.load(Ordering::Acquire) {
                match port.read_available() {
                    Ok(chunk) if chunk.is_empty() => thread::sleep(idle_backoff),
                    Ok(chunk) => {
                        counters.add_received(chunk.len() as u64);
                        if sender.send(ReaderEvent::Data(chunk)).is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        warn!(port = port.name(), error = %e, "read failed");
                        let _ = sender.send(ReaderEvent::Failed(e));
                        break;
                    }
                }
            }
            debug!(port = port.name(), "reader stopped");
        })?;

        Ok(Self {
            running,
            handle: Some(handle),
        })
    }

    /// Whether the thread is still looping.
    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Ask the thread to exit and wait for it. Safe to call repeatedly.
    pub fn stop(&mut self) {
        self.running.store(false, Ordering::Release);
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                warn!("reader thread panicked");
            }
        }
    }
}

impl Drop for ReaderTask {
    fn drop(&mut self) {
        self.stop();
    }
}
