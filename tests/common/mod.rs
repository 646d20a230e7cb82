//! Shared test utilities for pumpctl integration tests.
//!
//! - Mock ports attached to a `PumpService`
//! - Polling helpers that tick the service until a condition holds
//! - Canned controller replies

#![allow(dead_code)]

use pumpctl::port::MockSerialPort;
use pumpctl::service::{Notification, PumpService};
use pumpctl::state::PortConfig;
use pumpctl::TextEncoding;
use std::time::{Duration, Instant};
use tokio::sync::mpsc::UnboundedReceiver;

/// Upper bound for anything that waits on the reader thread.
pub const WAIT_LIMIT: Duration = Duration::from_secs(3);

/// A controller reply to `hipump\r\n` followed by `pump\r\n`.
pub const POLL_REPLY: &[u8] = b"HIPUMP 1 ILD: 3.21\r\nHIPUMP 1 TMP: 24.8\r\nHIPUMP 2 VPPS: 12.02\r\n\
PUMP 1 ILD: 250\r\nPUMP 3 TMP: 25.0\r\nPUMP 4 VPPS: 5.01\r\n";

/// Service attached to a fresh mock port, default 1000 ms polling.
pub struct Harness {
    pub service: PumpService,
    pub notifications: UnboundedReceiver<Notification>,
    pub mock: MockSerialPort,
    pub opened_at: Instant,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_encoding(TextEncoding::Utf8)
    }

    pub fn with_encoding(encoding: TextEncoding) -> Self {
        let (service, notifications) = PumpService::new(Duration::from_millis(1000));
        let mut service = service.with_idle_backoff(Duration::from_millis(1));
        let mock = MockSerialPort::new("MOCK0");
        let mut config = PortConfig::new("MOCK0");
        config.encoding = encoding;
        let opened_at = Instant::now();
        service
            .attach(config, Box::new(mock.clone()), opened_at)
            .expect("attach mock port");
        Self {
            service,
            notifications,
            mock,
            opened_at,
        }
    }

    /// Instant `ms` milliseconds after the connection was opened.
    pub fn at(&self, ms: u64) -> Instant {
        self.opened_at + Duration::from_millis(ms)
    }

    /// Tick at `now` until `done` holds or [`WAIT_LIMIT`] of wall time passes.
    pub fn tick_until(&mut self, now: Instant, mut done: impl FnMut(&mut Self) -> bool) -> bool {
        let deadline = Instant::now() + WAIT_LIMIT;
        loop {
            self.service.tick(now);
            if done(self) {
                return true;
            }
            if Instant::now() >= deadline {
                return false;
            }
            std::thread::sleep(Duration::from_millis(2));
        }
    }

    /// Tick at `now` until the mock has no unread chunks and the reader
    /// events they produced have been drained.
    pub fn deliver(&mut self, now: Instant) {
        let delivered = self.tick_until(now, |h| h.mock.pending_chunks() == 0);
        assert!(delivered, "reader did not consume queued chunks");
        // The last chunk may still be in flight between reader and channel.
        std::thread::sleep(Duration::from_millis(20));
        self.service.tick(now);
    }

    /// Everything notified so far.
    pub fn drain(&mut self) -> Vec<Notification> {
        let mut out = Vec::new();
        while let Ok(n) = self.notifications.try_recv() {
            out.push(n);
        }
        out
    }
}

/// Split `data` at each index in `cuts` (sorted, deduplicated, in range).
pub fn split_at_cuts(data: &[u8], cuts: &[usize]) -> Vec<Vec<u8>> {
    let mut chunks = Vec::new();
    let mut start = 0;
    for &cut in cuts {
        if cut > start && cut < data.len() {
            chunks.push(data[start..cut].to_vec());
            start = cut;
        }
    }
    chunks.push(data[start..].to_vec());
    chunks
}
