//! Service layer for pump controller sessions.
//!
//! `PumpService` owns the connection lifecycle and is the only writer to the
//! port. It is driven cooperatively: the host calls [`PumpService::tick`] from
//! its timer loop, which drains reader events, routes decoded lines, and runs
//! the command scheduler.
//!
//! # Architecture
//!
//! ```text
//!  reader thread ──ReaderEvent──▶ tick() ──▶ LineDecoder ──┬─▶ TelemetryParser ─▶ TelemetryTable
//!                                   │                      └─▶ Notification::Line
//!                                   └──▶ CommandScheduler ──▶ poll commands ─▶ port
//! host ──send_manual / send_setpoint──────────────────────────────────────────▶ port
//! ```

use crate::{
    decoder::{Line, LineDecoder},
    error::ValidationError,
    parser::{PumpReading, TelemetryParser},
    payload::ManualPayload,
    port::{self, PortDescriptor, PortError, SyncSerialPort},
    protocol::{PumpId, Setpoint, POLL_COMMANDS},
    reader::{ReaderEvent, ReaderTask, DEFAULT_IDLE_BACKOFF},
    scheduler::{CommandScheduler, SchedulerEvent, SchedulerMode},
    state::{ConnectionState, CounterSnapshot, Counters, OpenConnection, PortAdapter, PortConfig},
    telemetry::TelemetryTable,
};
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use tracing::{debug, error, info};

// ========== Error Types ==========

/// Errors returned by the control surface.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Operation needs an open connection
    #[error("Port is not open")]
    PortNotOpen,

    /// Opening, reading or writing failed; the connection has been closed
    #[error("Connection error: {0}")]
    Connection(#[from] PortError),

    /// Input rejected before anything was sent
    #[error("Invalid input: {0}")]
    Validation(#[from] ValidationError),
}

/// Convenient Result type for service operations
pub type ServiceResult<T> = Result<T, ServiceError>;

// ========== Request/Response DTOs ==========

/// Result from opening a port
#[derive(Debug, Clone, Serialize)]
pub struct OpenResult {
    pub device: String,
    pub baud_rate: u32,
    pub encoding: String,
    pub message: String,
}

/// Result from closing a port
#[derive(Debug, Clone, Serialize)]
pub struct CloseResult {
    pub message: String,
}

/// Result from writing data
#[derive(Debug, Clone, Serialize)]
pub struct WriteResult {
    pub bytes_written: usize,
    pub bytes_sent_total: u64,
}

/// Result from applying a setpoint
#[derive(Debug, Clone, Serialize)]
pub struct SetpointResult {
    pub pump: PumpId,
    pub amps: f64,
    pub bytes_written: usize,
    pub bytes_sent_total: u64,
}

/// Session status information
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "state", rename_all = "PascalCase")]
pub enum StatusResult {
    Closed {
        counters: CounterSnapshot,
    },
    Open {
        config: PortConfig,
        mode: String,
        sampling_interval_ms: u64,
        counters: CounterSnapshot,
        open_duration_ms: u64,
    },
}

/// What one [`PumpService::tick`] did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickSummary {
    pub lines: usize,
    pub readings: usize,
    pub polls_sent: usize,
    pub override_expired: bool,
    pub connection_lost: bool,
}

/// Pushed to the host as things happen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    /// Raw line received while a manual command owns the link.
    Line(Line),
    /// Telemetry value applied to the table.
    Reading(PumpReading),
    /// The connection broke and was closed.
    ConnectionLost { device: String, reason: String },
}

// ========== Service Implementation ==========

/// Pump controller session: one connection, its reader, and the scheduler.
#[derive(Debug)]
pub struct PumpService {
    connection: ConnectionState,
    scheduler: CommandScheduler,
    parser: TelemetryParser,
    counters: Arc<Counters>,
    notifications: UnboundedSender<Notification>,
    idle_backoff: Duration,
}

impl PumpService {
    /// Create a closed service polling every `sampling_interval` once opened.
    pub fn new(sampling_interval: Duration) -> (Self, UnboundedReceiver<Notification>) {
        let (tx, rx) = unbounded_channel();
        let service = Self {
            connection: ConnectionState::Closed,
            scheduler: CommandScheduler::new(sampling_interval),
            parser: TelemetryParser::new(TelemetryTable::new()),
            counters: Arc::new(Counters::default()),
            notifications: tx,
            idle_backoff: DEFAULT_IDLE_BACKOFF,
        };
        (service, rx)
    }

    /// Override the reader's pause between empty reads.
    pub fn with_idle_backoff(mut self, backoff: Duration) -> Self {
        self.idle_backoff = backoff;
        self
    }

    /// Enumerate serial devices on this machine.
    pub fn available_ports() -> ServiceResult<Vec<PortDescriptor>> {
        Ok(port::available_ports()?)
    }

    /// Open the device named in `config`. An open connection is closed first.
    ///
    /// # Errors
    ///
    /// - `ServiceError::Connection` if the device cannot be opened
    pub fn open(&mut self, config: PortConfig, now: Instant) -> ServiceResult<OpenResult> {
        self.close();
        let port = SyncSerialPort::open(&config.device, config.framing())?;
        self.attach(config, Box::new(port), now)
    }

    /// Start a session over an already opened adapter.
    ///
    /// `open` delegates here; tests pass a `MockSerialPort`.
    pub fn attach(
        &mut self,
        config: PortConfig,
        port: PortAdapter,
        now: Instant,
    ) -> ServiceResult<OpenResult> {
        self.close();

        let (tx, rx) = std::sync::mpsc::channel();
        let reader_port = port.try_clone_adapter()?;
        let reader = ReaderTask::spawn(reader_port, self.counters.clone(), tx, self.idle_backoff)?;

        info!(
            device = %config.device,
            baud = config.baud_rate.as_u32(),
            encoding = %config.encoding,
            "connection opened"
        );

        let result = OpenResult {
            device: config.device.clone(),
            baud_rate: config.baud_rate.as_u32(),
            encoding: config.encoding.to_string(),
            message: "opened".to_string(),
        };

        self.connection = ConnectionState::Open(Box::new(OpenConnection {
            port,
            decoder: LineDecoder::new(config.encoding),
            config,
            reader,
            events: rx,
            opened_at: now,
        }));
        self.scheduler.start(now);

        Ok(result)
    }

    /// Close the connection.
    ///
    /// The reader is joined before the handles are dropped and any events it
    /// queued are discarded. Idempotent.
    pub fn close(&mut self) -> CloseResult {
        let message = match std::mem::take(&mut self.connection) {
            ConnectionState::Closed => "already closed",
            ConnectionState::Open(mut conn) => {
                conn.reader.stop();
                let discarded = conn.events.try_iter().count();
                if discarded > 0 {
                    debug!(discarded, "dropped reader events queued before close");
                }
                self.scheduler.stop();
                info!(device = %conn.config.device, "connection closed");
                "closed"
            }
        };
        CloseResult {
            message: message.to_string(),
        }
    }

    /// Send user-composed data immediately, then suspend polling.
    ///
    /// # Errors
    ///
    /// - `ServiceError::PortNotOpen` if no connection is open
    /// - `ServiceError::Validation` for malformed hex
    /// - `ServiceError::Connection` if the write fails (the connection is closed)
    pub fn send_manual(&mut self, payload: &ManualPayload, now: Instant) -> ServiceResult<WriteResult> {
        let encoding = match &self.connection {
            ConnectionState::Open(conn) => conn.config.encoding,
            ConnectionState::Closed => return Err(ServiceError::PortNotOpen),
        };
        let bytes = payload.to_bytes(encoding)?;
        let written = self.write_chunks(&[bytes.as_slice()])?;
        self.scheduler.record_manual_send(now);
        Ok(WriteResult {
            bytes_written: written,
            bytes_sent_total: self.counters.snapshot().bytes_sent,
        })
    }

    /// Validate and apply a current setpoint.
    ///
    /// Input is checked before the connection, so a bad value is reported
    /// even while closed.
    pub fn send_setpoint(
        &mut self,
        pump: PumpId,
        input: &str,
        now: Instant,
    ) -> ServiceResult<SetpointResult> {
        let setpoint = Setpoint::parse(pump, input)?;
        if !self.connection.is_open() {
            return Err(ServiceError::PortNotOpen);
        }
        let commands = setpoint.commands();
        let chunks: Vec<&[u8]> = commands.iter().map(|c| c.as_bytes()).collect();
        let written = self.write_chunks(&chunks)?;
        self.scheduler.record_manual_send(now);
        info!(pump = %pump, amps = setpoint.amps(), "setpoint applied");
        Ok(SetpointResult {
            pump,
            amps: setpoint.amps(),
            bytes_written: written,
            bytes_sent_total: self.counters.snapshot().bytes_sent,
        })
    }

    /// Change the polling interval (100..=5000 ms).
    pub fn set_sampling_interval(&mut self, ms: u64, now: Instant) -> ServiceResult<()> {
        self.scheduler.set_interval(ms, now)?;
        debug!(ms, "sampling interval changed");
        Ok(())
    }

    /// Drain reader events and run the scheduler up to `now`.
    pub fn tick(&mut self, now: Instant) -> TickSummary {
        let mut summary = TickSummary::default();

        if let Some(failure) = self.drain_reader(&mut summary) {
            self.lose_connection(&failure);
            summary.connection_lost = true;
        }

        while let Some(event) = self.scheduler.poll(now) {
            match event {
                SchedulerEvent::OverrideExpired => summary.override_expired = true,
                SchedulerEvent::PollDue => {
                    if !self.connection.is_open() {
                        continue;
                    }
                    match self.write_chunks(&POLL_COMMANDS) {
                        Ok(_) => summary.polls_sent += 1,
                        Err(_) => summary.connection_lost = true,
                    }
                }
            }
        }

        summary
    }

    fn drain_reader(&mut self, summary: &mut TickSummary) -> Option<PortError> {
        let ConnectionState::Open(conn) = &mut self.connection else {
            return None;
        };
        let manual = self.scheduler.is_manual();

        while let Ok(event) = conn.events.try_recv() {
            let chunk = match event {
                ReaderEvent::Data(chunk) => chunk,
                ReaderEvent::Failed(e) => return Some(e),
            };
            for line in conn.decoder.ingest(&chunk) {
                summary.lines += 1;
                if manual {
                    let _ = self.notifications.send(Notification::Line(line));
                    continue;
                }
                // Prompts only matter to someone typing commands.
                if let Line::Terminated { text, .. } = &line {
                    if let Some(reading) = self.parser.apply(text) {
                        summary.readings += 1;
                        let _ = self.notifications.send(Notification::Reading(reading));
                    }
                }
            }
        }
        None
    }

    /// Write each chunk in order, counting what went out. A failure closes
    /// the connection and notifies the host.
    fn write_chunks(&mut self, chunks: &[&[u8]]) -> ServiceResult<usize> {
        let ConnectionState::Open(conn) = &mut self.connection else {
            return Err(ServiceError::PortNotOpen);
        };

        let mut total = 0;
        let mut failure = None;
        for chunk in chunks {
            match conn.port.write_bytes(chunk) {
                Ok(n) => {
                    self.counters.add_sent(n as u64);
                    total += n;
                }
                Err(e) => {
                    failure = Some(e);
                    break;
                }
            }
        }

        match failure {
            None => Ok(total),
            Some(e) => {
                self.lose_connection(&e);
                Err(ServiceError::Connection(e))
            }
        }
    }

    fn lose_connection(&mut self, reason: &PortError) {
        let device = match self.connection.config() {
            Some(config) => config.device.clone(),
            None => return,
        };
        error!(device = %device, error = %reason, "connection lost");
        self.close();
        let _ = self.notifications.send(Notification::ConnectionLost {
            device,
            reason: reason.to_string(),
        });
    }

    // ========== Accessors ==========

    pub fn is_open(&self) -> bool {
        self.connection.is_open()
    }

    pub fn config(&self) -> Option<&PortConfig> {
        self.connection.config()
    }

    /// Shared handle onto the latest telemetry.
    pub fn telemetry(&self) -> TelemetryTable {
        self.parser.table().clone()
    }

    pub fn counters(&self) -> CounterSnapshot {
        self.counters.snapshot()
    }

    pub fn mode(&self) -> SchedulerMode {
        self.scheduler.mode()
    }

    pub fn sampling_interval(&self) -> Duration {
        self.scheduler.interval()
    }

    /// When the next tick can have scheduler work to do.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.scheduler.next_deadline()
    }

    pub fn status(&self, now: Instant) -> StatusResult {
        let counters = self.counters.snapshot();
        match &self.connection {
            ConnectionState::Closed => StatusResult::Closed { counters },
            ConnectionState::Open(conn) => StatusResult::Open {
                config: conn.config.clone(),
                mode: self.scheduler.mode().name().to_string(),
                sampling_interval_ms: self.scheduler.interval().as_millis() as u64,
                counters,
                open_duration_ms: now.saturating_duration_since(conn.opened_at).as_millis() as u64,
            },
        }
    }
}

impl Drop for PumpService {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::port::MockSerialPort;

    fn service() -> (PumpService, UnboundedReceiver<Notification>) {
        let (service, rx) = PumpService::new(Duration::from_millis(1000));
        (service.with_idle_backoff(Duration::from_millis(1)), rx)
    }

    #[test]
    fn test_service_creation() {
        let (svc, _rx) = service();
        assert!(!svc.is_open());
        assert_eq!(svc.mode(), SchedulerMode::Automatic);
        assert_eq!(svc.counters(), CounterSnapshot::default());
    }

    #[test]
    fn test_close_when_already_closed() {
        let (mut svc, _rx) = service();
        assert_eq!(svc.close().message, "already closed");
    }

    #[test]
    fn test_send_when_not_open() {
        let (mut svc, _rx) = service();
        let now = Instant::now();
        assert!(matches!(
            svc.send_manual(&ManualPayload::text("pump", true), now),
            Err(ServiceError::PortNotOpen)
        ));
        assert!(matches!(
            svc.send_setpoint(PumpId::HiPump1, "3", now),
            Err(ServiceError::PortNotOpen)
        ));
    }

    #[test]
    fn test_setpoint_validated_before_connection_check() {
        let (mut svc, _rx) = service();
        assert!(matches!(
            svc.send_setpoint(PumpId::HiPump1, "12", Instant::now()),
            Err(ServiceError::Validation(ValidationError::OutOfRange { .. }))
        ));
    }

    #[test]
    fn test_attach_and_close() {
        let (mut svc, _rx) = service();
        let mock = MockSerialPort::new("MOCK0");
        let now = Instant::now();

        let opened = svc
            .attach(PortConfig::new("MOCK0"), Box::new(mock.clone()), now)
            .unwrap();
        assert_eq!(opened.message, "opened");
        assert_eq!(opened.baud_rate, 115_200);
        assert!(svc.is_open());
        assert!(matches!(svc.status(now), StatusResult::Open { .. }));

        assert_eq!(svc.close().message, "closed");
        assert_eq!(mock.open_handles(), 1);
        assert!(matches!(svc.status(now), StatusResult::Closed { .. }));
    }

    #[test]
    fn test_interval_validation() {
        let (mut svc, _rx) = service();
        let now = Instant::now();
        assert!(svc.set_sampling_interval(100, now).is_ok());
        assert!(matches!(
            svc.set_sampling_interval(99, now),
            Err(ServiceError::Validation(ValidationError::IntervalOutOfRange { .. }))
        ));
        assert_eq!(svc.sampling_interval(), Duration::from_millis(100));
    }
}
