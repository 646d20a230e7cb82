//! Arbitration between automatic polling and manual commands.
//!
//! The scheduler is a clock-injected state machine: the host passes `now` into
//! every call, so it can run on any single-threaded timer loop and be tested
//! without sleeping.
//!
//! ```text
//!                manual send
//!   Automatic ───────────────▶ ManualOverride(now + 3 s)
//!       ▲                         │   ▲
//!       │     expiry passed       │   │ manual send (expiry restarts)
//!       └─────────────────────────┘   └──┘
//! ```

use crate::error::ValidationError;
use std::time::{Duration, Instant};
use tracing::debug;

/// How long polling stays suspended after the most recent manual send.
pub const MANUAL_OVERRIDE_WINDOW: Duration = Duration::from_millis(3000);

pub const MIN_SAMPLING_INTERVAL_MS: u64 = 100;
pub const MAX_SAMPLING_INTERVAL_MS: u64 = 5000;
pub const DEFAULT_SAMPLING_INTERVAL_MS: u64 = 1000;

/// Which command source currently owns the link.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerMode {
    Automatic,
    ManualOverride { expires_at: Instant },
}

impl SchedulerMode {
    pub fn name(&self) -> &'static str {
        match self {
            SchedulerMode::Automatic => "automatic",
            SchedulerMode::ManualOverride { .. } => "manual",
        }
    }
}

/// Something the host has to act on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerEvent {
    /// Time to write the poll commands.
    PollDue,
    /// The manual window closed; the mode is Automatic again.
    OverrideExpired,
}

/// Validate a sampling interval in milliseconds.
pub fn validate_interval(ms: u64) -> Result<Duration, ValidationError> {
    if (MIN_SAMPLING_INTERVAL_MS..=MAX_SAMPLING_INTERVAL_MS).contains(&ms) {
        Ok(Duration::from_millis(ms))
    } else {
        Err(ValidationError::IntervalOutOfRange {
            value: ms,
            min: MIN_SAMPLING_INTERVAL_MS,
            max: MAX_SAMPLING_INTERVAL_MS,
        })
    }
}

#[derive(Debug, Clone)]
pub struct CommandScheduler {
    mode: SchedulerMode,
    interval: Duration,
    /// Polling is wanted (a connection is open).
    armed: bool,
    /// Next poll deadline; `None` while suspended or disarmed.
    next_poll: Option<Instant>,
}

impl Default for CommandScheduler {
    fn default() -> Self {
        Self::new(Duration::from_millis(DEFAULT_SAMPLING_INTERVAL_MS))
    }
}

impl CommandScheduler {
    pub fn new(interval: Duration) -> Self {
        Self {
            mode: SchedulerMode::Automatic,
            interval,
            armed: false,
            next_poll: None,
        }
    }

    pub fn mode(&self) -> SchedulerMode {
        self.mode
    }

    pub fn is_manual(&self) -> bool {
        matches!(self.mode, SchedulerMode::ManualOverride { .. })
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn is_armed(&self) -> bool {
        self.armed
    }

    /// Arm polling; the first poll is one interval from `now`.
    pub fn start(&mut self, now: Instant) {
        self.armed = true;
        self.next_poll = match self.mode {
            SchedulerMode::Automatic => Some(now + self.interval),
            SchedulerMode::ManualOverride { .. } => None,
        };
    }

    /// Disarm polling. Mode is left alone so a pending override still expires.
    pub fn stop(&mut self) {
        self.armed = false;
        self.next_poll = None;
    }

    /// Enter (or restart) the manual override window.
    pub fn record_manual_send(&mut self, now: Instant) {
        let expires_at = now + MANUAL_OVERRIDE_WINDOW;
        if !self.is_manual() {
            debug!("scheduler entering manual override");
        }
        self.mode = SchedulerMode::ManualOverride { expires_at };
        self.next_poll = None;
    }

    /// Change the polling interval. A running timer restarts from `now`.
    pub fn set_interval(&mut self, ms: u64, now: Instant) -> Result<(), ValidationError> {
        self.interval = validate_interval(ms)?;
        if self.armed && self.mode == SchedulerMode::Automatic {
            self.next_poll = Some(now + self.interval);
        }
        Ok(())
    }

    /// Earliest instant at which [`poll`](Self::poll) can return an event.
    pub fn next_deadline(&self) -> Option<Instant> {
        match self.mode {
            SchedulerMode::ManualOverride { expires_at } => Some(expires_at),
            SchedulerMode::Automatic => self.next_poll,
        }
    }

    /// Advance the state machine to `now`.
    ///
    /// Returns at most one event per call; call again until `None` to catch up.
    pub fn poll(&mut self, now: Instant) -> Option<SchedulerEvent> {
        if let SchedulerMode::ManualOverride { expires_at } = self.mode {
            if now < expires_at {
                return None;
            }
            self.mode = SchedulerMode::Automatic;
            // Polling resumes one full interval after reversion; phase is not kept.
            self.next_poll = self.armed.then(|| now + self.interval);
            debug!("manual override expired, polling resumes");
            return Some(SchedulerEvent::OverrideExpired);
        }

        match self.next_poll {
            Some(due) if self.armed && now >= due => {
                self.next_poll = Some(now + self.interval);
                Some(SchedulerEvent::PollDue)
            }
            _ => None,
        }
    }
}
