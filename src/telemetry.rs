//! Latest reported values per pump channel.

use crate::protocol::Attribute;
use parking_lot::RwLock;
use serde::Serialize;
use std::sync::Arc;

/// Number of telemetry rows: two HIPUMP channels then four PUMP channels.
pub const SLOT_COUNT: usize = 6;

/// Shown until the controller reports a value.
pub const PLACEHOLDER: &str = "00.00";

/// Values are kept as the controller printed them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PumpTelemetry {
    pub voltage: String,
    pub current: String,
    pub temperature: String,
}

impl Default for PumpTelemetry {
    fn default() -> Self {
        Self {
            voltage: PLACEHOLDER.to_string(),
            current: PLACEHOLDER.to_string(),
            temperature: PLACEHOLDER.to_string(),
        }
    }
}

impl PumpTelemetry {
    pub fn get(&self, attribute: Attribute) -> &str {
        match attribute {
            Attribute::Voltage => &self.voltage,
            Attribute::Current => &self.current,
            Attribute::Temperature => &self.temperature,
        }
    }

    fn field_mut(&mut self, attribute: Attribute) -> &mut String {
        match attribute {
            Attribute::Voltage => &mut self.voltage,
            Attribute::Current => &mut self.current,
            Attribute::Temperature => &mut self.temperature,
        }
    }
}

/// Shared handle to the telemetry rows. Clones see the same data.
#[derive(Debug, Clone, Default)]
pub struct TelemetryTable {
    rows: Arc<RwLock<[PumpTelemetry; SLOT_COUNT]>>,
}

impl TelemetryTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `value` for `attribute` of `slot`. Returns `false` for an
    /// unknown slot, leaving the table untouched.
    pub fn update(&self, slot: usize, attribute: Attribute, value: &str) -> bool {
        let mut rows = self.rows.write();
        match rows.get_mut(slot) {
            Some(row) => {
                let field = row.field_mut(attribute);
                field.clear();
                field.push_str(value);
                true
            }
            None => false,
        }
    }

    pub fn read(&self, slot: usize) -> Option<PumpTelemetry> {
        self.rows.read().get(slot).cloned()
    }

    pub fn snapshot(&self) -> Vec<PumpTelemetry> {
        self.rows.read().to_vec()
    }

    /// Restore every field to the placeholder.
    pub fn reset(&self) {
        let mut rows = self.rows.write();
        for row in rows.iter_mut() {
            *row = PumpTelemetry::default();
        }
    }
}
