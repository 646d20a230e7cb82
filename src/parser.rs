//! Telemetry line interpretation.
//!
//! The controller answers a poll with one line per value:
//!
//! ```text
//! HIPUMP 1 ILD: 3.21
//! PUMP 3 TMP: 25.0
//! ```

use crate::error::ParseError;
use crate::protocol::{Attribute, PumpFamily};
use crate::telemetry::TelemetryTable;
use serde::Serialize;
use tracing::debug;

/// One value reported by the controller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PumpReading {
    pub family: PumpFamily,
    /// Channel within the family, 0-based.
    pub index: usize,
    pub attribute: Attribute,
    /// Verbatim value token; empty when the controller sent none.
    pub value: String,
}

impl PumpReading {
    /// Row in the telemetry table.
    pub fn slot(&self) -> usize {
        self.family.slot_offset() + self.index
    }
}

/// Parse a single terminated line.
pub fn parse_reading(line: &str) -> Result<PumpReading, ParseError> {
    let tokens: Vec<&str> = line.split_whitespace().collect();
    if tokens.len() < 3 {
        return Err(ParseError::TooFewTokens(tokens.len()));
    }

    // HIPUMP contains PUMP, so it must be tried first.
    let family = if tokens[0].starts_with(PumpFamily::HiPump.prefix()) {
        PumpFamily::HiPump
    } else if tokens[0].starts_with(PumpFamily::Pump.prefix()) {
        PumpFamily::Pump
    } else {
        return Err(ParseError::UnknownFamily(tokens[0].to_string()));
    };

    let number: i64 = tokens[1]
        .parse()
        .map_err(|_| ParseError::InvalidIndex(tokens[1].to_string()))?;
    let index = match number.checked_sub(1) {
        Some(index) if (0..family.channels() as i64).contains(&index) => index,
        _ => {
            return Err(ParseError::IndexOutOfRange {
                family: family.prefix(),
                index: number,
            })
        }
    };

    let attribute_token = tokens[2].trim_end_matches(':');
    let attribute = Attribute::from_token(attribute_token)
        .ok_or_else(|| ParseError::UnknownAttribute(attribute_token.to_string()))?;

    Ok(PumpReading {
        family,
        index: index as usize,
        attribute,
        value: tokens.get(3).copied().unwrap_or_default().to_string(),
    })
}

/// Applies parsed readings to a [`TelemetryTable`].
#[derive(Debug, Clone)]
pub struct TelemetryParser {
    table: TelemetryTable,
}

impl TelemetryParser {
    pub fn new(table: TelemetryTable) -> Self {
        Self { table }
    }

    pub fn table(&self) -> &TelemetryTable {
        &self.table
    }

    /// Parse `line` and store the reading. Unrecognised lines are logged and
    /// dropped.
    pub fn apply(&self, line: &str) -> Option<PumpReading> {
        match parse_reading(line) {
            Ok(reading) => {
                self.table
                    .update(reading.slot(), reading.attribute, &reading.value);
                Some(reading)
            }
            Err(e) => {
                debug!(line, error = %e, "ignoring telemetry line");
                None
            }
        }
    }
}
