//! Controller command vocabulary.
//!
//! Two device families share the link. `HIPUMP` channels take currents in
//! amperes; the `PUMP` channels are entered in milliamperes. The fourth
//! "pump" on the front panel is physically the third high-power channel and
//! is addressed as `hipump 3`.

use crate::error::ValidationError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Commands written on every automatic poll, in order.
pub const POLL_COMMANDS: [&[u8]; 2] = [b"hipump\r\n", b"pump\r\n"];

/// Highest current any channel accepts, in amperes.
pub const MAX_SETPOINT_AMPS: f64 = 11.5;

/// Device family as it appears at the start of a telemetry line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PumpFamily {
    HiPump,
    Pump,
}

impl PumpFamily {
    /// Upper-case token the controller prints.
    pub fn prefix(self) -> &'static str {
        match self {
            PumpFamily::HiPump => "HIPUMP",
            PumpFamily::Pump => "PUMP",
        }
    }

    /// Number of channels reported under this family.
    pub fn channels(self) -> usize {
        match self {
            PumpFamily::HiPump => 2,
            PumpFamily::Pump => 4,
        }
    }

    /// First telemetry slot belonging to this family.
    pub fn slot_offset(self) -> usize {
        match self {
            PumpFamily::HiPump => 0,
            PumpFamily::Pump => 2,
        }
    }
}

impl fmt::Display for PumpFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.prefix())
    }
}

/// Quantity reported in a telemetry line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Attribute {
    /// `ILD`, laser diode current.
    Current,
    /// `TMP`
    Temperature,
    /// `VPPS`, supply voltage.
    Voltage,
}

impl Attribute {
    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            "ILD" => Some(Attribute::Current),
            "TMP" => Some(Attribute::Temperature),
            "VPPS" => Some(Attribute::Voltage),
            _ => None,
        }
    }

    pub fn token(self) -> &'static str {
        match self {
            Attribute::Current => "ILD",
            Attribute::Temperature => "TMP",
            Attribute::Voltage => "VPPS",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Unit {
    #[serde(rename = "A")]
    Amps,
    #[serde(rename = "mA")]
    Milliamps,
}

impl Unit {
    fn to_amps(self, value: f64) -> f64 {
        match self {
            Unit::Amps => value,
            Unit::Milliamps => value / 1000.0,
        }
    }
}

/// Static description of one controllable channel.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PumpWiring {
    pub label: &'static str,
    /// Command prefix on the wire.
    pub device: &'static str,
    /// Channel number on the wire, 1-based.
    pub address: u8,
    pub input_unit: Unit,
    pub wire_unit: Unit,
}

/// The six channels a user can drive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PumpId {
    HiPump1,
    HiPump2,
    Pump1,
    Pump2,
    Pump3,
    Pump4,
}

const PUMP_TABLE: [PumpWiring; 6] = [
    PumpWiring {
        label: "HIPUMP 1",
        device: "hipump",
        address: 1,
        input_unit: Unit::Amps,
        wire_unit: Unit::Amps,
    },
    PumpWiring {
        label: "HIPUMP 2",
        device: "hipump",
        address: 2,
        input_unit: Unit::Amps,
        wire_unit: Unit::Amps,
    },
    PumpWiring {
        label: "PUMP 1",
        device: "pump",
        address: 1,
        input_unit: Unit::Milliamps,
        wire_unit: Unit::Milliamps,
    },
    PumpWiring {
        label: "PUMP 2",
        device: "pump",
        address: 2,
        input_unit: Unit::Milliamps,
        wire_unit: Unit::Milliamps,
    },
    PumpWiring {
        label: "PUMP 3",
        device: "pump",
        address: 3,
        input_unit: Unit::Milliamps,
        wire_unit: Unit::Milliamps,
    },
    PumpWiring {
        label: "PUMP 4",
        device: "hipump",
        address: 3,
        input_unit: Unit::Milliamps,
        wire_unit: Unit::Amps,
    },
];

impl PumpId {
    pub const ALL: [PumpId; 6] = [
        PumpId::HiPump1,
        PumpId::HiPump2,
        PumpId::Pump1,
        PumpId::Pump2,
        PumpId::Pump3,
        PumpId::Pump4,
    ];

    /// Position in [`PumpId::ALL`], also the index of its saved setpoint.
    pub fn slot(self) -> usize {
        self as usize
    }

    pub fn wiring(self) -> &'static PumpWiring {
        &PUMP_TABLE[self.slot()]
    }

    pub fn label(self) -> &'static str {
        self.wiring().label
    }

    /// Compact key used in settings (`hipump1`, `pump4`).
    pub fn key(self) -> &'static str {
        match self {
            PumpId::HiPump1 => "hipump1",
            PumpId::HiPump2 => "hipump2",
            PumpId::Pump1 => "pump1",
            PumpId::Pump2 => "pump2",
            PumpId::Pump3 => "pump3",
            PumpId::Pump4 => "pump4",
        }
    }
}

impl fmt::Display for PumpId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for PumpId {
    type Err = ValidationError;

    /// Accepts the label or the key in any case, with or without separators
    /// (`"HIPUMP 1"`, `"hipump1"`, `"pump_4"`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let compact: String = s
            .chars()
            .filter(|c| !c.is_whitespace() && *c != '_' && *c != '-')
            .collect::<String>()
            .to_ascii_lowercase();
        PumpId::ALL
            .into_iter()
            .find(|pump| pump.key() == compact)
            .ok_or_else(|| ValidationError::UnknownPump(s.to_string()))
    }
}

/// A validated current setpoint for one channel.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Setpoint {
    pump: PumpId,
    /// As entered, in the channel's input unit.
    input: f64,
    amps: f64,
}

impl Setpoint {
    /// Validate user input for `pump`.
    pub fn parse(pump: PumpId, input: &str) -> Result<Self, ValidationError> {
        let trimmed = input.trim();
        let value: f64 = trimmed
            .parse()
            .ok()
            .filter(|v: &f64| v.is_finite())
            .ok_or_else(|| ValidationError::NotNumeric(trimmed.to_string()))?;
        Self::new(pump, value)
    }

    /// Validate a numeric value given in the channel's input unit.
    pub fn new(pump: PumpId, input: f64) -> Result<Self, ValidationError> {
        if !input.is_finite() {
            return Err(ValidationError::NotNumeric(input.to_string()));
        }
        let amps = pump.wiring().input_unit.to_amps(input);
        if !(0.0..=MAX_SETPOINT_AMPS).contains(&amps) {
            return Err(ValidationError::OutOfRange {
                pump: pump.label(),
                amps,
                max: MAX_SETPOINT_AMPS,
            });
        }
        Ok(Self { pump, input, amps })
    }

    pub fn pump(&self) -> PumpId {
        self.pump
    }

    pub fn amps(&self) -> f64 {
        self.amps
    }

    pub fn input(&self) -> f64 {
        self.input
    }

    /// Value in the unit the controller expects for this channel.
    pub fn wire_value(&self) -> f64 {
        let wiring = self.pump.wiring();
        if wiring.input_unit == wiring.wire_unit {
            self.input
        } else {
            self.amps
        }
    }

    /// The three command lines that apply this setpoint.
    pub fn commands(&self) -> [String; 3] {
        let wiring = self.pump.wiring();
        [
            "key 3\r\n".to_string(),
            format!("{} {} MODE M\r\n", wiring.device, wiring.address),
            format!(
                "{} {} isp {}\r\n",
                wiring.device,
                wiring.address,
                format_decimal(self.wire_value())
            ),
        ]
    }
}

/// Format a float as a decimal literal: integral values keep one fractional
/// digit (`3.0`), others use the shortest round-tripping form (`0.0032`).
pub fn format_decimal(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{value:.1}")
    } else {
        format!("{value}")
    }
}
