//! Live breach evaluation of sensor readings against the current thresholds.
//!
//! This is independent of the backend's stored alerts: a reading can show as
//! breached before (or without) a matching `Alert` existing, and an alert's
//! severity is never recomputed here.

use std::{fmt, str::FromStr};

use anyhow::anyhow;

use crate::{backend::models::SensorReading, threshold_cache::Thresholds};

/// Numeric parameters carried by every sensor reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Parameter {
    Temperature,
    Humidity,
    Voltage,
    Current,
    Pressure,
}

/// Display metadata for one parameter.
#[derive(Debug, PartialEq, Eq)]
pub struct ParameterDescriptor {
    pub label: &'static str,
    pub unit: &'static str,
    /// CSS hex colour used for the parameter accent.
    pub color: &'static str,
}

// Indexed by `Parameter as usize`; order must match the enum.
static DESCRIPTORS: [ParameterDescriptor; 5] = [
    ParameterDescriptor { label: "Temperature", unit: "°C", color: "#ef4444" },
    ParameterDescriptor { label: "Humidity", unit: "%", color: "#3b82f6" },
    ParameterDescriptor { label: "Voltage", unit: "V", color: "#f59e0b" },
    ParameterDescriptor { label: "Current", unit: "A", color: "#8b5cf6" },
    ParameterDescriptor { label: "Pressure", unit: "hPa", color: "#10b981" },
];

impl Parameter {
    /// Display order used by every view.
    pub const ALL: [Parameter; 5] = [
        Parameter::Temperature,
        Parameter::Humidity,
        Parameter::Voltage,
        Parameter::Current,
        Parameter::Pressure,
    ];

    /// Key used by the backend in readings, thresholds and alerts.
    pub fn as_str(self) -> &'static str {
        match self {
            Parameter::Temperature => "temperature",
            Parameter::Humidity => "humidity",
            Parameter::Voltage => "voltage",
            Parameter::Current => "current",
            Parameter::Pressure => "pressure",
        }
    }

    pub fn descriptor(self) -> &'static ParameterDescriptor {
        &DESCRIPTORS[self as usize]
    }
}

impl fmt::Display for Parameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Parameter {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        Parameter::ALL
            .into_iter()
            .find(|p| p.as_str() == s)
            .ok_or_else(|| anyhow!("unknown parameter: {s:?}"))
    }
}

/// Breach state of an optional value. An absent value is never a breach.
pub fn is_breach(thresholds: &Thresholds, parameter: Parameter, value: Option<f64>) -> bool {
    value.is_some_and(|v| thresholds.is_breach(parameter.as_str(), v))
}

/// One rendered parameter cell.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Cell {
    pub parameter: Parameter,
    pub value: Option<f64>,
    pub breach: bool,
}

impl Cell {
    /// Two decimals, or empty when the reading has no value.
    pub fn formatted(&self) -> String {
        self.value.map(|v| format!("{v:.2}")).unwrap_or_default()
    }

    /// Like [`Cell::formatted`] with the unit appended.
    pub fn with_unit(&self) -> String {
        match self.value {
            Some(v) => format!("{v:.2} {}", self.parameter.descriptor().unit),
            None => String::new(),
        }
    }
}

/// A reading together with its per-parameter breach flags, in
/// [`Parameter::ALL`] order.
#[derive(Debug, Clone, PartialEq)]
pub struct AnnotatedReading<'a> {
    pub reading: &'a SensorReading,
    pub cells: [Cell; 5],
}

impl<'a> AnnotatedReading<'a> {
    pub fn new(reading: &'a SensorReading, thresholds: &Thresholds) -> Self {
        let cells = Parameter::ALL.map(|parameter| {
            let value = reading.value(parameter);
            Cell {
                parameter,
                value,
                breach: is_breach(thresholds, parameter, value),
            }
        });
        Self { reading, cells }
    }

    pub fn has_breach(&self) -> bool {
        self.cells.iter().any(|c| c.breach)
    }

    pub fn breached(&self) -> impl Iterator<Item = Parameter> + '_ {
        self.cells.iter().filter(|c| c.breach).map(|c| c.parameter)
    }
}

/// Annotate a slice of readings against one thresholds snapshot.
pub fn annotate<'a>(readings: &'a [SensorReading], thresholds: &Thresholds) -> Vec<AnnotatedReading<'a>> {
    readings
        .iter()
        .map(|r| AnnotatedReading::new(r, thresholds))
        .collect()
}
