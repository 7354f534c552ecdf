use std::{collections::BTreeMap, fmt, str::FromStr};

use anyhow::anyhow;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::breach::Parameter;

// ---------------------------------------------------------------------------
// Sensor readings
// ---------------------------------------------------------------------------

/// One message received by the backend from a sensor topic.
///
/// Parameter values are optional: a topic that never reports e.g. pressure
/// simply leaves the field out.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorReading {
    pub id: i64,
    pub topic: String,
    #[serde(deserialize_with = "timestamp::deserialize")]
    pub timestamp: DateTime<Utc>,
    /// Degrees Celsius
    #[serde(default)]
    pub temperature: Option<f64>,
    /// Relative humidity percentage
    #[serde(default)]
    pub humidity: Option<f64>,
    /// Volts
    #[serde(default)]
    pub voltage: Option<f64>,
    /// Amperes
    #[serde(default)]
    pub current: Option<f64>,
    /// Hectopascal
    #[serde(default)]
    pub pressure: Option<f64>,
}

impl SensorReading {
    pub fn value(&self, parameter: Parameter) -> Option<f64> {
        match parameter {
            Parameter::Temperature => self.temperature,
            Parameter::Humidity => self.humidity,
            Parameter::Voltage => self.voltage,
            Parameter::Current => self.current,
            Parameter::Pressure => self.pressure,
        }
    }
}

// ---------------------------------------------------------------------------
// Alerts
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Warning,
    Critical,
}

impl Severity {
    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Warning => "warning",
            Severity::Critical => "critical",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Severity {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        match s {
            "warning" => Ok(Self::Warning),
            "critical" => Ok(Self::Critical),
            other => Err(anyhow!("unknown severity: {other:?}")),
        }
    }
}

/// Inclusive `[min, max]` band for one parameter.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ThresholdRange {
    pub min: f64,
    pub max: f64,
}

impl ThresholdRange {
    pub fn contains(&self, value: f64) -> bool {
        !(value < self.min || value > self.max)
    }
}

/// Threshold-breach alert as stored by the backend.
///
/// `severity` is authoritative: the client never re-derives it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    pub id: i64,
    #[serde(default)]
    pub sensor_data_id: Option<i64>,
    #[serde(deserialize_with = "timestamp::deserialize")]
    pub timestamp: DateTime<Utc>,
    pub topic: String,
    pub severity: Severity,
    #[serde(default)]
    pub violated_keys: Vec<String>,
    #[serde(default)]
    pub actual_values: BTreeMap<String, f64>,
    #[serde(default)]
    pub threshold_values: BTreeMap<String, ThresholdRange>,
}

/// A violated parameter with both its measured value and its limits.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Violation<'a> {
    pub key: &'a str,
    pub actual: f64,
    pub limits: ThresholdRange,
}

impl Alert {
    /// Violated keys that have both an actual value and a threshold entry.
    /// Keys missing from either map are skipped.
    pub fn violations(&self) -> Vec<Violation<'_>> {
        self.violated_keys
            .iter()
            .filter_map(|key| {
                let actual = *self.actual_values.get(key)?;
                let limits = *self.threshold_values.get(key)?;
                Some(Violation { key, actual, limits })
            })
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Pagination envelope
// ---------------------------------------------------------------------------

/// One page of a list endpoint, as returned by the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub page: u32,
    pub page_size: u32,
    /// `0` when `total == 0`.
    pub total_pages: u32,
}

impl<T> Page<T> {
    /// Number of addressable pages. An empty result still has page 1.
    pub fn page_count(&self) -> u32 {
        self.total_pages.max(1)
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Aggregates (opaque pass-through)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stats {
    pub total_messages: u64,
    pub total_topics: u64,
    #[serde(default)]
    pub topic_counts: BTreeMap<String, u64>,
    #[serde(default, deserialize_with = "timestamp::deserialize_option")]
    pub latest_timestamp: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertCounts {
    pub total_alerts: u64,
    pub critical_count: u64,
    #[serde(default)]
    pub warning_count: u64,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ThresholdsResponse {
    #[serde(default)]
    pub thresholds: BTreeMap<String, ThresholdRange>,
}

// ---------------------------------------------------------------------------
// Timestamps
//
// The backend serialises naive datetimes (no offset) for rows stored without
// a timezone. Those are UTC; anything carrying an offset is converted.
// ---------------------------------------------------------------------------

pub(crate) mod timestamp {
    use chrono::{DateTime, NaiveDateTime, Utc};
    use serde::{de::Error, Deserialize, Deserializer};

    pub fn parse(raw: &str) -> Option<DateTime<Utc>> {
        if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
            return Some(dt.with_timezone(&Utc));
        }
        NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
            .ok()
            .map(|naive| naive.and_utc())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        parse(&raw).ok_or_else(|| D::Error::custom(format!("invalid timestamp: {raw:?}")))
    }

    pub fn deserialize_option<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        match Option::<String>::deserialize(deserializer)? {
            None => Ok(None),
            Some(raw) => parse(&raw)
                .map(Some)
                .ok_or_else(|| D::Error::custom(format!("invalid timestamp: {raw:?}"))),
        }
    }
}
