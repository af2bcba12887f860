//! Data models for the air-quality engine.
//!
//! `RawReading` is the loosely typed row handed over by a data source;
//! `Reading` is the validated form every engine operation consumes.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

// ---

/// The fixed set of pollutants measured by every campus sensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Pollutant {
    #[serde(rename = "pm25")]
    Pm25,
    #[serde(rename = "pm10")]
    Pm10,
    #[serde(rename = "co")]
    Co,
    #[serde(rename = "no2")]
    No2,
}

impl Pollutant {
    /// All pollutants, in field order of a reading row.
    pub const ALL: [Pollutant; 4] = [Pollutant::Pm25, Pollutant::Pm10, Pollutant::Co, Pollutant::No2];

    /// Row field / configuration key.
    pub fn key(self) -> &'static str {
        // ---
        match self {
            Pollutant::Pm25 => "pm25",
            Pollutant::Pm10 => "pm10",
            Pollutant::Co => "co",
            Pollutant::No2 => "no2",
        }
    }

    /// Name shown to users, e.g. in alert lists.
    pub fn label(self) -> &'static str {
        // ---
        match self {
            Pollutant::Pm25 => "PM2.5",
            Pollutant::Pm10 => "PM10",
            Pollutant::Co => "CO",
            Pollutant::No2 => "NO2",
        }
    }

    pub fn unit(self) -> &'static str {
        // ---
        match self {
            Pollutant::Pm25 | Pollutant::Pm10 => "µg/m³",
            Pollutant::Co => "ppm",
            Pollutant::No2 => "ppb",
        }
    }

    /// Decimal places used when presenting summary values.
    ///
    /// Particulate matter is reported with one decimal; the gas channels are
    /// integer-scale readings and are rounded to whole units.
    pub fn display_decimals(self) -> u32 {
        // ---
        match self {
            Pollutant::Pm25 | Pollutant::Pm10 => 1,
            Pollutant::Co | Pollutant::No2 => 0,
        }
    }
}

impl fmt::Display for Pollutant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Pollutant {
    type Err = String;

    /// Accepts both the row key (`pm25`) and the display label (`PM2.5`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // ---
        let normalized: String = s
            .trim()
            .chars()
            .filter(|c| *c != '.' && *c != '_' && *c != ' ')
            .collect::<String>()
            .to_ascii_lowercase();

        match normalized.as_str() {
            "pm25" => Ok(Pollutant::Pm25),
            "pm10" => Ok(Pollutant::Pm10),
            "co" => Ok(Pollutant::Co),
            "no2" => Ok(Pollutant::No2),
            _ => Err(format!("unknown pollutant '{}'", s)),
        }
    }
}

/// Severity of a single pollutant value. Ordered: `Good < Moderate < Unhealthy`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SeverityLevel {
    Good,
    Moderate,
    Unhealthy,
}

impl SeverityLevel {
    pub fn as_str(self) -> &'static str {
        // ---
        match self {
            SeverityLevel::Good => "GOOD",
            SeverityLevel::Moderate => "MODERATE",
            SeverityLevel::Unhealthy => "UNHEALTHY",
        }
    }
}

impl fmt::Display for SeverityLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SeverityLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // ---
        match s.trim().to_ascii_uppercase().as_str() {
            "GOOD" => Ok(SeverityLevel::Good),
            "MODERATE" => Ok(SeverityLevel::Moderate),
            "UNHEALTHY" => Ok(SeverityLevel::Unhealthy),
            _ => Err(format!("unknown severity '{}'", s)),
        }
    }
}

/// Row as delivered by a data source, before validation.
///
/// Every field is optional here; `ingest::validate` decides whether the
/// row is usable.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct RawReading {
    // ---
    #[serde(default, deserialize_with = "de_row_id")]
    pub id: Option<String>,
    #[serde(default)]
    pub device_id: Option<String>,
    #[serde(default)]
    pub timestamp: Option<String>,
    #[serde(default)]
    pub pm25: Option<f64>,
    #[serde(default)]
    pub pm10: Option<f64>,
    #[serde(default)]
    pub co: Option<f64>,
    #[serde(default)]
    pub no2: Option<f64>,
}

/// Row ids arrive as integers from the hosted table and as strings from
/// exports; both are kept as text.
fn de_row_id<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    // ---
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RowId {
        Int(i64),
        Text(String),
    }

    Ok(Option::<RowId>::deserialize(deserializer)?.map(|id| match id {
        RowId::Int(n) => n.to_string(),
        RowId::Text(s) => s,
    }))
}

/// A validated, immutable sensor sample.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Reading {
    // ---
    pub reading_id: String,
    pub device_id: String,
    pub timestamp: DateTime<Utc>,
    pub pm25: Option<f64>,
    pub pm10: Option<f64>,
    pub co: Option<f64>,
    pub no2: Option<f64>,
}

impl Reading {
    /// Value of one pollutant, `None` when the sensor did not report it.
    pub fn value(&self, pollutant: Pollutant) -> Option<f64> {
        // ---
        match pollutant {
            Pollutant::Pm25 => self.pm25,
            Pollutant::Pm10 => self.pm10,
            Pollutant::Co => self.co,
            Pollutant::No2 => self.no2,
        }
    }

    /// Present pollutant values in row field order.
    pub fn values(&self) -> impl Iterator<Item = (Pollutant, f64)> + '_ {
        Pollutant::ALL
            .into_iter()
            .filter_map(move |p| self.value(p).map(|v| (p, v)))
    }
}
