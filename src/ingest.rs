//! Ingestion boundary: turns source rows into validated `Reading`s.
//!
//! A row that fails validation is reported and skipped; it never aborts the
//! batch and never reaches an aggregate.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::Serialize;
use tracing::{debug, warn};

use crate::error::InputDataError;
use crate::models::{Pollutant, RawReading, Reading};

// ---

/// Outcome of validating one batch of rows.
#[derive(Debug, Default, Clone, Serialize)]
pub struct IngestReport {
    // ---
    pub readings: Vec<Reading>,
    #[serde(serialize_with = "ser_errors")]
    pub rejected: Vec<InputDataError>,
}

fn ser_errors<S>(errors: &[InputDataError], serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    serializer.collect_seq(errors.iter().map(|e| e.to_string()))
}

/// Validate a batch of rows, keeping the good ones in input order.
pub fn ingest(rows: Vec<RawReading>) -> IngestReport {
    ingest_numbered(rows.into_iter().enumerate())
}

/// Like `ingest`, for rows already tagged with their position in the
/// fetched stream. Rejections report that position.
pub fn ingest_numbered(rows: impl IntoIterator<Item = (usize, RawReading)>) -> IngestReport {
    // ---
    let mut report = IngestReport::default();

    for (row, raw) in rows {
        match validate(row, raw) {
            Ok(reading) => report.readings.push(reading),
            Err(e) => {
                warn!("Skipping reading: {}", e);
                report.rejected.push(e);
            }
        }
    }

    debug!(
        "Ingested {} readings, rejected {}",
        report.readings.len(),
        report.rejected.len()
    );
    report
}

/// Validate a single row. `row` is only used for error reporting.
pub fn validate(row: usize, raw: RawReading) -> Result<Reading, InputDataError> {
    // ---
    let device_id = raw
        .device_id
        .map(|d| d.trim().to_string())
        .filter(|d| !d.is_empty())
        .ok_or(InputDataError::MissingDeviceId { row })?;

    let ts_text = raw
        .timestamp
        .filter(|t| !t.trim().is_empty())
        .ok_or(InputDataError::MissingTimestamp { row })?;

    let timestamp = parse_timestamp(&ts_text).ok_or_else(|| InputDataError::BadTimestamp {
        row,
        value: ts_text.clone(),
    })?;

    let checked = |pollutant: Pollutant, value: Option<f64>| match value {
        Some(v) if !v.is_finite() || v < 0.0 => Err(InputDataError::BadValue {
            row,
            pollutant: pollutant.key(),
            value: v,
        }),
        other => Ok(other),
    };

    let pm25 = checked(Pollutant::Pm25, raw.pm25)?;
    let pm10 = checked(Pollutant::Pm10, raw.pm10)?;
    let co = checked(Pollutant::Co, raw.co)?;
    let no2 = checked(Pollutant::No2, raw.no2)?;

    let reading_id = raw
        .id
        .filter(|id| !id.trim().is_empty())
        .unwrap_or_else(|| format!("{}@{}", device_id, timestamp.to_rfc3339()));

    Ok(Reading {
        reading_id,
        device_id,
        timestamp,
        pm25,
        pm10,
        co,
        no2,
    })
}

/// Parse an absolute timestamp.
///
/// RFC 3339 is preferred; offset-less forms as written by the hosted table
/// (`2025-11-13T12:00:00`, `2025-11-13 12:00:00.123`) are taken as UTC.
pub fn parse_timestamp(text: &str) -> Option<DateTime<Utc>> {
    // ---
    let text = text.trim();

    if let Ok(ts) = DateTime::parse_from_rfc3339(text) {
        return Some(ts.with_timezone(&Utc));
    }
    // Postgres style "+00" offsets
    if let Ok(ts) = DateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S%.f%#z") {
        return Some(ts.with_timezone(&Utc));
    }

    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(text, fmt).ok())
        .map(|naive| naive.and_utc())
}
