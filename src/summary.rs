//! Summary statistics and latest-value metric cards.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::models::{Pollutant, Reading, SeverityLevel};
use crate::thresholds::ThresholdTable;

// ---

/// How a reading without a value for the pollutant enters the average.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MissingValuePolicy {
    /// Counted as 0 in both numerator and denominator.
    #[default]
    ZeroFill,
    /// Left out of the denominator.
    Skip,
}

impl FromStr for MissingValuePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // ---
        match s.trim().to_ascii_lowercase().as_str() {
            "zero" | "zero_fill" => Ok(MissingValuePolicy::ZeroFill),
            "skip" | "exclude" => Ok(MissingValuePolicy::Skip),
            other => Err(format!("unknown missing value policy '{}'", other)),
        }
    }
}

/// Average and peak of one pollutant over a row set.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SummaryStat {
    pub pollutant: Pollutant,
    pub average: f64,
    pub peak: f64,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SummaryStatsCalculator {
    policy: MissingValuePolicy,
}

impl SummaryStatsCalculator {
    pub fn new(policy: MissingValuePolicy) -> Self {
        Self { policy }
    }

    /// One stat per requested pollutant, in request order. Empty input gives
    /// zeros.
    pub fn summarize(&self, rows: &[Reading], pollutants: &[Pollutant]) -> Vec<SummaryStat> {
        pollutants.iter().map(|p| self.stat(rows, *p)).collect()
    }

    fn stat(&self, rows: &[Reading], pollutant: Pollutant) -> SummaryStat {
        // ---
        let values: Vec<f64> = match self.policy {
            MissingValuePolicy::ZeroFill => rows
                .iter()
                .map(|r| r.value(pollutant).unwrap_or(0.0))
                .collect(),
            MissingValuePolicy::Skip => rows.iter().filter_map(|r| r.value(pollutant)).collect(),
        };

        if values.is_empty() {
            return SummaryStat {
                pollutant,
                average: 0.0,
                peak: 0.0,
            };
        }

        let average = values.iter().sum::<f64>() / values.len() as f64;
        let peak = values.iter().copied().fold(f64::MIN, f64::max);
        let decimals = pollutant.display_decimals();

        SummaryStat {
            pollutant,
            average: round_to(average, decimals),
            peak: round_to(peak, decimals),
        }
    }
}

/// Round half away from zero to `decimals` places.
pub fn round_to(value: f64, decimals: u32) -> f64 {
    // ---
    let scale = 10f64.powi(decimals as i32);
    (value * scale).round() / scale
}

/// Most recent value of one pollutant, as shown on the dashboard cards.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricCard {
    pub pollutant: Pollutant,
    pub value: f64,
    pub unit: &'static str,
    pub level: SeverityLevel,
    pub device_id: String,
    pub timestamp: DateTime<Utc>,
}

/// Latest present value per pollutant, in the table's priority order.
///
/// Pollutants that no reading reports are omitted. Among readings with the
/// same timestamp the larger device id wins, so the result is independent
/// of input order.
pub fn latest_metrics(readings: &[Reading], table: &ThresholdTable) -> Vec<MetricCard> {
    // ---
    table
        .priority()
        .iter()
        .filter_map(|pollutant| {
            readings
                .iter()
                .filter_map(|r| r.value(pollutant).map(|v| (r, v)))
                .max_by(|(a, _), (b, _)| {
                    a.timestamp
                        .cmp(&b.timestamp)
                        .then_with(|| a.device_id.cmp(&b.device_id))
                })
                .map(|(r, value)| MetricCard {
                    pollutant,
                    value,
                    unit: pollutant.unit(),
                    level: table.classify(pollutant, value),
                    device_id: r.device_id.clone(),
                    timestamp: r.timestamp,
                })
        })
        .collect()
}
