//! The engine facade: one configured bundle of classifier, bucketer and
//! aggregators, plus the atomic snapshot produced by one refresh pass.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tracing::debug;

use crate::alerts::{Alert, AlertBuilder, AlertMode};
use crate::bucket::{BucketWidth, TimeBucketer};
use crate::classify::Classifier;
use crate::devices::{device_activity, DeviceActivity, DEFAULT_ACTIVE_WINDOW_MINS};
use crate::ingest::IngestReport;
use crate::models::{Pollutant, Reading};
use crate::series::{SeriesAggregator, SeriesPayload, SeriesShape};
use crate::summary::{latest_metrics, MetricCard, MissingValuePolicy, SummaryStat, SummaryStatsCalculator};
use crate::thresholds::ThresholdTable;

// ---

#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub thresholds: ThresholdTable,
    pub bucketer: TimeBucketer,
    pub missing_values: MissingValuePolicy,
    pub active_window: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        // ---
        Self {
            thresholds: ThresholdTable::default(),
            bucketer: TimeBucketer::utc(),
            missing_values: MissingValuePolicy::default(),
            active_window: Duration::minutes(DEFAULT_ACTIVE_WINDOW_MINS),
        }
    }
}

/// Everything one refresh pass publishes. Immutable once built.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub generation: u64,
    pub computed_at: DateTime<Utc>,
    pub accepted: usize,
    pub rejected: usize,
    #[serde(skip)]
    pub readings: Vec<Reading>,
    pub alerts: Vec<Alert>,
    pub feed: Vec<Alert>,
    pub summary: Vec<SummaryStat>,
    pub metrics: Vec<MetricCard>,
    pub devices: Vec<DeviceActivity>,
}

impl Snapshot {
    /// Placeholder published before the first pass completes.
    pub fn empty() -> Self {
        // ---
        Snapshot {
            generation: 0,
            computed_at: DateTime::<Utc>::default(),
            accepted: 0,
            rejected: 0,
            readings: Vec::new(),
            alerts: Vec::new(),
            feed: Vec::new(),
            summary: Vec::new(),
            metrics: Vec::new(),
            devices: Vec::new(),
        }
    }
}

/// Stateless engine. Every method is a pure function of its arguments and
/// the configuration, so one instance can be shared across tasks.
#[derive(Debug, Clone)]
pub struct Engine {
    classifier: Classifier,
    bucketer: TimeBucketer,
    series: SeriesAggregator,
    summary: SummaryStatsCalculator,
    active_window: Duration,
}

impl Default for Engine {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

impl Engine {
    pub fn new(config: EngineConfig) -> Self {
        // ---
        Self {
            classifier: Classifier::new(config.thresholds),
            bucketer: config.bucketer,
            series: SeriesAggregator::new(config.bucketer),
            summary: SummaryStatsCalculator::new(config.missing_values),
            active_window: config.active_window,
        }
    }

    pub fn classifier(&self) -> &Classifier {
        &self.classifier
    }

    pub fn bucketer(&self) -> &TimeBucketer {
        &self.bucketer
    }

    pub fn alerts(&self, readings: &[Reading], mode: AlertMode) -> Vec<Alert> {
        AlertBuilder::new(&self.classifier).build(readings, mode)
    }

    /// Series over `[start, end)`. Without an explicit width one is chosen
    /// from the range. Minute buckets of a range covering several calendar
    /// days carry the date in their label.
    pub fn series(
        &self,
        readings: &[Reading],
        shape: SeriesShape,
        width: Option<BucketWidth>,
        range: (DateTime<Utc>, DateTime<Utc>),
    ) -> SeriesPayload {
        // ---
        let (start, end) = range;
        let width = width.unwrap_or_else(|| BucketWidth::for_range(start, end, self.bucketer.offset()));
        let shape = match (shape, width) {
            (SeriesShape::AllDevices, BucketWidth::Day) => SeriesShape::Daily,
            (other, _) => other,
        };
        let mut payload = self.series.aggregate(readings, shape, width);

        let minute_buckets = shape != SeriesShape::Daily && matches!(width, BucketWidth::Minutes(_));
        if minute_buckets && self.bucketer.spans_days(start, end) {
            for point in &mut payload.points {
                point.bucket.label = self.bucketer.dated_label(&point.bucket);
            }
        }
        payload
    }

    pub fn summarize(&self, readings: &[Reading], pollutants: &[Pollutant]) -> Vec<SummaryStat> {
        self.summary.summarize(readings, pollutants)
    }

    /// Run one full pass over an ingested batch. Nothing is shared with
    /// earlier passes; the caller publishes the result as a whole.
    pub fn snapshot(&self, generation: u64, report: IngestReport, now: DateTime<Utc>) -> Snapshot {
        // ---
        let IngestReport { readings, rejected } = report;

        let builder = AlertBuilder::new(&self.classifier);
        let alerts = builder.build(&readings, AlertMode::Exhaustive);
        let feed = builder.build(&readings, AlertMode::SingleWorst);
        let summary = self.summary.summarize(&readings, &Pollutant::ALL);
        let metrics = latest_metrics(&readings, self.classifier.table());
        let devices = device_activity(&readings, now, self.active_window);

        debug!(
            "Snapshot {}: {} readings, {} rejected, {} alerts, {} devices",
            generation,
            readings.len(),
            rejected.len(),
            alerts.len(),
            devices.len()
        );

        Snapshot {
            generation,
            computed_at: now,
            accepted: readings.len(),
            rejected: rejected.len(),
            readings,
            alerts,
            feed,
            summary,
            metrics,
            devices,
        }
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use crate::ingest::ingest;
    use crate::models::RawReading;
    use chrono::TimeZone;

    fn raw(device: Option<&str>, ts: &str, pm25: f64) -> RawReading {
        // ---
        RawReading {
            id: None,
            device_id: device.map(String::from),
            timestamp: Some(ts.to_string()),
            pm25: Some(pm25),
            pm10: Some(20.0),
            co: Some(500.0),
            no2: Some(50.0),
        }
    }

    #[test]
    fn test_snapshot_runs_full_pass() {
        // ---
        let engine = Engine::default();
        let now = Utc.with_ymd_and_hms(2025, 11, 13, 10, 5, 0).unwrap();
        let report = ingest(vec![
            raw(Some("A"), "2025-11-13T10:00:00Z", 40.0),
            raw(None, "2025-11-13T10:01:00Z", 99.0),
            raw(Some("B"), "2025-11-13T10:02:00Z", 10.0),
        ]);

        let snap = engine.snapshot(7, report, now);
        assert_eq!(snap.generation, 7);
        assert_eq!(snap.accepted, 2);
        assert_eq!(snap.rejected, 1);
        assert_eq!(snap.feed.len(), 2);
        assert_eq!(snap.summary.len(), Pollutant::ALL.len());
        assert_eq!(snap.summary[0].pollutant, Pollutant::Pm25);
        assert_eq!(snap.summary[0].average, 25.0);
        assert_eq!(snap.summary[0].peak, 40.0);
        assert!(snap.devices.iter().all(|d| d.active));
    }

    #[test]
    fn test_empty_pass_is_zero_valued() {
        // ---
        let engine = Engine::default();
        let snap = engine.snapshot(1, ingest(Vec::new()), Utc::now());
        assert!(snap.alerts.is_empty());
        assert!(snap.metrics.is_empty());
        assert!(snap.summary.iter().all(|s| s.average == 0.0 && s.peak == 0.0));
    }

    #[test]
    fn test_series_picks_width_from_range() {
        // ---
        let engine = Engine::default();
        let readings = ingest(vec![
            raw(Some("A"), "2025-11-13T10:00:00Z", 40.0),
            raw(Some("A"), "2025-11-15T10:00:00Z", 10.0),
        ])
        .readings;
        let start = Utc.with_ymd_and_hms(2025, 11, 13, 0, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2025, 11, 16, 0, 0, 0).unwrap();

        let pooled = engine.series(&readings, SeriesShape::AllDevices, None, (start, end));
        assert_eq!(pooled.bucket_field, "date");
        assert_eq!(pooled.points.len(), 2);

        let per_device = engine.series(&readings, SeriesShape::PerDevice(Pollutant::Pm25), None, (start, end));
        assert_eq!(per_device.points[1].values["A"], 10.0);
    }

    #[test]
    fn test_minute_labels_stay_distinct_across_days() {
        // ---
        let engine = Engine::default();
        let readings = ingest(vec![
            raw(Some("A"), "2025-11-13T10:00:00Z", 40.0),
            raw(Some("A"), "2025-11-14T10:00:00Z", 10.0),
        ])
        .readings;
        let start = Utc.with_ymd_and_hms(2025, 11, 13, 0, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2025, 11, 15, 0, 0, 0).unwrap();

        let payload = engine.series(
            &readings,
            SeriesShape::PerDevice(Pollutant::Pm25),
            Some(BucketWidth::FIVE_MINUTES),
            (start, end),
        );
        assert_eq!(payload.bucket_field, "time");
        let labels: Vec<&str> = payload.points.iter().map(|p| p.bucket.label.as_str()).collect();
        assert_eq!(labels, vec!["11-13 10:00", "11-14 10:00"]);

        // A single-day range keeps the bare time
        let one_day = engine.series(
            &readings[..1],
            SeriesShape::PerDevice(Pollutant::Pm25),
            Some(BucketWidth::FIVE_MINUTES),
            (start, start + Duration::days(1)),
        );
        assert_eq!(one_day.points[0].bucket.label, "10:00");
    }
}
