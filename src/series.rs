//! Chart-ready series built on top of `TimeBucketer`.
//!
//! Three shapes are supported:
//! - per device: one averaged value of a single pollutant per device per bucket
//! - all devices: one averaged value per pollutant per bucket, devices pooled
//! - daily rollup: the all-devices shape on calendar-day buckets
//!
//! Points are always emitted in ascending bucket-key order. A device or
//! pollutant with no values in a bucket has no entry on that point.

use std::collections::{BTreeMap, BTreeSet};

use serde::ser::{Serialize, SerializeMap, Serializer};
use tracing::debug;

use crate::bucket::{Bucket, BucketWidth, TimeBucketer};
use crate::models::{Pollutant, Reading};

// ---

/// Which series to build.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeriesShape {
    /// One field per device for the given pollutant.
    PerDevice(Pollutant),
    /// One field per pollutant, all devices pooled ("All Locations").
    AllDevices,
    /// `AllDevices` on calendar-day buckets, whatever width is requested.
    Daily,
}

/// One bucket of a series.
#[derive(Debug, Clone, PartialEq)]
pub struct SeriesPoint {
    // ---
    pub bucket: Bucket,
    pub axis_field: &'static str,
    /// Device id or pollutant key to averaged value.
    pub values: BTreeMap<String, f64>,
}

impl Serialize for SeriesPoint {
    /// Flat object: `{"bucket": key, <axis_field>: label, <series>: value, ...}`.
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        // ---
        let mut map = serializer.serialize_map(Some(self.values.len() + 2))?;
        map.serialize_entry("bucket", &self.bucket.key)?;
        map.serialize_entry(self.axis_field, &self.bucket.label)?;
        for (name, value) in &self.values {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

/// Series payload handed to the presentation layer.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SeriesPayload {
    pub points: Vec<SeriesPoint>,
    /// Every device present in the input, ascending.
    pub device_ids: Vec<String>,
    /// Key on each point holding the x-axis label.
    pub bucket_field: &'static str,
}

#[derive(Debug, Default, Clone, Copy)]
struct Mean {
    sum: f64,
    count: u32,
}

impl Mean {
    fn add(&mut self, value: f64) {
        self.sum += value;
        self.count += 1;
    }

    fn value(self) -> Option<f64> {
        (self.count > 0).then(|| self.sum / f64::from(self.count))
    }
}

/// Bucket key to the bucket and its running means by series name.
type Grouped = BTreeMap<String, (Bucket, BTreeMap<String, Mean>)>;

/// Groups readings into buckets and averages within each bucket.
#[derive(Debug, Clone, Copy, Default)]
pub struct SeriesAggregator {
    bucketer: TimeBucketer,
}

impl SeriesAggregator {
    pub fn new(bucketer: TimeBucketer) -> Self {
        Self { bucketer }
    }

    /// Build the requested shape. `width` is ignored by `SeriesShape::Daily`.
    pub fn aggregate(&self, readings: &[Reading], shape: SeriesShape, width: BucketWidth) -> SeriesPayload {
        // ---
        let payload = match shape {
            SeriesShape::PerDevice(pollutant) => self.per_device(readings, pollutant, width),
            SeriesShape::AllDevices => self.all_devices(readings, width),
            SeriesShape::Daily => self.daily(readings),
        };
        debug!(
            "Aggregated {} readings into {} points ({:?}, {} devices)",
            readings.len(),
            payload.points.len(),
            shape,
            payload.device_ids.len()
        );
        payload
    }

    /// Mean of `pollutant` per device per bucket.
    pub fn per_device(&self, readings: &[Reading], pollutant: Pollutant, width: BucketWidth) -> SeriesPayload {
        // ---
        let grouped = self.group(readings, width, |r| {
            r.value(pollutant).map(|v| (r.device_id.clone(), v))
        });
        self.payload(readings, grouped, width)
    }

    /// Mean of every pollutant per bucket across all devices.
    pub fn all_devices(&self, readings: &[Reading], width: BucketWidth) -> SeriesPayload {
        // ---
        let grouped = self.group_pollutants(readings, width);
        self.payload(readings, grouped, width)
    }

    /// Mean of every pollutant per calendar day across all devices.
    pub fn daily(&self, readings: &[Reading]) -> SeriesPayload {
        self.all_devices(readings, BucketWidth::Day)
    }

    fn group_pollutants(&self, readings: &[Reading], width: BucketWidth) -> Grouped {
        // ---
        let mut buckets: Grouped = BTreeMap::new();
        for reading in readings {
            let bucket = self.bucketer.bucket_key(reading.timestamp, width);
            let (_, means) = buckets
                .entry(bucket.key.clone())
                .or_insert_with(|| (bucket, BTreeMap::new()));
            for (pollutant, value) in reading.values() {
                means.entry(pollutant.key().to_string()).or_default().add(value);
            }
        }
        buckets
    }

    fn group<F>(&self, readings: &[Reading], width: BucketWidth, field: F) -> Grouped
    where
        F: Fn(&Reading) -> Option<(String, f64)>,
    {
        // ---
        let mut buckets: Grouped = BTreeMap::new();
        for reading in readings {
            let Some((name, value)) = field(reading) else {
                continue;
            };
            let bucket = self.bucketer.bucket_key(reading.timestamp, width);
            let (_, means) = buckets
                .entry(bucket.key.clone())
                .or_insert_with(|| (bucket, BTreeMap::new()));
            means.entry(name).or_default().add(value);
        }
        buckets
    }

    fn payload(
        &self,
        readings: &[Reading],
        grouped: Grouped,
        width: BucketWidth,
    ) -> SeriesPayload {
        // ---
        let axis_field = width.axis_field();
        let points = grouped
            .into_values()
            .map(|(bucket, means)| SeriesPoint {
                bucket,
                axis_field,
                values: means
                    .into_iter()
                    .filter_map(|(name, mean)| mean.value().map(|v| (name, v)))
                    .collect(),
            })
            .collect();

        SeriesPayload {
            points,
            device_ids: device_ids(readings),
            bucket_field: axis_field,
        }
    }
}

/// Distinct device ids, ascending.
pub fn device_ids(readings: &[Reading]) -> Vec<String> {
    // ---
    readings
        .iter()
        .map(|r| r.device_id.as_str())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .map(String::from)
        .collect()
}
