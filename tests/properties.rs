//! Property tests for classification, alerts, bucketing and series shapes.

use std::collections::HashSet;

use chrono::{DateTime, Duration, FixedOffset, Offset, TimeZone, Utc};
use proptest::prelude::*;

use campus_airwatch::{
    AlertBuilder, AlertMode, BucketWidth, Classifier, Pollutant, Reading, SeriesAggregator, ThresholdTable,
    TimeBucketer,
};

const DEVICES: [&str; 3] = ["gym", "library", "lab"];
const WIDTHS: [u32; 12] = [1, 2, 3, 4, 5, 6, 10, 12, 15, 20, 30, 60];

fn base() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 11, 13, 0, 0, 0).unwrap()
}

fn pollutant() -> impl Strategy<Value = Pollutant> {
    prop::sample::select(Pollutant::ALL.to_vec())
}

fn reading() -> impl Strategy<Value = Reading> {
    // ---
    let value = || prop::option::of(0.0f64..1500.0);
    (
        0u32..10_000,
        0usize..DEVICES.len(),
        0i64..2 * 86_400,
        value(),
        value(),
        value(),
        value(),
    )
        .prop_map(|(id, device, secs, pm25, pm10, co, no2)| Reading {
            reading_id: id.to_string(),
            device_id: DEVICES[device].to_string(),
            timestamp: base() + Duration::seconds(secs),
            pm25,
            pm10,
            co,
            no2,
        })
}

/// Readings with distinct ids, so a reading id names one reading.
fn readings() -> impl Strategy<Value = Vec<Reading>> {
    // ---
    prop::collection::vec(reading(), 0..40).prop_map(|mut rs| {
        for (i, r) in rs.iter_mut().enumerate() {
            r.reading_id = i.to_string();
        }
        rs
    })
}

fn bucketer() -> impl Strategy<Value = TimeBucketer> {
    // ---
    (-12i32..=14).prop_map(|h| TimeBucketer::new(FixedOffset::east_opt(h * 3600).unwrap_or(Utc.fix())))
}

proptest! {
    #[test]
    fn classify_is_monotonic(p in pollutant(), a in 0.0f64..2000.0, b in 0.0f64..2000.0) {
        // ---
        let table = ThresholdTable::default();
        let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
        prop_assert!(table.classify(p, lo) <= table.classify(p, hi));
    }

    #[test]
    fn worst_ignores_flag_order(
        (flags, shuffled) in reading().prop_flat_map(|r| {
            let flags = Classifier::default().classify_reading(&r);
            (Just(flags.clone()), Just(flags).prop_shuffle())
        })
    ) {
        // ---
        let classifier = Classifier::default();
        prop_assert_eq!(classifier.worst(&flags), classifier.worst(&shuffled));
    }

    #[test]
    fn exhaustive_alerts_have_unique_keys(rs in readings()) {
        // ---
        let classifier = Classifier::default();
        let builder = AlertBuilder::new(&classifier);

        let once = builder.build(&rs, AlertMode::Exhaustive);
        let doubled: Vec<Reading> = rs.iter().chain(rs.iter()).cloned().collect();
        let twice = builder.build(&doubled, AlertMode::Exhaustive);

        let keys: HashSet<_> = twice.iter().map(|a| (a.reading_id.clone(), a.subject)).collect();
        prop_assert_eq!(keys.len(), twice.len());
        prop_assert_eq!(once, twice);
    }

    #[test]
    fn single_worst_emits_one_alert_per_reading(rs in readings()) {
        // ---
        let classifier = Classifier::default();
        let feed = AlertBuilder::new(&classifier).build(&rs, AlertMode::SingleWorst);
        prop_assert_eq!(feed.len(), rs.len());
        prop_assert!(feed.windows(2).all(|w| w[0].timestamp >= w[1].timestamp));
    }

    #[test]
    fn bucket_keys_are_stable_within_an_interval(
        bucketer in bucketer(),
        width in prop::sample::select(WIDTHS.to_vec()),
        secs in 0i64..3 * 86_400,
        frac in 0.0f64..1.0,
    ) {
        // ---
        let width_mins = i64::from(width);
        let width = BucketWidth::minutes(width).unwrap();
        let ts = base() + Duration::seconds(secs);

        let bucket = bucketer.bucket_key(ts, width);
        prop_assert!(bucket.start <= ts);
        prop_assert!(ts < bucket.start + Duration::minutes(width_mins));

        let inside_secs = (frac * (width_mins * 60) as f64) as i64;
        let inside = bucketer.bucket_key(bucket.start + Duration::seconds(inside_secs), width);
        prop_assert_eq!(&inside.key, &bucket.key);

        let next = bucketer.bucket_key(bucket.start + Duration::minutes(width_mins), width);
        prop_assert!(next.key > bucket.key);
        prop_assert_eq!(next.start, bucket.start + Duration::minutes(width_mins));
    }

    #[test]
    fn day_keys_are_stable_within_a_day(bucketer in bucketer(), secs in 0i64..3 * 86_400) {
        // ---
        let ts = base() + Duration::seconds(secs);
        let bucket = bucketer.bucket_key(ts, BucketWidth::Day);
        prop_assert!(bucket.start <= ts && ts < bucket.start + Duration::days(1));

        let next = bucketer.bucket_key(bucket.start + Duration::days(1), BucketWidth::Day);
        prop_assert!(next.key > bucket.key);
    }

    #[test]
    fn per_device_points_only_name_reporting_devices(
        rs in readings(),
        p in pollutant(),
        width in prop::sample::select(WIDTHS.to_vec()),
    ) {
        // ---
        let bucketer = TimeBucketer::utc();
        let width = BucketWidth::minutes(width).unwrap();
        let payload = SeriesAggregator::new(bucketer).per_device(&rs, p, width);

        for point in &payload.points {
            for device in point.values.keys() {
                let reported = rs.iter().any(|r| {
                    &r.device_id == device
                        && r.value(p).is_some()
                        && bucketer.bucket_key(r.timestamp, width).key == point.bucket.key
                });
                prop_assert!(reported, "{} has no reading in {}", device, point.bucket.key);
            }
        }
        let keys: Vec<&String> = payload.points.iter().map(|pt| &pt.bucket.key).collect();
        prop_assert!(keys.windows(2).all(|w| w[0] < w[1]));
    }
}
