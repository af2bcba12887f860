//! Device activity: which sensors reported recently.

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use crate::models::Reading;

// ---

/// Default window within which a device counts as active.
pub const DEFAULT_ACTIVE_WINDOW_MINS: i64 = 10;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceActivity {
    pub device_id: String,
    pub last_seen: DateTime<Utc>,
    pub active: bool,
}

/// Last report per device, sorted by device id. A device is active when its
/// last report is no older than `window` at `now`.
pub fn device_activity(readings: &[Reading], now: DateTime<Utc>, window: Duration) -> Vec<DeviceActivity> {
    // ---
    let mut last_seen: BTreeMap<&str, DateTime<Utc>> = BTreeMap::new();
    for r in readings {
        let seen = last_seen.entry(r.device_id.as_str()).or_insert(r.timestamp);
        if r.timestamp > *seen {
            *seen = r.timestamp;
        }
    }

    last_seen
        .into_iter()
        .map(|(device_id, last_seen)| DeviceActivity {
            device_id: device_id.to_string(),
            last_seen,
            active: now - last_seen <= window,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use chrono::TimeZone;

    fn seen(device: &str, minute: u32) -> Reading {
        // ---
        Reading {
            reading_id: format!("{}-{}", device, minute),
            device_id: device.to_string(),
            timestamp: Utc.with_ymd_and_hms(2025, 11, 13, 10, minute, 0).unwrap(),
            pm25: None,
            pm10: None,
            co: None,
            no2: None,
        }
    }

    #[test]
    fn test_activity_window() {
        // ---
        let now = Utc.with_ymd_and_hms(2025, 11, 13, 10, 30, 0).unwrap();
        let readings = vec![seen("library", 25), seen("gym", 5), seen("gym", 20), seen("canteen", 1)];
        let status = device_activity(&readings, now, Duration::minutes(DEFAULT_ACTIVE_WINDOW_MINS));

        let summary: Vec<_> = status.iter().map(|d| (d.device_id.as_str(), d.active)).collect();
        assert_eq!(summary, vec![("canteen", false), ("gym", true), ("library", true)]);
        assert_eq!(status[1].last_seen, Utc.with_ymd_and_hms(2025, 11, 13, 10, 20, 0).unwrap());
    }

    #[test]
    fn test_no_readings_no_devices() {
        // ---
        assert!(device_activity(&[], Utc::now(), Duration::minutes(10)).is_empty());
    }
}
