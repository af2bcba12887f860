//! Fixed-width time buckets.
//!
//! Buckets are computed on the deployment's calendar, a fixed UTC offset,
//! so day boundaries do not move with the host's local time zone. Keys are
//! zero-padded (`2025-11-13 10:05`, `2025-11-13`) and therefore sort
//! chronologically as plain strings.

use chrono::{
    DateTime, Duration, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, Offset, Timelike, Utc,
};
use serde::Serialize;

use crate::error::ConfigError;

// ---

const MINUTE_KEY_FMT: &str = "%Y-%m-%d %H:%M";
const MINUTE_LABEL_FMT: &str = "%H:%M";
const DATED_MINUTE_LABEL_FMT: &str = "%m-%d %H:%M";
const DAY_KEY_FMT: &str = "%Y-%m-%d";
const DAY_LABEL_FMT: &str = "%b %d";

/// Minute width that divides an hour evenly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct MinuteWidth(u32);

impl MinuteWidth {
    pub fn get(self) -> u32 {
        self.0
    }
}

/// Bucket width: minutes within a day, or whole calendar days.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum BucketWidth {
    Minutes(MinuteWidth),
    Day,
}

impl BucketWidth {
    pub const ONE_MINUTE: BucketWidth = BucketWidth::Minutes(MinuteWidth(1));
    pub const FIVE_MINUTES: BucketWidth = BucketWidth::Minutes(MinuteWidth(5));

    /// Minute-level width; must divide 60 so every bucket has the same length.
    pub fn minutes(width: u32) -> Result<Self, ConfigError> {
        // ---
        if width == 0 || 60 % width != 0 {
            return Err(ConfigError::InvalidBucketWidth(width));
        }
        Ok(BucketWidth::Minutes(MinuteWidth(width)))
    }

    /// Pick a width for a `[start, end)` range: one-minute buckets for spans of
    /// up to two hours, five-minute buckets within a single calendar day, and
    /// daily buckets otherwise.
    pub fn for_range(start: DateTime<Utc>, end: DateTime<Utc>, offset: FixedOffset) -> Self {
        // ---
        if spans_days(start, end, offset) {
            BucketWidth::Day
        } else if end - start <= Duration::hours(2) {
            BucketWidth::ONE_MINUTE
        } else {
            BucketWidth::FIVE_MINUTES
        }
    }

    /// Name of the x-axis field on series points for this width.
    pub fn axis_field(self) -> &'static str {
        // ---
        match self {
            BucketWidth::Minutes(_) => "time",
            BucketWidth::Day => "date",
        }
    }
}

/// One bucket: sortable key, display label and its UTC start instant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Bucket {
    pub key: String,
    pub label: String,
    pub start: DateTime<Utc>,
}

/// Maps instants to buckets on a fixed-offset calendar.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeBucketer {
    offset: FixedOffset,
}

impl Default for TimeBucketer {
    fn default() -> Self {
        Self::utc()
    }
}

impl TimeBucketer {
    pub fn new(offset: FixedOffset) -> Self {
        Self { offset }
    }

    pub fn utc() -> Self {
        // ---
        Self { offset: Utc.fix() }
    }

    pub fn offset(&self) -> FixedOffset {
        self.offset
    }

    /// Bucket containing `ts`: seconds are dropped and the minute is floored to
    /// a multiple of the width. Two instants share a key iff they fall in the
    /// same `[start, start + width)` interval.
    pub fn bucket_key(&self, ts: DateTime<Utc>, width: BucketWidth) -> Bucket {
        // ---
        let local = ts.with_timezone(&self.offset).naive_local();
        let midnight = local.date().and_time(NaiveTime::MIN);

        match width {
            BucketWidth::Minutes(MinuteWidth(w)) => {
                let minute_of_day = local.hour() * 60 + local.minute();
                let floored = minute_of_day - minute_of_day % w;
                let start = midnight + Duration::minutes(i64::from(floored));
                Bucket {
                    key: start.format(MINUTE_KEY_FMT).to_string(),
                    label: start.format(MINUTE_LABEL_FMT).to_string(),
                    start: self.to_utc(start),
                }
            }
            BucketWidth::Day => Bucket {
                key: midnight.format(DAY_KEY_FMT).to_string(),
                label: midnight.format(DAY_LABEL_FMT).to_string(),
                start: self.to_utc(midnight),
            },
        }
    }

    /// Minute label carrying the date, for minute buckets of a range that
    /// covers more than one calendar day.
    pub fn dated_label(&self, bucket: &Bucket) -> String {
        // ---
        bucket
            .start
            .with_timezone(&self.offset)
            .format(DATED_MINUTE_LABEL_FMT)
            .to_string()
    }

    /// True when `[start, end)` touches more than one calendar day.
    pub fn spans_days(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> bool {
        spans_days(start, end, self.offset)
    }

    /// Calendar date of `ts` on the deployment calendar.
    pub fn local_date(&self, ts: DateTime<Utc>) -> NaiveDate {
        ts.with_timezone(&self.offset).date_naive()
    }

    /// Half-open UTC range covering the calendar days `from..=to`.
    pub fn day_range(&self, from: NaiveDate, to: NaiveDate) -> (DateTime<Utc>, DateTime<Utc>) {
        // ---
        let start = self.to_utc(from.and_time(NaiveTime::MIN));
        let end = self.to_utc(to.and_time(NaiveTime::MIN)) + Duration::days(1);
        (start, end)
    }

    fn to_utc(&self, local: NaiveDateTime) -> DateTime<Utc> {
        // ---
        let utc = local - Duration::seconds(i64::from(self.offset.local_minus_utc()));
        utc.and_utc()
    }
}

fn spans_days(start: DateTime<Utc>, end: DateTime<Utc>, offset: FixedOffset) -> bool {
    // ---
    let last = if end > start { end - Duration::nanoseconds(1) } else { start };
    start.with_timezone(&offset).date_naive() != last.with_timezone(&offset).date_naive()
}

/// Parse a UTC offset such as `+08:00`, `-0500` or `Z`.
pub fn parse_offset(text: &str) -> Result<FixedOffset, ConfigError> {
    // ---
    let trimmed = text.trim();
    if trimmed.eq_ignore_ascii_case("z") || trimmed.eq_ignore_ascii_case("utc") {
        return Ok(TimeBucketer::utc().offset());
    }
    trimmed
        .parse::<FixedOffset>()
        .map_err(|_| ConfigError::InvalidOffset(text.to_string()))
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use chrono::TimeZone;

    fn at(h: u32, m: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 11, 13, h, m, s).unwrap()
    }

    fn manila() -> FixedOffset {
        FixedOffset::east_opt(8 * 3600).unwrap()
    }

    #[test]
    fn test_five_minute_floor() {
        // ---
        let bucketer = TimeBucketer::utc();
        let b = bucketer.bucket_key(at(10, 47, 31), BucketWidth::FIVE_MINUTES);
        assert_eq!(b.key, "2025-11-13 10:45");
        assert_eq!(b.label, "10:45");
        assert_eq!(b.start, at(10, 45, 0));
    }

    #[test]
    fn test_same_interval_same_key_and_boundary_moves_on() {
        // ---
        let bucketer = TimeBucketer::utc();
        let w = BucketWidth::FIVE_MINUTES;
        let first = bucketer.bucket_key(at(10, 0, 0), w);
        assert_eq!(first, bucketer.bucket_key(at(10, 2, 0), w));
        assert_eq!(first, bucketer.bucket_key(at(10, 4, 59), w));

        let next = bucketer.bucket_key(at(10, 5, 0), w);
        assert_eq!(next.key, "2025-11-13 10:05");
        assert!(first.key < next.key);
    }

    #[test]
    fn test_day_buckets_follow_deployment_calendar() {
        // ---
        let bucketer = TimeBucketer::new(manila());
        // 17:30 UTC is 01:30 the next day in UTC+8
        let b = bucketer.bucket_key(at(17, 30, 0), BucketWidth::Day);
        assert_eq!(b.key, "2025-11-14");
        assert_eq!(b.label, "Nov 14");
        assert_eq!(b.start, at(16, 0, 0));

        let before = bucketer.bucket_key(at(15, 59, 59), BucketWidth::Day);
        assert_eq!(before.key, "2025-11-13");
    }

    #[test]
    fn test_keys_sort_across_days() {
        // ---
        let bucketer = TimeBucketer::utc();
        let w = BucketWidth::FIVE_MINUTES;
        let late = bucketer.bucket_key(at(23, 58, 0), w);
        let next_day = bucketer.bucket_key(Utc.with_ymd_and_hms(2025, 11, 14, 0, 1, 0).unwrap(), w);
        assert!(late.key < next_day.key);
        assert_eq!(next_day.key, "2025-11-14 00:00");
    }

    #[test]
    fn test_width_validation() {
        // ---
        assert!(BucketWidth::minutes(5).is_ok());
        assert!(BucketWidth::minutes(15).is_ok());
        assert!(BucketWidth::minutes(60).is_ok());
        assert_eq!(BucketWidth::minutes(0), Err(ConfigError::InvalidBucketWidth(0)));
        assert_eq!(BucketWidth::minutes(7), Err(ConfigError::InvalidBucketWidth(7)));
        assert_eq!(BucketWidth::minutes(90), Err(ConfigError::InvalidBucketWidth(90)));
    }

    #[test]
    fn test_hour_width() {
        // ---
        let bucketer = TimeBucketer::utc();
        let w = BucketWidth::minutes(60).unwrap();
        assert_eq!(bucketer.bucket_key(at(10, 59, 59), w).key, "2025-11-13 10:00");
    }

    #[test]
    fn test_width_for_range() {
        // ---
        let utc = TimeBucketer::utc().offset();
        assert_eq!(BucketWidth::for_range(at(8, 0, 0), at(9, 30, 0), utc), BucketWidth::ONE_MINUTE);
        assert_eq!(BucketWidth::for_range(at(0, 0, 0), at(18, 0, 0), utc), BucketWidth::FIVE_MINUTES);
        // end is exclusive, so a full day is still one day
        let midnight = Utc.with_ymd_and_hms(2025, 11, 14, 0, 0, 0).unwrap();
        assert_eq!(BucketWidth::for_range(at(0, 0, 0), midnight, utc), BucketWidth::FIVE_MINUTES);
        let week_later = Utc.with_ymd_and_hms(2025, 11, 20, 0, 0, 0).unwrap();
        assert_eq!(BucketWidth::for_range(at(0, 0, 0), week_later, utc), BucketWidth::Day);
    }

    #[test]
    fn test_dated_label_and_day_span() {
        // ---
        let bucketer = TimeBucketer::new(manila());
        let b = bucketer.bucket_key(at(17, 32, 0), BucketWidth::FIVE_MINUTES);
        assert_eq!(b.label, "01:30");
        assert_eq!(bucketer.dated_label(&b), "11-14 01:30");

        // 00:00 to 16:00 UTC is one Manila day, 08:00 to 24:00 local
        assert!(!bucketer.spans_days(at(0, 0, 0), at(16, 0, 0)));
        assert!(bucketer.spans_days(at(0, 0, 0), at(16, 0, 1)));
    }

    #[test]
    fn test_day_range() {
        // ---
        let bucketer = TimeBucketer::new(manila());
        let d = NaiveDate::from_ymd_opt(2025, 11, 13).unwrap();
        let (start, end) = bucketer.day_range(d, d);
        assert_eq!(start, Utc.with_ymd_and_hms(2025, 11, 12, 16, 0, 0).unwrap());
        assert_eq!(end, at(16, 0, 0));
    }

    #[test]
    fn test_parse_offset() {
        // ---
        assert_eq!(parse_offset("+08:00"), Ok(manila()));
        assert_eq!(parse_offset("Z").unwrap().local_minus_utc(), 0);
        assert_eq!(parse_offset("-05:00").unwrap().local_minus_utc(), -5 * 3600);
        assert!(parse_offset("Asia/Manila").is_err());
        assert_eq!(
            parse_offset("+1é1"),
            Err(ConfigError::InvalidOffset("+1é1".to_string()))
        );
        assert!(parse_offset("").is_err());
    }
}
