//! Per-pollutant classification of a reading and worst-pollutant selection.

use std::cmp::Ordering;

use serde::Serialize;

use crate::models::{Pollutant, Reading, SeverityLevel};
use crate::thresholds::{PriorityOrder, ThresholdTable};

// ---

/// Severity of one pollutant value on one reading.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PollutantFlag {
    pub pollutant: Pollutant,
    pub value: f64,
    pub level: SeverityLevel,
}

/// Worst-pollutant summary of a reading; `AllGood` when nothing was measured.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Worst {
    Flag(PollutantFlag),
    AllGood,
}

impl Worst {
    pub fn level(&self) -> SeverityLevel {
        // ---
        match self {
            Worst::Flag(flag) => flag.level,
            Worst::AllGood => SeverityLevel::Good,
        }
    }
}

/// Applies a `ThresholdTable` to readings.
#[derive(Debug, Clone, Default)]
pub struct Classifier {
    table: ThresholdTable,
}

impl Classifier {
    pub fn new(table: ThresholdTable) -> Self {
        Self { table }
    }

    pub fn table(&self) -> &ThresholdTable {
        &self.table
    }

    pub fn priority(&self) -> &PriorityOrder {
        self.table.priority()
    }

    /// One flag per pollutant present on the reading, in priority order.
    pub fn classify_reading(&self, reading: &Reading) -> Vec<PollutantFlag> {
        // ---
        self.priority()
            .iter()
            .filter_map(|pollutant| {
                reading.value(pollutant).map(|value| PollutantFlag {
                    pollutant,
                    value,
                    level: self.table.classify(pollutant, value),
                })
            })
            .collect()
    }

    /// Highest severity flag, ties broken by the priority order.
    ///
    /// The result does not depend on the order of `flags`.
    pub fn worst(&self, flags: &[PollutantFlag]) -> Worst {
        // ---
        let priority = self.priority();
        flags
            .iter()
            .copied()
            .min_by(|a, b| match b.level.cmp(&a.level) {
                Ordering::Equal => priority
                    .rank(a.pollutant)
                    .cmp(&priority.rank(b.pollutant))
                    // Same pollutant twice: keep the larger value.
                    .then_with(|| b.value.total_cmp(&a.value)),
                other => other,
            })
            .map(Worst::Flag)
            .unwrap_or(Worst::AllGood)
    }

    /// Flags above GOOD, in priority order.
    pub fn non_good(&self, flags: &[PollutantFlag]) -> Vec<PollutantFlag> {
        // ---
        let priority = self.priority();
        let mut out: Vec<PollutantFlag> = flags
            .iter()
            .filter(|f| f.level != SeverityLevel::Good)
            .copied()
            .collect();
        out.sort_by_key(|f| priority.rank(f.pollutant));
        out
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use chrono::{TimeZone, Utc};

    fn reading(pm25: Option<f64>, pm10: Option<f64>, co: Option<f64>, no2: Option<f64>) -> Reading {
        // ---
        Reading {
            reading_id: "r1".into(),
            device_id: "A".into(),
            timestamp: Utc.with_ymd_and_hms(2025, 11, 13, 10, 0, 0).unwrap(),
            pm25,
            pm10,
            co,
            no2,
        }
    }

    fn flag(pollutant: Pollutant, level: SeverityLevel) -> PollutantFlag {
        PollutantFlag { pollutant, value: 1.0, level }
    }

    #[test]
    fn test_classify_reading_one_flag_per_present_pollutant() {
        // ---
        let classifier = Classifier::default();
        let flags = classifier.classify_reading(&reading(Some(60.0), None, Some(200.0), None));
        assert_eq!(flags.len(), 2);
        assert_eq!(flags[0].pollutant, Pollutant::Co);
        assert_eq!(flags[0].level, SeverityLevel::Good);
        assert_eq!(flags[1].pollutant, Pollutant::Pm25);
        assert_eq!(flags[1].level, SeverityLevel::Unhealthy);
    }

    #[test]
    fn test_pm25_unhealthy_is_worst() {
        // ---
        let classifier = Classifier::default();
        let flags =
            classifier.classify_reading(&reading(Some(60.0), Some(10.0), Some(200.0), Some(10.0)));
        match classifier.worst(&flags) {
            Worst::Flag(f) => {
                assert_eq!(f.pollutant, Pollutant::Pm25);
                assert_eq!(f.level, SeverityLevel::Unhealthy);
                assert_eq!(f.value, 60.0);
            }
            Worst::AllGood => panic!("expected a flag"),
        }
    }

    #[test]
    fn test_worst_breaks_ties_by_priority() {
        // ---
        let classifier = Classifier::default();
        let flags = vec![
            flag(Pollutant::Pm25, SeverityLevel::Moderate),
            flag(Pollutant::Pm10, SeverityLevel::Moderate),
            flag(Pollutant::No2, SeverityLevel::Moderate),
        ];
        let mut reversed = flags.clone();
        reversed.reverse();

        let expected = Worst::Flag(flag(Pollutant::No2, SeverityLevel::Moderate));
        assert_eq!(classifier.worst(&flags), expected);
        assert_eq!(classifier.worst(&reversed), expected);
    }

    #[test]
    fn test_worst_prefers_severity_over_priority() {
        // ---
        let classifier = Classifier::default();
        let flags = vec![
            flag(Pollutant::Co, SeverityLevel::Moderate),
            flag(Pollutant::Pm25, SeverityLevel::Unhealthy),
        ];
        assert_eq!(classifier.worst(&flags).level(), SeverityLevel::Unhealthy);
    }

    #[test]
    fn test_worst_of_nothing_is_all_good() {
        // ---
        let classifier = Classifier::default();
        let flags = classifier.classify_reading(&reading(None, None, None, None));
        assert!(flags.is_empty());
        assert_eq!(classifier.worst(&flags), Worst::AllGood);
    }

    #[test]
    fn test_custom_priority_changes_tie_break() {
        // ---
        let priority = PriorityOrder::new(&[
            Pollutant::Pm25,
            Pollutant::Pm10,
            Pollutant::No2,
            Pollutant::Co,
        ])
        .unwrap();
        let table = ThresholdTable::new([], priority).unwrap();
        let classifier = Classifier::new(table);
        let flags = vec![
            flag(Pollutant::Co, SeverityLevel::Good),
            flag(Pollutant::Pm25, SeverityLevel::Good),
        ];
        assert_eq!(
            classifier.worst(&flags),
            Worst::Flag(flag(Pollutant::Pm25, SeverityLevel::Good))
        );
    }

    #[test]
    fn test_non_good_in_priority_order() {
        // ---
        let classifier = Classifier::default();
        let flags = vec![
            flag(Pollutant::Pm25, SeverityLevel::Unhealthy),
            flag(Pollutant::Pm10, SeverityLevel::Good),
            flag(Pollutant::Co, SeverityLevel::Moderate),
        ];
        let out: Vec<_> = classifier.non_good(&flags).iter().map(|f| f.pollutant).collect();
        assert_eq!(out, vec![Pollutant::Co, Pollutant::Pm25]);
    }
}
