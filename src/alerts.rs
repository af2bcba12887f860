//! Alert records derived from classified readings.
//!
//! Two consumption modes share one builder:
//! - `Exhaustive`: one alert per non-GOOD pollutant, or a single `ALL_GOOD`
//!   alert when a reading has nothing above GOOD (alert list view).
//! - `SingleWorst`: exactly one alert per reading carrying its worst
//!   pollutant (live notification feed).
//!
//! Alerts are unique on `(reading_id, subject)` and ordered newest first.

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Serialize, Serializer};

use crate::bucket::TimeBucketer;
use crate::classify::{Classifier, PollutantFlag, Worst};
use crate::models::{Pollutant, Reading, SeverityLevel};

// ---

pub const ALL_GOOD: &str = "ALL_GOOD";
const ALL_GOOD_DISPLAY: &str = "All pollutants within limits";

/// What an alert is about: one pollutant, or the reading as a whole.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AlertSubject {
    Pollutant(Pollutant),
    AllGood,
}

impl AlertSubject {
    pub fn as_str(&self) -> &'static str {
        // ---
        match self {
            AlertSubject::Pollutant(p) => p.label(),
            AlertSubject::AllGood => ALL_GOOD,
        }
    }
}

impl fmt::Display for AlertSubject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for AlertSubject {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Alert {
    pub reading_id: String,
    pub device_id: String,
    #[serde(rename = "pollutant")]
    pub subject: AlertSubject,
    pub severity: SeverityLevel,
    pub timestamp: DateTime<Utc>,
    pub value: Option<f64>,
    pub display_value: String,
}

impl Alert {
    fn from_flag(reading: &Reading, flag: PollutantFlag) -> Self {
        // ---
        let decimals = flag.pollutant.display_decimals() as usize;
        Alert {
            reading_id: reading.reading_id.clone(),
            device_id: reading.device_id.clone(),
            subject: AlertSubject::Pollutant(flag.pollutant),
            severity: flag.level,
            timestamp: reading.timestamp,
            value: Some(flag.value),
            display_value: format!("{:.*} {}", decimals, flag.value, flag.pollutant.unit()),
        }
    }

    fn all_good(reading: &Reading) -> Self {
        // ---
        Alert {
            reading_id: reading.reading_id.clone(),
            device_id: reading.device_id.clone(),
            subject: AlertSubject::AllGood,
            severity: SeverityLevel::Good,
            timestamp: reading.timestamp,
            value: None,
            display_value: ALL_GOOD_DISPLAY.to_string(),
        }
    }

    fn key(&self) -> (String, AlertSubject) {
        (self.reading_id.clone(), self.subject)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AlertMode {
    #[default]
    Exhaustive,
    SingleWorst,
}

impl FromStr for AlertMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // ---
        match s.trim().to_ascii_lowercase().as_str() {
            "exhaustive" | "all" => Ok(AlertMode::Exhaustive),
            "worst" | "single_worst" => Ok(AlertMode::SingleWorst),
            other => Err(format!("unknown alert mode '{}'", other)),
        }
    }
}

pub struct AlertBuilder<'a> {
    classifier: &'a Classifier,
}

impl<'a> AlertBuilder<'a> {
    pub fn new(classifier: &'a Classifier) -> Self {
        Self { classifier }
    }

    /// Alerts for every reading, deduplicated and sorted.
    pub fn build(&self, readings: &[Reading], mode: AlertMode) -> Vec<Alert> {
        // ---
        let mut seen = HashSet::new();
        let mut alerts = Vec::new();

        for reading in readings {
            for alert in self.alerts_for(reading, mode) {
                if seen.insert(alert.key()) {
                    alerts.push(alert);
                }
            }
        }

        self.sort(&mut alerts);
        alerts
    }

    /// Union of two alert lists; the first occurrence of a key is kept.
    pub fn merge(&self, existing: Vec<Alert>, incoming: Vec<Alert>) -> Vec<Alert> {
        // ---
        let mut seen = HashSet::new();
        let mut merged: Vec<Alert> = existing
            .into_iter()
            .chain(incoming)
            .filter(|a| seen.insert(a.key()))
            .collect();
        self.sort(&mut merged);
        merged
    }

    fn alerts_for(&self, reading: &Reading, mode: AlertMode) -> Vec<Alert> {
        // ---
        let flags = self.classifier.classify_reading(reading);

        match mode {
            AlertMode::Exhaustive => {
                let raised = self.classifier.non_good(&flags);
                if raised.is_empty() {
                    vec![Alert::all_good(reading)]
                } else {
                    raised.into_iter().map(|f| Alert::from_flag(reading, f)).collect()
                }
            }
            AlertMode::SingleWorst => match self.classifier.worst(&flags) {
                Worst::Flag(flag) => vec![Alert::from_flag(reading, flag)],
                Worst::AllGood => vec![Alert::all_good(reading)],
            },
        }
    }

    fn sort(&self, alerts: &mut [Alert]) {
        // ---
        let priority = self.classifier.priority();
        let rank = |s: &AlertSubject| match s {
            AlertSubject::Pollutant(p) => priority.rank(*p),
            AlertSubject::AllGood => usize::MAX,
        };
        alerts.sort_by(|a, b| {
            b.timestamp
                .cmp(&a.timestamp)
                .then_with(|| a.reading_id.cmp(&b.reading_id))
                .then_with(|| rank(&a.subject).cmp(&rank(&b.subject)))
        });
    }
}

/// Pollutant criterion of an `AlertFilter`. Matching ignores case and
/// accepts both labels (`PM2.5`) and keys (`pm25`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollutantMatch {
    Exact(String),
    Contains(String),
}

impl PollutantMatch {
    fn matches(&self, subject: &AlertSubject) -> bool {
        // ---
        let names = match subject {
            AlertSubject::Pollutant(p) => [p.label(), p.key()],
            AlertSubject::AllGood => [ALL_GOOD, ALL_GOOD],
        };
        match self {
            PollutantMatch::Exact(term) => names.iter().any(|n| n.eq_ignore_ascii_case(term.trim())),
            PollutantMatch::Contains(term) => {
                let term = term.trim().to_ascii_lowercase();
                names.iter().any(|n| n.to_ascii_lowercase().contains(&term))
            }
        }
    }
}

/// Client-side alert filter. Unset criteria pass everything; set criteria
/// must all hold. Dates are calendar days on the deployment calendar.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AlertFilter {
    pub severity: Option<SeverityLevel>,
    pub pollutant: Option<PollutantMatch>,
    pub date: Option<NaiveDate>,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    pub device_id: Option<String>,
}

impl AlertFilter {
    pub fn matches(&self, alert: &Alert, bucketer: &TimeBucketer) -> bool {
        // ---
        let day = bucketer.local_date(alert.timestamp);

        self.severity.map_or(true, |s| alert.severity == s)
            && self.pollutant.as_ref().map_or(true, |m| m.matches(&alert.subject))
            && self.date.map_or(true, |d| day == d)
            && self.from.map_or(true, |d| day >= d)
            && self.to.map_or(true, |d| day <= d)
            && self.device_id.as_ref().map_or(true, |id| &alert.device_id == id)
    }

    pub fn apply(&self, alerts: &[Alert], bucketer: &TimeBucketer) -> Vec<Alert> {
        // ---
        alerts
            .iter()
            .filter(|a| self.matches(a, bucketer))
            .cloned()
            .collect()
    }
}
