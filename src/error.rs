//! Error types raised by the engine.
//!
//! Configuration problems are fatal and surface at setup time. Input
//! problems are per row: the offending row is dropped and processing
//! continues with the rest.

use thiserror::Error;

// ---

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("unknown pollutant key '{0}'")]
    UnknownPollutant(String),

    #[error("thresholds for {pollutant} must be finite and non-negative (moderate={moderate}, unhealthy={unhealthy})")]
    InvalidBreakpoint {
        pollutant: &'static str,
        moderate: f64,
        unhealthy: f64,
    },

    #[error("thresholds for {pollutant} are not ascending: moderate {moderate} >= unhealthy {unhealthy}")]
    UnorderedBreakpoints {
        pollutant: &'static str,
        moderate: f64,
        unhealthy: f64,
    },

    #[error("priority order must name every pollutant exactly once: {0}")]
    InvalidPriority(String),

    #[error("bucket width of {0} minutes does not divide an hour")]
    InvalidBucketWidth(u32),

    #[error("invalid UTC offset '{0}', expected e.g. +08:00")]
    InvalidOffset(String),

    #[error("malformed threshold table: {0}")]
    Malformed(String),
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum InputDataError {
    #[error("row {row}: missing device_id")]
    MissingDeviceId { row: usize },

    #[error("row {row}: missing timestamp")]
    MissingTimestamp { row: usize },

    #[error("row {row}: unparseable timestamp '{value}'")]
    BadTimestamp { row: usize, value: String },

    #[error("row {row}: {pollutant} value {value} is negative or not finite")]
    BadValue {
        row: usize,
        pollutant: &'static str,
        value: f64,
    },

    #[error("row {row}: undecodable record: {reason}")]
    Undecodable { row: usize, reason: String },
}

impl InputDataError {
    /// Position of the rejected row in the batch it arrived in.
    pub fn row(&self) -> usize {
        // ---
        match self {
            InputDataError::MissingDeviceId { row }
            | InputDataError::MissingTimestamp { row }
            | InputDataError::BadTimestamp { row, .. }
            | InputDataError::BadValue { row, .. }
            | InputDataError::Undecodable { row, .. } => *row,
        }
    }
}
