//! Reading classification and time-series aggregation for the campus
//! air-quality deployment.
//!
//! The engine modules (`models` through `engine`) are pure and synchronous:
//! they turn raw sensor rows into severity flags, deduplicated alerts,
//! bucketed chart series and summary statistics. The service modules
//! (`config`, `source`, `scheduler`, `routes`) fetch rows from the hosted
//! readings table on a timer and publish engine output over HTTP.
//!
//! This crate follows the Explicit Module Boundary Pattern (EMBP): each
//! module exposes a small surface re-exported here, and sibling modules
//! reach each other only through `crate::` paths.

pub mod alerts;
pub mod bucket;
pub mod classify;
pub mod devices;
pub mod engine;
pub mod error;
pub mod ingest;
pub mod models;
pub mod series;
pub mod summary;
pub mod thresholds;

pub mod config;
pub mod routes;
pub mod scheduler;
pub mod source;

pub use alerts::{Alert, AlertBuilder, AlertFilter, AlertMode, AlertSubject, PollutantMatch};
pub use bucket::{Bucket, BucketWidth, TimeBucketer};
pub use classify::{Classifier, PollutantFlag, Worst};
pub use config::Config;
pub use engine::{Engine, EngineConfig, Snapshot};
pub use error::{ConfigError, InputDataError};
pub use ingest::{ingest, ingest_numbered, IngestReport};
pub use models::{Pollutant, RawReading, Reading, SeverityLevel};
pub use series::{SeriesAggregator, SeriesPayload, SeriesPoint, SeriesShape};
pub use summary::{MissingValuePolicy, SummaryStat, SummaryStatsCalculator};
pub use thresholds::{Breakpoints, PriorityOrder, ThresholdTable};
