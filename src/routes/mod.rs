//! HTTP gateway. Each sibling module exports a subrouter; `router` merges
//! them and attaches the shared scheduler as state (EMBP: `main.rs` never
//! touches individual endpoints).

use std::sync::Arc;

use axum::{http::StatusCode, response::IntoResponse, response::Response, Json, Router};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::models::Reading;
use crate::scheduler::Scheduler;
use crate::source::ReadingQuery;

mod alerts;
mod health;
mod refresh;
mod series;
mod stats;

// ---

pub type AppState = Arc<Scheduler>;

pub fn router(scheduler: Arc<Scheduler>) -> Router {
    // ---
    Router::new()
        .merge(alerts::router())
        .merge(series::router())
        .merge(stats::router())
        .merge(refresh::router())
        .merge(health::router())
        .with_state(scheduler)
}

/// Error body shared by all endpoints.
#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

#[derive(Debug)]
pub(crate) enum ApiError {
    BadRequest(String),
    Upstream(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        // ---
        let (status, error) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Upstream(msg) => (StatusCode::BAD_GATEWAY, msg),
        };
        (status, Json(ErrorBody { error })).into_response()
    }
}

/// Resolve an optional `[start, end)` request range; missing ends default to
/// the scheduler's look-back window ending now.
pub(crate) fn resolve_range(
    scheduler: &Scheduler,
    start: Option<DateTime<Utc>>,
    end: Option<DateTime<Utc>>,
) -> Result<(DateTime<Utc>, DateTime<Utc>), ApiError> {
    // ---
    let end = end.unwrap_or_else(Utc::now);
    let start = start.unwrap_or(end - scheduler.window());
    if start >= end {
        return Err(ApiError::BadRequest(format!(
            "start {} must be before end {}",
            start, end
        )));
    }
    Ok((start, end))
}

/// Fetch and validate readings for a request. A failed fetch is surfaced
/// unchanged; the engine is not invoked.
pub(crate) async fn fetch_readings(scheduler: &Scheduler, query: ReadingQuery) -> Result<Vec<Reading>, ApiError> {
    // ---
    let batch = scheduler.source().fetch(&query).await.map_err(|e| {
        tracing::error!("Failed to fetch readings: {}", e);
        ApiError::Upstream(format!("Failed to fetch readings: {}", e))
    })?;
    Ok(batch.ingest().readings)
}

pub(crate) fn parse_param<T>(name: &str, value: Option<&str>) -> Result<Option<T>, ApiError>
where
    T: std::str::FromStr<Err = String>,
{
    // ---
    value
        .filter(|v| !v.trim().is_empty())
        .map(|v| v.parse::<T>())
        .transpose()
        .map_err(|e| ApiError::BadRequest(format!("invalid {}: {}", name, e)))
}
