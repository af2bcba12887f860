//! Summary cards, latest metrics and device activity.

use axum::{extract::Query, extract::State, routing::get, Json, Router};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::debug;

use super::{fetch_readings, resolve_range, ApiError, AppState};
use crate::devices::DeviceActivity;
use crate::models::Pollutant;
use crate::source::ReadingQuery;
use crate::summary::{MetricCard, SummaryStat};

// ---

pub fn router() -> Router<AppState> {
    // ---
    Router::new()
        .route("/summary", get(summary))
        .route("/metrics/latest", get(latest))
        .route("/devices", get(devices))
}

/// Query parameters for summary statistics
#[derive(Debug, Default, Deserialize)]
pub struct SummaryQuery {
    /// Comma separated, e.g. `pm25,pm10` (default: all)
    pollutants: Option<String>,
    start: Option<DateTime<Utc>>,
    end: Option<DateTime<Utc>>,
    #[serde(rename = "deviceId", alias = "device_id")]
    device_id: Option<String>,
}

async fn summary(
    Query(params): Query<SummaryQuery>,
    State(scheduler): State<AppState>,
) -> Result<Json<Vec<SummaryStat>>, ApiError> {
    // ---
    debug!("GET /summary {:?}", params);

    let pollutants = parse_pollutants(params.pollutants.as_deref())?;
    let (start, end) = resolve_range(&scheduler, params.start, params.end)?;

    let readings = fetch_readings(
        &scheduler,
        ReadingQuery {
            start,
            end,
            device_id: params.device_id.clone().filter(|d| !d.is_empty()),
        },
    )
    .await?;

    Ok(Json(scheduler.engine().summarize(&readings, &pollutants)))
}

async fn latest(State(scheduler): State<AppState>) -> Json<Vec<MetricCard>> {
    Json(scheduler.current().metrics.clone())
}

async fn devices(State(scheduler): State<AppState>) -> Json<Vec<DeviceActivity>> {
    Json(scheduler.current().devices.clone())
}

fn parse_pollutants(list: Option<&str>) -> Result<Vec<Pollutant>, ApiError> {
    // ---
    let Some(list) = list.filter(|l| !l.trim().is_empty()) else {
        return Ok(Pollutant::ALL.to_vec());
    };
    list.split(',')
        .map(|p| p.parse::<Pollutant>().map_err(ApiError::BadRequest))
        .collect()
}
