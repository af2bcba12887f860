use axum::{extract::Query, extract::State, routing::get, Json, Router};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::{debug, info};

use super::{fetch_readings, parse_param, resolve_range, ApiError, AppState};
use crate::bucket::BucketWidth;
use crate::models::Pollutant;
use crate::series::{SeriesPayload, SeriesShape};
use crate::source::ReadingQuery;

// ---

pub fn router() -> Router<AppState> {
    // ---
    Router::new().route("/series", get(handler))
}

/// Query parameters for chart series
#[derive(Debug, Default, Deserialize)]
pub struct SeriesQuery {
    start: Option<DateTime<Utc>>,
    end: Option<DateTime<Utc>>,
    /// Pollutant plotted by the per-device shape (default: pm25)
    pollutant: Option<String>,
    #[serde(rename = "deviceId", alias = "device_id")]
    device_id: Option<String>,
    /// `per_device` (default), `all` or `daily`
    shape: Option<String>,
    /// Minutes, or `day`; chosen from the range when absent
    width: Option<String>,
}

async fn handler(
    Query(params): Query<SeriesQuery>,
    State(scheduler): State<AppState>,
) -> Result<Json<SeriesPayload>, ApiError> {
    // ---
    debug!("GET /series {:?}", params);

    let shape = parse_shape(&params)?;
    let width = parse_width(params.width.as_deref())?;
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

    let payload = scheduler.engine().series(&readings, shape, width, (start, end));
    info!(
        "Series complete, returning {} points for {} devices",
        payload.points.len(),
        payload.device_ids.len()
    );
    Ok(Json(payload))
}

fn parse_shape(params: &SeriesQuery) -> Result<SeriesShape, ApiError> {
    // ---
    match params.shape.as_deref().unwrap_or("per_device") {
        "per_device" => {
            let pollutant =
                parse_param::<Pollutant>("pollutant", params.pollutant.as_deref())?.unwrap_or(Pollutant::Pm25);
            Ok(SeriesShape::PerDevice(pollutant))
        }
        "all" => Ok(SeriesShape::AllDevices),
        "daily" => Ok(SeriesShape::Daily),
        other => Err(ApiError::BadRequest(format!("invalid shape: '{}'", other))),
    }
}

fn parse_width(width: Option<&str>) -> Result<Option<BucketWidth>, ApiError> {
    // ---
    match width.map(str::trim).filter(|w| !w.is_empty()) {
        None => Ok(None),
        Some("day") => Ok(Some(BucketWidth::Day)),
        Some(minutes) => {
            let minutes: u32 = minutes
                .parse()
                .map_err(|_| ApiError::BadRequest(format!("invalid width: '{}'", minutes)))?;
            BucketWidth::minutes(minutes)
                .map(Some)
                .map_err(|e| ApiError::BadRequest(e.to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;

    #[test]
    fn test_parse_width() {
        // ---
        assert_eq!(parse_width(None).unwrap(), None);
        assert_eq!(parse_width(Some("day")).unwrap(), Some(BucketWidth::Day));
        assert_eq!(parse_width(Some("5")).unwrap(), Some(BucketWidth::FIVE_MINUTES));
        assert!(parse_width(Some("7")).is_err());
        assert!(parse_width(Some("soon")).is_err());
    }

    #[test]
    fn test_parse_shape() {
        // ---
        let default = SeriesQuery::default();
        assert_eq!(parse_shape(&default).unwrap(), SeriesShape::PerDevice(Pollutant::Pm25));

        let co = SeriesQuery {
            pollutant: Some("CO".into()),
            ..Default::default()
        };
        assert_eq!(parse_shape(&co).unwrap(), SeriesShape::PerDevice(Pollutant::Co));

        let all = SeriesQuery {
            shape: Some("all".into()),
            ..Default::default()
        };
        assert_eq!(parse_shape(&all).unwrap(), SeriesShape::AllDevices);

        let bad = SeriesQuery {
            shape: Some("pie".into()),
            ..Default::default()
        };
        assert!(parse_shape(&bad).is_err());
    }
}
