use axum::{extract::Query, extract::State, routing::get, Json, Router};
use chrono::NaiveDate;
use serde::Deserialize;
use tracing::debug;

use super::{parse_param, ApiError, AppState};
use crate::alerts::{Alert, AlertFilter, AlertMode, PollutantMatch};
use crate::models::SeverityLevel;

// ---

pub fn router() -> Router<AppState> {
    // ---
    Router::new().route("/alerts", get(handler))
}

/// Query parameters for filtering alerts
#[derive(Debug, Default, Deserialize)]
pub struct AlertsQuery {
    mode: Option<String>,
    severity: Option<String>,
    pollutant: Option<String>,
    /// `exact` (default) or `contains`
    #[serde(rename = "match")]
    match_kind: Option<String>,
    date: Option<NaiveDate>,
    from: Option<NaiveDate>,
    to: Option<NaiveDate>,
    #[serde(rename = "deviceId", alias = "device_id")]
    device_id: Option<String>,
}

async fn handler(
    Query(params): Query<AlertsQuery>,
    State(scheduler): State<AppState>,
) -> Result<Json<Vec<Alert>>, ApiError> {
    // ---
    debug!("GET /alerts {:?}", params);

    let mode = parse_param::<AlertMode>("mode", params.mode.as_deref())?.unwrap_or_default();
    let filter = build_filter(&params)?;

    let snapshot = scheduler.current();
    let alerts = match mode {
        AlertMode::Exhaustive => &snapshot.alerts,
        AlertMode::SingleWorst => &snapshot.feed,
    };

    Ok(Json(filter.apply(alerts, scheduler.engine().bucketer())))
}

fn build_filter(params: &AlertsQuery) -> Result<AlertFilter, ApiError> {
    // ---
    let severity = parse_param::<SeverityLevel>("severity", params.severity.as_deref())?;

    let pollutant = match params.pollutant.as_deref().filter(|p| !p.trim().is_empty()) {
        None => None,
        Some(term) => Some(match params.match_kind.as_deref().unwrap_or("exact") {
            "exact" => PollutantMatch::Exact(term.to_string()),
            "contains" => PollutantMatch::Contains(term.to_string()),
            other => {
                return Err(ApiError::BadRequest(format!("invalid match: '{}'", other)));
            }
        }),
    };

    Ok(AlertFilter {
        severity,
        pollutant,
        date: params.date,
        from: params.from,
        to: params.to,
        device_id: params.device_id.clone().filter(|d| !d.is_empty()),
    })
}
