use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::post, Json, Router};
use serde_json::json;
use tracing::info;

use super::AppState;
use crate::scheduler::PassOutcome;

// ---

pub fn router() -> Router<AppState> {
    // ---
    Router::new().route("/refresh", post(handler))
}

/// Handle `POST /refresh`: run a pass now unless one is in flight.
async fn handler(State(scheduler): State<AppState>) -> impl IntoResponse {
    // ---
    info!("POST /refresh - Manual refresh requested");

    match scheduler.run_pass().await {
        PassOutcome::Published(generation) => {
            (StatusCode::ACCEPTED, Json(json!({ "generation": generation })))
        }
        PassOutcome::Skipped => (
            StatusCode::CONFLICT,
            Json(json!({ "error": "refresh already in progress" })),
        ),
        PassOutcome::Failed(msg) => (StatusCode::BAD_GATEWAY, Json(json!({ "error": msg }))),
    }
}
