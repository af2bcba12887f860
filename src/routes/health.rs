// src/routes/health.rs
//! API health check endpoint for the airwatch service.
//!
//! Used by container orchestrators and CI pipelines to verify that the
//! service is up. It reports the generation of the published snapshot so a
//! probe can tell a live service from one whose refresh loop never ran.

use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;

use super::AppState;

/// JSON response body for the `/health` endpoint.
#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    generation: u64,
}

/// Handle `GET /health`.
///
/// Does not touch the data source.
async fn health(State(scheduler): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        generation: scheduler.current().generation,
    })
}

pub fn router() -> Router<AppState> {
    Router::new().route("/health", get(health))
}
