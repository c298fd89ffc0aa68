//! Alert listing and resolution.

use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;

use crate::error::EngineError;
use crate::models::Alert;
use crate::TelemetryEngine;

use super::extract::{PathParams, QueryParams};

// ---

pub fn router() -> Router<TelemetryEngine> {
    // ---
    Router::new()
        .route("/sensors/{sensor_id}/alerts", get(list))
        .route("/sensors/{sensor_id}/alerts/{index}/resolve", post(resolve))
}

#[derive(Debug, Deserialize)]
pub struct AlertsQuery {
    resolved: Option<bool>,
}

async fn list(
    State(engine): State<TelemetryEngine>,
    PathParams(sensor_id): PathParams<String>,
    QueryParams(params): QueryParams<AlertsQuery>,
) -> Result<Json<Vec<Alert>>, EngineError> {
    Ok(Json(engine.list_alerts(&sensor_id, params.resolved).await?))
}

async fn resolve(
    State(engine): State<TelemetryEngine>,
    PathParams((sensor_id, index)): PathParams<(String, usize)>,
) -> Result<StatusCode, EngineError> {
    engine.resolve_alert(&sensor_id, index).await?;
    Ok(StatusCode::NO_CONTENT)
}
