//! Reading ingestion and retrieval.

use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::debug;

use crate::error::EngineError;
use crate::models::{IngestRequest, Reading};
use crate::TelemetryEngine;

use super::extract::{JsonBody, PathParams, QueryParams};

// ---

pub fn router() -> Router<TelemetryEngine> {
    // ---
    Router::new().route("/sensors/{sensor_id}/readings", get(list).post(ingest))
}

async fn ingest(
    State(engine): State<TelemetryEngine>,
    PathParams(sensor_id): PathParams<String>,
    JsonBody(req): JsonBody<IngestRequest>,
) -> Result<impl IntoResponse, EngineError> {
    // ---
    let reading = engine.ingest(&sensor_id, req).await?;
    Ok((StatusCode::CREATED, Json(reading)))
}

/// Query parameters for filtering sensor readings
#[derive(Debug, Deserialize)]
pub struct ReadingsQuery {
    limit: Option<usize>,
    /// Inclusive RFC 3339 lower bound on the reading timestamp.
    start: Option<DateTime<Utc>>,
    /// Inclusive RFC 3339 upper bound on the reading timestamp.
    end: Option<DateTime<Utc>>,
}

async fn list(
    State(engine): State<TelemetryEngine>,
    PathParams(sensor_id): PathParams<String>,
    QueryParams(params): QueryParams<ReadingsQuery>,
) -> Result<Json<Vec<Reading>>, EngineError> {
    // ---
    debug!("GET /sensors/{}/readings - {:?}", sensor_id, params);
    let readings = engine
        .list_readings(&sensor_id, params.limit, params.start, params.end)
        .await?;
    Ok(Json(readings))
}
