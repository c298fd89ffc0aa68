//! Sensor registry endpoints: register, look up, list, patch status, delete.

use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, patch},
    Json, Router,
};
use serde::Deserialize;
use tracing::debug;

use crate::error::{EngineError, FieldError};
use crate::models::{
    BoundingBox, Sensor, SensorFilter, SensorSpecRequest, SensorStatus, SensorType, StatusPatch,
};
use crate::TelemetryEngine;

use super::extract::{JsonBody, PathParams, QueryParams};

// ---

pub fn router() -> Router<TelemetryEngine> {
    // ---
    Router::new()
        .route("/sensors", get(list).post(register))
        .route("/sensors/{sensor_id}", get(fetch).delete(remove))
        .route("/sensors/{sensor_id}/status", patch(update_status))
}

async fn register(
    State(engine): State<TelemetryEngine>,
    JsonBody(req): JsonBody<SensorSpecRequest>,
) -> Result<impl IntoResponse, EngineError> {
    // ---
    debug!("POST /sensors - {:?}", req.sensor_id);
    let sensor = engine.register(req).await?;
    Ok((StatusCode::CREATED, Json(sensor)))
}

async fn fetch(
    State(engine): State<TelemetryEngine>,
    PathParams(sensor_id): PathParams<String>,
) -> Result<Json<Sensor>, EngineError> {
    Ok(Json(engine.get_sensor(&sensor_id).await?))
}

/// Query parameters for listing sensors. The bounding box applies only when
/// all four corners are given.
#[derive(Debug, Deserialize)]
pub struct ListSensorsQuery {
    owner_id: Option<String>,
    sensor_type: Option<SensorType>,
    status: Option<SensorStatus>,
    min_lat: Option<f64>,
    max_lat: Option<f64>,
    min_lon: Option<f64>,
    max_lon: Option<f64>,
}

impl ListSensorsQuery {
    fn into_filter(self) -> Result<SensorFilter, EngineError> {
        // ---
        let bbox = match (self.min_lat, self.max_lat, self.min_lon, self.max_lon) {
            (Some(min_lat), Some(max_lat), Some(min_lon), Some(max_lon)) => Some(BoundingBox {
                min_lat,
                max_lat,
                min_lon,
                max_lon,
            }),
            (None, None, None, None) => None,
            _ => {
                return Err(EngineError::Validation(vec![FieldError::new(
                    "bbox",
                    "min_lat, max_lat, min_lon and max_lon must be given together",
                )]))
            }
        };

        Ok(SensorFilter {
            owner_id: self.owner_id,
            sensor_type: self.sensor_type,
            status: self.status,
            bbox,
        })
    }
}

async fn list(
    State(engine): State<TelemetryEngine>,
    QueryParams(params): QueryParams<ListSensorsQuery>,
) -> Result<Json<Vec<Sensor>>, EngineError> {
    // ---
    debug!("GET /sensors - {:?}", params);
    let filter = params.into_filter()?;
    Ok(Json(engine.list_sensors(&filter).await?))
}

async fn update_status(
    State(engine): State<TelemetryEngine>,
    PathParams(sensor_id): PathParams<String>,
    JsonBody(patch): JsonBody<StatusPatch>,
) -> Result<Json<Sensor>, EngineError> {
    Ok(Json(engine.update_status(&sensor_id, patch).await?))
}

#[derive(Debug, Deserialize)]
pub struct OwnerQuery {
    owner_id: String,
}

async fn remove(
    State(engine): State<TelemetryEngine>,
    PathParams(sensor_id): PathParams<String>,
    QueryParams(owner): QueryParams<OwnerQuery>,
) -> Result<StatusCode, EngineError> {
    engine.delete_sensor(&sensor_id, &owner.owner_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
