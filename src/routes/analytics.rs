//! On-demand analytics: anomalies, maintenance, health, optimization.

use axum::{
    extract::State,
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use tracing::info;

use crate::error::EngineError;
use crate::models::{
    AnomalyFinding, HealthSummary, MaintenancePrediction, OptimizationKind, OptimizationResult,
    SensorHealth,
};
use crate::TelemetryEngine;

use super::extract::{PathParams, QueryParams};

// ---

pub fn router() -> Router<TelemetryEngine> {
    // ---
    Router::new()
        .route("/sensors/{sensor_id}/anomalies", get(anomalies))
        .route("/sensors/{sensor_id}/maintenance", get(maintenance))
        .route("/sensors/{sensor_id}/health", get(sensor_health))
        .route("/owners/{owner_id}/health", get(owner_health))
        .route("/owners/{owner_id}/optimize/{kind}", get(optimize))
}

#[derive(Debug, Deserialize)]
pub struct AnomalyQuery {
    window: Option<usize>,
    #[serde(default)]
    persist: bool,
}

async fn anomalies(
    State(engine): State<TelemetryEngine>,
    PathParams(sensor_id): PathParams<String>,
    QueryParams(params): QueryParams<AnomalyQuery>,
) -> Result<Json<Vec<AnomalyFinding>>, EngineError> {
    // ---
    let findings = engine
        .detect_anomalies(&sensor_id, params.window, params.persist)
        .await?;
    info!("GET /sensors/{}/anomalies - {} finding(s)", sensor_id, findings.len());
    Ok(Json(findings))
}

async fn maintenance(
    State(engine): State<TelemetryEngine>,
    PathParams(sensor_id): PathParams<String>,
) -> Result<Json<MaintenancePrediction>, EngineError> {
    Ok(Json(engine.predict_maintenance(&sensor_id).await?))
}

async fn sensor_health(
    State(engine): State<TelemetryEngine>,
    PathParams(sensor_id): PathParams<String>,
) -> Result<Json<SensorHealth>, EngineError> {
    Ok(Json(engine.sensor_health(&sensor_id).await?))
}

async fn owner_health(
    State(engine): State<TelemetryEngine>,
    PathParams(owner_id): PathParams<String>,
) -> Result<Json<HealthSummary>, EngineError> {
    Ok(Json(engine.health_summary(&owner_id).await?))
}

/// `null` body when there is nothing to optimize.
async fn optimize(
    State(engine): State<TelemetryEngine>,
    PathParams((owner_id, kind)): PathParams<(String, OptimizationKind)>,
) -> Result<Json<Option<OptimizationResult>>, EngineError> {
    // ---
    let result = match kind {
        OptimizationKind::Irrigation => engine.optimize_irrigation(&owner_id).await?,
        OptimizationKind::Fertilizer => engine.optimize_fertilizer(&owner_id).await?,
        OptimizationKind::Harvest => engine.optimize_harvest(&owner_id).await?,
    };
    Ok(Json(result))
}
