// src/routes/health.rs
//! Liveness endpoint for the telemetry service.
//!
//! `GET /health` answers without consulting the engine or its store, so
//! orchestrators can tell "process up" apart from "storage reachable"
//! (the latter shows up as 500s on the resource routes).

use axum::{routing::get, Json, Router};
use serde::Serialize;

#[derive(Serialize)]
struct Liveness {
    status: &'static str,
}

async fn health() -> Json<Liveness> {
    Json(Liveness { status: "ok" })
}

/// Sub-router with the single `GET /health` route, generic over the gateway
/// state so it merges regardless of what the other routes share.
pub fn router<S>() -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    Router::new().route("/health", get(health))
}
