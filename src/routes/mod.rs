//! Route gateway: merges every resource sub-router and binds the engine as
//! shared state, so `main.rs` never sees individual endpoints.

use axum::Router;

use crate::TelemetryEngine;

mod alerts;
mod analytics;
mod error;
mod extract;
mod health;
mod readings;
mod sensors;

// ---

pub fn router(engine: TelemetryEngine) -> Router {
    // ---
    Router::new()
        .merge(sensors::router())
        .merge(readings::router())
        .merge(alerts::router())
        .merge(analytics::router())
        .merge(health::router())
        .with_state(engine)
}
