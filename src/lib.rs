//! Sensor telemetry analytics engine.
//!
//! Ingests time-series readings from field sensors, keeps per-sensor alert
//! state, detects anomalies over a rolling window, scores sensor health, and
//! produces maintenance and optimization recommendations.
//!
//! Module boundaries follow the Explicit Module Boundary Pattern (EMBP): the
//! pure analytics (`alerting`, `anomaly`, `health`, `optimize`) know nothing
//! of storage or HTTP; `store` provides persistence behind traits; `engine`
//! composes them into the operation surface; `routes` exposes that surface
//! over axum. Consumers import from this gateway, not from the submodules.

pub mod alerting;
pub mod anomaly;
pub mod config;
pub mod engine;
pub mod error;
pub mod health;
pub mod models;
pub mod optimize;
pub mod routes;
pub mod schema;
pub mod store;
pub mod validation;

pub use config::Config;
pub use engine::TelemetryEngine;
pub use error::{EngineError, EngineResult, FieldError};
pub use store::{HistorySource, MemoryStore, PgStore, SensorStore};
