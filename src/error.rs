//! Error taxonomy for the telemetry engine.
//!
//! "Nothing to optimize" and "too few readings" are not errors; those paths
//! return `None` or an empty list.

use serde::Serialize;
use thiserror::Error;

// ---

/// A single failing input field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        FieldError {
            field: field.into(),
            message: message.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum EngineError {
    // ---
    #[error("validation failed: {}", summarize(.0))]
    Validation(Vec<FieldError>),

    #[error("sensor '{0}' not found")]
    NotFound(String),

    #[error("sensor '{0}' is already registered")]
    DuplicateSensor(String),

    #[error("sensor '{sensor_id}' is not owned by '{owner_id}'")]
    NotOwner { sensor_id: String, owner_id: String },

    #[error("sensor '{sensor_id}' has no alert at index {index}")]
    AlertNotFound { sensor_id: String, index: usize },

    #[error("storage error: {0}")]
    Store(#[from] sqlx::Error),

    #[error("corrupt stored value: {0}")]
    Corrupt(String),
}

pub type EngineResult<T> = Result<T, EngineError>;

fn summarize(fields: &[FieldError]) -> String {
    fields
        .iter()
        .map(|f| format!("{}: {}", f.field, f.message))
        .collect::<Vec<_>>()
        .join("; ")
}
