//! HTTP mapping for engine errors.
//!
//! Validation → 400 with the field list, unknown sensor or alert → 404,
//! wrong owner → 403, duplicate registration → 409, storage → 500.
//! Extractor rejections are folded into validation errors.

use axum::{
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use tracing::error;

use crate::error::{EngineError, FieldError};

// ---

/// JSON error body shared by every endpoint.
#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    fields: Vec<FieldError>,
}

impl IntoResponse for EngineError {
    fn into_response(self) -> Response {
        // ---
        let status = match &self {
            EngineError::Validation(_) => StatusCode::BAD_REQUEST,
            EngineError::NotFound(_) | EngineError::AlertNotFound { .. } => StatusCode::NOT_FOUND,
            EngineError::NotOwner { .. } => StatusCode::FORBIDDEN,
            EngineError::DuplicateSensor(_) => StatusCode::CONFLICT,
            EngineError::Store(_) | EngineError::Corrupt(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        if status.is_server_error() {
            error!("Request failed: {}", self);
        }

        let error = self.to_string();
        let fields = match self {
            EngineError::Validation(fields) => fields,
            _ => Vec::new(),
        };

        (status, Json(ErrorResponse { error, fields })).into_response()
    }
}

impl From<JsonRejection> for EngineError {
    fn from(rejection: JsonRejection) -> Self {
        rejected("body", rejection.body_text())
    }
}

impl From<QueryRejection> for EngineError {
    fn from(rejection: QueryRejection) -> Self {
        rejected("query", rejection.body_text())
    }
}

impl From<PathRejection> for EngineError {
    fn from(rejection: PathRejection) -> Self {
        rejected("path", rejection.body_text())
    }
}

fn rejected(fallback: &str, detail: String) -> EngineError {
    let field = rejected_field(&detail).unwrap_or_else(|| fallback.to_string());
    EngineError::Validation(vec![FieldError::new(field, detail)])
}

/// Recover the offending field from a serde message wrapped by axum, e.g.
/// "Failed to deserialize ...: sensor_type: unknown variant `lava`" or
/// "...: missing field `unit`".
fn rejected_field(detail: &str) -> Option<String> {
    // ---
    if let Some((_, rest)) = detail.split_once("missing field `") {
        return rest.split_once('`').map(|(name, _)| name.to_string());
    }

    let mut segments = detail.splitn(3, ": ").skip(1);
    match (segments.next(), segments.next()) {
        (Some(path), Some(_)) if is_field_path(path) => Some(path.to_string()),
        _ => None,
    }
}

fn is_field_path(s: &str) -> bool {
    !s.is_empty()
        && s.chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '[' | ']'))
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;

    #[test]
    fn test_rejected_field_from_serde_path() {
        // ---
        let detail = "Failed to deserialize the JSON body into the target type: \
                      location.lat: invalid type: string \"x\", expected f64 at line 1 column 9";
        assert_eq!(rejected_field(detail).as_deref(), Some("location.lat"));
    }

    #[test]
    fn test_rejected_field_from_missing_field() {
        // ---
        let detail = "Failed to deserialize query string: missing field `owner_id`";
        assert_eq!(rejected_field(detail).as_deref(), Some("owner_id"));
    }

    #[test]
    fn test_rejected_falls_back_when_no_field_named() {
        // ---
        let err = rejected(
            "body",
            "Failed to parse the request body as JSON: expected value at line 1 column 1".into(),
        );
        match err {
            EngineError::Validation(fields) => {
                assert_eq!(fields.len(), 1);
                assert_eq!(fields[0].field, "body");
                assert!(fields[0].message.contains("expected value"));
            }
            other => panic!("expected validation error, got {:?}", other),
        }
    }
}
