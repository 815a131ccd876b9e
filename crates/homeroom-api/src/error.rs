//! Error types for the HTTP API layer.
//!
//! [`ApiError`] unifies all failure modes into a single enum that can
//! be converted into an Axum HTTP response via its
//! [`IntoResponse`](axum::response::IntoResponse) implementation.
//! Engine validation errors map to 4xx; everything internal is a 500.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use homeroom_engine::EngineError;

/// Errors that can occur in the API layer.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// The request was semantically invalid (unknown achievement kind,
    /// non-grantable source).
    #[error("invalid request: {0}")]
    BadRequest(String),

    /// The request conflicts with current state (locked cosmetic).
    #[error("conflict: {0}")]
    Conflict(String),

    /// An internal error occurred.
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<EngineError> for ApiError {
    fn from(source: EngineError) -> Self {
        match source {
            EngineError::UnknownAchievement { .. } | EngineError::SourceNotDirect { .. } => {
                Self::BadRequest(source.to_string())
            }
            EngineError::ImageLocked { .. } => Self::Conflict(source.to_string()),
            EngineError::Db { .. }
            | EngineError::Schedule { .. }
            | EngineError::Config { .. }
            | EngineError::Signal { .. } => Self::Internal(source.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            Self::Conflict(msg) => (StatusCode::CONFLICT, msg.clone()),
            Self::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg.clone()),
        };

        let body = serde_json::json!({
            "error": message,
            "status": status.as_u16(),
        });

        (status, axum::Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_errors_map_to_bad_request() {
        let err = ApiError::from(EngineError::UnknownAchievement {
            kind: "nonsense".to_owned(),
        });
        assert!(matches!(err, ApiError::BadRequest(_)));
    }

    #[test]
    fn locked_image_maps_to_conflict() {
        let err = ApiError::from(EngineError::ImageLocked { index: 4 });
        assert!(matches!(err, ApiError::Conflict(_)));
    }
}
