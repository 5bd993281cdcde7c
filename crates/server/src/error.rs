//! HTTP error mapping.
//!
//! Every failure leaves the API as `{success: false, message}`. Engine
//! errors carry their own taxonomy; this layer only picks the status code
//! and keeps database details out of responses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use concilia_engine::EngineError;
use serde_json::json;

#[derive(Debug)]
pub enum ApiError {
    Engine(EngineError),
    /// Malformed request surface: missing identity headers, bad query
    /// values. Never reaches the engine.
    BadRequest(String),
}

impl From<EngineError> for ApiError {
    fn from(err: EngineError) -> Self {
        ApiError::Engine(err)
    }
}

impl From<sqlx::Error> for ApiError {
    fn from(err: sqlx::Error) -> Self {
        ApiError::Engine(EngineError::Database(err))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(message) => (StatusCode::BAD_REQUEST, message),
            ApiError::Engine(err) => match err {
                EngineError::Validation(_)
                | EngineError::CrossTenantReference(_)
                | EngineError::UnsupportedFormat => {
                    (StatusCode::UNPROCESSABLE_ENTITY, err.to_string())
                }
                EngineError::NotFound(_) => (StatusCode::NOT_FOUND, err.to_string()),
                EngineError::Io(_) | EngineError::Database(_) => {
                    tracing::error!(error = %err, "internal error");
                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        "internal server error".to_string(),
                    )
                }
            },
        };

        (
            status,
            Json(json!({ "success": false, "message": message })),
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_maps_to_404() {
        let resp = ApiError::Engine(EngineError::NotFound("entry")).into_response();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn validation_maps_to_422() {
        let resp = ApiError::Engine(EngineError::validation("bad draft")).into_response();
        assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[test]
    fn database_errors_are_opaque_500s() {
        let resp = ApiError::Engine(EngineError::Database(sqlx::Error::RowNotFound)).into_response();
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
