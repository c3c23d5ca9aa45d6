//! API error types with HTTP response mapping.

use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use domain::{ErrorKind, RecipeError};

/// API-level error type that maps to HTTP responses.
#[derive(Debug)]
pub enum ApiError {
    /// Malformed request: unreadable body or path parameter.
    BadRequest(String),
    /// Error raised by the recipe engine.
    Recipe(RecipeError),
}

impl ApiError {
    fn kind(&self) -> ErrorKind {
        match self {
            ApiError::BadRequest(_) => ErrorKind::ValidationError,
            ApiError::Recipe(err) => err.kind(),
        }
    }
}

/// Maps an error kind to its HTTP status.
pub fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::ValidationError => StatusCode::BAD_REQUEST,
        ErrorKind::DuplicateKey => StatusCode::CONFLICT,
        ErrorKind::InvalidReference => StatusCode::UNPROCESSABLE_ENTITY,
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::StorageFailure => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let kind = self.kind();
        let status = status_for(kind);
        metrics::counter!("wash_recipe_http_errors_total", "kind" => kind.as_str()).increment(1);
        let message = match self {
            ApiError::BadRequest(msg) => msg,
            ApiError::Recipe(err) => {
                if kind == ErrorKind::StorageFailure {
                    tracing::error!(error = %err, "internal server error");
                }
                err.to_string()
            }
        };

        let body = serde_json::json!({ "error": kind.as_str(), "message": message });
        (status, axum::Json(body)).into_response()
    }
}

impl From<RecipeError> for ApiError {
    fn from(err: RecipeError) -> Self {
        ApiError::Recipe(err)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}
