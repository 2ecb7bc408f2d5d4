//! HTTP error mapping for API handlers.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use snipstash_core::AppError;

/// Message returned for every failure whose details stay server-side.
pub const GENERIC_ERROR_MESSAGE: &str = "Internal error occured.";

/// Handler error carrying an [`AppError`] to the response boundary.
#[derive(Debug)]
pub struct HttpError(pub AppError);

impl From<AppError> for HttpError {
    fn from(err: AppError) -> Self {
        Self(err)
    }
}

impl HttpError {
    /// Status code and client-facing message for the wrapped error.
    pub fn status_and_message(&self) -> (StatusCode, String) {
        match &self.0 {
            AppError::NotFound(what) => (StatusCode::NOT_FOUND, format!("{} not found", what)),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppError::Conflict(msg) => (StatusCode::METHOD_NOT_ALLOWED, msg.clone()),
            other => {
                tracing::error!("Request failed: {}", other);
                (
                    StatusCode::UNPROCESSABLE_ENTITY,
                    GENERIC_ERROR_MESSAGE.to_string(),
                )
            }
        }
    }
}

impl IntoResponse for HttpError {
    fn into_response(self) -> Response {
        let (status, message) = self.status_and_message();
        (status, Json(json!({ "message": message }))).into_response()
    }
}
