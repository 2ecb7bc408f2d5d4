//! HTTP request handlers.

/// Account endpoints.
pub mod account;
/// Gist endpoints.
pub mod gist;

use axum::{http::StatusCode, Json};
use serde_json::{json, Value};

/// Liveness probe.
pub async fn ping() -> (StatusCode, Json<Value>) {
    (StatusCode::IM_A_TEAPOT, Json(json!({ "message": "pong" })))
}
