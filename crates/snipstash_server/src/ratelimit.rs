//! Rate-limit middleware.
//!
//! Counts every request against its client identity before routing. Blocked
//! requests are answered with 429; every response carries the counter
//! annotations. When the counters cannot be reached the request is let
//! through unannotated.

use crate::AppState;
use axum::{
    extract::{ConnectInfo, Request, State},
    http::{header, HeaderName, HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use hyper::HeaderMap;
use serde_json::json;
use snipstash_core::ratelimit::RateLimitVerdict;
use std::net::SocketAddr;

const UNKNOWN_CLIENT: &str = "unknown";

/// Client identity: first `X-Forwarded-For` hop, then `X-Real-Ip`, then the
/// peer address.
pub fn client_identity(headers: &HeaderMap, peer: Option<SocketAddr>) -> String {
    let forwarded = headers
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(str::trim)
        .filter(|value| !value.is_empty());
    let real_ip = || {
        headers
            .get("x-real-ip")
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|value| !value.is_empty())
    };

    match forwarded.or_else(real_ip) {
        Some(client) => client.to_string(),
        None => peer.map_or_else(|| UNKNOWN_CLIENT.to_string(), |addr| addr.ip().to_string()),
    }
}

/// Declared payload size; absent or malformed `Content-Length` counts as zero.
pub fn declared_length(headers: &HeaderMap) -> u64 {
    headers
        .get(header::CONTENT_LENGTH)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.trim().parse().ok())
        .unwrap_or(0)
}

fn annotate(headers: &mut HeaderMap, verdict: &RateLimitVerdict) {
    for (name, value) in verdict.annotations() {
        match (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(&value),
        ) {
            (Ok(name), Ok(value)) => {
                headers.insert(name, value);
            }
            _ => tracing::debug!("Skipping unrepresentable annotation {}={}", name, value),
        }
    }
}

/// Middleware counting the request and rejecting it when a ceiling is
/// exceeded.
pub async fn enforce_rate_limit(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);
    let client = client_identity(request.headers(), peer);
    let length = declared_length(request.headers());

    let verdict = match state.limiter.check(&client, length).await {
        Ok(verdict) => verdict,
        Err(err) => {
            tracing::warn!("Rate limiter unavailable for {}: {}", client, err);
            return next.run(request).await;
        }
    };

    let mut response = if verdict.is_blocked() {
        tracing::info!("Rate limit exceeded for {}", client);
        (
            StatusCode::TOO_MANY_REQUESTS,
            Json(json!({ "message": "Too many requests" })),
        )
            .into_response()
    } else {
        next.run(request).await
    };
    annotate(response.headers_mut(), &verdict);
    response
}
