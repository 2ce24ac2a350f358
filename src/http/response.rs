//! Client-facing responses.
//!
//! # Responsibilities
//! - Relay an upstream response (status, filtered headers, streamed body)
//! - Decide every gateway-originated error body in one place
//!
//! # Design Decisions
//! - Error bodies are fixed JSON; upstream error text and addresses never reach the client
//! - Upstream HTTP errors are relayed unchanged; only transport failures become 502

use axum::{
    body::Body,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::http::forward::UpstreamError;
use crate::http::request::TraceId;
use crate::security::AuthError;

/// Body text for every transport-level failure.
pub const UPSTREAM_ERROR: &str = "Upstream service error";

/// Build the client response for a successful upstream exchange.
pub fn relay(status: StatusCode, headers: HeaderMap, body: Body) -> Response {
    let mut response = Response::new(body);
    *response.status_mut() = status;
    *response.headers_mut() = headers;
    response
}

/// Map a transport failure to its client-facing shape: always 502.
///
/// `reason` is accepted so the mapping stays in one place; its text is never rendered.
pub fn translate(_reason: &UpstreamError, trace_id: &TraceId) -> Response {
    (
        StatusCode::BAD_GATEWAY,
        Json(json!({
            "error": UPSTREAM_ERROR,
            "trace_id": trace_id.as_str(),
        })),
    )
        .into_response()
}

pub fn not_found() -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(json!({ "error": "No matching route" })),
    )
        .into_response()
}

pub fn unauthorized(err: &AuthError) -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(json!({ "error": err.to_string() })),
    )
        .into_response()
}

/// Preflight refused: no CORS headers, so the browser blocks the call.
pub fn cors_rejected() -> Response {
    (
        StatusCode::FORBIDDEN,
        Json(json!({ "error": "CORS request not allowed" })),
    )
        .into_response()
}
