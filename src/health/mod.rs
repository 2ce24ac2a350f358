//! Liveness endpoint.
//!
//! # Design Decisions
//! - Answered locally; upstream health is not probed
//! - Goes through the same tracer as proxied traffic, so it is logged too

use axum::Json;
use serde_json::{json, Value};

/// `GET /health`
pub async fn health_check() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}
