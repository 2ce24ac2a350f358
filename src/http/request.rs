//! Per-request context.
//!
//! # Responsibilities
//! - Generate a unique trace identifier for every inbound request
//! - Record start time, method, path, and client address
//! - Make the context available to every stage that handles the request
//!
//! # Design Decisions
//! - Trace IDs are random UUID v4, independent of request content
//! - A client-supplied `X-Request-ID` is never reused as the trace ID
//! - The context travels in request extensions and is owned by one task

use std::net::SocketAddr;
use std::time::{Duration, Instant};

use axum::{
    extract::ConnectInfo,
    http::{HeaderName, HeaderValue, Method, Request},
};
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Header carrying the trace identifier to the upstream and back to the client.
pub const X_REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");

/// Opaque per-request correlation key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TraceId(String);

impl TraceId {
    /// Generate a fresh identifier.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The identifier as a header value.
    pub fn header_value(&self) -> HeaderValue {
        // A hyphenated UUID is always visible ASCII.
        HeaderValue::from_str(&self.0).unwrap_or_else(|_| HeaderValue::from_static("invalid"))
    }
}

impl Default for TraceId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for TraceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Everything the gateway knows about one inbound request.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub trace_id: TraceId,
    /// Monotonic start, used for the duration.
    pub started_at: Instant,
    /// Wall-clock start, used for the log timestamp.
    pub received_at: DateTime<Utc>,
    pub method: Method,
    pub path: String,
    pub client_addr: Option<SocketAddr>,
}

impl RequestContext {
    /// Start a context for `request`. The client address comes from `ConnectInfo` when present.
    pub fn from_request<B>(request: &Request<B>) -> Self {
        let client_addr = request
            .extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| *addr);

        Self {
            trace_id: TraceId::new(),
            started_at: Instant::now(),
            received_at: Utc::now(),
            method: request.method().clone(),
            path: request.uri().path().to_string(),
            client_addr,
        }
    }

    /// Time since the request was received.
    pub fn elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }
}

/// Access to the [`RequestContext`] stored in a request's extensions.
pub trait RequestContextExt {
    fn context(&self) -> Option<&RequestContext>;
}

impl<B> RequestContextExt for Request<B> {
    fn context(&self) -> Option<&RequestContext> {
        self.extensions().get::<RequestContext>()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use std::collections::HashSet;

    #[test]
    fn trace_ids_are_unique() {
        let ids: HashSet<_> = (0..1000).map(|_| TraceId::new()).collect();
        assert_eq!(ids.len(), 1000);
    }

    #[test]
    fn context_captures_request_line() {
        let mut request = Request::builder()
            .method(Method::POST)
            .uri("http://gateway/api/v2/auth/register?next=home")
            .header("x-request-id", "client-chosen")
            .body(Body::empty())
            .unwrap();
        let addr: SocketAddr = "192.168.1.20:50000".parse().unwrap();
        request.extensions_mut().insert(ConnectInfo(addr));

        let ctx = RequestContext::from_request(&request);
        assert_eq!(ctx.method, Method::POST);
        assert_eq!(ctx.path, "/api/v2/auth/register");
        assert_eq!(ctx.client_addr, Some(addr));
        assert_ne!(ctx.trace_id.as_str(), "client-chosen");
    }

    #[test]
    fn context_without_connect_info() {
        let request = Request::builder().uri("/health").body(Body::empty()).unwrap();
        let ctx = RequestContext::from_request(&request);
        assert!(ctx.client_addr.is_none());
        assert!(request.context().is_none());
    }
}
