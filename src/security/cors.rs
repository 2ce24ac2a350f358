//! Cross-origin policy enforcement.
//!
//! # Responsibilities
//! - Answer preflight requests locally, never contacting an upstream
//! - Decide which CORS headers decorate forwarded and locally produced responses
//!
//! # Design Decisions
//! - CORS is enforced in the browser: a disallowed origin on a simple request is
//!   still routed, its response just carries no CORS headers
//! - Requests without `Origin` bypass CORS entirely
//! - The allowed origin is echoed back (never `*`) so credentials stay usable
//!   with a wildcard policy

use std::collections::HashSet;
use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::{
        header::{self, HeaderMap, HeaderName, HeaderValue},
        Method, StatusCode,
    },
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::config::CorsConfig;
use crate::http::response::cors_rejected;

/// Methods a cross-origin caller may use.
pub const ALLOWED_METHODS: [Method; 6] = [
    Method::GET,
    Method::POST,
    Method::PUT,
    Method::PATCH,
    Method::DELETE,
    Method::OPTIONS,
];

/// Request headers a cross-origin caller may send.
pub const ALLOWED_HEADERS: [HeaderName; 2] = [header::AUTHORIZATION, header::CONTENT_TYPE];

const ALLOW_METHODS_VALUE: &str = "GET, POST, PUT, PATCH, DELETE, OPTIONS";
const ALLOW_HEADERS_VALUE: &str = "Authorization, Content-Type";
const EXPOSE_HEADERS_VALUE: &str = "x-request-id";

/// Outcome of evaluating a request against the policy.
#[derive(Debug, Clone, PartialEq)]
pub enum CorsDecision {
    /// No `Origin` header: not a CORS request.
    Bypass,
    /// Preflight allowed; answer `200` with these headers.
    PreflightAllowed(HeaderMap),
    /// Preflight refused; answer `403` without CORS headers.
    PreflightRejected,
    /// Actual request from an allowed origin; attach these headers to the response.
    Decorate(HeaderMap),
    /// Actual request from a disallowed origin; forward without CORS headers.
    Undecorated,
}

#[derive(Debug, Clone)]
enum AllowedOrigins {
    Any,
    Exact(HashSet<String>),
}

/// Immutable cross-origin policy built from configuration.
#[derive(Debug, Clone)]
pub struct CorsPolicy {
    origins: AllowedOrigins,
    allow_credentials: bool,
    max_age_secs: Option<u64>,
}

impl CorsPolicy {
    pub fn from_config(config: &CorsConfig) -> Self {
        let origins = if config.origins.iter().any(|o| o == "*") {
            AllowedOrigins::Any
        } else {
            AllowedOrigins::Exact(config.origins.iter().cloned().collect())
        };

        Self {
            origins,
            allow_credentials: config.allow_credentials,
            max_age_secs: config.max_age_secs,
        }
    }

    /// Returns true if `origin` is in the allowed set.
    pub fn is_origin_allowed(&self, origin: &str) -> bool {
        match &self.origins {
            AllowedOrigins::Any => true,
            AllowedOrigins::Exact(set) => set.contains(origin),
        }
    }

    /// Classify a request by its method and CORS request headers.
    pub fn evaluate(&self, method: &Method, headers: &HeaderMap) -> CorsDecision {
        let Some(origin) = headers.get(header::ORIGIN) else {
            return CorsDecision::Bypass;
        };
        let allowed_origin = origin
            .to_str()
            .map(|o| self.is_origin_allowed(o))
            .unwrap_or(false);

        let requested_method = headers.get(header::ACCESS_CONTROL_REQUEST_METHOD);
        if method == Method::OPTIONS && requested_method.is_some() {
            let method_ok = requested_method
                .and_then(|m| Method::from_bytes(m.as_bytes()).ok())
                .is_some_and(|m| ALLOWED_METHODS.contains(&m));
            let headers_ok = requested_headers_allowed(headers);

            return if allowed_origin && method_ok && headers_ok {
                CorsDecision::PreflightAllowed(self.preflight_headers(origin))
            } else {
                CorsDecision::PreflightRejected
            };
        }

        if allowed_origin {
            CorsDecision::Decorate(self.response_headers(origin))
        } else {
            CorsDecision::Undecorated
        }
    }

    fn response_headers(&self, origin: &HeaderValue) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, origin.clone());
        if self.allow_credentials {
            headers.insert(
                header::ACCESS_CONTROL_ALLOW_CREDENTIALS,
                HeaderValue::from_static("true"),
            );
        }
        headers.insert(
            header::ACCESS_CONTROL_EXPOSE_HEADERS,
            HeaderValue::from_static(EXPOSE_HEADERS_VALUE),
        );
        headers.insert(header::VARY, HeaderValue::from_static("Origin"));
        headers
    }

    fn preflight_headers(&self, origin: &HeaderValue) -> HeaderMap {
        let mut headers = self.response_headers(origin);
        headers.remove(header::ACCESS_CONTROL_EXPOSE_HEADERS);
        headers.insert(
            header::ACCESS_CONTROL_ALLOW_METHODS,
            HeaderValue::from_static(ALLOW_METHODS_VALUE),
        );
        headers.insert(
            header::ACCESS_CONTROL_ALLOW_HEADERS,
            HeaderValue::from_static(ALLOW_HEADERS_VALUE),
        );
        if let Some(max_age) = self.max_age_secs {
            headers.insert(header::ACCESS_CONTROL_MAX_AGE, HeaderValue::from(max_age));
        }
        headers.insert(
            header::VARY,
            HeaderValue::from_static(
                "Origin, Access-Control-Request-Method, Access-Control-Request-Headers",
            ),
        );
        headers
    }
}

/// Every name in `Access-Control-Request-Headers` must be in [`ALLOWED_HEADERS`].
fn requested_headers_allowed(headers: &HeaderMap) -> bool {
    headers
        .get_all(header::ACCESS_CONTROL_REQUEST_HEADERS)
        .iter()
        .all(|value| match value.to_str() {
            Ok(list) => list
                .split(',')
                .map(str::trim)
                .filter(|name| !name.is_empty())
                .all(|name| {
                    ALLOWED_HEADERS
                        .iter()
                        .any(|allowed| allowed.as_str().eq_ignore_ascii_case(name))
                }),
            Err(_) => false,
        })
}

/// Middleware answering preflights and decorating responses.
pub async fn cors_middleware(
    State(policy): State<Arc<CorsPolicy>>,
    request: Request,
    next: Next,
) -> Response {
    match policy.evaluate(request.method(), request.headers()) {
        CorsDecision::PreflightAllowed(headers) => {
            tracing::debug!(path = %request.uri().path(), "CORS preflight accepted");
            (StatusCode::OK, headers).into_response()
        }
        CorsDecision::PreflightRejected => {
            tracing::info!(
                path = %request.uri().path(),
                origin = ?request.headers().get(header::ORIGIN),
                "CORS preflight rejected"
            );
            cors_rejected()
        }
        CorsDecision::Decorate(headers) => {
            let mut response = next.run(request).await;
            let target = response.headers_mut();
            for (name, value) in headers.iter() {
                if *name == header::VARY {
                    target.append(name.clone(), value.clone());
                } else {
                    target.insert(name.clone(), value.clone());
                }
            }
            response
        }
        CorsDecision::Bypass | CorsDecision::Undecorated => next.run(request).await,
    }
}
