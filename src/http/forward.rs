//! Upstream forwarding.
//!
//! # Responsibilities
//! - Build the outbound request from the inbound one
//! - Send it to the routed upstream with connect and idle read deadlines
//! - Hand back the upstream response as a stream, or a transport failure
//!
//! # Design Decisions
//! - One attempt per inbound request; nothing is retried
//! - Redirects are relayed to the client, never followed
//! - Any upstream status, 5xx included, is a successful exchange
//! - Bodies stream in both directions; nothing is buffered whole
//! - Dropping the returned future abandons the upstream call

use std::error::Error as StdError;
use std::time::Duration;

use axum::{
    body::Body,
    http::{HeaderMap, Request, StatusCode, Uri},
};
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use thiserror::Error;
use tower::ServiceExt;
use tower_http::{decompression::Decompression, timeout::TimeoutBody};

use crate::http::request::{RequestContext, X_REQUEST_ID};
use crate::resilience::{track_progress, with_idle_deadline, UpstreamTimeouts};
use crate::routing::Route;
use crate::security::headers::{
    append_forwarded_for, filter_request_headers, filter_response_headers,
};

type UpstreamClient = Decompression<Client<HttpConnector, Body>>;

/// Transport-level failure talking to an upstream.
///
/// The display text is operator-facing only.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UpstreamError {
    #[error("connect failed: {0}")]
    Connect(String),

    #[error("no response within {0:?}")]
    Timeout(Duration),

    #[error("invalid upstream uri: {0}")]
    InvalidUri(String),

    #[error("transport error: {0}")]
    Transport(String),
}

impl UpstreamError {
    fn from_client_error(err: hyper_util::client::legacy::Error) -> Self {
        let detail = error_chain(&err);
        if err.is_connect() {
            Self::Connect(detail)
        } else {
            Self::Transport(detail)
        }
    }
}

/// `err` and its sources joined with `: `.
fn error_chain(err: &dyn StdError) -> String {
    let mut detail = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        detail.push_str(": ");
        detail.push_str(&cause.to_string());
        source = cause.source();
    }
    detail
}

/// Result of one forwarding attempt. Consumed immediately, never stored.
#[derive(Debug)]
pub enum ProxyOutcome {
    Forwarded {
        status: StatusCode,
        headers: HeaderMap,
        body: Body,
    },
    Failed {
        reason: UpstreamError,
        upstream_target: String,
    },
}

/// Sends routed requests upstream over a shared connection pool.
#[derive(Debug, Clone)]
pub struct Forwarder {
    client: UpstreamClient,
    timeouts: UpstreamTimeouts,
}

impl Forwarder {
    pub fn new(timeouts: UpstreamTimeouts) -> Self {
        let mut connector = HttpConnector::new();
        connector.set_connect_timeout(Some(timeouts.connect));
        connector.set_nodelay(true);

        let client = Client::builder(TokioExecutor::new()).build(connector);

        Self {
            client: Decompression::new(client),
            timeouts,
        }
    }

    /// Relay `request` to `route`'s upstream.
    pub async fn forward(
        &self,
        route: &Route,
        ctx: &RequestContext,
        request: Request<Body>,
    ) -> ProxyOutcome {
        let failed = |reason: UpstreamError| ProxyOutcome::Failed {
            reason,
            upstream_target: route.base_url().to_string(),
        };

        let (parts, body) = request.into_parts();
        let uri = match upstream_uri(route.base_url(), &parts.uri) {
            Ok(uri) => uri,
            Err(reason) => return failed(reason),
        };

        let mut headers = filter_request_headers(&parts.headers);
        if let Some(addr) = ctx.client_addr {
            append_forwarded_for(&mut headers, addr.ip());
        }
        headers.insert(X_REQUEST_ID, ctx.trace_id.header_value());

        let read = self.timeouts.read;
        let (body, upload_progress) = track_progress(body);
        let mut outbound = Request::new(Body::new(TimeoutBody::new(read, body)));
        *outbound.method_mut() = parts.method;
        *outbound.uri_mut() = uri;
        *outbound.headers_mut() = headers;

        tracing::debug!(
            service = %route.service,
            upstream = %outbound.uri(),
            "Forwarding request"
        );

        // The read deadline measures idleness: upload frames restart it.
        let call = self.client.clone().oneshot(outbound);
        let response = match with_idle_deadline(read, upload_progress, call).await {
            Ok(Ok(response)) => response,
            Ok(Err(err)) => return failed(UpstreamError::from_client_error(err)),
            Err(_) => return failed(UpstreamError::Timeout(read)),
        };

        let (parts, body) = response.into_parts();
        ProxyOutcome::Forwarded {
            status: parts.status,
            headers: filter_response_headers(&parts.headers),
            body: Body::new(TimeoutBody::new(read, body)),
        }
    }
}

/// `base_url` + inbound path + `?query` when the query is non-empty.
pub fn upstream_uri(base_url: &str, inbound: &Uri) -> Result<Uri, UpstreamError> {
    let mut target = format!("{}{}", base_url, inbound.path());
    if let Some(query) = inbound.query().filter(|q| !q.is_empty()) {
        target.push('?');
        target.push_str(query);
    }
    target
        .parse::<Uri>()
        .map_err(|e| UpstreamError::InvalidUri(format!("{target}: {e}")))
}
