//! Per-request tracing and access records.
//!
//! # Responsibilities
//! - Assign each inbound request its [`RequestContext`] and trace ID
//! - Open a span so every diagnostic line carries the trace ID
//! - Emit exactly one [`AccessRecord`] per request, however it ends
//!
//! # Design Decisions
//! - The record is written from `Drop`, the only emission point
//! - A request whose future is dropped before a response is logged as 499
//! - A panic while handling is logged as 500
//! - Duration covers receipt through the response head

use std::time::Duration;

use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::Response,
};
use chrono::SecondsFormat;
use tracing::Instrument;

use crate::http::request::{RequestContext, X_REQUEST_ID};
use crate::observability::access_log::{AccessLog, AccessRecord};
use crate::observability::metrics;

/// Client closed the connection before a response was produced.
pub const CLIENT_CLOSED_REQUEST: u16 = 499;

/// What the handler learned about an exchange, carried back to the tracer
/// in response extensions.
#[derive(Debug, Clone, Default)]
pub struct ExchangeNotes {
    pub upstream: Option<String>,
    pub user_id: Option<String>,
    pub error: Option<String>,
}

/// Guarantees a single access record for one request.
#[derive(Debug)]
pub struct TraceGuard {
    ctx: RequestContext,
    access_log: AccessLog,
    outcome: Option<(StatusCode, ExchangeNotes)>,
}

impl TraceGuard {
    pub fn begin(ctx: RequestContext, access_log: AccessLog) -> Self {
        Self {
            ctx,
            access_log,
            outcome: None,
        }
    }

    /// Record the final status. The record is emitted when the guard drops here.
    pub fn complete(mut self, status: StatusCode, notes: ExchangeNotes) {
        self.outcome = Some((status, notes));
    }

    fn record(&self, status: u16, notes: &ExchangeNotes, duration: Duration) -> AccessRecord {
        AccessRecord {
            trace_id: self.ctx.trace_id.to_string(),
            timestamp: self
                .ctx
                .received_at
                .to_rfc3339_opts(SecondsFormat::Millis, true),
            method: self.ctx.method.to_string(),
            path: self.ctx.path.clone(),
            status,
            duration_ms: duration.as_secs_f64() * 1000.0,
            client_ip: self.ctx.client_addr.map(|addr| addr.ip().to_string()),
            user_id: notes.user_id.clone(),
            upstream: notes.upstream.clone(),
            error: notes.error.clone(),
        }
    }
}

impl Drop for TraceGuard {
    fn drop(&mut self) {
        let duration = self.ctx.elapsed();
        let (status, notes) = match self.outcome.take() {
            Some((status, notes)) => (status.as_u16(), notes),
            None if std::thread::panicking() => (
                StatusCode::INTERNAL_SERVER_ERROR.as_u16(),
                ExchangeNotes::default(),
            ),
            None => {
                tracing::info!(trace_id = %self.ctx.trace_id, "Client went away before response");
                (CLIENT_CLOSED_REQUEST, ExchangeNotes::default())
            }
        };

        let record = self.record(status, &notes, duration);
        metrics::record_request(
            &record.method,
            status,
            record.upstream.as_deref().unwrap_or(metrics::NO_UPSTREAM),
            duration,
        );
        self.access_log.emit(record);
    }
}

/// Outermost gateway middleware: context, span, response `X-Request-ID`, access record.
pub async fn trace_requests(
    State(access_log): State<AccessLog>,
    mut request: Request,
    next: Next,
) -> Response {
    let ctx = RequestContext::from_request(&request);
    let span = tracing::info_span!(
        "request",
        trace_id = %ctx.trace_id,
        method = %ctx.method,
        path = %ctx.path
    );
    let trace_id = ctx.trace_id.clone();
    request.extensions_mut().insert(ctx.clone());

    let guard = TraceGuard::begin(ctx, access_log);
    let mut response = next.run(request).instrument(span).await;

    let notes = response
        .extensions_mut()
        .remove::<ExchangeNotes>()
        .unwrap_or_default();
    response
        .headers_mut()
        .insert(X_REQUEST_ID, trace_id.header_value());

    guard.complete(response.status(), notes);
    response
}
