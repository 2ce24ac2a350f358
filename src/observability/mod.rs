//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Inbound request:
//!     → tracing.rs (trace ID, span, guard)
//!     → ... pipeline ...
//!     → guard drops → access_log.rs (one JSON line) + metrics.rs
//!
//! Diagnostics:
//!     → logging.rs (tracing subscriber on stderr)
//! ```
//!
//! # Design Decisions
//! - Access records and diagnostic logs are separate streams
//! - The trace ID flows through spans, upstream headers, and the response
//! - Metrics are cheap (atomic increments)

pub mod access_log;
pub mod logging;
pub mod metrics;
pub mod tracing;

pub use access_log::{AccessLog, AccessLogWriter, AccessRecord};
pub use self::tracing::{trace_requests, ExchangeNotes, TraceGuard};
