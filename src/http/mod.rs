//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, middleware stack)
//!     → request.rs (trace ID, request context)
//!     → [CORS, routing, auth]
//!     → forward.rs (outbound request, streamed upstream response)
//!     → response.rs (relay, or translate failure to 502)
//!     → Send to client
//! ```

pub mod forward;
pub mod request;
pub mod response;
pub mod server;

pub use forward::{Forwarder, ProxyOutcome, UpstreamError};
pub use request::{RequestContext, RequestContextExt, TraceId, X_REQUEST_ID};
pub use server::{AppState, HttpServer};
