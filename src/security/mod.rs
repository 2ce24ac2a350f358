//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request:
//!     → cors.rs (answer preflights, decide response decoration)
//!     → auth.rs (bearer token check for protected services)
//!     → headers.rs (strip hop-by-hop, add X-Forwarded-For)
//!     → Pass to forwarder
//! ```
//!
//! # Design Decisions
//! - Policies are built once from config and shared read-only
//! - Fail closed on protected services: no token, no upstream contact
//! - No trust in client input

pub mod auth;
pub mod cors;
pub mod headers;

pub use auth::{AuthError, TokenVerifier};
pub use cors::{CorsDecision, CorsPolicy};
