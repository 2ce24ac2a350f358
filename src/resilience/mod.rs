//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Request to upstream:
//!     → timeouts.rs (connect deadline, idle deadline until the head, per-chunk deadline)
//!     → On expiry: upstream error, answered as 502
//! ```
//!
//! # Design Decisions
//! - Timeouts are non-negotiable; every upstream call has a deadline
//! - No retries: a failed attempt is reported, never replayed

pub mod timeouts;

pub use timeouts::{track_progress, with_idle_deadline, Elapsed, ProgressBody, UpstreamTimeouts};
