//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML/YAML)
//!     → loader.rs (parse & deserialize, GATEWAY_* overrides)
//!     → validation.rs (semantic checks)
//!     → GatewayConfig (validated, immutable)
//!     → shared via Arc to all subsystems
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; there is no hot reload
//! - `server` and `services` are required, every other section has defaults
//! - Validation separates syntactic (serde) from semantic checks
//! - Any failure here is fatal: the gateway refuses to start

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, ConfigError, ConfigFormat};
pub use schema::{
    CorsConfig, GatewayConfig, JwtConfig, LogFormat, LoggingConfig, MetricsConfig,
    ServerConfig, ServiceConfig, UpstreamConfig,
};
pub use validation::ValidationError;
