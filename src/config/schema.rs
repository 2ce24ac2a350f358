//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the gateway.
//! All types derive Serde traits for deserialization from TOML or YAML files.
//! `server` and `services` are required; every other section has defaults.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Path segment under which services are mounted when no explicit prefix is given.
pub const DEFAULT_ROUTE_BASE: &str = "/api/v2";

/// Root configuration for the gateway.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GatewayConfig {
    /// Bind address for the inbound listener.
    pub server: ServerConfig,

    /// Cross-origin policy.
    #[serde(default)]
    pub cors: CorsConfig,

    /// Upstream services keyed by name. Ordered so route compilation is deterministic.
    pub services: BTreeMap<String, ServiceConfig>,

    /// Outbound connection settings.
    #[serde(default)]
    pub upstream: UpstreamConfig,

    /// Token verification for protected services.
    #[serde(default)]
    pub jwt: Option<JwtConfig>,

    /// Log sink and level.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Prometheus exporter.
    #[serde(default)]
    pub metrics: MetricsConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    /// Interface to bind (e.g., "0.0.0.0").
    pub host: String,

    /// TCP port to bind. `0` picks an ephemeral port.
    pub port: u16,

    /// How long in-flight requests may drain after a shutdown signal.
    #[serde(default = "default_shutdown_grace_secs")]
    pub shutdown_grace_secs: u64,
}

fn default_shutdown_grace_secs() -> u64 {
    30
}

impl ServerConfig {
    /// `host:port` string accepted by `TcpListener::bind`.
    pub fn bind_address(&self) -> String {
        if self.host.contains(':') && !self.host.starts_with('[') {
            format!("[{}]:{}", self.host, self.port)
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }
}

/// Cross-origin resource sharing configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CorsConfig {
    /// Allowed origins, matched exactly. `"*"` allows any origin.
    pub origins: Vec<String>,

    /// Emit `Access-Control-Allow-Credentials: true`.
    pub allow_credentials: bool,

    /// Optional `Access-Control-Max-Age` for preflight responses.
    pub max_age_secs: Option<u64>,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            origins: Vec::new(),
            allow_credentials: true,
            max_age_secs: None,
        }
    }
}

/// An upstream service, either a bare base URL or a detailed table.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(untagged)]
pub enum ServiceConfig {
    /// Base URL only; mounted at `/api/v2/<name>`.
    Url(String),
    /// Base URL with an explicit prefix and access requirements.
    Detailed {
        url: String,
        #[serde(default)]
        prefix: Option<String>,
        #[serde(default)]
        protected: bool,
    },
}

impl ServiceConfig {
    /// Base URL of the service.
    pub fn url(&self) -> &str {
        match self {
            ServiceConfig::Url(url) => url,
            ServiceConfig::Detailed { url, .. } => url,
        }
    }

    /// Path prefix this service is mounted at.
    pub fn prefix(&self, name: &str) -> String {
        match self {
            ServiceConfig::Detailed {
                prefix: Some(prefix),
                ..
            } => prefix.clone(),
            _ => format!("{}/{}", DEFAULT_ROUTE_BASE, name),
        }
    }

    /// Whether requests must carry a valid bearer token.
    pub fn is_protected(&self) -> bool {
        matches!(self, ServiceConfig::Detailed { protected: true, .. })
    }
}

/// Outbound connection configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct UpstreamConfig {
    /// TCP connect timeout in seconds.
    pub connect_timeout_secs: u64,

    /// Time allowed for the response head, and between body frames, in seconds.
    pub read_timeout_secs: u64,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            connect_timeout_secs: 5,
            read_timeout_secs: 30,
        }
    }
}

/// Bearer token verification settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct JwtConfig {
    /// HMAC secret shared with the authentication service.
    pub secret: String,
}

/// Output format for diagnostic logs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Access log file. Records go to stdout when unset.
    pub file: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error).
    pub level: String,

    /// Diagnostic log format.
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            file: None,
            level: "info".to_string(),
            format: LogFormat::Pretty,
        }
    }
}

/// Metrics exporter configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// Enable the Prometheus scrape endpoint.
    pub enabled: bool,

    /// Scrape endpoint bind address.
    pub address: String,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            address: "0.0.0.0:9090".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_service_mounts_under_default_base() {
        let service = ServiceConfig::Url("http://auth:5000".into());
        assert_eq!(service.prefix("auth"), "/api/v2/auth");
        assert!(!service.is_protected());
    }

    #[test]
    fn detailed_service_overrides_prefix() {
        let service = ServiceConfig::Detailed {
            url: "http://backend:5000".into(),
            prefix: Some("/api/v2/bd".into()),
            protected: true,
        };
        assert_eq!(service.prefix("backend"), "/api/v2/bd");
        assert_eq!(service.url(), "http://backend:5000");
        assert!(service.is_protected());
    }

    #[test]
    fn ipv6_host_is_bracketed() {
        let server = ServerConfig {
            host: "::1".into(),
            port: 8080,
            shutdown_grace_secs: 30,
        };
        assert_eq!(server.bind_address(), "[::1]:8080");
    }
}
