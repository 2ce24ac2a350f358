//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Check every upstream base URL is an absolute `http` URL
//! - Validate value ranges (timeouts > 0, log level, metrics address)
//! - Detect conflicting routes
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: GatewayConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;
use std::str::FromStr;

use axum::http::HeaderValue;
use thiserror::Error;
use url::Url;

use crate::config::schema::GatewayConfig;
use crate::routing::{Route, RouteError, RouteTable};

/// A semantic problem with an otherwise well-formed configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("`services` must define at least one upstream")]
    NoServices,

    #[error("service `{service}` has invalid base URL `{url}`: {reason}")]
    InvalidServiceUrl {
        service: String,
        url: String,
        reason: String,
    },

    #[error(transparent)]
    Route(#[from] RouteError),

    #[error("`server.host` must not be empty")]
    EmptyHost,

    #[error("invalid CORS origin `{0}`")]
    InvalidOrigin(String),

    #[error("`upstream.{0}` must be greater than zero")]
    ZeroTimeout(&'static str),

    #[error("invalid log level `{0}`")]
    InvalidLogLevel(String),

    #[error("service `{0}` is protected but `jwt.secret` is not set")]
    MissingJwtSecret(String),

    #[error("invalid metrics address `{0}`")]
    InvalidMetricsAddress(String),
}

/// Validate a parsed configuration, collecting every problem found.
pub fn validate_config(config: &GatewayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.server.host.trim().is_empty() {
        errors.push(ValidationError::EmptyHost);
    }

    if config.services.is_empty() {
        errors.push(ValidationError::NoServices);
    }

    let jwt_configured = config
        .jwt
        .as_ref()
        .is_some_and(|jwt| !jwt.secret.is_empty());

    let mut routes = Vec::with_capacity(config.services.len());
    for (name, service) in &config.services {
        if let Err(reason) = check_base_url(service.url()) {
            errors.push(ValidationError::InvalidServiceUrl {
                service: name.clone(),
                url: service.url().to_string(),
                reason,
            });
        }

        if service.is_protected() && !jwt_configured {
            errors.push(ValidationError::MissingJwtSecret(name.clone()));
        }

        match Route::new(
            name.clone(),
            &service.prefix(name),
            service.url(),
            service.is_protected(),
        ) {
            Ok(route) => routes.push(route),
            Err(e) => errors.push(e.into()),
        }
    }

    if routes.len() == config.services.len() {
        if let Err(e) = RouteTable::new(routes) {
            errors.push(e.into());
        }
    }

    for origin in &config.cors.origins {
        if !is_valid_origin(origin) {
            errors.push(ValidationError::InvalidOrigin(origin.clone()));
        }
    }

    if config.upstream.connect_timeout_secs == 0 {
        errors.push(ValidationError::ZeroTimeout("connect_timeout_secs"));
    }
    if config.upstream.read_timeout_secs == 0 {
        errors.push(ValidationError::ZeroTimeout("read_timeout_secs"));
    }

    if tracing::Level::from_str(&config.logging.level).is_err() {
        errors.push(ValidationError::InvalidLogLevel(config.logging.level.clone()));
    }

    if config.metrics.enabled && config.metrics.address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidMetricsAddress(
            config.metrics.address.clone(),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Upstreams are plain `http`; TLS towards them is out of scope.
fn check_base_url(raw: &str) -> Result<(), String> {
    let url = Url::parse(raw).map_err(|e| e.to_string())?;

    if url.scheme() != "http" {
        return Err(format!("unsupported scheme `{}`", url.scheme()));
    }
    if url.host_str().is_none() {
        return Err("missing host".to_string());
    }
    if url.query().is_some() || url.fragment().is_some() {
        return Err("must not carry a query or fragment".to_string());
    }
    Ok(())
}

fn is_valid_origin(origin: &str) -> bool {
    if origin == "*" {
        return true;
    }
    if HeaderValue::from_str(origin).is_err() || origin.ends_with('/') {
        return false;
    }
    match Url::parse(origin) {
        Ok(url) => {
            matches!(url.scheme(), "http" | "https")
                && url.host_str().is_some()
                && url.path() == "/"
                && url.query().is_none()
                && url.fragment().is_none()
        }
        Err(_) => false,
    }
}
