//! Route lookup and dispatch.
//!
//! # Responsibilities
//! - Store compiled routes
//! - Look up the most specific route for a request path
//! - Return matched route or explicit no-match
//!
//! # Design Decisions
//! - Immutable after construction (thread-safe without locks)
//! - Routes sorted by prefix length once, so the first match is the longest
//! - Duplicate prefixes rejected at build time, never tie-broken at runtime
//! - Explicit NoMatch rather than silent default

use std::collections::BTreeMap;
use thiserror::Error;

use crate::config::schema::ServiceConfig;
use crate::routing::matcher::{normalize_prefix, PathPrefixMatcher, PrefixError};

/// Error building the route table.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RouteError {
    #[error("service `{service}`: {source}")]
    InvalidPrefix {
        service: String,
        #[source]
        source: PrefixError,
    },
    #[error("services `{first}` and `{second}` share the prefix `{prefix}`")]
    DuplicatePrefix {
        prefix: String,
        first: String,
        second: String,
    },
}

/// A compiled route: one prefix, one upstream.
#[derive(Debug, Clone)]
pub struct Route {
    /// Service name from the configuration, used in logs and metrics.
    pub service: String,
    matcher: PathPrefixMatcher,
    base_url: String,
    protected: bool,
}

impl Route {
    /// Build a route from a normalized prefix and a base URL.
    pub fn new(
        service: impl Into<String>,
        prefix: &str,
        base_url: &str,
        protected: bool,
    ) -> Result<Self, RouteError> {
        let service = service.into();
        let prefix = normalize_prefix(prefix).map_err(|source| RouteError::InvalidPrefix {
            service: service.clone(),
            source,
        })?;

        Ok(Self {
            service,
            matcher: PathPrefixMatcher::new(prefix),
            base_url: base_url.trim_end_matches('/').to_string(),
            protected,
        })
    }

    /// Normalized path prefix.
    pub fn prefix(&self) -> &str {
        self.matcher.prefix()
    }

    /// Upstream base URL without a trailing slash.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Whether a bearer token is required.
    pub fn is_protected(&self) -> bool {
        self.protected
    }
}

/// Immutable prefix routing table.
#[derive(Debug, Clone)]
pub struct RouteTable {
    /// Sorted by descending prefix length.
    routes: Vec<Route>,
}

impl RouteTable {
    /// Compile routes, rejecting duplicate prefixes.
    pub fn new(mut routes: Vec<Route>) -> Result<Self, RouteError> {
        routes.sort_by(|a, b| {
            b.matcher
                .specificity()
                .cmp(&a.matcher.specificity())
                .then_with(|| a.prefix().cmp(b.prefix()))
        });

        for pair in routes.windows(2) {
            if pair[0].prefix() == pair[1].prefix() {
                return Err(RouteError::DuplicatePrefix {
                    prefix: pair[0].prefix().to_string(),
                    first: pair[0].service.clone(),
                    second: pair[1].service.clone(),
                });
            }
        }

        Ok(Self { routes })
    }

    /// Compile the `services` section of the configuration.
    pub fn from_services(services: &BTreeMap<String, ServiceConfig>) -> Result<Self, RouteError> {
        let routes = services
            .iter()
            .map(|(name, service)| {
                Route::new(
                    name.clone(),
                    &service.prefix(name),
                    service.url(),
                    service.is_protected(),
                )
            })
            .collect::<Result<Vec<_>, _>>()?;

        Self::new(routes)
    }

    /// Find the route with the longest prefix matching `path`.
    pub fn resolve(&self, path: &str) -> Option<&Route> {
        self.routes.iter().find(|route| route.matcher.matches(path))
    }

    /// Routes in match order.
    pub fn routes(&self) -> &[Route] {
        &self.routes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(entries: &[(&str, &str, &str)]) -> RouteTable {
        let routes = entries
            .iter()
            .map(|(name, prefix, url)| Route::new(*name, prefix, url, false).unwrap())
            .collect();
        RouteTable::new(routes).unwrap()
    }

    #[test]
    fn longest_prefix_wins() {
        let table = table(&[
            ("api", "/api/v2", "http://general:5000"),
            ("auth", "/api/v2/auth", "http://auth:5000"),
            ("admin", "/api/v2/auth/admin", "http://admin:5000"),
        ]);

        assert_eq!(table.resolve("/api/v2/auth/login").unwrap().service, "auth");
        assert_eq!(table.resolve("/api/v2/auth/admin/users").unwrap().service, "admin");
        assert_eq!(table.resolve("/api/v2/bd/posts").unwrap().service, "api");
    }

    #[test]
    fn unmatched_path_is_not_found() {
        let table = table(&[("auth", "/api/v2/auth", "http://auth:5000")]);
        assert!(table.resolve("/api/v2/unknown/x").is_none());
        assert!(table.resolve("/health").is_none());
        assert!(table.resolve("/api/v2/authentication").is_none());
    }

    #[test]
    fn duplicate_prefixes_are_rejected() {
        let routes = vec![
            Route::new("a", "/api/v2/auth", "http://a:1", false).unwrap(),
            Route::new("b", "/api/v2/auth/", "http://b:1", false).unwrap(),
        ];
        let err = RouteTable::new(routes).unwrap_err();
        assert_eq!(
            err,
            RouteError::DuplicatePrefix {
                prefix: "/api/v2/auth".into(),
                first: "a".into(),
                second: "b".into(),
            }
        );
    }

    #[test]
    fn base_url_trailing_slash_is_trimmed() {
        let route = Route::new("auth", "/api/v2/auth", "http://auth:5000/", false).unwrap();
        assert_eq!(route.base_url(), "http://auth:5000");
    }

    #[test]
    fn builds_from_service_config() {
        let mut services = BTreeMap::new();
        services.insert("auth".to_string(), ServiceConfig::Url("http://auth:5000".into()));
        services.insert(
            "backend".to_string(),
            ServiceConfig::Detailed {
                url: "http://backend:5000".into(),
                prefix: Some("/api/v2/bd".into()),
                protected: true,
            },
        );

        let table = RouteTable::from_services(&services).unwrap();
        assert_eq!(table.routes().len(), 2);

        let backend = table.resolve("/api/v2/bd/generate").unwrap();
        assert_eq!(backend.service, "backend");
        assert!(backend.is_protected());
        assert_eq!(table.resolve("/api/v2/auth/register").unwrap().base_url(), "http://auth:5000");
    }
}
