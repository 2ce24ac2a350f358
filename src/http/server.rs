//! HTTP server setup and request dispatch.
//!
//! # Responsibilities
//! - Create the Axum router with the local `/health` route and the proxy fallback
//! - Wire up middleware (tower-http trace, access records, CORS)
//! - Dispatch each request: route, authenticate, forward, translate
//! - Serve until shutdown, then drain in-flight requests

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::{Request, State},
    middleware,
    response::Response,
    routing::get,
    Router,
};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::trace::TraceLayer;

use crate::config::{validation::validate_config, ConfigError, GatewayConfig};
use crate::health::health_check;
use crate::http::forward::{Forwarder, ProxyOutcome};
use crate::http::request::{RequestContext, RequestContextExt};
use crate::http::response;
use crate::observability::{metrics, trace_requests, AccessLog, ExchangeNotes};
use crate::resilience::UpstreamTimeouts;
use crate::routing::RouteTable;
use crate::security::{cors::cors_middleware, AuthError, CorsPolicy, TokenVerifier};

/// Application state injected into handlers. Read-only after startup.
#[derive(Debug, Clone)]
pub struct AppState {
    pub routes: Arc<RouteTable>,
    pub forwarder: Forwarder,
    pub verifier: Option<Arc<TokenVerifier>>,
}

/// HTTP server for the gateway.
pub struct HttpServer {
    router: Router,
}

impl HttpServer {
    /// Build the server. Fails if `config` does not validate.
    pub fn new(config: GatewayConfig, access_log: AccessLog) -> Result<Self, ConfigError> {
        validate_config(&config).map_err(ConfigError::Validation)?;

        let routes = RouteTable::from_services(&config.services)
            .map_err(|e| ConfigError::Validation(vec![e.into()]))?;
        for route in routes.routes() {
            tracing::info!(
                service = %route.service,
                prefix = %route.prefix(),
                upstream = %route.base_url(),
                protected = route.is_protected(),
                "Route registered"
            );
        }

        let state = AppState {
            routes: Arc::new(routes),
            forwarder: Forwarder::new(UpstreamTimeouts::from(&config.upstream)),
            verifier: config
                .jwt
                .as_ref()
                .map(|jwt| Arc::new(TokenVerifier::new(&jwt.secret))),
        };
        let cors = Arc::new(CorsPolicy::from_config(&config.cors));

        let router = Self::build_router(state, cors, access_log);
        Ok(Self { router })
    }

    /// Layers run top to bottom on the way in: trace span, access record, CORS, routes.
    fn build_router(state: AppState, cors: Arc<CorsPolicy>, access_log: AccessLog) -> Router {
        Router::new()
            .route("/health", get(health_check))
            .fallback(proxy_handler)
            .with_state(state)
            .layer(middleware::from_fn_with_state(cors, cors_middleware))
            .layer(middleware::from_fn_with_state(access_log, trace_requests))
            .layer(TraceLayer::new_for_http())
    }

    /// The fully layered router.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Serve on `listener` until `shutdown` fires, then wait for in-flight requests.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> io::Result<()> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        let app = self
            .router
            .into_make_service_with_connect_info::<SocketAddr>();

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Draining in-flight requests");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

/// Everything that is not a local route: resolve, authenticate, forward.
async fn proxy_handler(State(state): State<AppState>, request: Request) -> Response {
    let ctx = request
        .context()
        .cloned()
        .unwrap_or_else(|| RequestContext::from_request(&request));

    let Some(route) = state.routes.resolve(&ctx.path) else {
        tracing::warn!(path = %ctx.path, "No route matched");
        return response::not_found();
    };

    let mut notes = ExchangeNotes {
        upstream: Some(route.service.clone()),
        ..ExchangeNotes::default()
    };

    if route.is_protected() {
        // Validation rejects protected services without a JWT secret.
        let Some(verifier) = &state.verifier else {
            tracing::error!(service = %route.service, "Protected route without a token verifier");
            return with_notes(response::unauthorized(&AuthError::InvalidToken), notes);
        };
        match verifier.authenticate(request.headers()) {
            Ok(user_id) => notes.user_id = Some(user_id),
            Err(err) => {
                tracing::info!(service = %route.service, reason = %err, "Request not authenticated");
                return with_notes(response::unauthorized(&err), notes);
            }
        }
    }

    let reply = match state.forwarder.forward(route, &ctx, request).await {
        ProxyOutcome::Forwarded {
            status,
            headers,
            body,
        } => response::relay(status, headers, body),
        ProxyOutcome::Failed {
            reason,
            upstream_target,
        } => {
            tracing::warn!(
                service = %route.service,
                upstream = %upstream_target,
                error = %reason,
                "Upstream request failed"
            );
            metrics::record_upstream_failure(&route.service);
            notes.error = Some(reason.to_string());
            response::translate(&reason, &ctx.trace_id)
        }
    };

    with_notes(reply, notes)
}

fn with_notes(mut response: Response, notes: ExchangeNotes) -> Response {
    response.extensions_mut().insert(notes);
    response
}
