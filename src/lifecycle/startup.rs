//! Startup orchestration.
//!
//! # Responsibilities
//! - Initialize subsystems in dependency order
//! - Bind the listener and begin accepting traffic
//! - On shutdown: stop accepting, drain, flush the access log
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - Listeners start last (traffic only when ready)
//! - Draining is bounded by `server.shutdown_grace_secs`

use std::future::Future;
use std::net::SocketAddr;
use std::time::Duration;

use tokio::net::TcpListener;

use crate::config::{ConfigError, GatewayConfig, ValidationError};
use crate::error::GatewayError;
use crate::http::HttpServer;
use crate::lifecycle::shutdown::{drain, Shutdown};
use crate::lifecycle::signals::shutdown_signal;
use crate::observability::{metrics, AccessLog};

/// Time allowed for the last access records to reach the sink.
const ACCESS_LOG_FLUSH_TIMEOUT: Duration = Duration::from_secs(5);

/// Run the gateway until SIGINT or SIGTERM.
pub async fn run(config: GatewayConfig) -> Result<(), GatewayError> {
    run_until(config, shutdown_signal()).await
}

/// Run the gateway until `stop` resolves.
pub async fn run_until<F>(config: GatewayConfig, stop: F) -> Result<(), GatewayError>
where
    F: Future<Output = ()>,
{
    let (access_log, writer) = AccessLog::open(config.logging.file.as_deref())
        .await
        .map_err(GatewayError::AccessLog)?;

    if config.metrics.enabled {
        let addr: SocketAddr = config.metrics.address.parse().map_err(|_| {
            ConfigError::Validation(vec![ValidationError::InvalidMetricsAddress(
                config.metrics.address.clone(),
            )])
        })?;
        metrics::init_metrics(addr)?;
    }

    let grace = Duration::from_secs(config.server.shutdown_grace_secs);
    let address = config.server.bind_address();

    let server = HttpServer::new(config, access_log)?;
    let listener = TcpListener::bind(&address)
        .await
        .map_err(|source| GatewayError::Bind {
            address: address.clone(),
            source,
        })?;

    let shutdown = Shutdown::new();
    let mut server_task = tokio::spawn(server.run(listener, shutdown.subscribe()));

    let exited_early = tokio::select! {
        joined = &mut server_task => Some(joined),
        () = stop => None,
    };

    let finished = match exited_early {
        Some(joined) => Some(joined),
        None => {
            shutdown.trigger();
            drain(server_task, grace).await
        }
    };

    let served = match finished {
        Some(Ok(Ok(()))) => Ok(()),
        Some(Ok(Err(e))) => Err(GatewayError::Serve(e)),
        Some(Err(e)) => Err(GatewayError::Join(e)),
        None => Ok(()),
    };

    match tokio::time::timeout(ACCESS_LOG_FLUSH_TIMEOUT, writer.finish()).await {
        Ok(Ok(())) => tracing::info!("Access log flushed"),
        Ok(Err(e)) => tracing::error!(error = %e, "Access log flush failed"),
        Err(_) => tracing::warn!("Access log still in use, records already written were flushed"),
    }

    served
}
