//! Top-level gateway errors. Everything here is fatal at startup or shutdown.

use std::io;

use metrics_exporter_prometheus::BuildError;
use thiserror::Error;
use tokio::task::JoinError;

use crate::config::ConfigError;
use crate::observability::logging::LoggingError;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("logging setup failed: {0}")]
    Logging(#[from] LoggingError),

    #[error("cannot open access log: {0}")]
    AccessLog(#[source] io::Error),

    #[error("cannot bind {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: io::Error,
    },

    #[error("metrics exporter failed: {0}")]
    Metrics(#[from] BuildError),

    #[error("server error: {0}")]
    Serve(#[source] io::Error),

    #[error("server task failed: {0}")]
    Join(#[from] JoinError),
}
