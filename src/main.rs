//! Ingress gateway
//!
//! The single entry point for inbound HTTP traffic to the backend services.
//!
//! # Architecture Overview
//!
//! ```text
//!     Client ──▶ TraceLayer ──▶ tracer ──▶ CORS ──▶ /health
//!                                              └──▶ router ──▶ auth ──▶ forwarder ──▶ Upstream
//!     Client ◀── X-Request-ID ◀── relay / 502 translation ◀────────────────────────────┘
//!                    │
//!                    └──▶ access log (one JSON line per request)
//! ```

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use ingress_gateway::config::load_config;
use ingress_gateway::lifecycle;
use ingress_gateway::observability::logging::init_logging;

#[derive(Parser)]
#[command(name = "ingress-gateway")]
#[command(about = "Reverse-proxy ingress for a multi-service backend", long_about = None)]
struct Cli {
    /// Configuration file (.toml, .yaml or .yml)
    #[arg(short, long, env = "GATEWAY_CONFIG", default_value = "config.toml")]
    config: PathBuf,

    /// Validate the configuration and exit
    #[arg(long)]
    check: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Logging is not up yet, so configuration errors go straight to stderr.
    let config = match load_config(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("ingress-gateway: {e}");
            return ExitCode::FAILURE;
        }
    };

    if cli.check {
        println!(
            "{}: ok ({} services)",
            cli.config.display(),
            config.services.len()
        );
        return ExitCode::SUCCESS;
    }

    if let Err(e) = init_logging(&config.logging) {
        eprintln!("ingress-gateway: {e}");
        return ExitCode::FAILURE;
    }

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        config = %cli.config.display(),
        bind_address = %config.server.bind_address(),
        services = config.services.len(),
        "ingress-gateway starting"
    );

    match lifecycle::run(config).await {
        Ok(()) => {
            tracing::info!("Shutdown complete");
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!(error = %e, "Gateway stopped with error");
            ExitCode::FAILURE
        }
    }
}
