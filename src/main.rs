//! Hysteria-style tunneling proxy server.
//!
//! # Architecture Overview
//!
//! ```text
//!                  ┌──────────────────────────────────────────────────────┐
//!                  │                   HYSTERIA SERVER                    │
//!                  │                                                      │
//!   config file ──▶│  config ──▶ lifecycle::start ──▶ TransportEngine     │
//!                  │               │                      │               │
//!                  │               ├─ net::tls            ▼               │
//!                  │               ├─ config::limits   TunnelServer       │
//!                  │               ├─ auth                │               │
//!                  │               ├─ obfs                ▼               │
//!   client ───────▶│               ├─ acl          per-connection tunnel  │──▶ upstream
//!                  │               ├─ congestion          │               │
//!                  │               └─ observability ◀─────┘               │
//!                  └──────────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;

use hysteria_server::config::load_config;
use hysteria_server::lifecycle::{run, shutdown_signal, start};
use hysteria_server::observability::{logging, metrics, LogReporter};
use hysteria_server::{Error, TcpEngine, TunnelServer};

#[derive(Parser)]
#[command(name = "hysteria-server")]
#[command(about = "Hysteria-style tunneling proxy server", long_about = None)]
struct Cli {
    /// Path to the configuration file (TOML, or JSON with a .json extension)
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,

    /// Log level, overriding the configuration file
    #[arg(long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match load_config(&cli.config) {
        Ok(config) => config,
        Err(source) => {
            logging::init_logging(cli.log_level.as_deref().unwrap_or("info"));
            let err = Error::Config {
                path: cli.config.display().to_string(),
                source,
            };
            tracing::error!(error = %err, "Failed to load configuration");
            return ExitCode::FAILURE;
        }
    };

    logging::init_logging(
        cli.log_level
            .as_deref()
            .unwrap_or(&config.observability.log_level),
    );
    tracing::info!("hysteria-server v{} starting", env!("CARGO_PKG_VERSION"));

    if let Some(address) = &config.observability.metrics_address {
        match address.parse() {
            Ok(addr) => {
                if let Err(e) = metrics::init_metrics(addr) {
                    tracing::error!(error = %e, "Failed to start metrics exporter");
                }
            }
            Err(_) => {
                tracing::error!(metrics_address = %address, "Failed to parse metrics address");
            }
        }
    }

    let server = match start(&config, &TcpEngine, Arc::new(LogReporter)).await {
        Ok(server) => server,
        Err(err) => {
            tracing::error!(error = %err, kind = ?err.kind(), "Failed to start server");
            return ExitCode::FAILURE;
        }
    };
    if let Ok(addr) = server.local_addr() {
        tracing::info!(address = %addr, "Listening for connections");
    }

    let err = tokio::select! {
        err = run(server, &config.listen) => err,
        _ = shutdown_signal() => Error::Shutdown {
            listen: config.listen.clone(),
            source: None,
        },
    };
    tracing::error!(error = %err, "Server shutdown");
    ExitCode::FAILURE
}
