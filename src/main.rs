//! Gray-release flow-control gateway.
//!
//! Resolves the gray environment of every inbound request and carries it to
//! the upstream service.
//!
//! # Architecture Overview
//!
//! ```text
//!                         ┌───────────────────────────────────────────────────┐
//!                         │                FLOW-CONTROL GATEWAY                │
//!                         │                                                    │
//!   Client Request        │  ┌─────────┐   ┌───────────┐   ┌──────────────┐   │
//!   ──────────────────────┼─▶│  http   │──▶│  inbound  │──▶│   routing    │   │
//!   x-flow-control-       │  │ server  │   │ decode +  │   │  rule set    │   │
//!   environment (opt.)    │  └─────────┘   │  scope    │   │ first match  │   │
//!                         │                └─────┬─────┘   └──────────────┘   │
//!                         │                      │ context::store              │
//!                         │                      ▼                             │
//!   Client Response       │                ┌───────────┐                      │
//!   ◀─────────────────────┼────────────────│ outbound  │◀─────────────────────┼──── Upstream
//!   (environment echoed)  │                │ propagate │  header attached     │
//!                         │                └───────────┘                      │
//!                         │                                                    │
//!                         │  config (toml + hot reload) · observability ·      │
//!                         │  lifecycle (graceful shutdown)                     │
//!                         └───────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;

use flow_control::config::loader::load_config;
use flow_control::config::watcher::ConfigWatcher;
use flow_control::config::FlowControlConfig;
use flow_control::lifecycle::{signals, Shutdown};
use flow_control::observability::{logging, metrics};
use flow_control::HttpServer;

#[derive(Parser)]
#[command(name = "flow-control")]
#[command(about = "Gray-release flow-control gateway", long_about = None)]
struct Args {
    /// Path to the TOML configuration file. Watched for changes.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => load_config(path)?,
        None => FlowControlConfig::default(),
    };

    logging::init_logging(&config.observability);
    tracing::info!("flow-control v0.1.0 starting");

    tracing::info!(
        bind_address = %config.listener.bind_address,
        rules = config.rules.len(),
        request_timeout_secs = config.timeouts.request_secs,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        if let Ok(addr) = config.observability.metrics_address.parse() {
            metrics::init_metrics(addr);
        } else {
            tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            );
        }
    }

    // Keep the watcher alive for the lifetime of the server.
    let (_watcher, config_updates) = match &args.config {
        Some(path) => {
            let (watcher, updates) = ConfigWatcher::new(path);
            (Some(watcher.run()?), updates)
        }
        None => (None, tokio::sync::mpsc::unbounded_channel().1),
    };

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let shutdown = Shutdown::new();
    let server_shutdown = shutdown.subscribe();
    let server = HttpServer::new(config);

    tokio::spawn(async move {
        signals::shutdown_signal().await;
        shutdown.trigger();
    });

    server.run(listener, config_updates, server_shutdown).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
