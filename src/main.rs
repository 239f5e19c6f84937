//! Edge composition gateway.
//!
//! # Architecture Overview
//!
//! ```text
//!                        ┌──────────────────────────────────────────────────┐
//!                        │                    GATEWAY                       │
//!                        │                                                  │
//!   Client Request       │  ┌─────────┐   ┌──────────┐   ┌──────────────┐   │
//!   ─────────────────────┼─▶│ net /   │──▶│ adapter  │──▶│   pipeline   │   │
//!                        │  │ axum    │   │ (socket) │   │  + registry  │   │
//!                        │  └─────────┘   └──────────┘   └──┬────────┬──┘   │
//!                        │                                  │        │      │
//!                        │                         shell    ▼        ▼ fragment
//!                        │                          ┌──────────┐ ┌──────────┐│
//!                        │                          │host proxy│ │ upstream ││──▶ Fragment
//!                        │                          └────┬─────┘ │  client  ││    upstreams
//!                        │                               │       └────┬─────┘│
//!                        │                               ▼            ▼      │
//!   Client Response      │                          ┌──────────────────────┐ │
//!   ◀────────────────────┼──────────────────────────│ compose (streaming)  │ │
//!                        │                          └──────────────────────┘ │
//!                        │                                                  │
//!                        │  Cross-cutting: config, observability, lifecycle │
//!                        └──────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;

use clap::Parser;

use fragment_gateway::config::schema::Environment;
use fragment_gateway::config::{load_config, GatewayConfig};
use fragment_gateway::lifecycle::{shutdown_signal, Gateway, Shutdown};
use fragment_gateway::net::Listener;
use fragment_gateway::observability::{logging, metrics};

#[derive(Debug, Parser)]
#[command(name = "fragment-gateway", version, about = "Edge composition gateway")]
struct Args {
    /// Path to the TOML configuration file. Defaults are used when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Force development mode regardless of the config file.
    #[arg(long)]
    development: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => load_config(path)?,
        None => GatewayConfig::default(),
    };
    if args.development {
        config.gateway.environment = Environment::Development;
    }

    logging::init_logging(&config.observability);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "fragment-gateway starting");

    tracing::info!(
        bind_address = %config.listener.bind_address,
        max_connections = config.listener.max_connections,
        request_timeout_secs = config.timeouts.request_secs,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let listener = Listener::bind(&config.listener).await?;
    let gateway = Gateway::from_config(config)?;

    let shutdown = Shutdown::new();
    let on_shutdown = shutdown.wait();
    tokio::spawn({
        let shutdown = shutdown.clone();
        async move {
            shutdown_signal().await;
            shutdown.trigger();
        }
    });

    gateway.serve(listener, on_shutdown).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
