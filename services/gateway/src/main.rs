//! craftgate
//!
//! Accepts game client connections, routes each one on its handshake
//! server address, and proxies it to the chosen backend.

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use craftgate_gateway::config::{Config, RoutingConfig};
use craftgate_gateway::{Gateway, Listener, ListenerConfig};

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::from_env()?;

    // Prefer RUST_LOG, fall back to CRAFTGATE_LOG_LEVEL.
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| config.log_level.clone().into()))
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    info!("Starting craftgate");
    let route_count = match &config.routing {
        RoutingConfig::Single(_) => 1,
        RoutingConfig::ByAddress(routes) => routes.len(),
    };
    info!(
        listen_addr = %config.listen_addr,
        route_count,
        max_connections = config.max_connections,
        proxy_protocol = config.proxy_protocol,
        "Configuration loaded"
    );

    let gateway = Arc::new(Gateway::new(config.server_store()));

    let mut listener_config = ListenerConfig::new(config.listen_addr);
    listener_config.max_connections = config.max_connections;
    let listener = Listener::bind(listener_config, gateway)
        .await
        .with_context(|| format!("Failed to bind {}", config.listen_addr))?;
    let listener = Arc::new(listener);

    tokio::select! {
        result = Arc::clone(&listener).run() => {
            if let Err(e) = &result {
                error!(error = %e, "Listener error");
            }
            result?;
        }
        signal = tokio::signal::ctrl_c() => {
            signal.context("Failed to listen for shutdown signal")?;
            info!("Shutdown signal received");
        }
    }

    Ok(())
}
