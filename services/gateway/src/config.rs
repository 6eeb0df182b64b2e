//! Gateway configuration (env-driven).

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};

use crate::connection::TcpConnector;
use crate::proxy::{
    Backend, DefaultServerStore, ServerBackend, ServerStore, SingleServerStore,
    DEFAULT_MAX_CONNECTIONS,
};

/// How connections are routed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoutingConfig {
    /// Every connection goes to one backend (`host:port`).
    Single(String),
    /// `(server_address, host:port)` pairs, matched exactly on the handshake
    /// address. Later duplicates win.
    ByAddress(Vec<(String, String)>),
}

/// Gateway settings, loaded from the environment.
#[derive(Debug, Clone)]
pub struct Config {
    /// Address the listener binds to.
    pub listen_addr: SocketAddr,
    pub routing: RoutingConfig,
    /// Concurrent session cap.
    pub max_connections: usize,
    /// Timeout for each outbound backend connect.
    pub connect_timeout: Duration,
    /// Prepend a PROXY v2 header on outbound connections.
    pub proxy_protocol: bool,
    /// Log level (trace, debug, info, warn, error). `RUST_LOG` takes
    /// precedence.
    pub log_level: String,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from any key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let listen_addr = lookup("CRAFTGATE_LISTEN_ADDR")
            .unwrap_or_else(|| "0.0.0.0:25565".to_string())
            .parse::<SocketAddr>()
            .context("CRAFTGATE_LISTEN_ADDR must be a socket address (ip:port).")?;

        let routing = match (
            lookup("CRAFTGATE_SERVERS"),
            lookup("CRAFTGATE_DEFAULT_SERVER"),
        ) {
            (Some(_), Some(_)) => {
                bail!("Set only one of CRAFTGATE_SERVERS and CRAFTGATE_DEFAULT_SERVER.")
            }
            (Some(servers), None) => RoutingConfig::ByAddress(
                parse_routes(&servers).context("Invalid CRAFTGATE_SERVERS.")?,
            ),
            (None, Some(server)) => RoutingConfig::Single(
                parse_backend_addr(&server).context("Invalid CRAFTGATE_DEFAULT_SERVER.")?,
            ),
            (None, None) => {
                bail!("Missing backends. Set CRAFTGATE_SERVERS or CRAFTGATE_DEFAULT_SERVER.")
            }
        };

        let max_connections: usize = lookup("CRAFTGATE_MAX_CONNECTIONS")
            .map(|v| v.parse())
            .transpose()
            .context("CRAFTGATE_MAX_CONNECTIONS must be an integer.")?
            .unwrap_or(DEFAULT_MAX_CONNECTIONS)
            .max(1);

        let connect_timeout_ms: u64 = lookup("CRAFTGATE_CONNECT_TIMEOUT_MS")
            .map(|v| v.parse())
            .transpose()
            .context("CRAFTGATE_CONNECT_TIMEOUT_MS must be an integer (milliseconds).")?
            .unwrap_or(2000);
        let connect_timeout = Duration::from_millis(connect_timeout_ms.max(50));

        let proxy_protocol = lookup("CRAFTGATE_PROXY_PROTOCOL")
            .map(|v| v == "1" || v.to_lowercase() == "true")
            .unwrap_or(false);

        let log_level = lookup("CRAFTGATE_LOG_LEVEL").unwrap_or_else(|| "info".to_string());

        Ok(Self {
            listen_addr,
            routing,
            max_connections,
            connect_timeout,
            proxy_protocol,
            log_level,
        })
    }

    /// Build the routing policy with one TCP backend per entry.
    pub fn server_store(&self) -> Arc<dyn ServerStore> {
        match &self.routing {
            RoutingConfig::Single(addr) => Arc::new(SingleServerStore::new(self.backend(addr))),
            RoutingConfig::ByAddress(routes) => {
                let store = DefaultServerStore::new();
                for (server_address, addr) in routes {
                    store.add_server(server_address.clone(), self.backend(addr));
                }
                Arc::new(store)
            }
        }
    }

    fn backend(&self, addr: &str) -> Arc<dyn Backend> {
        let connector = TcpConnector::with_timeout(addr, self.connect_timeout);
        Arc::new(
            ServerBackend::new(addr, Arc::new(connector)).with_proxy_protocol(self.proxy_protocol),
        )
    }
}

/// Parse `address=host:port[,address=host:port...]`.
fn parse_routes(value: &str) -> Result<Vec<(String, String)>> {
    let mut routes = Vec::new();
    for entry in value.split(',').map(str::trim).filter(|e| !e.is_empty()) {
        let Some((address, backend)) = entry.split_once('=') else {
            bail!("Entry '{entry}' is not of the form address=host:port.");
        };
        let address = address.trim();
        if address.is_empty() {
            bail!("Entry '{entry}' has an empty server address.");
        }
        routes.push((address.to_string(), parse_backend_addr(backend)?));
    }
    if routes.is_empty() {
        bail!("No routes given.");
    }
    Ok(routes)
}

/// Check a `host:port` backend address. Host names are resolved on connect.
fn parse_backend_addr(value: &str) -> Result<String> {
    let value = value.trim();
    let Some((host, port)) = value.rsplit_once(':') else {
        bail!("Backend '{value}' is missing a port.");
    };
    if host.is_empty() {
        bail!("Backend '{value}' is missing a host.");
    }
    port.parse::<u16>()
        .with_context(|| format!("Backend '{value}' has an invalid port."))?;
    Ok(value.to_string())
}
