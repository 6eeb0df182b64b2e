//! TCP accept loop.
//!
//! Every accepted socket becomes a [`PlayerConnection`] served by the
//! [`Gateway`] on its own task. A failing session never affects the loop.

use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Semaphore;
use tracing::{debug, error, info, warn, Instrument};

use super::gateway::{Gateway, SessionOutcome};
use crate::connection::PlayerConnection;

/// Default maximum concurrent sessions per listener.
pub const DEFAULT_MAX_CONNECTIONS: usize = 10000;

const ACCEPT_ERROR_BACKOFF: Duration = Duration::from_millis(100);

/// Listener settings.
#[derive(Debug, Clone)]
pub struct ListenerConfig {
    pub bind_addr: SocketAddr,
    /// Sessions allowed at once; further accepts are closed immediately.
    pub max_connections: usize,
}

impl ListenerConfig {
    /// Config for `bind_addr` with [`DEFAULT_MAX_CONNECTIONS`].
    pub fn new(bind_addr: SocketAddr) -> Self {
        Self {
            bind_addr,
            max_connections: DEFAULT_MAX_CONNECTIONS,
        }
    }
}

/// Listener counters.
#[derive(Debug, Default)]
pub struct ListenerStats {
    /// Sessions started, after the cap check.
    pub connections_accepted: AtomicU64,
    /// Sessions currently running.
    pub connections_active: AtomicU64,
    /// Sessions finished, with or without an error.
    pub connections_closed: AtomicU64,
    /// Dropped at accept because the session cap was reached.
    pub connections_rejected: AtomicU64,
    /// Status exchanges answered by a backend.
    pub status_served: AtomicU64,
    /// Login sessions tunnelled to a backend.
    pub logins_proxied: AtomicU64,
    /// Handshake routed nowhere.
    pub routes_failed: AtomicU64,
    /// Sessions that ended with an error.
    pub session_errors: AtomicU64,
}

impl ListenerStats {
    fn record(&self, outcome: &SessionOutcome) {
        let counter = match outcome {
            SessionOutcome::Status => &self.status_served,
            SessionOutcome::Login => &self.logins_proxied,
            SessionOutcome::Rejected(_) => &self.routes_failed,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

/// Accept loop handing each connection to the [`Gateway`].
pub struct Listener {
    listener: TcpListener,
    gateway: Arc<Gateway>,
    conn_semaphore: Arc<Semaphore>,
    stats: Arc<ListenerStats>,
}

impl Listener {
    /// Bind the TCP listener. Connections are not accepted until [`Listener::run`].
    pub async fn bind(config: ListenerConfig, gateway: Arc<Gateway>) -> io::Result<Self> {
        let listener = TcpListener::bind(config.bind_addr).await?;
        let local_addr = listener.local_addr()?;

        info!(
            bind_addr = %local_addr,
            max_connections = config.max_connections,
            "Listener bound"
        );

        Ok(Self {
            listener,
            gateway,
            conn_semaphore: Arc::new(Semaphore::new(config.max_connections)),
            stats: Arc::new(ListenerStats::default()),
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Live counters for this listener.
    pub fn stats(&self) -> &ListenerStats {
        &self.stats
    }

    /// Accept connections until the task is cancelled.
    pub async fn run(self: Arc<Self>) -> io::Result<()> {
        let local_addr = self.listener.local_addr()?;
        info!(bind_addr = %local_addr, "Listener started");

        loop {
            match self.listener.accept().await {
                Ok((stream, peer_addr)) => self.spawn_session(stream, peer_addr),
                Err(e) => {
                    error!(error = %e, "Accept error");
                    tokio::time::sleep(ACCEPT_ERROR_BACKOFF).await;
                }
            }
        }
    }

    fn spawn_session(&self, stream: TcpStream, peer_addr: SocketAddr) {
        let permit = match self.conn_semaphore.clone().try_acquire_owned() {
            Ok(permit) => permit,
            Err(_) => {
                self.stats
                    .connections_rejected
                    .fetch_add(1, Ordering::Relaxed);
                warn!(peer_addr = %peer_addr, "Connection rejected: max connections reached");
                return;
            }
        };

        let local_addr = match stream.local_addr() {
            Ok(addr) => addr,
            Err(e) => {
                debug!(peer_addr = %peer_addr, error = %e, "Connection lost before setup");
                return;
            }
        };
        if let Err(e) = stream.set_nodelay(true) {
            debug!(peer_addr = %peer_addr, error = %e, "Failed to set TCP_NODELAY");
        }

        self.stats
            .connections_accepted
            .fetch_add(1, Ordering::Relaxed);
        self.stats.connections_active.fetch_add(1, Ordering::Relaxed);

        let gateway = Arc::clone(&self.gateway);
        let stats = Arc::clone(&self.stats);
        let conn = PlayerConnection::new(stream, peer_addr, local_addr);

        tokio::spawn(
            async move {
                match gateway.handle_connection(conn).await {
                    Ok(outcome) => stats.record(&outcome),
                    Err(e) if e.is_end_of_stream() => {
                        debug!(error = %e, "Connection ended early");
                    }
                    Err(e) => {
                        stats.session_errors.fetch_add(1, Ordering::Relaxed);
                        debug!(error = %e, "Session error");
                    }
                }

                stats.connections_active.fetch_sub(1, Ordering::Relaxed);
                stats.connections_closed.fetch_add(1, Ordering::Relaxed);
                drop(permit);
            }
            .instrument(tracing::info_span!("connection", peer = %peer_addr)),
        );
    }
}
