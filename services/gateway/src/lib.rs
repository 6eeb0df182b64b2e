//! craftgate gateway
//!
//! Protocol-aware reverse proxy for game client connections. The first
//! packet of every connection is decoded to choose a backend, then the
//! session is bridged to it byte for byte.

pub mod config;
pub mod connection;
pub mod error;
pub mod proxy;

pub use connection::{
    BasicServerConnection, Connection, HsConnection, LoginConnection, PipeConnection,
    PipeStats, PlayerConnection, ServerConnection, ServerConnector, StatusConnection,
    TcpConnector,
};
pub use error::GatewayError;
pub use proxy::{
    Backend, DefaultServerStore, Gateway, Listener, ListenerConfig, ListenerStats, ProxyHeader,
    RejectReason, ServerBackend, ServerStore, SessionOutcome, SingleServerStore,
};
