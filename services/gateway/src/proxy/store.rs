//! Server registry: maps an inbound handshake to a backend.
//!
//! Lookups run on every accepted connection while registrations are rare,
//! so the address-keyed store keeps an immutable map snapshot behind an
//! `ArcSwap`. Readers never block; writers swap in a new map.

use std::collections::HashMap;
use std::sync::Arc;

use arc_swap::ArcSwap;
use async_trait::async_trait;
use tracing::{debug, info};

use super::backend::Backend;
use crate::connection::HsConnection;

/// Routing policy.
#[async_trait]
pub trait ServerStore: Send + Sync {
    /// Pick the backend for a connection, or `None` if nothing matches.
    async fn find_server(&self, conn: &mut dyn HsConnection) -> Option<Arc<dyn Backend>>;
}

/// Sends every connection to one backend, without looking at the handshake.
#[derive(Clone, Default)]
pub struct SingleServerStore {
    server: Option<Arc<dyn Backend>>,
}

impl SingleServerStore {
    /// A store that always answers `server`.
    pub fn new(server: Arc<dyn Backend>) -> Self {
        Self {
            server: Some(server),
        }
    }

    /// A store that never finds anything.
    pub fn empty() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ServerStore for SingleServerStore {
    async fn find_server(&self, _conn: &mut dyn HsConnection) -> Option<Arc<dyn Backend>> {
        self.server.clone()
    }
}

type ServerMap = HashMap<String, Arc<dyn Backend>>;

/// Routes on the handshake's `server_address`, exact match only.
pub struct DefaultServerStore {
    servers: ArcSwap<ServerMap>,
}

impl DefaultServerStore {
    /// An empty store.
    pub fn new() -> Self {
        Self {
            servers: ArcSwap::from_pointee(HashMap::new()),
        }
    }

    /// Register `server` under `address`, replacing any previous entry.
    pub fn add_server(&self, address: impl Into<String>, server: Arc<dyn Backend>) {
        let address = address.into();
        let backend_id = server.id().to_string();

        self.servers.rcu(|current| {
            let mut next = ServerMap::clone(current);
            next.insert(address.clone(), Arc::clone(&server));
            next
        });

        info!(server_address = %address, backend = %backend_id, "Server registered");
    }

    /// Remove the entry for `address`. Returns the removed backend, if any.
    pub fn remove_server(&self, address: &str) -> Option<Arc<dyn Backend>> {
        let previous = self.servers.rcu(|current| {
            let mut next = ServerMap::clone(current);
            next.remove(address);
            next
        });

        let removed = previous.get(address).cloned();
        if removed.is_some() {
            info!(server_address = %address, "Server removed");
        }
        removed
    }

    /// Backend registered under exactly `address`.
    pub fn get(&self, address: &str) -> Option<Arc<dyn Backend>> {
        self.servers.load().get(address).cloned()
    }

    pub fn len(&self) -> usize {
        self.servers.load().len()
    }

    pub fn is_empty(&self) -> bool {
        self.servers.load().is_empty()
    }

    /// Registered addresses, sorted.
    pub fn addresses(&self) -> Vec<String> {
        let mut addresses: Vec<String> = self.servers.load().keys().cloned().collect();
        addresses.sort();
        addresses
    }
}

impl Default for DefaultServerStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ServerStore for DefaultServerStore {
    async fn find_server(&self, conn: &mut dyn HsConnection) -> Option<Arc<dyn Backend>> {
        let address = match conn.server_address().await {
            Ok(address) => address,
            Err(e) => {
                debug!(error = %e, "Cannot route connection without a handshake");
                return None;
            }
        };

        let server = self.get(&address);
        if server.is_none() {
            debug!(server_address = %address, "No server registered for address");
        }
        server
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::{LoginConnection, PlayerConnection, StatusConnection};
    use crate::error::GatewayError;
    use craftgate_protocol::{Handshake, Packet};
    use std::net::SocketAddr;
    use tokio::io::{duplex, AsyncWriteExt, DuplexStream};

    struct NamedBackend(&'static str);

    #[async_trait]
    impl Backend for NamedBackend {
        fn id(&self) -> &str {
            self.0
        }

        async fn status(&self, _conn: &mut dyn StatusConnection) -> Result<Packet, GatewayError> {
            Ok(Packet::default())
        }

        async fn login(&self, _conn: &mut dyn LoginConnection) -> Result<(), GatewayError> {
            Ok(())
        }
    }

    fn backend(id: &'static str) -> Arc<dyn Backend> {
        Arc::new(NamedBackend(id))
    }

    fn addr() -> SocketAddr {
        "127.0.0.1:25565".parse().unwrap()
    }

    async fn player_with_handshake(address: &str) -> (PlayerConnection<DuplexStream>, DuplexStream) {
        let (inbound, mut client) = duplex(1024);
        let hs = Handshake {
            protocol_version: 754,
            server_address: address.to_string(),
            server_port: 25565,
            next_state: 2,
        };
        client.write_all(&hs.to_packet().encode()).await.unwrap();
        (PlayerConnection::new(inbound, addr(), addr()), client)
    }

    #[tokio::test]
    async fn test_single_store_returns_configured_server() {
        let store = SingleServerStore::new(backend("only"));
        // Nothing is written: the store must not read the handshake.
        let (inbound, _client) = duplex(64);
        let mut conn = PlayerConnection::new(inbound, addr(), addr());

        let found = store.find_server(&mut conn).await.unwrap();
        assert_eq!(found.id(), "only");
    }

    #[tokio::test]
    async fn test_single_store_empty_finds_nothing() {
        let store = SingleServerStore::empty();
        let (inbound, _client) = duplex(64);
        let mut conn = PlayerConnection::new(inbound, addr(), addr());

        assert!(store.find_server(&mut conn).await.is_none());
    }

    #[tokio::test]
    async fn test_default_store_exact_match() {
        let store = DefaultServerStore::new();
        store.add_server("infrared-1", backend("one"));

        let (mut conn, _client) = player_with_handshake("infrared-1").await;
        let found = store.find_server(&mut conn).await.unwrap();
        assert_eq!(found.id(), "one");
    }

    #[tokio::test]
    async fn test_default_store_match_among_many() {
        const OTHERS: [&str; 8] = [
            "addr-2", "addr-3", "addr-4", "addr-5", "addr-6", "addr-7", "addr-8", "addr-9",
        ];

        let store = DefaultServerStore::new();
        for address in OTHERS {
            store.add_server(address, backend(address));
        }
        store.add_server("addr-1", backend("target"));
        assert_eq!(store.len(), 9);

        let (mut conn, _client) = player_with_handshake("addr-1").await;
        let found = store.find_server(&mut conn).await.unwrap();
        assert_eq!(found.id(), "target");

        for address in OTHERS {
            let (mut conn, _client) = player_with_handshake(address).await;
            let found = store.find_server(&mut conn).await.unwrap();
            assert_eq!(found.id(), address);
        }

        let (mut conn, _client) = player_with_handshake("addr-10").await;
        assert!(store.find_server(&mut conn).await.is_none());
    }

    #[tokio::test]
    async fn test_default_store_miss() {
        let store = DefaultServerStore::new();
        store.add_server("infrared-1", backend("one"));

        for address in ["infrared-2", "Infrared-1", "infrared-1.", ""] {
            let (mut conn, _client) = player_with_handshake(address).await;
            assert!(
                store.find_server(&mut conn).await.is_none(),
                "{address:?} must not match"
            );
        }
    }

    #[tokio::test]
    async fn test_default_store_unreadable_handshake() {
        let store = DefaultServerStore::new();
        store.add_server("infrared-1", backend("one"));

        let (inbound, client) = duplex(64);
        drop(client);
        let mut conn = PlayerConnection::new(inbound, addr(), addr());
        assert!(store.find_server(&mut conn).await.is_none());
    }

    #[tokio::test]
    async fn test_default_store_skips_non_handshake_packet() {
        let store = DefaultServerStore::new();
        store.add_server("infrared-1", backend("one"));

        let (inbound, mut client) = duplex(64);
        client
            .write_all(&Packet::new(0x05, vec![1, 2]).encode())
            .await
            .unwrap();
        let mut conn = PlayerConnection::new(inbound, addr(), addr());
        assert!(store.find_server(&mut conn).await.is_none());
    }

    #[test]
    fn test_add_overwrites_and_remove() {
        let store = DefaultServerStore::new();
        assert!(store.is_empty());

        store.add_server("a.example", backend("first"));
        store.add_server("b.example", backend("b"));
        store.add_server("a.example", backend("second"));

        assert_eq!(store.len(), 2);
        assert_eq!(store.get("a.example").unwrap().id(), "second");
        assert_eq!(store.addresses(), vec!["a.example", "b.example"]);

        assert_eq!(store.remove_server("a.example").unwrap().id(), "second");
        assert!(store.remove_server("a.example").is_none());
        assert!(store.get("a.example").is_none());
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_snapshot_survives_update() {
        let store = DefaultServerStore::new();
        store.add_server("a.example", backend("a"));

        let snapshot = store.servers.load_full();
        store.remove_server("a.example");

        assert!(snapshot.contains_key("a.example"));
        assert!(store.get("a.example").is_none());
    }
}
