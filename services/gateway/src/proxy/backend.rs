//! Backend dispatch targets.

use std::sync::Arc;

use async_trait::async_trait;
use craftgate_protocol::{Packet, StatusResponse};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

use super::proxy_protocol::ProxyHeader;
use crate::connection::{
    pipe, HsConnection, LoginConnection, ServerConnection, ServerConnector, StatusConnection,
};
use crate::error::GatewayError;

/// A destination the gateway can hand a routed connection to.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Identifier used in logs.
    fn id(&self) -> &str;

    /// Fetch the status response for a status-flow connection. The caller
    /// writes it to the player.
    async fn status(&self, conn: &mut dyn StatusConnection) -> Result<Packet, GatewayError>;

    /// Forward the login and bridge both streams until the session ends.
    async fn login(&self, conn: &mut dyn LoginConnection) -> Result<(), GatewayError>;
}

/// Backend reached through a [`ServerConnector`], one outbound connection per
/// session.
pub struct ServerBackend {
    id: String,
    connector: Arc<dyn ServerConnector>,
    proxy_protocol: bool,
}

impl ServerBackend {
    /// Backend named `id` with PROXY protocol disabled.
    pub fn new(id: impl Into<String>, connector: Arc<dyn ServerConnector>) -> Self {
        Self {
            id: id.into(),
            connector,
            proxy_protocol: false,
        }
    }

    /// Prepend a PROXY v2 header to every outbound connection.
    pub fn with_proxy_protocol(mut self, enabled: bool) -> Self {
        self.proxy_protocol = enabled;
        self
    }

    /// Open the outbound connection and replay the player's handshake on it.
    async fn open<C>(&self, conn: &mut C) -> Result<Box<dyn ServerConnection>, GatewayError>
    where
        C: HsConnection + ?Sized,
    {
        let handshake = conn.handshake_packet().await?;

        let mut server = self
            .connector
            .connect()
            .await
            .map_err(|source| GatewayError::BackendConnect {
                backend: self.id.clone(),
                source,
            })?;
        debug!(backend = %self.id, "Connected to backend");

        if self.proxy_protocol {
            let header = ProxyHeader::new(conn.remote_addr(), conn.local_addr());
            server.write_all(&header.encode()).await?;
            debug!(backend = %self.id, "PROXY v2 header sent");
        }

        server.send_packet(&handshake).await?;
        Ok(server)
    }
}

#[async_trait]
impl Backend for ServerBackend {
    fn id(&self) -> &str {
        &self.id
    }

    async fn status(&self, conn: &mut dyn StatusConnection) -> Result<Packet, GatewayError> {
        let mut server = self.open(conn).await?;
        let response = server.status().await?;
        StatusResponse::from_packet(&response)?;
        debug!(backend = %self.id, "Status response received");
        Ok(response)
    }

    async fn login(&self, conn: &mut dyn LoginConnection) -> Result<(), GatewayError> {
        let mut server = self.open(conn).await?;
        let login_start = conn.login_start().await?;
        server.send_packet(&login_start).await?;

        let player = conn.name()?.to_owned();
        info!(
            backend = %self.id,
            player = %player,
            peer_addr = %conn.remote_addr(),
            "Player connecting"
        );

        let stats = pipe(conn, &mut *server).await;
        info!(
            backend = %self.id,
            bytes_to_backend = stats.a_to_b,
            bytes_from_backend = stats.b_to_a,
            "Session closed"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::{BasicServerConnection, PlayerConnection};
    use craftgate_protocol::{status_request, Handshake, LoginStart};
    use std::io;
    use std::net::SocketAddr;
    use std::sync::Mutex;
    use tokio::io::{duplex, AsyncReadExt, DuplexStream};

    /// Hands out one pre-made stream.
    struct OnceConnector(Mutex<Option<DuplexStream>>);

    impl OnceConnector {
        fn new(stream: DuplexStream) -> Arc<Self> {
            Arc::new(Self(Mutex::new(Some(stream))))
        }
    }

    #[async_trait]
    impl ServerConnector for OnceConnector {
        async fn connect(&self) -> io::Result<Box<dyn ServerConnection>> {
            let stream = self.0.lock().unwrap().take();
            match stream {
                Some(stream) => Ok(Box::new(BasicServerConnection::new(stream))),
                None => Err(io::ErrorKind::ConnectionRefused.into()),
            }
        }
    }

    fn handshake(next_state: i32) -> Packet {
        Handshake {
            protocol_version: 754,
            server_address: "infrared.test".to_string(),
            server_port: 25565,
            next_state,
        }
        .to_packet()
    }

    fn addrs() -> (SocketAddr, SocketAddr) {
        (
            "203.0.113.7:40000".parse().unwrap(),
            "198.51.100.1:25565".parse().unwrap(),
        )
    }

    async fn player(packets: &[Packet]) -> (PlayerConnection<DuplexStream>, DuplexStream) {
        let (inbound, mut client) = duplex(64 * 1024);
        for packet in packets {
            client.write_all(&packet.encode()).await.unwrap();
        }
        let (remote, local) = addrs();
        (PlayerConnection::new(inbound, remote, local), client)
    }

    #[tokio::test]
    async fn test_status_forwards_handshake_and_request() {
        let (outbound, mut server) = duplex(64 * 1024);
        let backend = ServerBackend::new("lobby", OnceConnector::new(outbound));
        let (mut conn, _client) = player(&[handshake(1)]).await;

        let response = StatusResponse {
            json: r#"{"version":{"name":"1.16.5","protocol":754}}"#.to_string(),
        }
        .to_packet();
        let reply = response.clone();
        let server_task = tokio::spawn(async move {
            let hs = craftgate_protocol::read_packet(&mut server).await.unwrap();
            let request = craftgate_protocol::read_packet(&mut server).await.unwrap();
            craftgate_protocol::write_packet(&mut server, &reply)
                .await
                .unwrap();
            (hs, request)
        });

        assert_eq!(backend.status(&mut conn).await.unwrap(), response);
        let (hs, request) = server_task.await.unwrap();
        assert_eq!(hs, handshake(1));
        assert_eq!(request, status_request());
    }

    #[tokio::test]
    async fn test_status_rejects_garbage_response() {
        let (outbound, mut server) = duplex(1024);
        let backend = ServerBackend::new("lobby", OnceConnector::new(outbound));
        let (mut conn, _client) = player(&[handshake(1)]).await;

        tokio::spawn(async move {
            let _ = craftgate_protocol::read_packet(&mut server).await;
            let _ = craftgate_protocol::read_packet(&mut server).await;
            let _ = craftgate_protocol::write_packet(&mut server, &Packet::new(0x00, vec![0x05]))
                .await;
        });

        let err = backend.status(&mut conn).await.unwrap_err();
        assert!(matches!(err, GatewayError::Protocol(_)), "{err:?}");
    }

    #[tokio::test]
    async fn test_connect_failure_names_backend() {
        let connector = OnceConnector::new(duplex(8).0);
        connector.0.lock().unwrap().take();
        let backend = ServerBackend::new("lobby", connector);
        let (mut conn, _client) = player(&[handshake(1)]).await;

        match backend.status(&mut conn).await {
            Err(GatewayError::BackendConnect { backend, .. }) => assert_eq!(backend, "lobby"),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_login_prepends_proxy_header() {
        let (outbound, mut server) = duplex(64 * 1024);
        let backend =
            ServerBackend::new("lobby", OnceConnector::new(outbound)).with_proxy_protocol(true);
        let login = LoginStart {
            name: "infrared".to_string(),
        }
        .to_packet();
        let (mut conn, client) = player(&[handshake(2), login.clone()]).await;
        drop(client);

        let (remote, local) = addrs();
        let mut expected = ProxyHeader::new(remote, local).encode().to_vec();
        expected.extend_from_slice(&handshake(2).encode());
        expected.extend_from_slice(&login.encode());

        let reader = tokio::spawn(async move {
            let mut received = Vec::new();
            server.read_to_end(&mut received).await.unwrap();
            received
        });

        backend.login(&mut conn).await.unwrap();
        assert_eq!(conn.name().unwrap(), "infrared");
        drop(conn);
        assert_eq!(reader.await.unwrap(), expected);
    }
}
