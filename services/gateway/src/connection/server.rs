//! Backend-facing connections and the factory that opens them.

use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use async_trait::async_trait;
use craftgate_protocol::{status_request, Packet, ProtocolError};
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::debug;

use super::{Connection, PipeConnection};

/// Default connect timeout for backend connections.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(2);

/// Outbound connection to a backend server.
#[async_trait]
pub trait ServerConnection: PipeConnection {
    /// Send the status request this connection was created with and read
    /// back one response packet.
    async fn status(&mut self) -> Result<Packet, ProtocolError>;

    async fn send_packet(&mut self, packet: &Packet) -> Result<(), ProtocolError>;
}

/// Opens one outbound connection per dispatched session.
#[async_trait]
pub trait ServerConnector: Send + Sync {
    async fn connect(&self) -> io::Result<Box<dyn ServerConnection>>;
}

/// [`ServerConnection`] over any duplex stream.
pub struct BasicServerConnection<S> {
    stream: S,
    status_request: Packet,
}

impl<S> BasicServerConnection<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    /// Wrap a stream using the standard empty status request.
    pub fn new(stream: S) -> Self {
        Self::with_status_request(stream, status_request())
    }

    /// Wrap a stream, sending `status_request` on each status fetch.
    pub fn with_status_request(stream: S, status_request: Packet) -> Self {
        Self {
            stream,
            status_request,
        }
    }
}

#[async_trait]
impl<S> ServerConnection for BasicServerConnection<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    async fn status(&mut self) -> Result<Packet, ProtocolError> {
        let request = self.status_request.clone();
        self.write_packet(&request).await?;
        self.read_packet().await
    }

    async fn send_packet(&mut self, packet: &Packet) -> Result<(), ProtocolError> {
        self.write_packet(packet).await
    }
}

impl<S> AsyncRead for BasicServerConnection<S>
where
    S: AsyncRead + Unpin,
{
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().stream).poll_read(cx, buf)
    }
}

impl<S> AsyncWrite for BasicServerConnection<S>
where
    S: AsyncWrite + Unpin,
{
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        Pin::new(&mut self.get_mut().stream).poll_write(cx, buf)
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().stream).poll_flush(cx)
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().stream).poll_shutdown(cx)
    }
}

/// Connects to a backend over TCP.
#[derive(Debug, Clone)]
pub struct TcpConnector {
    /// `host:port` of the backend; resolved on every connect.
    addr: String,
    connect_timeout: Duration,
}

impl TcpConnector {
    /// Connector using [`DEFAULT_CONNECT_TIMEOUT`].
    pub fn new(addr: impl Into<String>) -> Self {
        Self::with_timeout(addr, DEFAULT_CONNECT_TIMEOUT)
    }

    /// Connector that gives up after `connect_timeout`.
    pub fn with_timeout(addr: impl Into<String>, connect_timeout: Duration) -> Self {
        Self {
            addr: addr.into(),
            connect_timeout,
        }
    }

    pub fn addr(&self) -> &str {
        &self.addr
    }
}

#[async_trait]
impl ServerConnector for TcpConnector {
    async fn connect(&self) -> io::Result<Box<dyn ServerConnection>> {
        debug!(backend_addr = %self.addr, "Connecting to backend");

        let stream = match timeout(self.connect_timeout, TcpStream::connect(&self.addr)).await {
            Ok(result) => result?,
            Err(_) => {
                return Err(io::Error::new(
                    io::ErrorKind::TimedOut,
                    "connect timeout",
                ))
            }
        };
        stream.set_nodelay(true)?;

        Ok(Box::new(BasicServerConnection::new(stream)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use craftgate_protocol::StatusResponse;
    use tokio::io::AsyncReadExt;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn test_status_writes_request_then_reads_response() {
        let response = StatusResponse {
            json: r#"{"description":"hi"}"#.to_string(),
        }
        .to_packet();

        let mock = tokio_test::io::Builder::new()
            .write(&status_request().encode())
            .read(&response.encode())
            .build();

        let mut conn = BasicServerConnection::new(mock);
        assert_eq!(conn.status().await.unwrap(), response);
    }

    #[tokio::test]
    async fn test_status_uses_supplied_request() {
        let request = Packet::new(0x00, vec![0xAB]);
        let response = Packet::new(0x00, vec![0x00]);

        let mock = tokio_test::io::Builder::new()
            .write(&request.encode())
            .read(&response.encode())
            .build();

        let mut conn = BasicServerConnection::with_status_request(mock, request);
        assert_eq!(conn.status().await.unwrap(), response);
    }

    #[tokio::test]
    async fn test_send_packet_frames_packet() {
        let packet = Packet::new(0x19, vec![1, 2, 3]);
        let mock = tokio_test::io::Builder::new()
            .write(&packet.encode())
            .build();

        let mut conn = BasicServerConnection::new(mock);
        conn.send_packet(&packet).await.unwrap();
    }

    #[tokio::test]
    async fn test_tcp_connector_connects() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let accept = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let mut buf = Vec::new();
            stream.read_to_end(&mut buf).await.unwrap();
            buf
        });

        let connector = TcpConnector::new(addr.to_string());
        assert_eq!(connector.addr(), addr.to_string());
        let mut conn = connector.connect().await.unwrap();
        conn.send_packet(&Packet::new(0x01, vec![7])).await.unwrap();
        drop(conn);

        assert_eq!(accept.await.unwrap(), Packet::new(0x01, vec![7]).encode().to_vec());
    }

    #[tokio::test]
    async fn test_tcp_connector_refused() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let connector = TcpConnector::with_timeout(addr.to_string(), Duration::from_millis(500));
        assert!(connector.connect().await.is_err());
    }
}
