//! Player-facing connection over any duplex stream.

use std::io;
use std::net::SocketAddr;
use std::pin::Pin;
use std::task::{Context, Poll};

use async_trait::async_trait;
use craftgate_protocol::{Handshake, LoginStart, Packet};
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tracing::debug;

use super::{Connection, HsConnection, LoginConnection};
use crate::error::GatewayError;

/// Inbound connection from a game client.
///
/// Owns the accepted stream. Dropping it closes the stream.
pub struct PlayerConnection<S> {
    stream: S,
    remote_addr: SocketAddr,
    local_addr: SocketAddr,
    handshake_packet: Option<Packet>,
    handshake: Option<Handshake>,
    login_start_packet: Option<Packet>,
    name: Option<String>,
}

impl<S> PlayerConnection<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    /// Wrap an accepted stream together with both ends of its socket.
    pub fn new(stream: S, remote_addr: SocketAddr, local_addr: SocketAddr) -> Self {
        Self {
            stream,
            remote_addr,
            local_addr,
            handshake_packet: None,
            handshake: None,
            login_start_packet: None,
            name: None,
        }
    }
}

#[async_trait]
impl<S> HsConnection for PlayerConnection<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    async fn handshake_packet(&mut self) -> Result<Packet, GatewayError> {
        if let Some(packet) = &self.handshake_packet {
            return Ok(packet.clone());
        }
        let packet = self
            .read_packet()
            .await
            .map_err(GatewayError::HandshakeUnavailable)?;
        self.handshake_packet = Some(packet.clone());
        Ok(packet)
    }

    async fn handshake(&mut self) -> Result<Handshake, GatewayError> {
        if let Some(hs) = &self.handshake {
            return Ok(hs.clone());
        }
        let packet = self.handshake_packet().await?;
        let hs = Handshake::from_packet(&packet)?;
        debug!(
            protocol_version = hs.protocol_version,
            server_address = %hs.server_address,
            server_port = hs.server_port,
            next_state = hs.next_state,
            "Handshake decoded"
        );
        self.handshake = Some(hs.clone());
        Ok(hs)
    }

    fn remote_addr(&self) -> SocketAddr {
        self.remote_addr
    }

    fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }
}

#[async_trait]
impl<S> LoginConnection for PlayerConnection<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    fn name(&self) -> Result<&str, GatewayError> {
        self.name.as_deref().ok_or(GatewayError::NameUnavailable)
    }

    async fn login_start(&mut self) -> Result<Packet, GatewayError> {
        let packet = match self.login_start_packet.clone() {
            Some(packet) => packet,
            None => {
                let packet = self.read_packet().await?;
                self.login_start_packet = Some(packet.clone());
                packet
            }
        };
        let login = LoginStart::from_packet(&packet)?;
        self.name = Some(login.name);
        Ok(packet)
    }
}

impl<S> AsyncRead for PlayerConnection<S>
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

impl<S> AsyncWrite for PlayerConnection<S>
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
