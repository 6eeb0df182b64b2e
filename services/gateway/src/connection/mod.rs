//! Connection capability sets.
//!
//! A raw duplex stream is wrapped in layers of capabilities, each a superset
//! of the previous one:
//!
//! ```text
//! PipeConnection   raw AsyncRead + AsyncWrite
//!   Connection     + read_packet / write_packet
//!   HsConnection   + cached handshake, peer addresses
//!   LoginConnection  + cached login start, player name
//! StatusConnection = HsConnection
//! ServerConnection = PipeConnection + status / send_packet (outbound side)
//! ```
//!
//! The player stream is single-pass: the handshake and login start are read
//! once and cached, and every routing decision is made from the cache.

mod pipe;
mod player;
mod server;

use std::net::SocketAddr;

use async_trait::async_trait;
use craftgate_protocol::{read_packet, write_packet, Handshake, Packet, ProtocolError, RequestType};
use tokio::io::{AsyncRead, AsyncWrite};

use crate::error::GatewayError;

pub use pipe::{pipe, PipeStats, PIPE_BUFFER_SIZE};
pub use player::PlayerConnection;
pub use server::{
    BasicServerConnection, ServerConnection, ServerConnector, TcpConnector,
    DEFAULT_CONNECT_TIMEOUT,
};

/// Raw byte stream that can be handed to [`pipe`].
pub trait PipeConnection: AsyncRead + AsyncWrite + Unpin + Send {}

impl<T> PipeConnection for T where T: AsyncRead + AsyncWrite + Unpin + Send + ?Sized {}

/// Packet-level access on top of a raw stream.
#[async_trait]
pub trait Connection {
    async fn read_packet(&mut self) -> Result<Packet, ProtocolError>;
    async fn write_packet(&mut self, packet: &Packet) -> Result<(), ProtocolError>;
}

#[async_trait]
impl<T> Connection for T
where
    T: PipeConnection + ?Sized,
{
    async fn read_packet(&mut self) -> Result<Packet, ProtocolError> {
        read_packet(self).await
    }

    async fn write_packet(&mut self, packet: &Packet) -> Result<(), ProtocolError> {
        write_packet(self, packet).await
    }
}

/// Inbound connection whose handshake has been, or can be, read.
#[async_trait]
pub trait HsConnection: PipeConnection {
    /// The raw handshake packet. The first call performs the one read that
    /// yields it; later calls return the cached packet.
    async fn handshake_packet(&mut self) -> Result<Packet, GatewayError>;

    /// The decoded handshake, cached after the first successful decode.
    async fn handshake(&mut self) -> Result<Handshake, GatewayError>;

    fn remote_addr(&self) -> SocketAddr;

    fn local_addr(&self) -> SocketAddr;

    async fn request_type(&mut self) -> Result<RequestType, GatewayError> {
        Ok(self.handshake().await?.request_type())
    }

    async fn server_address(&mut self) -> Result<String, GatewayError> {
        Ok(self.handshake().await?.server_address)
    }
}

/// Inbound connection in the login flow.
#[async_trait]
pub trait LoginConnection: HsConnection {
    /// Player name from the login start packet.
    ///
    /// Fails with [`GatewayError::NameUnavailable`] until [`login_start`]
    /// has succeeded.
    ///
    /// [`login_start`]: LoginConnection::login_start
    fn name(&self) -> Result<&str, GatewayError>;

    /// Reads the login start packet on first call and caches it, whether or
    /// not it parses.
    async fn login_start(&mut self) -> Result<Packet, GatewayError>;
}

/// Inbound connection in the status flow. Needs nothing beyond the handshake.
pub trait StatusConnection: HsConnection {}

impl<T> StatusConnection for T where T: HsConnection + ?Sized {}
