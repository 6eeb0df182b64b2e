//! Error types for gateway sessions.

use std::io;

use craftgate_protocol::ProtocolError;
use thiserror::Error;

/// Errors that end a single session. None of them affect other sessions
/// or the listener.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// The first packet of the connection could not be read.
    #[error("cannot read handshake packet: {0}")]
    HandshakeUnavailable(#[source] ProtocolError),

    /// The player name was requested before login start was read.
    #[error("player name is not known before login start")]
    NameUnavailable,

    /// The peer sent a packet the current phase does not allow.
    #[error("unexpected packet 0x{got:02X}, expected 0x{expected:02X}")]
    UnexpectedPacket { expected: u32, got: u32 },

    /// The outbound connection to a backend could not be opened.
    #[error("cannot connect to backend '{backend}': {source}")]
    BackendConnect {
        backend: String,
        #[source]
        source: io::Error,
    },

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

impl GatewayError {
    /// Returns true if the error only means the peer went away.
    pub fn is_end_of_stream(&self) -> bool {
        match self {
            GatewayError::HandshakeUnavailable(e) | GatewayError::Protocol(e) => {
                e.is_connection_closed()
            }
            GatewayError::Io(e) => matches!(
                e.kind(),
                io::ErrorKind::UnexpectedEof
                    | io::ErrorKind::BrokenPipe
                    | io::ErrorKind::ConnectionReset
            ),
            _ => false,
        }
    }
}
