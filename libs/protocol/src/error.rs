//! Error types for packet framing and decoding.

use std::io;

use thiserror::Error;

use crate::varint::VarIntError;

/// Errors that can occur while reading, writing or decoding packets.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// The stream ended cleanly before the first byte of a frame.
    #[error("connection closed")]
    ConnectionClosed,

    /// The length-prefixed frame could not be read.
    #[error("malformed frame: {0}")]
    MalformedFrame(String),

    /// The handshake payload could not be decoded.
    #[error("malformed handshake: {0}")]
    MalformedHandshake(String),

    /// A non-handshake packet payload could not be decoded.
    #[error("malformed packet 0x{id:02X}: {reason}")]
    MalformedPacket { id: u32, reason: String },

    /// Underlying transport error.
    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

impl ProtocolError {
    /// Returns true if the peer closed the stream between frames.
    pub fn is_connection_closed(&self) -> bool {
        matches!(self, ProtocolError::ConnectionClosed)
    }

    pub(crate) fn frame(reason: impl Into<String>) -> Self {
        ProtocolError::MalformedFrame(reason.into())
    }

    pub(crate) fn handshake(field: &str, err: impl std::fmt::Display) -> Self {
        ProtocolError::MalformedHandshake(format!("{field}: {err}"))
    }

    pub(crate) fn packet(id: u32, field: &str, err: impl std::fmt::Display) -> Self {
        ProtocolError::MalformedPacket {
            id,
            reason: format!("{field}: {err}"),
        }
    }
}

impl From<VarIntError> for ProtocolError {
    fn from(err: VarIntError) -> Self {
        ProtocolError::MalformedFrame(err.to_string())
    }
}
