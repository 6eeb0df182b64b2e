//! Status-state packets: server list request, response and ping.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::ProtocolError;
use crate::packet::Packet;
use crate::varint::{read_string, write_string};

pub const STATUS_REQUEST_PACKET_ID: u32 = 0x00;
pub const STATUS_RESPONSE_PACKET_ID: u32 = 0x00;
pub const PING_PACKET_ID: u32 = 0x01;

/// The empty status request a client sends after a status handshake.
pub fn status_request() -> Packet {
    Packet::new(STATUS_REQUEST_PACKET_ID, Bytes::new())
}

/// Server list response carrying the raw JSON document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusResponse {
    /// Status document, passed through unparsed.
    pub json: String,
}

impl StatusResponse {
    /// Decode the JSON string from a status response.
    pub fn from_packet(packet: &Packet) -> Result<Self, ProtocolError> {
        if packet.id != STATUS_RESPONSE_PACKET_ID {
            return Err(ProtocolError::packet(packet.id, "status response", "unexpected packet id"));
        }
        let mut buf = packet.data.clone();
        let json = read_string(&mut buf).map_err(|e| ProtocolError::packet(packet.id, "json", e))?;
        Ok(Self { json })
    }

    pub fn to_packet(&self) -> Packet {
        let mut data = BytesMut::with_capacity(self.json.len() + 3);
        write_string(&mut data, &self.json);
        Packet::new(STATUS_RESPONSE_PACKET_ID, data.freeze())
    }
}

/// Ping request; the pong carries the same payload back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ping {
    pub payload: i64,
}

impl Ping {
    pub fn from_packet(packet: &Packet) -> Result<Self, ProtocolError> {
        if packet.id != PING_PACKET_ID {
            return Err(ProtocolError::packet(packet.id, "ping", "unexpected packet id"));
        }
        let mut buf = packet.data.clone();
        if buf.remaining() < 8 {
            return Err(ProtocolError::packet(packet.id, "payload", "buffer too short"));
        }
        Ok(Self {
            payload: buf.get_i64(),
        })
    }

    pub fn to_packet(&self) -> Packet {
        let mut data = BytesMut::with_capacity(8);
        data.put_i64(self.payload);
        Packet::new(PING_PACKET_ID, data.freeze())
    }
}
