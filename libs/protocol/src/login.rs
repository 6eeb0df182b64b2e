//! Login start, the first serverbound packet of the login state.

use bytes::BytesMut;

use crate::error::ProtocolError;
use crate::packet::Packet;
use crate::varint::{read_string, write_string};

/// Packet id of login start in the login state.
pub const LOGIN_START_PACKET_ID: u32 = 0x00;

/// First packet of the login state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginStart {
    /// Player name as sent by the client.
    pub name: String,
}

impl LoginStart {
    /// Decode the player name. Fields newer clients append after the name
    /// (signature data, UUID) are left unparsed.
    pub fn from_packet(packet: &Packet) -> Result<Self, ProtocolError> {
        if packet.id != LOGIN_START_PACKET_ID {
            return Err(ProtocolError::packet(packet.id, "login start", "unexpected packet id"));
        }
        let mut buf = packet.data.clone();
        let name = read_string(&mut buf).map_err(|e| ProtocolError::packet(packet.id, "name", e))?;
        Ok(Self { name })
    }

    /// Encode a login start carrying only the name.
    pub fn to_packet(&self) -> Packet {
        let mut data = BytesMut::with_capacity(self.name.len() + 1);
        write_string(&mut data, &self.name);
        Packet::new(LOGIN_START_PACKET_ID, data.freeze())
    }
}
