//! The serverbound handshake, the first packet of every session.

use bytes::{Buf, BufMut, BytesMut};

use crate::error::ProtocolError;
use crate::packet::Packet;
use crate::varint::{read_string, read_var_i32, write_string, write_var_i32};

/// Packet id of the handshake in the handshaking state.
pub const HANDSHAKE_PACKET_ID: u32 = 0x00;

/// Phase the client asks to enter after the handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i8)]
pub enum RequestType {
    Unknown = 0,
    Status = 1,
    Login = 2,
}

impl From<i32> for RequestType {
    fn from(next_state: i32) -> Self {
        match next_state {
            1 => RequestType::Status,
            2 => RequestType::Login,
            _ => RequestType::Unknown,
        }
    }
}

impl std::fmt::Display for RequestType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            RequestType::Unknown => "unknown",
            RequestType::Status => "status",
            RequestType::Login => "login",
        };
        f.write_str(name)
    }
}

/// Decoded handshake fields.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Handshake {
    /// Protocol version the client speaks.
    pub protocol_version: i32,
    /// Address the client typed in, used as the routing key.
    pub server_address: String,
    pub server_port: u16,
    /// Raw next-state value; see [`Handshake::request_type`].
    pub next_state: i32,
}

impl Handshake {
    /// Interpret `next_state`.
    pub fn request_type(&self) -> RequestType {
        RequestType::from(self.next_state)
    }

    /// Decode the handshake fields from a packet payload.
    pub fn from_packet(packet: &Packet) -> Result<Self, ProtocolError> {
        if packet.id != HANDSHAKE_PACKET_ID {
            return Err(ProtocolError::MalformedHandshake(format!(
                "unexpected packet id 0x{:02X}",
                packet.id
            )));
        }

        let mut buf = packet.data.clone();
        let protocol_version =
            read_var_i32(&mut buf).map_err(|e| ProtocolError::handshake("protocol version", e))?;
        let server_address =
            read_string(&mut buf).map_err(|e| ProtocolError::handshake("server address", e))?;
        if buf.remaining() < 2 {
            return Err(ProtocolError::MalformedHandshake(
                "server port: buffer too short".to_string(),
            ));
        }
        let server_port = buf.get_u16();
        let next_state =
            read_var_i32(&mut buf).map_err(|e| ProtocolError::handshake("next state", e))?;

        Ok(Self {
            protocol_version,
            server_address,
            server_port,
            next_state,
        })
    }

    /// Encode as a handshake packet, e.g. to forward to a backend.
    pub fn to_packet(&self) -> Packet {
        let mut data = BytesMut::with_capacity(self.server_address.len() + 12);
        write_var_i32(&mut data, self.protocol_version);
        write_string(&mut data, &self.server_address);
        data.put_u16(self.server_port);
        write_var_i32(&mut data, self.next_state);
        Packet::new(HANDSHAKE_PACKET_ID, data.freeze())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Handshake {
        Handshake {
            protocol_version: 754,
            server_address: "infrared.test".to_string(),
            server_port: 25565,
            next_state: 2,
        }
    }

    #[test]
    fn encode_layout() {
        let packet = sample().to_packet();
        assert_eq!(packet.id, 0x00);

        let mut expected = vec![0xF2, 0x05, 13];
        expected.extend_from_slice(b"infrared.test");
        expected.extend_from_slice(&[0x63, 0xDD, 0x02]);
        assert_eq!(packet.data.as_ref(), expected.as_slice());
    }

    #[test]
    fn decode_encoded() {
        let hs = sample();
        assert_eq!(Handshake::from_packet(&hs.to_packet()).unwrap(), hs);
    }

    #[test]
    fn decode_truncated_port() {
        let packet = sample().to_packet();
        // drop next state and one port byte
        let data = packet.data.slice(..packet.data.len() - 2);
        let err = Handshake::from_packet(&Packet::new(0, data)).unwrap_err();
        assert!(matches!(err, ProtocolError::MalformedHandshake(_)));
    }

    #[test]
    fn decode_missing_next_state() {
        let packet = sample().to_packet();
        let data = packet.data.slice(..packet.data.len() - 1);
        assert!(matches!(
            Handshake::from_packet(&Packet::new(0, data)),
            Err(ProtocolError::MalformedHandshake(_))
        ));
    }

    #[test]
    fn decode_empty_payload() {
        assert!(matches!(
            Handshake::from_packet(&Packet::default()),
            Err(ProtocolError::MalformedHandshake(_))
        ));
    }

    #[test]
    fn decode_wrong_packet_id() {
        let mut packet = sample().to_packet();
        packet.id = 0x01;
        assert!(matches!(
            Handshake::from_packet(&packet),
            Err(ProtocolError::MalformedHandshake(_))
        ));
    }

    #[test]
    fn request_type_mapping() {
        assert_eq!(RequestType::from(1), RequestType::Status);
        assert_eq!(RequestType::from(2), RequestType::Login);
        assert_eq!(RequestType::from(0), RequestType::Unknown);
        assert_eq!(RequestType::from(3), RequestType::Unknown);
        assert_eq!(RequestType::from(-1), RequestType::Unknown);
        assert_eq!(RequestType::Login as i8, 2);
    }
}
