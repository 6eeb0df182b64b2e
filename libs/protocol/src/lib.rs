//! Wire protocol pieces needed to route game sessions.
//!
//! Only the packets a gateway has to understand are modelled here: the
//! handshake, login start, and the status exchange. Everything after the
//! routing decision is moved as opaque bytes.

pub mod error;
pub mod handshake;
pub mod login;
pub mod packet;
pub mod status;
pub mod varint;

pub use error::ProtocolError;
pub use handshake::{Handshake, RequestType, HANDSHAKE_PACKET_ID};
pub use login::{LoginStart, LOGIN_START_PACKET_ID};
pub use packet::{read_packet, write_packet, Packet, MAX_FRAME_LENGTH};
pub use status::{
    status_request, Ping, StatusResponse, PING_PACKET_ID, STATUS_REQUEST_PACKET_ID,
    STATUS_RESPONSE_PACKET_ID,
};
pub use varint::VarIntError;
