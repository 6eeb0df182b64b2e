//! Length-prefixed packet framing.
//!
//! Wire layout of one frame:
//!
//! ```text
//! VarInt length | VarInt packet id | payload
//!               \______ length bytes ______/
//! ```

use bytes::{Buf, BufMut, Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::ProtocolError;
use crate::varint::{read_var_u32, var_u32_len, write_var_u32, MAX_VAR_INT_BYTES};

/// Largest frame body accepted from a peer (the largest 3-byte VarInt).
pub const MAX_FRAME_LENGTH: usize = 2_097_151;

/// A single protocol packet. `data` never contains the id or the length prefix.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Packet {
    /// Packet id, interpreted per connection state.
    pub id: u32,
    /// Payload following the id.
    pub data: Bytes,
}

impl Packet {
    /// Build a packet from its id and payload.
    pub fn new(id: u32, data: impl Into<Bytes>) -> Self {
        Self {
            id,
            data: data.into(),
        }
    }

    /// Length of the frame body (id + payload), i.e. the value of the length prefix.
    pub fn body_len(&self) -> usize {
        var_u32_len(self.id) + self.data.len()
    }

    /// Encode the full frame, recomputing the length prefix.
    ///
    /// Encoding never fails, but a frame whose body is longer than
    /// [`MAX_FRAME_LENGTH`] is refused by [`Packet::decode`] and
    /// [`read_packet`].
    pub fn encode(&self) -> Bytes {
        let body_len = self.body_len();
        let mut buf = BytesMut::with_capacity(var_u32_len(body_len as u32) + body_len);
        self.encode_into(&mut buf);
        buf.freeze()
    }

    /// Append the encoded frame to `buf`.
    pub fn encode_into(&self, buf: &mut impl BufMut) {
        write_var_u32(buf, self.body_len() as u32);
        write_var_u32(buf, self.id);
        buf.put_slice(&self.data);
    }

    /// Decode exactly one frame from an in-memory buffer.
    pub fn decode(buf: &mut impl Buf) -> Result<Self, ProtocolError> {
        let length = read_var_u32(buf)
            .map_err(|e| ProtocolError::frame(format!("length prefix: {e}")))?
            as usize;
        check_frame_length(length)?;
        if buf.remaining() < length {
            return Err(ProtocolError::frame(format!(
                "frame declares {length} bytes, only {} available",
                buf.remaining()
            )));
        }
        Self::decode_body(buf.copy_to_bytes(length))
    }

    /// Split a frame body into packet id and payload.
    pub fn decode_body(mut body: Bytes) -> Result<Self, ProtocolError> {
        let id = read_var_u32(&mut body)
            .map_err(|e| ProtocolError::frame(format!("packet id: {e}")))?;
        Ok(Self { id, data: body })
    }
}

fn check_frame_length(length: usize) -> Result<(), ProtocolError> {
    if length == 0 {
        return Err(ProtocolError::frame("empty frame has no packet id"));
    }
    if length > MAX_FRAME_LENGTH {
        return Err(ProtocolError::frame(format!(
            "frame length {length} exceeds maximum {MAX_FRAME_LENGTH}"
        )));
    }
    Ok(())
}

/// Read one frame from a stream.
///
/// The length prefix is read a byte at a time and the body is limited to the
/// declared length, so nothing past the end of the frame is consumed.
pub async fn read_packet<R>(reader: &mut R) -> Result<Packet, ProtocolError>
where
    R: AsyncRead + Unpin + ?Sized,
{
    let length = read_frame_length(reader).await? as usize;
    check_frame_length(length)?;

    // Grows with the bytes that actually arrive, not with the declared length.
    let mut body = Vec::new();
    let read = (&mut *reader).take(length as u64).read_to_end(&mut body).await?;
    if read < length {
        return Err(ProtocolError::frame(format!(
            "stream ended inside a {length}-byte frame"
        )));
    }

    Packet::decode_body(Bytes::from(body))
}

async fn read_frame_length<R>(reader: &mut R) -> Result<u32, ProtocolError>
where
    R: AsyncRead + Unpin + ?Sized,
{
    let mut value: u32 = 0;
    for i in 0..MAX_VAR_INT_BYTES {
        let byte = match reader.read_u8().await {
            Ok(byte) => byte,
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                if i == 0 {
                    return Err(ProtocolError::ConnectionClosed);
                }
                return Err(ProtocolError::frame("stream ended inside length prefix"));
            }
            Err(e) => return Err(e.into()),
        };
        value |= ((byte & 0x7F) as u32) << (7 * i);
        if byte & 0x80 == 0 {
            return Ok(value);
        }
    }
    Err(ProtocolError::frame(format!(
        "length prefix longer than {MAX_VAR_INT_BYTES} bytes"
    )))
}

/// Encode and write one frame, then flush.
pub async fn write_packet<W>(writer: &mut W, packet: &Packet) -> Result<(), ProtocolError>
where
    W: AsyncWrite + Unpin + ?Sized,
{
    writer.write_all(&packet.encode()).await?;
    writer.flush().await?;
    Ok(())
}
