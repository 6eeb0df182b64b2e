//! Variable-length integers and length-prefixed strings.
//!
//! Java-edition VarInts carry 7 payload bits per byte, least significant
//! group first, with the high bit set on every byte except the last.
//! Signed values are the two's-complement `u32` reinterpretation (no ZigZag),
//! so negative numbers always take the full five bytes.

use bytes::{Buf, BufMut};
use thiserror::Error;

/// Maximum number of bytes a 32-bit VarInt can occupy.
pub const MAX_VAR_INT_BYTES: usize = 5;

/// Failure decoding a VarInt or a protocol string.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum VarIntError {
    #[error("buffer too short")]
    BufferTooShort,
    #[error("VarInt is too long (more than {max_bytes} bytes)")]
    TooManyBytes { max_bytes: usize },
    #[error("string length {declared} exceeds remaining {remaining} bytes")]
    StringTooShort { declared: usize, remaining: usize },
    #[error("invalid UTF-8 string")]
    InvalidUtf8,
}

/// Number of bytes `value` occupies once encoded.
pub fn var_u32_len(value: u32) -> usize {
    match value {
        0..=0x7F => 1,
        0x80..=0x3FFF => 2,
        0x4000..=0x1F_FFFF => 3,
        0x20_0000..=0x0FFF_FFFF => 4,
        _ => 5,
    }
}

/// Append `value` as a VarInt.
pub fn write_var_u32(buf: &mut impl BufMut, mut value: u32) {
    loop {
        if value & !0x7F == 0 {
            buf.put_u8(value as u8);
            return;
        }
        buf.put_u8((value & 0x7F | 0x80) as u8);
        value >>= 7;
    }
}

/// Read a VarInt, consuming at most [`MAX_VAR_INT_BYTES`] bytes.
pub fn read_var_u32(buf: &mut impl Buf) -> Result<u32, VarIntError> {
    let mut result: u32 = 0;
    for i in 0..MAX_VAR_INT_BYTES {
        if !buf.has_remaining() {
            return Err(VarIntError::BufferTooShort);
        }
        let byte = buf.get_u8();
        result |= ((byte & 0x7F) as u32) << (7 * i);
        if byte & 0x80 == 0 {
            return Ok(result);
        }
    }
    Err(VarIntError::TooManyBytes {
        max_bytes: MAX_VAR_INT_BYTES,
    })
}

/// Signed variant of [`write_var_u32`].
pub fn write_var_i32(buf: &mut impl BufMut, value: i32) {
    write_var_u32(buf, value as u32);
}

pub fn read_var_i32(buf: &mut impl Buf) -> Result<i32, VarIntError> {
    read_var_u32(buf).map(|v| v as i32)
}

/// Write a protocol string (VarInt byte length + UTF-8).
pub fn write_string(buf: &mut impl BufMut, s: &str) {
    write_var_u32(buf, s.len() as u32);
    buf.put_slice(s.as_bytes());
}

/// Read a protocol string (VarInt byte length + UTF-8).
pub fn read_string(buf: &mut impl Buf) -> Result<String, VarIntError> {
    let len = read_var_u32(buf)? as usize;
    if buf.remaining() < len {
        return Err(VarIntError::StringTooShort {
            declared: len,
            remaining: buf.remaining(),
        });
    }
    let data = buf.copy_to_bytes(len);
    String::from_utf8(data.to_vec()).map_err(|_| VarIntError::InvalidUtf8)
}
