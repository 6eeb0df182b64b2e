//! PROXY protocol v2 header, written ahead of the handshake on outbound
//! connections so the backend sees the player's real address.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};

use bytes::{BufMut, Bytes, BytesMut};

const SIGNATURE: [u8; 12] = [
    0x0D, 0x0A, 0x0D, 0x0A, 0x00, 0x0D, 0x0A, 0x51, 0x55, 0x49, 0x54, 0x0A,
];

/// Version 2, PROXY command.
const VERSION_COMMAND_PROXY: u8 = 0x21;

const AF_INET_STREAM: u8 = 0x11;
const AF_INET6_STREAM: u8 = 0x21;

/// Addresses plus ports.
const IPV4_BLOCK_LEN: u16 = 4 + 4 + 2 + 2;
const IPV6_BLOCK_LEN: u16 = 16 + 16 + 2 + 2;

const FIXED_LEN: usize = SIGNATURE.len() + 4;

/// PROXY protocol v2 header for a TCP connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProxyHeader {
    /// Player address.
    pub src: SocketAddr,
    /// Address the player connected to.
    pub dst: SocketAddr,
}

impl ProxyHeader {
    pub fn new(src: SocketAddr, dst: SocketAddr) -> Self {
        Self { src, dst }
    }

    /// Encoded size in bytes.
    pub fn encoded_len(&self) -> usize {
        match self.family() {
            Family::V4(..) => FIXED_LEN + IPV4_BLOCK_LEN as usize,
            Family::V6(..) => FIXED_LEN + IPV6_BLOCK_LEN as usize,
        }
    }

    /// Encode the binary header. Mixed address families are sent as IPv6.
    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(self.encoded_len());
        buf.put_slice(&SIGNATURE);
        buf.put_u8(VERSION_COMMAND_PROXY);

        match self.family() {
            Family::V4(src, dst) => {
                buf.put_u8(AF_INET_STREAM);
                buf.put_u16(IPV4_BLOCK_LEN);
                buf.put_slice(&src.octets());
                buf.put_slice(&dst.octets());
            }
            Family::V6(src, dst) => {
                buf.put_u8(AF_INET6_STREAM);
                buf.put_u16(IPV6_BLOCK_LEN);
                buf.put_slice(&src.octets());
                buf.put_slice(&dst.octets());
            }
        }

        buf.put_u16(self.src.port());
        buf.put_u16(self.dst.port());
        buf.freeze()
    }

    /// IPv4 when both sides are IPv4 or v4-mapped, IPv6 otherwise.
    fn family(&self) -> Family {
        match (as_v4(self.src.ip()), as_v4(self.dst.ip())) {
            (Some(src), Some(dst)) => Family::V4(src, dst),
            _ => Family::V6(as_v6(self.src.ip()), as_v6(self.dst.ip())),
        }
    }
}

enum Family {
    V4(Ipv4Addr, Ipv4Addr),
    V6(Ipv6Addr, Ipv6Addr),
}

fn as_v4(ip: IpAddr) -> Option<Ipv4Addr> {
    match ip {
        IpAddr::V4(v4) => Some(v4),
        IpAddr::V6(v6) => v6.to_ipv4_mapped(),
    }
}

fn as_v6(ip: IpAddr) -> Ipv6Addr {
    match ip {
        IpAddr::V4(v4) => v4.to_ipv6_mapped(),
        IpAddr::V6(v6) => v6,
    }
}
