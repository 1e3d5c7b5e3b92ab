//! Datagram header layout.
//!
//! ```text
//! 0      2           4        6             8          10          12
//! | flags|len | session | ack id | resend from | reserved | packet id | payload...
//! ```
//!
//! The first word packs five flag bits above an 11-bit datagram length.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::core::{Error, Result, PACKET_ID_SPACE};

/// Size of the fixed packet header in bytes
pub const HEADER_LEN: usize = 12;

/// Size of the connect payload carried by hello packets
pub const HELLO_PAYLOAD_LEN: usize = 8;

const LENGTH_MASK: u16 = 0x07FF;

/// Packet flag bits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PacketFlags(pub u8);

impl PacketFlags {
    pub const ACK_REQUEST: PacketFlags = PacketFlags(0x01);
    pub const HELLO: PacketFlags = PacketFlags(0x02);
    pub const RETRANSMIT: PacketFlags = PacketFlags(0x04);
    pub const RETRANSMIT_REQUEST: PacketFlags = PacketFlags(0x08);
    pub const ACK_REPLY: PacketFlags = PacketFlags(0x10);

    pub fn empty() -> Self {
        PacketFlags(0)
    }

    pub fn contains(&self, other: PacketFlags) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn insert(&mut self, other: PacketFlags) {
        self.0 |= other.0;
    }
}

impl std::ops::BitOr for PacketFlags {
    type Output = PacketFlags;

    fn bitor(self, rhs: PacketFlags) -> PacketFlags {
        PacketFlags(self.0 | rhs.0)
    }
}

/// Connect codes carried in the first byte of a hello payload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectCode {
    Request,
    Accepted,
    Refused,
    Disconnect,
    Other(u8),
}

impl From<u8> for ConnectCode {
    fn from(value: u8) -> Self {
        match value {
            0x01 => ConnectCode::Request,
            0x02 => ConnectCode::Accepted,
            0x03 => ConnectCode::Refused,
            0x04 => ConnectCode::Disconnect,
            other => ConnectCode::Other(other),
        }
    }
}

impl From<ConnectCode> for u8 {
    fn from(code: ConnectCode) -> u8 {
        match code {
            ConnectCode::Request => 0x01,
            ConnectCode::Accepted => 0x02,
            ConnectCode::Refused => 0x03,
            ConnectCode::Disconnect => 0x04,
            ConnectCode::Other(other) => other,
        }
    }
}

/// Decoded packet header
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PacketHeader {
    pub flags: PacketFlags,
    /// Total datagram length including the header
    pub length: u16,
    pub session_id: u16,
    pub ack_id: u16,
    pub resend_from: u16,
    pub packet_id: u16,
}

impl PacketHeader {
    /// Parses the header from the start of a datagram
    pub fn parse(datagram: &[u8]) -> Result<Self> {
        if datagram.len() < HEADER_LEN {
            return Err(Error::framing(format!(
                "datagram of {} bytes is shorter than the header",
                datagram.len()
            )));
        }
        let mut buf = &datagram[..HEADER_LEN];
        let word = buf.get_u16();
        let header = PacketHeader {
            flags: PacketFlags((word >> 11) as u8),
            length: word & LENGTH_MASK,
            session_id: buf.get_u16(),
            ack_id: buf.get_u16(),
            resend_from: buf.get_u16(),
            packet_id: {
                buf.advance(2);
                buf.get_u16()
            },
        };

        if header.length as usize != datagram.len() {
            return Err(Error::framing(format!(
                "header length {} does not match datagram length {}",
                header.length,
                datagram.len()
            )));
        }
        if header.packet_id >= PACKET_ID_SPACE
            || header.ack_id >= PACKET_ID_SPACE
            || header.resend_from >= PACKET_ID_SPACE
        {
            return Err(Error::framing("packet id outside the 15-bit id space"));
        }
        Ok(header)
    }

    /// Writes the header; `length` must already account for the payload
    pub fn write(&self, dst: &mut BytesMut) {
        dst.put_u16(((self.flags.0 as u16) << 11) | (self.length & LENGTH_MASK));
        dst.put_u16(self.session_id);
        dst.put_u16(self.ack_id);
        dst.put_u16(self.resend_from);
        dst.put_u16(0);
        dst.put_u16(self.packet_id);
    }
}

/// A full datagram: header plus raw payload (zero or more command records,
/// or the connect payload for hello packets)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    pub header: PacketHeader,
    pub payload: Bytes,
}

impl Packet {
    /// Splits a datagram into header and payload
    pub fn decode(datagram: &[u8]) -> Result<Self> {
        let header = PacketHeader::parse(datagram)?;
        Ok(Packet {
            header,
            payload: Bytes::copy_from_slice(&datagram[HEADER_LEN..]),
        })
    }

    /// Serializes the packet, filling in the header length
    pub fn encode(&self) -> Result<Bytes> {
        let total = HEADER_LEN + self.payload.len();
        if total > LENGTH_MASK as usize {
            return Err(Error::encoding(format!(
                "packet of {} bytes exceeds the 11-bit length field",
                total
            )));
        }
        let mut dst = BytesMut::with_capacity(total);
        let header = PacketHeader {
            length: total as u16,
            ..self.header
        };
        header.write(&mut dst);
        dst.extend_from_slice(&self.payload);
        Ok(dst.freeze())
    }

    /// Builds a hello packet carrying a connect code
    pub fn hello(session_id: u16, code: ConnectCode) -> Self {
        let mut payload = BytesMut::zeroed(HELLO_PAYLOAD_LEN);
        payload[0] = code.into();
        Packet {
            header: PacketHeader {
                flags: PacketFlags::HELLO,
                session_id,
                ..PacketHeader::default()
            },
            payload: payload.freeze(),
        }
    }

    /// Builds a bare acknowledgement of `ack_id`
    pub fn ack(session_id: u16, ack_id: u16) -> Self {
        Packet {
            header: PacketHeader {
                flags: PacketFlags::ACK_REPLY,
                session_id,
                ack_id,
                ..PacketHeader::default()
            },
            payload: Bytes::new(),
        }
    }

    /// Builds a request for the peer to resend everything from `from`
    pub fn retransmit_request(session_id: u16, from: u16) -> Self {
        Packet {
            header: PacketHeader {
                flags: PacketFlags::RETRANSMIT_REQUEST,
                session_id,
                resend_from: from,
                ..PacketHeader::default()
            },
            payload: Bytes::new(),
        }
    }

    /// Connect code of a hello packet, if the payload carries one
    pub fn connect_code(&self) -> Option<ConnectCode> {
        if !self.header.flags.contains(PacketFlags::HELLO) {
            return None;
        }
        self.payload.first().map(|b| ConnectCode::from(*b))
    }
}
