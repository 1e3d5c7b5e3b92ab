//! Wire protocol module
//!
//! Packet headers, command record framing, the versioned field tables and
//! the typed commands built on them. Everything here is pure: no sockets,
//! no timers.

pub mod codec;
pub mod commands;
pub mod fields;
pub mod packet;
pub mod record;

pub use self::codec::CommandCodec;
pub use self::commands::{decode, encode, Command, UnrecognizedCommand, WireCommand};
pub use self::packet::{ConnectCode, Packet, PacketFlags, PacketHeader, HEADER_LEN};
pub use self::record::{RawCommand, RecordCodec};
