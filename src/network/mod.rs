//! Network session module
//!
//! The reliable transport is split in two: [`SessionMachine`] holds all
//! sequencing, acknowledgement and timer state without touching a socket,
//! and [`Session`] drives it from a tokio task over a [`DatagramSocket`].

pub mod client;
pub mod session;
pub mod socket;

pub use self::client::{PendingAck, Session, StateChange};
pub use self::session::{DisconnectReason, Phase, SessionAction, SessionEvent, SessionMachine};
pub use self::socket::{DatagramSocket, MemorySocket, UdpDatagramSocket};
