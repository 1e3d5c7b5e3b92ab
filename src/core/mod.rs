//! Core types and traits for the switcher protocol
//!
//! This module contains the fundamental building blocks used throughout the library.

pub mod error;
pub mod serde;
pub mod types;

pub use self::error::{Error, Result};
pub use self::types::{
    media_player_key_for,
    MaskRect,
    ProtocolVersion,
    SessionConfig,
    VideoMode,
};

/// Default UDP port of the switcher control service
pub const DEFAULT_PORT: u16 = 9910;

/// Maximum datagram size the device sends or accepts
pub const MAX_PACKET_SIZE: usize = 1500;

/// Packet ids are 15 bits wide and wrap at this value
pub const PACKET_ID_SPACE: u16 = 0x8000;
