use std::fmt;
use std::net::SocketAddr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Protocol version negotiated through the `_ver` command.
///
/// Encoded as `major << 16 | minor`, matching the two big-endian `u16`s the
/// device sends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ProtocolVersion(pub u32);

impl ProtocolVersion {
    /// Firmware 7.2
    pub const V7_2: ProtocolVersion = ProtocolVersion(0x0002_0016);
    /// Firmware 7.5.2
    pub const V7_5_2: ProtocolVersion = ProtocolVersion(0x0002_001B);
    /// Firmware 8.0
    pub const V8_0: ProtocolVersion = ProtocolVersion(0x0002_001C);
    /// Firmware 8.0.1
    pub const V8_0_1: ProtocolVersion = ProtocolVersion(0x0002_001D);
    /// Firmware 8.1.1
    pub const V8_1_1: ProtocolVersion = ProtocolVersion(0x0002_001E);

    /// Every version the field tables have been checked against.
    pub const SUPPORTED: [ProtocolVersion; 5] = [
        Self::V7_2,
        Self::V7_5_2,
        Self::V8_0,
        Self::V8_0_1,
        Self::V8_1_1,
    ];

    /// Builds a version from its wire halves
    pub fn new(major: u16, minor: u16) -> Self {
        ProtocolVersion(((major as u32) << 16) | minor as u32)
    }

    /// Major component
    pub fn major(&self) -> u16 {
        (self.0 >> 16) as u16
    }

    /// Minor component
    pub fn minor(&self) -> u16 {
        (self.0 & 0xFFFF) as u16
    }

    /// Whether this version is one the field tables were verified against
    pub fn is_supported(&self) -> bool {
        Self::SUPPORTED.contains(self)
    }
}

impl Default for ProtocolVersion {
    fn default() -> Self {
        Self::V7_2
    }
}

impl fmt::Display for ProtocolVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major(), self.minor())
    }
}

/// Video standard reported by `VidM`.
///
/// Kept as the raw wire byte so modes introduced by newer firmware survive a
/// round trip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct VideoMode(pub u8);

impl VideoMode {
    pub const N525I5994_4X3: VideoMode = VideoMode(0);
    pub const P625I50_4X3: VideoMode = VideoMode(1);
    pub const N525I5994_16X9: VideoMode = VideoMode(2);
    pub const P625I50_16X9: VideoMode = VideoMode(3);
    pub const P720P50: VideoMode = VideoMode(4);
    pub const N720P5994: VideoMode = VideoMode(5);
    pub const P1080I50: VideoMode = VideoMode(6);
    pub const N1080I5994: VideoMode = VideoMode(7);
    pub const N1080P2398: VideoMode = VideoMode(8);
    pub const N1080P24: VideoMode = VideoMode(9);
    pub const P1080P25: VideoMode = VideoMode(10);
    pub const N1080P2997: VideoMode = VideoMode(11);
    pub const P1080P50: VideoMode = VideoMode(12);
    pub const N1080P5994: VideoMode = VideoMode(13);
    pub const N4KHDP2398: VideoMode = VideoMode(14);
    pub const N4KHDP24: VideoMode = VideoMode(15);
    pub const P4KHDP25: VideoMode = VideoMode(16);
    pub const N4KHDP2997: VideoMode = VideoMode(17);

    /// Standard-definition modes are the four 525/625 line variants
    pub fn is_standard_definition(&self) -> bool {
        self.0 <= 3
    }

    /// Whole frames per second, rounding the fractional NTSC rates up.
    /// Interlaced modes count frames, not fields.
    pub fn frames_per_second(&self) -> u8 {
        match self.0 {
            0 | 2 | 7 | 11 | 17 => 30,
            1 | 3 | 6 | 10 | 16 => 25,
            4 | 12 => 50,
            5 | 13 => 60,
            8 | 9 | 14 | 15 => 24,
            _ => 30,
        }
    }
}

/// Geometry of a keyer mask. Edges are in the switcher's screen units.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct MaskRect {
    pub top: f64,
    pub bottom: f64,
    pub left: f64,
    pub right: f64,
}

impl MaskRect {
    /// Full-frame mask for a standard-definition raster
    pub const SD_DEFAULT: MaskRect = MaskRect {
        top: 3.0,
        bottom: -3.0,
        left: 4.0,
        right: -4.0,
    };

    /// Full-frame mask for HD and above
    pub const HD_DEFAULT: MaskRect = MaskRect {
        top: 9.0,
        bottom: -9.0,
        left: 16.0,
        right: -16.0,
    };

    /// Default mask for the given video mode
    pub fn default_for(mode: VideoMode) -> Self {
        if mode.is_standard_definition() {
            Self::SD_DEFAULT
        } else {
            Self::HD_DEFAULT
        }
    }
}

/// First media-player fill source id; player `n` (0-based) fills at
/// `3010 + 10 * n` and keys at the following id.
pub const MEDIA_PLAYER_FILL_BASE: u16 = 3010;

/// Maximum number of media players addressable through source ids
pub const MAX_MEDIA_PLAYERS: u16 = 8;

/// Returns the key source paired with a media-player fill source
pub fn media_player_key_for(fill: u16) -> Option<u16> {
    let last = MEDIA_PLAYER_FILL_BASE + 10 * (MAX_MEDIA_PLAYERS - 1);
    if (MEDIA_PLAYER_FILL_BASE..=last).contains(&fill) && fill % 10 == 0 {
        Some(fill + 1)
    } else {
        None
    }
}

/// Configuration for a switcher session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Local address to bind to
    pub bind_addr: SocketAddr,
    /// Deadline for reaching the live phase after connecting
    #[serde(serialize_with = "super::serde::serialize_duration")]
    #[serde(deserialize_with = "super::serde::deserialize_duration")]
    pub handshake_timeout: Duration,
    /// Interval between connect requests while no session id is assigned
    #[serde(serialize_with = "super::serde::serialize_duration")]
    #[serde(deserialize_with = "super::serde::deserialize_duration")]
    pub hello_interval: Duration,
    /// Silence after which an established session is considered dead
    #[serde(serialize_with = "super::serde::serialize_duration")]
    #[serde(deserialize_with = "super::serde::deserialize_duration")]
    pub keepalive_timeout: Duration,
    /// Resend period for unacknowledged outbound packets
    #[serde(serialize_with = "super::serde::serialize_duration")]
    #[serde(deserialize_with = "super::serde::deserialize_duration")]
    pub retransmit_interval: Duration,
    /// Resend attempts before giving up on the session
    pub max_retransmits: u32,
    /// Out-of-order packets held while waiting for a gap to fill
    pub reorder_window: usize,
    /// Capacity of the change broadcast channel
    pub event_capacity: usize,
    /// Socket receive buffer size requested from the OS
    pub recv_buffer_size: usize,
}

impl SessionConfig {
    /// Checks that the timing parameters are usable
    pub fn validate(&self) -> crate::core::Result<()> {
        if self.retransmit_interval.is_zero() {
            return Err(crate::core::Error::config("retransmit_interval must be non-zero"));
        }
        if self.hello_interval.is_zero() {
            return Err(crate::core::Error::config("hello_interval must be non-zero"));
        }
        if self.handshake_timeout < self.hello_interval {
            return Err(crate::core::Error::config(
                "handshake_timeout must be at least hello_interval",
            ));
        }
        if self.reorder_window == 0 || self.reorder_window >= (super::PACKET_ID_SPACE / 2) as usize {
            return Err(crate::core::Error::config(
                "reorder_window must be between 1 and half the packet id space",
            ));
        }
        if self.event_capacity == 0 {
            return Err(crate::core::Error::config("event_capacity must be non-zero"));
        }
        Ok(())
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        SessionConfig {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 0)),
            handshake_timeout: Duration::from_secs(5),
            hello_interval: Duration::from_secs(1),
            keepalive_timeout: Duration::from_secs(5),
            retransmit_interval: Duration::from_millis(200),
            max_retransmits: 10,
            reorder_window: 64,
            event_capacity: 256,
            recv_buffer_size: 256 * 1024,
        }
    }
}
