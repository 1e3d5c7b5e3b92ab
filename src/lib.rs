//! switcher_link: client for the UDP control protocol of live-production video switchers
//!
//! This library opens a reliable session to a switcher over UDP, decodes the
//! device's versioned command stream into a typed state tree, reports which
//! parts of that tree each command touched, and derives a capability profile
//! from the initial state dump.
pub mod core;
pub mod network;
pub mod profile;
pub mod protocol;
pub mod state;
pub mod util;

// Re-export commonly used items
pub use crate::core::{Error, ProtocolVersion, Result, SessionConfig, DEFAULT_PORT};
pub use crate::network::{DisconnectReason, Phase, Session, StateChange};
pub use crate::profile::{AudioMixerKind, DeviceProfile};
pub use crate::protocol::{Command, CommandCodec};
pub use crate::state::{ChangedPaths, DeviceState, StatePath};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
