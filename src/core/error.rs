use std::io;
use thiserror::Error;

/// Error types for the switcher client
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Handshake timed out")]
    HandshakeTimeout,

    #[error("Keepalive timed out")]
    KeepaliveTimeout,

    #[error("Session disconnected")]
    Disconnected,

    #[error("Framing error: {0}")]
    Framing(String),

    #[error("Encoding error: {0}")]
    Encoding(String),

    #[error("Stale reference: {0}")]
    StaleReference(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

/// Result type alias using our custom Error type
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Creates a new transport error
    pub fn transport(msg: impl Into<String>) -> Self {
        Error::Transport(msg.into())
    }

    /// Creates a new framing error
    pub fn framing(msg: impl Into<String>) -> Self {
        Error::Framing(msg.into())
    }

    /// Creates a new encoding error
    pub fn encoding(msg: impl Into<String>) -> Self {
        Error::Encoding(msg.into())
    }

    /// Creates a new stale reference error
    pub fn stale_reference(msg: impl Into<String>) -> Self {
        Error::StaleReference(msg.into())
    }

    /// Creates a new configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Error::Config(msg.into())
    }

    /// Whether this error terminates the session it occurred on.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Error::Io(_)
                | Error::Transport(_)
                | Error::HandshakeTimeout
                | Error::KeepaliveTimeout
                | Error::Disconnected
        )
    }
}
