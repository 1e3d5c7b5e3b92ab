use bytes::{Bytes, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use super::commands::Command;
use super::record::{RawCommand, RecordCodec};
use crate::core::{Error, ProtocolVersion, Result};

/// Typed command codec for one session.
///
/// Wraps [`RecordCodec`] and decodes each record with the negotiated
/// protocol version. The version starts at the oldest supported one and is
/// updated once the device announces its own through `_ver`.
#[derive(Clone, Debug, Default)]
pub struct CommandCodec {
    version: ProtocolVersion,
    records: RecordCodec,
}

impl CommandCodec {
    /// Creates a codec for the given protocol version
    pub fn new(version: ProtocolVersion) -> Self {
        CommandCodec {
            version,
            records: RecordCodec::new(),
        }
    }

    pub fn version(&self) -> ProtocolVersion {
        self.version
    }

    pub fn set_version(&mut self, version: ProtocolVersion) {
        self.version = version;
    }

    /// Decodes every record of one packet payload. A framing error in any
    /// record rejects the whole payload.
    ///
    /// Records after a `_ver` record are decoded with the announced version.
    /// The codec itself only switches once the whole payload decoded.
    pub fn decode_payload(&mut self, raw: &[RawCommand]) -> Result<Vec<Command>> {
        let mut version = self.version;
        let mut commands = Vec::with_capacity(raw.len());
        for record in raw {
            let command = Command::decode(version, record)?;
            if let Command::Version(v) = &command {
                version = v.version;
            }
            commands.push(command);
        }
        self.version = version;
        Ok(commands)
    }

    /// Encodes commands into one packet payload
    pub fn encode_payload<'a>(&mut self, commands: impl IntoIterator<Item = &'a Command>) -> Result<Bytes> {
        let mut dst = BytesMut::new();
        for command in commands {
            self.encode(command.clone(), &mut dst)?;
        }
        Ok(dst.freeze())
    }
}

impl Decoder for CommandCodec {
    type Item = Command;
    type Error = Error;

    fn decode(&mut self, src: &mut BytesMut) -> std::result::Result<Option<Self::Item>, Self::Error> {
        match self.records.decode(src)? {
            Some(record) => {
                let command = Command::decode(self.version, &record)?;
                if let Command::Version(v) = &command {
                    self.version = v.version;
                }
                Ok(Some(command))
            }
            None => Ok(None),
        }
    }
}

impl Encoder<Command> for CommandCodec {
    type Error = Error;

    fn encode(&mut self, item: Command, dst: &mut BytesMut) -> std::result::Result<(), Self::Error> {
        let record = item.encode(self.version)?;
        self.records.encode(record, dst)
    }
}
