//! Macro pool commands.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use super::WireCommand;
use crate::core::{Error, ProtocolVersion, Result};
use crate::protocol::fields::{Field, FieldValues, Layout, Wire, Width};

/// `MPrp`: one macro slot.
///
/// The body carries two length-prefixed strings, so it is coded by hand:
/// `u16 index | u8 used | u8 unsupported ops | u16 name len | u16 desc len |
/// name | description`, zero-padded to a 4-byte boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MacroProperties {
    pub index: u16,
    pub is_used: bool,
    pub has_unsupported_ops: bool,
    pub name: String,
    pub description: String,
}

const MACRO_PROPERTIES_FIXED: usize = 8;

impl WireCommand for MacroProperties {
    const NAME: [u8; 4] = *b"MPrp";

    fn decode_body(_version: ProtocolVersion, body: &[u8]) -> Result<Self> {
        if body.len() < MACRO_PROPERTIES_FIXED {
            return Err(Error::framing(format!(
                "body of {} bytes shorter than the fixed part",
                body.len()
            )));
        }
        let mut buf = body;
        let index = buf.get_u16();
        let is_used = buf.get_u8() != 0;
        let has_unsupported_ops = buf.get_u8() != 0;
        let name_len = buf.get_u16() as usize;
        let description_len = buf.get_u16() as usize;
        if buf.remaining() < name_len + description_len {
            return Err(Error::framing(format!(
                "strings of {} bytes overrun body of {}",
                name_len + description_len,
                body.len()
            )));
        }
        let name = String::from_utf8_lossy(&buf[..name_len]).into_owned();
        buf.advance(name_len);
        let description = String::from_utf8_lossy(&buf[..description_len]).into_owned();

        Ok(MacroProperties {
            index,
            is_used,
            has_unsupported_ops,
            name,
            description,
        })
    }

    fn encode_body(&self, _version: ProtocolVersion) -> Result<Bytes> {
        for (field, text) in [("name", &self.name), ("description", &self.description)] {
            if text.len() > u16::MAX as usize {
                return Err(Error::encoding(format!("macro {} of {} bytes is too long", field, text.len())));
            }
        }
        let unpadded = MACRO_PROPERTIES_FIXED + self.name.len() + self.description.len();
        let mut dst = BytesMut::with_capacity(unpadded + 3);
        dst.put_u16(self.index);
        dst.put_u8(self.is_used as u8);
        dst.put_u8(self.has_unsupported_ops as u8);
        dst.put_u16(self.name.len() as u16);
        dst.put_u16(self.description.len() as u16);
        dst.put_slice(self.name.as_bytes());
        dst.put_slice(self.description.as_bytes());
        dst.resize((unpadded + 3) & !3, 0);
        Ok(dst.freeze())
    }
}

const RUNNING: u8 = 0x01;
const WAITING: u8 = 0x02;

/// `MRPr`: macro playback status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MacroRunStatus {
    pub is_running: bool,
    pub is_waiting: bool,
    pub loop_enabled: bool,
    /// Running macro; 0xffff when idle
    pub index: u16,
}

static MACRO_RUN_STATUS: Layout = Layout {
    len: 4,
    fields: &[
        Field::new("status", 0, Wire::Flags(Width::U8)),
        Field::new("loop", 1, Wire::Bool),
        Field::new("index", 2, Wire::U16),
    ],
};

impl WireCommand for MacroRunStatus {
    const NAME: [u8; 4] = *b"MRPr";
    single_layout!(MACRO_RUN_STATUS);

    fn from_fields(f: &FieldValues) -> Result<Self> {
        let status = f.u8("status")?;
        Ok(MacroRunStatus {
            is_running: status & RUNNING != 0,
            is_waiting: status & WAITING != 0,
            loop_enabled: f.bool("loop")?,
            index: f.u16("index")?,
        })
    }

    fn to_fields(&self) -> FieldValues {
        let mut status = 0u8;
        if self.is_running {
            status |= RUNNING;
        }
        if self.is_waiting {
            status |= WAITING;
        }
        FieldValues::new()
            .int("status", status)
            .boolean("loop", self.loop_enabled)
            .int("index", self.index)
    }
}

/// What [`MacroAction`] asks the device to do
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MacroActionKind {
    Run,
    Stop,
    StopRecording,
    InsertUserWait,
    Continue,
    Delete,
}

impl From<MacroActionKind> for u8 {
    fn from(kind: MacroActionKind) -> u8 {
        match kind {
            MacroActionKind::Run => 0,
            MacroActionKind::Stop => 1,
            MacroActionKind::StopRecording => 2,
            MacroActionKind::InsertUserWait => 3,
            MacroActionKind::Continue => 4,
            MacroActionKind::Delete => 5,
        }
    }
}

impl TryFrom<u8> for MacroActionKind {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            0 => Ok(MacroActionKind::Run),
            1 => Ok(MacroActionKind::Stop),
            2 => Ok(MacroActionKind::StopRecording),
            3 => Ok(MacroActionKind::InsertUserWait),
            4 => Ok(MacroActionKind::Continue),
            5 => Ok(MacroActionKind::Delete),
            other => Err(Error::framing(format!("unknown macro action {}", other))),
        }
    }
}

/// `MAct`: run, stop or edit a macro. Stop and continue ignore the index;
/// the device expects 0xffff there.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MacroAction {
    pub index: u16,
    pub action: MacroActionKind,
}

static MACRO_ACTION: Layout = Layout {
    len: 4,
    fields: &[
        Field::new("index", 0, Wire::U16),
        Field::new("action", 2, Wire::U8),
    ],
};

impl WireCommand for MacroAction {
    const NAME: [u8; 4] = *b"MAct";
    single_layout!(MACRO_ACTION);

    fn from_fields(f: &FieldValues) -> Result<Self> {
        Ok(MacroAction {
            index: f.u16("index")?,
            action: MacroActionKind::try_from(f.u8("action")?)?,
        })
    }

    fn to_fields(&self) -> FieldValues {
        FieldValues::new()
            .int("index", self.index)
            .int("action", u8::from(self.action))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::commands::test_support::{assert_layouts_consistent, assert_round_trip};
    use crate::protocol::commands::Command;
    use crate::protocol::record::RawCommand;

    #[test]
    fn test_properties_layout() {
        let macro_slot = MacroProperties {
            index: 2,
            is_used: true,
            has_unsupported_ops: false,
            name: "Intro".into(),
            description: "ab".into(),
        };
        let raw = Command::from(macro_slot.clone()).encode(ProtocolVersion::V8_0).unwrap();
        assert_eq!(
            &raw.body[..],
            &[0, 2, 1, 0, 0, 5, 0, 2, b'I', b'n', b't', b'r', b'o', b'a', b'b', 0]
        );
        assert_eq!(
            Command::decode(ProtocolVersion::V8_0, &raw).unwrap(),
            Command::MacroProperties(macro_slot)
        );
    }

    #[test]
    fn test_properties_overrun() {
        let raw = RawCommand::new(*b"MPrp", vec![0, 2, 1, 0, 0, 9, 0, 0, b'x']);
        assert!(matches!(
            Command::decode(ProtocolVersion::V7_2, &raw),
            Err(Error::Framing(_))
        ));
    }

    #[test]
    fn test_unknown_action_is_framing_error() {
        let raw = RawCommand::new(*b"MAct", vec![0, 1, 9, 0]);
        assert!(matches!(
            Command::decode(ProtocolVersion::V8_0, &raw),
            Err(Error::Framing(_))
        ));
    }

    #[test]
    fn test_round_trips() {
        assert_layouts_consistent(MacroRunStatus::layouts());
        assert_layouts_consistent(MacroAction::layouts());
        for version in ProtocolVersion::SUPPORTED {
            for name in ["", "A", "Four", "Opening titles"] {
                assert_round_trip(
                    MacroProperties {
                        index: 99,
                        is_used: !name.is_empty(),
                        has_unsupported_ops: true,
                        name: name.into(),
                        description: String::new(),
                    }
                    .into(),
                    version,
                );
            }
            assert_round_trip(
                MacroRunStatus {
                    is_running: true,
                    is_waiting: true,
                    loop_enabled: false,
                    index: 4,
                }
                .into(),
                version,
            );
            for action in [
                MacroActionKind::Run,
                MacroActionKind::Stop,
                MacroActionKind::StopRecording,
                MacroActionKind::InsertUserWait,
                MacroActionKind::Continue,
                MacroActionKind::Delete,
            ] {
                assert_round_trip(MacroAction { index: 0xffff, action }.into(), version);
            }
        }
    }
}
