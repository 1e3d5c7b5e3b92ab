//! Command record framing inside a packet payload.
//!
//! Each record is `u16 length | u16 reserved | [u8; 4] name | body`, where
//! `length` counts the 8-byte record header.

use std::fmt;

use bytes::{Buf, BufMut, Bytes, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::core::Error;

/// Size of the record header
pub const RECORD_HEADER_LEN: usize = 8;

/// One named command record with its still-encoded body
#[derive(Clone, PartialEq, Eq)]
pub struct RawCommand {
    pub name: [u8; 4],
    pub body: Bytes,
}

impl RawCommand {
    pub fn new(name: [u8; 4], body: impl Into<Bytes>) -> Self {
        RawCommand {
            name,
            body: body.into(),
        }
    }

    /// Name tag rendered for logs
    pub fn name_str(&self) -> std::borrow::Cow<'_, str> {
        String::from_utf8_lossy(&self.name)
    }

    /// Total encoded size including the record header
    pub fn encoded_len(&self) -> usize {
        RECORD_HEADER_LEN + self.body.len()
    }
}

impl fmt::Debug for RawCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RawCommand")
            .field("name", &self.name_str())
            .field("body_len", &self.body.len())
            .finish()
    }
}

/// Splits packet payloads into records and joins records into payloads
#[derive(Clone, Copy, Debug, Default)]
pub struct RecordCodec;

impl RecordCodec {
    pub fn new() -> Self {
        RecordCodec
    }

    /// Splits a complete payload; a record overrunning the payload is a
    /// framing error for the whole packet.
    pub fn split(&mut self, payload: &[u8]) -> Result<Vec<RawCommand>, Error> {
        let mut src = BytesMut::from(payload);
        let mut records = Vec::new();
        while let Some(record) = self.decode(&mut src)? {
            records.push(record);
        }
        if !src.is_empty() {
            return Err(Error::framing(format!(
                "{} trailing bytes after last command record",
                src.len()
            )));
        }
        Ok(records)
    }

    /// Joins records into one payload
    pub fn join<'a>(&mut self, records: impl IntoIterator<Item = &'a RawCommand>) -> Result<Bytes, Error> {
        let mut dst = BytesMut::new();
        for record in records {
            self.encode(record.clone(), &mut dst)?;
        }
        Ok(dst.freeze())
    }
}

impl Decoder for RecordCodec {
    type Item = RawCommand;
    type Error = Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if src.len() < RECORD_HEADER_LEN {
            // Need more data to read the record header
            return Ok(None);
        }

        let length = u16::from_be_bytes([src[0], src[1]]) as usize;
        if length < RECORD_HEADER_LEN {
            return Err(Error::framing(format!("record length {} below header size", length)));
        }
        if src.len() < length {
            // Need more data to read the full record
            return Ok(None);
        }

        let mut record = src.split_to(length);
        record.advance(4);
        let mut name = [0u8; 4];
        name.copy_from_slice(&record[..4]);
        record.advance(4);

        Ok(Some(RawCommand {
            name,
            body: record.freeze(),
        }))
    }
}

impl Encoder<RawCommand> for RecordCodec {
    type Error = Error;

    fn encode(&mut self, item: RawCommand, dst: &mut BytesMut) -> Result<(), Self::Error> {
        let length = item.encoded_len();
        if length > u16::MAX as usize {
            return Err(Error::encoding(format!(
                "command {} body of {} bytes is too large",
                item.name_str(),
                item.body.len()
            )));
        }
        dst.reserve(length);
        dst.put_u16(length as u16);
        dst.put_u16(0);
        dst.put_slice(&item.name);
        dst.put_slice(&item.body);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_two_records() {
        let payload = [
            0x00, 0x0c, 0x00, 0x00, b'P', b'r', b'g', b'I', 0x00, 0x00, 0x00, 0x02,
            0x00, 0x08, 0x00, 0x00, b'I', b'n', b'C', b'm',
        ];
        let records = RecordCodec::new().split(&payload).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(&records[0].name, b"PrgI");
        assert_eq!(&records[0].body[..], &[0, 0, 0, 2]);
        assert_eq!(&records[1].name, b"InCm");
        assert!(records[1].body.is_empty());
    }

    #[test]
    fn test_truncated_record_is_framing_error() {
        let payload = [0x00, 0x10, 0x00, 0x00, b'P', b'r', b'g', b'I', 0x00];
        assert!(matches!(RecordCodec::new().split(&payload), Err(Error::Framing(_))));
    }

    #[test]
    fn test_undersized_length_is_framing_error() {
        let payload = [0x00, 0x04, 0x00, 0x00, b'P', b'r', b'g', b'I'];
        assert!(matches!(RecordCodec::new().split(&payload), Err(Error::Framing(_))));
    }

    #[test]
    fn test_join_matches_wire_layout() {
        let record = RawCommand::new(*b"DCut", vec![1, 0, 0, 0]);
        let payload = RecordCodec::new().join([&record]).unwrap();
        assert_eq!(
            &payload[..],
            &[0x00, 0x0c, 0x00, 0x00, b'D', b'C', b'u', b't', 1, 0, 0, 0]
        );
        let back = RecordCodec::new().split(&payload).unwrap();
        assert_eq!(back, vec![record]);
    }
}
