//! Tally commands. Both carry a counted list of entries and always describe
//! every source the device tallies.

use serde::{Deserialize, Serialize};

use super::WireCommand;
use crate::core::Result;
use crate::protocol::fields::{Field, FieldValues, Layout, Wire, Width};

/// Program/preview tally bits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct TallyFlags(pub u8);

impl TallyFlags {
    pub const PROGRAM: u8 = 0x01;
    pub const PREVIEW: u8 = 0x02;

    pub fn program(&self) -> bool {
        self.0 & Self::PROGRAM != 0
    }

    pub fn preview(&self) -> bool {
        self.0 & Self::PREVIEW != 0
    }
}

/// `TlIn`: tally per input index, in input order
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TallyByIndex {
    pub flags: Vec<TallyFlags>,
}

static INDEX_ENTRY: [Field; 1] = [Field::new("flags", 0, Wire::Flags(Width::U8))];

static TALLY_BY_INDEX: Layout = Layout {
    len: 2,
    fields: &[Field::new(
        "entries",
        0,
        Wire::Records {
            stride: 1,
            fields: &INDEX_ENTRY,
        },
    )],
};

impl WireCommand for TallyByIndex {
    const NAME: [u8; 4] = *b"TlIn";
    single_layout!(TALLY_BY_INDEX);

    fn from_fields(f: &FieldValues) -> Result<Self> {
        let flags = f
            .list("entries")?
            .iter()
            .map(|entry| entry.u8("flags").map(TallyFlags))
            .collect::<Result<Vec<_>>>()?;
        Ok(TallyByIndex { flags })
    }

    fn to_fields(&self) -> FieldValues {
        let entries = self
            .flags
            .iter()
            .map(|flags| FieldValues::new().int("flags", flags.0))
            .collect();
        FieldValues::new().records("entries", entries)
    }
}

/// `TlSr`: tally per source id
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TallyBySource {
    pub entries: Vec<(u16, TallyFlags)>,
}

static SOURCE_ENTRY: [Field; 2] = [
    Field::new("source", 0, Wire::U16),
    Field::new("flags", 2, Wire::Flags(Width::U8)),
];

static TALLY_BY_SOURCE: Layout = Layout {
    len: 2,
    fields: &[Field::new(
        "entries",
        0,
        Wire::Records {
            stride: 3,
            fields: &SOURCE_ENTRY,
        },
    )],
};

impl WireCommand for TallyBySource {
    const NAME: [u8; 4] = *b"TlSr";
    single_layout!(TALLY_BY_SOURCE);

    fn from_fields(f: &FieldValues) -> Result<Self> {
        let entries = f
            .list("entries")?
            .iter()
            .map(|entry| -> Result<(u16, TallyFlags)> {
                Ok((entry.u16("source")?, TallyFlags(entry.u8("flags")?)))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(TallyBySource { entries })
    }

    fn to_fields(&self) -> FieldValues {
        let entries = self
            .entries
            .iter()
            .map(|(source, flags)| FieldValues::new().int("source", *source).int("flags", flags.0))
            .collect();
        FieldValues::new().records("entries", entries)
    }
}
