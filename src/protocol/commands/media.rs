//! Media player commands.

use super::WireCommand;
use crate::core::Result;
use crate::protocol::fields::{Field, FieldValues, Layout, Wire};

/// `MPCE`: what a media player is playing out
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MediaPlayerSource {
    pub player: u8,
    /// 1 still, 2 clip
    pub source_type: u8,
    pub still_index: u8,
    pub clip_index: u8,
}

static MEDIA_PLAYER_SOURCE: Layout = Layout {
    len: 4,
    fields: &[
        Field::new("player", 0, Wire::U8),
        Field::new("source_type", 1, Wire::U8),
        Field::new("still_index", 2, Wire::U8),
        Field::new("clip_index", 3, Wire::U8),
    ],
};

impl WireCommand for MediaPlayerSource {
    const NAME: [u8; 4] = *b"MPCE";
    single_layout!(MEDIA_PLAYER_SOURCE);

    fn from_fields(f: &FieldValues) -> Result<Self> {
        Ok(MediaPlayerSource {
            player: f.u8("player")?,
            source_type: f.u8("source_type")?,
            still_index: f.u8("still_index")?,
            clip_index: f.u8("clip_index")?,
        })
    }

    fn to_fields(&self) -> FieldValues {
        FieldValues::new()
            .int("player", self.player)
            .int("source_type", self.source_type)
            .int("still_index", self.still_index)
            .int("clip_index", self.clip_index)
    }
}
