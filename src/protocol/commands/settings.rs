//! Video mode and multiviewer settings.

use super::WireCommand;
use crate::core::{ProtocolVersion, Result, VideoMode};
use crate::protocol::fields::{Field, FieldValues, Layout, VersionedLayout, Wire, Width};

static MODE: Layout = Layout {
    len: 4,
    fields: &[Field::new("mode", 0, Wire::U8)],
};

/// `VidM`: current video mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VideoModeGet {
    pub mode: VideoMode,
}

impl WireCommand for VideoModeGet {
    const NAME: [u8; 4] = *b"VidM";
    single_layout!(MODE);

    fn from_fields(f: &FieldValues) -> Result<Self> {
        Ok(VideoModeGet {
            mode: VideoMode(f.u8("mode")?),
        })
    }

    fn to_fields(&self) -> FieldValues {
        FieldValues::new().int("mode", self.mode.0)
    }
}

/// `CVdM`: change the video mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SetVideoMode {
    pub mode: VideoMode,
}

impl WireCommand for SetVideoMode {
    const NAME: [u8; 4] = *b"CVdM";
    single_layout!(MODE);

    fn from_fields(f: &FieldValues) -> Result<Self> {
        Ok(SetVideoMode {
            mode: VideoMode(f.u8("mode")?),
        })
    }

    fn to_fields(&self) -> FieldValues {
        FieldValues::new().int("mode", self.mode.0)
    }
}

/// `MvPr`: multiviewer layout and program/preview swap
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MultiViewerProperties {
    pub multiviewer: u8,
    pub layout: u8,
    pub program_preview_swapped: bool,
}

static MULTIVIEWER_PROPERTIES: Layout = Layout {
    len: 4,
    fields: &[
        Field::new("multiviewer", 0, Wire::U8),
        Field::new("layout", 1, Wire::U8),
        Field::new("program_preview_swapped", 2, Wire::Bool),
    ],
};

impl WireCommand for MultiViewerProperties {
    const NAME: [u8; 4] = *b"MvPr";
    single_layout!(MULTIVIEWER_PROPERTIES);

    fn from_fields(f: &FieldValues) -> Result<Self> {
        Ok(MultiViewerProperties {
            multiviewer: f.u8("multiviewer")?,
            layout: f.u8("layout")?,
            program_preview_swapped: f.bool("program_preview_swapped")?,
        })
    }

    fn to_fields(&self) -> FieldValues {
        FieldValues::new()
            .int("multiviewer", self.multiviewer)
            .int("layout", self.layout)
            .boolean("program_preview_swapped", self.program_preview_swapped)
    }
}

/// `MvIn`: source routed to one multiviewer window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MultiViewerWindow {
    pub multiviewer: u8,
    pub window: u8,
    pub source: u16,
    pub supports_vu_meter: bool,
    /// From 8.0
    pub supports_safe_area: Option<bool>,
}

static MULTIVIEWER_WINDOW_V7: Layout = Layout {
    len: 8,
    fields: &[
        Field::new("multiviewer", 0, Wire::U8),
        Field::new("window", 1, Wire::U8),
        Field::new("source", 2, Wire::U16),
        Field::new("supports_vu_meter", 4, Wire::Bool),
    ],
};

static MULTIVIEWER_WINDOW_V8: Layout = Layout {
    len: 8,
    fields: &[
        Field::new("multiviewer", 0, Wire::U8),
        Field::new("window", 1, Wire::U8),
        Field::new("source", 2, Wire::U16),
        Field::new("supports_vu_meter", 4, Wire::Bool),
        Field::new("supports_safe_area", 5, Wire::Bool),
    ],
};

impl WireCommand for MultiViewerWindow {
    const NAME: [u8; 4] = *b"MvIn";

    fn layouts() -> &'static [VersionedLayout] {
        static TABLE: [VersionedLayout; 2] = [
            VersionedLayout {
                since: ProtocolVersion::V7_2,
                layout: &MULTIVIEWER_WINDOW_V7,
            },
            VersionedLayout {
                since: ProtocolVersion::V8_0,
                layout: &MULTIVIEWER_WINDOW_V8,
            },
        ];
        &TABLE
    }

    fn from_fields(f: &FieldValues) -> Result<Self> {
        Ok(MultiViewerWindow {
            multiviewer: f.u8("multiviewer")?,
            window: f.u8("window")?,
            source: f.u16("source")?,
            supports_vu_meter: f.bool("supports_vu_meter")?,
            supports_safe_area: f.opt_bool("supports_safe_area")?,
        })
    }

    fn to_fields(&self) -> FieldValues {
        FieldValues::new()
            .int("multiviewer", self.multiviewer)
            .int("window", self.window)
            .int("source", self.source)
            .boolean("supports_vu_meter", self.supports_vu_meter)
            .maybe_boolean("supports_safe_area", self.supports_safe_area)
    }
}

const CHANGE_LAYOUT: u8 = 0x01;
const CHANGE_SWAP: u8 = 0x02;

/// `CMvP`: change multiviewer properties; `None` fields are left alone
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SetMultiViewerProperties {
    pub multiviewer: u8,
    pub layout: Option<u8>,
    pub program_preview_swapped: Option<bool>,
}

static SET_MULTIVIEWER_PROPERTIES: Layout = Layout {
    len: 4,
    fields: &[
        Field::new("mask", 0, Wire::Flags(Width::U8)),
        Field::new("multiviewer", 1, Wire::U8),
        Field::new("layout", 2, Wire::U8),
        Field::new("program_preview_swapped", 3, Wire::Bool),
    ],
};

impl WireCommand for SetMultiViewerProperties {
    const NAME: [u8; 4] = *b"CMvP";
    single_layout!(SET_MULTIVIEWER_PROPERTIES);

    fn from_fields(f: &FieldValues) -> Result<Self> {
        let mask = f.u8("mask")?;
        Ok(SetMultiViewerProperties {
            multiviewer: f.u8("multiviewer")?,
            layout: if mask & CHANGE_LAYOUT != 0 {
                Some(f.u8("layout")?)
            } else {
                None
            },
            program_preview_swapped: if mask & CHANGE_SWAP != 0 {
                Some(f.bool("program_preview_swapped")?)
            } else {
                None
            },
        })
    }

    fn to_fields(&self) -> FieldValues {
        let mut mask = 0u8;
        if self.layout.is_some() {
            mask |= CHANGE_LAYOUT;
        }
        if self.program_preview_swapped.is_some() {
            mask |= CHANGE_SWAP;
        }
        FieldValues::new()
            .int("mask", mask)
            .int("multiviewer", self.multiviewer)
            .int("layout", self.layout.unwrap_or(0))
            .boolean("program_preview_swapped", self.program_preview_swapped.unwrap_or(false))
    }
}
