//! Super-source art and box commands.
//!
//! Firmware 8.0 added a leading super-source index to both bodies so that
//! devices with more than one super-source can address them. Older bodies
//! always refer to super-source 0.

use bytes::Bytes;

use super::keyer::{HUE_TENTHS, PERCENT_TENTHS};
use super::WireCommand;
use crate::core::{Error, ProtocolVersion, Result};
use crate::protocol::fields::{resolve, scaled, Field, FieldValues, Layout, VersionedLayout, Wire, Width};

fn check_index(name: &str, super_source: u8, version: ProtocolVersion) -> Result<()> {
    if super_source != 0 && version < ProtocolVersion::V8_0 {
        return Err(Error::encoding(format!(
            "{} for super-source {} needs protocol 2.28 or later, session is {}",
            name, super_source, version
        )));
    }
    Ok(())
}

/// `SSrc`: art fill/key and border
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SuperSourceProperties {
    pub super_source: u8,
    pub fill_source: u16,
    pub key_source: u16,
    /// 0 background, 1 foreground
    pub art_option: u8,
    pub pre_multiplied: bool,
    pub clip: f64,
    pub gain: f64,
    pub invert: bool,
    pub border_enabled: bool,
    pub border_hue: f64,
    pub border_saturation: f64,
    pub border_luma: f64,
}

static PROPERTIES_V7: Layout = Layout {
    len: 20,
    fields: &[
        Field::new("fill_source", 0, Wire::U16),
        Field::new("key_source", 2, Wire::U16),
        Field::new("art_option", 4, Wire::U8),
        Field::new("pre_multiplied", 5, Wire::Bool),
        Field::new("clip", 6, PERCENT_TENTHS),
        Field::new("gain", 8, PERCENT_TENTHS),
        Field::new("invert", 10, Wire::Bool),
        Field::new("border_enabled", 11, Wire::Bool),
        Field::new("border_hue", 12, HUE_TENTHS),
        Field::new("border_saturation", 14, PERCENT_TENTHS),
        Field::new("border_luma", 16, PERCENT_TENTHS),
    ],
};

static PROPERTIES_V8: Layout = Layout {
    len: 24,
    fields: &[
        Field::new("super_source", 0, Wire::U8),
        Field::new("fill_source", 4, Wire::U16),
        Field::new("key_source", 6, Wire::U16),
        Field::new("art_option", 8, Wire::U8),
        Field::new("pre_multiplied", 9, Wire::Bool),
        Field::new("clip", 10, PERCENT_TENTHS),
        Field::new("gain", 12, PERCENT_TENTHS),
        Field::new("invert", 14, Wire::Bool),
        Field::new("border_enabled", 15, Wire::Bool),
        Field::new("border_hue", 16, HUE_TENTHS),
        Field::new("border_saturation", 18, PERCENT_TENTHS),
        Field::new("border_luma", 20, PERCENT_TENTHS),
    ],
};

impl WireCommand for SuperSourceProperties {
    const NAME: [u8; 4] = *b"SSrc";

    fn layouts() -> &'static [VersionedLayout] {
        static TABLE: [VersionedLayout; 2] = [
            VersionedLayout {
                since: ProtocolVersion::V7_2,
                layout: &PROPERTIES_V7,
            },
            VersionedLayout {
                since: ProtocolVersion::V8_0,
                layout: &PROPERTIES_V8,
            },
        ];
        &TABLE
    }

    fn from_fields(f: &FieldValues) -> Result<Self> {
        Ok(SuperSourceProperties {
            super_source: f.opt_u8("super_source")?.unwrap_or(0),
            fill_source: f.u16("fill_source")?,
            key_source: f.u16("key_source")?,
            art_option: f.u8("art_option")?,
            pre_multiplied: f.bool("pre_multiplied")?,
            clip: f.f64("clip")?,
            gain: f.f64("gain")?,
            invert: f.bool("invert")?,
            border_enabled: f.bool("border_enabled")?,
            border_hue: f.f64("border_hue")?,
            border_saturation: f.f64("border_saturation")?,
            border_luma: f.f64("border_luma")?,
        })
    }

    fn to_fields(&self) -> FieldValues {
        FieldValues::new()
            .int("super_source", self.super_source)
            .int("fill_source", self.fill_source)
            .int("key_source", self.key_source)
            .int("art_option", self.art_option)
            .boolean("pre_multiplied", self.pre_multiplied)
            .float("clip", self.clip)
            .float("gain", self.gain)
            .boolean("invert", self.invert)
            .boolean("border_enabled", self.border_enabled)
            .float("border_hue", self.border_hue)
            .float("border_saturation", self.border_saturation)
            .float("border_luma", self.border_luma)
    }

    fn encode_body(&self, version: ProtocolVersion) -> Result<Bytes> {
        check_index("SSrc", self.super_source, version)?;
        let mut fields = self.to_fields();
        if version < ProtocolVersion::V8_0 {
            fields = fields.without("super_source");
        }
        resolve(Self::layouts(), version)?.encode(&fields)
    }
}

/// `SSBP`: one super-source box. Position is in screen units, size and
/// crop are fractions of the frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SuperSourceBox {
    pub super_source: u8,
    pub index: u8,
    pub enabled: bool,
    pub source: u16,
    pub x: f64,
    pub y: f64,
    pub size: f64,
    pub cropped: bool,
    pub crop_top: f64,
    pub crop_bottom: f64,
    pub crop_left: f64,
    pub crop_right: f64,
}

const BOX_X: Wire = scaled(Width::I16, 100.0, -48.0, 48.0);
const BOX_Y: Wire = scaled(Width::I16, 100.0, -27.0, 27.0);
const BOX_SIZE: Wire = scaled(Width::U16, 1000.0, 0.07, 1.0);
const CROP_VERTICAL: Wire = scaled(Width::U16, 1000.0, 0.0, 18.0);
const CROP_HORIZONTAL: Wire = scaled(Width::U16, 1000.0, 0.0, 32.0);

static BOX_V7: Layout = Layout {
    len: 20,
    fields: &[
        Field::new("index", 0, Wire::U8),
        Field::new("enabled", 1, Wire::Bool),
        Field::new("source", 2, Wire::U16),
        Field::new("x", 4, BOX_X),
        Field::new("y", 6, BOX_Y),
        Field::new("size", 8, BOX_SIZE),
        Field::new("cropped", 10, Wire::Bool),
        Field::new("crop_top", 12, CROP_VERTICAL),
        Field::new("crop_bottom", 14, CROP_VERTICAL),
        Field::new("crop_left", 16, CROP_HORIZONTAL),
        Field::new("crop_right", 18, CROP_HORIZONTAL),
    ],
};

static BOX_V8: Layout = Layout {
    len: 24,
    fields: &[
        Field::new("super_source", 0, Wire::U8),
        Field::new("index", 1, Wire::U8),
        Field::new("enabled", 2, Wire::Bool),
        Field::new("source", 4, Wire::U16),
        Field::new("x", 6, BOX_X),
        Field::new("y", 8, BOX_Y),
        Field::new("size", 10, BOX_SIZE),
        Field::new("cropped", 12, Wire::Bool),
        Field::new("crop_top", 14, CROP_VERTICAL),
        Field::new("crop_bottom", 16, CROP_VERTICAL),
        Field::new("crop_left", 18, CROP_HORIZONTAL),
        Field::new("crop_right", 20, CROP_HORIZONTAL),
    ],
};

impl WireCommand for SuperSourceBox {
    const NAME: [u8; 4] = *b"SSBP";

    fn layouts() -> &'static [VersionedLayout] {
        static TABLE: [VersionedLayout; 2] = [
            VersionedLayout {
                since: ProtocolVersion::V7_2,
                layout: &BOX_V7,
            },
            VersionedLayout {
                since: ProtocolVersion::V8_0,
                layout: &BOX_V8,
            },
        ];
        &TABLE
    }

    fn from_fields(f: &FieldValues) -> Result<Self> {
        Ok(SuperSourceBox {
            super_source: f.opt_u8("super_source")?.unwrap_or(0),
            index: f.u8("index")?,
            enabled: f.bool("enabled")?,
            source: f.u16("source")?,
            x: f.f64("x")?,
            y: f.f64("y")?,
            size: f.f64("size")?,
            cropped: f.bool("cropped")?,
            crop_top: f.f64("crop_top")?,
            crop_bottom: f.f64("crop_bottom")?,
            crop_left: f.f64("crop_left")?,
            crop_right: f.f64("crop_right")?,
        })
    }

    fn to_fields(&self) -> FieldValues {
        FieldValues::new()
            .int("super_source", self.super_source)
            .int("index", self.index)
            .boolean("enabled", self.enabled)
            .int("source", self.source)
            .float("x", self.x)
            .float("y", self.y)
            .float("size", self.size)
            .boolean("cropped", self.cropped)
            .float("crop_top", self.crop_top)
            .float("crop_bottom", self.crop_bottom)
            .float("crop_left", self.crop_left)
            .float("crop_right", self.crop_right)
    }

    fn encode_body(&self, version: ProtocolVersion) -> Result<Bytes> {
        check_index("SSBP", self.super_source, version)?;
        let mut fields = self.to_fields();
        if version < ProtocolVersion::V8_0 {
            fields = fields.without("super_source");
        }
        resolve(Self::layouts(), version)?.encode(&fields)
    }
}
