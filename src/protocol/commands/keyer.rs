//! Upstream keyer commands.

use super::WireCommand;
use crate::core::{MaskRect, Result};
use crate::protocol::fields::{scaled, Field, FieldValues, Layout, Wire, Width};

/// Vertical mask edge, screen units at 1/1000
pub(crate) const MASK_VERTICAL: Wire = scaled(Width::I16, 1000.0, -9.0, 9.0);
/// Horizontal mask edge, screen units at 1/1000
pub(crate) const MASK_HORIZONTAL: Wire = scaled(Width::I16, 1000.0, -16.0, 16.0);
/// Percentage at 1/10
pub(crate) const PERCENT_TENTHS: Wire = scaled(Width::U16, 10.0, 0.0, 100.0);

pub(crate) fn mask_from_fields(f: &FieldValues) -> Result<MaskRect> {
    Ok(MaskRect {
        top: f.f64("mask_top")?,
        bottom: f.f64("mask_bottom")?,
        left: f.f64("mask_left")?,
        right: f.f64("mask_right")?,
    })
}

pub(crate) fn mask_to_fields(values: FieldValues, mask: &MaskRect) -> FieldValues {
    values
        .float("mask_top", mask.top)
        .float("mask_bottom", mask.bottom)
        .float("mask_left", mask.left)
        .float("mask_right", mask.right)
}

/// `KeOn`: keyer on-air state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyerOnAir {
    pub mix_effect: u8,
    pub keyer: u8,
    pub on_air: bool,
}

static ON_AIR: Layout = Layout {
    len: 4,
    fields: &[
        Field::new("mix_effect", 0, Wire::U8),
        Field::new("keyer", 1, Wire::U8),
        Field::new("on_air", 2, Wire::Bool),
    ],
};

impl WireCommand for KeyerOnAir {
    const NAME: [u8; 4] = *b"KeOn";
    single_layout!(ON_AIR);

    fn from_fields(f: &FieldValues) -> Result<Self> {
        Ok(KeyerOnAir {
            mix_effect: f.u8("mix_effect")?,
            keyer: f.u8("keyer")?,
            on_air: f.bool("on_air")?,
        })
    }

    fn to_fields(&self) -> FieldValues {
        FieldValues::new()
            .int("mix_effect", self.mix_effect)
            .int("keyer", self.keyer)
            .boolean("on_air", self.on_air)
    }
}

/// `CKOn`: put a keyer on or off air
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SetKeyerOnAir {
    pub mix_effect: u8,
    pub keyer: u8,
    pub on_air: bool,
}

impl WireCommand for SetKeyerOnAir {
    const NAME: [u8; 4] = *b"CKOn";
    single_layout!(ON_AIR);

    fn from_fields(f: &FieldValues) -> Result<Self> {
        Ok(SetKeyerOnAir {
            mix_effect: f.u8("mix_effect")?,
            keyer: f.u8("keyer")?,
            on_air: f.bool("on_air")?,
        })
    }

    fn to_fields(&self) -> FieldValues {
        FieldValues::new()
            .int("mix_effect", self.mix_effect)
            .int("keyer", self.keyer)
            .boolean("on_air", self.on_air)
    }
}

/// `KeBP`: keyer type, sources and mask
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KeyerBase {
    pub mix_effect: u8,
    pub keyer: u8,
    pub key_type: u8,
    pub can_fly: bool,
    pub fly_enabled: bool,
    pub fill_source: u16,
    pub key_source: u16,
    pub mask_enabled: bool,
    pub mask: MaskRect,
}

static KEYER_BASE: Layout = Layout {
    len: 20,
    fields: &[
        Field::new("mix_effect", 0, Wire::U8),
        Field::new("keyer", 1, Wire::U8),
        Field::new("key_type", 2, Wire::U8),
        Field::new("can_fly", 3, Wire::Bool),
        Field::new("fly_enabled", 4, Wire::Bool),
        Field::new("fill_source", 6, Wire::U16),
        Field::new("key_source", 8, Wire::U16),
        Field::new("mask_enabled", 10, Wire::Bool),
        Field::new("mask_top", 12, MASK_VERTICAL),
        Field::new("mask_bottom", 14, MASK_VERTICAL),
        Field::new("mask_left", 16, MASK_HORIZONTAL),
        Field::new("mask_right", 18, MASK_HORIZONTAL),
    ],
};

impl WireCommand for KeyerBase {
    const NAME: [u8; 4] = *b"KeBP";
    single_layout!(KEYER_BASE);

    fn from_fields(f: &FieldValues) -> Result<Self> {
        Ok(KeyerBase {
            mix_effect: f.u8("mix_effect")?,
            keyer: f.u8("keyer")?,
            key_type: f.u8("key_type")?,
            can_fly: f.bool("can_fly")?,
            fly_enabled: f.bool("fly_enabled")?,
            fill_source: f.u16("fill_source")?,
            key_source: f.u16("key_source")?,
            mask_enabled: f.bool("mask_enabled")?,
            mask: mask_from_fields(f)?,
        })
    }

    fn to_fields(&self) -> FieldValues {
        let values = FieldValues::new()
            .int("mix_effect", self.mix_effect)
            .int("keyer", self.keyer)
            .int("key_type", self.key_type)
            .boolean("can_fly", self.can_fly)
            .boolean("fly_enabled", self.fly_enabled)
            .int("fill_source", self.fill_source)
            .int("key_source", self.key_source)
            .boolean("mask_enabled", self.mask_enabled);
        mask_to_fields(values, &self.mask)
    }
}

/// `KeLm`: luma key parameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KeyerLuma {
    pub mix_effect: u8,
    pub keyer: u8,
    pub pre_multiplied: bool,
    pub clip: f64,
    pub gain: f64,
    pub invert: bool,
}

static KEYER_LUMA: Layout = Layout {
    len: 12,
    fields: &[
        Field::new("mix_effect", 0, Wire::U8),
        Field::new("keyer", 1, Wire::U8),
        Field::new("pre_multiplied", 2, Wire::Bool),
        Field::new("clip", 4, PERCENT_TENTHS),
        Field::new("gain", 6, PERCENT_TENTHS),
        Field::new("invert", 8, Wire::Bool),
    ],
};

impl WireCommand for KeyerLuma {
    const NAME: [u8; 4] = *b"KeLm";
    single_layout!(KEYER_LUMA);

    fn from_fields(f: &FieldValues) -> Result<Self> {
        Ok(KeyerLuma {
            mix_effect: f.u8("mix_effect")?,
            keyer: f.u8("keyer")?,
            pre_multiplied: f.bool("pre_multiplied")?,
            clip: f.f64("clip")?,
            gain: f.f64("gain")?,
            invert: f.bool("invert")?,
        })
    }

    fn to_fields(&self) -> FieldValues {
        FieldValues::new()
            .int("mix_effect", self.mix_effect)
            .int("keyer", self.keyer)
            .boolean("pre_multiplied", self.pre_multiplied)
            .float("clip", self.clip)
            .float("gain", self.gain)
            .boolean("invert", self.invert)
    }
}

/// `KeCk`: chroma key parameters. Hue is in degrees, the rest are
/// percentages.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KeyerChroma {
    pub mix_effect: u8,
    pub keyer: u8,
    pub hue: f64,
    pub gain: f64,
    pub y_suppress: f64,
    pub lift: f64,
    pub narrow: bool,
}

pub(crate) const HUE_TENTHS: Wire = scaled(Width::U16, 10.0, 0.0, 359.9);

static KEYER_CHROMA: Layout = Layout {
    len: 12,
    fields: &[
        Field::new("mix_effect", 0, Wire::U8),
        Field::new("keyer", 1, Wire::U8),
        Field::new("hue", 2, HUE_TENTHS),
        Field::new("gain", 4, PERCENT_TENTHS),
        Field::new("y_suppress", 6, PERCENT_TENTHS),
        Field::new("lift", 8, PERCENT_TENTHS),
        Field::new("narrow", 10, Wire::Bool),
    ],
};

impl WireCommand for KeyerChroma {
    const NAME: [u8; 4] = *b"KeCk";
    single_layout!(KEYER_CHROMA);

    fn from_fields(f: &FieldValues) -> Result<Self> {
        Ok(KeyerChroma {
            mix_effect: f.u8("mix_effect")?,
            keyer: f.u8("keyer")?,
            hue: f.f64("hue")?,
            gain: f.f64("gain")?,
            y_suppress: f.f64("y_suppress")?,
            lift: f.f64("lift")?,
            narrow: f.bool("narrow")?,
        })
    }

    fn to_fields(&self) -> FieldValues {
        FieldValues::new()
            .int("mix_effect", self.mix_effect)
            .int("keyer", self.keyer)
            .float("hue", self.hue)
            .float("gain", self.gain)
            .float("y_suppress", self.y_suppress)
            .float("lift", self.lift)
            .boolean("narrow", self.narrow)
    }
}
