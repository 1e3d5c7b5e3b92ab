//! Downstream keyer commands.

use super::keyer::{mask_from_fields, mask_to_fields, MASK_HORIZONTAL, MASK_VERTICAL, PERCENT_TENTHS};
use super::WireCommand;
use crate::core::{MaskRect, Result};
use crate::protocol::fields::{Field, FieldValues, Layout, Wire};

/// `DskB`: fill and key sources
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DskSources {
    pub keyer: u8,
    pub fill_source: u16,
    pub key_source: u16,
}

static DSK_SOURCES: Layout = Layout {
    len: 8,
    fields: &[
        Field::new("keyer", 0, Wire::U8),
        Field::new("fill_source", 2, Wire::U16),
        Field::new("key_source", 4, Wire::U16),
    ],
};

impl WireCommand for DskSources {
    const NAME: [u8; 4] = *b"DskB";
    single_layout!(DSK_SOURCES);

    fn from_fields(f: &FieldValues) -> Result<Self> {
        Ok(DskSources {
            keyer: f.u8("keyer")?,
            fill_source: f.u16("fill_source")?,
            key_source: f.u16("key_source")?,
        })
    }

    fn to_fields(&self) -> FieldValues {
        FieldValues::new()
            .int("keyer", self.keyer)
            .int("fill_source", self.fill_source)
            .int("key_source", self.key_source)
    }
}

/// `DskP`: tie, rate, luma key and mask
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DskProperties {
    pub keyer: u8,
    pub tie: bool,
    pub rate: u8,
    pub pre_multiplied: bool,
    pub clip: f64,
    pub gain: f64,
    pub invert: bool,
    pub mask_enabled: bool,
    pub mask: MaskRect,
}

static DSK_PROPERTIES: Layout = Layout {
    len: 20,
    fields: &[
        Field::new("keyer", 0, Wire::U8),
        Field::new("tie", 1, Wire::Bool),
        Field::new("rate", 2, Wire::U8),
        Field::new("pre_multiplied", 3, Wire::Bool),
        Field::new("clip", 4, PERCENT_TENTHS),
        Field::new("gain", 6, PERCENT_TENTHS),
        Field::new("invert", 8, Wire::Bool),
        Field::new("mask_enabled", 9, Wire::Bool),
        Field::new("mask_top", 10, MASK_VERTICAL),
        Field::new("mask_bottom", 12, MASK_VERTICAL),
        Field::new("mask_left", 14, MASK_HORIZONTAL),
        Field::new("mask_right", 16, MASK_HORIZONTAL),
    ],
};

impl WireCommand for DskProperties {
    const NAME: [u8; 4] = *b"DskP";
    single_layout!(DSK_PROPERTIES);

    fn from_fields(f: &FieldValues) -> Result<Self> {
        Ok(DskProperties {
            keyer: f.u8("keyer")?,
            tie: f.bool("tie")?,
            rate: f.u8("rate")?,
            pre_multiplied: f.bool("pre_multiplied")?,
            clip: f.f64("clip")?,
            gain: f.f64("gain")?,
            invert: f.bool("invert")?,
            mask_enabled: f.bool("mask_enabled")?,
            mask: mask_from_fields(f)?,
        })
    }

    fn to_fields(&self) -> FieldValues {
        let values = FieldValues::new()
            .int("keyer", self.keyer)
            .boolean("tie", self.tie)
            .int("rate", self.rate)
            .boolean("pre_multiplied", self.pre_multiplied)
            .float("clip", self.clip)
            .float("gain", self.gain)
            .boolean("invert", self.invert)
            .boolean("mask_enabled", self.mask_enabled);
        mask_to_fields(values, &self.mask)
    }
}

/// `DskS`: on-air and transition progress
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DskState {
    pub keyer: u8,
    pub on_air: bool,
    pub in_transition: bool,
    pub is_auto_transitioning: bool,
    pub remaining_frames: u8,
}

static DSK_STATE: Layout = Layout {
    len: 8,
    fields: &[
        Field::new("keyer", 0, Wire::U8),
        Field::new("on_air", 1, Wire::Bool),
        Field::new("in_transition", 2, Wire::Bool),
        Field::new("is_auto_transitioning", 3, Wire::Bool),
        Field::new("remaining_frames", 4, Wire::U8),
    ],
};

impl WireCommand for DskState {
    const NAME: [u8; 4] = *b"DskS";
    single_layout!(DSK_STATE);

    fn from_fields(f: &FieldValues) -> Result<Self> {
        Ok(DskState {
            keyer: f.u8("keyer")?,
            on_air: f.bool("on_air")?,
            in_transition: f.bool("in_transition")?,
            is_auto_transitioning: f.bool("is_auto_transitioning")?,
            remaining_frames: f.u8("remaining_frames")?,
        })
    }

    fn to_fields(&self) -> FieldValues {
        FieldValues::new()
            .int("keyer", self.keyer)
            .boolean("on_air", self.on_air)
            .boolean("in_transition", self.in_transition)
            .boolean("is_auto_transitioning", self.is_auto_transitioning)
            .int("remaining_frames", self.remaining_frames)
    }
}

/// `CDsL`: put a downstream keyer on or off air
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SetDskOnAir {
    pub keyer: u8,
    pub on_air: bool,
}

static SET_ON_AIR: Layout = Layout {
    len: 4,
    fields: &[
        Field::new("keyer", 0, Wire::U8),
        Field::new("on_air", 1, Wire::Bool),
    ],
};

impl WireCommand for SetDskOnAir {
    const NAME: [u8; 4] = *b"CDsL";
    single_layout!(SET_ON_AIR);

    fn from_fields(f: &FieldValues) -> Result<Self> {
        Ok(SetDskOnAir {
            keyer: f.u8("keyer")?,
            on_air: f.bool("on_air")?,
        })
    }

    fn to_fields(&self) -> FieldValues {
        FieldValues::new()
            .int("keyer", self.keyer)
            .boolean("on_air", self.on_air)
    }
}

/// `CDsF`: change the fill source of a downstream keyer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SetDskFill {
    pub keyer: u8,
    pub source: u16,
}

static SET_FILL: Layout = Layout {
    len: 4,
    fields: &[
        Field::new("keyer", 0, Wire::U8),
        Field::new("source", 2, Wire::U16),
    ],
};

impl WireCommand for SetDskFill {
    const NAME: [u8; 4] = *b"CDsF";
    single_layout!(SET_FILL);

    fn from_fields(f: &FieldValues) -> Result<Self> {
        Ok(SetDskFill {
            keyer: f.u8("keyer")?,
            source: f.u16("source")?,
        })
    }

    fn to_fields(&self) -> FieldValues {
        FieldValues::new()
            .int("keyer", self.keyer)
            .int("source", self.source)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ProtocolVersion;
    use crate::protocol::commands::test_support::{assert_layouts_consistent, assert_round_trip};
    use crate::protocol::commands::Command;
    use crate::protocol::record::RawCommand;

    #[test]
    fn test_layouts_consistent() {
        assert_layouts_consistent(DskSources::layouts());
        assert_layouts_consistent(DskProperties::layouts());
        assert_layouts_consistent(DskState::layouts());
        assert_layouts_consistent(SetDskOnAir::layouts());
        assert_layouts_consistent(SetDskFill::layouts());
    }

    #[test]
    fn test_decode_properties() {
        let body = vec![
            1, 1, 25, 0, // keyer, tie, rate, pre-multiplied
            0x01, 0xf4, 0x03, 0xe8, // clip 50.0, gain 100.0
            0, 1, // invert, mask enabled
            0x0b, 0xb8, 0xf4, 0x48, // top 3.0, bottom -3.0
            0x0f, 0xa0, 0xf0, 0x60, // left 4.0, right -4.0
            0, 0,
        ];
        let decoded = Command::decode(ProtocolVersion::V7_2, &RawCommand::new(*b"DskP", body)).unwrap();
        assert_eq!(
            decoded,
            Command::DskProperties(DskProperties {
                keyer: 1,
                tie: true,
                rate: 25,
                pre_multiplied: false,
                clip: 50.0,
                gain: 100.0,
                invert: false,
                mask_enabled: true,
                mask: MaskRect::SD_DEFAULT,
            })
        );
    }

    #[test]
    fn test_round_trips() {
        for version in ProtocolVersion::SUPPORTED {
            for percent in [0.0, 100.0] {
                assert_round_trip(
                    DskProperties {
                        keyer: 0,
                        tie: false,
                        rate: 30,
                        pre_multiplied: true,
                        clip: percent,
                        gain: 100.0 - percent,
                        invert: true,
                        mask_enabled: false,
                        mask: MaskRect::HD_DEFAULT,
                    }
                    .into(),
                    version,
                );
            }
            assert_round_trip(
                DskSources { keyer: 1, fill_source: 3020, key_source: 3021 }.into(),
                version,
            );
            assert_round_trip(
                DskState {
                    keyer: 0,
                    on_air: true,
                    in_transition: true,
                    is_auto_transitioning: false,
                    remaining_frames: 7,
                }
                .into(),
                version,
            );
            assert_round_trip(SetDskOnAir { keyer: 1, on_air: true }.into(), version);
            assert_round_trip(SetDskFill { keyer: 0, source: 2 }.into(), version);
        }
    }
}
