//! Classic audio mixer commands.

use super::WireCommand;
use crate::core::Result;
use crate::protocol::fields::{scaled, Field, FieldValues, Layout, Wire, Width};

/// Gain in dB at 1/100
const GAIN: Wire = scaled(Width::I16, 100.0, -60.0, 6.0);
/// Balance, full left to full right, at 1/10000
const BALANCE: Wire = scaled(Width::I16, 10000.0, -1.0, 1.0);

/// `AMIP`: one mixer input strip
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AudioMixerInput {
    pub index: u16,
    pub source_type: u8,
    pub from_media_player: bool,
    pub plug_type: u8,
    /// 0 off, 1 on, 2 audio-follow-video
    pub mix_option: u8,
    pub gain: f64,
    pub balance: f64,
}

static AUDIO_MIXER_INPUT: Layout = Layout {
    len: 16,
    fields: &[
        Field::new("index", 0, Wire::U16),
        Field::new("source_type", 2, Wire::U8),
        Field::new("from_media_player", 6, Wire::Bool),
        Field::new("plug_type", 7, Wire::U8),
        Field::new("mix_option", 8, Wire::U8),
        Field::new("gain", 10, GAIN),
        Field::new("balance", 12, BALANCE),
    ],
};

impl WireCommand for AudioMixerInput {
    const NAME: [u8; 4] = *b"AMIP";
    single_layout!(AUDIO_MIXER_INPUT);

    fn from_fields(f: &FieldValues) -> Result<Self> {
        Ok(AudioMixerInput {
            index: f.u16("index")?,
            source_type: f.u8("source_type")?,
            from_media_player: f.bool("from_media_player")?,
            plug_type: f.u8("plug_type")?,
            mix_option: f.u8("mix_option")?,
            gain: f.f64("gain")?,
            balance: f.f64("balance")?,
        })
    }

    fn to_fields(&self) -> FieldValues {
        FieldValues::new()
            .int("index", self.index)
            .int("source_type", self.source_type)
            .boolean("from_media_player", self.from_media_player)
            .int("plug_type", self.plug_type)
            .int("mix_option", self.mix_option)
            .float("gain", self.gain)
            .float("balance", self.balance)
    }
}

/// `AMMO`: master output
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AudioMixerMaster {
    pub gain: f64,
    pub balance: f64,
    pub follow_fade_to_black: bool,
}

static AUDIO_MIXER_MASTER: Layout = Layout {
    len: 8,
    fields: &[
        Field::new("gain", 0, GAIN),
        Field::new("balance", 2, BALANCE),
        Field::new("follow_fade_to_black", 4, Wire::Bool),
    ],
};

impl WireCommand for AudioMixerMaster {
    const NAME: [u8; 4] = *b"AMMO";
    single_layout!(AUDIO_MIXER_MASTER);

    fn from_fields(f: &FieldValues) -> Result<Self> {
        Ok(AudioMixerMaster {
            gain: f.f64("gain")?,
            balance: f.f64("balance")?,
            follow_fade_to_black: f.bool("follow_fade_to_black")?,
        })
    }

    fn to_fields(&self) -> FieldValues {
        FieldValues::new()
            .float("gain", self.gain)
            .float("balance", self.balance)
            .boolean("follow_fade_to_black", self.follow_fade_to_black)
    }
}

const CHANGE_MIX_OPTION: u8 = 0x01;
const CHANGE_GAIN: u8 = 0x02;
const CHANGE_BALANCE: u8 = 0x04;

/// `CAMI`: change some properties of an input strip. Only the fields that
/// are `Some` are applied by the device; the change mask is derived from
/// them.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SetAudioMixerInput {
    pub index: u16,
    pub mix_option: Option<u8>,
    pub gain: Option<f64>,
    pub balance: Option<f64>,
}

static SET_AUDIO_MIXER_INPUT: Layout = Layout {
    len: 12,
    fields: &[
        Field::new("mask", 0, Wire::Flags(Width::U8)),
        Field::new("index", 2, Wire::U16),
        Field::new("mix_option", 4, Wire::U8),
        Field::new("gain", 6, GAIN),
        Field::new("balance", 8, BALANCE),
    ],
};

impl SetAudioMixerInput {
    fn mask(&self) -> u8 {
        let mut mask = 0;
        if self.mix_option.is_some() {
            mask |= CHANGE_MIX_OPTION;
        }
        if self.gain.is_some() {
            mask |= CHANGE_GAIN;
        }
        if self.balance.is_some() {
            mask |= CHANGE_BALANCE;
        }
        mask
    }
}

impl WireCommand for SetAudioMixerInput {
    const NAME: [u8; 4] = *b"CAMI";
    single_layout!(SET_AUDIO_MIXER_INPUT);

    fn from_fields(f: &FieldValues) -> Result<Self> {
        let mask = f.u8("mask")?;
        Ok(SetAudioMixerInput {
            index: f.u16("index")?,
            mix_option: if mask & CHANGE_MIX_OPTION != 0 {
                Some(f.u8("mix_option")?)
            } else {
                None
            },
            gain: if mask & CHANGE_GAIN != 0 {
                Some(f.f64("gain")?)
            } else {
                None
            },
            balance: if mask & CHANGE_BALANCE != 0 {
                Some(f.f64("balance")?)
            } else {
                None
            },
        })
    }

    fn to_fields(&self) -> FieldValues {
        FieldValues::new()
            .int("mask", self.mask())
            .int("index", self.index)
            .int("mix_option", self.mix_option.unwrap_or(0))
            .float("gain", self.gain.unwrap_or(0.0))
            .float("balance", self.balance.unwrap_or(0.0))
    }
}
