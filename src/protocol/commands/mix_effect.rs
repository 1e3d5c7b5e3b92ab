//! Mix-effect block commands: bus sources, transitions and fade to black.

use super::WireCommand;
use crate::core::Result;
use crate::protocol::fields::{scaled, Field, FieldValues, Layout, Wire, Width};

static BUS_SOURCE: Layout = Layout {
    len: 4,
    fields: &[
        Field::new("mix_effect", 0, Wire::U8),
        Field::new("source", 2, Wire::U16),
    ],
};

/// `PrgI`: program bus source
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgramInput {
    pub mix_effect: u8,
    pub source: u16,
}

impl WireCommand for ProgramInput {
    const NAME: [u8; 4] = *b"PrgI";
    single_layout!(BUS_SOURCE);

    fn from_fields(f: &FieldValues) -> Result<Self> {
        Ok(ProgramInput {
            mix_effect: f.u8("mix_effect")?,
            source: f.u16("source")?,
        })
    }

    fn to_fields(&self) -> FieldValues {
        FieldValues::new()
            .int("mix_effect", self.mix_effect)
            .int("source", self.source)
    }
}

/// `PrvI`: preview bus source. Later firmware appends whether preview is
/// live during a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PreviewInput {
    pub mix_effect: u8,
    pub source: u16,
    pub preview_live: Option<bool>,
}

static PREVIEW_INPUT: Layout = Layout {
    len: 8,
    fields: &[
        Field::new("mix_effect", 0, Wire::U8),
        Field::new("source", 2, Wire::U16),
        Field::optional("preview_live", 4, Wire::Bool),
    ],
};

impl WireCommand for PreviewInput {
    const NAME: [u8; 4] = *b"PrvI";
    single_layout!(PREVIEW_INPUT);

    fn from_fields(f: &FieldValues) -> Result<Self> {
        Ok(PreviewInput {
            mix_effect: f.u8("mix_effect")?,
            source: f.u16("source")?,
            preview_live: f.opt_bool("preview_live")?,
        })
    }

    fn to_fields(&self) -> FieldValues {
        FieldValues::new()
            .int("mix_effect", self.mix_effect)
            .int("source", self.source)
            .maybe_boolean("preview_live", self.preview_live)
    }
}

/// `CPgI`: set the program bus source
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SetProgramInput {
    pub mix_effect: u8,
    pub source: u16,
}

impl WireCommand for SetProgramInput {
    const NAME: [u8; 4] = *b"CPgI";
    single_layout!(BUS_SOURCE);

    fn from_fields(f: &FieldValues) -> Result<Self> {
        Ok(SetProgramInput {
            mix_effect: f.u8("mix_effect")?,
            source: f.u16("source")?,
        })
    }

    fn to_fields(&self) -> FieldValues {
        FieldValues::new()
            .int("mix_effect", self.mix_effect)
            .int("source", self.source)
    }
}

/// `CPvI`: set the preview bus source
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SetPreviewInput {
    pub mix_effect: u8,
    pub source: u16,
}

impl WireCommand for SetPreviewInput {
    const NAME: [u8; 4] = *b"CPvI";
    single_layout!(BUS_SOURCE);

    fn from_fields(f: &FieldValues) -> Result<Self> {
        Ok(SetPreviewInput {
            mix_effect: f.u8("mix_effect")?,
            source: f.u16("source")?,
        })
    }

    fn to_fields(&self) -> FieldValues {
        FieldValues::new()
            .int("mix_effect", self.mix_effect)
            .int("source", self.source)
    }
}

static MIX_EFFECT_ONLY: Layout = Layout {
    len: 4,
    fields: &[Field::new("mix_effect", 0, Wire::U8)],
};

/// `DCut`: hard cut
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cut {
    pub mix_effect: u8,
}

impl WireCommand for Cut {
    const NAME: [u8; 4] = *b"DCut";
    single_layout!(MIX_EFFECT_ONLY);

    fn from_fields(f: &FieldValues) -> Result<Self> {
        Ok(Cut {
            mix_effect: f.u8("mix_effect")?,
        })
    }

    fn to_fields(&self) -> FieldValues {
        FieldValues::new().int("mix_effect", self.mix_effect)
    }
}

/// `DAut`: auto transition using the current style
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Auto {
    pub mix_effect: u8,
}

impl WireCommand for Auto {
    const NAME: [u8; 4] = *b"DAut";
    single_layout!(MIX_EFFECT_ONLY);

    fn from_fields(f: &FieldValues) -> Result<Self> {
        Ok(Auto {
            mix_effect: f.u8("mix_effect")?,
        })
    }

    fn to_fields(&self) -> FieldValues {
        FieldValues::new().int("mix_effect", self.mix_effect)
    }
}

/// `TrSS`: current and next transition style plus layer selection.
/// Selection bit 0 is the background, bits 1..=4 the upstream keyers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransitionProperties {
    pub mix_effect: u8,
    pub style: u8,
    pub selection: u8,
    pub next_style: u8,
    pub next_selection: u8,
}

static TRANSITION_PROPERTIES: Layout = Layout {
    len: 8,
    fields: &[
        Field::new("mix_effect", 0, Wire::U8),
        Field::new("style", 1, Wire::U8),
        Field::new("selection", 2, Wire::Flags(Width::U8)),
        Field::new("next_style", 3, Wire::U8),
        Field::new("next_selection", 4, Wire::Flags(Width::U8)),
    ],
};

impl WireCommand for TransitionProperties {
    const NAME: [u8; 4] = *b"TrSS";
    single_layout!(TRANSITION_PROPERTIES);

    fn from_fields(f: &FieldValues) -> Result<Self> {
        Ok(TransitionProperties {
            mix_effect: f.u8("mix_effect")?,
            style: f.u8("style")?,
            selection: f.u8("selection")?,
            next_style: f.u8("next_style")?,
            next_selection: f.u8("next_selection")?,
        })
    }

    fn to_fields(&self) -> FieldValues {
        FieldValues::new()
            .int("mix_effect", self.mix_effect)
            .int("style", self.style)
            .int("selection", self.selection)
            .int("next_style", self.next_style)
            .int("next_selection", self.next_selection)
    }
}

/// `TrPs`: transition progress, position in `0.0..=1.0`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransitionPosition {
    pub mix_effect: u8,
    pub in_transition: bool,
    pub remaining_frames: u8,
    pub position: f64,
}

static TRANSITION_POSITION: Layout = Layout {
    len: 8,
    fields: &[
        Field::new("mix_effect", 0, Wire::U8),
        Field::new("in_transition", 1, Wire::Bool),
        Field::new("remaining_frames", 2, Wire::U8),
        Field::new("position", 4, scaled(Width::U16, 10000.0, 0.0, 1.0)),
    ],
};

impl WireCommand for TransitionPosition {
    const NAME: [u8; 4] = *b"TrPs";
    single_layout!(TRANSITION_POSITION);

    fn from_fields(f: &FieldValues) -> Result<Self> {
        Ok(TransitionPosition {
            mix_effect: f.u8("mix_effect")?,
            in_transition: f.bool("in_transition")?,
            remaining_frames: f.u8("remaining_frames")?,
            position: f.f64("position")?,
        })
    }

    fn to_fields(&self) -> FieldValues {
        FieldValues::new()
            .int("mix_effect", self.mix_effect)
            .boolean("in_transition", self.in_transition)
            .int("remaining_frames", self.remaining_frames)
            .float("position", self.position)
    }
}

static RATE: Layout = Layout {
    len: 4,
    fields: &[
        Field::new("mix_effect", 0, Wire::U8),
        Field::new("rate", 1, Wire::U8),
    ],
};

/// `TMxP`: mix transition rate in frames
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransitionMix {
    pub mix_effect: u8,
    pub rate: u8,
}

impl WireCommand for TransitionMix {
    const NAME: [u8; 4] = *b"TMxP";
    single_layout!(RATE);

    fn from_fields(f: &FieldValues) -> Result<Self> {
        Ok(TransitionMix {
            mix_effect: f.u8("mix_effect")?,
            rate: f.u8("rate")?,
        })
    }

    fn to_fields(&self) -> FieldValues {
        FieldValues::new()
            .int("mix_effect", self.mix_effect)
            .int("rate", self.rate)
    }
}

/// `TDpP`: dip transition rate and dip source
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransitionDip {
    pub mix_effect: u8,
    pub rate: u8,
    pub input: u16,
}

static TRANSITION_DIP: Layout = Layout {
    len: 4,
    fields: &[
        Field::new("mix_effect", 0, Wire::U8),
        Field::new("rate", 1, Wire::U8),
        Field::new("input", 2, Wire::U16),
    ],
};

impl WireCommand for TransitionDip {
    const NAME: [u8; 4] = *b"TDpP";
    single_layout!(TRANSITION_DIP);

    fn from_fields(f: &FieldValues) -> Result<Self> {
        Ok(TransitionDip {
            mix_effect: f.u8("mix_effect")?,
            rate: f.u8("rate")?,
            input: f.u16("input")?,
        })
    }

    fn to_fields(&self) -> FieldValues {
        FieldValues::new()
            .int("mix_effect", self.mix_effect)
            .int("rate", self.rate)
            .int("input", self.input)
    }
}

/// `TWpP`: wipe transition settings. Width, symmetry and softness are
/// percentages; the pattern center is in `0.0..=1.0`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransitionWipe {
    pub mix_effect: u8,
    pub rate: u8,
    pub pattern: u8,
    pub border_width: f64,
    pub border_input: u16,
    pub symmetry: f64,
    pub border_softness: f64,
    pub x_position: f64,
    pub y_position: f64,
    pub reverse_direction: bool,
    pub flip_flop: bool,
}

const PERCENT_HUNDREDTHS: Wire = scaled(Width::U16, 100.0, 0.0, 100.0);
const UNIT_TEN_THOUSANDTHS: Wire = scaled(Width::U16, 10000.0, 0.0, 1.0);

static TRANSITION_WIPE: Layout = Layout {
    len: 20,
    fields: &[
        Field::new("mix_effect", 0, Wire::U8),
        Field::new("rate", 1, Wire::U8),
        Field::new("pattern", 2, Wire::U8),
        Field::new("border_width", 4, PERCENT_HUNDREDTHS),
        Field::new("border_input", 6, Wire::U16),
        Field::new("symmetry", 8, PERCENT_HUNDREDTHS),
        Field::new("border_softness", 10, PERCENT_HUNDREDTHS),
        Field::new("x_position", 12, UNIT_TEN_THOUSANDTHS),
        Field::new("y_position", 14, UNIT_TEN_THOUSANDTHS),
        Field::new("reverse_direction", 16, Wire::Bool),
        Field::new("flip_flop", 17, Wire::Bool),
    ],
};

impl WireCommand for TransitionWipe {
    const NAME: [u8; 4] = *b"TWpP";
    single_layout!(TRANSITION_WIPE);

    fn from_fields(f: &FieldValues) -> Result<Self> {
        Ok(TransitionWipe {
            mix_effect: f.u8("mix_effect")?,
            rate: f.u8("rate")?,
            pattern: f.u8("pattern")?,
            border_width: f.f64("border_width")?,
            border_input: f.u16("border_input")?,
            symmetry: f.f64("symmetry")?,
            border_softness: f.f64("border_softness")?,
            x_position: f.f64("x_position")?,
            y_position: f.f64("y_position")?,
            reverse_direction: f.bool("reverse_direction")?,
            flip_flop: f.bool("flip_flop")?,
        })
    }

    fn to_fields(&self) -> FieldValues {
        FieldValues::new()
            .int("mix_effect", self.mix_effect)
            .int("rate", self.rate)
            .int("pattern", self.pattern)
            .float("border_width", self.border_width)
            .int("border_input", self.border_input)
            .float("symmetry", self.symmetry)
            .float("border_softness", self.border_softness)
            .float("x_position", self.x_position)
            .float("y_position", self.y_position)
            .boolean("reverse_direction", self.reverse_direction)
            .boolean("flip_flop", self.flip_flop)
    }
}

/// `FtbP`: fade-to-black rate in frames
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FadeToBlackRate {
    pub mix_effect: u8,
    pub rate: u8,
}

impl WireCommand for FadeToBlackRate {
    const NAME: [u8; 4] = *b"FtbP";
    single_layout!(RATE);

    fn from_fields(f: &FieldValues) -> Result<Self> {
        Ok(FadeToBlackRate {
            mix_effect: f.u8("mix_effect")?,
            rate: f.u8("rate")?,
        })
    }

    fn to_fields(&self) -> FieldValues {
        FieldValues::new()
            .int("mix_effect", self.mix_effect)
            .int("rate", self.rate)
    }
}

/// `FtbS`: fade-to-black progress
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FadeToBlackState {
    pub mix_effect: u8,
    pub fully_black: bool,
    pub in_transition: bool,
    pub remaining_frames: u8,
}

static FADE_TO_BLACK_STATE: Layout = Layout {
    len: 4,
    fields: &[
        Field::new("mix_effect", 0, Wire::U8),
        Field::new("fully_black", 1, Wire::Bool),
        Field::new("in_transition", 2, Wire::Bool),
        Field::new("remaining_frames", 3, Wire::U8),
    ],
};

impl WireCommand for FadeToBlackState {
    const NAME: [u8; 4] = *b"FtbS";
    single_layout!(FADE_TO_BLACK_STATE);

    fn from_fields(f: &FieldValues) -> Result<Self> {
        Ok(FadeToBlackState {
            mix_effect: f.u8("mix_effect")?,
            fully_black: f.bool("fully_black")?,
            in_transition: f.bool("in_transition")?,
            remaining_frames: f.u8("remaining_frames")?,
        })
    }

    fn to_fields(&self) -> FieldValues {
        FieldValues::new()
            .int("mix_effect", self.mix_effect)
            .boolean("fully_black", self.fully_black)
            .boolean("in_transition", self.in_transition)
            .int("remaining_frames", self.remaining_frames)
    }
}
