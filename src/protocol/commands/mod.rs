//! Typed commands.
//!
//! [`Command`] is a closed sum over every command this crate understands plus
//! [`Command::Unrecognized`], which preserves unknown records untouched.
//! Decoding and encoding dispatch on the 4-byte name tag and resolve the
//! field table for the negotiated protocol version once per record.

/// Implements [`WireCommand::layouts`] for a command whose body never
/// changed across supported versions.
macro_rules! single_layout {
    ($layout:expr) => {
        fn layouts() -> &'static [$crate::protocol::fields::VersionedLayout] {
            static TABLE: [$crate::protocol::fields::VersionedLayout; 1] =
                [$crate::protocol::fields::VersionedLayout {
                    since: $crate::core::ProtocolVersion::V7_2,
                    layout: &$layout,
                }];
            &TABLE
        }
    };
}

pub mod audio;
pub mod device;
pub mod dsk;
pub mod inputs;
pub mod keyer;
pub mod macros;
pub mod media;
pub mod mix_effect;
pub mod settings;
pub mod super_source;
pub mod tally;

use std::fmt;

use bytes::Bytes;

use super::fields::{resolve, FieldValues, VersionedLayout};
use super::record::RawCommand;
use crate::core::{Error, ProtocolVersion, Result};

pub use self::audio::{AudioMixerInput, AudioMixerMaster, SetAudioMixerInput};
pub use self::device::{
    AudioMixerConfig, InitComplete, MacroPoolConfig, MediaPoolConfig, MixEffectConfig,
    MultiViewerConfig, ProductId, SuperSourceConfig, Topology, Version, Warning,
};
pub use self::dsk::{DskProperties, DskSources, DskState, SetDskFill, SetDskOnAir};
pub use self::inputs::InputProperties;
pub use self::keyer::{KeyerBase, KeyerChroma, KeyerLuma, KeyerOnAir, SetKeyerOnAir};
pub use self::macros::{MacroAction, MacroActionKind, MacroProperties, MacroRunStatus};
pub use self::media::MediaPlayerSource;
pub use self::mix_effect::{
    Auto, Cut, FadeToBlackRate, FadeToBlackState, PreviewInput, ProgramInput, SetPreviewInput,
    SetProgramInput, TransitionDip, TransitionMix, TransitionPosition, TransitionProperties,
    TransitionWipe,
};
pub use self::settings::{
    MultiViewerProperties, MultiViewerWindow, SetMultiViewerProperties, SetVideoMode, VideoModeGet,
};
pub use self::super_source::{SuperSourceBox, SuperSourceProperties};
pub use self::tally::{TallyByIndex, TallyBySource, TallyFlags};

/// Body codec for one command kind.
///
/// Regular commands only provide [`WireCommand::layouts`] plus the typed
/// conversions; commands whose bodies do not fit a fixed table override
/// [`WireCommand::decode_body`] and [`WireCommand::encode_body`] instead.
pub trait WireCommand: Sized {
    /// Record name tag
    const NAME: [u8; 4];

    /// Field tables by version, oldest first
    fn layouts() -> &'static [VersionedLayout] {
        &[]
    }

    fn from_fields(_fields: &FieldValues) -> Result<Self> {
        Err(Error::framing(format!(
            "{} has no field table",
            String::from_utf8_lossy(&Self::NAME)
        )))
    }

    fn to_fields(&self) -> FieldValues {
        FieldValues::new()
    }

    fn decode_body(version: ProtocolVersion, body: &[u8]) -> Result<Self> {
        let layout = resolve(Self::layouts(), version)?;
        Self::from_fields(&layout.decode(body)?)
    }

    fn encode_body(&self, version: ProtocolVersion) -> Result<Bytes> {
        let layout = resolve(Self::layouts(), version)?;
        layout.encode(&self.to_fields())
    }
}

/// A record whose name tag is not known to this crate
#[derive(Clone, PartialEq, Eq)]
pub struct UnrecognizedCommand {
    pub name: [u8; 4],
    pub body: Bytes,
}

impl fmt::Debug for UnrecognizedCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UnrecognizedCommand")
            .field("name", &String::from_utf8_lossy(&self.name))
            .field("body_len", &self.body.len())
            .finish()
    }
}

macro_rules! commands {
    ($($variant:ident($ty:ty)),* $(,)?) => {
        /// A decoded command record
        #[derive(Debug, Clone, PartialEq)]
        pub enum Command {
            $($variant($ty),)*
            Unrecognized(UnrecognizedCommand),
        }

        impl Command {
            /// Decodes a raw record. Unknown tags never fail; a truncated
            /// body for a known tag is a framing error.
            pub fn decode(version: ProtocolVersion, raw: &RawCommand) -> Result<Command> {
                $(
                    if raw.name == <$ty as WireCommand>::NAME {
                        return <$ty as WireCommand>::decode_body(version, &raw.body)
                            .map(Command::$variant)
                            .map_err(|e| match e {
                                Error::Framing(msg) => {
                                    Error::framing(format!("{}: {}", raw.name_str(), msg))
                                }
                                other => other,
                            });
                    }
                )*
                Ok(Command::Unrecognized(UnrecognizedCommand {
                    name: raw.name,
                    body: raw.body.clone(),
                }))
            }

            /// Encodes into a raw record for the given protocol version
            pub fn encode(&self, version: ProtocolVersion) -> Result<RawCommand> {
                match self {
                    $(
                        Command::$variant(c) => Ok(RawCommand::new(
                            <$ty as WireCommand>::NAME,
                            c.encode_body(version)?,
                        )),
                    )*
                    Command::Unrecognized(u) => Ok(RawCommand::new(u.name, u.body.clone())),
                }
            }

            /// Record name tag
            pub fn name(&self) -> [u8; 4] {
                match self {
                    $(Command::$variant(_) => <$ty as WireCommand>::NAME,)*
                    Command::Unrecognized(u) => u.name,
                }
            }
        }

        $(
            impl From<$ty> for Command {
                fn from(command: $ty) -> Self {
                    Command::$variant(command)
                }
            }
        )*
    };
}

commands! {
    Version(Version),
    ProductId(ProductId),
    Topology(Topology),
    MixEffectConfig(MixEffectConfig),
    MediaPoolConfig(MediaPoolConfig),
    MultiViewerConfig(MultiViewerConfig),
    SuperSourceConfig(SuperSourceConfig),
    AudioMixerConfig(AudioMixerConfig),
    MacroPoolConfig(MacroPoolConfig),
    InitComplete(InitComplete),
    Warning(Warning),
    InputProperties(InputProperties),
    VideoMode(VideoModeGet),
    ProgramInput(ProgramInput),
    PreviewInput(PreviewInput),
    TransitionProperties(TransitionProperties),
    TransitionPosition(TransitionPosition),
    TransitionMix(TransitionMix),
    TransitionDip(TransitionDip),
    TransitionWipe(TransitionWipe),
    FadeToBlackRate(FadeToBlackRate),
    FadeToBlackState(FadeToBlackState),
    KeyerOnAir(KeyerOnAir),
    KeyerBase(KeyerBase),
    KeyerLuma(KeyerLuma),
    KeyerChroma(KeyerChroma),
    DskSources(DskSources),
    DskProperties(DskProperties),
    DskState(DskState),
    AudioMixerInput(AudioMixerInput),
    AudioMixerMaster(AudioMixerMaster),
    MediaPlayerSource(MediaPlayerSource),
    SuperSourceProperties(SuperSourceProperties),
    SuperSourceBox(SuperSourceBox),
    MultiViewerProperties(MultiViewerProperties),
    MultiViewerWindow(MultiViewerWindow),
    MacroProperties(MacroProperties),
    MacroRunStatus(MacroRunStatus),
    TallyByIndex(TallyByIndex),
    TallyBySource(TallyBySource),
    SetProgramInput(SetProgramInput),
    SetPreviewInput(SetPreviewInput),
    Cut(Cut),
    Auto(Auto),
    SetKeyerOnAir(SetKeyerOnAir),
    SetDskOnAir(SetDskOnAir),
    SetDskFill(SetDskFill),
    SetVideoMode(SetVideoMode),
    SetAudioMixerInput(SetAudioMixerInput),
    SetMultiViewerProperties(SetMultiViewerProperties),
    MacroAction(MacroAction),
}

impl Command {
    /// Name tag rendered for logs
    pub fn name_str(&self) -> String {
        String::from_utf8_lossy(&self.name()).into_owned()
    }

    /// Whether the record marks the end of the handshake burst
    pub fn is_init_complete(&self) -> bool {
        matches!(self, Command::InitComplete(_))
    }
}

/// Decodes a record with the given version
pub fn decode(version: ProtocolVersion, raw: &RawCommand) -> Result<Command> {
    Command::decode(version, raw)
}

/// Encodes a command with the given version
pub fn encode(version: ProtocolVersion, command: &Command) -> Result<RawCommand> {
    command.encode(version)
}
