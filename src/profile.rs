//! Capability discovery from the handshake burst.
//!
//! The device never states most of its capabilities outright. Presence of a
//! command family is the signal for optional features and counts come from
//! the distinct ids seen, so the profile is only final once the whole burst
//! has been observed.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::core::ProtocolVersion;
use crate::protocol::commands::{Command, Topology};

/// Record tags that only a Fairlight audio mixer sends
const FAIRLIGHT_TAGS: [&[u8; 4]; 4] = [b"_FAC", b"FASP", b"FAMP", b"FAIP"];

/// Which audio mixer the device carries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum AudioMixerKind {
    #[default]
    None,
    Classic,
    Fairlight,
}

/// Immutable capability snapshot of one device
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceProfile {
    pub product_name: Option<String>,
    pub model: Option<u8>,
    pub protocol_version: Option<ProtocolVersion>,
    pub mix_effects: u8,
    /// Upstream keyers per mix-effect block, indexed by block id
    pub keyers: BTreeMap<u8, u8>,
    pub downstream_keyers: u8,
    pub multiviewers: u8,
    pub super_source: bool,
    pub super_source_boxes: u8,
    pub audio_mixer: AudioMixerKind,
    pub media_players: u8,
    pub stills: u8,
    pub clips: u8,
    pub macros: u16,
    pub inputs: u16,
    /// Resource counts as advertised, when `_top` was sent
    pub topology: Option<Topology>,
    /// Tags this crate has no decoder for, in first-seen order
    pub unrecognized: Vec<String>,
}

impl DeviceProfile {
    /// Builds a profile from a complete handshake burst in arrival order
    pub fn build<'a>(commands: impl IntoIterator<Item = &'a Command>) -> Self {
        let mut builder = ProfileBuilder::new();
        for command in commands {
            builder.observe(command);
        }
        builder.finish()
    }

    /// Whether the device reports the given mix-effect block
    pub fn has_mix_effect(&self, mix_effect: u8) -> bool {
        mix_effect < self.mix_effects
    }
}

/// Accumulates what the handshake burst reveals
#[derive(Debug, Default)]
pub struct ProfileBuilder {
    product_name: Option<String>,
    model: Option<u8>,
    protocol_version: Option<ProtocolVersion>,
    topology: Option<Topology>,
    mix_effects: BTreeSet<u8>,
    configured_keyers: BTreeMap<u8, u8>,
    seen_keyers: BTreeMap<u8, BTreeSet<u8>>,
    downstream_keyers: BTreeSet<u8>,
    multiviewers: BTreeSet<u8>,
    multiviewer_count: Option<u8>,
    super_source: bool,
    configured_boxes: Option<u8>,
    seen_boxes: BTreeSet<u8>,
    classic_audio: bool,
    fairlight_audio: bool,
    media_players: BTreeSet<u8>,
    stills: u8,
    clips: u8,
    macro_count: Option<u8>,
    macros: BTreeSet<u16>,
    inputs: BTreeSet<u16>,
    unrecognized: Vec<String>,
}

impl ProfileBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    fn mix_effect(&mut self, mix_effect: u8) {
        self.mix_effects.insert(mix_effect);
    }

    fn keyer(&mut self, mix_effect: u8, keyer: u8) {
        self.mix_effect(mix_effect);
        self.seen_keyers.entry(mix_effect).or_default().insert(keyer);
    }

    /// Feeds the next command of the burst
    pub fn observe(&mut self, command: &Command) {
        match command {
            Command::Version(c) => self.protocol_version = Some(c.version),
            Command::ProductId(c) => {
                self.product_name = Some(c.name.clone());
                self.model = c.model.or(self.model);
            }
            Command::Topology(c) => self.topology = Some(*c),
            Command::MixEffectConfig(c) => {
                self.mix_effect(c.mix_effect);
                self.configured_keyers.insert(c.mix_effect, c.keyers);
            }
            Command::MediaPoolConfig(c) => {
                self.stills = c.stills;
                self.clips = c.clips;
            }
            Command::MultiViewerConfig(c) => self.multiviewer_count = Some(c.count),
            Command::SuperSourceConfig(c) => self.configured_boxes = Some(c.boxes),
            Command::AudioMixerConfig(_) | Command::AudioMixerInput(_) | Command::AudioMixerMaster(_) => {
                self.classic_audio = true;
            }
            Command::MacroPoolConfig(c) => self.macro_count = Some(c.macros),
            Command::InputProperties(c) => {
                self.inputs.insert(c.id);
            }

            Command::ProgramInput(c) => self.mix_effect(c.mix_effect),
            Command::PreviewInput(c) => self.mix_effect(c.mix_effect),
            Command::TransitionProperties(c) => self.mix_effect(c.mix_effect),
            Command::TransitionPosition(c) => self.mix_effect(c.mix_effect),
            Command::TransitionMix(c) => self.mix_effect(c.mix_effect),
            Command::TransitionDip(c) => self.mix_effect(c.mix_effect),
            Command::TransitionWipe(c) => self.mix_effect(c.mix_effect),
            Command::FadeToBlackRate(c) => self.mix_effect(c.mix_effect),
            Command::FadeToBlackState(c) => self.mix_effect(c.mix_effect),

            Command::KeyerOnAir(c) => self.keyer(c.mix_effect, c.keyer),
            Command::KeyerBase(c) => self.keyer(c.mix_effect, c.keyer),
            Command::KeyerLuma(c) => self.keyer(c.mix_effect, c.keyer),
            Command::KeyerChroma(c) => self.keyer(c.mix_effect, c.keyer),

            Command::DskSources(c) => {
                self.downstream_keyers.insert(c.keyer);
            }
            Command::DskProperties(c) => {
                self.downstream_keyers.insert(c.keyer);
            }
            Command::DskState(c) => {
                self.downstream_keyers.insert(c.keyer);
            }

            Command::MultiViewerProperties(c) => {
                self.multiviewers.insert(c.multiviewer);
            }
            Command::MultiViewerWindow(c) => {
                self.multiviewers.insert(c.multiviewer);
            }

            Command::SuperSourceProperties(_) => self.super_source = true,
            Command::SuperSourceBox(c) => {
                self.seen_boxes.insert(c.index);
            }

            Command::MediaPlayerSource(c) => {
                self.media_players.insert(c.player);
            }
            Command::MacroProperties(c) => {
                self.macros.insert(c.index);
            }

            Command::Unrecognized(u) => {
                if FAIRLIGHT_TAGS.iter().any(|tag| **tag == u.name) {
                    self.fairlight_audio = true;
                }
                let tag = String::from_utf8_lossy(&u.name).into_owned();
                if !self.unrecognized.contains(&tag) {
                    self.unrecognized.push(tag);
                }
            }

            Command::InitComplete(_)
            | Command::Warning(_)
            | Command::VideoMode(_)
            | Command::MacroRunStatus(_)
            | Command::TallyByIndex(_)
            | Command::TallyBySource(_)
            | Command::SetProgramInput(_)
            | Command::SetPreviewInput(_)
            | Command::Cut(_)
            | Command::Auto(_)
            | Command::SetKeyerOnAir(_)
            | Command::SetDskOnAir(_)
            | Command::SetDskFill(_)
            | Command::SetVideoMode(_)
            | Command::SetAudioMixerInput(_)
            | Command::SetMultiViewerProperties(_)
            | Command::MacroAction(_) => {}
        }
    }

    /// Derives the final profile
    pub fn finish(self) -> DeviceProfile {
        let keyers = self
            .mix_effects
            .iter()
            .map(|me| {
                let count = self.configured_keyers.get(me).copied().unwrap_or_else(|| {
                    self.seen_keyers.get(me).map_or(0, |ids| ids.len() as u8)
                });
                (*me, count)
            })
            .collect();

        let audio_mixer = if self.fairlight_audio {
            AudioMixerKind::Fairlight
        } else if self.classic_audio {
            AudioMixerKind::Classic
        } else {
            AudioMixerKind::None
        };

        let media_players = (self.media_players.len() as u8)
            .max(self.topology.map_or(0, |t| t.media_players));

        let profile = DeviceProfile {
            product_name: self.product_name,
            model: self.model,
            protocol_version: self.protocol_version,
            mix_effects: self.mix_effects.len() as u8,
            keyers,
            downstream_keyers: self.downstream_keyers.len() as u8,
            multiviewers: (self.multiviewers.len() as u8).max(self.multiviewer_count.unwrap_or(0)),
            super_source: self.super_source,
            super_source_boxes: self.configured_boxes.unwrap_or(self.seen_boxes.len() as u8),
            audio_mixer,
            media_players,
            stills: self.stills,
            clips: self.clips,
            macros: self.macro_count.map_or(self.macros.len() as u16, u16::from),
            inputs: self.inputs.len() as u16,
            topology: self.topology,
            unrecognized: self.unrecognized,
        };
        debug!(
            product = ?profile.product_name,
            mix_effects = profile.mix_effects,
            downstream_keyers = profile.downstream_keyers,
            super_source = profile.super_source,
            audio = ?profile.audio_mixer,
            "device profile complete"
        );
        profile
    }

    /// Finishes into a shareable handle
    pub fn finish_shared(self) -> Arc<DeviceProfile> {
        Arc::new(self.finish())
    }
}
