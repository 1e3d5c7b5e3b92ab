//! The device-state tree.
//!
//! Every map is keyed by the id the device uses on the wire, so entries stay
//! stable across reconfiguration. Containers are only created by the
//! structural handshake commands; see [`super::engine`].

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::core::{MaskRect, ProtocolVersion, VideoMode};
use crate::protocol::commands::{AudioMixerConfig, MediaPoolConfig, MultiViewerConfig, TallyFlags, Topology};

/// Full mirrored state of one device
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceState {
    pub info: DeviceInfo,
    pub video: VideoState,
    pub inputs: BTreeMap<u16, InputState>,
    pub media: MediaState,
    pub audio: AudioState,
    pub settings: SettingsState,
    pub macros: MacroState,
    pub tally: TallyState,
}

impl DeviceState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drops everything; used when a session reconnects
    pub fn clear(&mut self) {
        *self = DeviceState::default();
    }
}

/// What the device reported about itself during the handshake
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceInfo {
    pub api_version: Option<ProtocolVersion>,
    pub product_name: Option<String>,
    pub model: Option<u8>,
    pub topology: Option<Topology>,
    /// Keyers per mix-effect block from `_MeC`
    pub mix_effect_keyers: BTreeMap<u8, u8>,
    pub media_pool: Option<MediaPoolConfig>,
    pub multi_viewer: Option<MultiViewerConfig>,
    pub super_source_boxes: Option<u8>,
    pub audio_mixer: Option<AudioMixerConfig>,
    pub macro_pool: Option<u8>,
    pub last_warning: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoState {
    pub mode: Option<VideoMode>,
    pub mix_effects: BTreeMap<u8, MixEffectState>,
    pub downstream_keyers: BTreeMap<u8, DownstreamKeyerState>,
    pub super_sources: BTreeMap<u8, SuperSourceState>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MixEffectState {
    pub program_input: u16,
    pub preview_input: u16,
    /// Only reported by firmware that can run preview transitions live
    pub preview_live: Option<bool>,
    pub transition: TransitionState,
    pub fade_to_black: FadeToBlackState,
    pub upstream_keyers: BTreeMap<u8, UpstreamKeyerState>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransitionState {
    pub style: u8,
    pub selection: u8,
    pub next_style: u8,
    pub next_selection: u8,
    pub in_transition: bool,
    pub remaining_frames: u8,
    /// 0.0 to 1.0
    pub position: f64,
    pub mix: MixSettings,
    pub dip: DipSettings,
    pub wipe: WipeSettings,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MixSettings {
    pub rate: u8,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DipSettings {
    pub rate: u8,
    pub input: u16,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WipeSettings {
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

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FadeToBlackState {
    pub rate: u8,
    pub fully_black: bool,
    pub in_transition: bool,
    pub remaining_frames: u8,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpstreamKeyerState {
    pub on_air: bool,
    pub key_type: u8,
    pub can_fly: bool,
    pub fly_enabled: bool,
    pub fill_source: u16,
    pub key_source: u16,
    pub mask_enabled: bool,
    pub mask: MaskRect,
    pub luma: LumaSettings,
    pub chroma: ChromaSettings,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LumaSettings {
    pub pre_multiplied: bool,
    pub clip: f64,
    pub gain: f64,
    pub invert: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChromaSettings {
    pub hue: f64,
    pub gain: f64,
    pub y_suppress: f64,
    pub lift: f64,
    pub narrow: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DownstreamKeyerState {
    pub fill_source: u16,
    pub key_source: u16,
    pub tie: bool,
    pub rate: u8,
    pub luma: LumaSettings,
    pub mask_enabled: bool,
    pub mask: MaskRect,
    pub on_air: bool,
    pub in_transition: bool,
    pub is_auto_transitioning: bool,
    pub remaining_frames: u8,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SuperSourceState {
    pub fill_source: u16,
    pub key_source: u16,
    pub art_option: u8,
    pub luma: LumaSettings,
    pub border: BorderSettings,
    pub boxes: BTreeMap<u8, SuperSourceBoxState>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BorderSettings {
    pub enabled: bool,
    pub hue: f64,
    pub saturation: f64,
    pub luma: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SuperSourceBoxState {
    pub enabled: bool,
    pub source: u16,
    pub x: f64,
    pub y: f64,
    pub size: f64,
    pub cropped: bool,
    pub crop: MaskRect,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InputState {
    pub long_name: String,
    pub short_name: String,
    pub are_names_default: bool,
    pub available_external_ports: u16,
    pub external_port_type: u16,
    pub internal_port_type: u8,
    pub source_availability: u8,
    pub mix_effect_availability: u8,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaState {
    pub players: BTreeMap<u8, MediaPlayerState>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaPlayerState {
    pub source_type: u8,
    pub still_index: u8,
    pub clip_index: u8,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AudioState {
    pub master: Option<AudioMasterState>,
    pub inputs: BTreeMap<u16, AudioInputState>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AudioMasterState {
    /// dB
    pub gain: f64,
    pub balance: f64,
    pub follow_fade_to_black: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AudioInputState {
    pub source_type: u8,
    pub from_media_player: bool,
    pub plug_type: u8,
    pub mix_option: u8,
    pub gain: f64,
    pub balance: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsState {
    pub multi_viewers: BTreeMap<u8, MultiViewerState>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MultiViewerState {
    pub layout: u8,
    pub program_preview_swapped: bool,
    pub windows: BTreeMap<u8, MultiViewerWindowState>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MultiViewerWindowState {
    pub source: u16,
    pub supports_vu_meter: bool,
    pub supports_safe_area: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MacroState {
    pub slots: BTreeMap<u16, MacroSlot>,
    pub player: MacroPlayerState,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MacroSlot {
    pub is_used: bool,
    pub has_unsupported_ops: bool,
    pub name: String,
    pub description: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MacroPlayerState {
    pub is_running: bool,
    pub is_waiting: bool,
    pub loop_enabled: bool,
    /// Slot being played, if any
    pub index: Option<u16>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TallyState {
    pub by_index: Vec<TallyFlags>,
    pub by_source: BTreeMap<u16, TallyFlags>,
}
