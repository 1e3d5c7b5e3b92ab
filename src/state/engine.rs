//! Folds decoded commands into a [`DeviceState`].
//!
//! Structural handshake commands (`_top`, `_MeC`, `_MvC`, `_SSC`, `_MAC`,
//! `InPr`, `AMIP`, `MPrp`) create the entries they describe. Every other
//! command addressing an id that is not in the tree is dropped with a
//! warning. Each applied command overwrites the fields it carries and
//! reports the paths it wrote, even when the values did not change.

use tracing::{trace, warn};

use super::path::{ChangedPaths, StatePath};
use super::tree::*;
use crate::core::{media_player_key_for, Error, MaskRect, Result, VideoMode};
use crate::protocol::commands::{Command, MultiViewerProperties, Topology};

/// Applies one command and returns the paths it touched
pub fn apply(state: &mut DeviceState, command: &Command) -> ChangedPaths {
    let mut changes = ChangedPaths::new();
    match apply_command(state, command, &mut changes) {
        Ok(()) => {
            if !changes.is_empty() {
                trace!(command = %command.name_str(), paths = changes.len(), "applied command");
            }
            changes
        }
        Err(Error::StaleReference(reference)) => {
            warn!(command = %command.name_str(), %reference, "dropping command for unknown id");
            ChangedPaths::new()
        }
        Err(e) => {
            warn!(command = %command.name_str(), error = %e, "failed to apply command");
            ChangedPaths::new()
        }
    }
}

impl DeviceState {
    /// See [`apply`]
    pub fn apply(&mut self, command: &Command) -> ChangedPaths {
        apply(self, command)
    }
}

fn info_path(key: &str) -> StatePath {
    StatePath::root("info").key(key)
}

fn me_path(me: u8) -> StatePath {
    StatePath::root("video").key("mixEffects").index(me)
}

fn usk_path(me: u8, keyer: u8) -> StatePath {
    me_path(me).key("upstreamKeyers").index(keyer)
}

fn dsk_path(keyer: u8) -> StatePath {
    StatePath::root("video").key("downstreamKeyers").index(keyer)
}

fn ssrc_path(ssrc: u8) -> StatePath {
    StatePath::root("video").key("superSources").index(ssrc)
}

fn mv_path(mv: u8) -> StatePath {
    StatePath::root("settings").key("multiViewers").index(mv)
}

fn mix_effect(state: &mut DeviceState, me: u8) -> Result<&mut MixEffectState> {
    state
        .video
        .mix_effects
        .get_mut(&me)
        .ok_or_else(|| Error::stale_reference(format!("mix effect {}", me)))
}

fn upstream_keyer(state: &mut DeviceState, me: u8, keyer: u8) -> Result<&mut UpstreamKeyerState> {
    mix_effect(state, me)?
        .upstream_keyers
        .get_mut(&keyer)
        .ok_or_else(|| Error::stale_reference(format!("upstream keyer {} on mix effect {}", keyer, me)))
}

fn downstream_keyer(state: &mut DeviceState, keyer: u8) -> Result<&mut DownstreamKeyerState> {
    state
        .video
        .downstream_keyers
        .get_mut(&keyer)
        .ok_or_else(|| Error::stale_reference(format!("downstream keyer {}", keyer)))
}

fn super_source(state: &mut DeviceState, ssrc: u8) -> Result<&mut SuperSourceState> {
    state
        .video
        .super_sources
        .get_mut(&ssrc)
        .ok_or_else(|| Error::stale_reference(format!("super source {}", ssrc)))
}

fn multi_viewer(state: &mut DeviceState, mv: u8) -> Result<&mut MultiViewerState> {
    state
        .settings
        .multi_viewers
        .get_mut(&mv)
        .ok_or_else(|| Error::stale_reference(format!("multiviewer {}", mv)))
}

/// Key source to store for a reported fill/key pair
fn paired_key(fill: u16, key: u16) -> u16 {
    media_player_key_for(fill).unwrap_or(key)
}

fn apply_command(state: &mut DeviceState, command: &Command, changes: &mut ChangedPaths) -> Result<()> {
    match command {
        // Device description
        Command::Version(c) => {
            state.info.api_version = Some(c.version);
            changes.insert(info_path("apiVersion"));
        }
        Command::ProductId(c) => {
            state.info.product_name = Some(c.name.clone());
            changes.insert(info_path("productName"));
            if let Some(model) = c.model {
                state.info.model = Some(model);
                changes.insert(info_path("model"));
            }
        }
        Command::Topology(c) => apply_topology(state, c, changes),
        Command::MixEffectConfig(c) => {
            state.info.mix_effect_keyers.insert(c.mix_effect, c.keyers);
            changes.insert(info_path("mixEffectKeyers").index(c.mix_effect));
            let me = state.video.mix_effects.entry(c.mix_effect).or_default();
            for keyer in 0..c.keyers {
                if !me.upstream_keyers.contains_key(&keyer) {
                    me.upstream_keyers.insert(keyer, UpstreamKeyerState::default());
                    changes.insert(usk_path(c.mix_effect, keyer));
                }
            }
        }
        Command::MediaPoolConfig(c) => {
            state.info.media_pool = Some(*c);
            changes.insert(info_path("mediaPool"));
        }
        Command::MultiViewerConfig(c) => {
            state.info.multi_viewer = Some(*c);
            changes.insert(info_path("multiViewer"));
            for mv in 0..c.count {
                let viewer = state.settings.multi_viewers.entry(mv).or_default();
                for window in 0..c.windows {
                    if !viewer.windows.contains_key(&window) {
                        viewer.windows.insert(window, MultiViewerWindowState::default());
                        changes.insert(mv_path(mv).key("windows").index(window));
                    }
                }
            }
        }
        Command::SuperSourceConfig(c) => {
            state.info.super_source_boxes = Some(c.boxes);
            changes.insert(info_path("superSourceBoxes"));
            for (ssrc, source) in state.video.super_sources.iter_mut() {
                for index in 0..c.boxes {
                    if !source.boxes.contains_key(&index) {
                        source.boxes.insert(index, SuperSourceBoxState::default());
                        changes.insert(ssrc_path(*ssrc).key("boxes").index(index));
                    }
                }
            }
        }
        Command::AudioMixerConfig(c) => {
            state.info.audio_mixer = Some(*c);
            changes.insert(info_path("audioMixer"));
        }
        Command::MacroPoolConfig(c) => {
            state.info.macro_pool = Some(c.macros);
            changes.insert(info_path("macroPool"));
            for index in 0..c.macros as u16 {
                if !state.macros.slots.contains_key(&index) {
                    state.macros.slots.insert(index, MacroSlot::default());
                    changes.insert(StatePath::root("macros").key("slots").index(index));
                }
            }
        }
        Command::Warning(c) => {
            state.info.last_warning = Some(c.text.clone());
            changes.insert(info_path("lastWarning"));
        }
        Command::InputProperties(c) => {
            let input = state.inputs.entry(c.id).or_default();
            input.long_name = c.long_name.clone();
            input.short_name = c.short_name.clone();
            input.are_names_default = c.are_names_default;
            input.available_external_ports = c.available_external_ports;
            input.external_port_type = c.external_port_type;
            input.internal_port_type = c.internal_port_type;
            input.source_availability = c.source_availability;
            input.mix_effect_availability = c.mix_effect_availability;
            changes.insert(StatePath::root("inputs").index(c.id));
        }
        Command::VideoMode(c) => apply_video_mode(state, c.mode, changes),

        // Mix effect blocks
        Command::ProgramInput(c) => {
            mix_effect(state, c.mix_effect)?.program_input = c.source;
            changes.insert(me_path(c.mix_effect).key("programInput"));
        }
        Command::PreviewInput(c) => {
            let me = mix_effect(state, c.mix_effect)?;
            me.preview_input = c.source;
            changes.insert(me_path(c.mix_effect).key("previewInput"));
            if let Some(live) = c.preview_live {
                me.preview_live = Some(live);
                changes.insert(me_path(c.mix_effect).key("previewLive"));
            }
        }
        Command::TransitionProperties(c) => {
            let transition = &mut mix_effect(state, c.mix_effect)?.transition;
            transition.style = c.style;
            transition.selection = c.selection;
            transition.next_style = c.next_style;
            transition.next_selection = c.next_selection;
            let path = me_path(c.mix_effect).key("transition");
            for key in ["style", "selection", "nextStyle", "nextSelection"] {
                changes.insert(path.clone().key(key));
            }
        }
        Command::TransitionPosition(c) => {
            let transition = &mut mix_effect(state, c.mix_effect)?.transition;
            transition.in_transition = c.in_transition;
            transition.remaining_frames = c.remaining_frames;
            transition.position = c.position;
            let path = me_path(c.mix_effect).key("transition");
            for key in ["inTransition", "remainingFrames", "position"] {
                changes.insert(path.clone().key(key));
            }
        }
        Command::TransitionMix(c) => {
            mix_effect(state, c.mix_effect)?.transition.mix.rate = c.rate;
            changes.insert(me_path(c.mix_effect).key("transition").key("mix"));
        }
        Command::TransitionDip(c) => {
            let dip = &mut mix_effect(state, c.mix_effect)?.transition.dip;
            dip.rate = c.rate;
            dip.input = c.input;
            changes.insert(me_path(c.mix_effect).key("transition").key("dip"));
        }
        Command::TransitionWipe(c) => {
            mix_effect(state, c.mix_effect)?.transition.wipe = WipeSettings {
                rate: c.rate,
                pattern: c.pattern,
                border_width: c.border_width,
                border_input: c.border_input,
                symmetry: c.symmetry,
                border_softness: c.border_softness,
                x_position: c.x_position,
                y_position: c.y_position,
                reverse_direction: c.reverse_direction,
                flip_flop: c.flip_flop,
            };
            changes.insert(me_path(c.mix_effect).key("transition").key("wipe"));
        }
        Command::FadeToBlackRate(c) => {
            mix_effect(state, c.mix_effect)?.fade_to_black.rate = c.rate;
            changes.insert(me_path(c.mix_effect).key("fadeToBlack").key("rate"));
        }
        Command::FadeToBlackState(c) => {
            let ftb = &mut mix_effect(state, c.mix_effect)?.fade_to_black;
            ftb.fully_black = c.fully_black;
            ftb.in_transition = c.in_transition;
            ftb.remaining_frames = c.remaining_frames;
            let path = me_path(c.mix_effect).key("fadeToBlack");
            for key in ["fullyBlack", "inTransition", "remainingFrames"] {
                changes.insert(path.clone().key(key));
            }
        }

        // Upstream keyers
        Command::KeyerOnAir(c) => {
            upstream_keyer(state, c.mix_effect, c.keyer)?.on_air = c.on_air;
            changes.insert(usk_path(c.mix_effect, c.keyer).key("onAir"));
        }
        Command::KeyerBase(c) => {
            let keyer = upstream_keyer(state, c.mix_effect, c.keyer)?;
            keyer.key_type = c.key_type;
            keyer.can_fly = c.can_fly;
            keyer.fly_enabled = c.fly_enabled;
            keyer.fill_source = c.fill_source;
            keyer.key_source = paired_key(c.fill_source, c.key_source);
            keyer.mask_enabled = c.mask_enabled;
            keyer.mask = c.mask;
            let path = usk_path(c.mix_effect, c.keyer);
            for key in [
                "keyType",
                "canFly",
                "flyEnabled",
                "fillSource",
                "keySource",
                "maskEnabled",
                "mask",
            ] {
                changes.insert(path.clone().key(key));
            }
        }
        Command::KeyerLuma(c) => {
            upstream_keyer(state, c.mix_effect, c.keyer)?.luma = LumaSettings {
                pre_multiplied: c.pre_multiplied,
                clip: c.clip,
                gain: c.gain,
                invert: c.invert,
            };
            changes.insert(usk_path(c.mix_effect, c.keyer).key("luma"));
        }
        Command::KeyerChroma(c) => {
            upstream_keyer(state, c.mix_effect, c.keyer)?.chroma = ChromaSettings {
                hue: c.hue,
                gain: c.gain,
                y_suppress: c.y_suppress,
                lift: c.lift,
                narrow: c.narrow,
            };
            changes.insert(usk_path(c.mix_effect, c.keyer).key("chroma"));
        }

        // Downstream keyers
        Command::DskSources(c) => {
            let dsk = downstream_keyer(state, c.keyer)?;
            dsk.fill_source = c.fill_source;
            dsk.key_source = paired_key(c.fill_source, c.key_source);
            changes.insert(dsk_path(c.keyer).key("fillSource"));
            changes.insert(dsk_path(c.keyer).key("keySource"));
        }
        Command::DskProperties(c) => {
            let dsk = downstream_keyer(state, c.keyer)?;
            dsk.tie = c.tie;
            dsk.rate = c.rate;
            dsk.luma = LumaSettings {
                pre_multiplied: c.pre_multiplied,
                clip: c.clip,
                gain: c.gain,
                invert: c.invert,
            };
            dsk.mask_enabled = c.mask_enabled;
            dsk.mask = c.mask;
            let path = dsk_path(c.keyer);
            for key in ["tie", "rate", "luma", "maskEnabled", "mask"] {
                changes.insert(path.clone().key(key));
            }
        }
        Command::DskState(c) => {
            let dsk = downstream_keyer(state, c.keyer)?;
            dsk.on_air = c.on_air;
            dsk.in_transition = c.in_transition;
            dsk.is_auto_transitioning = c.is_auto_transitioning;
            dsk.remaining_frames = c.remaining_frames;
            let path = dsk_path(c.keyer);
            for key in ["onAir", "inTransition", "isAutoTransitioning", "remainingFrames"] {
                changes.insert(path.clone().key(key));
            }
        }

        // Audio
        Command::AudioMixerInput(c) => {
            state.audio.inputs.insert(
                c.index,
                AudioInputState {
                    source_type: c.source_type,
                    from_media_player: c.from_media_player,
                    plug_type: c.plug_type,
                    mix_option: c.mix_option,
                    gain: c.gain,
                    balance: c.balance,
                },
            );
            changes.insert(StatePath::root("audio").key("inputs").index(c.index));
        }
        Command::AudioMixerMaster(c) => {
            state.audio.master = Some(AudioMasterState {
                gain: c.gain,
                balance: c.balance,
                follow_fade_to_black: c.follow_fade_to_black,
            });
            changes.insert(StatePath::root("audio").key("master"));
        }

        Command::MediaPlayerSource(c) => {
            let player = state
                .media
                .players
                .get_mut(&c.player)
                .ok_or_else(|| Error::stale_reference(format!("media player {}", c.player)))?;
            player.source_type = c.source_type;
            player.still_index = c.still_index;
            player.clip_index = c.clip_index;
            changes.insert(StatePath::root("media").key("players").index(c.player));
        }

        // Super source
        Command::SuperSourceProperties(c) => {
            let ssrc = super_source(state, c.super_source)?;
            ssrc.fill_source = c.fill_source;
            ssrc.key_source = c.key_source;
            ssrc.art_option = c.art_option;
            ssrc.luma = LumaSettings {
                pre_multiplied: c.pre_multiplied,
                clip: c.clip,
                gain: c.gain,
                invert: c.invert,
            };
            ssrc.border = BorderSettings {
                enabled: c.border_enabled,
                hue: c.border_hue,
                saturation: c.border_saturation,
                luma: c.border_luma,
            };
            let path = ssrc_path(c.super_source);
            for key in ["fillSource", "keySource", "artOption", "luma", "border"] {
                changes.insert(path.clone().key(key));
            }
        }
        Command::SuperSourceBox(c) => {
            let ssrc = c.super_source;
            let slot = super_source(state, ssrc)?
                .boxes
                .get_mut(&c.index)
                .ok_or_else(|| Error::stale_reference(format!("box {} of super source {}", c.index, ssrc)))?;
            *slot = SuperSourceBoxState {
                enabled: c.enabled,
                source: c.source,
                x: c.x,
                y: c.y,
                size: c.size,
                cropped: c.cropped,
                crop: MaskRect {
                    top: c.crop_top,
                    bottom: c.crop_bottom,
                    left: c.crop_left,
                    right: c.crop_right,
                },
            };
            changes.insert(ssrc_path(ssrc).key("boxes").index(c.index));
        }

        // Multiviewers
        Command::MultiViewerProperties(c) => apply_multi_viewer_properties(state, c, changes)?,
        Command::MultiViewerWindow(c) => {
            let window = multi_viewer(state, c.multiviewer)?.windows.entry(c.window).or_default();
            window.source = c.source;
            window.supports_vu_meter = c.supports_vu_meter;
            if c.supports_safe_area.is_some() {
                window.supports_safe_area = c.supports_safe_area;
            }
            changes.insert(mv_path(c.multiviewer).key("windows").index(c.window));
        }

        // Macros
        Command::MacroProperties(c) => {
            state.macros.slots.insert(
                c.index,
                MacroSlot {
                    is_used: c.is_used,
                    has_unsupported_ops: c.has_unsupported_ops,
                    name: c.name.clone(),
                    description: c.description.clone(),
                },
            );
            changes.insert(StatePath::root("macros").key("slots").index(c.index));
        }
        Command::MacroRunStatus(c) => {
            state.macros.player = MacroPlayerState {
                is_running: c.is_running,
                is_waiting: c.is_waiting,
                loop_enabled: c.loop_enabled,
                index: (c.index != 0xffff).then_some(c.index),
            };
            changes.insert(StatePath::root("macros").key("player"));
        }

        // Tally lists are complete snapshots
        Command::TallyByIndex(c) => {
            state.tally.by_index = c.flags.clone();
            changes.insert(StatePath::root("tally").key("byIndex"));
        }
        Command::TallyBySource(c) => {
            state.tally.by_source = c.entries.iter().copied().collect();
            changes.insert(StatePath::root("tally").key("bySource"));
        }

        // Requests sent to the device, the end-of-handshake marker and
        // unknown records leave the tree alone
        Command::InitComplete(_)
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
        | Command::MacroAction(_)
        | Command::Unrecognized(_) => {}
    }
    Ok(())
}

fn apply_topology(state: &mut DeviceState, c: &Topology, changes: &mut ChangedPaths) {
    state.info.topology = Some(*c);
    changes.insert(info_path("topology"));

    for me in 0..c.mix_effects {
        if !state.video.mix_effects.contains_key(&me) {
            state.video.mix_effects.insert(me, MixEffectState::default());
            changes.insert(me_path(me));
        }
    }
    for keyer in 0..c.downstream_keyers {
        if !state.video.downstream_keyers.contains_key(&keyer) {
            state.video.downstream_keyers.insert(keyer, DownstreamKeyerState::default());
            changes.insert(dsk_path(keyer));
        }
    }
    let boxes = state.info.super_source_boxes.unwrap_or(0);
    for ssrc in 0..c.super_sources {
        if !state.video.super_sources.contains_key(&ssrc) {
            let source = SuperSourceState {
                boxes: (0..boxes).map(|i| (i, SuperSourceBoxState::default())).collect(),
                ..SuperSourceState::default()
            };
            state.video.super_sources.insert(ssrc, source);
            changes.insert(ssrc_path(ssrc));
        }
    }
    for player in 0..c.media_players {
        if !state.media.players.contains_key(&player) {
            state.media.players.insert(player, MediaPlayerState::default());
            changes.insert(StatePath::root("media").key("players").index(player));
        }
    }
    for mv in 0..c.multiviewers.unwrap_or(0) {
        if !state.settings.multi_viewers.contains_key(&mv) {
            state.settings.multi_viewers.insert(mv, MultiViewerState::default());
            changes.insert(mv_path(mv));
        }
    }
}

/// A new video mode resets every keyer mask to the raster's full frame and
/// every transition, fade-to-black and downstream-keyer rate to one second.
fn apply_video_mode(state: &mut DeviceState, mode: VideoMode, changes: &mut ChangedPaths) {
    let previous = state.video.mode.replace(mode);
    changes.insert(StatePath::root("video").key("mode"));
    if previous == Some(mode) {
        return;
    }

    let mask = MaskRect::default_for(mode);
    let rate = mode.frames_per_second();
    for (me, block) in state.video.mix_effects.iter_mut() {
        let transition = &mut block.transition;
        transition.mix.rate = rate;
        transition.dip.rate = rate;
        transition.wipe.rate = rate;
        block.fade_to_black.rate = rate;
        let path = me_path(*me);
        changes.insert(path.clone().key("transition").key("mix"));
        changes.insert(path.clone().key("transition").key("dip"));
        changes.insert(path.clone().key("transition").key("wipe"));
        changes.insert(path.key("fadeToBlack").key("rate"));

        for (keyer, usk) in block.upstream_keyers.iter_mut() {
            usk.mask = mask;
            changes.insert(usk_path(*me, *keyer).key("mask"));
        }
    }
    for (keyer, dsk) in state.video.downstream_keyers.iter_mut() {
        dsk.mask = mask;
        dsk.rate = rate;
        changes.insert(dsk_path(*keyer).key("mask"));
        changes.insert(dsk_path(*keyer).key("rate"));
    }
}

/// Flipping the program/preview swap moves windows 0 and 1 with it.
fn apply_multi_viewer_properties(
    state: &mut DeviceState,
    c: &MultiViewerProperties,
    changes: &mut ChangedPaths,
) -> Result<()> {
    let viewer = multi_viewer(state, c.multiviewer)?;
    let swap_changed = viewer.program_preview_swapped != c.program_preview_swapped;
    viewer.layout = c.layout;
    viewer.program_preview_swapped = c.program_preview_swapped;
    let path = mv_path(c.multiviewer);
    changes.insert(path.clone().key("layout"));
    changes.insert(path.clone().key("programPreviewSwapped"));

    if swap_changed {
        if let (Some(first), Some(second)) = (viewer.windows.get(&0).cloned(), viewer.windows.get(&1).cloned()) {
            for (index, from) in [(0u8, second), (1u8, first)] {
                if let Some(window) = viewer.windows.get_mut(&index) {
                    window.source = from.source;
                    window.supports_vu_meter = from.supports_vu_meter;
                }
                changes.insert(path.clone().key("windows").index(index));
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ProtocolVersion;
    use crate::protocol::commands::{
        Cut, DskProperties, DskSources, DskState, InitComplete, InputProperties, KeyerBase, KeyerOnAir,
        MacroRunStatus, MediaPlayerSource, MixEffectConfig, MultiViewerConfig, MultiViewerWindow, ProductId,
        ProgramInput, SetProgramInput, SuperSourceConfig, TallyBySource, TallyFlags, TransitionDip,
        UnrecognizedCommand, Version, VideoModeGet,
    };

    fn topology(mix_effects: u8, downstream_keyers: u8) -> Command {
        Topology {
            mix_effects,
            downstream_keyers,
            media_players: 2,
            super_sources: 1,
            multiviewers: Some(1),
            ..Topology::default()
        }
        .into()
    }

    fn populated() -> DeviceState {
        let mut state = DeviceState::new();
        for command in [
            Command::from(SuperSourceConfig { boxes: 4 }),
            topology(2, 2),
            MixEffectConfig { mix_effect: 0, keyers: 2 }.into(),
            MixEffectConfig { mix_effect: 1, keyers: 1 }.into(),
            MultiViewerConfig {
                count: 1,
                windows: 10,
                can_route_inputs: None,
                can_swap_preview_program: None,
                can_toggle_safe_area: None,
            }
            .into(),
        ] {
            state.apply(&command);
        }
        state
    }

    #[test]
    fn test_structural_commands_create_entries() {
        let state = populated();
        assert_eq!(state.video.mix_effects.len(), 2);
        assert_eq!(state.video.mix_effects[&0].upstream_keyers.len(), 2);
        assert_eq!(state.video.mix_effects[&1].upstream_keyers.len(), 1);
        assert_eq!(state.video.downstream_keyers.len(), 2);
        assert_eq!(state.video.super_sources[&0].boxes.len(), 4);
        assert_eq!(state.media.players.len(), 2);
        assert_eq!(state.settings.multi_viewers[&0].windows.len(), 10);
    }

    #[test]
    fn test_program_input_touches_only_its_block() {
        let mut state = populated();
        let before = state.clone();
        let changes = state.apply(&ProgramInput { mix_effect: 1, source: 2 }.into());

        assert_eq!(changes.len(), 1);
        assert!(changes.contains("video.mixEffects.1.programInput"));
        assert_eq!(state.video.mix_effects[&1].program_input, 2);
        assert_eq!(state.video.mix_effects[&0], before.video.mix_effects[&0]);
        assert_eq!(state.video.downstream_keyers, before.video.downstream_keyers);
    }

    #[test]
    fn test_reapplying_is_idempotent_but_reported() {
        let mut state = populated();
        let command = Command::from(TransitionDip {
            mix_effect: 0,
            rate: 40,
            input: 2001,
        });
        let first = state.apply(&command);
        let snapshot = state.clone();
        let second = state.apply(&command);
        assert_eq!(state, snapshot);
        assert_eq!(first, second);
        assert!(second.contains("video.mixEffects.0.transition.dip"));
    }

    #[test]
    fn test_stale_reference_dropped() {
        let mut state = populated();
        let before = state.clone();
        let commands = [
            Command::from(ProgramInput { mix_effect: 7, source: 1 }),
            KeyerOnAir {
                mix_effect: 1,
                keyer: 3,
                on_air: true,
            }
            .into(),
            DskState {
                keyer: 5,
                on_air: true,
                in_transition: false,
                is_auto_transitioning: false,
                remaining_frames: 0,
            }
            .into(),
            MediaPlayerSource {
                player: 9,
                source_type: 1,
                still_index: 0,
                clip_index: 0,
            }
            .into(),
        ];
        for command in &commands {
            assert!(state.apply(command).is_empty());
        }
        assert_eq!(state, before);
    }

    #[test]
    fn test_unknown_and_outbound_commands_are_noops() {
        let mut state = populated();
        let before = state.clone();
        let commands = [
            Command::Unrecognized(UnrecognizedCommand {
                name: *b"FASP",
                body: bytes::Bytes::from_static(&[1, 2, 3, 4]),
            }),
            SetProgramInput { mix_effect: 0, source: 3 }.into(),
            Cut { mix_effect: 0 }.into(),
            InitComplete.into(),
        ];
        for command in &commands {
            assert!(state.apply(command).is_empty());
        }
        assert_eq!(state, before);
    }

    #[test]
    fn test_video_mode_cascade_sd_and_hd() {
        let mut state = populated();
        state.apply(
            &KeyerBase {
                mix_effect: 0,
                keyer: 1,
                key_type: 0,
                can_fly: true,
                fly_enabled: false,
                fill_source: 1,
                key_source: 2,
                mask_enabled: true,
                mask: MaskRect {
                    top: 1.0,
                    bottom: -1.0,
                    left: 2.0,
                    right: -2.0,
                },
            }
            .into(),
        );

        let changes = state.apply(&VideoModeGet { mode: VideoMode::P625I50_16X9 }.into());
        assert!(changes.contains("video.mode"));
        assert!(changes.contains("video.mixEffects.0.upstreamKeyers.1.mask"));
        assert!(changes.contains("video.downstreamKeyers.1.mask"));
        assert_eq!(state.video.mix_effects[&0].upstream_keyers[&1].mask, MaskRect::SD_DEFAULT);
        assert_eq!(state.video.downstream_keyers[&0].mask, MaskRect::SD_DEFAULT);
        assert_eq!(state.video.mix_effects[&1].transition.mix.rate, 25);
        assert_eq!(state.video.downstream_keyers[&1].rate, 25);
        assert_eq!(state.video.mix_effects[&0].upstream_keyers[&1].fill_source, 1);

        state.apply(&VideoModeGet { mode: VideoMode::N1080I5994 }.into());
        assert_eq!(state.video.mix_effects[&1].upstream_keyers[&0].mask, MaskRect::HD_DEFAULT);
        assert_eq!(state.video.downstream_keyers[&1].mask, MaskRect::HD_DEFAULT);
        assert_eq!(state.video.mix_effects[&0].fade_to_black.rate, 30);
    }

    #[test]
    fn test_same_video_mode_keeps_reported_masks() {
        let mut state = populated();
        state.apply(&VideoModeGet { mode: VideoMode::N1080I5994 }.into());
        let custom = MaskRect {
            top: 2.0,
            bottom: -2.0,
            left: 3.0,
            right: -3.0,
        };
        state.apply(
            &DskProperties {
                keyer: 0,
                tie: false,
                rate: 12,
                pre_multiplied: false,
                clip: 50.0,
                gain: 70.5,
                invert: false,
                mask_enabled: true,
                mask: custom,
            }
            .into(),
        );
        let changes = state.apply(&VideoModeGet { mode: VideoMode::N1080I5994 }.into());
        assert_eq!(changes.len(), 1);
        assert_eq!(state.video.downstream_keyers[&0].mask, custom);
        assert_eq!(state.video.downstream_keyers[&0].rate, 12);
    }

    #[test]
    fn test_media_player_fill_derives_key() {
        let mut state = populated();
        state.apply(
            &DskSources {
                keyer: 1,
                fill_source: 3020,
                key_source: 0,
            }
            .into(),
        );
        assert_eq!(state.video.downstream_keyers[&1].key_source, 3021);

        state.apply(
            &DskSources {
                keyer: 1,
                fill_source: 1,
                key_source: 4,
            }
            .into(),
        );
        assert_eq!(state.video.downstream_keyers[&1].key_source, 4);

        state.apply(
            &KeyerBase {
                mix_effect: 0,
                keyer: 0,
                key_type: 1,
                can_fly: false,
                fly_enabled: false,
                fill_source: 3010,
                key_source: 1,
                mask_enabled: false,
                mask: MaskRect::HD_DEFAULT,
            }
            .into(),
        );
        assert_eq!(state.video.mix_effects[&0].upstream_keyers[&0].key_source, 3011);
    }

    #[test]
    fn test_multiviewer_swap_moves_windows() {
        let mut state = populated();
        state.apply(
            &MultiViewerWindow {
                multiviewer: 0,
                window: 0,
                source: 10010,
                supports_vu_meter: true,
                supports_safe_area: Some(true),
            }
            .into(),
        );
        state.apply(
            &MultiViewerWindow {
                multiviewer: 0,
                window: 1,
                source: 10011,
                supports_vu_meter: false,
                supports_safe_area: Some(false),
            }
            .into(),
        );

        let swap = Command::from(MultiViewerProperties {
            multiviewer: 0,
            layout: 0,
            program_preview_swapped: true,
        });
        let changes = state.apply(&swap);
        let windows = &state.settings.multi_viewers[&0].windows;
        assert_eq!(windows[&0].source, 10011);
        assert!(!windows[&0].supports_vu_meter);
        assert_eq!(windows[&1].source, 10010);
        assert!(windows[&1].supports_vu_meter);
        // Safe-area support belongs to the window position
        assert_eq!(windows[&0].supports_safe_area, Some(true));
        assert!(changes.contains("settings.multiViewers.0.windows.0"));
        assert!(changes.contains("settings.multiViewers.0.windows.1"));

        // Same flag again: no further swap
        let changes = state.apply(&swap);
        assert_eq!(state.settings.multi_viewers[&0].windows[&0].source, 10011);
        assert!(!changes.contains("settings.multiViewers.0.windows.0"));
    }

    #[test]
    fn test_tally_replaced_wholesale() {
        let mut state = populated();
        state.apply(
            &TallyBySource {
                entries: vec![(1, TallyFlags(1)), (2, TallyFlags(2))],
            }
            .into(),
        );
        let changes = state.apply(
            &TallyBySource {
                entries: vec![(3, TallyFlags(3))],
            }
            .into(),
        );
        assert!(changes.contains("tally.bySource"));
        assert_eq!(state.tally.by_source.len(), 1);
        assert_eq!(state.tally.by_source[&3], TallyFlags(3));
    }

    #[test]
    fn test_device_info_and_inputs() {
        let mut state = DeviceState::new();
        state.apply(&Version { version: ProtocolVersion::V8_0 }.into());
        state.apply(
            &ProductId {
                name: "Production Switcher".into(),
                model: Some(3),
            }
            .into(),
        );
        state.apply(
            &InputProperties {
                id: 1,
                long_name: "Camera 1".into(),
                short_name: "CAM1".into(),
                are_names_default: true,
                available_external_ports: 1,
                external_port_type: 1,
                internal_port_type: 0,
                source_availability: 0x1f,
                mix_effect_availability: 3,
            }
            .into(),
        );
        state.apply(&MacroRunStatus {
            is_running: false,
            is_waiting: false,
            loop_enabled: false,
            index: 0xffff,
        }
        .into());

        assert_eq!(state.info.api_version, Some(ProtocolVersion::V8_0));
        assert_eq!(state.info.model, Some(3));
        assert_eq!(state.inputs[&1].short_name, "CAM1");
        assert_eq!(state.macros.player.index, None);
    }
}
