//! Scream Tracker 3 command table. Effect codes are letters, `A` = 1.
//!
//! Impulse Tracker uses the same letters; `it.rs` reuses [`decode_common`]
//! and overrides the few commands that differ.

use tp_ir::{EffectCommand, NewNoteAction};

use super::{bcd_row, push, DecodeContext};
use crate::channel::EnvelopeKind;
use crate::effect::{CombinedEffect, Effect, OscillatorTarget, PortaStyle, SlideStyle};
use crate::memory::MemoryFamily;
use crate::past_voices::PastNoteAction;

pub(super) fn decode_volume(_ctx: &DecodeContext, volume: u8, out: &mut CombinedEffect) {
    push(out, Effect::SetVolume(volume.min(64)));
}

pub(super) fn decode_effect(ctx: &DecodeContext, cmd: EffectCommand, out: &mut CombinedEffect) {
    match cmd.code {
        // T: tempo only, values below 0x20 are ignored
        20 => {
            if cmd.param >= 0x20 {
                push(out, Effect::SetTempo(cmd.param));
            }
        }
        // X: 0x00-0x80, 0xA4 is surround
        24 => {
            if cmd.param <= 0x80 {
                push(out, Effect::SetPan((cmd.param as u16 * 2).min(255) as u8));
            }
        }
        _ => decode_common(ctx, cmd, out),
    }
}

/// Commands shared by ST3 and IT.
pub(super) fn decode_common(ctx: &DecodeContext, cmd: EffectCommand, out: &mut CombinedEffect) {
    let param = cmd.param;
    let volume_slide = Effect::VolumeSlide {
        cell: ctx.cell(MemoryFamily::VolumeSlide),
        param,
        style: SlideStyle::Dual,
    };
    let effect = match cmd.code {
        1 => {
            if param == 0 {
                return;
            }
            Effect::SetSpeed(param)
        }
        2 => Effect::PositionJump(param),
        3 => Effect::PatternBreak(bcd_row(param)),
        4 => volume_slide,
        5 => Effect::Porta { cell: ctx.cell(MemoryFamily::PortaDown), param, up: false, style: PortaStyle::Dual },
        6 => Effect::Porta { cell: ctx.cell(MemoryFamily::PortaUp), param, up: true, style: PortaStyle::Dual },
        7 => Effect::TonePorta { cell: ctx.cell(MemoryFamily::TonePorta), param },
        8 => Effect::Vibrato { cell: ctx.cell(MemoryFamily::Vibrato), param, fine: false },
        9 => Effect::Tremor { cell: ctx.cell(MemoryFamily::Tremor), param },
        10 => Effect::Arpeggio { cell: ctx.cell(MemoryFamily::Arpeggio), param },
        // K: vibrato + volume slide
        11 => {
            push(out, Effect::Vibrato { cell: ctx.cell(MemoryFamily::Vibrato), param: 0, fine: false });
            volume_slide
        }
        // L: tone porta + volume slide
        12 => {
            push(out, Effect::TonePorta { cell: ctx.cell(MemoryFamily::TonePorta), param: 0 });
            volume_slide
        }
        13 => Effect::ChannelVolume(param),
        14 => Effect::ChannelVolumeSlide {
            cell: ctx.cell(MemoryFamily::ChannelVolumeSlide),
            param,
            style: SlideStyle::Dual,
        },
        15 => Effect::SampleOffset { cell: ctx.cell(MemoryFamily::SampleOffset), param },
        16 => Effect::PanningSlide {
            cell: ctx.cell(MemoryFamily::PanningSlide),
            param,
            style: SlideStyle::DualReversed,
            step: 4,
        },
        17 => Effect::Retrigger { cell: ctx.cell(MemoryFamily::Retrigger), param, volume: true },
        18 => Effect::Tremolo { cell: ctx.cell(MemoryFamily::Tremolo), param },
        19 => match decode_extended(param) {
            Some(effect) => effect,
            None => Effect::Unhandled { code: cmd.code, param },
        },
        21 => Effect::Vibrato { cell: ctx.cell(MemoryFamily::FineVibrato), param, fine: true },
        22 => Effect::GlobalVolume(param),
        23 => Effect::GlobalVolumeSlide {
            cell: ctx.cell(MemoryFamily::GlobalVolumeSlide),
            param,
            style: SlideStyle::Dual,
        },
        25 => Effect::Panbrello { cell: ctx.cell(MemoryFamily::Panbrello), param },
        _ => Effect::Unhandled { code: cmd.code, param },
    };
    push(out, effect);
}

/// `Sxy` sub-commands. `None` for the ones playback does not model.
fn decode_extended(param: u8) -> Option<Effect> {
    let x = param & 0x0F;
    let effect = match param >> 4 {
        0x1 => Effect::Glissando(x != 0),
        0x2 => Effect::SetFinetune((x as i8 - 8) * 16),
        0x3 => Effect::SetWaveform { target: OscillatorTarget::Vibrato, bits: x },
        0x4 => Effect::SetWaveform { target: OscillatorTarget::Tremolo, bits: x },
        0x5 => Effect::SetWaveform { target: OscillatorTarget::Panbrello, bits: x },
        0x6 => Effect::FinePatternDelay(x),
        0x7 => match x {
            0 => Effect::PastNoteAction(PastNoteAction::Cut),
            1 => Effect::PastNoteAction(PastNoteAction::Release),
            2 => Effect::PastNoteAction(PastNoteAction::Fadeout),
            3 => Effect::SetNewNoteAction(NewNoteAction::Cut),
            4 => Effect::SetNewNoteAction(NewNoteAction::Continue),
            5 => Effect::SetNewNoteAction(NewNoteAction::Release),
            6 => Effect::SetNewNoteAction(NewNoteAction::Fadeout),
            7 => Effect::EnvelopeControl { envelope: EnvelopeKind::Volume, enabled: false },
            8 => Effect::EnvelopeControl { envelope: EnvelopeKind::Volume, enabled: true },
            9 => Effect::EnvelopeControl { envelope: EnvelopeKind::Panning, enabled: false },
            0xA => Effect::EnvelopeControl { envelope: EnvelopeKind::Panning, enabled: true },
            0xB => Effect::EnvelopeControl { envelope: EnvelopeKind::Pitch, enabled: false },
            0xC => Effect::EnvelopeControl { envelope: EnvelopeKind::Pitch, enabled: true },
            _ => return None,
        },
        0x8 => Effect::SetPan(x * 17),
        0xA => Effect::HighOffset(x),
        0xB => Effect::PatternLoop(x),
        0xC => Effect::NoteCut(x),
        0xD => Effect::NoteDelay(x),
        0xE => Effect::PatternDelay(x),
        _ => return None,
    };
    Some(effect)
}
