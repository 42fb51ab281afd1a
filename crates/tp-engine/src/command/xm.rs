//! FastTracker 2 and ProTracker command table. Effect codes are
//! `0x0`-`0xF`, then letters from `G` = `0x10`.

use tp_ir::EffectCommand;

use super::{bcd_row, push, DecodeContext};
use crate::effect::{CombinedEffect, Effect, OscillatorTarget, PortaStyle, SlideStyle};
use crate::memory::MemoryFamily;

pub(super) fn decode_volume(ctx: &DecodeContext, volume: u8, out: &mut CombinedEffect) {
    let x = volume & 0x0F;
    let effect = match volume >> 4 {
        0x1..=0x4 => Effect::SetVolume(volume - 0x10),
        0x5 if volume == 0x50 => Effect::SetVolume(64),
        0x6 => Effect::VolumeSlide { cell: None, param: x, style: SlideStyle::Down },
        0x7 => Effect::VolumeSlide { cell: None, param: x, style: SlideStyle::Up },
        0x8 => Effect::VolumeSlide { cell: None, param: x, style: SlideStyle::FineDown },
        0x9 => Effect::VolumeSlide { cell: None, param: x, style: SlideStyle::FineUp },
        // Speed and depth share the vibrato cell, one nibble each
        0xA => Effect::Vibrato { cell: ctx.cell(MemoryFamily::Vibrato), param: x << 4, fine: false },
        0xB => Effect::Vibrato { cell: ctx.cell(MemoryFamily::Vibrato), param: x, fine: false },
        0xC => Effect::SetPan(x * 17),
        0xD => Effect::PanningSlide { cell: None, param: x, style: SlideStyle::Down, step: 1 },
        0xE => Effect::PanningSlide { cell: None, param: x, style: SlideStyle::Up, step: 1 },
        0xF => Effect::TonePorta { cell: ctx.cell(MemoryFamily::TonePorta), param: x << 4 },
        _ => return,
    };
    push(out, effect);
}

pub(super) fn decode_effect(ctx: &DecodeContext, cmd: EffectCommand, out: &mut CombinedEffect) {
    let param = cmd.param;
    let volume_slide = Effect::VolumeSlide {
        cell: ctx.cell(MemoryFamily::VolumeSlide),
        param,
        style: SlideStyle::UpOrDown,
    };
    let effect = match cmd.code {
        0x0 => {
            if param == 0 {
                return;
            }
            Effect::Arpeggio { cell: None, param }
        }
        0x1 => Effect::Porta { cell: ctx.cell(MemoryFamily::PortaUp), param, up: true, style: PortaStyle::Normal },
        0x2 => Effect::Porta { cell: ctx.cell(MemoryFamily::PortaDown), param, up: false, style: PortaStyle::Normal },
        0x3 => Effect::TonePorta { cell: ctx.cell(MemoryFamily::TonePorta), param },
        0x4 => Effect::Vibrato { cell: ctx.cell(MemoryFamily::Vibrato), param, fine: false },
        0x5 => {
            push(out, Effect::TonePorta { cell: ctx.cell(MemoryFamily::TonePorta), param: 0 });
            volume_slide
        }
        0x6 => {
            push(out, Effect::Vibrato { cell: ctx.cell(MemoryFamily::Vibrato), param: 0, fine: false });
            volume_slide
        }
        0x7 => Effect::Tremolo { cell: ctx.cell(MemoryFamily::Tremolo), param },
        0x8 => Effect::SetPan(param),
        0x9 => Effect::SampleOffset { cell: ctx.cell(MemoryFamily::SampleOffset), param },
        0xA => volume_slide,
        0xB => Effect::PositionJump(param),
        0xC => Effect::SetVolume(param.min(64)),
        0xD => Effect::PatternBreak(bcd_row(param)),
        0xE => match decode_extended(ctx, param) {
            Some(effect) => effect,
            None => Effect::Unhandled { code: cmd.code, param },
        },
        0xF => match param {
            0 => return,
            1..=0x1F => Effect::SetSpeed(param),
            _ => Effect::SetTempo(param),
        },
        // G: global volume, 0-64
        0x10 => Effect::GlobalVolume((param.min(64)) * 2),
        // H: global volume slide
        0x11 => Effect::GlobalVolumeSlide {
            cell: ctx.cell(MemoryFamily::GlobalVolumeSlide),
            param,
            style: SlideStyle::UpOrDown,
        },
        // K: key off at tick
        0x14 => Effect::KeyOff(param),
        // L: envelope position
        0x15 => Effect::SetEnvelopePosition(param),
        // P: panning slide
        0x19 => Effect::PanningSlide {
            cell: ctx.cell(MemoryFamily::PanningSlide),
            param,
            style: SlideStyle::UpOrDown,
            step: 1,
        },
        // R: multi retrig
        0x1B => Effect::Retrigger { cell: ctx.cell(MemoryFamily::Retrigger), param, volume: true },
        // T: tremor
        0x1D => Effect::Tremor { cell: ctx.cell(MemoryFamily::Tremor), param },
        // X: extra fine porta
        0x21 => match param >> 4 {
            1 => Effect::Porta {
                cell: ctx.cell(MemoryFamily::ExtraFinePortaUp),
                param: param & 0x0F,
                up: true,
                style: PortaStyle::ExtraFine,
            },
            2 => Effect::Porta {
                cell: ctx.cell(MemoryFamily::ExtraFinePortaDown),
                param: param & 0x0F,
                up: false,
                style: PortaStyle::ExtraFine,
            },
            _ => Effect::Unhandled { code: cmd.code, param },
        },
        _ => Effect::Unhandled { code: cmd.code, param },
    };
    push(out, effect);
}

/// `Exy` sub-commands.
fn decode_extended(ctx: &DecodeContext, param: u8) -> Option<Effect> {
    let x = param & 0x0F;
    let effect = match param >> 4 {
        0x1 => Effect::Porta { cell: ctx.cell(MemoryFamily::FinePortaUp), param: x, up: true, style: PortaStyle::Fine },
        0x2 => Effect::Porta {
            cell: ctx.cell(MemoryFamily::FinePortaDown),
            param: x,
            up: false,
            style: PortaStyle::Fine,
        },
        0x3 => Effect::Glissando(x != 0),
        0x4 => Effect::SetWaveform { target: OscillatorTarget::Vibrato, bits: x },
        0x5 => Effect::SetFinetune((x as i8 - 8) * 16),
        0x6 => Effect::PatternLoop(x),
        0x7 => Effect::SetWaveform { target: OscillatorTarget::Tremolo, bits: x },
        0x8 => Effect::SetPan(x * 17),
        0x9 => Effect::Retrigger { cell: None, param: x, volume: false },
        0xA => Effect::VolumeSlide {
            cell: ctx.cell(MemoryFamily::FineVolumeSlideUp),
            param: x,
            style: SlideStyle::FineUp,
        },
        0xB => Effect::VolumeSlide {
            cell: ctx.cell(MemoryFamily::FineVolumeSlideDown),
            param: x,
            style: SlideStyle::FineDown,
        },
        0xC => Effect::NoteCut(x),
        0xD => Effect::NoteDelay(x),
        0xE => Effect::PatternDelay(x),
        _ => return None,
    };
    Some(effect)
}
