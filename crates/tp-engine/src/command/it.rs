//! Impulse Tracker command table.

use tp_ir::EffectCommand;

use super::s3m::decode_common;
use super::{push, DecodeContext};
use crate::effect::{CombinedEffect, Effect, PortaStyle, SlideStyle};
use crate::memory::MemoryFamily;

/// Tone portamento speeds for volume column values 193-202.
const VOLUME_PORTA: [u8; 10] = [0, 1, 4, 8, 16, 32, 64, 96, 128, 255];

pub(super) fn decode_volume(ctx: &DecodeContext, volume: u8, out: &mut CombinedEffect) {
    let cell = ctx.cell(MemoryFamily::VolumeColumnSlide);
    let effect = match volume {
        0..=64 => Effect::SetVolume(volume),
        65..=74 => Effect::VolumeSlide { cell, param: volume - 65, style: SlideStyle::FineUp },
        75..=84 => Effect::VolumeSlide { cell, param: volume - 75, style: SlideStyle::FineDown },
        85..=94 => Effect::VolumeSlide { cell, param: volume - 85, style: SlideStyle::Up },
        95..=104 => Effect::VolumeSlide { cell, param: volume - 95, style: SlideStyle::Down },
        105..=114 => Effect::Porta {
            cell: ctx.cell(MemoryFamily::PortaDown),
            param: (volume - 105) * 4,
            up: false,
            style: PortaStyle::Normal,
        },
        115..=124 => Effect::Porta {
            cell: ctx.cell(MemoryFamily::PortaUp),
            param: (volume - 115) * 4,
            up: true,
            style: PortaStyle::Normal,
        },
        128..=192 => Effect::SetPan(((volume - 128) as u16 * 4).min(255) as u8),
        193..=202 => Effect::TonePorta {
            cell: ctx.cell(MemoryFamily::TonePorta),
            param: VOLUME_PORTA[(volume - 193) as usize],
        },
        203..=212 => Effect::Vibrato { cell: ctx.cell(MemoryFamily::Vibrato), param: volume - 203, fine: false },
        _ => return,
    };
    push(out, effect);
}

pub(super) fn decode_effect(ctx: &DecodeContext, cmd: EffectCommand, out: &mut CombinedEffect) {
    let param = cmd.param;
    match cmd.code {
        // T: T0x slide down, T1x slide up, else set
        20 => {
            let effect = match param >> 4 {
                0 | 1 => Effect::TempoSlide { cell: ctx.cell(MemoryFamily::TempoSlide), param },
                _ => Effect::SetTempo(param),
            };
            push(out, effect);
        }
        // X: full 0-255 range
        24 => push(out, Effect::SetPan(param)),
        // V: 0-128
        22 => push(out, Effect::GlobalVolume(param.min(128))),
        _ => decode_common(ctx, cmd, out),
    }
}
