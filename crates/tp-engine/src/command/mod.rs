//! Pattern command decoding.
//!
//! Each format owns a table that maps a row cell's volume column and
//! effect column to [`Effect`] values. The memory layout for the format is
//! resolved once here, so decoded effects already name the cell they
//! coalesce through.

mod it;
mod s3m;
mod xm;

use core::fmt::Write;

use heapless::String;
use tp_ir::{Command, EffectCommand, Format};

use crate::config::PlaybackConfig;
use crate::effect::{CombinedEffect, Effect};
use crate::memory::{MemoryFamily, MemoryLayout};

/// Decoding options that depend on the song rather than the row.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DecodeContext {
    pub layout: MemoryLayout,
    pub format: Format,
}

impl DecodeContext {
    pub fn cell(&self, family: MemoryFamily) -> Option<crate::memory::CellId> {
        self.layout.cell(family)
    }
}

type VolumeDecoder = fn(&DecodeContext, u8, &mut CombinedEffect);
type EffectDecoder = fn(&DecodeContext, EffectCommand, &mut CombinedEffect);

/// Per-format command decoder.
pub struct CommandTable {
    context: DecodeContext,
    volume: VolumeDecoder,
    effect: EffectDecoder,
}

impl CommandTable {
    pub fn new(format: Format, config: &PlaybackConfig) -> Self {
        let (volume, effect): (VolumeDecoder, EffectDecoder) = match format {
            Format::S3m => (s3m::decode_volume, s3m::decode_effect),
            Format::It => (it::decode_volume, it::decode_effect),
            Format::Xm | Format::Mod => (xm::decode_volume, xm::decode_effect),
        };
        Self {
            context: DecodeContext { layout: MemoryLayout::for_format(format, config.efg_link_mode), format },
            volume,
            effect,
        }
    }

    pub fn format(&self) -> Format {
        self.context.format
    }

    pub fn layout(&self) -> &MemoryLayout {
        &self.context.layout
    }

    /// Decode a row cell: volume column first, then the effect column.
    pub fn decode(&self, cmd: &Command) -> CombinedEffect {
        let mut out = CombinedEffect::new();
        if let Some(volume) = cmd.volume {
            (self.volume)(&self.context, volume, &mut out);
        }
        if let Some(effect) = cmd.effect {
            (self.effect)(&self.context, effect, &mut out);
        }
        out
    }

    /// Tracker notation for an effect column entry, e.g. `D0F` or `E91`.
    pub fn mnemonic(&self, effect: EffectCommand) -> String<4> {
        mnemonic(self.context.format, effect)
    }
}

/// Tracker notation for an effect column entry in `format`.
pub fn mnemonic(format: Format, effect: EffectCommand) -> String<4> {
    let letter = match format {
        Format::S3m | Format::It => match effect.code {
            1..=26 => (b'A' + effect.code - 1) as char,
            _ => '?',
        },
        Format::Xm | Format::Mod => match effect.code {
            0..=9 => (b'0' + effect.code) as char,
            10..=15 => (b'A' + effect.code - 10) as char,
            16..=35 => (b'G' + effect.code - 16) as char,
            _ => '?',
        },
    };
    let mut out = String::new();
    let _ = write!(out, "{}{:02X}", letter, effect.param);
    out
}

/// Append `effect`, dropping it if the cell is already full.
pub(crate) fn push(out: &mut CombinedEffect, effect: Effect) {
    if out.push(effect).is_err() {
        log::warn!("too many effects in one cell, dropping {}", effect.name());
    }
}

/// Pattern break rows are stored as decimal digits in hex nibbles.
pub(crate) fn bcd_row(param: u8) -> u16 {
    (param >> 4) as u16 * 10 + (param & 0x0F) as u16
}
