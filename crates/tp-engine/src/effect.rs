//! Effect protocol.
//!
//! A decoded effect is one variant of [`Effect`] carrying its parameter and
//! the memory cell it coalesces through. Effects run in four phases, each a
//! single `match`:
//!
//! - `pre_start`: at decode time, before the row's tick count is known
//! - `start`: once on tick 0
//! - `tick`: every tick, including 0
//! - `stop`: after the last tick of the row

use tp_ir::NewNoteAction;

use crate::channel::{ChannelState, EnvelopeKind};
use crate::memory::{CellId, Memory};
use crate::oscillator::Oscillator;
use crate::past_voices::{PastNoteAction, PastVoicePool};
use crate::period::PeriodDelta;
use crate::sequencer::RowUpdate;
use crate::voice::VoiceFactory;

/// Effects a single row cell can carry at once (volume column + effect
/// column, each possibly expanding to two).
pub const MAX_COMBINED_EFFECTS: usize = 4;

/// Every effect a row cell carries, in execution order.
pub type CombinedEffect = heapless::Vec<Effect, MAX_COMBINED_EFFECTS>;

/// How a slide parameter byte encodes direction and fineness.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SlideStyle {
    /// `Dxy`: `D0y` down, `Dx0` up, `DxF` fine up, `DFy` fine down
    Dual,
    /// `Dual` with up and down swapped (IT panning slide)
    DualReversed,
    /// `Axy`: `x` up when nonzero, else `y` down
    UpOrDown,
    Up,
    Down,
    FineUp,
    FineDown,
}

/// A decoded slide step.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Slide {
    None,
    Up(u8),
    Down(u8),
    FineUp(u8),
    FineDown(u8),
}

impl SlideStyle {
    pub fn decode(self, param: u8) -> Slide {
        let (x, y) = (param >> 4, param & 0x0F);
        match self {
            SlideStyle::Dual => {
                if x == 0 {
                    Slide::Down(y)
                } else if y == 0 {
                    Slide::Up(x)
                } else if y == 0x0F {
                    Slide::FineUp(x)
                } else if x == 0x0F {
                    Slide::FineDown(y)
                } else {
                    Slide::Up(x)
                }
            }
            SlideStyle::DualReversed => match SlideStyle::Dual.decode(param) {
                Slide::Up(n) => Slide::Down(n),
                Slide::Down(n) => Slide::Up(n),
                Slide::FineUp(n) => Slide::FineDown(n),
                Slide::FineDown(n) => Slide::FineUp(n),
                Slide::None => Slide::None,
            },
            SlideStyle::UpOrDown => {
                if x != 0 {
                    Slide::Up(x)
                } else {
                    Slide::Down(y)
                }
            }
            SlideStyle::Up => Slide::Up(param),
            SlideStyle::Down => Slide::Down(param),
            SlideStyle::FineUp => Slide::FineUp(param),
            SlideStyle::FineDown => Slide::FineDown(param),
        }
    }
}

impl Slide {
    /// Signed amount to apply on `tick`. Normal slides skip tick 0 unless
    /// `every_tick`; fine slides run on tick 0 only.
    pub fn amount(self, tick: u16, every_tick: bool) -> i16 {
        match self {
            Slide::Up(n) if tick > 0 || every_tick => n as i16,
            Slide::Down(n) if tick > 0 || every_tick => -(n as i16),
            Slide::FineUp(n) if tick == 0 => n as i16,
            Slide::FineDown(n) if tick == 0 => -(n as i16),
            _ => 0,
        }
    }
}

/// Portamento step encoding.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PortaStyle {
    /// `Exx`/`Fxx`: `xx >= F0` fine, `xx >= E0` extra fine, else per tick
    Dual,
    /// `xx * 4` on every tick but the first
    Normal,
    /// `x * 4` once on tick 0
    Fine,
    /// `x` once on tick 0
    ExtraFine,
}

impl PortaStyle {
    /// Period units to slide on `tick`, if any.
    pub fn amount(self, param: u8, tick: u16) -> Option<u32> {
        let style = match self {
            PortaStyle::Dual if param >= 0xF0 => return (tick == 0).then_some((param & 0x0F) as u32 * 4),
            PortaStyle::Dual if param >= 0xE0 => return (tick == 0).then_some((param & 0x0F) as u32),
            PortaStyle::Dual => PortaStyle::Normal,
            other => other,
        };
        match style {
            PortaStyle::Normal => (tick > 0).then_some(param as u32 * 4),
            PortaStyle::Fine => (tick == 0).then_some(param as u32 * 4),
            PortaStyle::ExtraFine => (tick == 0).then_some(param as u32),
            PortaStyle::Dual => None,
        }
    }
}

/// Which channel oscillator a waveform command selects.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OscillatorTarget {
    Vibrato,
    Tremolo,
    Panbrello,
}

/// ST3 retrigger volume modifiers, indexed by the high nibble of `Qxy`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum RetrigVolume {
    Add(i16),
    Scale(i16, i16),
}

const RETRIG_VOLUME: [RetrigVolume; 16] = [
    RetrigVolume::Add(0),
    RetrigVolume::Add(-1),
    RetrigVolume::Add(-2),
    RetrigVolume::Add(-4),
    RetrigVolume::Add(-8),
    RetrigVolume::Add(-16),
    RetrigVolume::Scale(2, 3),
    RetrigVolume::Scale(1, 2),
    RetrigVolume::Add(0),
    RetrigVolume::Add(1),
    RetrigVolume::Add(2),
    RetrigVolume::Add(4),
    RetrigVolume::Add(8),
    RetrigVolume::Add(16),
    RetrigVolume::Scale(3, 2),
    RetrigVolume::Scale(2, 1),
];

fn retrig_volume(volume: u8, modifier: u8) -> u8 {
    let v = volume as i16;
    let out = match RETRIG_VOLUME[(modifier & 0x0F) as usize] {
        RetrigVolume::Add(n) => v + n,
        RetrigVolume::Scale(num, den) => v * num / den,
    };
    out.clamp(0, 64) as u8
}

/// A decoded effect.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Effect {
    // === Sequencing ===
    /// Ticks per row
    SetSpeed(u8),
    /// Tempo in BPM
    SetTempo(u8),
    /// `T0x` slide down, `T1x` slide up, per tick
    TempoSlide { cell: Option<CellId>, param: u8 },
    PositionJump(u8),
    /// Break to this row of the next order
    PatternBreak(u16),
    /// 0 marks the loop start, `n` loops back `n` times
    PatternLoop(u8),
    /// Repeat the row `n` more times
    PatternDelay(u8),
    /// Extend the row by `n` ticks
    FinePatternDelay(u8),
    NoteDelay(u8),
    NoteCut(u8),
    /// Key off at tick `n`
    KeyOff(u8),

    // === Volume ===
    SetVolume(u8),
    VolumeSlide { cell: Option<CellId>, param: u8, style: SlideStyle },
    ChannelVolume(u8),
    ChannelVolumeSlide { cell: Option<CellId>, param: u8, style: SlideStyle },
    GlobalVolume(u8),
    GlobalVolumeSlide { cell: Option<CellId>, param: u8, style: SlideStyle },
    Tremolo { cell: Option<CellId>, param: u8 },
    /// On for `x + 1` ticks, off for `y + 1`
    Tremor { cell: Option<CellId>, param: u8 },

    // === Pitch ===
    Porta { cell: Option<CellId>, param: u8, up: bool, style: PortaStyle },
    TonePorta { cell: Option<CellId>, param: u8 },
    Vibrato { cell: Option<CellId>, param: u8, fine: bool },
    Arpeggio { cell: Option<CellId>, param: u8 },
    /// Finetune in 1/128 semitone for the note on this row
    SetFinetune(i8),
    Glissando(bool),

    // === Panning ===
    SetPan(u8),
    /// `step` scales the parameter onto the 0-255 pan range
    PanningSlide { cell: Option<CellId>, param: u8, style: SlideStyle, step: u8 },
    Panbrello { cell: Option<CellId>, param: u8 },

    // === Sample ===
    SampleOffset { cell: Option<CellId>, param: u8 },
    HighOffset(u8),
    /// `Qxy` retrigger every `y` ticks; `volume` applies the `x` modifier
    Retrigger { cell: Option<CellId>, param: u8, volume: bool },

    // === Instrument control ===
    SetWaveform { target: OscillatorTarget, bits: u8 },
    PastNoteAction(PastNoteAction),
    SetNewNoteAction(NewNoteAction),
    EnvelopeControl { envelope: EnvelopeKind, enabled: bool },
    SetEnvelopePosition(u8),

    /// Code the format table does not know
    Unhandled { code: u8, param: u8 },
}

/// State shared by every channel during one tick.
pub struct TickContext<'a> {
    pub tick: u16,
    pub ticks_this_row: u16,
    /// Legacy effect timing
    pub old_effects: bool,
    /// Song global volume (0-128), written by effects in channel order
    pub global_volume: &'a mut u8,
    pub past_voices: &'a PastVoicePool,
    pub song: &'a tp_ir::Song,
    pub factory: &'a mut dyn VoiceFactory,
}

fn slide_u8(value: u8, amount: i16, max: u8) -> u8 {
    (value as i16 + amount).clamp(0, max as i16) as u8
}

fn oscillate(osc: &mut Oscillator, param: u8, tick: u16, shift: u32) -> i32 {
    let (speed, depth) = (param >> 4, param & 0x0F);
    let value = osc.value() as i32 * depth as i32 >> shift;
    if tick > 0 {
        osc.advance(speed);
    }
    value
}

impl Effect {
    /// Returns the variant name as a static string (ignoring parameters).
    pub fn name(&self) -> &'static str {
        match self {
            Effect::SetSpeed(_) => "SetSpeed",
            Effect::SetTempo(_) => "SetTempo",
            Effect::TempoSlide { .. } => "TempoSlide",
            Effect::PositionJump(_) => "PositionJump",
            Effect::PatternBreak(_) => "PatternBreak",
            Effect::PatternLoop(_) => "PatternLoop",
            Effect::PatternDelay(_) => "PatternDelay",
            Effect::FinePatternDelay(_) => "FinePatternDelay",
            Effect::NoteDelay(_) => "NoteDelay",
            Effect::NoteCut(_) => "NoteCut",
            Effect::KeyOff(_) => "KeyOff",
            Effect::SetVolume(_) => "SetVolume",
            Effect::VolumeSlide { .. } => "VolumeSlide",
            Effect::ChannelVolume(_) => "ChannelVolume",
            Effect::ChannelVolumeSlide { .. } => "ChannelVolumeSlide",
            Effect::GlobalVolume(_) => "GlobalVolume",
            Effect::GlobalVolumeSlide { .. } => "GlobalVolumeSlide",
            Effect::Tremolo { .. } => "Tremolo",
            Effect::Tremor { .. } => "Tremor",
            Effect::Porta { .. } => "Porta",
            Effect::TonePorta { .. } => "TonePorta",
            Effect::Vibrato { .. } => "Vibrato",
            Effect::Arpeggio { .. } => "Arpeggio",
            Effect::SetFinetune(_) => "SetFinetune",
            Effect::Glissando(_) => "Glissando",
            Effect::SetPan(_) => "SetPan",
            Effect::PanningSlide { .. } => "PanningSlide",
            Effect::Panbrello { .. } => "Panbrello",
            Effect::SampleOffset { .. } => "SampleOffset",
            Effect::HighOffset(_) => "HighOffset",
            Effect::Retrigger { .. } => "Retrigger",
            Effect::SetWaveform { .. } => "SetWaveform",
            Effect::PastNoteAction(_) => "PastNoteAction",
            Effect::SetNewNoteAction(_) => "SetNewNoteAction",
            Effect::EnvelopeControl { .. } => "EnvelopeControl",
            Effect::SetEnvelopePosition(_) => "SetEnvelopePosition",
            Effect::Unhandled { .. } => "Unhandled",
        }
    }

    /// Tone portamento: a new note on this row becomes the slide target.
    pub fn is_tone_porta(&self) -> bool {
        matches!(self, Effect::TonePorta { .. })
    }

    /// Note and portamento effects resume a frozen channel.
    pub fn unfreezes(&self) -> bool {
        matches!(self, Effect::TonePorta { .. } | Effect::Porta { .. })
    }

    /// Resolve the parameter through channel memory. Called once when the
    /// row is decoded; the result is what every phase sees.
    pub fn with_memory(self, memory: &mut Memory) -> Effect {
        match self {
            Effect::TempoSlide { cell, param } => Effect::TempoSlide { cell, param: memory.coalesce(cell, param) },
            Effect::VolumeSlide { cell, param, style } => {
                Effect::VolumeSlide { cell, param: memory.coalesce(cell, param), style }
            }
            Effect::ChannelVolumeSlide { cell, param, style } => {
                Effect::ChannelVolumeSlide { cell, param: memory.coalesce(cell, param), style }
            }
            Effect::GlobalVolumeSlide { cell, param, style } => {
                Effect::GlobalVolumeSlide { cell, param: memory.coalesce(cell, param), style }
            }
            Effect::Tremolo { cell, param } => Effect::Tremolo { cell, param: memory.coalesce_nibbles(cell, param) },
            Effect::Tremor { cell, param } => Effect::Tremor { cell, param: memory.coalesce(cell, param) },
            Effect::Porta { cell, param, up, style } => {
                Effect::Porta { cell, param: memory.coalesce(cell, param), up, style }
            }
            Effect::TonePorta { cell, param } => Effect::TonePorta { cell, param: memory.coalesce(cell, param) },
            Effect::Vibrato { cell, param, fine } => {
                Effect::Vibrato { cell, param: memory.coalesce_nibbles(cell, param), fine }
            }
            Effect::Arpeggio { cell, param } => Effect::Arpeggio { cell, param: memory.coalesce(cell, param) },
            Effect::PanningSlide { cell, param, style, step } => {
                Effect::PanningSlide { cell, param: memory.coalesce(cell, param), style, step }
            }
            Effect::Panbrello { cell, param } => {
                Effect::Panbrello { cell, param: memory.coalesce_nibbles(cell, param) }
            }
            Effect::SampleOffset { cell, param } => {
                Effect::SampleOffset { cell, param: memory.coalesce(cell, param) }
            }
            Effect::Retrigger { cell, param, volume } => {
                Effect::Retrigger { cell, param: memory.coalesce(cell, param), volume }
            }
            other => other,
        }
    }

    /// Decode-time phase: effects the sequencer must see before the row's
    /// tick count is computed.
    pub fn pre_start(&self, ch: &mut ChannelState, update: &mut RowUpdate) {
        match *self {
            Effect::SetSpeed(ticks) if ticks > 0 => update.set_ticks(ticks),
            Effect::SetTempo(tempo) => update.set_tempo(tempo),
            Effect::PatternDelay(rows) => update.set_pattern_delay(rows),
            Effect::FinePatternDelay(ticks) => update.set_fine_pattern_delay(ticks),
            Effect::NoteDelay(tick) => ch.delay_note(tick),
            Effect::SetFinetune(finetune) => ch.finetune_override = Some(finetune),
            _ => {}
        }
    }

    /// Tick-0 phase.
    pub fn start(&self, ch: &mut ChannelState, ctx: &mut TickContext<'_>) {
        if self.unfreezes() {
            ch.unfreeze();
        }
        match *self {
            Effect::SetVolume(v) => ch.set_volume(v.min(64)),
            Effect::ChannelVolume(v) => ch.channel_volume = v.min(64),
            Effect::GlobalVolume(v) => *ctx.global_volume = v.min(128),
            Effect::SetPan(p) => ch.set_pan(p),
            Effect::SampleOffset { param, .. } => {
                let offset = (ch.memory.high_offset as u32) << 16 | (param as u32) << 8;
                ch.set_sample_offset(offset);
            }
            Effect::HighOffset(x) => ch.memory.high_offset = x,
            Effect::Glissando(on) => ch.memory.glissando = on,
            Effect::SetWaveform { target, bits } => match target {
                OscillatorTarget::Vibrato => ch.memory.vibrato.set_waveform_bits(bits),
                OscillatorTarget::Tremolo => ch.memory.tremolo.set_waveform_bits(bits),
                OscillatorTarget::Panbrello => ch.memory.panbrello.set_waveform_bits(bits),
            },
            Effect::PastNoteAction(action) => {
                let n = ctx.past_voices.apply(ch.index, action);
                log::debug!("channel {}: past note action {:?} on {} voices", ch.index, action, n);
            }
            Effect::SetNewNoteAction(nna) => ch.nna_override = Some(nna),
            Effect::EnvelopeControl { envelope, enabled } => ch.set_envelope_enabled(envelope, enabled),
            Effect::SetEnvelopePosition(ticks) => ch.set_envelope_position(ctx.song, ticks as u16),
            _ => {}
        }
    }

    /// Per-tick phase.
    pub fn tick(&self, ch: &mut ChannelState, ctx: &mut TickContext<'_>) {
        let tick = ctx.tick;
        match *self {
            Effect::NoteCut(at) if tick == at as u16 => ch.cut(),
            Effect::KeyOff(at) if tick == at as u16 => ch.key_off(ctx.song),
            Effect::VolumeSlide { param, style, .. } => {
                let amount = style.decode(param).amount(tick, ctx.old_effects);
                ch.active.volume = slide_u8(ch.active.volume, amount, 64);
            }
            Effect::ChannelVolumeSlide { param, style, .. } => {
                let amount = style.decode(param).amount(tick, false);
                ch.channel_volume = slide_u8(ch.channel_volume, amount, 64);
            }
            Effect::GlobalVolumeSlide { param, style, .. } => {
                let amount = style.decode(param).amount(tick, false);
                *ctx.global_volume = slide_u8(*ctx.global_volume, amount, 128);
            }
            Effect::PanningSlide { param, style, step, .. } => {
                let amount = style.decode(param).amount(tick, false) * step as i16;
                ch.active.pan = slide_u8(ch.active.pan, amount, 255);
            }
            Effect::Porta { param, up, style, .. } => {
                if let (Some(amount), Some(period)) = (style.amount(param, tick), ch.active.period) {
                    let delta = PeriodDelta(amount as i32);
                    ch.active.period = Some(period.add_delta(if up { delta } else { -delta }));
                }
            }
            Effect::TonePorta { param, .. } => {
                if let (Some(period), Some(target)) = (ch.active.period, ch.memory.porta_target) {
                    let next = if tick > 0 { period.porta_toward(target, param as u32 * 4) } else { period };
                    ch.active.period = Some(next);
                    if ch.memory.glissando {
                        ch.period_delta = ch.period_delta + next.delta_to(&next.round_to_semitone());
                    }
                }
            }
            Effect::Vibrato { param, fine, .. } => {
                let shift = if ctx.old_effects { 4 } else { 5 } + if fine { 2 } else { 0 };
                let value = oscillate(&mut ch.memory.vibrato, param, tick, shift);
                ch.period_delta = ch.period_delta + PeriodDelta(value);
            }
            Effect::Tremolo { param, .. } => {
                let value = oscillate(&mut ch.memory.tremolo, param, tick, 6);
                ch.volume_delta += value as i16;
            }
            Effect::Panbrello { param, .. } => {
                let value = oscillate(&mut ch.memory.panbrello, param, tick, 4);
                ch.pan_delta += value as i16;
            }
            Effect::Tremor { param, .. } => {
                let (on, off) = ((param >> 4) + 1, (param & 0x0F) + 1);
                let t = &mut ch.memory.tremor;
                if t.ticks_left == 0 {
                    t.ticks_left = if t.muted { off } else { on };
                }
                ch.tremor_muted = t.muted;
                t.ticks_left -= 1;
                if t.ticks_left == 0 {
                    t.muted = !t.muted;
                }
            }
            Effect::Arpeggio { param, .. } => {
                let semitones = match tick % 3 {
                    0 => 0,
                    1 => param >> 4,
                    _ => param & 0x0F,
                };
                if let Some(period) = ch.active.period.filter(|_| semitones > 0) {
                    ch.period_delta = ch.period_delta + period.delta_to(&period.transpose(semitones as i32));
                }
            }
            Effect::Retrigger { param, volume, .. } => {
                let interval = param & 0x0F;
                if interval == 0 {
                    return;
                }
                let fire = if volume {
                    // Qxy counts ticks since the last (re)trigger, across rows
                    if ch.note_triggered {
                        return;
                    }
                    ch.retrigger_count = ch.retrigger_count.saturating_add(1);
                    ch.retrigger_count >= interval
                } else {
                    tick > 0 && tick % interval as u16 == 0
                };
                if fire {
                    ch.retrigger_count = 0;
                    if volume {
                        ch.active.volume = retrig_volume(ch.active.volume, param >> 4);
                    }
                    ch.retrigger();
                }
            }
            _ => {}
        }
    }

    /// End-of-row phase: jumps and loops, once the row's final state is known.
    pub fn stop(&self, ch: &mut ChannelState, row: u16, ticks_this_row: u16, update: &mut RowUpdate) {
        match *self {
            Effect::PositionJump(order) => update.set_next_order(order as usize),
            Effect::PatternBreak(target) => {
                update.set_next_row(target);
                update.set_break_order();
            }
            Effect::PatternLoop(0) => ch.memory.pattern_loop_start = row,
            Effect::PatternLoop(count) => {
                update.set_pattern_loop_start(ch.memory.pattern_loop_start);
                update.set_pattern_loop_end(row);
                update.set_pattern_loop_count(count);
            }
            Effect::TempoSlide { param, .. } => {
                let step = (param & 0x0F) as i32 * ticks_this_row.saturating_sub(1) as i32;
                match param >> 4 {
                    0 => update.acc_tempo_delta(-step),
                    1 => update.acc_tempo_delta(step),
                    _ => {}
                }
            }
            _ => {}
        }
    }
}
