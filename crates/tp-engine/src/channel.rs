//! Channel state for tracker playback.
//!
//! Each channel keeps three render states: `active` is what is sounding,
//! `target` is what the current row's note will sound like once it is
//! committed, and `previous` is what sounded before the last trigger. A note
//! is staged while the row is decoded and committed on its play tick, so a
//! delayed note leaves the old voice untouched until the delay expires.

use tp_ir::{ChannelSettings, Command, Format, Instrument, NewNoteAction, Note, Song};

use crate::effect::{CombinedEffect, Effect, TickContext};
use crate::envelope_state::{lerp_i8, lerp_u8, EnvelopeState};
use crate::memory::Memory;
use crate::period::{Period, PeriodDelta, PeriodSystem};
use crate::sequencer::RowUpdate;
use crate::voice::{VoiceHandle, VoiceRequest};

/// Fadeout level at note start.
pub const FADEOUT_MAX: u16 = u16::MAX;

/// Instrument envelope selector for the envelope-control effects.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EnvelopeKind {
    Volume,
    Panning,
    Pitch,
}

/// What a channel plays, or will play once a staged note commits.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct RenderState {
    /// 1-based instrument number
    pub instrument: Option<u8>,
    pub period: Option<Period>,
    /// Note volume (0-64)
    pub volume: u8,
    /// Pan (0-255, 128 = center)
    pub pan: u8,
    /// Start position for the next voice
    pub sample_pos: Option<u32>,
}

/// Lifecycle of the channel's voice.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ChannelPhase {
    /// Nothing has been played
    #[default]
    Idle,
    /// A note is staged and waiting for its play tick
    Triggering,
    Sounding,
    /// Key released, envelopes run past their sustain loops
    Releasing,
    /// Fadeout running
    Fading,
    /// Silent; the voice can be dropped
    Done,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum PendingNote {
    Trigger,
    Off,
    Cut,
    Fade,
}

/// Per-tick result for one channel.
#[derive(Clone, Debug)]
pub struct ChannelOutput {
    pub channel: usize,
    /// Output (mixer) channel
    pub output: u8,
    /// Final period including vibrato, arpeggio and pitch envelope
    pub period: Option<Period>,
    /// Final volume, 0.0-1.0
    pub volume: f32,
    pub pan: u8,
    /// Position to seek the voice to before rendering this tick
    pub sample_pos: Option<u32>,
    pub voice: Option<VoiceHandle>,
    /// The voice should render this tick
    pub mixing: bool,
}

/// Playback state for a single tracker channel.
#[derive(Debug)]
pub struct ChannelState {
    pub index: usize,
    pub output: u8,
    pub enabled: bool,
    system: PeriodSystem,

    /// Effect parameter memory and oscillators
    pub memory: Memory,
    pub active: RenderState,
    pub target: RenderState,
    pub previous: RenderState,
    /// Last instrument named on this channel, used by notes without one
    last_instrument: Option<u8>,
    pub stored_semitone: Option<u8>,
    target_semitone: Option<u8>,

    /// Effects of the current row, already resolved against memory
    pub effect: CombinedEffect,
    /// Tick on which the staged note commits
    pub note_play_tick: Option<u8>,
    pending: Option<PendingNote>,
    phase: ChannelPhase,
    /// Cut by a note-cut effect; no voice updates until unfrozen
    pub frozen: bool,
    pub key_on: bool,
    key_just_released: bool,

    /// Channel volume (0-64)
    pub channel_volume: u8,
    pub retrigger_count: u8,
    /// The staged note started on the current tick
    pub note_triggered: bool,
    pub finetune_override: Option<i8>,
    pub nna_override: Option<NewNoteAction>,
    envelope_enabled: [Option<bool>; 3],
    volume_envelope: EnvelopeState,
    panning_envelope: EnvelopeState,
    pitch_envelope: EnvelopeState,
    fadeout_level: u16,
    fading: bool,

    // Per-tick transients, cleared before every tick
    pub period_delta: PeriodDelta,
    pub volume_delta: i16,
    pub pan_delta: i16,
    pub tremor_muted: bool,

    voice: Option<VoiceHandle>,
    pending_pos: Option<u32>,
}

impl ChannelState {
    pub fn new(index: usize, settings: &ChannelSettings, system: PeriodSystem) -> Self {
        let initial = RenderState {
            volume: settings.initial_volume.min(64),
            pan: settings.initial_pan,
            ..RenderState::default()
        };
        Self {
            index,
            output: settings.output,
            enabled: settings.enabled,
            system,
            memory: Memory::new(&settings.memory),
            active: initial,
            target: initial,
            previous: initial,
            last_instrument: None,
            stored_semitone: None,
            target_semitone: None,
            effect: CombinedEffect::new(),
            note_play_tick: None,
            pending: None,
            phase: ChannelPhase::Idle,
            frozen: false,
            key_on: false,
            key_just_released: false,
            channel_volume: settings.initial_channel_volume.min(64),
            retrigger_count: 0,
            note_triggered: false,
            finetune_override: None,
            nna_override: None,
            envelope_enabled: [None; 3],
            volume_envelope: EnvelopeState::new(),
            panning_envelope: EnvelopeState::new(),
            pitch_envelope: EnvelopeState::new(),
            fadeout_level: FADEOUT_MAX,
            fading: false,
            period_delta: PeriodDelta(0),
            volume_delta: 0,
            pan_delta: 0,
            tremor_muted: false,
            voice: None,
            pending_pos: None,
        }
    }

    pub fn phase(&self) -> ChannelPhase {
        if self.pending == Some(PendingNote::Trigger) {
            ChannelPhase::Triggering
        } else {
            self.phase
        }
    }

    pub fn voice(&self) -> Option<&VoiceHandle> {
        self.voice.as_ref()
    }

    pub fn fadeout_level(&self) -> u16 {
        self.fadeout_level
    }

    /// A voice is attached and still audible.
    pub fn is_sounding(&self) -> bool {
        self.voice.is_some() && !matches!(self.phase, ChannelPhase::Idle | ChannelPhase::Done)
    }

    fn instrument<'s>(&self, song: &'s Song) -> Option<&'s Instrument> {
        self.active.instrument.and_then(|n| song.instrument(n))
    }

    /// Load a row: resolve its effects against memory, run the pre-start
    /// phase and stage the note.
    pub fn decode(&mut self, cmd: &Command, effects: CombinedEffect, song: &Song, update: &mut RowUpdate) {
        self.note_play_tick = None;
        self.pending = None;
        self.finetune_override = None;
        self.effect = effects.into_iter().map(|e| e.with_memory(&mut self.memory)).collect();

        let effects = self.effect.clone();
        for effect in &effects {
            effect.pre_start(self, update);
        }
        let delay = self.note_play_tick.take();
        self.stage(cmd, song, effects.iter().any(Effect::is_tone_porta));
        if self.pending.is_some() {
            self.note_play_tick = Some(delay.unwrap_or(0));
        }
    }

    fn stage(&mut self, cmd: &Command, song: &Song, tone_porta: bool) {
        if cmd.instrument.is_some() {
            self.last_instrument = cmd.instrument;
        }
        self.target = RenderState { sample_pos: None, ..self.active };

        match cmd.note {
            Note::None => {
                // Instrument without a note resets volume and pan
                if let Some(inst) = cmd.instrument.and_then(|n| song.instrument(n)) {
                    self.active.volume = inst.default_volume.min(64);
                    if let Some(pan) = inst.default_pan {
                        self.active.pan = pan;
                    }
                }
            }
            Note::Off => self.pending = Some(PendingNote::Off),
            Note::Cut => self.pending = Some(PendingNote::Cut),
            Note::Fade => self.pending = Some(PendingNote::Fade),
            Note::On(note) => {
                let Some(number) = self.last_instrument else {
                    log::warn!("channel {}: note without an instrument", self.index);
                    return;
                };
                let Some(inst) = song.instrument(number) else {
                    log::warn!("channel {}: instrument {} does not exist", self.index, number);
                    return;
                };
                let semitone = (note as i16 + inst.relative_note as i16).clamp(0, 119) as u8;
                let finetune = self.finetune_override.unwrap_or(inst.finetune);
                let period = self.system.note_period(semitone, finetune, inst.c2spd);

                if tone_porta && self.is_sounding() {
                    self.memory.porta_target = period;
                    if cmd.instrument.is_some() {
                        self.active.volume = inst.default_volume.min(64);
                    }
                    return;
                }

                self.target_semitone = Some(semitone);
                self.target.instrument = Some(number);
                self.target.period = period;
                self.target.sample_pos = Some(0);
                if cmd.instrument.is_some() {
                    self.target.volume = inst.default_volume.min(64);
                    if let Some(pan) = inst.default_pan {
                        self.target.pan = pan;
                    }
                }
                self.pending = Some(PendingNote::Trigger);
            }
        }
    }

    /// Drop a staged note whose play tick falls outside the row.
    pub fn clamp_note_play_tick(&mut self, ticks_this_row: u16) {
        if self.note_play_tick.is_some_and(|t| t as u16 >= ticks_this_row) {
            log::trace!("channel {}: note delay past row end, note dropped", self.index);
            self.note_play_tick = None;
            self.pending = None;
        }
    }

    pub fn delay_note(&mut self, tick: u8) {
        self.note_play_tick = Some(tick);
    }

    pub fn unfreeze(&mut self) {
        self.frozen = false;
    }

    /// Volume effects before the note commits apply to the staged note.
    pub fn set_volume(&mut self, volume: u8) {
        if self.pending == Some(PendingNote::Trigger) {
            self.target.volume = volume;
        } else {
            self.active.volume = volume;
        }
    }

    pub fn set_pan(&mut self, pan: u8) {
        if self.pending == Some(PendingNote::Trigger) {
            self.target.pan = pan;
        } else {
            self.active.pan = pan;
        }
    }

    pub fn set_sample_offset(&mut self, offset: u32) {
        if self.pending == Some(PendingNote::Trigger) {
            self.target.sample_pos = Some(offset);
        }
    }

    pub fn set_envelope_enabled(&mut self, kind: EnvelopeKind, enabled: bool) {
        self.envelope_enabled[kind as usize] = Some(enabled);
    }

    fn envelope_enabled(&self, kind: EnvelopeKind) -> bool {
        self.envelope_enabled[kind as usize].unwrap_or(true)
    }

    pub fn set_envelope_position(&mut self, song: &Song, ticks: u16) {
        let Some(inst) = self.instrument(song) else { return };
        self.volume_envelope.set_position(&inst.volume_envelope, ticks);
        self.panning_envelope.set_position(&inst.panning_envelope, ticks);
    }

    /// Silence the note and stop updating the voice.
    pub fn cut(&mut self) {
        self.active.volume = 0;
        self.frozen = true;
        if self.voice.is_some() {
            self.phase = ChannelPhase::Done;
        }
    }

    /// Release the key. Without a volume envelope or fadeout the note
    /// goes silent straight away. IT keeps a non-looping volume envelope
    /// running to its end before the fadeout starts.
    pub fn key_off(&mut self, song: &Song) {
        if !self.key_on {
            return;
        }
        self.key_on = false;
        self.key_just_released = true;
        if let Some(voice) = &self.voice {
            voice.lock().release();
        }
        self.phase = ChannelPhase::Releasing;

        let (envelope, looping, fadeout) = match self.instrument(song) {
            Some(inst) => (
                inst.volume_envelope.enabled && self.envelope_enabled(EnvelopeKind::Volume),
                inst.volume_envelope.loop_range.is_some(),
                inst.fadeout,
            ),
            None => (false, false, 0),
        };
        if !envelope && fadeout == 0 {
            self.active.volume = 0;
            self.phase = ChannelPhase::Done;
        } else if !envelope || looping || song.format != Format::It || self.volume_envelope.is_stopped() {
            self.start_fade();
        }
    }

    fn start_fade(&mut self) {
        if self.fading || self.voice.is_none() {
            return;
        }
        self.fading = true;
        if let Some(voice) = &self.voice {
            voice.lock().fadeout();
        }
        self.phase = ChannelPhase::Fading;
    }

    /// Restart the sounding note from the beginning of the sample.
    pub fn retrigger(&mut self) {
        if let Some(voice) = &self.voice {
            voice.lock().attack();
            self.pending_pos = Some(0);
        }
    }

    /// Execute the staged note action.
    fn commit(&mut self, ctx: &mut TickContext<'_>) {
        let Some(pending) = self.pending.take() else { return };
        match pending {
            PendingNote::Trigger => self.trigger(ctx),
            PendingNote::Off => self.key_off(ctx.song),
            PendingNote::Cut => self.cut(),
            PendingNote::Fade => self.start_fade(),
        }
    }

    fn trigger(&mut self, ctx: &mut TickContext<'_>) {
        self.detach_voice(ctx);

        self.previous = self.active;
        self.active = self.target;
        self.stored_semitone = self.target_semitone;
        self.pending_pos = self.active.sample_pos;

        self.voice = match (self.active.instrument, self.active.period, self.stored_semitone) {
            (Some(instrument), Some(period), Some(note)) => {
                let request = VoiceRequest {
                    channel: self.index,
                    output: self.output,
                    instrument,
                    note,
                    period,
                    sample_pos: self.pending_pos.unwrap_or(0),
                };
                ctx.factory.create_voice(&request).map(VoiceHandle::new)
            }
            _ => None,
        };
        if let Some(voice) = &self.voice {
            voice.lock().attack();
        }

        if let Some(inst) = self.instrument(ctx.song) {
            self.volume_envelope.reset(&inst.volume_envelope);
            self.panning_envelope.reset(&inst.panning_envelope);
            self.pitch_envelope.reset(&inst.pitch_envelope);
        }
        self.envelope_enabled = [None; 3];
        self.nna_override = None;
        self.fadeout_level = FADEOUT_MAX;
        self.fading = false;
        self.key_on = true;
        self.key_just_released = false;
        self.frozen = false;
        self.retrigger_count = 0;
        self.note_triggered = true;
        self.memory.vibrato.note_on();
        self.memory.tremolo.note_on();
        self.memory.panbrello.note_on();
        self.phase = if self.voice.is_some() { ChannelPhase::Sounding } else { ChannelPhase::Idle };

        log::trace!(
            "channel {}: trigger instrument {:?} note {:?} on tick {}",
            self.index,
            self.active.instrument,
            self.stored_semitone,
            ctx.tick
        );
    }

    /// Hand the outgoing voice to the past-voice pool according to the
    /// new-note action of the instrument that is playing.
    fn detach_voice(&mut self, ctx: &mut TickContext<'_>) {
        let Some(old) = self.voice.take() else { return };
        if self.phase == ChannelPhase::Done || old.is_done() {
            return;
        }
        let nna = self
            .nna_override
            .or_else(|| self.instrument(ctx.song).map(|inst| inst.new_note_action))
            .unwrap_or_default();
        match nna {
            NewNoteAction::Cut => return,
            NewNoteAction::Continue => {}
            NewNoteAction::Release => old.lock().release(),
            NewNoteAction::Fadeout => old.lock().fadeout(),
        }
        log::debug!("channel {}: new note action {:?}, voice moved to pool", self.index, nna);
        ctx.past_voices.add(self.index, old);
    }

    /// Run one tick: start phase on tick 0, commit the staged note on its
    /// play tick, then the tick phase. Returns what the voice should do.
    pub fn process_tick(&mut self, ctx: &mut TickContext<'_>) -> ChannelOutput {
        let effects = self.effect.clone();
        if ctx.tick == 0 {
            for effect in &effects {
                effect.start(self, ctx);
            }
        }
        self.note_triggered = false;
        if self.note_play_tick.is_some_and(|t| t as u16 == ctx.tick) {
            self.commit(ctx);
        }

        self.period_delta = PeriodDelta(0);
        self.volume_delta = 0;
        self.pan_delta = 0;
        self.tremor_muted = false;
        for effect in &effects {
            effect.tick(self, ctx);
        }

        let output = self.render(ctx);
        self.advance_envelopes(ctx.song);
        output
    }

    fn render(&mut self, ctx: &TickContext<'_>) -> ChannelOutput {
        let inst = self.instrument(ctx.song);

        let pitch = inst
            .filter(|_| self.envelope_enabled(EnvelopeKind::Pitch))
            .and_then(|i| self.pitch_envelope.evaluate(&i.pitch_envelope, self.key_on, lerp_i8));
        let period = self.active.period.map(|p| {
            let p = p.add_delta(self.period_delta);
            match pitch {
                Some(v) if v != 0 => p.shift(v as f32 / 2.0),
                _ => p,
            }
        });

        let envelope = inst
            .filter(|_| self.envelope_enabled(EnvelopeKind::Volume))
            .and_then(|i| self.volume_envelope.evaluate(&i.volume_envelope, self.key_on, lerp_u8))
            .map_or(1.0, |v| v.min(64) as f32 / 64.0);
        let note = if self.tremor_muted {
            0.0
        } else {
            (self.active.volume as i16 + self.volume_delta).clamp(0, 64) as f32 / 64.0
        };
        let volume = note
            * envelope
            * (self.fadeout_level as f32 / FADEOUT_MAX as f32)
            * (self.channel_volume as f32 / 64.0)
            * (*ctx.global_volume as f32 / 128.0);

        let pan_env = inst
            .filter(|_| self.envelope_enabled(EnvelopeKind::Panning))
            .and_then(|i| self.panning_envelope.evaluate(&i.panning_envelope, self.key_on, lerp_i8))
            .map_or(0, |v| v as i16 * 4);
        let pan = (self.active.pan as i16 + self.pan_delta + pan_env).clamp(0, 255) as u8;

        let mixing = self.voice.is_some() && !self.frozen && self.phase != ChannelPhase::Done;
        ChannelOutput {
            channel: self.index,
            output: self.output,
            period,
            volume,
            pan,
            sample_pos: self.pending_pos.take(),
            voice: self.voice.clone(),
            mixing,
        }
    }

    fn advance_envelopes(&mut self, song: &Song) {
        if self.voice.as_ref().is_some_and(VoiceHandle::is_done) {
            self.phase = ChannelPhase::Done;
        }
        let Some(inst) = self.instrument(song) else { return };
        let released = std::mem::take(&mut self.key_just_released);
        let finished = self.volume_envelope.advance(&inst.volume_envelope, self.key_on, released);
        self.panning_envelope.advance(&inst.panning_envelope, self.key_on, released);
        self.pitch_envelope.advance(&inst.pitch_envelope, self.key_on, released);

        if finished && self.envelope_enabled(EnvelopeKind::Volume) {
            if inst.volume_envelope.last_value() == Some(0) {
                self.frozen = true;
                self.phase = ChannelPhase::Done;
            } else if self.phase == ChannelPhase::Releasing {
                self.start_fade();
            }
        }
        if self.fading {
            self.fadeout_level = self.fadeout_level.saturating_sub(inst.fadeout);
            if self.fadeout_level == 0 {
                self.phase = ChannelPhase::Done;
            }
        }
    }

    /// End-of-row phase for this channel's effects.
    pub fn stop(&mut self, row: u16, ticks_this_row: u16, update: &mut RowUpdate) {
        let effects = self.effect.clone();
        for effect in &effects {
            effect.stop(self, row, ticks_this_row, update);
        }
        if self.pending.take().is_some() {
            self.note_play_tick = None;
        }
    }
}
