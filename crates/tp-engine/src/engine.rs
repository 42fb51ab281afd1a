//! Main playback engine.
//!
//! The engine owns the sequencer, the channels and the past-voice pool.
//! Each call to [`Engine::render_row`] runs one row through its full cycle:
//! decode and pre-start, tick 0 start, every tick, then the stop phase, and
//! returns what each voice was told to do.

use std::sync::Arc;
use std::time::Duration;

use tp_ir::{Command, EffectCommand, Song};

use crate::channel::{ChannelOutput, ChannelState};
use crate::command::CommandTable;
use crate::config::PlaybackConfig;
use crate::effect::{Effect, TickContext};
use crate::error::{PlaybackError, Result};
use crate::past_voices::PastVoicePool;
use crate::period::PeriodSystem;
use crate::sequencer::{RowUpdate, SequencerState, Transition};
use crate::trace::{ChannelTrace, Playback, PlaybackEnd, RowOutput, RowTrace, TickOutput};
use crate::voice::VoiceFactory;

enum EngineState {
    /// Order sentinels not resolved yet
    Ready,
    Playing(SequencerState),
    /// The last row played, but advancing past it failed
    Failed(PlaybackError),
    Finished,
}

/// The main playback engine.
pub struct Engine {
    song: Song,
    config: PlaybackConfig,
    table: CommandTable,
    state: EngineState,
    channels: Vec<ChannelState>,
    /// Song global volume (0-128)
    global_volume: u8,
    past_voices: Arc<PastVoicePool>,
    factory: Box<dyn VoiceFactory>,
}

impl Engine {
    /// Create an engine for `song`. Voices for triggered notes come from
    /// `factory`.
    pub fn new(song: Song, config: PlaybackConfig, factory: Box<dyn VoiceFactory>) -> Self {
        let system = PeriodSystem::from_linear_flag(config.linear_frequency_slides);
        let channels = song
            .channels
            .iter()
            .enumerate()
            .map(|(i, settings)| ChannelState::new(i, settings, system))
            .collect();
        Self {
            table: CommandTable::new(song.format, &config),
            global_volume: song.header.global_volume.min(128),
            past_voices: Arc::new(PastVoicePool::new(config.past_voice_pool_max)),
            state: EngineState::Ready,
            channels,
            config,
            song,
            factory,
        }
    }

    pub fn song(&self) -> &Song {
        &self.song
    }

    pub fn config(&self) -> &PlaybackConfig {
        &self.config
    }

    pub fn channels(&self) -> &[ChannelState] {
        &self.channels
    }

    pub fn global_volume(&self) -> u8 {
        self.global_volume
    }

    /// Shared handle to the past-voice pool, for a mixer on another thread.
    pub fn past_voices(&self) -> Arc<PastVoicePool> {
        Arc::clone(&self.past_voices)
    }

    /// Sequencer position of the next row, while playing.
    pub fn sequencer(&self) -> Option<&SequencerState> {
        match &self.state {
            EngineState::Playing(state) => Some(state),
            _ => None,
        }
    }

    pub fn is_finished(&self) -> bool {
        matches!(self.state, EngineState::Finished)
    }

    /// Play the next row. `Ok(None)` once the song has ended; a fatal
    /// error is returned once, after which the engine is finished.
    pub fn render_row(&mut self) -> Result<Option<RowOutput>> {
        let state = match std::mem::replace(&mut self.state, EngineState::Finished) {
            EngineState::Finished => return Ok(None),
            EngineState::Failed(e) => return Err(self.fail(e)),
            EngineState::Playing(state) => state,
            EngineState::Ready => match SequencerState::begin(&self.song, &self.config) {
                Ok(Transition::Continue(state)) => state,
                Ok(Transition::StopSong) => {
                    log::info!("song has no playable orders");
                    return Ok(None);
                }
                Err(e) => return Err(self.fail(e)),
            },
        };

        match self.play_row(&state) {
            Ok((row, Ok(Transition::Continue(next)))) => {
                if next.entered_order() {
                    for ch in self.channels.iter_mut() {
                        ch.memory.pattern_loop_start = 0;
                    }
                }
                self.state = EngineState::Playing(next);
                Ok(Some(row))
            }
            Ok((row, Ok(Transition::StopSong))) => {
                log::info!("song ended after order {} row {}", row.order, row.row);
                Ok(Some(row))
            }
            // The row itself played; report the error on the next call
            Ok((row, Err(e))) => {
                self.state = EngineState::Failed(e);
                Ok(Some(row))
            }
            Err(e) => Err(self.fail(e)),
        }
    }

    /// Play up to `max_rows` rows.
    pub fn play(&mut self, max_rows: usize) -> Playback {
        let mut rows = Vec::new();
        while rows.len() < max_rows {
            match self.render_row() {
                Ok(Some(row)) => rows.push(row),
                Ok(None) => return Playback { rows, end: PlaybackEnd::SongEnd },
                Err(e) => return Playback { rows, end: PlaybackEnd::Error(e) },
            }
        }
        let end = if self.is_finished() { PlaybackEnd::SongEnd } else { PlaybackEnd::RowLimit };
        Playback { rows, end }
    }

    fn fail(&mut self, error: PlaybackError) -> PlaybackError {
        log::error!("playback stopped: {error}");
        self.state = EngineState::Finished;
        error
    }

    /// Errors before the first tick abort the row. An error while moving
    /// to the next row is returned alongside the finished row.
    fn play_row(&mut self, state: &SequencerState) -> Result<(RowOutput, Result<Transition>)> {
        let order = state.current_order();
        let row = state.current_row();
        let pattern_index = state
            .current_pattern(&self.song)
            .ok_or(PlaybackError::InvalidTransaction { reason: "current order does not name a pattern" })?;
        let pattern = self
            .song
            .patterns
            .get(pattern_index)
            .ok_or(PlaybackError::InvalidPatternIndex { order, pattern: pattern_index as u8 })?;

        // Decode and pre-start
        let mut start = RowUpdate::new();
        let mut traces = Vec::with_capacity(self.channels.len());
        for ch in self.channels.iter_mut() {
            let cmd = pattern.row(row).and_then(|cells| cells.get(ch.index)).copied().unwrap_or_default();
            let mut effects = self.table.decode(&cmd);
            for effect in effects.iter() {
                if let Effect::Unhandled { code, param } = *effect {
                    let mnemonic = self.table.mnemonic(EffectCommand::new(code, param));
                    if !self.config.ignore_unknown_effect {
                        return Err(PlaybackError::UnhandledEffect { channel: ch.index, row, mnemonic });
                    }
                    log::warn!("channel {}, row {}: ignoring unhandled effect {}", ch.index, row, mnemonic);
                }
            }
            effects.retain(|e| !matches!(e, Effect::Unhandled { .. }));
            traces.push(channel_trace(&self.table, ch.index, &cmd, &effects));
            if ch.enabled {
                ch.decode(&cmd, effects, &self.song, &mut start);
            }
        }
        log::trace!("order {order} pattern {pattern_index} row {row} decoded");

        let state = state.start_row(start)?;
        let ticks_this_row = state.ticks_this_row();
        let tick_duration = state.tick_duration();
        for ch in self.channels.iter_mut() {
            ch.clamp_note_play_tick(ticks_this_row);
        }

        let mut ticks = Vec::with_capacity(ticks_this_row as usize);
        for tick in 0..ticks_this_row {
            let mut ctx = TickContext {
                tick,
                ticks_this_row,
                old_effects: self.config.old_effect_mode,
                global_volume: &mut self.global_volume,
                past_voices: &self.past_voices,
                song: &self.song,
                factory: self.factory.as_mut(),
            };
            let mut channels = Vec::with_capacity(self.channels.len());
            for ch in self.channels.iter_mut().filter(|ch| ch.enabled) {
                let output = ch.process_tick(&mut ctx);
                drive_voice(&output, tick_duration);
                channels.push(output);
            }
            let past = self.past_voices.snapshot();
            for v in &past {
                v.voice.lock().advance(tick_duration);
            }
            ticks.push(TickOutput { tick, duration: tick_duration, channels, past_voices: past.len() });
        }
        let pruned = self.past_voices.prune();
        if pruned > 0 {
            log::debug!("pruned {pruned} finished past voices");
        }

        // Stop phase
        let mut end = RowUpdate::new();
        for ch in self.channels.iter_mut().filter(|ch| ch.enabled) {
            ch.stop(row, ticks_this_row, &mut end);
        }
        end.set_advance_row();
        let first_jump = end.first_jump();
        let transition = state.finish_row(end, &self.song, &self.config);

        let output = RowOutput {
            order,
            row,
            pattern: pattern_index,
            ticks_this_row,
            tick_duration,
            ticks,
            trace: RowTrace { order, row, pattern: pattern_index, channels: traces, first_jump },
        };
        Ok((output, transition))
    }
}

/// Push one tick's channel output to its voice.
fn drive_voice(output: &ChannelOutput, tick: Duration) {
    let Some(handle) = &output.voice else { return };
    if !output.mixing {
        return;
    }
    let mut voice = handle.lock();
    if let Some(period) = output.period {
        voice.set_period(period);
    }
    voice.set_volume(output.volume);
    voice.set_pan(output.pan);
    if let Some(pos) = output.sample_pos {
        voice.set_pos(pos);
    }
    voice.advance(tick);
}

fn channel_trace(table: &CommandTable, channel: usize, cmd: &Command, effects: &[Effect]) -> ChannelTrace {
    ChannelTrace {
        channel,
        note: cmd.note,
        instrument: cmd.instrument,
        volume: cmd.volume,
        effect: cmd.effect.map(|e| table.mnemonic(e)),
        decoded: effects.iter().map(Effect::name).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::voice::tests::CountingVoice;
    use crate::voice::{Voice, VoiceRequest};
    use tp_ir::{Format, Instrument, Note, OrderEntry, Pattern};

    fn factory() -> Box<dyn VoiceFactory> {
        Box::new(|_: &VoiceRequest| -> Option<Box<dyn Voice>> { Some(Box::new(CountingVoice::default())) })
    }

    fn one_pattern_song(rows: u16) -> Song {
        let mut song = Song::with_channels("engine", Format::S3m, 2);
        song.add_instrument(Instrument::new("lead"));
        song.add_pattern(Pattern::new(rows, 2));
        song.add_order(OrderEntry::Pattern(0));
        song
    }

    #[test]
    fn plays_every_row_then_ends() {
        let song = one_pattern_song(4);
        let mut engine = Engine::new(song, PlaybackConfig::default(), factory());
        let playback = engine.play(100);
        assert_eq!(playback.end, PlaybackEnd::SongEnd);
        assert_eq!(playback.positions(), [(0, 0), (0, 1), (0, 2), (0, 3)]);
        assert!(playback.rows.iter().all(|r| r.ticks.len() == 6));
        assert!(engine.is_finished());
        assert!(engine.render_row().unwrap().is_none());
    }

    #[test]
    fn row_limit_stops_early() {
        let song = one_pattern_song(64);
        let mut engine = Engine::new(song, PlaybackConfig::default(), factory());
        let playback = engine.play(3);
        assert_eq!(playback.end, PlaybackEnd::RowLimit);
        assert_eq!(playback.rows.len(), 3);
        assert_eq!(engine.sequencer().map(|s| s.current_row()), Some(3));
    }

    #[test]
    fn empty_order_list_ends_immediately() {
        let song = Song::with_channels("empty", Format::S3m, 1);
        let mut engine = Engine::new(song, PlaybackConfig::default(), factory());
        let playback = engine.play(10);
        assert!(playback.rows.is_empty());
        assert_eq!(playback.end, PlaybackEnd::SongEnd);
    }

    #[test]
    fn speed_change_applies_to_its_own_row() {
        let mut song = one_pattern_song(2);
        *song.patterns[0].cell_mut(0, 0) = Command::empty().with_effect(1, 3);
        let mut engine = Engine::new(song, PlaybackConfig::default(), factory());
        let playback = engine.play(10);
        assert_eq!(playback.rows[0].ticks_this_row, 3);
        assert_eq!(playback.rows[1].ticks_this_row, 3);
    }

    #[test]
    fn channel_outputs_follow_notes() {
        let mut song = one_pattern_song(2);
        *song.patterns[0].cell_mut(0, 1) = Command::empty().with_note(Note::On(60)).with_instrument(1);
        let mut engine = Engine::new(song, PlaybackConfig::default(), factory());
        let row = engine.render_row().unwrap().unwrap();
        let tick0 = &row.ticks[0];
        assert_eq!(tick0.channels.len(), 2);
        assert!(tick0.channels[0].voice.is_none());
        assert!(tick0.channels[1].mixing);
        assert_eq!(tick0.channels[1].pan, 0xC0);
        assert_eq!(row.trace.channels[1].to_string(), "C-5 01 .. ...");
    }

    #[test]
    fn global_volume_scales_output() {
        let mut song = one_pattern_song(1);
        *song.patterns[0].cell_mut(0, 0) =
            Command::empty().with_note(Note::On(60)).with_instrument(1).with_effect(22, 64);
        let mut engine = Engine::new(song, PlaybackConfig::default(), factory());
        let row = engine.render_row().unwrap().unwrap();
        assert!((row.ticks[0].channels[0].volume - 0.5).abs() < 1e-6);
        assert_eq!(engine.global_volume(), 64);
    }

    #[test]
    fn disabled_channels_are_skipped() {
        let mut song = one_pattern_song(1);
        song.channels[1].enabled = false;
        let mut engine = Engine::new(song, PlaybackConfig::default(), factory());
        let row = engine.render_row().unwrap().unwrap();
        assert_eq!(row.ticks[0].channels.len(), 1);
    }
}
