//! End-to-end playback scenarios.
//!
//! Songs are built in code and played through a recording voice, so each
//! test can check exactly what the engine told the mixer and when.

use std::sync::Arc;
use std::time::Duration;

use approx::assert_relative_eq;
use parking_lot::Mutex;
use trackplay::engine::period::{AmigaPeriod, LinearPeriod};
use trackplay::engine::JumpKind;
use trackplay::ir::NewNoteAction;
use trackplay::{
    Command, Engine, Format, Instrument, Note, OrderEntry, Pattern, Period, PlaybackConfig, PlaybackEnd,
    PlaybackError, RowOutput, Song, Voice, VoiceRequest,
};

#[derive(Clone, Debug, PartialEq)]
enum Call {
    Attack,
    Release,
    Fadeout,
    Pos(u32),
    Advance,
}

type Log = Arc<Mutex<Vec<(usize, Call)>>>;

/// Voice that appends every lifecycle call to a shared log.
struct Recorder {
    id: usize,
    log: Log,
}

impl Recorder {
    fn record(&self, call: Call) {
        self.log.lock().push((self.id, call));
    }
}

impl Voice for Recorder {
    fn attack(&mut self) {
        self.record(Call::Attack);
    }
    fn release(&mut self) {
        self.record(Call::Release);
    }
    fn fadeout(&mut self) {
        self.record(Call::Fadeout);
    }
    fn is_done(&self) -> bool {
        false
    }
    fn set_period(&mut self, _period: Period) {}
    fn set_volume(&mut self, _volume: f32) {}
    fn set_pan(&mut self, _pan: u8) {}
    fn set_pos(&mut self, pos: u32) {
        self.record(Call::Pos(pos));
    }
    fn advance(&mut self, _tick: Duration) {
        self.record(Call::Advance);
    }
}

fn engine_with_log(song: Song, config: PlaybackConfig) -> (Engine, Log) {
    let log: Log = Arc::default();
    let shared = log.clone();
    let mut next_id = 0;
    let factory = move |_: &VoiceRequest| -> Option<Box<dyn Voice>> {
        next_id += 1;
        Some(Box::new(Recorder { id: next_id, log: shared.clone() }))
    };
    (Engine::new(song, config, Box::new(factory)), log)
}

fn engine(song: Song) -> Engine {
    engine_with_log(song, PlaybackConfig::default()).0
}

/// S3M song with `patterns` empty patterns of `rows` rows, played in order.
fn song(format: Format, channels: u8, rows: u16, patterns: u8) -> Song {
    let mut song = Song::with_channels("scenario", format, channels);
    song.add_instrument(Instrument::new("lead"));
    for p in 0..patterns {
        song.add_pattern(Pattern::new(rows, channels));
        song.add_order(OrderEntry::Pattern(p));
    }
    song
}

fn set(song: &mut Song, pattern: usize, row: u16, channel: u8, cmd: Command) {
    *song.patterns[pattern].cell_mut(row, channel) = cmd;
}

fn note() -> Command {
    Command::empty().with_note(Note::On(60)).with_instrument(1)
}

/// Output period of channel 0 on every tick of `row`.
fn periods(row: &RowOutput) -> Vec<Option<Period>> {
    row.ticks.iter().map(|t| t.channels[0].period).collect()
}

fn amiga(period: f32) -> Option<Period> {
    Some(Period::Amiga(AmigaPeriod(period)))
}

/// C-5 at 8363 Hz.
const C5: f32 = 1712.0;

// S3M / IT letters
const SET_SPEED: u8 = 1;
const POSITION_JUMP: u8 = 2;
const PATTERN_BREAK: u8 = 3;
const VOLUME_SLIDE: u8 = 4;
const TONE_PORTA: u8 = 7;
const VIBRATO: u8 = 8;
const TREMOR: u8 = 9;
const ARPEGGIO: u8 = 10;
const CHANNEL_VOLUME_SLIDE: u8 = 14;
const SAMPLE_OFFSET: u8 = 15;
const PANNING_SLIDE: u8 = 16;
const RETRIGGER: u8 = 17;
const TREMOLO: u8 = 18;
const EXTENDED: u8 = 19;
const TEMPO: u8 = 20;
const GLOBAL_VOLUME: u8 = 22;
const GLOBAL_VOLUME_SLIDE: u8 = 23;
const PANBRELLO: u8 = 25;
const MIDI_MACRO: u8 = 26;

// XM
const XM_EXTENDED: u8 = 0xE;

#[test]
fn note_delay_attacks_on_its_tick() {
    let mut s = song(Format::S3m, 1, 1, 1);
    set(&mut s, 0, 0, 0, note().with_effect(EXTENDED, 0xD3));
    let (mut engine, log) = engine_with_log(s, PlaybackConfig::default());

    let row = engine.render_row().unwrap().unwrap();
    assert_eq!(row.ticks_this_row, 6);
    for tick in &row.ticks[..3] {
        assert!(tick.channels[0].voice.is_none());
        assert!(!tick.channels[0].mixing);
    }
    assert!(row.ticks[3].channels[0].mixing);

    let calls: Vec<Call> = log.lock().iter().map(|(_, c)| c.clone()).collect();
    assert_eq!(calls, [Call::Attack, Call::Pos(0), Call::Advance, Call::Advance, Call::Advance]);
}

#[test]
fn skip_then_end_marker_plays_pattern_once() {
    let mut s = song(Format::S3m, 1, 2, 1);
    s.add_order(OrderEntry::NextPattern);
    s.add_order(OrderEntry::InvalidPattern);
    let mut engine = engine(s);
    let playback = engine.play(100);
    assert_eq!(playback.positions(), [(0, 0), (0, 1)]);
    assert_eq!(playback.end, PlaybackEnd::SongEnd);
}

#[test]
fn end_marker_wraps_when_looping() {
    let mut s = song(Format::S3m, 1, 2, 1);
    s.add_order(OrderEntry::InvalidPattern);
    let (mut engine, _) = engine_with_log(s, PlaybackConfig::default().with_order_loop(true));
    let playback = engine.play(5);
    assert_eq!(playback.positions(), [(0, 0), (0, 1), (0, 0), (0, 1), (0, 0)]);
    assert_eq!(playback.end, PlaybackEnd::RowLimit);
}

#[test]
fn row_and_order_jump_in_one_row_both_apply() {
    let mut s = song(Format::S3m, 2, 4, 3);
    set(&mut s, 0, 0, 0, Command::empty().with_effect(POSITION_JUMP, 2));
    set(&mut s, 0, 0, 1, Command::empty().with_effect(PATTERN_BREAK, 0x03));
    let mut engine = engine(s);
    let playback = engine.play(100);
    assert_eq!(playback.positions(), [(0, 0), (2, 3)]);
    assert_eq!(playback.rows[0].trace.first_jump, Some(JumpKind::Order));
    assert_eq!(playback.end, PlaybackEnd::SongEnd);
}

#[test]
fn pattern_break_alone_goes_to_next_order() {
    let mut s = song(Format::S3m, 1, 4, 2);
    set(&mut s, 0, 1, 0, Command::empty().with_effect(PATTERN_BREAK, 0x02));
    let mut engine = engine(s);
    let playback = engine.play(100);
    assert_eq!(playback.positions(), [(0, 0), (0, 1), (1, 2), (1, 3)]);
    assert_eq!(playback.rows[1].trace.first_jump, Some(JumpKind::Row));
}

#[test]
fn pattern_loop_repeats_exactly() {
    let mut s = song(Format::S3m, 1, 4, 1);
    set(&mut s, 0, 1, 0, Command::empty().with_effect(EXTENDED, 0xB0));
    set(&mut s, 0, 2, 0, Command::empty().with_effect(EXTENDED, 0xB2));
    let mut engine = engine(s);
    let rows: Vec<u16> = engine.play(100).rows.iter().map(|r| r.row).collect();
    assert_eq!(rows, [0, 1, 2, 1, 2, 1, 2, 3]);
}

#[test]
fn pattern_delay_repeats_row_ticks() {
    let mut s = song(Format::S3m, 2, 2, 1);
    set(&mut s, 0, 0, 0, Command::empty().with_effect(EXTENDED, 0xE2));
    // Only the first delay in a row counts
    set(&mut s, 0, 0, 1, Command::empty().with_effect(EXTENDED, 0xE5));
    let mut engine = engine(s);
    let playback = engine.play(100);
    assert_eq!(playback.positions(), [(0, 0), (0, 1)]);
    assert_eq!(playback.rows[0].ticks_this_row, 18);
    assert_eq!(playback.rows[0].ticks.len(), 18);
    assert_eq!(playback.rows[1].ticks_this_row, 6);
}

#[test]
fn fine_pattern_delays_add_up() {
    let mut s = song(Format::S3m, 2, 1, 1);
    set(&mut s, 0, 0, 0, Command::empty().with_effect(EXTENDED, 0x61));
    set(&mut s, 0, 0, 1, Command::empty().with_effect(EXTENDED, 0x62));
    let mut engine = engine(s);
    assert_eq!(engine.render_row().unwrap().unwrap().ticks_this_row, 9);
}

#[test]
fn speed_and_tempo_shape_row_timing() {
    let mut s = song(Format::S3m, 1, 2, 1);
    set(&mut s, 0, 0, 0, Command::empty().with_effect(SET_SPEED, 3));
    s.header.initial_tempo = 125;
    let mut engine = engine(s);
    let playback = engine.play(100);
    assert_relative_eq!(playback.rows[0].tick_duration.as_secs_f64(), 0.02, epsilon = 1e-9);
    assert_relative_eq!(playback.duration().as_secs_f64(), 0.12, epsilon = 1e-9);
}

#[test]
fn volume_slide_reaches_voice_output() {
    let mut s = song(Format::S3m, 1, 1, 1);
    set(&mut s, 0, 0, 0, note().with_effect(VOLUME_SLIDE, 0x04));
    let mut engine = engine(s);
    let row = engine.render_row().unwrap().unwrap();
    assert_relative_eq!(row.ticks[0].channels[0].volume, 1.0);
    assert_relative_eq!(row.ticks[5].channels[0].volume, 44.0 / 64.0);
}

#[test]
fn new_note_action_moves_voice_to_pool() {
    let mut s = song(Format::It, 1, 2, 1);
    s.instruments[0] = Instrument::new("pad").with_new_note_action(NewNoteAction::Fadeout);
    set(&mut s, 0, 0, 0, note());
    set(&mut s, 0, 1, 0, Command::empty().with_note(Note::On(64)));
    let (mut engine, log) = engine_with_log(s, PlaybackConfig::default());
    let pool = engine.past_voices();

    engine.render_row().unwrap();
    assert!(pool.is_empty());
    let row = engine.render_row().unwrap().unwrap();
    assert_eq!(pool.len(), 1);
    assert_eq!(row.ticks[0].past_voices, 1);
    assert!(log.lock().contains(&(1, Call::Fadeout)));
    // The detached voice keeps rendering alongside the new one
    let first_advances = log.lock().iter().filter(|(id, c)| *id == 1 && *c == Call::Advance).count();
    assert_eq!(first_advances, 12);
}

#[test]
fn past_note_cut_empties_pool() {
    let mut s = song(Format::It, 1, 3, 1);
    s.instruments[0] = Instrument::new("pad").with_new_note_action(NewNoteAction::Continue);
    set(&mut s, 0, 0, 0, note());
    set(&mut s, 0, 1, 0, note());
    set(&mut s, 0, 2, 0, Command::empty().with_effect(EXTENDED, 0x70));
    let mut engine = engine(s);
    let pool = engine.past_voices();
    engine.play(2);
    assert_eq!(pool.len(), 1);
    engine.play(1);
    assert!(pool.is_empty());
}

#[test]
fn unhandled_effect_is_fatal_by_default() {
    let mut s = song(Format::S3m, 2, 2, 1);
    set(&mut s, 0, 1, 1, Command::empty().with_effect(MIDI_MACRO, 0x01));
    let mut engine = engine(s);
    let playback = engine.play(100);
    assert_eq!(playback.rows.len(), 1);
    match playback.end {
        PlaybackEnd::Error(PlaybackError::UnhandledEffect { channel, row, mnemonic }) => {
            assert_eq!((channel, row), (1, 1));
            assert_eq!(mnemonic.as_str(), "Z01");
        }
        other => panic!("expected unhandled effect, got {other:?}"),
    }
    // The error is reported once
    assert!(engine.is_finished());
    assert!(engine.render_row().unwrap().is_none());
}

#[test]
fn unhandled_effect_ignored_when_configured() {
    let mut s = song(Format::S3m, 1, 2, 1);
    set(&mut s, 0, 1, 0, Command::empty().with_effect(MIDI_MACRO, 0x01));
    let (mut engine, _) = engine_with_log(s, PlaybackConfig::default().with_ignore_unknown_effect(true));
    let playback = engine.play(100);
    assert_eq!(playback.end, PlaybackEnd::SongEnd);
    assert_eq!(playback.rows.len(), 2);
    assert!(playback.rows[1].trace.channels[0].decoded.is_empty());
}

#[test]
fn all_skip_orders_detect_infinite_loop() {
    let mut s = song(Format::S3m, 1, 1, 0);
    s.add_order(OrderEntry::NextPattern);
    s.add_order(OrderEntry::NextPattern);
    let (mut engine, _) = engine_with_log(s, PlaybackConfig::default().with_order_loop(true));
    let playback = engine.play(10);
    assert!(playback.rows.is_empty());
    assert_eq!(playback.end, PlaybackEnd::Error(PlaybackError::InfiniteLoopDetected { order: 0 }));
}

#[test]
fn missing_pattern_is_an_error() {
    let mut s = song(Format::S3m, 1, 1, 1);
    s.add_order(OrderEntry::Pattern(9));
    let mut engine = engine(s);
    let playback = engine.play(10);
    assert_eq!(playback.rows.len(), 1);
    assert_eq!(playback.end, PlaybackEnd::Error(PlaybackError::InvalidPatternIndex { order: 1, pattern: 9 }));
}

#[test]
fn xm_key_off_releases_voice() {
    let mut s = song(Format::Xm, 1, 2, 1);
    s.instruments[0].fadeout = 0x800;
    set(&mut s, 0, 0, 0, note());
    set(&mut s, 0, 1, 0, Command::empty().with_effect(0x14, 2));
    let (mut engine, log) = engine_with_log(s, PlaybackConfig::default());
    engine.play(10);
    let calls: Vec<Call> = log.lock().iter().map(|(_, c)| c.clone()).collect();
    assert!(calls.contains(&Call::Release));
    assert!(calls.contains(&Call::Fadeout));
}

// === Retrigger ===

/// Ticks on which the voice was attacked while playing one row of `cmd`.
fn attack_ticks(format: Format, cmd: Command) -> Vec<usize> {
    let mut s = song(format, 1, 1, 1);
    set(&mut s, 0, 0, 0, cmd);
    let (mut engine, log) = engine_with_log(s, PlaybackConfig::default());
    engine.render_row().unwrap();
    let mut tick = 0;
    let mut attacks = Vec::new();
    for (_, call) in log.lock().iter() {
        match call {
            Call::Attack => attacks.push(tick),
            Call::Advance => tick += 1,
            _ => {}
        }
    }
    attacks
}

#[test]
fn retrigger_fires_every_interval_after_the_note() {
    assert_eq!(attack_ticks(Format::S3m, note().with_effect(RETRIGGER, 0x03)), [0, 3]);
    assert_eq!(attack_ticks(Format::S3m, note().with_effect(RETRIGGER, 0x01)), [0, 1, 2, 3, 4, 5]);
    assert_eq!(attack_ticks(Format::Xm, note().with_effect(XM_EXTENDED, 0x93)), [0, 3]);
    assert_eq!(attack_ticks(Format::Xm, note().with_effect(XM_EXTENDED, 0x91)), [0, 1, 2, 3, 4, 5]);
}

// === Pattern loop across orders ===

#[test]
fn loop_start_resets_on_new_order() {
    let mut s = song(Format::S3m, 1, 4, 2);
    set(&mut s, 0, 3, 0, Command::empty().with_effect(EXTENDED, 0xB0));
    set(&mut s, 1, 1, 0, Command::empty().with_effect(EXTENDED, 0xB1));
    let mut engine = engine(s);
    let playback = engine.play(100);
    assert_eq!(
        playback.positions(),
        [(0, 0), (0, 1), (0, 2), (0, 3), (1, 0), (1, 1), (1, 0), (1, 1), (1, 2), (1, 3)]
    );
}

// === Pitch ===

#[test]
fn vibrato_never_moves_the_base_period() {
    let mut s = song(Format::It, 1, 2, 1);
    set(&mut s, 0, 0, 0, note().with_effect(VIBRATO, 0x48));
    let mut engine = engine(s);
    let vibrato = engine.render_row().unwrap().unwrap();
    let p = periods(&vibrato);
    assert_eq!(p[0], amiga(C5));
    assert_eq!(p[2], amiga(C5 - 24.0));
    assert!(p[3..].iter().all(|p| *p != amiga(C5)));

    let next = engine.render_row().unwrap().unwrap();
    assert!(periods(&next).iter().all(|p| *p == amiga(C5)));
    assert_eq!(engine.channels()[0].active.period, amiga(C5));
}

#[test]
fn arpeggio_cycles_and_returns_to_base() {
    let mut s = song(Format::It, 1, 2, 1);
    set(&mut s, 0, 0, 0, note().with_effect(ARPEGGIO, 0x47));
    let mut engine = engine(s);
    let arp = periods(&engine.render_row().unwrap().unwrap());
    assert_eq!(arp[0], amiga(C5));
    assert_eq!(arp[1], amiga(1359.0));
    assert_eq!(arp[2], amiga(1143.0));
    assert_eq!(arp[3], amiga(C5));
    assert_eq!(arp[4], arp[1]);

    let next = engine.render_row().unwrap().unwrap();
    assert!(periods(&next).iter().all(|p| *p == amiga(C5)));
}

#[test]
fn tone_porta_stops_exactly_on_target() {
    let mut s = song(Format::It, 1, 2, 1);
    set(&mut s, 0, 0, 0, note());
    set(&mut s, 0, 1, 0, Command::empty().with_note(Note::On(62)).with_effect(TONE_PORTA, 0x10));
    let (mut engine, log) = engine_with_log(s, PlaybackConfig::default());
    engine.render_row().unwrap();
    let porta = engine.render_row().unwrap().unwrap();
    assert_eq!(
        periods(&porta),
        [amiga(C5), amiga(1648.0), amiga(1584.0), amiga(1524.0), amiga(1524.0), amiga(1524.0)]
    );
    let attacks = log.lock().iter().filter(|(_, c)| *c == Call::Attack).count();
    assert_eq!(attacks, 1);
}

#[test]
fn glissando_rounds_tone_porta_to_semitones() {
    let mut s = song(Format::It, 1, 2, 1);
    set(&mut s, 0, 0, 0, note().with_effect(EXTENDED, 0x11));
    set(&mut s, 0, 1, 0, Command::empty().with_note(Note::On(62)).with_effect(TONE_PORTA, 0x04));
    let config = PlaybackConfig { linear_frequency_slides: true, ..PlaybackConfig::default() };
    let (mut engine, _) = engine_with_log(s, config);
    engine.render_row().unwrap();
    let porta = engine.render_row().unwrap().unwrap();
    let semitones: Vec<(u8, u8)> = periods(&porta)
        .into_iter()
        .map(|p| match p {
            Some(Period::Linear(LinearPeriod { semitone, finetune, .. })) => (semitone, finetune),
            other => panic!("expected a linear period, got {other:?}"),
        })
        .collect();
    assert_eq!(semitones, [(60, 0), (60, 0), (61, 0), (61, 0), (61, 0), (61, 0)]);
    // The slide itself keeps its fine position
    match engine.channels()[0].active.period {
        Some(Period::Linear(p)) => assert_eq!(p.position(), 60 * 64 + 5 * 16),
        other => panic!("expected a linear period, got {other:?}"),
    }
}

// === Volume and panning ===

#[test]
fn tremolo_is_transient() {
    let mut s = song(Format::It, 1, 2, 1);
    set(&mut s, 0, 0, 0, note().with_volume(32).with_effect(TREMOLO, 0x48));
    let mut engine = engine(s);
    let row = engine.render_row().unwrap().unwrap();
    assert_relative_eq!(row.ticks[0].channels[0].volume, 0.5);
    assert_relative_eq!(row.ticks[2].channels[0].volume, 44.0 / 64.0);
    let next = engine.render_row().unwrap().unwrap();
    assert!(next.ticks.iter().all(|t| t.channels[0].volume == 0.5));
}

#[test]
fn tremor_alternates_on_and_off() {
    let mut s = song(Format::It, 1, 1, 1);
    set(&mut s, 0, 0, 0, note().with_effect(TREMOR, 0x11));
    let mut engine = engine(s);
    let row = engine.render_row().unwrap().unwrap();
    let volumes: Vec<f32> = row.ticks.iter().map(|t| t.channels[0].volume).collect();
    assert_eq!(volumes, [1.0, 1.0, 0.0, 0.0, 1.0, 1.0]);
}

#[test]
fn panbrello_and_panning_slide() {
    let mut s = song(Format::It, 1, 2, 1);
    set(&mut s, 0, 0, 0, note().with_effect(PANBRELLO, 0x48));
    set(&mut s, 0, 1, 0, Command::empty().with_effect(PANNING_SLIDE, 0x02));
    let mut engine = engine(s);
    let panbrello = engine.render_row().unwrap().unwrap();
    assert_eq!(panbrello.ticks[0].channels[0].pan, 0x40);
    assert_eq!(panbrello.ticks[2].channels[0].pan, 0x40 + 48);

    let slide = engine.render_row().unwrap().unwrap();
    let pans: Vec<u8> = slide.ticks.iter().map(|t| t.channels[0].pan).collect();
    assert_eq!(pans, [0x40, 0x48, 0x50, 0x58, 0x60, 0x68]);
}

#[test]
fn channel_and_global_volume_slides() {
    let mut s = song(Format::It, 2, 2, 1);
    set(&mut s, 0, 0, 0, note().with_effect(CHANNEL_VOLUME_SLIDE, 0x02));
    set(&mut s, 0, 0, 1, Command::empty().with_effect(GLOBAL_VOLUME, 0x40));
    set(&mut s, 0, 1, 1, Command::empty().with_effect(GLOBAL_VOLUME_SLIDE, 0x02));
    let mut engine = engine(s);
    let row = engine.render_row().unwrap().unwrap();
    assert_eq!(engine.channels()[0].channel_volume, 54);
    // Channel 1 sets the global volume after channel 0 rendered tick 0
    assert_relative_eq!(row.ticks[0].channels[0].volume, 1.0);
    assert_relative_eq!(row.ticks[5].channels[0].volume, 54.0 / 64.0 * 0.5);

    engine.render_row().unwrap();
    assert_eq!(engine.global_volume(), 54);
}

#[test]
fn sample_offset_uses_high_offset() {
    let mut s = song(Format::It, 1, 2, 1);
    set(&mut s, 0, 0, 0, Command::empty().with_effect(EXTENDED, 0xA1));
    set(&mut s, 0, 1, 0, note().with_effect(SAMPLE_OFFSET, 0x20));
    let (mut engine, log) = engine_with_log(s, PlaybackConfig::default());
    engine.render_row().unwrap();
    let row = engine.render_row().unwrap().unwrap();
    assert_eq!(row.ticks[0].channels[0].sample_pos, Some(0x1_2000));
    assert!(log.lock().contains(&(1, Call::Pos(0x1_2000))));
}

// === Timing ===

#[test]
fn tempo_slide_applies_to_the_next_row() {
    let mut s = song(Format::It, 1, 2, 1);
    set(&mut s, 0, 0, 0, Command::empty().with_effect(TEMPO, 0x14));
    let mut engine = engine(s);
    let playback = engine.play(10);
    assert_eq!(playback.rows[0].ticks_this_row, 6);
    assert_relative_eq!(playback.rows[0].tick_duration.as_secs_f64(), 2.5 / 125.0, epsilon = 1e-9);
    assert_relative_eq!(playback.rows[1].tick_duration.as_secs_f64(), 2.5 / 145.0, epsilon = 1e-9);
}
