//! Benchmarks for the row loop.
//!
//! Run with: cargo bench --bench engine_bench -p tp-engine

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use std::hint::black_box;
use std::time::Duration;
use tp_engine::{Engine, Period, PlaybackConfig, Voice, VoiceRequest};
use tp_ir::{Command, Format, Instrument, Note, OrderEntry, Pattern, Song};

/// Voice that does nothing, so only the engine is measured.
struct NullVoice;

impl Voice for NullVoice {
    fn attack(&mut self) {}
    fn release(&mut self) {}
    fn fadeout(&mut self) {}
    fn is_done(&self) -> bool {
        false
    }
    fn set_period(&mut self, _period: Period) {}
    fn set_volume(&mut self, _volume: f32) {}
    fn set_pan(&mut self, _pan: u8) {}
    fn set_pos(&mut self, _pos: u32) {}
    fn advance(&mut self, _tick: Duration) {}
}

/// A busy IT song: a note on every other row of every channel, with
/// vibrato, volume slides and arpeggio mixed in.
fn busy_song(channels: u8) -> Song {
    let mut song = Song::with_channels("bench", Format::It, channels);
    song.add_instrument(Instrument::new("lead"));
    let mut pattern = Pattern::new(64, channels);
    for row in 0..64u16 {
        for ch in 0..channels {
            let mut cmd = Command::empty();
            if row % 2 == 0 {
                cmd = cmd.with_note(Note::On(48 + (row % 24) as u8)).with_instrument(1);
            }
            cmd = match (row + ch as u16) % 4 {
                0 => cmd.with_effect(8, 0x46),
                1 => cmd.with_effect(4, 0x02),
                2 => cmd.with_effect(10, 0x37),
                _ => cmd.with_volume(40),
            };
            *pattern.cell_mut(row, ch) = cmd;
        }
    }
    song.add_pattern(pattern);
    song.add_order(OrderEntry::Pattern(0));
    song
}

fn engine(channels: u8) -> Engine {
    Engine::new(
        busy_song(channels),
        PlaybackConfig::default().with_order_loop(true),
        Box::new(|_: &VoiceRequest| -> Option<Box<dyn Voice>> { Some(Box::new(NullVoice)) }),
    )
}

fn bench_render_row(c: &mut Criterion) {
    let mut group = c.benchmark_group("render_row");

    for channels in [4u8, 16, 32].iter() {
        group.bench_with_input(BenchmarkId::from_parameter(channels), channels, |b, &channels| {
            let mut engine = engine(channels);
            b.iter(|| {
                black_box(engine.render_row().ok());
            });
        });
    }

    group.finish();
}

fn bench_pattern(c: &mut Criterion) {
    c.bench_function("pattern_64_rows_8ch", |b| {
        b.iter(|| {
            let mut engine = engine(8);
            black_box(engine.play(64).rows.len());
        });
    });
}

criterion_group!(benches, bench_render_row, bench_pattern);
criterion_main!(benches);
