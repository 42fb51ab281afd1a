//! Per-row playback output and its diagnostic trace.

use std::fmt;
use std::time::Duration;

use heapless::String;
use tp_ir::Note;

use crate::channel::ChannelOutput;
use crate::error::PlaybackError;
use crate::sequencer::JumpKind;

/// Every channel's output for one tick.
#[derive(Clone, Debug)]
pub struct TickOutput {
    pub tick: u16,
    pub duration: Duration,
    pub channels: Vec<ChannelOutput>,
    /// Past voices sounding during this tick
    pub past_voices: usize,
}

/// What one channel's row cell said, for display.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChannelTrace {
    pub channel: usize,
    pub note: Note,
    pub instrument: Option<u8>,
    /// Raw volume-column byte
    pub volume: Option<u8>,
    /// Effect column in tracker notation (`D0F`, `G40`)
    pub effect: Option<String<4>>,
    /// Names of the decoded effects, volume column first
    pub decoded: Vec<&'static str>,
}

impl fmt::Display for ChannelTrace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.note)?;
        match self.instrument {
            Some(i) => write!(f, " {:02}", i)?,
            None => f.write_str(" ..")?,
        }
        match self.volume {
            Some(v) => write!(f, " {:02X}", v)?,
            None => f.write_str(" ..")?,
        }
        match &self.effect {
            Some(e) => write!(f, " {}", e),
            None => f.write_str(" ..."),
        }
    }
}

/// Display-only summary of a row.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RowTrace {
    pub order: usize,
    pub row: u16,
    pub pattern: usize,
    pub channels: Vec<ChannelTrace>,
    /// Which of a row jump or an order jump came first in channel order.
    /// Informational; both are applied regardless.
    pub first_jump: Option<JumpKind>,
}

impl fmt::Display for RowTrace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:03}:{:02X}:{:02}", self.order, self.pattern, self.row)?;
        for ch in &self.channels {
            write!(f, " | {}", ch)?;
        }
        Ok(())
    }
}

/// Everything the engine produced for one row.
#[derive(Clone, Debug)]
pub struct RowOutput {
    pub order: usize,
    pub row: u16,
    pub pattern: usize,
    pub ticks_this_row: u16,
    pub tick_duration: Duration,
    pub ticks: Vec<TickOutput>,
    pub trace: RowTrace,
}

impl RowOutput {
    /// Total playing time of the row.
    pub fn duration(&self) -> Duration {
        self.tick_duration * self.ticks_this_row as u32
    }
}

/// Why [`Engine::play`](crate::Engine::play) returned.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PlaybackEnd {
    SongEnd,
    RowLimit,
    Error(PlaybackError),
}

/// Rows played by one [`Engine::play`](crate::Engine::play) call.
#[derive(Clone, Debug)]
pub struct Playback {
    pub rows: Vec<RowOutput>,
    pub end: PlaybackEnd,
}

impl Playback {
    /// `(order, row)` of every row played, in order.
    pub fn positions(&self) -> Vec<(usize, u16)> {
        self.rows.iter().map(|r| (r.order, r.row)).collect()
    }

    pub fn duration(&self) -> Duration {
        self.rows.iter().map(RowOutput::duration).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn row_trace_display() {
        let mut effect = String::new();
        let _ = effect.push_str("D0F");
        let trace = RowTrace {
            order: 1,
            row: 4,
            pattern: 2,
            channels: vec![
                ChannelTrace {
                    channel: 0,
                    note: Note::On(60),
                    instrument: Some(1),
                    volume: Some(0x20),
                    effect: Some(effect),
                    decoded: vec!["SetVolume", "VolumeSlide"],
                },
                ChannelTrace {
                    channel: 1,
                    note: Note::None,
                    instrument: None,
                    volume: None,
                    effect: None,
                    decoded: Vec::new(),
                },
            ],
            first_jump: None,
        };
        assert_eq!(trace.to_string(), "001:02:04 | C-5 01 20 D0F | ... .. .. ...");
    }

    #[test]
    fn row_duration_counts_every_tick() {
        let row = RowOutput {
            order: 0,
            row: 0,
            pattern: 0,
            ticks_this_row: 6,
            tick_duration: Duration::from_millis(20),
            ticks: Vec::new(),
            trace: RowTrace { order: 0, row: 0, pattern: 0, channels: Vec::new(), first_jump: None },
        };
        assert_eq!(row.duration(), Duration::from_millis(120));
    }
}
