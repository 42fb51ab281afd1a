//! Order/row sequencer.
//!
//! `SequencerState` is a value: effects stage their requests in a
//! [`RowUpdate`], and the engine applies it with [`SequencerState::start_row`]
//! (before tick 0) and [`SequencerState::finish_row`] (after the last tick).
//! Both return a new state; the update is consumed, so it applies exactly
//! once, and dropping it discards it.

use std::collections::BTreeSet;
use std::time::Duration;

use tp_ir::{OrderEntry, Song};

use crate::config::PlaybackConfig;
use crate::error::{PlaybackError, Result};

/// Tempo range in BPM.
pub const TEMPO_MIN: u8 = 32;
pub const TEMPO_MAX: u8 = 255;

/// Which jump request a row made first. Informational; both requests
/// always apply.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum JumpKind {
    Row,
    Order,
}

/// Staged sequencer changes for one row.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RowUpdate {
    next_order: Option<usize>,
    next_row: Option<u16>,
    break_order: bool,
    advance_row: bool,
    loop_start: Option<u16>,
    loop_end: Option<u16>,
    loop_count: Option<u8>,
    pattern_delay: Option<u8>,
    fine_pattern_delay: u16,
    tempo: Option<u8>,
    tempo_delta: i32,
    ticks: Option<u8>,
    first_jump: Option<JumpKind>,
}

impl RowUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    fn note_jump(&mut self, kind: JumpKind) {
        self.first_jump.get_or_insert(kind);
    }

    pub fn set_next_order(&mut self, order: usize) {
        self.next_order = Some(order);
        self.note_jump(JumpKind::Order);
    }

    pub fn set_next_row(&mut self, row: u16) {
        self.next_row = Some(row);
        self.note_jump(JumpKind::Row);
    }

    /// Move to the next order at the end of the row.
    pub fn set_break_order(&mut self) {
        self.break_order = true;
    }

    /// Ordinary row advance, after any pending pattern-loop repeat.
    pub fn set_advance_row(&mut self) {
        self.advance_row = true;
    }

    pub fn set_pattern_loop_start(&mut self, row: u16) {
        self.loop_start = Some(row);
    }

    pub fn set_pattern_loop_end(&mut self, row: u16) {
        self.loop_end = Some(row);
    }

    pub fn set_pattern_loop_count(&mut self, count: u8) {
        self.loop_count = Some(count);
    }

    /// First setter in a row wins.
    pub fn set_pattern_delay(&mut self, rows: u8) {
        self.pattern_delay.get_or_insert(rows);
    }

    /// Additive across channels.
    pub fn set_fine_pattern_delay(&mut self, ticks: u8) {
        self.fine_pattern_delay += ticks as u16;
    }

    pub fn set_tempo(&mut self, tempo: u8) {
        self.tempo = Some(tempo);
    }

    pub fn acc_tempo_delta(&mut self, delta: i32) {
        self.tempo_delta += delta;
    }

    pub fn set_ticks(&mut self, ticks: u8) {
        self.ticks = Some(ticks);
    }

    pub fn first_jump(&self) -> Option<JumpKind> {
        self.first_jump
    }
}

/// Bounded pattern-loop state.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PatternLoop {
    pub enabled: bool,
    pub start_row: u16,
    pub end_row: u16,
    pub total_reps: u8,
    pub reps_so_far: u8,
}

/// Outcome of resolving order-list sentinels.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Resolved {
    Pattern { order: usize, pattern: usize },
    StopSong,
}

/// Result of finishing a row.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Transition {
    Continue(SequencerState),
    /// Normal end of the song
    StopSong,
}

/// Order, row and timing state.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SequencerState {
    current_order: usize,
    current_row: u16,
    ticks_per_row: u8,
    tempo: u8,
    row_has_pattern_delay: bool,
    repeat_count: u8,
    fine_pattern_delay: u16,
    pattern_loop: PatternLoop,
    played_orders: BTreeSet<usize>,
    ticks_this_row: u16,
    /// The last transition entered an order rather than moving within one
    entered_order: bool,
    ended: bool,
}

impl SequencerState {
    /// State at order 0, row 0, with the song's initial speed and tempo.
    /// Sentinels are not resolved yet; see [`SequencerState::begin`].
    pub fn new(song: &Song) -> Self {
        let ticks = song.header.initial_speed.max(1);
        Self {
            current_order: 0,
            current_row: 0,
            ticks_per_row: ticks,
            tempo: song.header.initial_tempo.clamp(TEMPO_MIN, TEMPO_MAX),
            row_has_pattern_delay: false,
            repeat_count: 0,
            fine_pattern_delay: 0,
            pattern_loop: PatternLoop::default(),
            played_orders: BTreeSet::new(),
            ticks_this_row: ticks as u16,
            entered_order: false,
            ended: false,
        }
    }

    /// Enter the first playable order.
    pub fn begin(song: &Song, config: &PlaybackConfig) -> Result<Transition> {
        Self::new(song).enter_order(0, 0, song, config)
    }

    pub fn current_order(&self) -> usize {
        self.current_order
    }

    pub fn current_row(&self) -> u16 {
        self.current_row
    }

    pub fn ticks_per_row(&self) -> u8 {
        self.ticks_per_row
    }

    pub fn tempo(&self) -> u8 {
        self.tempo
    }

    pub fn row_has_pattern_delay(&self) -> bool {
        self.row_has_pattern_delay
    }

    pub fn repeat_count(&self) -> u8 {
        self.repeat_count
    }

    pub fn fine_pattern_delay(&self) -> u16 {
        self.fine_pattern_delay
    }

    pub fn pattern_loop(&self) -> PatternLoop {
        self.pattern_loop
    }

    pub fn has_played(&self, order: usize) -> bool {
        self.played_orders.contains(&order)
    }

    /// Tick count of the current row, fixed once `start_row` has run.
    pub fn ticks_this_row(&self) -> u16 {
        self.ticks_this_row
    }

    /// The current row is the first one played after entering its order.
    pub fn entered_order(&self) -> bool {
        self.entered_order
    }

    pub fn is_ended(&self) -> bool {
        self.ended
    }

    /// Seconds per tick: 2.5 / tempo.
    pub fn tick_duration(&self) -> Duration {
        Duration::from_secs_f64(2.5 / self.tempo as f64)
    }

    /// Copy of this state that accepts no further updates.
    pub fn stopped(&self) -> Self {
        Self { ended: true, ..self.clone() }
    }

    /// Resolve sentinels from the current order to a playable pattern,
    /// examining at most one full pass over the order list.
    pub fn resolve_pattern(&self, song: &Song, config: &PlaybackConfig) -> Result<Resolved> {
        let len = song.orders.len();
        if len == 0 {
            return Ok(Resolved::StopSong);
        }
        let mut order = self.current_order;
        for _ in 0..=len {
            if order >= len {
                if !config.order_loop_enabled {
                    return Ok(Resolved::StopSong);
                }
                order = 0;
            }
            match song.orders[order] {
                OrderEntry::NextPattern => order += 1,
                OrderEntry::InvalidPattern => {
                    if !config.order_loop_enabled {
                        return Ok(Resolved::StopSong);
                    }
                    order = len;
                }
                OrderEntry::Pattern(p) => {
                    if p as usize >= song.patterns.len() {
                        return Err(PlaybackError::InvalidPatternIndex { order, pattern: p });
                    }
                    if !config.order_loop_enabled && self.played_orders.contains(&order) {
                        log::debug!("order {order} already played, ending song");
                        return Ok(Resolved::StopSong);
                    }
                    return Ok(Resolved::Pattern { order, pattern: p as usize });
                }
            }
        }
        Err(PlaybackError::InfiniteLoopDetected { order: self.current_order })
    }

    /// Pattern index for the current order, if it names one.
    pub fn current_pattern(&self, song: &Song) -> Option<usize> {
        match song.orders.get(self.current_order) {
            Some(OrderEntry::Pattern(p)) => Some(*p as usize),
            _ => None,
        }
    }

    fn enter_order(&self, order: usize, row: u16, song: &Song, config: &PlaybackConfig) -> Result<Transition> {
        let mut next = self.clone();
        next.current_order = order;
        match next.resolve_pattern(song, config)? {
            Resolved::StopSong => Ok(Transition::StopSong),
            Resolved::Pattern { order, pattern } => {
                let rows = song.patterns[pattern].rows;
                next.current_order = order;
                next.current_row = if row < rows { row } else { 0 };
                next.pattern_loop = PatternLoop::default();
                next.entered_order = true;
                next.played_orders.insert(order);
                log::debug!("order {} (pattern {}) row {}", order, pattern, next.current_row);
                Ok(Transition::Continue(next))
            }
        }
    }

    fn apply_timing(&mut self, update: &RowUpdate) {
        if let Some(ticks) = update.ticks {
            self.ticks_per_row = ticks.max(1);
        }
        if let Some(tempo) = update.tempo {
            self.tempo = tempo.clamp(TEMPO_MIN, TEMPO_MAX);
        }
        if update.tempo_delta != 0 {
            let tempo = self.tempo as i32 + update.tempo_delta;
            self.tempo = tempo.clamp(TEMPO_MIN as i32, TEMPO_MAX as i32) as u8;
        }
    }

    fn check_open(&self) -> Result<()> {
        if self.ended {
            return Err(PlaybackError::InvalidTransaction { reason: "row update applied after the song ended" });
        }
        Ok(())
    }

    /// Apply the decode-time update and fix the row's tick count.
    pub fn start_row(&self, update: RowUpdate) -> Result<SequencerState> {
        self.check_open()?;
        let mut next = self.clone();
        next.apply_timing(&update);
        next.row_has_pattern_delay = update.pattern_delay.is_some();
        next.repeat_count = update.pattern_delay.map_or(0, |rows| rows.saturating_add(1));
        next.fine_pattern_delay = update.fine_pattern_delay;
        next.ticks_this_row = next.ticks_per_row as u16 * next.repeat_count.max(1) as u16 + next.fine_pattern_delay;
        Ok(next)
    }

    /// Apply the end-of-row update: loops, jumps and the row advance.
    pub fn finish_row(&self, update: RowUpdate, song: &Song, config: &PlaybackConfig) -> Result<Transition> {
        self.check_open()?;
        let mut next = self.clone();
        next.entered_order = false;
        next.apply_timing(&update);

        if let Some(end_row) = update.loop_end {
            let lp = next.pattern_loop;
            if !(lp.enabled && lp.end_row == end_row) {
                next.pattern_loop = PatternLoop {
                    enabled: true,
                    // Loop start never lies past its end
                    start_row: update.loop_start.unwrap_or(0).min(end_row),
                    end_row,
                    total_reps: update.loop_count.unwrap_or(0),
                    reps_so_far: 0,
                };
            }
        }

        if let Some(order) = update.next_order {
            return next.enter_order(order, update.next_row.unwrap_or(0), song, config);
        }
        if update.break_order || update.next_row.is_some() {
            return next.enter_order(next.current_order + 1, update.next_row.unwrap_or(0), song, config);
        }
        if !update.advance_row {
            return Ok(Transition::Continue(next));
        }

        let lp = &mut next.pattern_loop;
        if lp.enabled && next.current_row == lp.end_row {
            if lp.reps_so_far < lp.total_reps {
                lp.reps_so_far += 1;
                log::debug!("pattern loop {}/{} back to row {}", lp.reps_so_far, lp.total_reps, lp.start_row);
                next.current_row = lp.start_row;
                return Ok(Transition::Continue(next));
            }
            lp.enabled = false;
        }

        let rows = next.current_pattern(song).and_then(|p| song.patterns.get(p)).map_or(0, |p| p.rows);
        if next.current_row + 1 < rows {
            next.current_row += 1;
            Ok(Transition::Continue(next))
        } else {
            next.enter_order(next.current_order + 1, 0, song, config)
        }
    }
}
