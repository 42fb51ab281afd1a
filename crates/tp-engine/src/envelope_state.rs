//! Runtime cursor for `Envelope<T>`.
//!
//! The cursor walks points tick by tick. Loops jump back when the cursor
//! arrives on their end point; a loop whose begin equals its end holds the
//! value there (XM-style sustain point) until the key is released.

use tp_ir::{EnvPoint, Envelope, LoopRange};

/// Current segment of an envelope and the progress through it.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct EnvelopeSample<'a, T> {
    pub current: &'a EnvPoint<T>,
    pub next: &'a EnvPoint<T>,
    /// Progress from `current` to `next`, in [0, 1]
    pub t: f32,
}

/// Runtime state for a playing envelope.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EnvelopeState {
    /// Index of the point the cursor is leaving.
    position: usize,
    /// Ticks until the cursor reaches the next point.
    ticks_remaining: u16,
    /// Ran past the final point, or the envelope is disabled.
    stopped: bool,
}

impl Default for EnvelopeState {
    fn default() -> Self {
        Self { position: 0, ticks_remaining: 0, stopped: true }
    }
}

impl EnvelopeState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn position(&self) -> usize {
        self.position
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped
    }

    /// Restart at the first point.
    pub fn reset<T>(&mut self, env: &Envelope<T>) {
        self.position = 0;
        match env.points.first() {
            Some(first) if env.enabled => {
                self.ticks_remaining = first.length;
                self.stopped = false;
            }
            _ => {
                self.ticks_remaining = 0;
                self.stopped = true;
            }
        }
    }

    /// Advance one tick. Returns `true` exactly once, on the tick the
    /// cursor runs past the final point with no loop engaged.
    pub fn advance<T>(&mut self, env: &Envelope<T>, key_on: bool, key_just_released: bool) -> bool {
        if self.stopped || env.points.is_empty() {
            return false;
        }
        if key_just_released && self.holding(env, true) {
            self.ticks_remaining = env.points[self.position].length;
        }
        if self.ticks_remaining > 0 {
            self.ticks_remaining -= 1;
            if self.ticks_remaining > 0 {
                return false;
            }
        }
        self.step(env, key_on)
    }

    fn step<T>(&mut self, env: &Envelope<T>, key_on: bool) -> bool {
        let last = env.points.len() - 1;
        if self.holding(env, key_on) {
            self.ticks_remaining = 0;
            return false;
        }
        if self.position >= last {
            self.position = last;
            self.ticks_remaining = 0;
            self.stopped = true;
            return true;
        }
        self.position += 1;
        if let Some(range) = active_range(env, key_on) {
            if self.position == range.end as usize && range.begin != range.end {
                self.position = range.begin as usize;
            }
        }
        self.ticks_remaining = env.points[self.position].length;
        false
    }

    /// Sitting on a single-point loop that is currently engaged.
    fn holding<T>(&self, env: &Envelope<T>, key_on: bool) -> bool {
        active_range(env, key_on)
            .is_some_and(|r| r.begin == r.end && r.end as usize == self.position)
    }

    /// Current segment, or `None` for a disabled or empty envelope.
    pub fn current<'a, T>(&self, env: &'a Envelope<T>, key_on: bool) -> Option<EnvelopeSample<'a, T>> {
        if !env.enabled {
            return None;
        }
        let current = env.points.get(self.position)?;
        let next = if self.stopped || self.holding(env, key_on) {
            current
        } else {
            env.points.get(self.position + 1).unwrap_or(current)
        };
        let t = if current.length == 0 {
            1.0
        } else {
            1.0 - self.ticks_remaining as f32 / current.length as f32
        };
        Some(EnvelopeSample { current, next, t: t.clamp(0.0, 1.0) })
    }

    /// Interpolated value using the supplied interpolation function.
    pub fn evaluate<T: Copy>(
        &self,
        env: &Envelope<T>,
        key_on: bool,
        lerp: impl Fn(T, T, f32) -> T,
    ) -> Option<T> {
        self.current(env, key_on).map(|s| lerp(s.current.value, s.next.value, s.t))
    }

    /// Reset, then replay `ticks` advances with the key held.
    pub fn set_position<T>(&mut self, env: &Envelope<T>, ticks: u16) {
        self.reset(env);
        for _ in 0..ticks {
            self.advance(env, true, false);
        }
    }
}

/// Sustain range while the key is held, else the regular loop. Ranges
/// pointing past the last point are ignored.
fn active_range<T>(env: &Envelope<T>, key_on: bool) -> Option<LoopRange> {
    let range = if key_on { env.sustain_range.or(env.loop_range) } else { env.loop_range };
    range.filter(|r| (r.end as usize) < env.points.len() && r.begin <= r.end)
}

/// Linear interpolation for volume envelopes.
pub fn lerp_u8(a: u8, b: u8, t: f32) -> u8 {
    libm::roundf(a as f32 + (b as f32 - a as f32) * t) as u8
}

/// Linear interpolation for panning and pitch envelopes.
pub fn lerp_i8(a: i8, b: i8, t: f32) -> i8 {
    libm::roundf(a as f32 + (b as f32 - a as f32) * t) as i8
}
