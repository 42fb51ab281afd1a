//! Pitch model for sample playback.
//!
//! A `Period` is either an Amiga period (inversely proportional to
//! frequency) or a linear period (semitone * 64 + finetune, log-space).
//! The system is chosen once per song; every slide, portamento and
//! modulation goes through `add_delta`, where a positive delta always
//! means "higher pitch".

use core::cmp::Ordering;

/// Note number that plays a sample at its c2spd.
pub const C5_NOTE: u8 = 60;

/// Reference playback rate for period tables.
pub const DEFAULT_C2SPD: u32 = 8363;

/// Amiga periods for C-5..B-5 at 8363 Hz (ST3 scale, 4x the ProTracker table).
const AMIGA_TABLE: [u16; 12] = [
    1712, 1616, 1524, 1440, 1356, 1280, 1208, 1140, 1076, 1016, 960, 907,
];

/// Clock such that period 1712 plays at 8363 Hz.
pub const AMIGA_CLOCK: f32 = 8363.0 * 1712.0;

/// Lowest allowed Amiga period (highest pitch).
pub const AMIGA_PERIOD_MIN: f32 = 64.0;

/// Highest allowed Amiga period (lowest pitch).
pub const AMIGA_PERIOD_MAX: f32 = 32767.0;

/// Linear period units per semitone.
pub const LINEAR_UNITS_PER_SEMITONE: i32 = 64;

const LINEAR_UNITS_PER_OCTAVE: f32 = 768.0;

/// Highest linear position (B-9 plus 63 finetune steps).
const LINEAR_MAX: i32 = 120 * LINEAR_UNITS_PER_SEMITONE - 1;

/// Signed pitch change. Positive raises pitch in either system.
///
/// Units: Amiga period units, or 1/64 semitone for linear periods.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct PeriodDelta(pub i32);

impl core::ops::Add for PeriodDelta {
    type Output = PeriodDelta;
    fn add(self, rhs: PeriodDelta) -> PeriodDelta {
        PeriodDelta(self.0.saturating_add(rhs.0))
    }
}

impl core::ops::Neg for PeriodDelta {
    type Output = PeriodDelta;
    fn neg(self) -> PeriodDelta {
        PeriodDelta(-self.0)
    }
}

/// Amiga-style period: larger value = lower pitch.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AmigaPeriod(pub f32);

impl AmigaPeriod {
    pub fn frequency(self) -> f32 {
        if self.0 <= 0.0 {
            return 0.0;
        }
        AMIGA_CLOCK / self.0
    }
}

/// Linear period: `semitone * 64 + finetune` relative to the sample's c2spd.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LinearPeriod {
    pub semitone: u8,
    /// Finetune within the semitone (0-63)
    pub finetune: u8,
    pub c2spd: u32,
}

impl LinearPeriod {
    /// Build from a semitone and a signed finetune, normalizing any carry.
    pub fn new(semitone: u8, finetune: i32, c2spd: u32) -> Self {
        Self::from_position(semitone as i32 * LINEAR_UNITS_PER_SEMITONE + finetune, c2spd)
    }

    fn from_position(position: i32, c2spd: u32) -> Self {
        let p = position.clamp(0, LINEAR_MAX);
        Self {
            semitone: (p / LINEAR_UNITS_PER_SEMITONE) as u8,
            finetune: (p % LINEAR_UNITS_PER_SEMITONE) as u8,
            c2spd,
        }
    }

    /// Absolute position in 1/64 semitones.
    pub fn position(self) -> i32 {
        self.semitone as i32 * LINEAR_UNITS_PER_SEMITONE + self.finetune as i32
    }

    pub fn frequency(self) -> f32 {
        let offset = self.position() - C5_NOTE as i32 * LINEAR_UNITS_PER_SEMITONE;
        self.c2spd as f32 * libm::exp2f(offset as f32 / LINEAR_UNITS_PER_OCTAVE)
    }
}

/// Engine-internal pitch.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Period {
    Amiga(AmigaPeriod),
    Linear(LinearPeriod),
}

impl Period {
    /// Apply a pitch delta: Amiga subtracts, linear adds.
    pub fn add_delta(self, delta: PeriodDelta) -> Period {
        match self {
            Period::Amiga(p) => Period::Amiga(AmigaPeriod(
                (p.0 - delta.0 as f32).clamp(AMIGA_PERIOD_MIN, AMIGA_PERIOD_MAX),
            )),
            Period::Linear(p) => {
                Period::Linear(LinearPeriod::from_position(p.position() + delta.0, p.c2spd))
            }
        }
    }

    /// Playback frequency in Hz.
    pub fn frequency(&self) -> f32 {
        match self {
            Period::Amiga(p) => p.frequency(),
            Period::Linear(p) => p.frequency(),
        }
    }

    /// Source samples consumed per output sample at `output_rate`.
    pub fn sampler_advance(&self, output_rate: u32) -> f32 {
        if output_rate == 0 {
            return 0.0;
        }
        self.frequency() / output_rate as f32
    }

    /// Interpolate toward `other`. Mixed systems snap to the nearer end.
    pub fn lerp(&self, other: &Period, t: f32) -> Period {
        let t = t.clamp(0.0, 1.0);
        match (self, other) {
            (Period::Amiga(a), Period::Amiga(b)) => Period::Amiga(AmigaPeriod(a.0 + (b.0 - a.0) * t)),
            (Period::Linear(a), Period::Linear(b)) => {
                let pos = a.position() as f32 + (b.position() - a.position()) as f32 * t;
                Period::Linear(LinearPeriod::from_position(libm::roundf(pos) as i32, a.c2spd))
            }
            _ if t < 0.5 => *self,
            _ => *other,
        }
    }

    /// Three-way pitch comparison: higher pitch is `Greater`, a missing
    /// period is lower than any present one.
    pub fn compare(lhs: Option<&Period>, rhs: Option<&Period>) -> Ordering {
        match (lhs, rhs) {
            (None, None) => Ordering::Equal,
            (None, Some(_)) => Ordering::Less,
            (Some(_), None) => Ordering::Greater,
            (Some(a), Some(b)) => match (a, b) {
                (Period::Amiga(x), Period::Amiga(y)) => y.0.total_cmp(&x.0),
                (Period::Linear(x), Period::Linear(y)) if x.c2spd == y.c2spd => {
                    x.position().cmp(&y.position())
                }
                _ => a.frequency().total_cmp(&b.frequency()),
            },
        }
    }

    /// Slide toward `target` by `amount`, landing exactly on the target
    /// instead of crossing it.
    pub fn porta_toward(self, target: Period, amount: u32) -> Period {
        let step = PeriodDelta(amount.min(i32::MAX as u32) as i32);
        match Period::compare(Some(&self), Some(&target)) {
            Ordering::Equal => target,
            Ordering::Less => {
                let next = self.add_delta(step);
                if Period::compare(Some(&next), Some(&target)) == Ordering::Less {
                    next
                } else {
                    target
                }
            }
            Ordering::Greater => {
                let next = self.add_delta(-step);
                if Period::compare(Some(&next), Some(&target)) == Ordering::Greater {
                    next
                } else {
                    target
                }
            }
        }
    }

    /// The same pitch moved by whole semitones.
    pub fn transpose(self, semitones: i32) -> Period {
        match self {
            Period::Amiga(p) => {
                let scaled = p.0 * libm::exp2f(-(semitones as f32) / 12.0);
                Period::Amiga(AmigaPeriod(scaled.clamp(AMIGA_PERIOD_MIN, AMIGA_PERIOD_MAX)))
            }
            Period::Linear(p) => Period::Linear(LinearPeriod::from_position(
                p.position() + semitones * LINEAR_UNITS_PER_SEMITONE,
                p.c2spd,
            )),
        }
    }

    /// The same pitch moved by a fractional number of semitones.
    pub fn shift(self, semitones: f32) -> Period {
        match self {
            Period::Amiga(p) => {
                let scaled = p.0 * libm::exp2f(-semitones / 12.0);
                Period::Amiga(AmigaPeriod(scaled.clamp(AMIGA_PERIOD_MIN, AMIGA_PERIOD_MAX)))
            }
            Period::Linear(p) => {
                let units = libm::roundf(semitones * LINEAR_UNITS_PER_SEMITONE as f32) as i32;
                Period::Linear(LinearPeriod::from_position(p.position() + units, p.c2spd))
            }
        }
    }

    /// Delta that takes `self` to `other` through `add_delta`.
    pub fn delta_to(&self, other: &Period) -> PeriodDelta {
        match (self, other) {
            (Period::Amiga(a), Period::Amiga(b)) => PeriodDelta(libm::roundf(a.0 - b.0) as i32),
            (Period::Linear(a), Period::Linear(b)) => PeriodDelta(b.position() - a.position()),
            _ => PeriodDelta(0),
        }
    }

    /// Round a linear period to the nearest semitone (glissando).
    pub fn round_to_semitone(self) -> Period {
        match self {
            Period::Linear(p) => {
                let half = LINEAR_UNITS_PER_SEMITONE / 2;
                let semis = (p.position() + half) / LINEAR_UNITS_PER_SEMITONE;
                Period::Linear(LinearPeriod::from_position(semis * LINEAR_UNITS_PER_SEMITONE, p.c2spd))
            }
            amiga => amiga,
        }
    }
}

/// Which period representation a song plays with.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum PeriodSystem {
    #[default]
    Amiga,
    Linear,
}

impl PeriodSystem {
    pub fn from_linear_flag(linear: bool) -> Self {
        if linear {
            PeriodSystem::Linear
        } else {
            PeriodSystem::Amiga
        }
    }

    /// Period for `note` with finetune in 1/128 semitone. `None` for a
    /// silent sample rate.
    pub fn note_period(self, note: u8, finetune: i8, c2spd: u32) -> Option<Period> {
        if c2spd == 0 {
            return None;
        }
        let period = match self {
            PeriodSystem::Amiga => {
                let octave = (note / 12) as i32;
                let base = AMIGA_TABLE[(note % 12) as usize] as f32;
                let tuned = base * libm::exp2f((5 - octave) as f32 - finetune as f32 / (128.0 * 12.0));
                let p = tuned * DEFAULT_C2SPD as f32 / c2spd as f32;
                Period::Amiga(AmigaPeriod(p.clamp(AMIGA_PERIOD_MIN, AMIGA_PERIOD_MAX)))
            }
            PeriodSystem::Linear => Period::Linear(LinearPeriod::new(note, finetune as i32 / 2, c2spd)),
        };
        Some(period)
    }
}
