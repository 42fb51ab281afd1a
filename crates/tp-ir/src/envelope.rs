//! Multi-segment envelope definitions.
//!
//! An `Envelope<T>` is an ordered list of points, each holding a value and
//! the number of ticks it takes to reach the next point. The value type is
//! generic so volume (`u8`), panning (`i8`) and pitch (`i8`) envelopes share
//! one definition; interpolation is supplied by the evaluator.

use arrayvec::ArrayVec;

/// Maximum points per envelope (IT allows 25, XM 12).
pub const MAX_ENVELOPE_POINTS: usize = 25;

/// A point in an envelope.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EnvPoint<T> {
    /// Ticks from this point to the next one.
    pub length: u16,
    /// Value at this point.
    pub value: T,
}

impl<T> EnvPoint<T> {
    pub const fn new(length: u16, value: T) -> Self {
        Self { length, value }
    }
}

/// Point-index range used by loops and sustain loops.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LoopRange {
    /// Point index to loop back to.
    pub begin: u8,
    /// Point index that triggers the loop.
    pub end: u8,
}

impl LoopRange {
    pub const fn new(begin: u8, end: u8) -> Self {
        Self { begin, end }
    }
}

/// An immutable envelope definition.
#[derive(Clone, Debug, PartialEq)]
pub struct Envelope<T> {
    /// Is the envelope enabled?
    pub enabled: bool,
    /// Envelope points
    pub points: ArrayVec<EnvPoint<T>, MAX_ENVELOPE_POINTS>,
    /// Regular loop, active regardless of key state
    pub loop_range: Option<LoopRange>,
    /// Sustain loop, active only while the key is held
    pub sustain_range: Option<LoopRange>,
}

impl<T> Default for Envelope<T> {
    fn default() -> Self {
        Self { enabled: false, points: ArrayVec::new(), loop_range: None, sustain_range: None }
    }
}

impl<T: Copy> Envelope<T> {
    /// Create an enabled envelope from a slice of points. Extra points past
    /// `MAX_ENVELOPE_POINTS` are dropped.
    pub fn from_points(pts: &[EnvPoint<T>]) -> Self {
        let mut points = ArrayVec::new();
        for p in pts.iter().take(MAX_ENVELOPE_POINTS) {
            points.push(*p);
        }
        Self { enabled: true, points, loop_range: None, sustain_range: None }
    }

    pub fn with_loop(mut self, begin: u8, end: u8) -> Self {
        self.loop_range = Some(LoopRange::new(begin, end));
        self
    }

    pub fn with_sustain(mut self, begin: u8, end: u8) -> Self {
        self.sustain_range = Some(LoopRange::new(begin, end));
        self
    }

    /// Number of points.
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Whether the envelope has no points.
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Value of the last point, if any.
    pub fn last_value(&self) -> Option<T> {
        self.points.last().map(|p| p.value)
    }
}
