//! Per-channel effect memory.
//!
//! Tracker effects reuse their last nonzero parameter when a row sends 0.
//! Each effect family owns a cell; which families share a cell is a
//! per-format table (`MemoryLayout`), so quirks like ST3's single shared
//! parameter or IT's linked E/F/G memory are data rather than code.

use tp_ir::{Format, MemoryDefaults};

use crate::oscillator::Oscillator;
use crate::period::Period;

/// Effect families with persisted parameters.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum MemoryFamily {
    VolumeSlide,
    PortaDown,
    PortaUp,
    TonePorta,
    Vibrato,
    FineVibrato,
    Tremor,
    Arpeggio,
    ChannelVolumeSlide,
    SampleOffset,
    PanningSlide,
    Retrigger,
    Tremolo,
    TempoSlide,
    GlobalVolumeSlide,
    Panbrello,
    FinePortaUp,
    FinePortaDown,
    ExtraFinePortaUp,
    ExtraFinePortaDown,
    FineVolumeSlideUp,
    FineVolumeSlideDown,
    VolumeColumnSlide,
}

/// Number of memory families (and cells).
pub const FAMILY_COUNT: usize = MemoryFamily::VolumeColumnSlide as usize + 1;

/// Handle to one memory cell, resolved at decode time.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct CellId(u8);

impl CellId {
    pub const fn of(family: MemoryFamily) -> Self {
        CellId(family as u8)
    }

    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

/// Families sharing ST3's single "last parameter" cell.
const S3M_SHARED: [MemoryFamily; 7] = [
    MemoryFamily::VolumeSlide,
    MemoryFamily::PortaDown,
    MemoryFamily::PortaUp,
    MemoryFamily::Tremor,
    MemoryFamily::Arpeggio,
    MemoryFamily::Retrigger,
    MemoryFamily::Tremolo,
];

/// Declarative family → cell mapping for one format.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MemoryLayout {
    cells: [Option<CellId>; FAMILY_COUNT],
}

impl MemoryLayout {
    /// Every family in its own cell.
    pub fn separate() -> Self {
        let mut cells = [None; FAMILY_COUNT];
        for (i, cell) in cells.iter_mut().enumerate() {
            *cell = Some(CellId(i as u8));
        }
        Self { cells }
    }

    /// Layout for a song format, with optional E/F/G linking.
    pub fn for_format(format: Format, efg_link: bool) -> Self {
        let mut layout = Self::separate();
        match format {
            Format::S3m => {
                for family in S3M_SHARED {
                    layout.share(family, MemoryFamily::VolumeSlide);
                }
            }
            Format::It => {
                layout.share(MemoryFamily::PortaUp, MemoryFamily::PortaDown);
                layout.share(MemoryFamily::FineVibrato, MemoryFamily::Vibrato);
            }
            Format::Xm | Format::Mod => {
                layout.cells[MemoryFamily::VolumeColumnSlide as usize] = None;
            }
        }
        if efg_link {
            let porta = layout.cell(MemoryFamily::PortaDown);
            layout.cells[MemoryFamily::PortaUp as usize] = porta;
            layout.cells[MemoryFamily::TonePorta as usize] = porta;
        }
        layout
    }

    fn share(&mut self, family: MemoryFamily, with: MemoryFamily) {
        self.cells[family as usize] = self.cells[with as usize];
    }

    /// Cell for a family; `None` means the family has no memory.
    pub fn cell(&self, family: MemoryFamily) -> Option<CellId> {
        self.cells[family as usize]
    }
}

/// `if input != 0 { cell = input }; cell`
pub fn coalesce(cell: &mut u8, input: u8) -> u8 {
    if input != 0 {
        *cell = input;
    }
    *cell
}

/// Coalesce the high and low nibbles independently.
pub fn coalesce_nibbles(cell: &mut u8, input: u8) -> u8 {
    let mut hi = *cell & 0xF0;
    let mut lo = *cell & 0x0F;
    if input & 0xF0 != 0 {
        hi = input & 0xF0;
    }
    if input & 0x0F != 0 {
        lo = input & 0x0F;
    }
    *cell = hi | lo;
    *cell
}

/// Tremor on/off phase counter.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TremorState {
    /// Currently in the muted part of the cycle
    pub muted: bool,
    /// Ticks left in the current phase
    pub ticks_left: u8,
}

/// Persisted per-channel effect state.
#[derive(Clone, Debug)]
pub struct Memory {
    cells: [u8; FAMILY_COUNT],
    pub vibrato: Oscillator,
    pub tremolo: Oscillator,
    pub panbrello: Oscillator,
    pub tremor: TremorState,
    /// Row set by the last pattern-loop-start command
    pub pattern_loop_start: u16,
    /// IT high sample offset (`SAx`)
    pub high_offset: u8,
    /// Tone portamento snaps to semitones
    pub glissando: bool,
    /// Tone portamento destination
    pub porta_target: Option<Period>,
}

impl Memory {
    pub fn new(defaults: &MemoryDefaults) -> Self {
        Self {
            cells: [0; FAMILY_COUNT],
            vibrato: Oscillator::new(defaults.vibrato_waveform),
            tremolo: Oscillator::new(defaults.tremolo_waveform),
            panbrello: Oscillator::new(defaults.panbrello_waveform),
            tremor: TremorState::default(),
            pattern_loop_start: 0,
            high_offset: 0,
            glissando: false,
            porta_target: None,
        }
    }

    /// Byte coalesce; families without a cell pass the input through.
    pub fn coalesce(&mut self, cell: Option<CellId>, input: u8) -> u8 {
        match cell {
            Some(id) => coalesce(&mut self.cells[id.index()], input),
            None => input,
        }
    }

    /// Nibble-wise coalesce for speed/depth style parameters.
    pub fn coalesce_nibbles(&mut self, cell: Option<CellId>, input: u8) -> u8 {
        match cell {
            Some(id) => coalesce_nibbles(&mut self.cells[id.index()], input),
            None => input,
        }
    }

    /// Current value of a cell (0 for families without memory).
    pub fn get(&self, cell: Option<CellId>) -> u8 {
        cell.map_or(0, |id| self.cells[id.index()])
    }
}

impl Default for Memory {
    fn default() -> Self {
        Self::new(&MemoryDefaults::default())
    }
}
