//! LFO used by vibrato, tremolo and panbrello.

use rand::{Rng, SeedableRng};
use rand_pcg::Pcg32;
use tp_ir::Waveform;

/// Positions per waveform cycle.
pub const CYCLE: u8 = 64;

/// One cycle of the ST3 vibrato sine, amplitude 255.
const SINE_TABLE: [i16; 64] = [
    0x00, 0x18, 0x31, 0x4A, 0x61, 0x78, 0x8D, 0xA1,
    0xB4, 0xC5, 0xD4, 0xE0, 0xEB, 0xF4, 0xFA, 0xFD,
    0xFF, 0xFD, 0xFA, 0xF4, 0xEB, 0xE0, 0xD4, 0xC5,
    0xB4, 0xA1, 0x8D, 0x78, 0x61, 0x4A, 0x31, 0x18,
    0x00, -0x18, -0x31, -0x4A, -0x61, -0x78, -0x8D, -0xA1,
    -0xB4, -0xC5, -0xD4, -0xE0, -0xEB, -0xF4, -0xFA, -0xFD,
    -0xFF, -0xFD, -0xFA, -0xF4, -0xEB, -0xE0, -0xD4, -0xC5,
    -0xB4, -0xA1, -0x8D, -0x78, -0x61, -0x4A, -0x31, -0x18,
];

const RANDOM_SEED: u64 = 0x7261_6e64;

/// Periodic waveform generator with a 64-step cycle.
#[derive(Clone, Debug)]
pub struct Oscillator {
    waveform: Waveform,
    /// Position within the cycle (0-63)
    position: u8,
    /// Restart the cycle on every new note
    retrigger: bool,
    /// Last sampled value for the random waveform
    random_value: i16,
    rng: Pcg32,
}

impl Default for Oscillator {
    fn default() -> Self {
        Self::new(Waveform::Sine)
    }
}

impl Oscillator {
    pub fn new(waveform: Waveform) -> Self {
        Self {
            waveform,
            position: 0,
            retrigger: true,
            random_value: 0,
            rng: Pcg32::seed_from_u64(RANDOM_SEED),
        }
    }

    pub fn waveform(&self) -> Waveform {
        self.waveform
    }

    pub fn position(&self) -> u8 {
        self.position
    }

    /// Apply a tracker waveform selector: bits 0-1 pick the shape,
    /// bit 2 keeps the phase across new notes.
    pub fn set_waveform_bits(&mut self, bits: u8) {
        self.waveform = Waveform::from_bits(bits);
        self.retrigger = bits & 0x04 == 0;
    }

    /// Current output in -255..=255.
    pub fn value(&self) -> i16 {
        let pos = (self.position % CYCLE) as i16;
        match self.waveform {
            Waveform::Sine => SINE_TABLE[pos as usize],
            Waveform::RampDown => 255 - pos * 8,
            Waveform::Square => {
                if pos < 32 {
                    255
                } else {
                    -255
                }
            }
            Waveform::Random => self.random_value,
        }
    }

    /// Step the cycle by `speed` positions.
    pub fn advance(&mut self, speed: u8) {
        self.position = self.position.wrapping_add(speed) % CYCLE;
        if self.waveform == Waveform::Random {
            self.random_value = self.rng.random_range(-255..=255);
        }
    }

    /// New note: restart the cycle unless the waveform keeps its phase.
    pub fn note_on(&mut self) {
        if self.retrigger {
            self.position = 0;
        }
    }
}
