//! Pattern and command types for tracker sequences.

use alloc::vec::Vec;
use core::fmt;

/// A note value in a pattern command.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Note {
    /// No note in this row
    #[default]
    None,
    /// Note on with semitone number (0-119, where 60 = C-5 plays at the sample's c2spd)
    On(u8),
    /// Key release
    Off,
    /// Immediate note cut (IT `^^^`)
    Cut,
    /// Note fade (IT `~~~`)
    Fade,
}

const NOTE_NAMES: [&str; 12] = ["C-", "C#", "D-", "D#", "E-", "F-", "F#", "G-", "G#", "A-", "A#", "B-"];

impl Note {
    /// Create a note from octave (0-9) and semitone (0-11).
    pub const fn from_octave_semitone(octave: u8, semitone: u8) -> Self {
        Note::On(octave * 12 + semitone)
    }

    /// Get the octave (0-9) if this is a note on.
    pub const fn octave(self) -> Option<u8> {
        match self {
            Note::On(n) => Some(n / 12),
            _ => None,
        }
    }

    /// Get the semitone within the octave (0-11) if this is a note on.
    pub const fn semitone(self) -> Option<u8> {
        match self {
            Note::On(n) => Some(n % 12),
            _ => None,
        }
    }

    /// True when the row carries something in the note column.
    pub const fn is_present(self) -> bool {
        !matches!(self, Note::None)
    }
}

impl fmt::Display for Note {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Note::None => f.write_str("..."),
            Note::On(n) => write!(f, "{}{}", NOTE_NAMES[(*n % 12) as usize], n / 12),
            Note::Off => f.write_str("==="),
            Note::Cut => f.write_str("^^^"),
            Note::Fade => f.write_str("~~~"),
        }
    }
}

/// A raw effect-column entry.
///
/// `code` is format native: S3M and IT store letters as 1 = `A` .. 26 = `Z`,
/// XM and MOD store 0x0-0xF for the classic commands and 0x10+ for the
/// lettered extensions (`G` = 0x10 .. `X` = 0x21).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct EffectCommand {
    pub code: u8,
    pub param: u8,
}

impl EffectCommand {
    pub const fn new(code: u8, param: u8) -> Self {
        Self { code, param }
    }

    /// High nibble of the parameter.
    pub const fn hi(self) -> u8 {
        self.param >> 4
    }

    /// Low nibble of the parameter.
    pub const fn lo(self) -> u8 {
        self.param & 0x0F
    }
}

/// A single channel's command for one row.
///
/// Every column is optional; an absent column leaves the channel untouched.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Command {
    /// Note column
    pub note: Note,
    /// Instrument number (1-based, as stored in module files)
    pub instrument: Option<u8>,
    /// Raw volume-column byte (format native)
    pub volume: Option<u8>,
    /// Effect column
    pub effect: Option<EffectCommand>,
}

impl Command {
    /// Create an empty command.
    pub const fn empty() -> Self {
        Self { note: Note::None, instrument: None, volume: None, effect: None }
    }

    /// Returns true if no column is present.
    pub fn is_empty(&self) -> bool {
        !self.note.is_present()
            && self.instrument.is_none()
            && self.volume.is_none()
            && self.effect.is_none()
    }

    pub fn with_note(mut self, note: Note) -> Self {
        self.note = note;
        self
    }

    pub fn with_instrument(mut self, instrument: u8) -> Self {
        self.instrument = Some(instrument);
        self
    }

    pub fn with_volume(mut self, volume: u8) -> Self {
        self.volume = Some(volume);
        self
    }

    pub fn with_effect(mut self, code: u8, param: u8) -> Self {
        self.effect = Some(EffectCommand::new(code, param));
        self
    }
}

/// A pattern containing rows of commands across channels.
#[derive(Clone, Debug)]
pub struct Pattern {
    /// Number of rows (typically 64, can be 1-256)
    pub rows: u16,
    /// Number of channels
    pub channels: u8,
    /// Pattern data, stored row-major: data[row * channels + channel]
    pub data: Vec<Command>,
}

impl Pattern {
    /// Create a new pattern with empty commands.
    pub fn new(rows: u16, channels: u8) -> Self {
        Self {
            rows,
            channels,
            data: alloc::vec![Command::empty(); rows as usize * channels as usize],
        }
    }

    /// Get a reference to a command.
    pub fn cell(&self, row: u16, channel: u8) -> &Command {
        debug_assert!(row < self.rows);
        debug_assert!(channel < self.channels);
        &self.data[row as usize * self.channels as usize + channel as usize]
    }

    /// Get a mutable reference to a command.
    pub fn cell_mut(&mut self, row: u16, channel: u8) -> &mut Command {
        debug_assert!(row < self.rows);
        debug_assert!(channel < self.channels);
        &mut self.data[row as usize * self.channels as usize + channel as usize]
    }

    /// All commands in a row, or `None` past the end of the pattern.
    pub fn row(&self, row: u16) -> Option<&[Command]> {
        if row >= self.rows {
            return None;
        }
        let start = row as usize * self.channels as usize;
        self.data.get(start..start + self.channels as usize)
    }
}
