//! Song structure and sequencing types.

use alloc::vec::Vec;
use arrayvec::ArrayString;

use crate::instrument::Instrument;
use crate::pattern::Pattern;

/// Source format of a song. Selects the effect command table and memory
/// layout used during playback.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Format {
    /// ProTracker-style modules, played with the XM command table
    Mod,
    /// Scream Tracker 3
    #[default]
    S3m,
    /// FastTracker 2
    Xm,
    /// Impulse Tracker
    It,
}

/// Format quirk flags carried by the song header.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SongFlags {
    /// Linear frequency slides instead of Amiga periods
    pub linear_slides: bool,
    /// Legacy effect timing (ST3 fast volume slides, IT old effects)
    pub old_effects: bool,
    /// Porta up, porta down and tone portamento share one memory cell
    pub link_effect_memory: bool,
}

/// Song-wide starting values.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Header {
    /// Initial speed (ticks per row, 1-255)
    pub initial_speed: u8,
    /// Initial tempo in BPM (32-255)
    pub initial_tempo: u8,
    /// Initial global volume (0-128)
    pub global_volume: u8,
    /// Mixing volume passed through to the mixer (0-128)
    pub mixing_volume: u8,
}

impl Default for Header {
    fn default() -> Self {
        Self { initial_speed: 6, initial_tempo: 125, global_volume: 128, mixing_volume: 48 }
    }
}

/// An entry in the order list.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OrderEntry {
    /// Play pattern with this index
    Pattern(u8),
    /// Skip marker (`+++`), continue with the next order
    NextPattern,
    /// End of song marker (`---`)
    InvalidPattern,
}

/// LFO waveform selectable for vibrato, tremolo and panbrello.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Waveform {
    #[default]
    Sine,
    RampDown,
    Square,
    Random,
}

impl Waveform {
    /// Decode the low two bits of a tracker waveform selector.
    pub const fn from_bits(bits: u8) -> Self {
        match bits & 0x03 {
            0 => Waveform::Sine,
            1 => Waveform::RampDown,
            2 => Waveform::Square,
            _ => Waveform::Random,
        }
    }
}

/// Starting effect memory for a channel.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MemoryDefaults {
    pub vibrato_waveform: Waveform,
    pub tremolo_waveform: Waveform,
    pub panbrello_waveform: Waveform,
}

/// Per-channel settings.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ChannelSettings {
    /// Disabled channels are skipped entirely
    pub enabled: bool,
    /// Output (mixer) channel this channel renders into
    pub output: u8,
    /// Initial volume (0-64)
    pub initial_volume: u8,
    /// Initial channel volume (0-64, IT `M` command scale)
    pub initial_channel_volume: u8,
    /// Initial panning (0-255, 128 = center)
    pub initial_pan: u8,
    /// Initial effect memory
    pub memory: MemoryDefaults,
}

impl Default for ChannelSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            output: 0,
            initial_volume: 64,
            initial_channel_volume: 64,
            initial_pan: 128,
            memory: MemoryDefaults::default(),
        }
    }
}

/// A complete, decoded song.
#[derive(Clone, Debug, Default)]
pub struct Song {
    /// Song title
    pub title: ArrayString<32>,
    /// Source format
    pub format: Format,
    /// Format quirk flags
    pub flags: SongFlags,
    /// Starting speed, tempo and volumes
    pub header: Header,
    /// Play sequence
    pub orders: Vec<OrderEntry>,
    /// Patterns referenced by the order list
    pub patterns: Vec<Pattern>,
    /// Per-channel settings
    pub channels: Vec<ChannelSettings>,
    /// Instruments, addressed 1-based by commands
    pub instruments: Vec<Instrument>,
}

impl Song {
    /// Create a new empty song.
    pub fn new(title: &str, format: Format) -> Self {
        let mut song = Self { format, ..Self::default() };
        let _ = song.title.try_push_str(title);
        song
    }

    /// Create a song with a given number of channels.
    ///
    /// Channels get classic Amiga panning: L R R L.
    pub fn with_channels(title: &str, format: Format, num_channels: u8) -> Self {
        let mut song = Self::new(title, format);
        for i in 0..num_channels {
            song.channels.push(ChannelSettings {
                output: i,
                initial_pan: if i % 4 == 0 || i % 4 == 3 { 0x40 } else { 0xC0 },
                ..ChannelSettings::default()
            });
        }
        song
    }

    /// Append a pattern, returning its index.
    pub fn add_pattern(&mut self, pattern: Pattern) -> u8 {
        self.patterns.push(pattern);
        (self.patterns.len() - 1) as u8
    }

    pub fn add_order(&mut self, entry: OrderEntry) {
        self.orders.push(entry);
    }

    /// Append an instrument, returning its 1-based number.
    pub fn add_instrument(&mut self, instrument: Instrument) -> u8 {
        self.instruments.push(instrument);
        self.instruments.len() as u8
    }

    /// Look up an instrument by its 1-based number.
    pub fn instrument(&self, number: u8) -> Option<&Instrument> {
        (number as usize).checked_sub(1).and_then(|i| self.instruments.get(i))
    }

    /// Number of channels.
    pub fn num_channels(&self) -> usize {
        self.channels.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn with_channels_uses_amiga_panning() {
        let song = Song::with_channels("t", Format::Mod, 4);
        let pans: Vec<u8> = song.channels.iter().map(|c| c.initial_pan).collect();
        assert_eq!(pans, [0x40, 0xC0, 0xC0, 0x40]);
        assert_eq!(song.channels[2].output, 2);
    }

    #[test]
    fn instruments_are_one_based() {
        let mut song = Song::new("t", Format::It);
        let n = song.add_instrument(Instrument::new("lead"));
        assert_eq!(n, 1);
        assert_eq!(song.instrument(1).map(|i| i.name.as_str()), Some("lead"));
        assert!(song.instrument(0).is_none());
        assert!(song.instrument(2).is_none());
    }

    #[test]
    fn header_defaults() {
        let h = Header::default();
        assert_eq!(h.initial_speed, 6);
        assert_eq!(h.initial_tempo, 125);
    }

    #[test]
    fn waveform_bits() {
        assert_eq!(Waveform::from_bits(0), Waveform::Sine);
        assert_eq!(Waveform::from_bits(2), Waveform::Square);
        assert_eq!(Waveform::from_bits(7), Waveform::Random);
    }
}
