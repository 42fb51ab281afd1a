//! Instrument definitions.

use arrayvec::ArrayString;

use crate::envelope::Envelope;

/// An instrument definition as seen by the playback core.
///
/// Sample data is owned by the voice collaborator; the core only needs the
/// pitch reference, defaults and envelopes.
#[derive(Clone, Debug)]
pub struct Instrument {
    /// Instrument name
    pub name: ArrayString<26>,
    /// Default volume (0-64)
    pub default_volume: u8,
    /// Default panning (0-255, 128 = center); `None` keeps the channel pan
    pub default_pan: Option<u8>,
    /// Playback rate in Hz of note C-5
    pub c2spd: u32,
    /// Finetune in 1/128 semitone (XM), applied to linear periods
    pub finetune: i8,
    /// Semitones added to the played note (XM relative note)
    pub relative_note: i8,
    /// Fadeout amount subtracted per tick from a 0-65535 fade level (0 = no fade)
    pub fadeout: u16,
    /// What happens to a sounding note when a new note arrives on its channel
    pub new_note_action: NewNoteAction,
    /// Volume envelope (0-64)
    pub volume_envelope: Envelope<u8>,
    /// Panning envelope (-32 to +32)
    pub panning_envelope: Envelope<i8>,
    /// Pitch envelope in half-semitones (-32 to +32)
    pub pitch_envelope: Envelope<i8>,
}

impl Default for Instrument {
    fn default() -> Self {
        Self {
            name: ArrayString::new(),
            default_volume: 64,
            default_pan: None,
            c2spd: 8363,
            finetune: 0,
            relative_note: 0,
            fadeout: 0,
            new_note_action: NewNoteAction::Cut,
            volume_envelope: Envelope::default(),
            panning_envelope: Envelope::default(),
            pitch_envelope: Envelope::default(),
        }
    }
}

impl Instrument {
    /// Create a new instrument with default settings.
    pub fn new(name: &str) -> Self {
        let mut inst = Self::default();
        let _ = inst.name.try_push_str(name);
        inst
    }

    pub fn with_c2spd(mut self, c2spd: u32) -> Self {
        self.c2spd = c2spd;
        self
    }

    pub fn with_new_note_action(mut self, nna: NewNoteAction) -> Self {
        self.new_note_action = nna;
        self
    }
}

/// Action when a new note triggers on a channel already playing.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum NewNoteAction {
    /// Cut the previous note immediately
    #[default]
    Cut,
    /// Continue the previous note in the background
    Continue,
    /// Send key-off to the previous note
    Release,
    /// Fade out the previous note
    Fadeout,
}

impl NewNoteAction {
    /// Decode the IT encoding (0 = cut, 1 = continue, 2 = off, 3 = fade).
    pub const fn from_it(value: u8) -> Self {
        match value {
            1 => NewNoteAction::Continue,
            2 => NewNoteAction::Release,
            3 => NewNoteAction::Fadeout,
            _ => NewNoteAction::Cut,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_amiga_reference() {
        let inst = Instrument::new("bass");
        assert_eq!(inst.name.as_str(), "bass");
        assert_eq!(inst.c2spd, 8363);
        assert_eq!(inst.default_volume, 64);
        assert_eq!(inst.new_note_action, NewNoteAction::Cut);
        assert!(!inst.volume_envelope.enabled);
    }

    #[test]
    fn nna_from_it_encoding() {
        assert_eq!(NewNoteAction::from_it(0), NewNoteAction::Cut);
        assert_eq!(NewNoteAction::from_it(1), NewNoteAction::Continue);
        assert_eq!(NewNoteAction::from_it(2), NewNoteAction::Release);
        assert_eq!(NewNoteAction::from_it(3), NewNoteAction::Fadeout);
        assert_eq!(NewNoteAction::from_it(9), NewNoteAction::Cut);
    }
}
