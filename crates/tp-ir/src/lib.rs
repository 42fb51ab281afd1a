//! Core song model for the trackplay tracker core.
//!
//! This crate defines the immutable song representation that an external
//! loader produces and the playback engine consumes: order list, patterns,
//! per-channel settings, instruments and envelope definitions.
//!
//! Designed to be `no_std` compatible with the `alloc` crate.

#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

mod envelope;
mod instrument;
mod pattern;
pub mod song;

pub use envelope::{EnvPoint, Envelope, LoopRange, MAX_ENVELOPE_POINTS};
pub use instrument::{Instrument, NewNoteAction};
pub use pattern::{Command, EffectCommand, Note, Pattern};
pub use song::{ChannelSettings, Format, Header, MemoryDefaults, OrderEntry, Song, SongFlags, Waveform};
