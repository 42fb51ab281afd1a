//! Playback engine for the trackplay tracker core.
//!
//! Turns a [`tp_ir::Song`] into tick-accurate instructions for sample
//! voices: which note to start, at what period, volume and pan, on which
//! tick. Mixing is left to the host, which supplies voices through a
//! [`VoiceFactory`].

mod channel;
pub mod command;
mod config;
pub mod effect;
mod engine;
pub mod envelope_state;
mod error;
pub mod memory;
pub mod oscillator;
mod past_voices;
pub mod period;
pub mod sequencer;
mod trace;
mod voice;

pub use channel::{ChannelOutput, ChannelPhase, ChannelState, EnvelopeKind, RenderState};
pub use command::CommandTable;
pub use config::PlaybackConfig;
pub use effect::{CombinedEffect, Effect};
pub use engine::Engine;
pub use envelope_state::EnvelopeState;
pub use error::{PlaybackError, Result};
pub use past_voices::{PastNoteAction, PastVoice, PastVoicePool};
pub use period::{Period, PeriodDelta, PeriodSystem};
pub use sequencer::{JumpKind, RowUpdate, SequencerState, Transition};
pub use trace::{ChannelTrace, Playback, PlaybackEnd, RowOutput, RowTrace, TickOutput};
pub use voice::{Voice, VoiceFactory, VoiceHandle, VoiceRequest};
