//! Voice: the sample-playing collaborator driven by the engine.
//!
//! The engine never touches PCM data. It tells a voice what pitch, volume
//! and pan to use for each tick and how long the tick lasts; the host's
//! mixer does the rest.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Mutex, MutexGuard};

use crate::period::Period;

/// A sounding note owned by the host's mixer.
pub trait Voice: Send {
    /// Start (or restart) the note.
    fn attack(&mut self);
    /// Key released; the instrument's release stage begins.
    fn release(&mut self);
    /// Begin fading out.
    fn fadeout(&mut self);
    /// Finished producing sound and may be dropped.
    fn is_done(&self) -> bool;
    fn set_period(&mut self, period: Period);
    /// Final mixing volume, 0.0-1.0.
    fn set_volume(&mut self, volume: f32);
    /// Pan, 0-255 with 128 center.
    fn set_pan(&mut self, pan: u8);
    /// Sample position in frames.
    fn set_pos(&mut self, pos: u32);
    /// Render `tick` worth of audio.
    fn advance(&mut self, tick: Duration);
}

/// What the engine knows about a note when it asks for a voice.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct VoiceRequest {
    pub channel: usize,
    /// Output (mixer) channel
    pub output: u8,
    /// 1-based instrument number
    pub instrument: u8,
    pub note: u8,
    pub period: Period,
    pub sample_pos: u32,
}

/// Creates voices for triggered notes.
pub trait VoiceFactory {
    /// `None` when the host cannot play the request (missing sample, no
    /// free slots); the note is then silent.
    fn create_voice(&mut self, request: &VoiceRequest) -> Option<Box<dyn Voice>>;
}

impl<F> VoiceFactory for F
where
    F: FnMut(&VoiceRequest) -> Option<Box<dyn Voice>>,
{
    fn create_voice(&mut self, request: &VoiceRequest) -> Option<Box<dyn Voice>> {
        self(request)
    }
}

/// Shared handle to a voice. Cloned into channel outputs and the past-voice
/// pool; the mixer may hold one too.
#[derive(Clone)]
pub struct VoiceHandle(Arc<Mutex<Box<dyn Voice>>>);

impl VoiceHandle {
    pub fn new(voice: Box<dyn Voice>) -> Self {
        Self(Arc::new(Mutex::new(voice)))
    }

    pub fn lock(&self) -> MutexGuard<'_, Box<dyn Voice>> {
        self.0.lock()
    }

    /// Both handles refer to the same voice.
    pub fn ptr_eq(&self, other: &VoiceHandle) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    pub fn is_done(&self) -> bool {
        self.0.lock().is_done()
    }
}

impl fmt::Debug for VoiceHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("VoiceHandle").field(&Arc::as_ptr(&self.0)).finish()
    }
}
