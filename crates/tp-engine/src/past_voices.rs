//! PastVoicePool: voices detached from their channel by a new note.
//!
//! A retriggered channel hands its outgoing voice here instead of cutting
//! it (IT new-note actions). The pool is bounded; the oldest voice is
//! evicted once it is over capacity. A mixer may render the pool from
//! another thread, so every mutation goes through one lock and rendering
//! works from a snapshot.

use std::collections::VecDeque;

use parking_lot::Mutex;
use slotmap::{new_key_type, SlotMap};

use crate::voice::VoiceHandle;

new_key_type! {
    /// Identifier for a voice slot in the pool.
    pub struct PastVoiceKey;
}

/// A detached voice and the channel it came from.
#[derive(Clone, Debug)]
pub struct PastVoice {
    pub channel: usize,
    pub voice: VoiceHandle,
}

/// Action applied to a channel's past voices (`S70`-`S72`), also used as
/// the detach action for new-note actions.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PastNoteAction {
    Cut,
    Continue,
    Release,
    Fadeout,
}

#[derive(Default)]
struct PoolInner {
    voices: SlotMap<PastVoiceKey, PastVoice>,
    /// Insertion order, oldest first
    order: VecDeque<PastVoiceKey>,
}

impl PoolInner {
    fn remove(&mut self, key: PastVoiceKey) -> Option<PastVoice> {
        self.order.retain(|k| *k != key);
        self.voices.remove(key)
    }
}

/// Bounded FIFO of detached voices.
pub struct PastVoicePool {
    inner: Mutex<PoolInner>,
    max: usize,
}

impl PastVoicePool {
    pub fn new(max: usize) -> Self {
        Self { inner: Mutex::new(PoolInner::default()), max }
    }

    pub fn max(&self) -> usize {
        self.max
    }

    pub fn len(&self) -> usize {
        self.inner.lock().voices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Add a voice, evicting the oldest entries while over capacity.
    /// Returns the evicted voices.
    pub fn add(&self, channel: usize, voice: VoiceHandle) -> Vec<PastVoice> {
        let mut inner = self.inner.lock();
        let key = inner.voices.insert(PastVoice { channel, voice });
        inner.order.push_back(key);

        let mut evicted = Vec::new();
        while inner.voices.len() > self.max {
            let Some(oldest) = inner.order.pop_front() else { break };
            if let Some(v) = inner.voices.remove(oldest) {
                log::debug!("past voice pool full, evicting voice from channel {}", v.channel);
                evicted.push(v);
            }
        }
        evicted
    }

    /// Apply `action` to every still-sounding past voice of `channel`.
    /// Returns how many voices were affected.
    pub fn apply(&self, channel: usize, action: PastNoteAction) -> usize {
        let mut inner = self.inner.lock();
        let targets: Vec<PastVoiceKey> = inner
            .voices
            .iter()
            .filter(|(_, v)| v.channel == channel && !v.voice.is_done())
            .map(|(k, _)| k)
            .collect();

        match action {
            PastNoteAction::Continue => {}
            PastNoteAction::Cut => {
                for key in &targets {
                    inner.remove(*key);
                }
            }
            PastNoteAction::Release => {
                for key in &targets {
                    if let Some(v) = inner.voices.get(*key) {
                        v.voice.lock().release();
                    }
                }
            }
            PastNoteAction::Fadeout => {
                for key in &targets {
                    if let Some(v) = inner.voices.get(*key) {
                        v.voice.lock().fadeout();
                    }
                }
            }
        }
        targets.len()
    }

    /// Drop voices that have finished. Returns how many were removed.
    pub fn prune(&self) -> usize {
        let mut inner = self.inner.lock();
        let finished: Vec<PastVoiceKey> = inner
            .voices
            .iter()
            .filter(|(_, v)| v.voice.is_done())
            .map(|(k, _)| k)
            .collect();
        for key in &finished {
            inner.remove(*key);
        }
        finished.len()
    }

    /// Copy of the current entries, oldest first, for rendering without
    /// holding the pool lock.
    pub fn snapshot(&self) -> Vec<PastVoice> {
        let inner = self.inner.lock();
        inner.order.iter().filter_map(|k| inner.voices.get(*k).cloned()).collect()
    }
}
