//! Playback error types.

use heapless::String;

/// Fatal playback conditions.
///
/// Normal end of song is not an error; it is reported as
/// [`Transition::StopSong`](crate::sequencer::Transition::StopSong).
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum PlaybackError {
    /// Order-list sentinel resolution did not reach a playable pattern
    /// within one pass over the list.
    #[error("infinite loop detected while resolving order {order}")]
    InfiniteLoopDetected { order: usize },

    /// An order references a pattern that does not exist.
    #[error("order {order} references missing pattern {pattern}")]
    InvalidPatternIndex { order: usize, pattern: u8 },

    /// An effect code the format table does not know, with unknown
    /// effects configured as fatal.
    #[error("unhandled effect {mnemonic} on channel {channel}, row {row}")]
    UnhandledEffect { channel: usize, row: u16, mnemonic: String<4> },

    /// A row update was applied to a sequencer that can no longer accept one.
    #[error("invalid row transaction: {reason}")]
    InvalidTransaction { reason: &'static str },
}

pub type Result<T> = core::result::Result<T, PlaybackError>;
