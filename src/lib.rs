//! trackplay - tick-accurate playback core for ST3, IT and FT2 modules.
//!
//! The song model lives in [`ir`] and the playback engine in [`engine`].
//! A host loads a [`Song`] with its own format reader, creates an
//! [`Engine`] with a [`VoiceFactory`], and pulls rows:
//!
//! ```no_run
//! use trackplay::{Engine, PlaybackConfig, Song, Voice, VoiceRequest};
//!
//! fn play(song: Song, make_voice: fn(&VoiceRequest) -> Option<Box<dyn Voice>>) {
//!     let config = PlaybackConfig::for_song(&song);
//!     let mut engine = Engine::new(song, config, Box::new(make_voice));
//!     while let Ok(Some(row)) = engine.render_row() {
//!         println!("{}", row.trace);
//!     }
//! }
//! ```

pub use tp_engine as engine;
pub use tp_ir as ir;

pub use tp_engine::{
    ChannelOutput, Engine, Period, Playback, PlaybackConfig, PlaybackEnd, PlaybackError, RowOutput, RowTrace,
    Voice, VoiceFactory, VoiceHandle, VoiceRequest,
};
pub use tp_ir::{Command, Format, Instrument, Note, OrderEntry, Pattern, Song};
