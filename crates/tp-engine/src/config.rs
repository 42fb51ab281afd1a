//! Playback configuration.

use serde::{Deserialize, Serialize};
use tp_ir::Song;

/// Options that shape playback behavior.
///
/// Format quirks normally come from the song header via
/// [`PlaybackConfig::for_song`]; hosts may also load the whole struct from
/// any serde format.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackConfig {
    /// Treat unknown effect codes as no-ops instead of failing the row
    pub ignore_unknown_effect: bool,
    /// Wrap to the first order at the end of the song instead of stopping
    pub order_loop_enabled: bool,
    /// Maximum number of detached voices kept sounding
    pub past_voice_pool_max: usize,
    /// Use linear periods instead of Amiga periods
    pub linear_frequency_slides: bool,
    /// Legacy per-format effect timing
    pub old_effect_mode: bool,
    /// Porta up, porta down and tone portamento share one memory cell
    pub efg_link_mode: bool,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            ignore_unknown_effect: false,
            order_loop_enabled: false,
            past_voice_pool_max: 64,
            linear_frequency_slides: false,
            old_effect_mode: false,
            efg_link_mode: false,
        }
    }
}

impl PlaybackConfig {
    /// Default configuration with the format quirks taken from `song`.
    pub fn for_song(song: &Song) -> Self {
        Self {
            linear_frequency_slides: song.flags.linear_slides,
            old_effect_mode: song.flags.old_effects,
            efg_link_mode: song.flags.link_effect_memory,
            ..Self::default()
        }
    }

    pub fn with_order_loop(mut self, enabled: bool) -> Self {
        self.order_loop_enabled = enabled;
        self
    }

    pub fn with_ignore_unknown_effect(mut self, ignore: bool) -> Self {
        self.ignore_unknown_effect = ignore;
        self
    }

    pub fn with_past_voice_pool_max(mut self, max: usize) -> Self {
        self.past_voice_pool_max = max;
        self
    }
}
