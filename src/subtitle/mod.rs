pub mod convert;
pub mod srt;
pub mod time;

pub use convert::assemble;
pub use srt::{render_srt, write_srt};
pub use time::{format_duration, format_timestamp, parse_timestamp, to_millis};

use std::time::Duration;

/// One numbered, timed subtitle entry.
#[derive(Debug, Clone, PartialEq)]
pub struct SubtitleCue {
    /// 1-based and dense within its track.
    pub index: usize,
    pub start: Duration,
    pub end: Duration,
    pub text: String,
}

/// Ordered cues with dense indices and non-decreasing start times.
///
/// Only [`assemble`] builds non-empty tracks, so every track upholds those
/// invariants.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SubtitleTrack {
    cues: Vec<SubtitleCue>,
}

impl SubtitleTrack {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn cues(&self) -> &[SubtitleCue] {
        &self.cues
    }

    pub fn len(&self) -> usize {
        self.cues.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cues.is_empty()
    }
}
