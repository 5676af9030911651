use std::time::Duration;

use tracing::debug;

use crate::config::{Mode, MIN_WINDOW_SECS};
use crate::error::{AudiosubError, Result};
use crate::subtitle::to_millis;

use super::{AudioWindow, DecodedAudio};

/// How decoded audio is split before recognition.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Segmentation {
    /// Contiguous windows of a fixed length.
    FixedWindow { window: Duration },
    /// The engine segments the audio itself.
    Native,
}

impl Segmentation {
    pub fn fixed(window_secs: f64) -> Result<Self> {
        if !window_secs.is_finite() || window_secs < MIN_WINDOW_SECS {
            return Err(AudiosubError::Config(format!(
                "Window length must be at least {MIN_WINDOW_SECS}s, got {window_secs}"
            )));
        }
        Ok(Segmentation::FixedWindow {
            window: Duration::from_secs_f64(window_secs),
        })
    }

    pub fn for_mode(mode: Mode, window_secs: f64) -> Result<Self> {
        match mode {
            Mode::Windowed => Self::fixed(window_secs),
            Mode::Native => Ok(Segmentation::Native),
        }
    }

    /// Windows to submit for recognition. Empty for the native strategy.
    pub fn segment(&self, audio: &DecodedAudio) -> Vec<AudioWindow> {
        match self {
            Segmentation::FixedWindow { window } => plan_windows(audio.duration(), *window),
            Segmentation::Native => Vec::new(),
        }
    }
}

/// Plan fixed-duration windows covering `[0, total_duration)`.
///
/// The last window is clipped to the remaining audio rather than padded. A
/// tail too short to reach the next millisecond joins the window before it.
pub fn plan_windows(total_duration: Duration, window: Duration) -> Vec<AudioWindow> {
    let mut windows = Vec::new();
    if window.is_zero() {
        return windows;
    }

    let mut current = Duration::ZERO;
    while current < total_duration {
        let mut end = (current + window).min(total_duration);
        if end < total_duration && to_millis(total_duration) <= to_millis(end) {
            end = total_duration;
        }
        windows.push(AudioWindow {
            index: windows.len(),
            start: current,
            end,
        });
        current = end;
    }

    debug!(
        "Planned {} windows of {:?} over {:?}",
        windows.len(),
        window,
        total_duration
    );

    windows
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plan_windows_clips_last() {
        let windows = plan_windows(Duration::from_secs(12), Duration::from_secs(5));

        assert_eq!(windows.len(), 3);
        assert_eq!(windows[0].start, Duration::ZERO);
        assert_eq!(windows[0].end, Duration::from_secs(5));
        assert_eq!(windows[1].start, Duration::from_secs(5));
        assert_eq!(windows[2].start, Duration::from_secs(10));
        assert_eq!(windows[2].end, Duration::from_secs(12));
        assert_eq!(windows[2].index, 2);
    }

    #[test]
    fn test_plan_windows_shorter_than_window() {
        let windows = plan_windows(Duration::from_millis(3200), Duration::from_secs(5));
        assert_eq!(windows.len(), 1);
        assert_eq!(windows[0].end, Duration::from_millis(3200));
    }

    #[test]
    fn test_plan_windows_exact_multiple() {
        let windows = plan_windows(Duration::from_secs(10), Duration::from_secs(5));
        assert_eq!(windows.len(), 2);
        assert_eq!(windows[1].end, Duration::from_secs(10));
    }

    #[test]
    fn test_plan_windows_zero_duration() {
        assert!(plan_windows(Duration::ZERO, Duration::from_secs(5)).is_empty());
    }

    #[test]
    fn test_windows_are_contiguous() {
        let windows = plan_windows(Duration::from_millis(47_300), Duration::from_secs(5));
        for pair in windows.windows(2) {
            assert_eq!(pair[0].end, pair[1].start);
            assert!(pair[0].start < pair[0].end);
        }
        assert_eq!(windows.last().unwrap().end, Duration::from_millis(47_300));
    }

    #[test]
    fn test_sub_millisecond_tail_joins_last_window() {
        let total = Duration::from_secs_f64(160_005.0 / 16_000.0);
        let windows = plan_windows(total, Duration::from_secs(5));
        assert_eq!(windows.len(), 2);
        assert_eq!(windows[1].end, total);

        for window in &windows {
            assert!(to_millis(window.start) < to_millis(window.end));
        }
    }

    #[test]
    fn test_millisecond_tail_keeps_own_window() {
        let windows = plan_windows(Duration::from_millis(10_001), Duration::from_secs(5));
        assert_eq!(windows.len(), 3);
        assert_eq!(windows[2].start, Duration::from_secs(10));
    }

    #[test]
    fn test_segmentation_rejects_bad_window() {
        assert!(Segmentation::fixed(0.001).is_err());
        assert!(Segmentation::fixed(0.0).is_err());
        assert!(Segmentation::fixed(-5.0).is_err());
        assert!(Segmentation::fixed(f64::INFINITY).is_err());
    }

    #[test]
    fn test_native_segmentation_yields_no_windows() {
        let audio = DecodedAudio::from_samples(vec![0.1; 16_000], 16_000);
        assert!(Segmentation::Native.segment(&audio).is_empty());
        assert_eq!(
            Segmentation::for_mode(Mode::Windowed, 5.0)
                .unwrap()
                .segment(&audio)
                .len(),
            1
        );
    }
}
