use std::time::Duration;

use tracing::debug;

use super::DecodedAudio;

/// How much audio at the start of a run is treated as ambient noise.
const CALIBRATION_SPAN: Duration = Duration::from_secs(1);

/// Multiplier applied to the ambient level to get the speech threshold.
const THRESHOLD_RATIO: f32 = 1.5;

const MIN_THRESHOLD: f32 = 0.003;
const MAX_THRESHOLD: f32 = 0.02;

/// Ambient noise level measured once per conversion.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NoiseProfile {
    pub ambient_rms: f32,
    /// RMS energy below which a window is considered silent.
    pub energy_threshold: f32,
}

impl NoiseProfile {
    pub fn is_silent(&self, samples: &[f32]) -> bool {
        calculate_rms(samples) < self.energy_threshold
    }
}

/// Calculate RMS (Root Mean Square) energy of a sample window.
pub fn calculate_rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }

    let sum_squares: f64 = samples.iter().map(|&s| (s as f64) * (s as f64)).sum();

    (sum_squares / samples.len() as f64).sqrt() as f32
}

/// Measure the ambient level from the opening second of audio.
pub fn calibrate(audio: &DecodedAudio) -> NoiseProfile {
    let span = audio.duration().min(CALIBRATION_SPAN);
    let ambient_rms = calculate_rms(audio.slice(Duration::ZERO, span));
    let energy_threshold = (ambient_rms * THRESHOLD_RATIO).clamp(MIN_THRESHOLD, MAX_THRESHOLD);

    debug!(
        ambient_rms,
        energy_threshold, "Calibrated ambient noise level"
    );

    NoiseProfile {
        ambient_rms,
        energy_threshold,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::TARGET_SAMPLE_RATE;

    #[test]
    fn test_calculate_rms() {
        assert_eq!(calculate_rms(&[]), 0.0);
        assert_eq!(calculate_rms(&[0.0; 100]), 0.0);
        assert!((calculate_rms(&[0.5, -0.5, 0.5, -0.5]) - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_silence_uses_floor_threshold() {
        let audio = DecodedAudio::from_samples(vec![0.0; 32_000], TARGET_SAMPLE_RATE);
        let profile = calibrate(&audio);
        assert_eq!(profile.ambient_rms, 0.0);
        assert_eq!(profile.energy_threshold, MIN_THRESHOLD);
        assert!(profile.is_silent(&[0.0; 10]));
        assert!(!profile.is_silent(&[0.3, -0.3]));
    }

    #[test]
    fn test_loud_opening_is_capped() {
        let audio = DecodedAudio::from_samples(vec![0.4; 16_000], TARGET_SAMPLE_RATE);
        let profile = calibrate(&audio);
        assert_eq!(profile.energy_threshold, MAX_THRESHOLD);
        assert!(!profile.is_silent(audio.samples()));
    }

    #[test]
    fn test_empty_audio() {
        let audio = DecodedAudio::from_samples(Vec::new(), TARGET_SAMPLE_RATE);
        let profile = calibrate(&audio);
        assert_eq!(profile.energy_threshold, MIN_THRESHOLD);
    }
}
