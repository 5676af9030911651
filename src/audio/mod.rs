pub mod calibrate;
pub mod chunk;
pub mod decode;
pub mod extract;

pub use calibrate::{calculate_rms, calibrate, NoiseProfile};
pub use chunk::{plan_windows, Segmentation};
pub use decode::decode_native;
pub use extract::{check_ffmpeg, decode_with_ffmpeg};

use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::{debug, info};

use crate::config::DecoderKind;
use crate::error::{AudiosubError, Result};

/// Sample rate of the canonical PCM every source is normalized to.
pub const TARGET_SAMPLE_RATE: u32 = 16_000;

/// Audio containers accepted as input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioFormat {
    Wav,
    Mp3,
    M4a,
    Caf,
    Flac,
    Ogg,
    Aac,
}

impl AudioFormat {
    /// Resolve a format from a file extension (without the dot, any case).
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "wav" | "wave" => Some(AudioFormat::Wav),
            "mp3" => Some(AudioFormat::Mp3),
            "m4a" => Some(AudioFormat::M4a),
            "caf" => Some(AudioFormat::Caf),
            "flac" => Some(AudioFormat::Flac),
            "ogg" | "oga" => Some(AudioFormat::Ogg),
            "aac" => Some(AudioFormat::Aac),
            _ => None,
        }
    }

    /// Resolve a format from a file name or path.
    pub fn from_path(path: &Path) -> Result<Self> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .ok_or_else(|| {
                AudiosubError::UnsupportedFormat(format!(
                    "{} has no file extension",
                    path.display()
                ))
            })?;

        Self::from_extension(ext).ok_or_else(|| {
            AudiosubError::UnsupportedFormat(format!(
                "'.{}' is not a recognized audio type ({})",
                ext,
                path.display()
            ))
        })
    }

    pub fn extension(&self) -> &'static str {
        match self {
            AudioFormat::Wav => "wav",
            AudioFormat::Mp3 => "mp3",
            AudioFormat::M4a => "m4a",
            AudioFormat::Caf => "caf",
            AudioFormat::Flac => "flac",
            AudioFormat::Ogg => "ogg",
            AudioFormat::Aac => "aac",
        }
    }
}

impl std::fmt::Display for AudioFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.extension())
    }
}

/// Where the encoded audio lives.
#[derive(Debug, Clone)]
pub enum AudioOrigin {
    File(PathBuf),
    Memory(Vec<u8>),
}

/// An encoded input audio file with its resolved container format.
#[derive(Debug, Clone)]
pub struct AudioSource {
    pub origin: AudioOrigin,
    pub format: AudioFormat,
    /// Name used in logs and for the default output path.
    pub name: String,
}

impl AudioSource {
    /// Open a file on disk. The format comes from the declared file name when
    /// given, otherwise from the path itself.
    pub fn from_path(path: &Path, declared_name: Option<&str>) -> Result<Self> {
        if !path.exists() {
            return Err(AudiosubError::FileNotFound(path.display().to_string()));
        }

        let name = declared_name
            .map(str::to_string)
            .unwrap_or_else(|| path.display().to_string());
        let format = AudioFormat::from_path(Path::new(&name))?;

        Ok(Self {
            origin: AudioOrigin::File(path.to_path_buf()),
            format,
            name,
        })
    }

    /// Wrap an uploaded byte buffer and its declared file name.
    pub fn from_bytes(data: Vec<u8>, declared_name: &str) -> Result<Self> {
        let format = AudioFormat::from_path(Path::new(declared_name))?;
        Ok(Self {
            origin: AudioOrigin::Memory(data),
            format,
            name: declared_name.to_string(),
        })
    }
}

/// Canonical PCM: mono `f32` samples at [`TARGET_SAMPLE_RATE`].
#[derive(Debug, Clone)]
pub struct DecodedAudio {
    samples: Vec<f32>,
    sample_rate: u32,
    duration: Duration,
}

impl DecodedAudio {
    /// Build from already-normalized samples. The duration is fixed here.
    pub fn new(samples: Vec<f32>, sample_rate: u32, duration: Duration) -> Self {
        Self {
            samples,
            sample_rate,
            duration,
        }
    }

    /// Build from samples alone, deriving the duration from their count.
    pub fn from_samples(samples: Vec<f32>, sample_rate: u32) -> Self {
        let duration = if sample_rate == 0 {
            Duration::ZERO
        } else {
            Duration::from_secs_f64(samples.len() as f64 / sample_rate as f64)
        };
        Self::new(samples, sample_rate, duration)
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }

    /// Samples covering `[start, end)`, clamped to what was decoded.
    pub fn slice(&self, start: Duration, end: Duration) -> &[f32] {
        let to_index = |d: Duration| {
            ((d.as_secs_f64() * self.sample_rate as f64).round() as usize).min(self.samples.len())
        };
        let from = to_index(start);
        let to = to_index(end).max(from);
        &self.samples[from..to]
    }
}

/// A fixed time slice of audio submitted as one recognition unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioWindow {
    pub index: usize,
    pub start: Duration,
    pub end: Duration,
}

impl AudioWindow {
    pub fn duration(&self) -> Duration {
        self.end.saturating_sub(self.start)
    }
}

/// Decode any supported source into canonical PCM.
///
/// This is the only place that knows which container the input came in.
pub async fn normalize(source: &AudioSource, decoder: DecoderKind) -> Result<DecodedAudio> {
    info!(
        "Decoding {} ({} container, {} backend)",
        source.name, source.format, decoder
    );

    let audio = match decoder {
        DecoderKind::Native => {
            let source = source.clone();
            tokio::task::spawn_blocking(move || decode_native(&source))
                .await
                .map_err(|e| AudiosubError::Decode(format!("decoder task failed: {e}")))??
        }
        DecoderKind::Ffmpeg => decode_with_ffmpeg(source).await?,
    };

    debug!(
        samples = audio.samples().len(),
        duration_secs = audio.duration().as_secs_f64(),
        "Audio normalized"
    );

    Ok(audio)
}
