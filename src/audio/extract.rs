use std::path::{Path, PathBuf};
use std::process::Command;

use hound::WavReader;
use tempfile::TempDir;
use tracing::{debug, info};

use crate::error::{AudiosubError, Result};

use super::{AudioOrigin, AudioSource, DecodedAudio, TARGET_SAMPLE_RATE};

/// Check if FFmpeg is installed and accessible.
pub fn check_ffmpeg() -> Result<()> {
    let output = Command::new("ffmpeg")
        .arg("-version")
        .output()
        .map_err(|e| {
            AudiosubError::Decode(format!(
                "FFmpeg not found. Please install FFmpeg and ensure it's in your PATH. Error: {e}"
            ))
        })?;

    if !output.status.success() {
        return Err(AudiosubError::Decode("FFmpeg check failed".to_string()));
    }

    debug!("FFmpeg is available");
    Ok(())
}

/// Decode through the `ffmpeg` binary.
///
/// The intermediate WAV lives in a temporary directory owned by this call, so
/// it is removed whether decoding succeeds or fails.
pub async fn decode_with_ffmpeg(source: &AudioSource) -> Result<DecodedAudio> {
    check_ffmpeg()?;

    let scratch = TempDir::new()?;
    debug!("Using temp directory: {:?}", scratch.path());

    let input: PathBuf = match &source.origin {
        AudioOrigin::File(path) => path.clone(),
        AudioOrigin::Memory(data) => {
            let spooled = scratch
                .path()
                .join(format!("input.{}", source.format.extension()));
            tokio::fs::write(&spooled, data).await?;
            spooled
        }
    };

    let output = scratch.path().join("normalized.wav");
    let format = source.format.extension().to_string();
    let (input_for_task, output_for_task) = (input.clone(), output.clone());

    tokio::task::spawn_blocking(move || run_ffmpeg(&input_for_task, &format, &output_for_task))
        .await
        .map_err(|e| AudiosubError::Decode(format!("ffmpeg task failed: {e}")))??;

    let audio = read_wav(&output)?;

    info!(
        "Audio normalized by FFmpeg: {:.2}s from {}",
        audio.duration().as_secs_f64(),
        input.display()
    );

    Ok(audio)
}

fn run_ffmpeg(input: &Path, format: &str, output: &Path) -> Result<()> {
    let result = Command::new("ffmpeg")
        .args(["-y", "-v", "error", "-f", ffmpeg_demuxer(format), "-i"])
        .arg(input)
        .args(["-vn", "-acodec", "pcm_s16le", "-ar", "16000", "-ac", "1"])
        .arg(output)
        .output()
        .map_err(|e| AudiosubError::Decode(format!("Failed to run FFmpeg: {e}")))?;

    if !result.status.success() {
        let stderr = String::from_utf8_lossy(&result.stderr);
        return Err(AudiosubError::Decode(format!(
            "FFmpeg could not decode input: {}",
            stderr.trim()
        )));
    }

    if !output.exists() {
        return Err(AudiosubError::Decode(
            "Output file was not created".to_string(),
        ));
    }

    Ok(())
}

/// FFmpeg demuxer name for a declared extension.
fn ffmpeg_demuxer(extension: &str) -> &str {
    match extension {
        "m4a" => "mp4",
        other => other,
    }
}

/// Read a 16 kHz mono WAV produced by FFmpeg into canonical PCM.
fn read_wav(path: &Path) -> Result<DecodedAudio> {
    let reader = WavReader::open(path)
        .map_err(|e| AudiosubError::Decode(format!("Failed to open WAV file: {e}")))?;

    let spec = reader.spec();
    if spec.sample_rate != TARGET_SAMPLE_RATE || spec.channels != 1 {
        return Err(AudiosubError::Decode(format!(
            "unexpected intermediate WAV layout: {} Hz, {} channels",
            spec.sample_rate, spec.channels
        )));
    }

    let samples: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Int => reader
            .into_samples::<i16>()
            .map(|s| s.map(|v| v as f32 / i16::MAX as f32))
            .collect::<std::result::Result<_, _>>(),
        hound::SampleFormat::Float => reader
            .into_samples::<f32>()
            .collect::<std::result::Result<_, _>>(),
    }
    .map_err(|e| AudiosubError::Decode(format!("Failed to read WAV samples: {e}")))?;

    Ok(DecodedAudio::from_samples(samples, TARGET_SAMPLE_RATE))
}
