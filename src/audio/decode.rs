use std::fs::File;
use std::io::Cursor;
use std::time::Duration;

use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::DecoderOptions;
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::{MediaSource, MediaSourceStream};
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use tracing::debug;

use crate::error::{AudiosubError, Result};

use super::{AudioOrigin, AudioSource, DecodedAudio, TARGET_SAMPLE_RATE};

/// Decode a source in-process and normalize it to 16 kHz mono.
pub fn decode_native(source: &AudioSource) -> Result<DecodedAudio> {
    let media: Box<dyn MediaSource> = match &source.origin {
        AudioOrigin::File(path) => Box::new(File::open(path)?),
        AudioOrigin::Memory(data) => Box::new(Cursor::new(data.clone())),
    };
    let mss = MediaSourceStream::new(media, Default::default());

    let mut hint = Hint::new();
    hint.with_extension(source.format.extension());

    let opened = symphonia::default::get_probe()
        .format(
            &hint,
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .map_err(|e| AudiosubError::Decode(format!("unrecognized container: {e}")))?;

    let mut format = opened.format;

    let track = format
        .default_track()
        .ok_or_else(|| AudiosubError::Decode("no audio track found".to_string()))?;

    let track_id = track.id;
    let codec_params = track.codec_params.clone();
    let source_rate = codec_params
        .sample_rate
        .ok_or_else(|| AudiosubError::Decode("unknown sample rate".to_string()))?;
    let channels = codec_params.channels.map(|c| c.count()).unwrap_or(1).max(1);

    let mut decoder = symphonia::default::get_codecs()
        .make(&codec_params, &DecoderOptions::default())
        .map_err(|e| AudiosubError::Decode(format!("codec: {e}")))?;

    let declared_frames = codec_params.n_frames;
    let mut mono: Vec<f32> = Vec::new();
    let mut largest_packet = 0u64;

    loop {
        let packet = match format.next_packet() {
            Ok(p) => p,
            Err(SymphoniaError::IoError(ref e))
                if e.kind() == std::io::ErrorKind::UnexpectedEof =>
            {
                break;
            }
            Err(e) => {
                return Err(AudiosubError::Decode(format!("packet: {e}")));
            }
        };

        if packet.track_id() != track_id {
            continue;
        }

        let decoded = decoder.decode(&packet).map_err(|e| match e {
            SymphoniaError::DecodeError(detail) => {
                AudiosubError::Decode(format!("corrupt audio packet at ts {}: {detail}", packet.ts()))
            }
            other => AudiosubError::Decode(format!("decode: {other}")),
        })?;

        let spec = *decoded.spec();
        let num_frames = decoded.frames();
        if num_frames == 0 {
            continue;
        }
        largest_packet = largest_packet.max(num_frames as u64);

        let mut sample_buf = SampleBuffer::<f32>::new(num_frames as u64, spec);
        sample_buf.copy_interleaved_ref(decoded);
        let samples = sample_buf.samples();

        if channels > 1 {
            for frame in samples.chunks(channels) {
                mono.push(frame.iter().sum::<f32>() / channels as f32);
            }
        } else {
            mono.extend_from_slice(samples);
        }
    }

    // Containers that declare a length must deliver it, give or take one packet
    // of codec padding.
    if let Some(expected) = declared_frames {
        let decoded_frames = mono.len() as u64;
        if decoded_frames + largest_packet < expected {
            return Err(AudiosubError::Decode(format!(
                "truncated stream: {decoded_frames} of {expected} frames present"
            )));
        }
    }

    let duration = Duration::from_secs_f64(mono.len() as f64 / source_rate as f64);

    if source_rate != TARGET_SAMPLE_RATE && !mono.is_empty() {
        mono = resample(&mono, source_rate, TARGET_SAMPLE_RATE)?;
    }

    debug!(
        source_rate,
        channels,
        samples = mono.len(),
        duration_secs = duration.as_secs_f64(),
        "Audio decoded to 16kHz mono PCM"
    );

    Ok(DecodedAudio::new(mono, TARGET_SAMPLE_RATE, duration))
}

pub(crate) fn resample(samples: &[f32], from_rate: u32, to_rate: u32) -> Result<Vec<f32>> {
    use rubato::{
        Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction,
    };

    let params = SincInterpolationParameters {
        sinc_len: 256,
        f_cutoff: 0.95,
        interpolation: SincInterpolationType::Linear,
        oversampling_factor: 256,
        window: WindowFunction::BlackmanHarris2,
    };

    let ratio = to_rate as f64 / from_rate as f64;
    let chunk_size = 1024;

    let mut resampler = SincFixedIn::<f32>::new(ratio, 2.0, params, chunk_size, 1)
        .map_err(|e| AudiosubError::Decode(format!("resampler init: {e}")))?;

    let mut output = Vec::with_capacity((samples.len() as f64 * ratio) as usize + chunk_size);

    for chunk in samples.chunks(chunk_size) {
        let input = if chunk.len() < chunk_size {
            let mut padded = chunk.to_vec();
            padded.resize(chunk_size, 0.0);
            padded
        } else {
            chunk.to_vec()
        };

        let result = resampler
            .process(&[input], None)
            .map_err(|e| AudiosubError::Decode(format!("resample: {e}")))?;

        if let Some(channel) = result.first() {
            output.extend_from_slice(channel);
        }
    }

    let expected_len = (samples.len() as f64 * ratio) as usize;
    output.truncate(expected_len);

    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::AudioFormat;
    use std::path::Path;

    fn write_wav(path: &Path, sample_rate: u32, channels: u16, frames: usize) {
        let spec = hound::WavSpec {
            channels,
            sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(path, spec).unwrap();
        for i in 0..frames {
            let t = i as f32 / sample_rate as f32;
            let s = ((2.0 * std::f32::consts::PI * 440.0 * t).sin() * 8000.0) as i16;
            for _ in 0..channels {
                writer.write_sample(s).unwrap();
            }
        }
        writer.finalize().unwrap();
    }

    #[test]
    fn test_decode_mono_wav() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tone.wav");
        write_wav(&path, 16_000, 1, 32_000);

        let source = AudioSource::from_path(&path, None).unwrap();
        let audio = decode_native(&source).unwrap();

        assert_eq!(audio.sample_rate(), TARGET_SAMPLE_RATE);
        assert_eq!(audio.samples().len(), 32_000);
        assert_eq!(audio.duration(), Duration::from_secs(2));
    }

    #[test]
    fn test_decode_stereo_downmixes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stereo.wav");
        write_wav(&path, 16_000, 2, 16_000);

        let source = AudioSource::from_path(&path, None).unwrap();
        let audio = decode_native(&source).unwrap();

        assert_eq!(audio.samples().len(), 16_000);
        assert_eq!(audio.duration(), Duration::from_secs(1));
    }

    #[test]
    fn test_decode_resamples_but_keeps_source_duration() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("phone.wav");
        write_wav(&path, 8_000, 1, 24_000);

        let source = AudioSource::from_path(&path, None).unwrap();
        let audio = decode_native(&source).unwrap();

        assert_eq!(audio.duration(), Duration::from_secs(3));
        assert_eq!(audio.samples().len(), 48_000);
    }

    #[test]
    fn test_decode_garbage_fails() {
        let source = AudioSource {
            origin: AudioOrigin::Memory(b"this is definitely not audio data".to_vec()),
            format: AudioFormat::Wav,
            name: "junk.wav".to_string(),
        };
        let err = decode_native(&source).unwrap_err();
        assert!(matches!(err, AudiosubError::Decode(_)));
    }

    #[test]
    fn test_decode_truncated_wav_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cut.wav");
        write_wav(&path, 16_000, 1, 12 * 16_000);

        let mut bytes = std::fs::read(&path).unwrap();
        bytes.truncate(bytes.len() / 2);

        let source = AudioSource::from_bytes(bytes, "cut.wav").unwrap();
        let err = decode_native(&source).unwrap_err();
        assert!(matches!(err, AudiosubError::Decode(_)), "got {err:?}");
    }
}
