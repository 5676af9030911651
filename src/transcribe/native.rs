use crate::audio::DecodedAudio;
use crate::error::{AudiosubError, Result};
use crate::subtitle::to_millis;
use crate::transcribe::{RawSegment, TranscriptSegment, WholeFileTranscriber};
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Segments produced by a self-segmenting engine, after sanitation.
#[derive(Debug, Clone)]
pub struct NativeTranscript {
    pub segments: Vec<TranscriptSegment>,
    /// Raw segments rejected or collapsed to nothing by sanitation.
    pub discarded: usize,
    pub elapsed: Duration,
}

/// Run a whole-file engine once and sanitize what it returns.
pub async fn transcribe_native(
    engine: &dyn WholeFileTranscriber,
    audio: &DecodedAudio,
    cancel: &CancellationToken,
) -> Result<NativeTranscript> {
    let start_time = Instant::now();

    if audio.duration().is_zero() {
        debug!("Empty audio, skipping {}", engine.name());
        return Ok(NativeTranscript {
            segments: Vec::new(),
            discarded: 0,
            elapsed: Duration::ZERO,
        });
    }

    info!("Transcribing whole file with {}", engine.name());

    let raw = tokio::select! {
        biased;
        _ = cancel.cancelled() => return Err(AudiosubError::Cancelled),
        raw = engine.transcribe_whole(audio) => raw?,
    };

    let raw_count = raw.len();
    let segments = sanitize_segments(raw, audio.duration());
    let elapsed = start_time.elapsed();

    info!(
        "{} returned {} segments ({} kept) in {:.2}s",
        engine.name(),
        raw_count,
        segments.len(),
        elapsed.as_secs_f64()
    );

    Ok(NativeTranscript {
        discarded: raw_count - segments.len(),
        segments,
        elapsed,
    })
}

/// Turn raw engine segments into a monotonic, non-overlapping sequence.
///
/// Blank text and non-finite or negative bounds are dropped. A segment that
/// starts before the previous one ends is clamped to start at that end, and
/// ends are clamped to the audio duration; anything left empty, or shorter
/// than a millisecond once written, is dropped.
pub fn sanitize_segments(raw: Vec<RawSegment>, duration: Duration) -> Vec<TranscriptSegment> {
    let limit = duration.as_secs_f64();
    let mut segments: Vec<TranscriptSegment> = Vec::with_capacity(raw.len());
    let mut floor = 0.0f64;

    for (i, seg) in raw.into_iter().enumerate() {
        let text = seg.text.trim();
        if text.is_empty() {
            debug!("Dropping segment {}: empty text", i);
            continue;
        }

        if !seg.start_secs.is_finite()
            || !seg.end_secs.is_finite()
            || seg.start_secs < 0.0
            || seg.end_secs < 0.0
        {
            warn!(
                "Dropping segment {}: invalid bounds {}..{}",
                i, seg.start_secs, seg.end_secs
            );
            continue;
        }

        let start = seg.start_secs.max(floor);
        let end = seg.end_secs.min(limit);
        if start >= end
            || to_millis(Duration::from_secs_f64(start)) >= to_millis(Duration::from_secs_f64(end))
        {
            warn!(
                "Dropping segment {}: {:.3}..{:.3} collapses after clamping to {:.3}..{:.3}",
                i, seg.start_secs, seg.end_secs, start, end
            );
            continue;
        }
        if start > seg.start_secs {
            debug!(
                "Segment {} overlapped its predecessor, start moved {:.3} -> {:.3}",
                i, seg.start_secs, start
            );
        }

        floor = end;
        segments.push(TranscriptSegment {
            start: Duration::from_secs_f64(start),
            end: Duration::from_secs_f64(end),
            text: text.to_string(),
        });
    }

    segments
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::TARGET_SAMPLE_RATE;
    use async_trait::async_trait;

    fn raw(start: f64, end: f64, text: &str) -> RawSegment {
        RawSegment {
            start_secs: start,
            end_secs: end,
            text: text.to_string(),
        }
    }

    #[test]
    fn test_sanitize_passes_clean_segments() {
        let segments = sanitize_segments(
            vec![raw(0.0, 3.2, " one"), raw(3.2, 7.9, "two ")],
            Duration::from_secs(8),
        );

        assert_eq!(segments.len(), 2);
        assert_eq!(segments[0].text, "one");
        assert_eq!(segments[1].start, Duration::from_secs_f64(3.2));
        assert_eq!(segments[1].end, Duration::from_secs_f64(7.9));
    }

    #[test]
    fn test_sanitize_clamps_overlap() {
        let segments = sanitize_segments(
            vec![raw(0.0, 4.0, "a"), raw(3.5, 6.0, "b")],
            Duration::from_secs(10),
        );

        assert_eq!(segments[1].start, Duration::from_secs(4));
        assert_eq!(segments[1].end, Duration::from_secs(6));
    }

    #[test]
    fn test_sanitize_drops_swallowed_and_invalid() {
        let segments = sanitize_segments(
            vec![
                raw(0.0, 5.0, "long"),
                raw(1.0, 4.0, "inside"),
                raw(-1.0, 2.0, "negative"),
                raw(f64::NAN, 6.0, "nan"),
                raw(5.0, 6.0, "   "),
                raw(6.0, 7.0, "kept"),
            ],
            Duration::from_secs(10),
        );

        let texts: Vec<&str> = segments.iter().map(|s| s.text.as_str()).collect();
        assert_eq!(texts, vec!["long", "kept"]);
    }

    #[test]
    fn test_sanitize_clamps_to_duration() {
        let segments = sanitize_segments(
            vec![raw(8.0, 12.5, "tail"), raw(10.0, 11.0, "beyond")],
            Duration::from_secs(10),
        );

        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0].end, Duration::from_secs(10));
    }

    #[test]
    fn test_sanitize_drops_sub_millisecond_remainder() {
        let segments = sanitize_segments(
            vec![raw(0.0, 9.9997, "body"), raw(9.9, 10.4, "sliver")],
            Duration::from_secs(10),
        );

        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0].text, "body");
    }

    struct FixedEngine(Vec<RawSegment>);

    #[async_trait]
    impl WholeFileTranscriber for FixedEngine {
        async fn transcribe_whole(&self, _audio: &DecodedAudio) -> Result<Vec<RawSegment>> {
            Ok(self.0.clone())
        }

        fn name(&self) -> &'static str {
            "Fixed"
        }
    }

    #[tokio::test]
    async fn test_transcribe_native_counts_discarded() {
        let engine = FixedEngine(vec![raw(0.0, 1.0, "hi"), raw(1.0, 2.0, "")]);
        let audio = DecodedAudio::from_samples(vec![0.1; 32_000], TARGET_SAMPLE_RATE);

        let transcript = transcribe_native(&engine, &audio, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(transcript.segments.len(), 1);
        assert_eq!(transcript.discarded, 1);
    }

    #[tokio::test]
    async fn test_transcribe_native_cancelled() {
        let engine = FixedEngine(vec![raw(0.0, 1.0, "hi")]);
        let audio = DecodedAudio::from_samples(vec![0.1; 16_000], TARGET_SAMPLE_RATE);
        let cancel = CancellationToken::new();
        cancel.cancel();

        let result = transcribe_native(&engine, &audio, &cancel).await;
        assert!(matches!(result, Err(AudiosubError::Cancelled)));
    }
}
