use crate::audio::{AudioWindow, DecodedAudio, NoiseProfile};
use crate::transcribe::{RecognitionOutcome, TranscriptSegment, WindowRecognizer};
use futures::stream::{FuturesUnordered, StreamExt};
use indicatif::{ProgressBar, ProgressStyle};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Base delay for exponential backoff between retries (milliseconds).
const BASE_DELAY_MS: u64 = 500;

/// Upper bound on a single backoff sleep.
const MAX_RETRY_DELAY: Duration = Duration::from_secs(30);

/// Final state of one window after retries.
#[derive(Debug, Clone, PartialEq)]
enum WindowOutcome {
    Finished(RecognitionOutcome),
    /// Below the calibrated energy threshold; the engine was not called.
    Silent,
    Cancelled,
}

#[derive(Debug)]
struct WindowResult {
    window: AudioWindow,
    outcome: WindowOutcome,
    retries: u32,
}

/// Counters from recognizing a set of windows.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WindowStats {
    pub total: usize,
    pub recognized: usize,
    pub unrecognized: usize,
    /// Below the noise threshold; never sent to the engine.
    pub silent: usize,
    /// Windows dropped after exhausting retries on engine errors.
    pub failed: usize,
    pub cancelled: usize,
    pub retries: u32,
}

/// Segments recovered from windows, in window order.
#[derive(Debug, Clone)]
pub struct WindowedTranscript {
    pub segments: Vec<TranscriptSegment>,
    pub stats: WindowStats,
    pub elapsed: Duration,
}

/// Runs window recognition with bounded concurrency and restores window order.
pub struct WindowOrchestrator {
    recognizer: Arc<dyn WindowRecognizer>,
    concurrency: usize,
    max_retries: u32,
    retry_delay: Duration,
    skip_silence: bool,
    show_progress: bool,
}

impl WindowOrchestrator {
    pub fn new(recognizer: Arc<dyn WindowRecognizer>, concurrency: usize) -> Self {
        Self {
            recognizer,
            concurrency: concurrency.max(1),
            max_retries: 1,
            retry_delay: Duration::from_millis(BASE_DELAY_MS),
            skip_silence: false,
            show_progress: true,
        }
    }

    /// Extra attempts granted to a window after an engine error.
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Base backoff between attempts; doubles on each retry.
    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    pub fn with_skip_silence(mut self, skip: bool) -> Self {
        self.skip_silence = skip;
        self
    }

    /// Enable or disable progress bar display.
    pub fn with_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    /// Recognize every window and map recognized text back onto window bounds.
    ///
    /// Per-window failures never abort the run. On cancellation, windows that
    /// already finished are kept and the rest are counted as cancelled.
    pub async fn process(
        &self,
        audio: &DecodedAudio,
        windows: Vec<AudioWindow>,
        profile: &NoiseProfile,
        cancel: &CancellationToken,
    ) -> WindowedTranscript {
        let total = windows.len();
        let start_time = Instant::now();

        if windows.is_empty() {
            return WindowedTranscript {
                segments: Vec::new(),
                stats: WindowStats::default(),
                elapsed: Duration::ZERO,
            };
        }

        info!(
            "Recognizing {} windows with {} concurrent requests using {}",
            total,
            self.concurrency,
            self.recognizer.name()
        );

        let progress_bar = if self.show_progress {
            let pb = ProgressBar::new(total as u64);
            pb.set_style(
                ProgressStyle::default_bar()
                    .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} windows ({eta})")
                    .unwrap_or_else(|_| ProgressStyle::default_bar())
                    .progress_chars("#>-"),
            );
            Some(pb)
        } else {
            None
        };

        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let mut futures = FuturesUnordered::new();

        for window in windows {
            let sem = semaphore.clone();
            let pb = progress_bar.clone();

            futures.push(async move {
                let result = self.run_window(audio, window, profile, &sem, cancel).await;
                if let Some(ref pb) = pb {
                    pb.inc(1);
                }
                result
            });
        }

        let mut results: Vec<WindowResult> = Vec::with_capacity(total);
        while let Some(result) = futures.next().await {
            results.push(result);
        }

        if let Some(pb) = progress_bar {
            pb.finish_with_message("Recognition complete");
        }

        results.sort_by_key(|r| r.window.index);

        let mut stats = WindowStats {
            total,
            ..Default::default()
        };
        let mut segments = Vec::new();

        for result in results {
            stats.retries += result.retries;
            match result.outcome {
                WindowOutcome::Finished(RecognitionOutcome::Recognized(text)) => {
                    stats.recognized += 1;
                    segments.push(TranscriptSegment {
                        start: result.window.start,
                        end: result.window.end,
                        text,
                    });
                }
                WindowOutcome::Finished(RecognitionOutcome::Unrecognized) => {
                    stats.unrecognized += 1;
                }
                WindowOutcome::Silent => {
                    stats.silent += 1;
                }
                WindowOutcome::Finished(RecognitionOutcome::EngineError(_)) => {
                    stats.failed += 1;
                }
                WindowOutcome::Cancelled => {
                    stats.cancelled += 1;
                }
            }
        }

        let elapsed = start_time.elapsed();
        info!(
            "Recognition complete: {}/{} windows recognized, {} unrecognized, {} silent, {} failed, {} cancelled in {:.2}s",
            stats.recognized,
            total,
            stats.unrecognized,
            stats.silent,
            stats.failed,
            stats.cancelled,
            elapsed.as_secs_f64()
        );

        WindowedTranscript {
            segments,
            stats,
            elapsed,
        }
    }

    async fn run_window(
        &self,
        audio: &DecodedAudio,
        window: AudioWindow,
        profile: &NoiseProfile,
        semaphore: &Semaphore,
        cancel: &CancellationToken,
    ) -> WindowResult {
        let cancelled = |window, retries| WindowResult {
            window,
            outcome: WindowOutcome::Cancelled,
            retries,
        };

        let _permit = tokio::select! {
            biased;
            _ = cancel.cancelled() => return cancelled(window, 0),
            permit = semaphore.acquire() => match permit {
                Ok(permit) => permit,
                Err(_) => return cancelled(window, 0),
            },
        };

        let samples = audio.slice(window.start, window.end);

        if self.skip_silence && profile.is_silent(samples) {
            debug!("Window {} is below the noise threshold, skipping", window.index);
            return WindowResult {
                window,
                outcome: WindowOutcome::Silent,
                retries: 0,
            };
        }

        let mut retries = 0;
        loop {
            let outcome = tokio::select! {
                biased;
                _ = cancel.cancelled() => return cancelled(window, retries),
                outcome = self.recognizer.recognize(&window, samples, audio.sample_rate()) => outcome,
            };

            match outcome {
                RecognitionOutcome::EngineError(ref detail) if retries < self.max_retries => {
                    retries += 1;
                    let delay = backoff_delay(self.retry_delay, retries);
                    warn!(
                        "Window {} failed ({}), retry {} after {:?}",
                        window.index, detail, retries, delay
                    );
                    tokio::select! {
                        biased;
                        _ = cancel.cancelled() => return cancelled(window, retries),
                        _ = tokio::time::sleep(delay) => {}
                    }
                }
                RecognitionOutcome::EngineError(detail) => {
                    warn!("Window {} dropped: {}", window.index, detail);
                    return WindowResult {
                        window,
                        outcome: WindowOutcome::Finished(RecognitionOutcome::EngineError(detail)),
                        retries,
                    };
                }
                other => {
                    debug!("Window {} finished: {:?}", window.index, other);
                    return WindowResult {
                        window,
                        outcome: WindowOutcome::Finished(other),
                        retries,
                    };
                }
            }
        }
    }
}

/// Delay before retry number `retry` (1-based): `base * 2^(retry - 1)`, capped.
fn backoff_delay(base: Duration, retry: u32) -> Duration {
    let factor = 2u32.saturating_pow(retry.saturating_sub(1));
    base.saturating_mul(factor).min(MAX_RETRY_DELAY)
}
