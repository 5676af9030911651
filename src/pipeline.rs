use crate::audio::{calibrate, normalize, AudioSource, DecodedAudio, Segmentation};
use crate::config::{Config, DecoderKind};
use crate::error::{AudiosubError, Result};
use crate::subtitle::{assemble, render_srt, write_srt, SubtitleTrack};
use crate::transcribe::{create_engine, transcribe_native, Engine, WindowOrchestrator};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Configuration for the conversion pipeline.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Audio decoding backend.
    pub decoder: DecoderKind,
    /// Window length for the fixed-window strategy, in seconds.
    pub window_secs: f64,
    /// Number of concurrent engine requests.
    pub concurrency: usize,
    /// Extra attempts per window after an engine error.
    pub max_retries: u32,
    /// Base delay before the first retry.
    pub retry_delay: Duration,
    /// Skip engine calls for windows below the calibrated noise level.
    /// Skipped windows make the run partial.
    pub skip_silence: bool,
    /// Show progress bars.
    pub show_progress: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            decoder: DecoderKind::default(),
            window_secs: 5.0,
            concurrency: 4,
            max_retries: 1,
            retry_delay: Duration::from_millis(500),
            skip_silence: false,
            show_progress: true,
        }
    }
}

impl PipelineConfig {
    pub fn from_config(config: &Config) -> Self {
        Self {
            decoder: config.decoder,
            window_secs: config.window_secs,
            concurrency: config.concurrency,
            max_retries: config.max_retries,
            skip_silence: config.skip_silence,
            ..Default::default()
        }
    }
}

/// How a finished conversion went.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConversionStatus {
    /// The engine judged every window.
    Complete,
    /// Some windows never got a verdict: `dropped` after engine errors or
    /// cancellation, `skipped` by the silence gate.
    Partial { dropped: usize, skipped: usize },
}

impl std::fmt::Display for ConversionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConversionStatus::Complete => write!(f, "complete"),
            ConversionStatus::Partial { dropped, skipped } => {
                write!(f, "partial ({} windows dropped", dropped)?;
                if *skipped > 0 {
                    write!(f, ", {} skipped as silent", skipped)?;
                }
                write!(f, ")")
            }
        }
    }
}

/// Statistics from one conversion.
#[derive(Debug, Clone, Default)]
pub struct PipelineStats {
    /// Total time taken for the entire pipeline.
    pub total_time: Duration,
    /// Time taken to decode and normalize the audio.
    pub decode_time: Duration,
    /// Time taken for recognition.
    pub transcription_time: Duration,
    /// Decoded audio duration.
    pub audio_duration: Duration,
    /// Windows submitted (zero for native engines).
    pub windows: usize,
    pub recognized: usize,
    pub unrecognized: usize,
    /// Windows skipped by the silence gate without an engine call.
    pub silent: usize,
    pub failed: usize,
    pub cancelled: usize,
    pub retries: u32,
    /// Native segments rejected while sanitizing engine output.
    pub discarded_segments: usize,
    /// Number of cues in the output track.
    pub cues: usize,
    /// Engine used for recognition.
    pub engine: String,
}

/// Result of a conversion that produced a track.
#[derive(Debug, Clone)]
pub struct ConversionReport {
    pub track: SubtitleTrack,
    /// The track serialized as SRT.
    pub srt: String,
    pub status: ConversionStatus,
    pub stats: PipelineStats,
}

/// Stateless audio-to-subtitle pipeline.
///
/// Holds only configuration and the shared engine; every conversion owns its
/// decoded audio and output buffers.
#[derive(Debug)]
pub struct Pipeline {
    engine: Engine,
    segmentation: Segmentation,
    config: PipelineConfig,
}

impl Pipeline {
    pub fn new(engine: Engine, config: PipelineConfig) -> Result<Self> {
        let segmentation = Segmentation::for_mode(engine.mode(), config.window_secs)?;
        if config.concurrency == 0 {
            return Err(AudiosubError::Config(
                "Concurrency must be greater than 0".to_string(),
            ));
        }

        Ok(Self {
            engine,
            segmentation,
            config,
        })
    }

    /// Build the engine named by `config` and a pipeline around it.
    pub fn from_config(config: &Config) -> Result<Self> {
        config.validate()?;
        Self::new(create_engine(config)?, PipelineConfig::from_config(config))
    }

    pub fn with_progress(mut self, show: bool) -> Self {
        self.config.show_progress = show;
        self
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    /// Decode `source` and convert it. Decode failures abort with no output.
    pub async fn convert(
        &self,
        source: &AudioSource,
        cancel: &CancellationToken,
    ) -> Result<ConversionReport> {
        let start_time = Instant::now();

        info!("Stage 1/3: Decoding {}", source.name);
        let audio = normalize(source, self.config.decoder).await?;
        let decode_time = start_time.elapsed();

        let mut report = self.convert_decoded(&audio, cancel).await?;
        report.stats.decode_time = decode_time;
        report.stats.total_time = start_time.elapsed();
        Ok(report)
    }

    /// Convert already-normalized audio.
    pub async fn convert_decoded(
        &self,
        audio: &DecodedAudio,
        cancel: &CancellationToken,
    ) -> Result<ConversionReport> {
        let start_time = Instant::now();
        let mut stats = PipelineStats {
            audio_duration: audio.duration(),
            engine: self.engine.name().to_string(),
            ..Default::default()
        };

        info!(
            "Stage 2/3: Transcribing {:.1}s of audio with {} ({})",
            audio.duration().as_secs_f64(),
            self.engine.name(),
            self.engine.mode()
        );

        let segments = match &self.engine {
            Engine::Windowed(recognizer) => {
                let windows = self.segmentation.segment(audio);
                let profile = calibrate(audio);

                let transcript = WindowOrchestrator::new(recognizer.clone(), self.config.concurrency)
                    .with_max_retries(self.config.max_retries)
                    .with_retry_delay(self.config.retry_delay)
                    .with_skip_silence(self.config.skip_silence)
                    .with_progress(self.config.show_progress)
                    .process(audio, windows, &profile, cancel)
                    .await;

                stats.windows = transcript.stats.total;
                stats.recognized = transcript.stats.recognized;
                stats.unrecognized = transcript.stats.unrecognized;
                stats.silent = transcript.stats.silent;
                stats.failed = transcript.stats.failed;
                stats.cancelled = transcript.stats.cancelled;
                stats.retries = transcript.stats.retries;
                stats.transcription_time = transcript.elapsed;
                transcript.segments
            }
            Engine::Native(transcriber) => {
                let transcript = transcribe_native(transcriber.as_ref(), audio, cancel).await?;
                stats.recognized = transcript.segments.len();
                stats.discarded_segments = transcript.discarded;
                stats.transcription_time = transcript.elapsed;
                transcript.segments
            }
        };

        info!("Stage 3/3: Assembling {} segments", segments.len());
        let track = assemble(segments)?;
        let srt = render_srt(&track)?;
        stats.cues = track.len();

        let dropped = stats.failed + stats.cancelled;
        let skipped = stats.silent;
        let status = if dropped > 0 || skipped > 0 {
            warn!(
                "{} of {} windows without a verdict ({} failed, {} cancelled, {} skipped as silent)",
                dropped + skipped,
                stats.windows,
                stats.failed,
                stats.cancelled,
                skipped
            );
            ConversionStatus::Partial { dropped, skipped }
        } else {
            ConversionStatus::Complete
        };

        stats.total_time = start_time.elapsed();

        Ok(ConversionReport {
            track,
            srt,
            status,
            stats,
        })
    }

    /// Convert a file on disk and write the SRT to `output`.
    ///
    /// Nothing is written unless the conversion succeeds.
    pub async fn convert_file(
        &self,
        input: &Path,
        output: &Path,
        cancel: &CancellationToken,
    ) -> Result<ConversionReport> {
        let source = AudioSource::from_path(input, None)?;
        let report = self.convert(&source, cancel).await?;

        write_srt(output, &report.srt)?;
        info!("Wrote {} cues to {:?}", report.track.len(), output);

        Ok(report)
    }
}

/// `<stem>.srt` next to the input.
pub fn derive_output_path(input: &Path) -> PathBuf {
    input.with_extension("srt")
}

/// Print a summary of the conversion results.
pub fn print_summary(report: &ConversionReport, output: &Path) {
    let stats = &report.stats;
    println!();
    println!("═══════════════════════════════════════════════════════════════");
    println!("                      Subtitle Conversion Complete              ");
    println!("═══════════════════════════════════════════════════════════════");
    println!();
    println!("  Output:     {}", output.display());
    println!("  Status:     {}", report.status);
    println!("  Cues:       {}", stats.cues);
    println!("  Engine:     {}", stats.engine);
    println!(
        "  Duration:   {:.1}s audio",
        stats.audio_duration.as_secs_f64()
    );
    if stats.windows > 0 {
        println!();
        println!("  Windows:");
        println!("    Recognized:    {}", stats.recognized);
        println!("    Unrecognized:  {}", stats.unrecognized);
        println!("    Silent:        {}", stats.silent);
        println!("    Failed:        {}", stats.failed);
        println!("    Cancelled:     {}", stats.cancelled);
        println!("    Retries:       {}", stats.retries);
    }
    if stats.discarded_segments > 0 {
        println!();
        println!("  Discarded {} malformed engine segments", stats.discarded_segments);
    }
    println!();
    println!("  Timing:");
    println!("    Decode:      {:.2}s", stats.decode_time.as_secs_f64());
    println!(
        "    Transcribe:  {:.2}s",
        stats.transcription_time.as_secs_f64()
    );
    println!("    Total:       {:.2}s", stats.total_time.as_secs_f64());
    println!();
    println!("═══════════════════════════════════════════════════════════════");
}
