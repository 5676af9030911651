use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tracing::debug;
use whisper_rs::{FullParams, SamplingStrategy, WhisperContext, WhisperContextParameters};

use crate::audio::{AudioWindow, DecodedAudio, TARGET_SAMPLE_RATE};
use crate::error::{AudiosubError, Result};
use crate::transcribe::{RawSegment, RecognitionOutcome, WholeFileTranscriber, WindowRecognizer};

/// Speech recognizer backed by a local whisper.cpp model via whisper-rs.
///
/// The context is not reentrant, so inference is serialized behind a mutex
/// and run on the blocking thread pool.
pub struct LocalWhisper {
    context: Arc<Mutex<WhisperContext>>,
    language: Option<String>,
}

impl LocalWhisper {
    pub fn load(model_path: &Path) -> Result<Self> {
        if !model_path.exists() {
            return Err(AudiosubError::Config(format!(
                "Whisper model not found at: {}",
                model_path.display()
            )));
        }

        let path = model_path
            .to_str()
            .ok_or_else(|| AudiosubError::Config("Invalid model path".to_string()))?;
        let context = WhisperContext::new_with_params(path, WhisperContextParameters::default())
            .map_err(|e| AudiosubError::Engine(format!("Failed to load Whisper model: {e}")))?;

        debug!("Loaded whisper model from {}", model_path.display());

        Ok(Self {
            context: Arc::new(Mutex::new(context)),
            language: None,
        })
    }

    pub fn with_language(mut self, language: String) -> Self {
        self.language = Some(language);
        self
    }

    async fn infer(&self, samples: Vec<f32>) -> Result<Vec<RawSegment>> {
        let context = self.context.clone();
        let language = self.language.clone();

        tokio::task::spawn_blocking(move || run_model(&context, language.as_deref(), &samples))
            .await
            .map_err(|e| AudiosubError::Engine(format!("inference task failed: {e}")))?
    }
}

fn run_model(
    context: &Mutex<WhisperContext>,
    language: Option<&str>,
    samples: &[f32],
) -> Result<Vec<RawSegment>> {
    let guard = context
        .lock()
        .map_err(|_| AudiosubError::Engine("whisper context lock poisoned".to_string()))?;

    let mut state = guard
        .create_state()
        .map_err(|e| AudiosubError::Engine(format!("Failed to create Whisper state: {e}")))?;

    let mut params = FullParams::new(SamplingStrategy::Greedy { best_of: 1 });
    params.set_language(Some(language.unwrap_or("en")));
    params.set_translate(false);
    params.set_print_special(false);
    params.set_print_progress(false);
    params.set_print_realtime(false);
    params.set_print_timestamps(false);
    params.set_n_threads(num_cpus().min(4) as i32);

    state
        .full(params, samples)
        .map_err(|e| AudiosubError::Engine(format!("Whisper inference failed: {e}")))?;

    let mut segments = Vec::new();
    for seg_idx in 0..state.full_n_segments() {
        let Some(segment) = state.get_segment(seg_idx) else {
            continue;
        };

        let text = segment
            .to_str()
            .map_err(|e| AudiosubError::Engine(format!("Invalid segment text: {e}")))?;

        // Segment timestamps are in centiseconds.
        segments.push(RawSegment {
            start_secs: segment.start_timestamp() as f64 / 100.0,
            end_secs: segment.end_timestamp() as f64 / 100.0,
            text: text.to_string(),
        });
    }

    Ok(segments)
}

fn num_cpus() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

#[async_trait]
impl WindowRecognizer for LocalWhisper {
    async fn recognize(
        &self,
        window: &AudioWindow,
        samples: &[f32],
        sample_rate: u32,
    ) -> RecognitionOutcome {
        if sample_rate != TARGET_SAMPLE_RATE {
            return RecognitionOutcome::EngineError(format!(
                "whisper needs {TARGET_SAMPLE_RATE} Hz input, got {sample_rate} Hz"
            ));
        }

        debug!("Recognizing window {} locally", window.index);

        match self.infer(samples.to_vec()).await {
            Ok(segments) => {
                let text = segments
                    .iter()
                    .map(|s| s.text.trim())
                    .filter(|t| !t.is_empty())
                    .collect::<Vec<_>>()
                    .join(" ");
                RecognitionOutcome::from_text(&text)
            }
            Err(e) => RecognitionOutcome::EngineError(e.to_string()),
        }
    }

    fn name(&self) -> &'static str {
        "Local Whisper"
    }
}

#[async_trait]
impl WholeFileTranscriber for LocalWhisper {
    async fn transcribe_whole(&self, audio: &DecodedAudio) -> Result<Vec<RawSegment>> {
        if audio.sample_rate() != TARGET_SAMPLE_RATE {
            return Err(AudiosubError::Engine(format!(
                "whisper needs {TARGET_SAMPLE_RATE} Hz input, got {} Hz",
                audio.sample_rate()
            )));
        }
        self.infer(audio.samples().to_vec()).await
    }

    fn name(&self) -> &'static str {
        "Local Whisper"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_nonexistent_model_fails() {
        let result = LocalWhisper::load(Path::new("/nonexistent/model.bin"));
        let err = result.err().unwrap().to_string();
        assert!(err.contains("not found"), "got: {err}");
    }
}
