#[cfg(feature = "local-whisper")]
pub mod local;
pub mod native;
pub mod orchestrator;
pub mod whisper;

#[cfg(feature = "local-whisper")]
pub use local::LocalWhisper;
pub use native::{sanitize_segments, transcribe_native, NativeTranscript};
pub use orchestrator::{WindowOrchestrator, WindowStats, WindowedTranscript};
pub use whisper::WhisperClient;

use crate::audio::{AudioWindow, DecodedAudio};
use crate::config::{Config, Mode, Provider};
use crate::error::{AudiosubError, Result};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

/// One recognized utterance anchored to the source timeline.
#[derive(Debug, Clone, PartialEq)]
pub struct TranscriptSegment {
    pub start: Duration,
    pub end: Duration,
    pub text: String,
}

/// A segment as reported by a self-segmenting engine, before validation.
#[derive(Debug, Clone, PartialEq)]
pub struct RawSegment {
    pub start_secs: f64,
    pub end_secs: f64,
    pub text: String,
}

/// Result of a single recognition attempt on one window.
#[derive(Debug, Clone, PartialEq)]
pub enum RecognitionOutcome {
    Recognized(String),
    /// The engine heard the audio but produced no confident text.
    Unrecognized,
    /// Service fault, malformed response or timeout.
    EngineError(String),
}

impl RecognitionOutcome {
    /// Map engine text onto an outcome; blank text counts as unrecognized.
    pub fn from_text(text: &str) -> Self {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            RecognitionOutcome::Unrecognized
        } else {
            RecognitionOutcome::Recognized(trimmed.to_string())
        }
    }
}

/// Engine that recognizes one window of audio at a time.
#[async_trait]
pub trait WindowRecognizer: Send + Sync {
    /// `samples` is the window's slice of canonical PCM at `sample_rate`.
    async fn recognize(
        &self,
        window: &AudioWindow,
        samples: &[f32],
        sample_rate: u32,
    ) -> RecognitionOutcome;
    fn name(&self) -> &'static str;
}

/// Engine that segments and recognizes a whole file in one call.
#[async_trait]
pub trait WholeFileTranscriber: Send + Sync {
    async fn transcribe_whole(&self, audio: &DecodedAudio) -> Result<Vec<RawSegment>>;
    fn name(&self) -> &'static str;
}

/// The configured recognition capability for a conversion.
#[derive(Clone)]
pub enum Engine {
    Windowed(Arc<dyn WindowRecognizer>),
    Native(Arc<dyn WholeFileTranscriber>),
}

impl Engine {
    pub fn name(&self) -> &'static str {
        match self {
            Engine::Windowed(e) => e.name(),
            Engine::Native(e) => e.name(),
        }
    }

    pub fn mode(&self) -> Mode {
        match self {
            Engine::Windowed(_) => Mode::Windowed,
            Engine::Native(_) => Mode::Native,
        }
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Engine({}, {})", self.mode(), self.name())
    }
}

/// Build the configured provider in the configured mode.
pub fn create_engine(config: &Config) -> Result<Engine> {
    match config.provider {
        Provider::Whisper => {
            let api_key = config.openai_api_key.as_ref().ok_or_else(|| {
                AudiosubError::Config(
                    "OpenAI API key not set. Set OPENAI_API_KEY environment variable.".to_string(),
                )
            })?;
            let mut client = WhisperClient::new(api_key.clone())
                .with_timeout(Duration::from_secs(config.request_timeout_secs))?;
            if let Some(ref lang) = config.language {
                client = client.with_language(lang.clone());
            }
            let client = Arc::new(client);
            Ok(match config.mode {
                Mode::Windowed => Engine::Windowed(client),
                Mode::Native => Engine::Native(client),
            })
        }
        Provider::Local => create_local_engine(config),
    }
}

#[cfg(feature = "local-whisper")]
fn create_local_engine(config: &Config) -> Result<Engine> {
    let model_path = config.model_path.as_ref().ok_or_else(|| {
        AudiosubError::Config("Local provider needs a model path".to_string())
    })?;
    let mut model = LocalWhisper::load(model_path)?;
    if let Some(ref lang) = config.language {
        model = model.with_language(lang.clone());
    }
    let model = Arc::new(model);
    Ok(match config.mode {
        Mode::Windowed => Engine::Windowed(model),
        Mode::Native => Engine::Native(model),
    })
}

#[cfg(not(feature = "local-whisper"))]
fn create_local_engine(_config: &Config) -> Result<Engine> {
    Err(AudiosubError::Config(
        "Local provider is not available: rebuild with --features local-whisper".to_string(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_from_text() {
        assert_eq!(
            RecognitionOutcome::from_text("  Hello world \n"),
            RecognitionOutcome::Recognized("Hello world".to_string())
        );
        assert_eq!(
            RecognitionOutcome::from_text("   "),
            RecognitionOutcome::Unrecognized
        );
    }

    #[test]
    fn test_create_whisper_engine_modes() {
        let mut config = Config {
            openai_api_key: Some("sk-test".to_string()),
            ..Default::default()
        };
        let engine = create_engine(&config).unwrap();
        assert_eq!(engine.mode(), Mode::Windowed);
        assert_eq!(engine.name(), "OpenAI Whisper");

        config.mode = Mode::Native;
        assert_eq!(create_engine(&config).unwrap().mode(), Mode::Native);
    }

    #[test]
    fn test_create_engine_missing_key() {
        assert!(create_engine(&Config::default()).is_err());
    }

    #[cfg(not(feature = "local-whisper"))]
    #[test]
    fn test_local_engine_unavailable_without_feature() {
        let config = Config {
            provider: Provider::Local,
            model_path: Some("/models/ggml-base.bin".into()),
            ..Default::default()
        };
        let err = create_engine(&config).unwrap_err();
        assert!(err.to_string().contains("local-whisper"));
    }
}
