use crate::audio::{AudioWindow, DecodedAudio};
use crate::error::{AudiosubError, Result};
use crate::transcribe::{RawSegment, RecognitionOutcome, WholeFileTranscriber, WindowRecognizer};
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use std::io::Cursor;
use std::time::Duration;
use tracing::debug;

/// OpenAI API base URL.
const OPENAI_API_BASE: &str = "https://api.openai.com";

const TRANSCRIPTIONS_PATH: &str = "/v1/audio/transcriptions";

/// Maximum upload size for the Whisper API (25 MB).
const MAX_FILE_SIZE: usize = 25 * 1024 * 1024;

/// The only transcription model that returns `verbose_json` segments.
const WHISPER_MODEL: &str = "whisper-1";

/// OpenAI Whisper API client.
///
/// Serves both engine shapes: one request per window, or one request for the
/// whole file returning the service's own segments.
pub struct WhisperClient {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    language: Option<String>,
}

impl WhisperClient {
    /// Create a new Whisper client with the given API key.
    pub fn new(api_key: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
            base_url: OPENAI_API_BASE.to_string(),
            language: None,
        }
    }

    /// Set the source language (ISO 639-1 code).
    pub fn with_language(mut self, language: String) -> Self {
        self.language = Some(language);
        self
    }

    /// Point the client at a different API host.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Bound every request by `timeout`.
    pub fn with_timeout(mut self, timeout: Duration) -> Result<Self> {
        self.client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(self)
    }

    fn build_form(&self, wav_bytes: Vec<u8>, file_name: &str, with_segments: bool) -> Result<Form> {
        let file_part = Part::bytes(wav_bytes)
            .file_name(file_name.to_string())
            .mime_str("audio/wav")?;

        let mut form = Form::new()
            .part("file", file_part)
            .text("model", WHISPER_MODEL)
            .text("response_format", "verbose_json");

        if with_segments {
            form = form.text("timestamp_granularities[]", "segment");
        }

        if let Some(ref lang) = self.language {
            form = form.text("language", lang.clone());
        }

        Ok(form)
    }

    /// Make the API request (form is consumed, retries happen a level up).
    async fn call_api(&self, form: Form) -> Result<WhisperResponse> {
        let response = self
            .client
            .post(format!("{}{}", self.base_url, TRANSCRIPTIONS_PATH))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .multipart(form)
            .send()
            .await?;

        let status = response.status();
        debug!("Whisper API response status: {}", status);

        if status.is_success() {
            let body = response.text().await?;
            debug!("Whisper API response: {}", truncate(&body, 500));
            let parsed: WhisperResponse = serde_json::from_str(&body)?;
            return Ok(parsed);
        }

        let error_body = response.text().await.unwrap_or_default();

        if let Ok(api_error) = serde_json::from_str::<ApiErrorResponse>(&error_body) {
            return Err(AudiosubError::Engine(format!(
                "Whisper API error: {} ({})",
                api_error.error.message, api_error.error.r#type
            )));
        }

        Err(AudiosubError::Engine(format!(
            "Whisper API error ({}): {}",
            status, error_body
        )))
    }
}

#[async_trait]
impl WindowRecognizer for WhisperClient {
    async fn recognize(
        &self,
        window: &AudioWindow,
        samples: &[f32],
        sample_rate: u32,
    ) -> RecognitionOutcome {
        debug!(
            "Recognizing window {} ({:?}..{:?}) with Whisper",
            window.index, window.start, window.end
        );

        let form = encode_wav(samples, sample_rate).and_then(|bytes| {
            self.build_form(bytes, &format!("window_{:04}.wav", window.index), false)
        });

        let result = match form {
            Ok(form) => self.call_api(form).await,
            Err(e) => Err(e),
        };

        match result {
            Ok(response) => RecognitionOutcome::from_text(&response.text),
            Err(e) => RecognitionOutcome::EngineError(e.to_string()),
        }
    }

    fn name(&self) -> &'static str {
        "OpenAI Whisper"
    }
}

#[async_trait]
impl WholeFileTranscriber for WhisperClient {
    async fn transcribe_whole(&self, audio: &DecodedAudio) -> Result<Vec<RawSegment>> {
        let bytes = encode_wav(audio.samples(), audio.sample_rate())?;
        if bytes.len() > MAX_FILE_SIZE {
            return Err(AudiosubError::Engine(format!(
                "Audio too large for a single Whisper request: {} bytes (max {} bytes); use windowed mode",
                bytes.len(),
                MAX_FILE_SIZE
            )));
        }

        let form = self.build_form(bytes, "audio.wav", true)?;
        let response = self.call_api(form).await?;
        let segments = parse_segments(response);

        debug!("Whisper returned {} segments", segments.len());
        Ok(segments)
    }

    fn name(&self) -> &'static str {
        "OpenAI Whisper"
    }
}

/// Convert a verbose response into raw segments, falling back to a single
/// segment spanning the reported duration.
fn parse_segments(response: WhisperResponse) -> Vec<RawSegment> {
    match response.segments {
        Some(segments) => segments
            .into_iter()
            .map(|seg| RawSegment {
                start_secs: seg.start,
                end_secs: seg.end,
                text: seg.text,
            })
            .collect(),
        None => match response.duration {
            Some(duration) if !response.text.trim().is_empty() => vec![RawSegment {
                start_secs: 0.0,
                end_secs: duration,
                text: response.text,
            }],
            _ => Vec::new(),
        },
    }
}

/// Encode canonical PCM as an in-memory 16-bit mono WAV file.
pub(crate) fn encode_wav(samples: &[f32], sample_rate: u32) -> Result<Vec<u8>> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut buffer = Vec::with_capacity(44 + samples.len() * 2);
    {
        let mut writer = hound::WavWriter::new(Cursor::new(&mut buffer), spec)
            .map_err(|e| AudiosubError::Engine(format!("WAV encoding failed: {e}")))?;
        for &s in samples {
            let value = (s.clamp(-1.0, 1.0) * i16::MAX as f32) as i16;
            writer
                .write_sample(value)
                .map_err(|e| AudiosubError::Engine(format!("WAV encoding failed: {e}")))?;
        }
        writer
            .finalize()
            .map_err(|e| AudiosubError::Engine(format!("WAV encoding failed: {e}")))?;
    }

    Ok(buffer)
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

// API response types

#[derive(Debug, Deserialize)]
struct WhisperResponse {
    text: String,
    #[serde(default)]
    segments: Option<Vec<WhisperSegment>>,
    #[serde(default)]
    duration: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct WhisperSegment {
    start: f64,
    end: f64,
    text: String,
}

#[derive(Debug, Deserialize)]
struct ApiErrorResponse {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    message: String,
    r#type: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_segments() {
        let response: WhisperResponse = serde_json::from_str(
            r#"{
                "text": "Hello world. How are you?",
                "language": "english",
                "duration": 4.0,
                "segments": [
                    {"id": 0, "start": 0.0, "end": 2.0, "text": " Hello world."},
                    {"id": 1, "start": 2.5, "end": 4.0, "text": " How are you?"}
                ]
            }"#,
        )
        .unwrap();

        let segments = parse_segments(response);
        assert_eq!(segments.len(), 2);
        assert_eq!(segments[1].start_secs, 2.5);
        assert_eq!(segments[1].text, " How are you?");
    }

    #[test]
    fn test_parse_segments_fallback() {
        let response = WhisperResponse {
            text: "Hello world".to_string(),
            segments: None,
            duration: Some(2.0),
        };
        let segments = parse_segments(response);
        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0].end_secs, 2.0);

        let silent = WhisperResponse {
            text: String::new(),
            segments: None,
            duration: Some(2.0),
        };
        assert!(parse_segments(silent).is_empty());
    }

    #[test]
    fn test_encode_wav_round_trips_through_hound() {
        let samples = vec![0.0, 0.5, -0.5, 1.5];
        let bytes = encode_wav(&samples, 16_000).unwrap();

        let reader = hound::WavReader::new(Cursor::new(bytes)).unwrap();
        assert_eq!(reader.spec().sample_rate, 16_000);
        assert_eq!(reader.spec().channels, 1);
        let decoded: Vec<i16> = reader.into_samples::<i16>().map(|s| s.unwrap()).collect();
        assert_eq!(decoded, vec![0, 16383, -16383, i16::MAX]);
    }

    #[test]
    fn test_truncate_respects_char_boundaries() {
        assert_eq!(truncate("héllo", 2), "hé");
        assert_eq!(truncate("hi", 10), "hi");
    }
}
