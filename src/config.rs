use crate::error::{AudiosubError, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Upper bound on extra attempts per window.
pub const MAX_RETRIES: u32 = 10;

/// Shortest window that still spans distinct millisecond timestamps.
pub const MIN_WINDOW_SECS: f64 = 0.01;

/// Which recognition backend produces the text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    /// OpenAI Whisper HTTP API.
    #[default]
    Whisper,
    /// Local whisper.cpp model.
    Local,
}

impl std::fmt::Display for Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Provider::Whisper => write!(f, "whisper"),
            Provider::Local => write!(f, "local"),
        }
    }
}

impl std::str::FromStr for Provider {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "whisper" => Ok(Provider::Whisper),
            "local" => Ok(Provider::Local),
            _ => Err(format!("Unknown provider: {}. Use 'whisper' or 'local'", s)),
        }
    }
}

/// How audio is split before recognition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Fixed-length windows, one recognition call each.
    #[default]
    Windowed,
    /// One whole-file call; the engine returns its own segments.
    Native,
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Mode::Windowed => write!(f, "windowed"),
            Mode::Native => write!(f, "native"),
        }
    }
}

impl std::str::FromStr for Mode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "windowed" => Ok(Mode::Windowed),
            "native" => Ok(Mode::Native),
            _ => Err(format!("Unknown mode: {}. Use 'windowed' or 'native'", s)),
        }
    }
}

/// Audio decoding backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DecoderKind {
    #[default]
    Native,
    Ffmpeg,
}

impl std::fmt::Display for DecoderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DecoderKind::Native => write!(f, "native"),
            DecoderKind::Ffmpeg => write!(f, "ffmpeg"),
        }
    }
}

impl std::str::FromStr for DecoderKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "native" => Ok(DecoderKind::Native),
            "ffmpeg" => Ok(DecoderKind::Ffmpeg),
            _ => Err(format!("Unknown decoder: {}. Use 'native' or 'ffmpeg'", s)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub openai_api_key: Option<String>,
    pub provider: Provider,
    pub mode: Mode,
    pub decoder: DecoderKind,
    /// Fixed window length in seconds.
    pub window_secs: f64,
    pub concurrency: usize,
    /// Extra attempts after an engine error, per window.
    pub max_retries: u32,
    /// Skip engine calls for windows quieter than the calibrated threshold.
    pub skip_silence: bool,
    pub language: Option<String>,
    pub model_path: Option<PathBuf>,
    pub request_timeout_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            openai_api_key: None,
            provider: Provider::default(),
            mode: Mode::default(),
            decoder: DecoderKind::default(),
            window_secs: 5.0,
            concurrency: 4,
            max_retries: 1,
            skip_silence: false,
            language: None,
            model_path: None,
            request_timeout_secs: 60,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let mut config = Self::default();

        if let Some(config_path) = Self::config_file_path() {
            if config_path.exists() {
                let contents = std::fs::read_to_string(&config_path)?;
                config = toml::from_str::<Config>(&contents)?;
            }
        }

        config.apply_env();
        Ok(config)
    }

    fn apply_env(&mut self) {
        if let Ok(key) = std::env::var("OPENAI_API_KEY") {
            self.openai_api_key = Some(key);
        }
        if let Ok(provider) = std::env::var("AUDIOSUB_PROVIDER") {
            if let Ok(p) = provider.parse() {
                self.provider = p;
            }
        }
        if let Ok(mode) = std::env::var("AUDIOSUB_MODE") {
            if let Ok(m) = mode.parse() {
                self.mode = m;
            }
        }
        if let Ok(decoder) = std::env::var("AUDIOSUB_DECODER") {
            if let Ok(d) = decoder.parse() {
                self.decoder = d;
            }
        }
        if let Ok(window) = std::env::var("AUDIOSUB_WINDOW_SECS") {
            if let Ok(w) = window.parse() {
                self.window_secs = w;
            }
        }
        if let Ok(concurrency) = std::env::var("AUDIOSUB_CONCURRENCY") {
            if let Ok(c) = concurrency.parse() {
                self.concurrency = c;
            }
        }
        if let Ok(retries) = std::env::var("AUDIOSUB_MAX_RETRIES") {
            if let Ok(r) = retries.parse() {
                self.max_retries = r;
            }
        }
        if let Ok(path) = std::env::var("AUDIOSUB_MODEL_PATH") {
            self.model_path = Some(PathBuf::from(path));
        }
    }

    pub fn validate(&self) -> Result<()> {
        match self.provider {
            Provider::Whisper => {
                if self.openai_api_key.is_none() {
                    return Err(AudiosubError::Config(
                        "OPENAI_API_KEY not set. Export it with: export OPENAI_API_KEY=sk-..."
                            .to_string(),
                    ));
                }
            }
            Provider::Local => {
                if self.model_path.is_none() {
                    return Err(AudiosubError::Config(
                        "No model path set. Use --model or AUDIOSUB_MODEL_PATH".to_string(),
                    ));
                }
            }
        }

        if self.concurrency == 0 {
            return Err(AudiosubError::Config(
                "Concurrency must be greater than 0".to_string(),
            ));
        }

        if !self.window_secs.is_finite() || self.window_secs < MIN_WINDOW_SECS {
            return Err(AudiosubError::Config(format!(
                "Window length must be at least {} seconds, got {}",
                MIN_WINDOW_SECS, self.window_secs
            )));
        }

        if self.max_retries > MAX_RETRIES {
            return Err(AudiosubError::Config(format!(
                "max_retries must be at most {}, got {}",
                MAX_RETRIES, self.max_retries
            )));
        }

        Ok(())
    }

    fn config_file_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("audiosub").join("config.toml"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_parsing() {
        assert_eq!("whisper".parse::<Provider>().unwrap(), Provider::Whisper);
        assert_eq!("LOCAL".parse::<Provider>().unwrap(), Provider::Local);
        assert!("google".parse::<Provider>().is_err());
    }

    #[test]
    fn test_mode_and_decoder_parsing() {
        assert_eq!("native".parse::<Mode>().unwrap(), Mode::Native);
        assert_eq!("Windowed".parse::<Mode>().unwrap(), Mode::Windowed);
        assert!("streaming".parse::<Mode>().is_err());
        assert_eq!("ffmpeg".parse::<DecoderKind>().unwrap(), DecoderKind::Ffmpeg);
        assert!("gstreamer".parse::<DecoderKind>().is_err());
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.provider, Provider::Whisper);
        assert_eq!(config.mode, Mode::Windowed);
        assert_eq!(config.window_secs, 5.0);
        assert_eq!(config.concurrency, 4);
        assert_eq!(config.max_retries, 1);
        assert!(!config.skip_silence);
    }

    #[test]
    fn test_validate_missing_api_key() {
        let config = Config::default();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_local_needs_model() {
        let mut config = Config {
            provider: Provider::Local,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        config.model_path = Some(PathBuf::from("/models/ggml-base.en.bin"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_window_and_concurrency() {
        let mut config = Config {
            openai_api_key: Some("sk-test".to_string()),
            ..Default::default()
        };
        assert!(config.validate().is_ok());

        config.window_secs = 0.0;
        assert!(config.validate().is_err());

        config.window_secs = f64::NAN;
        assert!(config.validate().is_err());

        config.window_secs = 0.001;
        assert!(config.validate().is_err());

        config.window_secs = 5.0;
        config.concurrency = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_retry_limit() {
        let mut config = Config {
            openai_api_key: Some("sk-test".to_string()),
            max_retries: MAX_RETRIES,
            ..Default::default()
        };
        assert!(config.validate().is_ok());

        config.max_retries = 40;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: Config = toml::from_str("window_secs = 10.0\nmode = \"native\"").unwrap();
        assert_eq!(config.window_secs, 10.0);
        assert_eq!(config.mode, Mode::Native);
        assert_eq!(config.concurrency, 4);
    }
}
