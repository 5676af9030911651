use thiserror::Error;

#[derive(Error, Debug)]
pub enum AudiosubError {
    #[error("Audio decoding failed: {0}")]
    Decode(String),

    #[error("Unsupported audio format: {0}")]
    UnsupportedFormat(String),

    #[error("Invalid timestamp: {0}")]
    InvalidTimestamp(String),

    #[error("Subtitle assembly invariant violated: {0}")]
    AssemblyInvariant(String),

    #[error("Transcription engine error: {0}")]
    Engine(String),

    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Conversion cancelled")]
    Cancelled,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Config file error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl AudiosubError {
    /// Whether this error aborts a conversion before any subtitle output exists.
    pub fn is_decode_failure(&self) -> bool {
        matches!(
            self,
            AudiosubError::Decode(_) | AudiosubError::UnsupportedFormat(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, AudiosubError>;
