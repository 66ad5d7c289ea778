//! Error types for Parlo.

use thiserror::Error;

/// Core error type for all Parlo operations.
#[derive(Error, Debug)]
pub enum ParloError {
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Unknown scenario: {0}")]
    UnknownScenario(String),

    #[error("Completion provider unavailable: {0}")]
    UpstreamUnavailable(String),

    #[error("Completion provider returned no usable text: {0}")]
    InvalidUpstreamResponse(String),

    #[error("Translation failed: {0}")]
    TranslationFailed(String),

    #[error("Speech synthesis failed: {0}")]
    SynthesisFailed(String),

    #[error("Transcription failed: {0}")]
    TranscriptionFailed(String),

    /// Umbrella for a `converse` call that failed downstream, carrying the cause.
    #[error("Conversation failed: {0}")]
    Conversation(#[source] Box<ParloError>),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ParloError {
    /// Wrap a downstream failure in the `Conversation` umbrella.
    pub fn conversation(cause: ParloError) -> Self {
        Self::Conversation(Box::new(cause))
    }

    /// True when the failure is the caller's fault (bad input) rather than an
    /// upstream outage. Drives the 4xx/5xx split in the transport layer.
    pub fn is_caller_error(&self) -> bool {
        match self {
            Self::InvalidRequest(_) | Self::UnknownScenario(_) => true,
            Self::Conversation(cause) => cause.is_caller_error(),
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, ParloError>;
