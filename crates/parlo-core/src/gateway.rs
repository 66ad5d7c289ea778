//! Capability traits over the downstream AI providers.
//!
//! The orchestrator composes these four seams and does not care which vendor
//! backs them. Retry and concurrency limiting belong inside the gateway
//! implementations, never in the orchestrator.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::message::ChatMessage;

/// A single completion request.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub messages: Vec<ChatMessage>,
    /// Model override (None = use the provider default).
    pub model: Option<String>,
    pub max_tokens: u32,
    pub temperature: f32,
}

impl Default for CompletionRequest {
    fn default() -> Self {
        Self {
            messages: Vec::new(),
            model: None,
            max_tokens: 256,
            temperature: 0.7,
        }
    }
}

/// Chat completion capability: an ordered message context in, generated text out.
///
/// Implementations must bound the number of in-flight upstream requests and
/// fail with `UpstreamUnavailable` on network/timeout errors or
/// `InvalidUpstreamResponse` when the provider returns no usable text.
#[async_trait]
pub trait CompletionGateway: Send + Sync {
    /// Provider name (e.g., "openrouter", "ollama").
    fn name(&self) -> &str;

    /// Send a completion request and return the generated text.
    async fn complete(&self, request: CompletionRequest) -> Result<String>;
}

/// Translation capability. Fails with `TranslationFailed`.
#[async_trait]
pub trait TranslationGateway: Send + Sync {
    async fn translate(&self, source_text: &str) -> Result<String>;
}

/// Text-to-speech capability. Returns validated audio bytes (MP3);
/// fails with `SynthesisFailed` when the output is empty or malformed.
#[async_trait]
pub trait SpeechGateway: Send + Sync {
    async fn synthesize(&self, text: &str) -> Result<Vec<u8>>;
}

/// Speech-to-text capability for the audio input route.
/// Fails with `TranscriptionFailed`.
#[async_trait]
pub trait TranscriptionGateway: Send + Sync {
    /// Transcribe an audio buffer. `format` is the container hint ("webm", "mp3", ...).
    async fn transcribe(&self, audio: &[u8], format: &str) -> Result<String>;
}

/// Connection settings for a completion provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(default = "default_model")]
    pub model: String,
    pub api_key: Option<String>,
    pub api_base: Option<String>,
    /// Per-request timeout, seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Ceiling on concurrent in-flight upstream requests.
    #[serde(default = "default_max_in_flight")]
    pub max_in_flight: usize,
    /// Total attempts per request (1 = no retry). Transport errors only.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: usize,
}

fn default_model() -> String {
    "deepseek/deepseek-chat".to_string()
}

fn default_timeout_secs() -> u64 {
    10
}

fn default_max_in_flight() -> usize {
    3
}

fn default_max_attempts() -> usize {
    2
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            model: default_model(),
            api_key: None,
            api_base: None,
            timeout_secs: default_timeout_secs(),
            max_in_flight: default_max_in_flight(),
            max_attempts: default_max_attempts(),
        }
    }
}
