//! Configuration management for Parlo.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::cache::CacheSettings;
use crate::error::{ParloError, Result};
use crate::gateway::ProviderConfig;
use crate::orchestrator::ConverseSettings;
use crate::session::SessionSettings;

/// Top-level Parlo configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ParloConfig {
    /// Completion provider connection settings.
    #[serde(default)]
    pub provider: ProviderConfig,

    /// Generation parameters and degradation policy.
    #[serde(default)]
    pub conversation: ConverseSettings,

    /// Session history and expiry bounds.
    #[serde(default)]
    pub session: SessionSettings,

    /// Response cache bounds.
    #[serde(default)]
    pub cache: CacheSettings,

    /// Speech synthesis settings.
    #[serde(default)]
    pub speech: SpeechSettings,

    /// Speech-to-text provider (None = audio input route disabled).
    pub stt: Option<SttConfig>,

    /// HTTP server settings.
    #[serde(default)]
    pub server: ServerSettings,
}

/// Target voice for synthesis.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpeechSettings {
    /// BCP-47-ish language tag passed to the TTS backend.
    #[serde(default = "default_speech_language")]
    pub language: String,
}

fn default_speech_language() -> String {
    "pt".to_string()
}

impl Default for SpeechSettings {
    fn default() -> Self {
        Self {
            language: default_speech_language(),
        }
    }
}

/// Whisper-compatible speech-to-text settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SttConfig {
    pub api_key: String,
    #[serde(default = "default_stt_model")]
    pub model: String,
    pub api_base: Option<String>,
    /// Language hint for the transcriber.
    pub language: Option<String>,
}

fn default_stt_model() -> String {
    "whisper-1".to_string()
}

/// Bind address for the REST API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSettings {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8080
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl ParloConfig {
    /// Load config from a TOML file. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)
            .map_err(|e| ParloError::Config(format!("Failed to read config: {}", e)))?;
        toml::from_str(&content)
            .map_err(|e| ParloError::Config(format!("Failed to parse config: {}", e)))
    }

    /// Save config to a TOML file.
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| ParloError::Config(format!("Failed to serialize config: {}", e)))?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Get the default config file path.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("parlo")
            .join("config.toml")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orchestrator::DegradationPolicy;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config: ParloConfig = toml::from_str("").unwrap();
        assert_eq!(config.session.max_history, 10);
        assert_eq!(config.cache.capacity, 1000);
        assert_eq!(config.speech.language, "pt");
        assert_eq!(config.conversation.degradation, DegradationPolicy::Partial);
        assert!(config.stt.is_none());
    }

    #[test]
    fn test_partial_config_overrides_sections() {
        let config: ParloConfig = toml::from_str(
            r#"
            [provider]
            model = "openai/gpt-4o-mini"
            max_in_flight = 5

            [conversation]
            degradation = "strict"
            max_tokens = 80

            [session]
            max_history = 6
            "#,
        )
        .unwrap();
        assert_eq!(config.provider.model, "openai/gpt-4o-mini");
        assert_eq!(config.provider.max_in_flight, 5);
        assert_eq!(config.conversation.degradation, DegradationPolicy::Strict);
        assert_eq!(config.conversation.max_tokens, 80);
        assert_eq!(config.session.max_history, 6);
        assert_eq!(config.session.context_timeout_secs, 30 * 60);
    }
}
