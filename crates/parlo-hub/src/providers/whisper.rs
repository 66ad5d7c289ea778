//! Speech-to-text via a Whisper-compatible transcription endpoint.

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use parlo_core::config::SttConfig;
use parlo_core::error::{ParloError, Result};
use parlo_core::gateway::TranscriptionGateway;

/// Whisper-compatible transcription client (OpenAI `/audio/transcriptions`).
pub struct WhisperTranscriber {
    client: Client,
    config: SttConfig,
    api_url: String,
}

#[derive(Debug, Deserialize)]
struct TranscriptionResponse {
    text: String,
}

impl WhisperTranscriber {
    pub fn new(config: SttConfig) -> Self {
        let api_base = config
            .api_base
            .clone()
            .unwrap_or_else(|| "https://api.openai.com/v1".to_string());
        let api_url = format!("{}/audio/transcriptions", api_base.trim_end_matches('/'));

        Self {
            client: Client::builder()
                .timeout(std::time::Duration::from_secs(60))
                .connect_timeout(std::time::Duration::from_secs(10))
                .build()
                .unwrap_or_default(),
            config,
            api_url,
        }
    }

    fn mime_type(format: &str) -> &'static str {
        match format.to_lowercase().as_str() {
            "mp3" => "audio/mpeg",
            "wav" => "audio/wav",
            "m4a" => "audio/m4a",
            "ogg" | "oga" => "audio/ogg",
            "flac" => "audio/flac",
            // Browser MediaRecorder default.
            _ => "audio/webm",
        }
    }
}

#[async_trait]
impl TranscriptionGateway for WhisperTranscriber {
    async fn transcribe(&self, audio: &[u8], format: &str) -> Result<String> {
        if audio.is_empty() {
            return Err(ParloError::TranscriptionFailed(
                "Empty audio buffer".to_string(),
            ));
        }

        let extension = format.to_lowercase();
        let part = Part::bytes(audio.to_vec())
            .file_name(format!("audio.{extension}"))
            .mime_str(Self::mime_type(format))
            .map_err(|e| ParloError::TranscriptionFailed(e.to_string()))?;

        let mut form = Form::new()
            .text("model", self.config.model.clone())
            .part("file", part);
        if let Some(language) = &self.config.language {
            form = form.text("language", language.clone());
        }

        let resp = self
            .client
            .post(&self.api_url)
            .header("Authorization", format!("Bearer {}", self.config.api_key))
            .multipart(form)
            .send()
            .await
            .map_err(|e| ParloError::TranscriptionFailed(e.to_string()))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let detail = resp.text().await.unwrap_or_default();
            return Err(ParloError::TranscriptionFailed(format!(
                "Transcription endpoint returned {}: {}",
                status,
                &detail[..detail.len().min(200)]
            )));
        }

        let parsed: TranscriptionResponse = resp
            .json()
            .await
            .map_err(|e| ParloError::TranscriptionFailed(e.to_string()))?;

        if parsed.text.trim().is_empty() {
            return Err(ParloError::TranscriptionFailed(
                "Transcript was empty".to_string(),
            ));
        }

        debug!("Transcribed {} bytes into {} chars", audio.len(), parsed.text.len());
        Ok(parsed.text.trim().to_string())
    }
}
