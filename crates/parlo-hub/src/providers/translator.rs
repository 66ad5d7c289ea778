//! Translation gateway backed by a completion gateway.
//!
//! The original deployment had no dedicated translation API; it asked the
//! same chat model to translate. Any completion gateway works.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use parlo_core::error::{ParloError, Result};
use parlo_core::gateway::{CompletionGateway, CompletionRequest, TranslationGateway};
use parlo_core::message::ChatMessage;

/// Translates via the completion provider.
pub struct LlmTranslator {
    completion: Arc<dyn CompletionGateway>,
    source_language: String,
    target_language: String,
}

impl LlmTranslator {
    /// Brazilian Portuguese → English, the default pairing.
    pub fn new(completion: Arc<dyn CompletionGateway>) -> Self {
        Self::with_languages(completion, "Brazilian Portuguese", "English")
    }

    pub fn with_languages(
        completion: Arc<dyn CompletionGateway>,
        source_language: &str,
        target_language: &str,
    ) -> Self {
        Self {
            completion,
            source_language: source_language.to_string(),
            target_language: target_language.to_string(),
        }
    }

    fn system_prompt(&self) -> String {
        format!(
            "You are a {} to {} translator. Translate the text you are given to {}. \
             Respond with the translation only, nothing else.",
            self.source_language, self.target_language, self.target_language
        )
    }
}

#[async_trait]
impl TranslationGateway for LlmTranslator {
    async fn translate(&self, source_text: &str) -> Result<String> {
        let request = CompletionRequest {
            messages: vec![
                ChatMessage::system(&self.system_prompt()),
                ChatMessage::user(source_text),
            ],
            model: None,
            max_tokens: 256,
            temperature: 0.0,
        };

        let translated = self
            .completion
            .complete(request)
            .await
            .map_err(|e| ParloError::TranslationFailed(e.to_string()))?;

        debug!(
            "Translated {} chars into {} chars",
            source_text.len(),
            translated.len()
        );
        Ok(translated.trim().to_string())
    }
}
