//! Speech synthesis via the public Google Translate TTS endpoint.
//!
//! The endpoint caps input around 200 characters per request, so longer text
//! is split on word boundaries and the MP3 chunks are concatenated — players
//! treat back-to-back MP3 frame streams as one clip.

use async_trait::async_trait;
use reqwest::Client;
use tracing::debug;

use parlo_core::error::{ParloError, Result};
use parlo_core::gateway::SpeechGateway;
use parlo_core::speech::looks_like_mp3;

const TTS_URL: &str = "https://translate.google.com/translate_tts";
const MAX_CHUNK_CHARS: usize = 200;

/// Google Translate TTS client.
pub struct GoogleTts {
    client: Client,
    language: String,
}

impl GoogleTts {
    pub fn new(language: &str) -> Self {
        Self {
            client: Client::builder()
                .timeout(std::time::Duration::from_secs(10))
                .build()
                .unwrap_or_default(),
            language: language.to_string(),
        }
    }

    async fn fetch_chunk(&self, text: &str, idx: usize, total: usize) -> Result<Vec<u8>> {
        let idx = idx.to_string();
        let total = total.to_string();
        let textlen = text.chars().count().to_string();
        let resp = self
            .client
            .get(TTS_URL)
            .query(&[
                ("ie", "UTF-8"),
                ("client", "tw-ob"),
                ("tl", self.language.as_str()),
                ("q", text),
                ("idx", idx.as_str()),
                ("total", total.as_str()),
                ("textlen", textlen.as_str()),
            ])
            .send()
            .await
            .map_err(|e| ParloError::SynthesisFailed(e.to_string()))?;

        if !resp.status().is_success() {
            return Err(ParloError::SynthesisFailed(format!(
                "TTS endpoint returned {}",
                resp.status()
            )));
        }

        let bytes = resp
            .bytes()
            .await
            .map_err(|e| ParloError::SynthesisFailed(e.to_string()))?;
        Ok(bytes.to_vec())
    }
}

/// Split text into word-boundary chunks of at most `max_chars` characters.
/// A single word longer than the limit becomes its own chunk.
fn chunk_text(text: &str, max_chars: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::new();
    for word in text.split_whitespace() {
        let needed = if current.is_empty() {
            word.chars().count()
        } else {
            current.chars().count() + 1 + word.chars().count()
        };
        if needed > max_chars && !current.is_empty() {
            chunks.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(word);
    }
    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

#[async_trait]
impl SpeechGateway for GoogleTts {
    async fn synthesize(&self, text: &str) -> Result<Vec<u8>> {
        if text.trim().is_empty() {
            return Err(ParloError::SynthesisFailed(
                "Nothing to synthesize".to_string(),
            ));
        }

        let chunks = chunk_text(text, MAX_CHUNK_CHARS);
        let total = chunks.len();
        let mut audio = Vec::new();
        for (idx, chunk) in chunks.iter().enumerate() {
            audio.extend(self.fetch_chunk(chunk, idx, total).await?);
        }

        if audio.is_empty() || !looks_like_mp3(&audio) {
            return Err(ParloError::SynthesisFailed(
                "TTS endpoint returned malformed audio".to_string(),
            ));
        }

        debug!("Synthesized {} bytes from {} chunk(s)", audio.len(), total);
        Ok(audio)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_text_is_one_chunk() {
        assert_eq!(chunk_text("bom dia", 200), vec!["bom dia"]);
    }

    #[test]
    fn test_long_text_splits_on_word_boundaries() {
        let chunks = chunk_text("um dois tres quatro", 9);
        assert_eq!(chunks, vec!["um dois", "tres", "quatro"]);
    }

    #[test]
    fn test_oversized_word_becomes_its_own_chunk() {
        let chunks = chunk_text("ab supercalifragilistico cd", 10);
        assert_eq!(chunks, vec!["ab", "supercalifragilistico", "cd"]);
    }
}
