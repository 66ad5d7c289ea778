//! OpenAI-compatible completion gateway — works with OpenRouter, OpenAI,
//! Ollama, and anything else speaking the chat completions format.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

use parlo_core::error::{ParloError, Result};
use parlo_core::gateway::{CompletionGateway, CompletionRequest, ProviderConfig};
use parlo_core::message::{ChatMessage, TokenUsage};

/// OpenAI-compatible chat completions client.
///
/// Owns the concurrency ceiling for the upstream: at most
/// `config.max_in_flight` requests run at once, excess callers queue on the
/// semaphore until a permit frees up. Retries are bounded
/// (`config.max_attempts`) and cover unavailable-class failures only; a
/// response that parsed but carried no usable text is never retried.
pub struct OpenAiCompletion {
    client: Client,
    config: ProviderConfig,
    api_url: String,
    permits: Semaphore,
}

impl OpenAiCompletion {
    pub fn new(config: ProviderConfig) -> Self {
        let api_base = config
            .api_base
            .clone()
            .unwrap_or_else(|| "https://openrouter.ai/api/v1".to_string());
        let api_url = format!("{}/chat/completions", api_base.trim_end_matches('/'));
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()
            .unwrap_or_default();
        let permits = Semaphore::new(config.max_in_flight.max(1));

        Self {
            client,
            config,
            api_url,
            permits,
        }
    }

    /// Create a gateway for OpenRouter.
    pub fn openrouter(api_key: &str, model: &str) -> Self {
        Self::new(ProviderConfig {
            model: model.to_string(),
            api_key: Some(api_key.to_string()),
            ..Default::default()
        })
    }

    /// Create a gateway for a local Ollama instance.
    pub fn ollama(model: &str) -> Self {
        Self::new(ProviderConfig {
            model: model.to_string(),
            api_key: Some("ollama".to_string()),
            api_base: Some("http://localhost:11434/v1".to_string()),
            ..Default::default()
        })
    }

    async fn request_once(&self, body: &ApiRequest) -> Result<String> {
        let api_key = self.config.api_key.as_deref().unwrap_or("");

        let resp = self
            .client
            .post(&self.api_url)
            .header("Authorization", format!("Bearer {}", api_key))
            .header("Content-Type", "application/json")
            .json(body)
            .send()
            .await
            .map_err(|e| ParloError::UpstreamUnavailable(e.to_string()))?;

        let status = resp.status();
        let body_text = resp
            .text()
            .await
            .map_err(|e| ParloError::UpstreamUnavailable(e.to_string()))?;

        debug!("API response status: {}, body length: {}", status, body_text.len());

        if !status.is_success() {
            let detail = serde_json::from_str::<ApiError>(&body_text)
                .map(|err| err.error.message)
                .unwrap_or_else(|_| body_text[..body_text.len().min(200)].to_string());
            return Err(ParloError::UpstreamUnavailable(format!(
                "{} ({}): {}",
                self.api_url, status, detail
            )));
        }

        let api_resp: ApiResponse = serde_json::from_str(&body_text).map_err(|e| {
            ParloError::InvalidUpstreamResponse(format!(
                "Failed to parse response: {} — body: {}",
                e,
                &body_text[..body_text.len().min(200)]
            ))
        })?;

        if let Some(usage) = &api_resp.usage {
            debug!(
                "Token usage: prompt={}, completion={}, total={}",
                usage.prompt_tokens, usage.completion_tokens, usage.total_tokens
            );
        }

        let content = api_resp
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .unwrap_or_default();

        if content.trim().is_empty() {
            return Err(ParloError::InvalidUpstreamResponse(
                "No text in completion choices".to_string(),
            ));
        }

        Ok(content)
    }
}

/// Request body in the chat completions format.
#[derive(Serialize)]
struct ApiRequest {
    model: String,
    messages: Vec<ChatMessage>,
    max_tokens: u32,
    temperature: f32,
    presence_penalty: f32,
    frequency_penalty: f32,
}

#[derive(Deserialize)]
struct ApiResponse {
    choices: Vec<ApiChoice>,
    usage: Option<TokenUsage>,
}

#[derive(Deserialize)]
struct ApiChoice {
    message: ApiMessage,
}

#[derive(Deserialize)]
struct ApiMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct ApiError {
    error: ApiErrorDetail,
}

#[derive(Deserialize)]
struct ApiErrorDetail {
    message: String,
}

#[async_trait]
impl CompletionGateway for OpenAiCompletion {
    fn name(&self) -> &str {
        "openai-compatible"
    }

    async fn complete(&self, request: CompletionRequest) -> Result<String> {
        let model = request.model.unwrap_or_else(|| self.config.model.clone());

        let body = ApiRequest {
            model: model.clone(),
            messages: request.messages,
            max_tokens: request.max_tokens,
            temperature: request.temperature,
            // Short replies: nudge the model away from repeating itself
            // without rambling to fill the budget.
            presence_penalty: -0.5,
            frequency_penalty: 0.3,
        };

        // Queue here when the in-flight ceiling is reached.
        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|_| ParloError::UpstreamUnavailable("gateway shut down".to_string()))?;

        info!("Calling completion model: {}", model);

        let attempts = self.config.max_attempts.max(1);
        let mut last_err = None;
        for attempt in 1..=attempts {
            match self.request_once(&body).await {
                Ok(text) => return Ok(text),
                Err(e @ ParloError::UpstreamUnavailable(_)) if attempt < attempts => {
                    warn!("Completion attempt {}/{} failed: {}", attempt, attempts, e);
                    last_err = Some(e);
                }
                Err(e) => return Err(e),
            }
        }
        Err(last_err
            .unwrap_or_else(|| ParloError::UpstreamUnavailable("no attempts made".to_string())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parses_a_completion_response() {
        let body = r#"{
            "choices": [{"message": {"role": "assistant", "content": "Bom dia!"}}],
            "model": "deepseek/deepseek-chat",
            "usage": {"prompt_tokens": 42, "completion_tokens": 5, "total_tokens": 47}
        }"#;
        let resp: ApiResponse = serde_json::from_str(body).unwrap();
        assert_eq!(
            resp.choices[0].message.content.as_deref(),
            Some("Bom dia!")
        );
        assert_eq!(resp.usage.unwrap().total_tokens, 47);
    }

    #[test]
    fn test_serializes_roles_lowercase() {
        let body = ApiRequest {
            model: "m".to_string(),
            messages: vec![ChatMessage::system("s"), ChatMessage::user("u")],
            max_tokens: 50,
            temperature: 0.5,
            presence_penalty: -0.5,
            frequency_penalty: 0.3,
        };
        let json = serde_json::to_string(&body).unwrap();
        assert!(json.contains(r#""role":"system""#));
        assert!(json.contains(r#""role":"user""#));
    }
}
