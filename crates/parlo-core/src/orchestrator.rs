//! Conversation orchestrator — the single `converse` pass.
//!
//! One call is one pass: resolve the scenario policy, build the message
//! context, get the completion, then translate and synthesize concurrently.
//! The completion strictly precedes translation/synthesis; those two have no
//! ordering between them.

use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::cache::ResponseCache;
use crate::error::{ParloError, Result};
use crate::gateway::{CompletionGateway, CompletionRequest, SpeechGateway, TranslationGateway};
use crate::message::{ChatMessage, Role};
use crate::scenario::{ConversationState, ScenarioCatalog};
use crate::session::SessionContextStore;
use crate::speech::sanitize_for_speech;

/// What to do when translation or synthesis fails after a good completion.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DegradationPolicy {
    /// Fail the whole call.
    Strict,
    /// Return the successful parts, mark the reply degraded.
    #[default]
    Partial,
}

/// Generation parameters and the degradation policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConverseSettings {
    /// Model override passed to the completion gateway (None = provider default).
    pub model: Option<String>,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default)]
    pub degradation: DegradationPolicy,
}

fn default_max_tokens() -> u32 {
    50
}

fn default_temperature() -> f32 {
    0.5
}

impl Default for ConverseSettings {
    fn default() -> Self {
        Self {
            model: None,
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
            degradation: DegradationPolicy::default(),
        }
    }
}

/// Composite result of one `converse` pass.
#[derive(Debug, Clone, PartialEq)]
pub struct ConverseReply {
    /// The assistant's reply in the practice language.
    pub text: String,
    pub translation: Option<String>,
    /// MP3 bytes, when synthesis succeeded.
    pub audio: Option<Vec<u8>>,
    /// True when a Partial-policy reply is missing translation or audio.
    pub degraded: bool,
}

/// Composes catalog, gateways, session store, and cache into `converse`.
pub struct Orchestrator {
    catalog: ScenarioCatalog,
    completion: Arc<dyn CompletionGateway>,
    translation: Arc<dyn TranslationGateway>,
    speech: Arc<dyn SpeechGateway>,
    sessions: SessionContextStore,
    cache: ResponseCache<ConverseReply>,
    settings: ConverseSettings,
}

impl Orchestrator {
    pub fn new(
        catalog: ScenarioCatalog,
        completion: Arc<dyn CompletionGateway>,
        translation: Arc<dyn TranslationGateway>,
        speech: Arc<dyn SpeechGateway>,
        sessions: SessionContextStore,
        cache: ResponseCache<ConverseReply>,
        settings: ConverseSettings,
    ) -> Self {
        Self {
            catalog,
            completion,
            translation,
            speech,
            sessions,
            cache,
            settings,
        }
    }

    /// Run one conversation turn.
    pub async fn converse(
        &self,
        session_id: &str,
        scenario_id: &str,
        user_text: &str,
    ) -> Result<ConverseReply> {
        if session_id.trim().is_empty() {
            return Err(ParloError::InvalidRequest("session id must not be empty".into()));
        }
        if scenario_id.trim().is_empty() {
            return Err(ParloError::InvalidRequest("scenario must not be empty".into()));
        }
        if user_text.trim().is_empty() {
            return Err(ParloError::InvalidRequest("message must not be empty".into()));
        }
        let policy = self.catalog.resolve(scenario_id)?;

        let now = Utc::now();
        self.sessions.sweep_expired(now);

        // One pass at a time per session; a double-submit waits here.
        let guard = self.sessions.guard(session_id);
        let _serialized = guard.lock().await;

        let context = self.sessions.get_or_create(session_id, scenario_id, now);
        let state = if context.history.is_empty() {
            ConversationState::Start
        } else {
            ConversationState::Continue
        };

        // Fresh cache hit short-circuits all three gateway calls. The turns
        // are still recorded so the next call sees a coherent history.
        if let Some(hit) = self.cache.lookup(scenario_id, user_text, now) {
            debug!(session = session_id, scenario = scenario_id, "Cache hit");
            self.sessions.append_turn(session_id, Role::User, user_text, now);
            self.sessions.append_turn(session_id, Role::Assistant, &hit.text, now);
            return Ok(hit);
        }

        let mut messages = Vec::with_capacity(context.history.len() + 2);
        messages.push(ChatMessage::system(policy.system_prompt(state)));
        messages.extend(context.history);
        messages.push(ChatMessage::user(user_text));

        let request = CompletionRequest {
            messages,
            model: self.settings.model.clone(),
            max_tokens: self.settings.max_tokens,
            temperature: self.settings.temperature,
        };

        let text = self
            .completion
            .complete(request)
            .await
            .map_err(ParloError::conversation)?;

        let speech_text = sanitize_for_speech(&text);
        let (translation, audio) = futures::join!(
            self.translation.translate(&text),
            self.speech.synthesize(&speech_text),
        );

        let reply = match self.settings.degradation {
            DegradationPolicy::Strict => ConverseReply {
                text: text.clone(),
                translation: Some(translation.map_err(ParloError::conversation)?),
                audio: Some(audio.map_err(ParloError::conversation)?),
                degraded: false,
            },
            DegradationPolicy::Partial => {
                let translation = match translation {
                    Ok(t) => Some(t),
                    Err(e) => {
                        warn!(session = session_id, "Translation degraded: {}", e);
                        None
                    }
                };
                let audio = match audio {
                    Ok(a) => Some(a),
                    Err(e) => {
                        warn!(session = session_id, "Synthesis degraded: {}", e);
                        None
                    }
                };
                let degraded = translation.is_none() || audio.is_none();
                ConverseReply {
                    text: text.clone(),
                    translation,
                    audio,
                    degraded,
                }
            }
        };

        self.sessions.append_turn(session_id, Role::User, user_text, now);
        self.sessions.append_turn(session_id, Role::Assistant, &text, now);

        // Memoize complete replies only; a degraded one would pin its missing
        // part for the whole TTL.
        if !reply.degraded {
            self.cache.store(scenario_id, user_text, reply.clone(), now);
        }

        info!(
            session = session_id,
            scenario = scenario_id,
            degraded = reply.degraded,
            "Turn complete: {} chars",
            reply.text.len()
        );

        Ok(reply)
    }

    /// Drop a session's context immediately.
    pub fn clear_session(&self, session_id: &str) {
        self.sessions.clear(session_id);
        info!(session = session_id, "Session cleared");
    }

    /// Registered scenario ids, for discovery endpoints.
    pub fn scenario_ids(&self) -> Vec<String> {
        self.catalog.ids()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::CacheSettings;
    use crate::scenario::ScenarioPolicy;
    use crate::session::SessionSettings;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    struct MockCompletion {
        requests: Mutex<Vec<CompletionRequest>>,
        reply: String,
        fail: bool,
    }

    impl MockCompletion {
        fn replying(reply: &str) -> Arc<Self> {
            Arc::new(Self {
                requests: Mutex::new(Vec::new()),
                reply: reply.to_string(),
                fail: false,
            })
        }

        fn failing() -> Arc<Self> {
            Arc::new(Self {
                requests: Mutex::new(Vec::new()),
                reply: String::new(),
                fail: true,
            })
        }

        fn calls(&self) -> usize {
            self.requests.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl CompletionGateway for MockCompletion {
        fn name(&self) -> &str {
            "mock"
        }

        async fn complete(&self, request: CompletionRequest) -> Result<String> {
            self.requests.lock().unwrap().push(request);
            if self.fail {
                Err(ParloError::UpstreamUnavailable("mock outage".into()))
            } else {
                Ok(self.reply.clone())
            }
        }
    }

    struct MockTranslation {
        calls: AtomicUsize,
        fail: bool,
    }

    impl MockTranslation {
        fn ok() -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                fail: false,
            })
        }

        fn failing() -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                fail: true,
            })
        }
    }

    #[async_trait]
    impl TranslationGateway for MockTranslation {
        async fn translate(&self, source_text: &str) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                Err(ParloError::TranslationFailed("mock".into()))
            } else {
                Ok(format!("[en] {source_text}"))
            }
        }
    }

    struct MockSpeech {
        texts: Mutex<Vec<String>>,
        fail: bool,
    }

    impl MockSpeech {
        fn ok() -> Arc<Self> {
            Arc::new(Self {
                texts: Mutex::new(Vec::new()),
                fail: false,
            })
        }

        fn failing() -> Arc<Self> {
            Arc::new(Self {
                texts: Mutex::new(Vec::new()),
                fail: true,
            })
        }

        fn calls(&self) -> usize {
            self.texts.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl SpeechGateway for MockSpeech {
        async fn synthesize(&self, text: &str) -> Result<Vec<u8>> {
            self.texts.lock().unwrap().push(text.to_string());
            if self.fail {
                Err(ParloError::SynthesisFailed("mock".into()))
            } else {
                Ok(vec![0xFF, 0xFB, 0x90, 0x00])
            }
        }
    }

    fn orchestrator(
        completion: Arc<MockCompletion>,
        translation: Arc<MockTranslation>,
        speech: Arc<MockSpeech>,
        degradation: DegradationPolicy,
    ) -> Orchestrator {
        Orchestrator::new(
            ScenarioCatalog::with_builtins(),
            completion,
            translation,
            speech,
            SessionContextStore::new(SessionSettings::default()),
            ResponseCache::new(CacheSettings::default()),
            ConverseSettings {
                degradation,
                ..Default::default()
            },
        )
    }

    #[tokio::test]
    async fn test_first_turn_sends_one_start_system_message() {
        let completion = MockCompletion::replying("Bom dia!");
        let orch = orchestrator(
            completion.clone(),
            MockTranslation::ok(),
            MockSpeech::ok(),
            DegradationPolicy::Partial,
        );

        let reply = orch.converse("s1", "restaurant", "Hello").await.unwrap();
        assert_eq!(reply.text, "Bom dia!");
        assert_eq!(reply.translation.as_deref(), Some("[en] Bom dia!"));
        assert!(reply.audio.is_some());
        assert!(!reply.degraded);

        let requests = completion.requests.lock().unwrap();
        let messages = &requests[0].messages;
        let system_count = messages.iter().filter(|m| m.role == Role::System).count();
        assert_eq!(system_count, 1);
        assert_eq!(messages[0].role, Role::System);
        assert_eq!(
            messages[0].content,
            ScenarioPolicy::Restaurant.system_prompt(ConversationState::Start)
        );
        assert_eq!(messages.last().unwrap().content, "Hello");
    }

    #[tokio::test]
    async fn test_second_turn_continues_with_history() {
        let completion = MockCompletion::replying("Pois não?");
        let orch = orchestrator(
            completion.clone(),
            MockTranslation::ok(),
            MockSpeech::ok(),
            DegradationPolicy::Partial,
        );

        orch.converse("s1", "restaurant", "Hello").await.unwrap();
        orch.converse("s1", "restaurant", "More please").await.unwrap();

        let requests = completion.requests.lock().unwrap();
        let messages = &requests[1].messages;
        assert_eq!(
            messages[0].content,
            ScenarioPolicy::Restaurant.system_prompt(ConversationState::Continue)
        );
        // system + prior user/assistant pair + new user turn
        assert_eq!(messages.len(), 4);
        assert!(messages.iter().any(|m| m.role == Role::User && m.content == "Hello"));
        assert!(messages.iter().any(|m| m.role == Role::Assistant && m.content == "Pois não?"));
        assert_eq!(messages.last().unwrap().content, "More please");
    }

    #[tokio::test]
    async fn test_completion_failure_skips_downstream_calls() {
        let translation = MockTranslation::ok();
        let speech = MockSpeech::ok();
        let orch = orchestrator(
            MockCompletion::failing(),
            translation.clone(),
            speech.clone(),
            DegradationPolicy::Partial,
        );

        let err = orch.converse("s1", "restaurant", "Hello").await.unwrap_err();
        match err {
            ParloError::Conversation(cause) => {
                assert!(matches!(*cause, ParloError::UpstreamUnavailable(_)));
            }
            other => panic!("expected Conversation, got {other:?}"),
        }
        assert_eq!(translation.calls.load(Ordering::SeqCst), 0);
        assert_eq!(speech.calls(), 0);
    }

    #[tokio::test]
    async fn test_partial_policy_returns_successful_parts() {
        let orch = orchestrator(
            MockCompletion::replying("Oi!"),
            MockTranslation::failing(),
            MockSpeech::ok(),
            DegradationPolicy::Partial,
        );

        let reply = orch.converse("s1", "restaurant", "Hello").await.unwrap();
        assert_eq!(reply.text, "Oi!");
        assert!(reply.translation.is_none());
        assert!(reply.audio.is_some());
        assert!(reply.degraded);
    }

    #[tokio::test]
    async fn test_strict_policy_fails_the_whole_call() {
        let orch = orchestrator(
            MockCompletion::replying("Oi!"),
            MockTranslation::ok(),
            MockSpeech::failing(),
            DegradationPolicy::Strict,
        );

        let err = orch.converse("s1", "restaurant", "Hello").await.unwrap_err();
        match err {
            ParloError::Conversation(cause) => {
                assert!(matches!(*cause, ParloError::SynthesisFailed(_)));
            }
            other => panic!("expected Conversation, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_degraded_replies_are_not_cached() {
        let completion = MockCompletion::replying("Oi!");
        let orch = orchestrator(
            completion.clone(),
            MockTranslation::failing(),
            MockSpeech::ok(),
            DegradationPolicy::Partial,
        );

        orch.converse("s1", "restaurant", "Hello").await.unwrap();
        orch.converse("s1", "restaurant", "Hello").await.unwrap();
        assert_eq!(completion.calls(), 2);
    }

    #[tokio::test]
    async fn test_cache_hit_short_circuits_the_gateways() {
        let completion = MockCompletion::replying("Oi!");
        let speech = MockSpeech::ok();
        let orch = orchestrator(
            completion.clone(),
            MockTranslation::ok(),
            speech.clone(),
            DegradationPolicy::Partial,
        );

        let first = orch.converse("s1", "restaurant", "Hello").await.unwrap();
        let second = orch.converse("s1", "restaurant", "Hello").await.unwrap();
        assert_eq!(first, second);
        assert_eq!(completion.calls(), 1);
        assert_eq!(speech.calls(), 1);

        // Turns are still recorded on the hit path.
        orch.converse("s1", "restaurant", "And now?").await.unwrap();
        let requests = completion.requests.lock().unwrap();
        let messages = &requests.last().unwrap().messages;
        // system + 2 cached-turn pairs + new user turn
        assert_eq!(messages.len(), 6);
    }

    #[tokio::test]
    async fn test_invalid_and_unknown_inputs_are_rejected() {
        let orch = orchestrator(
            MockCompletion::replying("Oi!"),
            MockTranslation::ok(),
            MockSpeech::ok(),
            DegradationPolicy::Partial,
        );

        assert!(matches!(
            orch.converse("s1", "", "Hello").await.unwrap_err(),
            ParloError::InvalidRequest(_)
        ));
        assert!(matches!(
            orch.converse("s1", "restaurant", "  ").await.unwrap_err(),
            ParloError::InvalidRequest(_)
        ));
        assert!(matches!(
            orch.converse("s1", "spaceport", "Hello").await.unwrap_err(),
            ParloError::UnknownScenario(_)
        ));
    }

    #[tokio::test]
    async fn test_speech_input_is_sanitized() {
        let speech = MockSpeech::ok();
        let orch = orchestrator(
            MockCompletion::replying("Olá! 🎉🎉"),
            MockTranslation::ok(),
            speech.clone(),
            DegradationPolicy::Partial,
        );

        orch.converse("s1", "restaurant", "Hello").await.unwrap();
        assert_eq!(speech.texts.lock().unwrap()[0], "Olá!");
    }

    #[tokio::test]
    async fn test_clear_session_resets_to_start() {
        let completion = MockCompletion::replying("Oi!");
        let orch = orchestrator(
            completion.clone(),
            MockTranslation::ok(),
            MockSpeech::ok(),
            DegradationPolicy::Partial,
        );

        orch.converse("s1", "restaurant", "Hello").await.unwrap();
        orch.clear_session("s1");
        orch.converse("s1", "restaurant", "Hi again").await.unwrap();

        let requests = completion.requests.lock().unwrap();
        let messages = &requests.last().unwrap().messages;
        assert_eq!(
            messages[0].content,
            ScenarioPolicy::Restaurant.system_prompt(ConversationState::Start)
        );
    }
}
