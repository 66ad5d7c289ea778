//! Session context store — per-session conversation state.
//!
//! All state is process memory; sessions die with the process or with the
//! inactivity sweep, whichever comes first.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex as AsyncMutex;

use crate::message::{ChatMessage, Role};

/// Conversation state for a single session.
#[derive(Debug, Clone)]
pub struct SessionContext {
    /// Scenario the session was opened with.
    pub scenario: String,
    /// User/assistant turns, oldest first. Never holds system messages.
    pub history: Vec<ChatMessage>,
    pub last_interaction: DateTime<Utc>,
}

impl SessionContext {
    fn new(scenario: &str, now: DateTime<Utc>) -> Self {
        Self {
            scenario: scenario.to_string(),
            history: Vec::new(),
            last_interaction: now,
        }
    }

    fn is_expired(&self, now: DateTime<Utc>, timeout: Duration) -> bool {
        now - self.last_interaction > timeout
    }
}

/// Bounds for session history and lifetime.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSettings {
    /// Retained turns per session; oldest dropped first.
    #[serde(default = "default_max_history")]
    pub max_history: usize,
    /// Inactivity timeout, seconds.
    #[serde(default = "default_context_timeout_secs")]
    pub context_timeout_secs: u64,
}

fn default_max_history() -> usize {
    10
}

fn default_context_timeout_secs() -> u64 {
    30 * 60
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            max_history: default_max_history(),
            context_timeout_secs: default_context_timeout_secs(),
        }
    }
}

impl SessionSettings {
    fn timeout(&self) -> Duration {
        Duration::seconds(self.context_timeout_secs as i64)
    }
}

/// Tracks all active sessions.
///
/// Construct one per process (or per test) and inject it; there is no global
/// instance. The inner map lock is held only for individual mutations; the
/// per-session guards from [`SessionContextStore::guard`] serialize whole
/// `converse` passes for one session.
pub struct SessionContextStore {
    settings: SessionSettings,
    sessions: Mutex<HashMap<String, SessionContext>>,
    guards: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

impl SessionContextStore {
    pub fn new(settings: SessionSettings) -> Self {
        Self {
            settings,
            sessions: Mutex::new(HashMap::new()),
            guards: Mutex::new(HashMap::new()),
        }
    }

    /// Mutual-exclusion scope for one session. Hold the lock across a whole
    /// `converse` pass so a double-submit cannot interleave its turns.
    pub fn guard(&self, session_id: &str) -> Arc<AsyncMutex<()>> {
        let mut guards = self.guards.lock().unwrap();
        guards
            .entry(session_id.to_string())
            .or_insert_with(|| Arc::new(AsyncMutex::new(())))
            .clone()
    }

    /// Snapshot of the session, creating a fresh one when the session is
    /// missing or has sat idle past the timeout.
    pub fn get_or_create(
        &self,
        session_id: &str,
        scenario: &str,
        now: DateTime<Utc>,
    ) -> SessionContext {
        let mut sessions = self.sessions.lock().unwrap();
        let context = sessions
            .entry(session_id.to_string())
            .and_modify(|ctx| {
                if ctx.is_expired(now, self.settings.timeout()) {
                    *ctx = SessionContext::new(scenario, now);
                }
            })
            .or_insert_with(|| SessionContext::new(scenario, now));
        context.clone()
    }

    /// Append a turn and trim to the most recent `max_history` entries.
    /// A missing session is created on the spot.
    pub fn append_turn(&self, session_id: &str, role: Role, content: &str, now: DateTime<Utc>) {
        let mut sessions = self.sessions.lock().unwrap();
        let context = sessions
            .entry(session_id.to_string())
            .or_insert_with(|| SessionContext::new("", now));
        context.history.push(ChatMessage {
            role,
            content: content.to_string(),
        });
        let max = self.settings.max_history;
        if context.history.len() > max {
            let start = context.history.len() - max;
            context.history.drain(..start);
        }
        context.last_interaction = now;
    }

    /// Drop every session idle past the timeout. Returns how many were removed.
    pub fn sweep_expired(&self, now: DateTime<Utc>) -> usize {
        let timeout = self.settings.timeout();
        let mut sessions = self.sessions.lock().unwrap();
        let before = sessions.len();
        sessions.retain(|_, ctx| !ctx.is_expired(now, timeout));
        let removed = before - sessions.len();
        if removed > 0 {
            let mut guards = self.guards.lock().unwrap();
            guards.retain(|id, _| sessions.contains_key(id));
            tracing::debug!("Swept {} expired session(s)", removed);
        }
        removed
    }

    /// Remove a session immediately regardless of expiry.
    pub fn clear(&self, session_id: &str) {
        self.sessions.lock().unwrap().remove(session_id);
        self.guards.lock().unwrap().remove(session_id);
    }

    /// Current history for a session, oldest first.
    pub fn history(&self, session_id: &str) -> Vec<ChatMessage> {
        let sessions = self.sessions.lock().unwrap();
        sessions
            .get(session_id)
            .map(|ctx| ctx.history.clone())
            .unwrap_or_default()
    }

    /// Number of active sessions.
    pub fn count(&self) -> usize {
        self.sessions.lock().unwrap().len()
    }
}

impl Default for SessionContextStore {
    fn default() -> Self {
        Self::new(SessionSettings::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store(max_history: usize, timeout_secs: u64) -> SessionContextStore {
        SessionContextStore::new(SessionSettings {
            max_history,
            context_timeout_secs: timeout_secs,
        })
    }

    #[test]
    fn test_history_trims_oldest_first() {
        let store = store(4, 600);
        let now = Utc::now();
        for i in 0..7 {
            store.append_turn("s1", Role::User, &format!("turn {i}"), now);
        }
        let history = store.history("s1");
        assert_eq!(history.len(), 4);
        let contents: Vec<&str> = history.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["turn 3", "turn 4", "turn 5", "turn 6"]);
    }

    #[test]
    fn test_sweep_removes_only_expired_sessions() {
        let store = store(10, 60);
        let now = Utc::now();
        store.append_turn("old", Role::User, "hi", now);
        store.append_turn("fresh", Role::User, "hi", now + Duration::seconds(50));

        let removed = store.sweep_expired(now + Duration::seconds(70));
        assert_eq!(removed, 1);
        assert!(store.history("old").is_empty());
        assert_eq!(store.history("fresh").len(), 1);
        assert_eq!(store.count(), 1);
    }

    #[test]
    fn test_get_or_create_resets_an_expired_session() {
        let store = store(10, 60);
        let now = Utc::now();
        store.append_turn("s1", Role::User, "hi", now);

        let later = now + Duration::seconds(120);
        let ctx = store.get_or_create("s1", "restaurant", later);
        assert!(ctx.history.is_empty());
        assert_eq!(ctx.scenario, "restaurant");
    }

    #[test]
    fn test_get_or_create_keeps_a_live_session() {
        let store = store(10, 60);
        let now = Utc::now();
        store.get_or_create("s1", "restaurant", now);
        store.append_turn("s1", Role::User, "hi", now);

        let ctx = store.get_or_create("s1", "supermarket", now + Duration::seconds(30));
        assert_eq!(ctx.history.len(), 1);
        assert_eq!(ctx.scenario, "restaurant");
    }

    #[test]
    fn test_clear_removes_immediately() {
        let store = store(10, 600);
        let now = Utc::now();
        store.append_turn("s1", Role::User, "hi", now);
        store.clear("s1");
        assert!(store.history("s1").is_empty());
        assert_eq!(store.count(), 0);
    }
}
