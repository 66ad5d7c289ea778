//! Response cache — memoizes recent composite replies.
//!
//! Pure optimization layer: a miss (or a stale hit, treated the same) only
//! costs a recomputation, never correctness. Eviction is insertion-ordered,
//! which approximates LRU closely enough for this workload.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Bounds for the cache.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheSettings {
    #[serde(default = "default_capacity")]
    pub capacity: usize,
    /// Entry freshness window, seconds.
    #[serde(default = "default_ttl_secs")]
    pub ttl_secs: u64,
}

fn default_capacity() -> usize {
    1000
}

fn default_ttl_secs() -> u64 {
    5 * 60
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            capacity: default_capacity(),
            ttl_secs: default_ttl_secs(),
        }
    }
}

/// Deterministic cache key: scenario + normalized last user content.
/// Case- and surrounding-whitespace-insensitive.
pub fn cache_key(scenario: &str, last_user_content: &str) -> String {
    format!("{}:{}", scenario.trim(), last_user_content.trim()).to_lowercase()
}

struct CacheEntry<V> {
    value: V,
    inserted_at: DateTime<Utc>,
}

struct CacheState<V> {
    entries: HashMap<String, CacheEntry<V>>,
    /// Keys in insertion order; each key appears once.
    order: VecDeque<String>,
}

/// Keyed cache of previously computed replies.
pub struct ResponseCache<V> {
    settings: CacheSettings,
    state: Mutex<CacheState<V>>,
}

impl<V: Clone> ResponseCache<V> {
    pub fn new(settings: CacheSettings) -> Self {
        Self {
            settings,
            state: Mutex::new(CacheState {
                entries: HashMap::new(),
                order: VecDeque::new(),
            }),
        }
    }

    fn is_fresh(&self, entry: &CacheEntry<V>, now: DateTime<Utc>) -> bool {
        now - entry.inserted_at < Duration::seconds(self.settings.ttl_secs as i64)
    }

    /// Fresh entry for (scenario, content), or None. A stale entry is a miss.
    pub fn lookup(&self, scenario: &str, last_user_content: &str, now: DateTime<Utc>) -> Option<V> {
        let key = cache_key(scenario, last_user_content);
        let state = self.state.lock().unwrap();
        state
            .entries
            .get(&key)
            .filter(|entry| self.is_fresh(entry, now))
            .map(|entry| entry.value.clone())
    }

    /// Insert or overwrite; evicts the oldest-inserted entry when over capacity.
    pub fn store(&self, scenario: &str, last_user_content: &str, value: V, now: DateTime<Utc>) {
        let key = cache_key(scenario, last_user_content);
        let mut state = self.state.lock().unwrap();
        let previous = state.entries.insert(
            key.clone(),
            CacheEntry {
                value,
                inserted_at: now,
            },
        );
        if previous.is_none() {
            state.order.push_back(key);
        }
        while state.entries.len() > self.settings.capacity {
            match state.order.pop_front() {
                Some(oldest) => {
                    state.entries.remove(&oldest);
                }
                None => break,
            }
        }
    }

    pub fn len(&self) -> usize {
        self.state.lock().unwrap().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<V: Clone> Default for ResponseCache<V> {
    fn default() -> Self {
        Self::new(CacheSettings::default())
    }
}
