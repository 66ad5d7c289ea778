//! Scenario catalog — role-play contexts and their system prompts.
//!
//! Each scenario is a variant of a closed sum type carrying its own
//! START/CONTINUE prompt text. The catalog maps string ids to variants, so
//! adding a scenario means registering one more entry, not touching the
//! orchestrator.

use std::collections::HashMap;

use crate::error::{ParloError, Result};

/// Whether the conversation has prior turns. Derived from history length at
/// call time, never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConversationState {
    Start,
    Continue,
}

/// A role-play scenario. Prompt wording is data, not logic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScenarioPolicy {
    FreeConversation,
    Restaurant,
    Supermarket,
    TrainStation,
}

const RESTAURANT_START: &str = "\
You are Lia, a waiter at a Brazilian restaurant, helping a customer practice Brazilian Portuguese.
Respond only in Brazilian Portuguese, in a professional and friendly tone.
The customer has just walked in: greet them warmly and ask whether they are ready to order.
Do not wait for a message from them. Keep your reply to one short sentence.";

const RESTAURANT_CONTINUE: &str = "\
You are Lia, a waiter at a Brazilian restaurant, helping a customer practice Brazilian Portuguese.
Respond only in Brazilian Portuguese, in a professional and friendly tone.
Continue the conversation from the customer's previous messages: take their order, answer
questions about the menu, and suggest dishes when they seem unsure.
Keep each reply to one or two short sentences.";

const SUPERMARKET_START: &str = "\
You are Lia, a supermarket attendant, helping a customer practice Brazilian Portuguese.
Respond only in Brazilian Portuguese, in a polite and helpful tone.
The customer has just approached you: greet them and ask whether they need help finding anything.
Do not wait for a message from them. Keep your reply to one short sentence.";

const SUPERMARKET_CONTINUE: &str = "\
You are Lia, a supermarket attendant, helping a customer practice Brazilian Portuguese.
Respond only in Brazilian Portuguese, in a polite and helpful tone.
Continue the conversation from the customer's previous messages: point them to the right
aisle, answer questions about products and prices, and help them check out.
Keep each reply to one or two short sentences.";

const TRAIN_STATION_START: &str = "\
You are Lia, a ticket inspector at a train station, helping a passenger practice Brazilian Portuguese.
Respond only in Brazilian Portuguese, in a polite but firm tone.
The passenger has just boarded: greet them and ask to see their ticket.
Do not wait for a message from them. Keep your reply to one short sentence.";

const TRAIN_STATION_CONTINUE: &str = "\
You are Lia, a ticket inspector at a train station, helping a passenger practice Brazilian Portuguese.
Respond only in Brazilian Portuguese, in a polite but firm tone.
Continue the conversation from the passenger's previous messages: check their ticket,
explain any problems with it, and answer questions about platforms and schedules.
Keep each reply to one or two short sentences.";

const FREE_CONVERSATION: &str = "\
You are Lia, a friendly native speaker having a casual chat with someone practicing
Brazilian Portuguese. Respond only in Brazilian Portuguese, in simple everyday language
suitable for a learner. Be patient and encouraging, ask questions to keep the conversation
going, and gently correct major mistakes without breaking the flow.
Keep each reply to one or two short sentences.";

impl ScenarioPolicy {
    /// System prompt for the given conversation state. Pure and total.
    pub fn system_prompt(&self, state: ConversationState) -> &'static str {
        match (self, state) {
            (Self::Restaurant, ConversationState::Start) => RESTAURANT_START,
            (Self::Restaurant, ConversationState::Continue) => RESTAURANT_CONTINUE,
            (Self::Supermarket, ConversationState::Start) => SUPERMARKET_START,
            (Self::Supermarket, ConversationState::Continue) => SUPERMARKET_CONTINUE,
            (Self::TrainStation, ConversationState::Start) => TRAIN_STATION_START,
            (Self::TrainStation, ConversationState::Continue) => TRAIN_STATION_CONTINUE,
            // Free conversation has no scripted opening.
            (Self::FreeConversation, _) => FREE_CONVERSATION,
        }
    }
}

/// Maps scenario ids to policies.
pub struct ScenarioCatalog {
    policies: HashMap<String, ScenarioPolicy>,
}

impl ScenarioCatalog {
    /// An empty catalog.
    pub fn new() -> Self {
        Self {
            policies: HashMap::new(),
        }
    }

    /// A catalog with the built-in scenarios registered.
    pub fn with_builtins() -> Self {
        let mut catalog = Self::new();
        catalog.register("free conversation", ScenarioPolicy::FreeConversation);
        catalog.register("restaurant", ScenarioPolicy::Restaurant);
        catalog.register("supermarket", ScenarioPolicy::Supermarket);
        catalog.register("train station", ScenarioPolicy::TrainStation);
        catalog
    }

    /// Register a policy under an id, replacing any previous registration.
    pub fn register(&mut self, id: &str, policy: ScenarioPolicy) {
        self.policies.insert(id.to_string(), policy);
    }

    /// Resolve an id to its policy. Never falls back to a default.
    pub fn resolve(&self, id: &str) -> Result<ScenarioPolicy> {
        self.policies
            .get(id)
            .copied()
            .ok_or_else(|| ParloError::UnknownScenario(id.to_string()))
    }

    /// Registered scenario ids.
    pub fn ids(&self) -> Vec<String> {
        self.policies.keys().cloned().collect()
    }
}

impl Default for ScenarioCatalog {
    fn default() -> Self {
        Self::with_builtins()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtins_have_nonempty_prompts() {
        let catalog = ScenarioCatalog::with_builtins();
        for id in ["free conversation", "restaurant", "supermarket", "train station"] {
            let policy = catalog.resolve(id).unwrap();
            assert!(!policy.system_prompt(ConversationState::Start).is_empty());
            assert!(!policy.system_prompt(ConversationState::Continue).is_empty());
        }
    }

    #[test]
    fn test_start_and_continue_prompts_differ() {
        let policy = ScenarioCatalog::with_builtins().resolve("restaurant").unwrap();
        assert_ne!(
            policy.system_prompt(ConversationState::Start),
            policy.system_prompt(ConversationState::Continue)
        );
    }

    #[test]
    fn test_unknown_scenario_is_an_error() {
        let catalog = ScenarioCatalog::with_builtins();
        match catalog.resolve("spaceport") {
            Err(ParloError::UnknownScenario(id)) => assert_eq!(id, "spaceport"),
            other => panic!("expected UnknownScenario, got {other:?}"),
        }
    }

    #[test]
    fn test_registration_extends_the_catalog() {
        let mut catalog = ScenarioCatalog::new();
        assert!(catalog.resolve("cafe").is_err());
        catalog.register("cafe", ScenarioPolicy::Restaurant);
        assert_eq!(catalog.resolve("cafe").unwrap(), ScenarioPolicy::Restaurant);
    }
}
