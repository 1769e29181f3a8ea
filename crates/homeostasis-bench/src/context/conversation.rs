//! Bounded conversation history.
//!
//! The conversation is a system message followed by alternating
//! observation (user) / action (assistant) pairs, with the pending
//! observation last. When the estimate exceeds the budget, the oldest pair
//! is dropped and the system message is put back in front.

use super::budget::ContextBudget;
use crate::{Message, MessageRole};

/// Result of a [`Conversation::trim_to_budget`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrimOutcome {
    /// Observation/action pairs removed.
    pub dropped_pairs: usize,
    /// Estimated prompt tokens after trimming.
    pub estimated_tokens: usize,
    /// Still over budget with no complete pair left to drop.
    pub over_budget: bool,
}

#[derive(Debug, Clone)]
pub struct Conversation {
    system_prompt: String,
    messages: Vec<Message>,
}

impl Conversation {
    pub fn new(system_prompt: impl Into<String>) -> Self {
        let system_prompt = system_prompt.into();
        Self {
            messages: vec![Message::system(system_prompt.as_str())],
            system_prompt,
        }
    }

    pub fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn push_user(&mut self, content: impl Into<String>) {
        self.messages.push(Message::user(content));
    }

    pub fn push_assistant(&mut self, content: impl Into<String>) {
        self.messages.push(Message::assistant_text(content));
    }

    /// Whether the first exchange after the system message is a complete
    /// observation/action pair that is not the pending observation.
    fn has_droppable_pair(&self) -> bool {
        self.messages.len() >= 4
            && self.messages[1].role == MessageRole::User
            && self.messages[2].role == MessageRole::Assistant
    }

    /// Drop the oldest observation/action pairs until the conversation fits
    /// `budget`.
    ///
    /// Each drop removes the system message and the oldest pair, then
    /// re-inserts the system message first. The pending observation is never
    /// dropped.
    pub fn trim_to_budget(&mut self, budget: &ContextBudget) -> TrimOutcome {
        let mut dropped_pairs = 0;
        let mut estimated_tokens = budget.estimate_tokens(&self.messages);

        while estimated_tokens > budget.max_tokens() {
            if !self.has_droppable_pair() {
                return TrimOutcome {
                    dropped_pairs,
                    estimated_tokens,
                    over_budget: true,
                };
            }
            self.messages.drain(..3);
            self.messages
                .insert(0, Message::system(self.system_prompt.as_str()));
            dropped_pairs += 1;
            estimated_tokens = budget.estimate_tokens(&self.messages);
        }

        TrimOutcome {
            dropped_pairs,
            estimated_tokens,
            over_budget: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filled(pairs: usize) -> Conversation {
        let mut conv = Conversation::new("You are an agent living in a simulation.");
        for i in 0..pairs {
            conv.push_user(format!("observation {i} {}", "x".repeat(100)));
            conv.push_assistant(format!("{i}"));
        }
        conv.push_user("pending observation");
        conv
    }

    #[test]
    fn new_conversation_holds_only_system() {
        let conv = Conversation::new("sys");
        assert_eq!(conv.len(), 1);
        assert!(conv.messages()[0].is_system());
    }

    #[test]
    fn within_budget_untouched() {
        let mut conv = filled(3);
        let before = conv.len();
        let outcome = conv.trim_to_budget(&ContextBudget::for_model("gpt-4o"));
        assert_eq!(outcome.dropped_pairs, 0);
        assert!(!outcome.over_budget);
        assert_eq!(conv.len(), before);
    }

    #[test]
    fn drops_oldest_pairs_first() {
        let mut conv = filled(10);
        let budget = ContextBudget::for_model("gpt-4o");
        let full = budget.estimate_tokens(conv.messages());
        let budget = budget.with_max_tokens(full / 2);

        let outcome = conv.trim_to_budget(&budget);

        assert!(outcome.dropped_pairs > 0);
        assert!(!outcome.over_budget);
        assert!(outcome.estimated_tokens <= budget.max_tokens());
        assert_eq!(conv.len(), 1 + 2 * (10 - outcome.dropped_pairs) + 1);
        let first_obs = &conv.messages()[1].content;
        assert!(first_obs.starts_with(&format!("observation {}", outcome.dropped_pairs)));
    }

    #[test]
    fn system_message_always_first_after_trim() {
        for limit in [50, 100, 200, 400] {
            let mut conv = filled(8);
            let budget = ContextBudget::for_model("gpt-4o").with_max_tokens(limit);
            conv.trim_to_budget(&budget);
            assert!(conv.messages()[0].is_system(), "limit {limit}");
            assert_eq!(conv.messages()[0].content, conv.system_prompt());
            assert_eq!(
                conv.messages().iter().filter(|m| m.is_system()).count(),
                1,
                "limit {limit}"
            );
        }
    }

    #[test]
    fn pending_observation_never_dropped() {
        let mut conv = filled(5);
        let budget = ContextBudget::for_model("gpt-4o").with_max_tokens(1);
        let outcome = conv.trim_to_budget(&budget);
        assert!(outcome.over_budget);
        assert_eq!(outcome.dropped_pairs, 5);
        assert_eq!(conv.len(), 2);
        assert_eq!(conv.messages()[1].content, "pending observation");
    }
}
