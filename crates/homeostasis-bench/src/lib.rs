//! LLM homeostasis benchmark: measures how a language-model agent regulates
//! an internal resource variable over repeated turns.
//!
//! Each step the model sees its homeostatic target, its current level and the
//! rewards of its previous action, and answers with how many potatoes it
//! consumes. The environment adds the consumption and a seeded random
//! perturbation to the level, scores the result on three reward axes, and
//! logs one tab-separated row per step.
//!
//! # Where to find things
//!
//! - **Talk to a model:** [`CompletionGateway`](api::CompletionGateway) wraps
//!   the OpenAI and Anthropic chat APIs behind one
//!   [`CompletionProvider`](api::CompletionProvider) trait, with per-attempt
//!   timeouts, randomized exponential backoff on transient failures and
//!   truncation checks. See [`api::retry`] for the backoff policy.
//!
//! - **Keep the prompt inside the context window:** see
//!   [`ContextBudget`](context::ContextBudget) for token estimation and
//!   [`Conversation`](context::Conversation) for dropping the oldest
//!   observation/action pairs.
//!
//! - **Run the benchmark:** [`Driver`](sim::Driver) runs trials against a
//!   gateway, writing [`StepRecord`](sim::StepRecord)s to any
//!   [`EventLog`](sim::EventLog). Environment dynamics and rewards live in
//!   [`sim::environment`]; settings in [`BenchmarkConfig`](sim::BenchmarkConfig).
//!
//! - **Observe a run:** implement [`EventHandler`](sim::EventHandler) or use
//!   [`LoggingHandler`](sim::LoggingHandler) for `tracing` output.
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`api`] | Providers, gateway, retry/backoff, token throughput tracking |
//! | [`context`] | Token estimation, context windows, conversation trimming |
//! | [`sim`] | Environment, rewards, prompts, step records, trial driver, config |
//! | [`ui`] | Operator acknowledgment before surfacing a hard failure |

pub mod api;
pub mod context;
pub mod prelude;
pub mod sim;
pub mod ui;

use serde::{Deserialize, Serialize};

// ── Constants ──────────────────────────────────────────────────────

pub const OPENAI_URL: &str = "https://api.openai.com/v1/chat/completions";

pub const ANTHROPIC_URL: &str = "https://api.anthropic.com/v1/messages";

pub const ANTHROPIC_COUNT_TOKENS_URL: &str = "https://api.anthropic.com/v1/messages/count_tokens";

/// Value of the `anthropic-version` header.
pub const ANTHROPIC_VERSION: &str = "2023-06-01";

// ── Message types ──────────────────────────────────────────────────

/// Role of a message in the conversation.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    System,
    User,
    Assistant,
}

impl MessageRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageRole::System => "system",
            MessageRole::User => "user",
            MessageRole::Assistant => "assistant",
        }
    }
}

impl std::fmt::Display for MessageRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A message in the conversation.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct Message {
    pub role: MessageRole,
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: content.into(),
        }
    }

    pub fn assistant_text(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Assistant,
            content: content.into(),
        }
    }

    pub fn is_system(&self) -> bool {
        self.role == MessageRole::System
    }
}
