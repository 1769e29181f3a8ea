//! Context window management: token estimates, model windows, trimming.
//!
//! 1. **[`budget`]**: [`ContextBudget`] estimates prompt tokens from
//!    character counts and per-message framing, and knows each model's
//!    context window.
//!
//! 2. **[`conversation`]**: [`Conversation`] keeps the system message
//!    pinned first and drops the oldest observation/action pairs when the
//!    budget is exceeded.

pub mod budget;
pub mod conversation;

// Re-export commonly used items at the module level.
pub use budget::{
    ContextBudget, ContextUsage, DEFAULT_CHARS_PER_TOKEN, context_window_for_model,
    num_tokens_from_messages,
};
pub use conversation::{Conversation, TrimOutcome};
