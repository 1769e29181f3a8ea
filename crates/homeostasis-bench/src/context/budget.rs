//! Context budget: estimates prompt size and looks up model context windows.
//!
//! Token counts are estimated from character counts plus the per-message
//! framing overhead of the chat format, so the estimate works for every
//! model without a tokenizer.

use tracing::warn;

use crate::Message;

/// Characters per token assumed when no calibrated ratio is configured.
pub const DEFAULT_CHARS_PER_TOKEN: f64 = 3.5;

/// Every reply is primed with `<|start|>assistant<|message|>`.
const REPLY_PRIMING_TOKENS: usize = 3;

/// Context window assumed for Claude models missing from the table.
const DEFAULT_CLAUDE_CONTEXT_WINDOW: usize = 4096;

/// Context window assumed for other models missing from the table.
const DEFAULT_CONTEXT_WINDOW: usize = 128_000;

/// Framing tokens added per message for `model`.
pub fn tokens_per_message(model: &str) -> usize {
    if model == "gpt-3.5-turbo-0301" {
        // <|start|>{role/name}\n{content}<|end|>\n
        4
    } else if model.contains("gpt-3.5-turbo") || model.contains("gpt-4") {
        // Covers gpt-3.5-turbo*, gpt-4*, gpt-4-32k*, gpt-4o* and gpt-4o-mini*.
        3
    } else {
        4
    }
}

/// Estimate the tokens in a piece of text (rounded up).
pub fn estimate_text_tokens(text: &str, chars_per_token: f64) -> usize {
    (text.chars().count() as f64 / chars_per_token).ceil() as usize
}

/// Estimate the prompt tokens used by a list of messages.
pub fn num_tokens_from_messages(messages: &[Message], model: &str) -> usize {
    count_tokens(messages, model, DEFAULT_CHARS_PER_TOKEN)
}

fn count_tokens(messages: &[Message], model: &str, chars_per_token: f64) -> usize {
    let per_message = tokens_per_message(model);
    messages
        .iter()
        .map(|m| {
            per_message
                + estimate_text_tokens(m.role.as_str(), chars_per_token)
                + estimate_text_tokens(&m.content, chars_per_token)
        })
        .sum::<usize>()
        + REPLY_PRIMING_TOKENS
}

/// Context window in tokens for a model name.
pub fn context_window_for_model(model: &str) -> usize {
    if model.starts_with("claude-") {
        return match model {
            "claude-3-opus-20240229"
            | "claude-3-sonnet-20240229"
            | "claude-3-5-sonnet-latest"
            | "claude-3-5-haiku-20241022"
            | "claude-3-5-haiku-latest"
            | "claude-2.1" => 200_000,
            "claude-2.0" => 100_000,
            _ => {
                warn!(
                    "Context window unknown for Claude model {model}, using default {DEFAULT_CLAUDE_CONTEXT_WINDOW}"
                );
                DEFAULT_CLAUDE_CONTEXT_WINDOW
            }
        };
    }

    match model {
        "o1" | "o1-2024-12-17" => 200_000,
        "o1-mini" | "o1-mini-2024-09-12" | "o1-preview" | "o1-preview-2024-09-12" => 128_000,
        "gpt-4o-mini" | "gpt-4o-mini-2024-07-18" => 128_000,
        "gpt-4o" | "gpt-4o-2024-05-13" | "gpt-4o-2024-08-06" | "gpt-4o-2024-11-20" => 128_000,
        "chatgpt-4o-latest" => 128_000,
        "gpt-4-turbo" | "gpt-4-turbo-2024-04-09" | "gpt-4-turbo-preview" => 128_000,
        "gpt-4-0125-preview" | "gpt-4-1106-preview" => 128_000,
        "gpt-4-32k" => 32_768,
        "gpt-3.5-turbo-16k" => 16_384,
        "gpt-4" | "gpt-4-0314" | "gpt-4-0613" => 8_192,
        "gpt-3.5-turbo-0125" | "gpt-3.5-turbo" | "gpt-3.5-turbo-1106" => 16_385,
        "gpt-3.5-turbo-instruct" => 4_096,
        _ => DEFAULT_CONTEXT_WINDOW,
    }
}

/// Token budget for the prompt sent on each step.
///
/// # Example
///
/// ```ignore
/// let budget = ContextBudget::for_model("gpt-4o-mini").with_max_tokens(8_000);
/// let usage = budget.estimate_usage(conversation.messages());
/// println!("{}", usage.to_log_string());
/// ```
#[derive(Debug, Clone)]
pub struct ContextBudget {
    /// Model the estimate is framed for.
    model: String,
    /// Maximum prompt size in tokens.
    max_tokens: usize,
    /// Characters per token ratio (calibrated or default).
    chars_per_token: f64,
}

impl ContextBudget {
    /// Budget equal to the model's full context window.
    pub fn for_model(model: &str) -> Self {
        Self {
            model: model.to_string(),
            max_tokens: context_window_for_model(model),
            chars_per_token: DEFAULT_CHARS_PER_TOKEN,
        }
    }

    /// Override the budget size (in tokens).
    pub fn with_max_tokens(mut self, max: usize) -> Self {
        self.max_tokens = max;
        self
    }

    /// Use a calibrated chars-per-token ratio. Non-positive values are ignored.
    pub fn with_chars_per_token(mut self, cpt: f64) -> Self {
        if cpt > 0.0 {
            self.chars_per_token = cpt;
        }
        self
    }

    pub fn max_tokens(&self) -> usize {
        self.max_tokens
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Estimated prompt tokens for `messages`.
    pub fn estimate_tokens(&self, messages: &[Message]) -> usize {
        count_tokens(messages, &self.model, self.chars_per_token)
    }

    /// Whether `messages` fit inside the budget.
    pub fn fits(&self, messages: &[Message]) -> bool {
        self.estimate_tokens(messages) <= self.max_tokens
    }

    pub fn estimate_usage(&self, messages: &[Message]) -> ContextUsage {
        let estimated_tokens = self.estimate_tokens(messages);
        let usage_pct = if self.max_tokens > 0 {
            estimated_tokens as f64 / self.max_tokens as f64
        } else {
            1.0
        };
        ContextUsage {
            estimated_tokens,
            max_tokens: self.max_tokens,
            usage_pct,
        }
    }
}

/// Prompt size relative to the budget, for log lines.
#[derive(Debug)]
pub struct ContextUsage {
    pub estimated_tokens: usize,
    pub max_tokens: usize,
    /// Fraction of the budget in use; above 1.0 when over budget.
    pub usage_pct: f64,
}

impl ContextUsage {
    pub fn to_log_string(&self) -> String {
        format!(
            "prompt ~{} tokens, {:.0}% of {} budget",
            self.estimated_tokens,
            self.usage_pct * 100.0,
            self.max_tokens,
        )
    }
}
