//! Provider abstraction: one trait, two wire formats, one normalized result.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use super::error::GatewayError;
use crate::Message;
use crate::context::budget::num_tokens_from_messages;

/// Boxed future returned by [`CompletionProvider`] methods.
pub type CompletionFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, GatewayError>> + Send + 'a>>;

/// The LLM vendors the gateway can talk to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    OpenAi,
    Anthropic,
}

impl ProviderKind {
    /// Pick the provider from the model name prefix (case-insensitive).
    pub fn for_model(model: &str) -> Result<Self, GatewayError> {
        let lower = model.to_lowercase();
        if lower.starts_with("claude") {
            Ok(ProviderKind::Anthropic)
        } else if ["gpt", "chatgpt", "o1", "o3"]
            .iter()
            .any(|p| lower.starts_with(p))
        {
            Ok(ProviderKind::OpenAi)
        } else {
            Err(GatewayError::UnsupportedModel(model.to_string()))
        }
    }

    /// Environment variable holding the API key.
    pub fn api_key_var(&self) -> &'static str {
        match self {
            ProviderKind::OpenAi => "OPENAI_API_KEY",
            ProviderKind::Anthropic => "ANTHROPIC_API_KEY",
        }
    }
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProviderKind::OpenAi => write!(f, "OpenAI"),
            ProviderKind::Anthropic => write!(f, "Anthropic"),
        }
    }
}

/// A single completion request, provider-neutral.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub model: String,
    pub messages: Vec<Message>,
    pub temperature: f32,
    pub max_output_tokens: u32,
}

/// Why the model stopped generating.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FinishReason {
    /// Natural end of the answer (OpenAI `stop`, Anthropic `end_turn` / `stop_sequence`).
    Stop,
    /// Hit the output token limit (OpenAI `length`, Anthropic `max_tokens`).
    Length,
    /// Anything else, kept verbatim.
    Other(String),
}

impl FinishReason {
    pub fn from_openai(raw: Option<&str>) -> Self {
        match raw {
            Some("stop") => FinishReason::Stop,
            Some("length") => FinishReason::Length,
            Some(other) => FinishReason::Other(other.to_string()),
            None => FinishReason::Other("none".to_string()),
        }
    }

    pub fn from_anthropic(raw: Option<&str>) -> Self {
        match raw {
            Some("end_turn") | Some("stop_sequence") => FinishReason::Stop,
            Some("max_tokens") => FinishReason::Length,
            Some(other) => FinishReason::Other(other.to_string()),
            None => FinishReason::Other("none".to_string()),
        }
    }

    pub fn is_truncated(&self) -> bool {
        *self == FinishReason::Length
    }
}

impl std::fmt::Display for FinishReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FinishReason::Stop => write!(f, "stop"),
            FinishReason::Length => write!(f, "length"),
            FinishReason::Other(raw) => write!(f, "{raw}"),
        }
    }
}

/// Token usage as reported by the provider.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TokenUsage {
    pub input_tokens: u32,
    pub output_tokens: u32,
}

/// Normalized provider response: text plus finish reason.
#[derive(Debug, Clone)]
pub struct Completion {
    pub content: String,
    pub finish_reason: FinishReason,
    pub usage: Option<TokenUsage>,
}

/// A chat-completion backend.
///
/// Implementors issue exactly one HTTP request per [`complete`](Self::complete)
/// call and map every failure into a [`GatewayError`] so the retry layer can
/// tell transient failures from permanent ones.
pub trait CompletionProvider: Send + Sync {
    fn kind(&self) -> ProviderKind;

    /// Send one request, giving up after `timeout`.
    fn complete<'a>(
        &'a self,
        request: &'a CompletionRequest,
        timeout: Duration,
    ) -> CompletionFuture<'a, Completion>;

    /// Count the prompt tokens of `request`.
    ///
    /// The default is the local estimate; providers with a counting endpoint
    /// override it.
    fn count_input_tokens<'a>(
        &'a self,
        request: &'a CompletionRequest,
    ) -> CompletionFuture<'a, usize> {
        let estimate = num_tokens_from_messages(&request.messages, &request.model);
        Box::pin(async move { Ok(estimate) })
    }
}
