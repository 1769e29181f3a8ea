//! The completion gateway: one logical completion per call, whatever it
//! takes underneath.

use std::time::Instant;

use tracing::{debug, info, warn};

use super::anthropic::AnthropicProvider;
use super::error::GatewayError;
use super::openai::OpenAiProvider;
use super::provider::{Completion, CompletionProvider, CompletionRequest, ProviderKind};
use super::retry::{RetryConfig, retry_with_backoff};
use super::usage::{UsageTracker, tokens_per_sec};
use crate::Message;
use crate::context::budget::{context_window_for_model, num_tokens_from_messages};
use crate::ui::{Acknowledge, StdinAcknowledge};

/// Wraps a [`CompletionProvider`] with token accounting, retry/backoff and
/// the truncation check.
///
/// # Example
///
/// ```ignore
/// let mut gateway = CompletionGateway::for_model("gpt-4o-mini")?
///     .with_retry(RetryConfig::with_attempts(5));
///
/// let completion = gateway.complete(&request).await?;
/// println!("{} ({})", completion.content, completion.finish_reason);
/// ```
pub struct CompletionGateway {
    provider: Box<dyn CompletionProvider>,
    retry: RetryConfig,
    acknowledge: Box<dyn Acknowledge>,
    usage: UsageTracker,
    /// Prompt budget reported in logs; the model's window when unset.
    context_window: Option<usize>,
}

impl CompletionGateway {
    /// Wrap an existing provider with the default retry policy.
    pub fn new(provider: impl CompletionProvider + 'static) -> Self {
        Self {
            provider: Box::new(provider),
            retry: RetryConfig::default(),
            acknowledge: Box::new(StdinAcknowledge),
            usage: UsageTracker::new(),
            context_window: None,
        }
    }

    /// Build the provider for `model`, reading its API key from the environment.
    pub fn for_model(model: &str) -> Result<Self, GatewayError> {
        let kind = ProviderKind::for_model(model)?;
        let var = kind.api_key_var();
        let api_key = std::env::var(var).map_err(|_| GatewayError::MissingApiKey(var))?;

        let gateway = match kind {
            ProviderKind::OpenAi => Self::new(OpenAiProvider::new(api_key)?),
            ProviderKind::Anthropic => Self::new(AnthropicProvider::new(api_key)?),
        };
        info!("Initialized {kind} client for {model}");
        Ok(gateway)
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_acknowledge(mut self, acknowledge: impl Acknowledge + 'static) -> Self {
        self.acknowledge = Box::new(acknowledge);
        self
    }

    /// Report `max_tokens` as the prompt budget instead of the model's
    /// context window.
    pub fn set_context_window(&mut self, max_tokens: usize) {
        self.context_window = Some(max_tokens);
    }

    /// Prompt budget for `model`: the configured one, else the model's window.
    pub fn context_window(&self, model: &str) -> usize {
        self.context_window
            .unwrap_or_else(|| context_window_for_model(model))
    }

    pub fn provider_kind(&self) -> ProviderKind {
        self.provider.kind()
    }

    pub fn retry_config(&self) -> &RetryConfig {
        &self.retry
    }

    /// Usage accumulated over every successful completion.
    pub fn usage(&self) -> &UsageTracker {
        &self.usage
    }

    /// Run one completion.
    ///
    /// Transient failures are retried according to the [`RetryConfig`].
    /// A response cut off by the output token limit is returned as
    /// [`GatewayError::Truncated`].
    pub async fn complete(
        &mut self,
        request: &CompletionRequest,
    ) -> Result<Completion, GatewayError> {
        let input_tokens = self.provider.count_input_tokens(request).await?;
        let context_window = self.context_window(&request.model);
        debug!("num_input_tokens: {input_tokens} max_tokens: {context_window}");

        let start = Instant::now();
        let provider = self.provider.as_ref();
        let completion = retry_with_backoff(&self.retry, self.acknowledge.as_ref(), |attempt, timeout| {
            debug!(
                "Sending {} request (attempt {attempt}), timeout {timeout:?}",
                provider.kind()
            );
            provider.complete(request, timeout)
        })
        .await?;
        let elapsed = start.elapsed();

        if completion.finish_reason.is_truncated() {
            warn!(
                "Response truncated at {} output tokens: {:?}",
                request.max_output_tokens, completion.content
            );
            return Err(GatewayError::Truncated(completion.finish_reason.to_string()));
        }

        let output_tokens = match completion.usage {
            Some(usage) if usage.output_tokens > 0 => usage.output_tokens as usize,
            _ => num_tokens_from_messages(
                &[Message::assistant_text(completion.content.as_str())],
                &request.model,
            ),
        };
        self.usage.record(input_tokens, output_tokens, elapsed);

        debug!(
            "num_total_tokens: {} num_output_tokens: {} max_tokens: {} performance: {:.1} output_tokens/sec",
            input_tokens + output_tokens,
            output_tokens,
            context_window,
            tokens_per_sec(output_tokens, elapsed),
        );

        Ok(completion)
    }
}
