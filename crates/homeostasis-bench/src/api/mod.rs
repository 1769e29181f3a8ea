//! Completion gateway: provider clients, retry, and throughput tracking.
//!
//! These modules handle everything between the [`Driver`](crate::sim::Driver)
//! and the provider HTTP APIs:
//!
//! - [`provider`]: the [`CompletionProvider`] trait, model-prefix provider
//!   selection ([`ProviderKind`]) and the normalized [`Completion`] /
//!   [`FinishReason`] pair every provider returns.
//! - [`openai`] / [`anthropic`]: the two concrete providers.
//! - [`retry`]: per-attempt timeout doubling and randomized exponential
//!   backoff. Retries read timeouts, network errors and malformed responses;
//!   everything else is acknowledged by the operator and surfaced.
//! - [`gateway`]: [`CompletionGateway`], which ties token counting, retry and
//!   the truncation check together for a single logical completion.
//! - [`usage`]: cumulative token counts and output tokens/second.

pub mod anthropic;
pub mod error;
pub mod gateway;
pub(crate) mod http;
pub mod openai;
pub mod provider;
pub mod retry;
pub mod usage;

// Re-export commonly used items at the module level.
pub use error::GatewayError;
pub use gateway::CompletionGateway;
pub use provider::{
    Completion, CompletionFuture, CompletionProvider, CompletionRequest, FinishReason,
    ProviderKind, TokenUsage,
};
pub use retry::RetryConfig;
pub use usage::UsageTracker;
