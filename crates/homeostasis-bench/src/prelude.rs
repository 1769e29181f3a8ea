//! Convenience re-exports for common `homeostasis-bench` types.
//!
//! ```ignore
//! use homeostasis_bench::prelude::*;
//! ```
//!
//! Covers running a benchmark end to end: config, gateway, driver, logs and
//! event handlers. Provider internals and the environment dynamics are left
//! to their modules.

// ── Core types ──────────────────────────────────────────────────────
pub use crate::{Message, MessageRole};

// ── Gateway ─────────────────────────────────────────────────────────
pub use crate::api::{
    Completion, CompletionGateway, CompletionProvider, CompletionRequest, FinishReason,
    GatewayError, ProviderKind, RetryConfig,
};

// ── Context management ──────────────────────────────────────────────
pub use crate::context::{ContextBudget, Conversation};

// ── Simulation ──────────────────────────────────────────────────────
pub use crate::sim::{
    BenchmarkConfig, Driver, DriverError, DriverEvent, EventHandler, EventLog, FnEventHandler,
    LoggingHandler, MemoryEventLog, NoopHandler, StepRecord, TrialSummary, TsvEventLog,
};

// ── Operator interaction ────────────────────────────────────────────
pub use crate::ui::{Acknowledge, AutoAcknowledge, StdinAcknowledge};
