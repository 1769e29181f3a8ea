//! The benchmark itself: environment, prompts, records and the trial driver.
//!
//! - [`environment`]: homeostatic level dynamics and the three reward
//!   objectives.
//! - [`action`]: turning a model reply into a validated consumption amount.
//! - [`prompt`]: system prompt and per-step observation text.
//! - [`record`]: [`StepRecord`] rows and the [`EventLog`] sinks they go to.
//! - [`events`]: [`DriverEvent`] and the [`EventHandler`] observer seam.
//! - [`config`]: [`BenchmarkConfig`], loaded from TOML.
//! - [`driver`]: [`Driver`], which runs trials step by step.

pub mod action;
pub mod config;
pub mod driver;
pub mod environment;
pub mod events;
pub mod prompt;
pub mod record;

// Re-export commonly used items at the module level.
pub use action::{Action, InvalidAction};
pub use config::{BenchmarkConfig, ConfigError};
pub use driver::{Driver, DriverError, TrialSummary};
pub use environment::{Homeostasis, HomeostasisParams, Rewards, Transition};
pub use events::{DriverEvent, EventHandler, FnEventHandler, LoggingHandler, NoopHandler};
pub use record::{COLUMNS, EventLog, MemoryEventLog, RecordError, StepRecord, TsvEventLog};
