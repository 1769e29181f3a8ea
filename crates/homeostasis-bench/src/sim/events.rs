//! Events and handlers for the [`Driver`](super::Driver).
//!
//! The driver reports what it is doing through [`DriverEvent`] variants.
//! Callers implement [`EventHandler`] to observe them for logging, progress
//! display, or test assertions.
//!
//! | Handler | Use case |
//! |---------|----------|
//! | [`NoopHandler`] | Tests or silent runs |
//! | [`LoggingHandler`] | Structured logging via `tracing` |
//! | [`FnEventHandler`] | Quick closures for simple callbacks |

use std::path::Path;

use tracing::{info, warn};

use super::action::InvalidAction;
use super::environment::Rewards;
use super::record::StepRecord;
use crate::context::TrimOutcome;

/// Events emitted by the driver during a run.
#[derive(Debug)]
pub enum DriverEvent<'a> {
    /// A trial is starting with a fresh environment.
    TrialStarted {
        trial_no: u32,
        seed: u64,
        log_path: Option<&'a Path>,
    },
    /// Old observation/action pairs were dropped to fit the context budget.
    ContextTrimmed {
        trial_no: u32,
        step_no: u32,
        outcome: &'a TrimOutcome,
    },
    /// The model answered with something that is not a valid action; the
    /// driver will ask again.
    InvalidAction {
        trial_no: u32,
        step_no: u32,
        response: &'a str,
        reason: &'a InvalidAction,
    },
    /// A step finished and its record was written.
    StepCompleted(&'a StepRecord),
    /// A trial finished and its log was closed.
    TrialFinished {
        trial_no: u32,
        steps: u32,
        totals: &'a Rewards,
    },
}

/// Handler for driver events.
pub trait EventHandler: Send + Sync {
    fn on_event(&self, event: &DriverEvent<'_>) {
        let _ = event;
    }
}

/// A handler that ignores everything.
pub struct NoopHandler;
impl EventHandler for NoopHandler {}

/// Logs every event through `tracing`.
pub struct LoggingHandler;

impl EventHandler for LoggingHandler {
    fn on_event(&self, event: &DriverEvent<'_>) {
        match event {
            DriverEvent::TrialStarted {
                trial_no,
                seed,
                log_path,
            } => match log_path {
                Some(path) => info!("Trial {trial_no} started (seed {seed}), logging to {}", path.display()),
                None => info!("Trial {trial_no} started (seed {seed})"),
            },
            DriverEvent::ContextTrimmed {
                trial_no,
                step_no,
                outcome,
            } => {
                if outcome.dropped_pairs > 0 {
                    info!(
                        "Trial {trial_no} step {step_no}: max tokens reached, dropped {} oldest observation-action pairs",
                        outcome.dropped_pairs
                    );
                }
                if outcome.over_budget {
                    warn!(
                        "Trial {trial_no} step {step_no}: prompt still over budget (~{} tokens) with no history left to drop",
                        outcome.estimated_tokens
                    );
                }
            }
            DriverEvent::InvalidAction {
                trial_no,
                step_no,
                response,
                reason,
            } => {
                warn!("Trial {trial_no} step {step_no}: invalid action {response:?} ({reason}), retrying...");
            }
            DriverEvent::StepCompleted(r) => {
                info!(
                    "Trial no: {} Step no: {} Consumed: {} Random change: {} Homeostatic target: {} Homeostatic actual: {} -> {} Deviation: {} Rewards: consumption={} undersatiation={} oversatiation={} Total rewards: consumption={} undersatiation={} oversatiation={}",
                    r.trial_no,
                    r.step_no,
                    r.action,
                    r.random_homeostatic_level_change,
                    r.homeostatic_target,
                    r.prev_homeostatic_actual,
                    r.homeostatic_actual,
                    r.homeostatic_actual - r.homeostatic_target,
                    r.consumption_reward,
                    r.undersatiation_reward,
                    r.oversatiation_reward,
                    r.total_consumption_reward,
                    r.total_undersatiation_reward,
                    r.total_oversatiation_reward,
                );
            }
            DriverEvent::TrialFinished {
                trial_no,
                steps,
                totals,
            } => {
                info!(
                    "Trial {trial_no} finished after {steps} steps: consumption={} undersatiation={} oversatiation={}",
                    totals.consumption, totals.undersatiation, totals.oversatiation
                );
            }
        }
    }
}

/// An event handler backed by a closure.
///
/// # Example
///
/// ```ignore
/// let handler = FnEventHandler::new(|event| {
///     if let DriverEvent::StepCompleted(record) = event {
///         println!("{} -> {}", record.step_no, record.homeostatic_actual);
///     }
/// });
/// ```
pub struct FnEventHandler<F>(F)
where
    F: Fn(&DriverEvent<'_>) + Send + Sync;

impl<F> FnEventHandler<F>
where
    F: Fn(&DriverEvent<'_>) + Send + Sync,
{
    pub fn new(f: F) -> Self {
        Self(f)
    }
}

impl<F> EventHandler for FnEventHandler<F>
where
    F: Fn(&DriverEvent<'_>) + Send + Sync,
{
    fn on_event(&self, event: &DriverEvent<'_>) {
        (self.0)(event)
    }
}
