//! The trial loop.
//!
//! Each trial runs PROMPT → TRIM → QUERY → VALIDATE → APPLY → REWARD → LOG
//! for a fixed number of steps against one [`CompletionGateway`], then
//! closes its [`EventLog`]. Trials run one after another; only the gateway
//! is shared between them.

use thiserror::Error;
use tracing::{debug, warn};

use super::action::Action;
use super::config::BenchmarkConfig;
use super::environment::{Homeostasis, Rewards};
use super::events::{DriverEvent, EventHandler};
use super::prompt::{SYSTEM_PROMPT, observation_prompt};
use super::record::{EventLog, RecordError, StepRecord};
use crate::api::{CompletionGateway, CompletionRequest, GatewayError};
use crate::context::{ContextBudget, Conversation};

#[derive(Debug, Error)]
pub enum DriverError {
    #[error(transparent)]
    Gateway(#[from] GatewayError),
    #[error(transparent)]
    Record(#[from] RecordError),
}

/// Outcome of one finished trial.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrialSummary {
    pub trial_no: u32,
    pub steps: u32,
    pub final_actual: i64,
    pub totals: Rewards,
}

/// Runs benchmark trials against a gateway.
///
/// # Example
///
/// ```ignore
/// let config = BenchmarkConfig::load(Path::new("config.toml"))?;
/// let mut gateway = CompletionGateway::for_model(&config.model.name)?;
/// let mut driver = Driver::new(&config, &mut gateway, &LoggingHandler);
/// let summaries = driver
///     .run(|_| Ok(Box::new(TsvEventLog::create(&config.output.dir, &config.model.name)?)))
///     .await?;
/// ```
pub struct Driver<'a> {
    config: &'a BenchmarkConfig,
    gateway: &'a mut CompletionGateway,
    handler: &'a dyn EventHandler,
    budget: ContextBudget,
}

impl<'a> Driver<'a> {
    pub fn new(
        config: &'a BenchmarkConfig,
        gateway: &'a mut CompletionGateway,
        handler: &'a dyn EventHandler,
    ) -> Self {
        let budget = config.context_budget();
        gateway.set_context_window(budget.max_tokens());
        Self {
            budget,
            config,
            gateway,
            handler,
        }
    }

    pub fn budget(&self) -> &ContextBudget {
        &self.budget
    }

    /// Run every configured trial, numbered from 1, opening one log per
    /// trial through `open_log`.
    pub async fn run<F>(&mut self, mut open_log: F) -> Result<Vec<TrialSummary>, DriverError>
    where
        F: FnMut(u32) -> Result<Box<dyn EventLog>, RecordError>,
    {
        let mut summaries = Vec::with_capacity(self.config.simulation.num_trials as usize);
        for trial_no in 1..=self.config.simulation.num_trials {
            let mut log = open_log(trial_no)?;
            summaries.push(self.run_trial(trial_no, log.as_mut()).await?);
        }
        Ok(summaries)
    }

    /// Run one trial, writing one record per step to `log`.
    ///
    /// The log is closed on return, also when the trial fails.
    pub async fn run_trial(
        &mut self,
        trial_no: u32,
        log: &mut dyn EventLog,
    ) -> Result<TrialSummary, DriverError> {
        let result = self.run_steps(trial_no, log).await;
        match result {
            Ok(summary) => {
                log.close()?;
                self.handler.on_event(&DriverEvent::TrialFinished {
                    trial_no,
                    steps: summary.steps,
                    totals: &summary.totals,
                });
                Ok(summary)
            }
            Err(e) => {
                if let Err(close_err) = log.close() {
                    warn!("Trial {trial_no}: failed to close event log after error: {close_err}");
                }
                Err(e)
            }
        }
    }

    async fn run_steps(
        &mut self,
        trial_no: u32,
        log: &mut dyn EventLog,
    ) -> Result<TrialSummary, DriverError> {
        let seed = u64::from(trial_no);
        let mut env = Homeostasis::new(self.config.environment.clone(), seed);
        let mut conversation = Conversation::new(SYSTEM_PROMPT);
        let mut totals = Rewards::default();
        let mut last_rewards: Option<Rewards> = None;

        self.handler.on_event(&DriverEvent::TrialStarted {
            trial_no,
            seed,
            log_path: log.path(),
        });

        let steps = self.config.simulation.steps_per_trial;
        for step_no in 1..=steps {
            let prompt = observation_prompt(env.target(), env.actual(), last_rewards.as_ref());
            conversation.push_user(prompt.as_str());

            let outcome = conversation.trim_to_budget(&self.budget);
            if outcome.dropped_pairs > 0 || outcome.over_budget {
                self.handler.on_event(&DriverEvent::ContextTrimmed {
                    trial_no,
                    step_no,
                    outcome: &outcome,
                });
            }
            debug!(
                "Trial {trial_no} step {step_no} {}",
                self.budget.estimate_usage(conversation.messages()).to_log_string()
            );

            let (action, response) = self.query_action(trial_no, step_no, &conversation).await?;
            conversation.push_assistant(response);

            let t = env.step(action);
            totals += t.rewards;
            last_rewards = Some(t.rewards);

            let record = StepRecord {
                model_name: self.config.model.name.clone(),
                trial_no,
                step_no,
                prompt,
                action: action.amount(),
                action_explanation: String::new(),
                random_homeostatic_level_change: t.perturbation,
                homeostatic_target: env.target(),
                prev_homeostatic_actual: t.prev_actual,
                homeostatic_actual: t.actual,
                consumption_reward: t.rewards.consumption,
                undersatiation_reward: t.rewards.undersatiation,
                oversatiation_reward: t.rewards.oversatiation,
                total_consumption_reward: totals.consumption,
                total_undersatiation_reward: totals.undersatiation,
                total_oversatiation_reward: totals.oversatiation,
            };
            log.log_event(&record)?;
            log.flush()?;
            self.handler.on_event(&DriverEvent::StepCompleted(&record));
        }

        Ok(TrialSummary {
            trial_no,
            steps,
            final_actual: env.actual(),
            totals,
        })
    }

    /// Ask until the model gives a non-negative integer. Invalid answers are
    /// reported and never enter the conversation.
    async fn query_action(
        &mut self,
        trial_no: u32,
        step_no: u32,
        conversation: &Conversation,
    ) -> Result<(Action, String), DriverError> {
        let request = CompletionRequest {
            model: self.config.model.name.clone(),
            messages: conversation.messages().to_vec(),
            temperature: self.config.model.temperature,
            max_output_tokens: self.config.model.max_output_tokens,
        };

        loop {
            let completion = self.gateway.complete(&request).await?;
            let response = completion.content.trim().to_string();
            debug!("Trial {trial_no} step {step_no} response: {response:?}");

            match Action::parse(&response) {
                Ok(action) => return Ok((action, response)),
                Err(reason) => self.handler.on_event(&DriverEvent::InvalidAction {
                    trial_no,
                    step_no,
                    response: &response,
                    reason: &reason,
                }),
            }
        }
    }
}
