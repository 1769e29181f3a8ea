//! Benchmark configuration, loaded from a TOML file.
//!
//! Only `[model].name` is required; every other value has a default that
//! matches the reference benchmark setup.
//!
//! ```toml
//! [model]
//! name = "gpt-4o-mini"
//! timeout_secs = 60
//! max_output_tokens = 100
//! temperature = 1.0
//!
//! [simulation]
//! num_trials = 10
//! steps_per_trial = 100
//!
//! [environment]
//! initial_homeostatic_actual = 100
//! homeostatic_target = 100
//! hysteresis = 10
//! max_random_decrease = 5
//! max_random_increase = 3
//!
//! [retry]
//! max_attempts = 10
//! min_backoff_secs = 1.0
//! max_backoff_secs = 60.0
//!
//! [output]
//! dir = "data"
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

use super::environment::HomeostasisParams;
use crate::api::RetryConfig;
use crate::context::ContextBudget;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("reading config: {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("parsing config: {}: {source}", path.display())]
    ParseFile {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("parsing config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

macro_rules! invalid {
    ($($arg:tt)*) => {
        return Err(ConfigError::Invalid(format!($($arg)*)))
    };
}

#[derive(Debug, Clone, Deserialize)]
pub struct BenchmarkConfig {
    pub model: ModelConfig,
    #[serde(default)]
    pub simulation: SimulationConfig,
    #[serde(default)]
    pub environment: HomeostasisParams,
    #[serde(default)]
    pub retry: RetrySettings,
    #[serde(default)]
    pub output: OutputConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ModelConfig {
    pub name: String,
    /// Timeout of the first attempt; doubled on each retry.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_output_tokens")]
    pub max_output_tokens: u32,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    /// Prompt budget in tokens. Defaults to the model's context window.
    #[serde(default)]
    pub context_window: Option<usize>,
    /// Calibrated characters-per-token ratio for the prompt estimate.
    #[serde(default)]
    pub chars_per_token: Option<f64>,
}

fn default_timeout_secs() -> u64 {
    60
}
fn default_max_output_tokens() -> u32 {
    100
}
fn default_temperature() -> f32 {
    1.0
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    pub num_trials: u32,
    pub steps_per_trial: u32,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            num_trials: 10,
            steps_per_trial: 100,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    pub max_attempts: u32,
    pub min_backoff_secs: f64,
    pub max_backoff_secs: f64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: 10,
            min_backoff_secs: 1.0,
            max_backoff_secs: 60.0,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Directory receiving one TSV file per trial.
    pub dir: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("data"),
        }
    }
}

impl BenchmarkConfig {
    /// Config with defaults for everything but the model name.
    pub fn for_model(name: impl Into<String>) -> Self {
        Self {
            model: ModelConfig {
                name: name.into(),
                timeout_secs: default_timeout_secs(),
                max_output_tokens: default_max_output_tokens(),
                temperature: default_temperature(),
                context_window: None,
                chars_per_token: None,
            },
            simulation: SimulationConfig::default(),
            environment: HomeostasisParams::default(),
            retry: RetrySettings::default(),
            output: OutputConfig::default(),
        }
    }

    /// Load and deserialize config from a TOML file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::ParseFile {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: BenchmarkConfig = toml::from_str(content)?;
        Ok(config)
    }

    /// Reject settings the driver cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.model.name.trim().is_empty() {
            invalid!("model.name must not be empty");
        }
        if self.model.max_output_tokens == 0 {
            invalid!("model.max_output_tokens must be positive");
        }
        if !(0.0..=2.0).contains(&self.model.temperature) {
            invalid!(
                "model.temperature must be within 0.0..=2.0, got {}",
                self.model.temperature
            );
        }
        if self.simulation.num_trials == 0 || self.simulation.steps_per_trial == 0 {
            invalid!("simulation.num_trials and simulation.steps_per_trial must be positive");
        }
        let env = &self.environment;
        if env.hysteresis < 0 {
            invalid!("environment.hysteresis must not be negative");
        }
        if env.max_random_decrease < 0 || env.max_random_increase < 0 {
            invalid!("environment.max_random_decrease and max_random_increase must not be negative");
        }
        if self.retry.max_attempts == 0 {
            invalid!("retry.max_attempts must be at least 1");
        }
        let (min, max) = (self.retry.min_backoff_secs, self.retry.max_backoff_secs);
        if !min.is_finite() || !max.is_finite() || min < 0.0 || min > max {
            invalid!(
                "retry backoff bounds invalid: min {} max {}",
                self.retry.min_backoff_secs,
                self.retry.max_backoff_secs
            );
        }
        Ok(())
    }

    /// Retry policy from `[retry]` and the model timeout. Backoff bounds that
    /// are not valid durations fall back to the defaults.
    pub fn retry_config(&self) -> RetryConfig {
        let defaults = RetryConfig::default();
        RetryConfig {
            max_attempts: self.retry.max_attempts,
            min_delay: secs_or(self.retry.min_backoff_secs, defaults.min_delay),
            max_delay: secs_or(self.retry.max_backoff_secs, defaults.max_delay),
            base_timeout: Duration::from_secs(self.model.timeout_secs),
            ..defaults
        }
    }

    pub fn context_budget(&self) -> ContextBudget {
        let mut budget = ContextBudget::for_model(&self.model.name);
        if let Some(max) = self.model.context_window {
            budget = budget.with_max_tokens(max);
        }
        if let Some(cpt) = self.model.chars_per_token {
            budget = budget.with_chars_per_token(cpt);
        }
        budget
    }
}

fn secs_or(secs: f64, fallback: Duration) -> Duration {
    Duration::try_from_secs_f64(secs).unwrap_or(fallback)
}
