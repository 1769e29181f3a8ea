//! Automatic retry with randomized exponential backoff.
//!
//! Every attempt gets a timeout of `base_timeout * 2^(attempt-1)`. Read
//! timeouts, network errors and malformed responses are retried after a
//! random delay drawn from `[min_delay, clamp(multiplier * 2^(attempt-1))]`.
//! Any other error is shown to the operator, acknowledged, and surfaced
//! without another attempt.

use std::future::Future;
use std::time::Duration;

use rand::Rng;
use tracing::{error, warn};

use super::error::GatewayError;
use crate::ui::Acknowledge;

/// Largest exponent used for timeout and backoff growth.
const MAX_EXPONENT: u32 = 30;

/// Configuration for retry behavior.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Total attempts including the first one (1 = never retry).
    pub max_attempts: u32,
    /// Lower bound of every backoff delay.
    pub min_delay: Duration,
    /// Upper bound of every backoff delay.
    pub max_delay: Duration,
    /// Scale of the exponential curve, in seconds.
    pub multiplier: f64,
    /// Draw the delay uniformly from `[min_delay, exponential]` instead of
    /// always waiting the full exponential delay.
    pub jitter: bool,
    /// Timeout of the first attempt; doubled on each subsequent attempt.
    pub base_timeout: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 10,
            min_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
            multiplier: 1.0,
            jitter: true,
            base_timeout: Duration::from_secs(60),
        }
    }
}

impl RetryConfig {
    /// Create a config with the given attempt cap. Uses sensible defaults.
    pub fn with_attempts(attempts: u32) -> Self {
        Self {
            max_attempts: attempts,
            ..Default::default()
        }
    }

    /// A config that retries immediately, for tests and local stubs.
    pub fn immediate(attempts: u32) -> Self {
        Self {
            max_attempts: attempts,
            min_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            jitter: false,
            ..Default::default()
        }
    }

    /// Timeout for a given attempt number (1-indexed).
    pub fn timeout_for_attempt(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(MAX_EXPONENT);
        self.base_timeout.saturating_mul(1u32 << exponent)
    }

    /// Backoff delay after a failed attempt (1-indexed).
    pub fn delay_after_attempt(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(MAX_EXPONENT);
        let exponential = self.multiplier * 2f64.powi(exponent as i32);

        let min = self.min_delay.as_secs_f64();
        let max = self.max_delay.as_secs_f64().max(min);
        let high = exponential.clamp(min, max);

        if self.jitter && high > min {
            Duration::from_secs_f64(rand::thread_rng().gen_range(min..=high))
        } else {
            Duration::from_secs_f64(high)
        }
    }
}

/// Run `call` until it succeeds, the error is permanent, or the attempt cap
/// is reached.
///
/// `call` receives the attempt number (1-indexed) and that attempt's
/// timeout. Permanent errors trigger one operator acknowledgment before they
/// are returned.
pub async fn retry_with_backoff<T, F, Fut>(
    config: &RetryConfig,
    acknowledge: &dyn Acknowledge,
    mut call: F,
) -> Result<T, GatewayError>
where
    F: FnMut(u32, Duration) -> Fut,
    Fut: Future<Output = Result<T, GatewayError>>,
{
    let max_attempts = config.max_attempts.max(1);
    let mut attempt = 1;
    loop {
        let timeout = config.timeout_for_attempt(attempt);
        let err = match call(attempt, timeout).await {
            Ok(v) => return Ok(v),
            Err(e) => e,
        };

        if !err.is_transient() {
            error!("Request failed (attempt {attempt}/{max_attempts}): {err}");
            acknowledge.acknowledge("Press Enter to acknowledge the error");
            return Err(err);
        }

        if attempt >= max_attempts {
            warn!("{}, giving up after {attempt} attempt(s): {err}", err.retry_label());
            return Err(err);
        }

        let delay = config.delay_after_attempt(attempt);
        warn!(
            "{}, retrying (attempt {}/{}) in {delay:?}: {err}",
            err.retry_label(),
            attempt,
            max_attempts,
        );
        tokio::time::sleep(delay).await;
        attempt += 1;
    }
}
