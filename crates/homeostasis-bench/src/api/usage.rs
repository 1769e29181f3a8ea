//! Token usage and generation throughput across a run.

use std::time::Duration;

/// Cumulative token counts and timing for every completed request.
#[derive(Debug, Default)]
pub struct UsageTracker {
    pub requests: u64,
    pub total_input_tokens: u64,
    pub total_output_tokens: u64,
    pub total_elapsed: Duration,
}

impl UsageTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one completed request.
    pub fn record(&mut self, input_tokens: usize, output_tokens: usize, elapsed: Duration) {
        self.requests += 1;
        self.total_input_tokens += input_tokens as u64;
        self.total_output_tokens += output_tokens as u64;
        self.total_elapsed += elapsed;
    }

    /// Total tokens consumed.
    pub fn total_tokens(&self) -> u64 {
        self.total_input_tokens + self.total_output_tokens
    }

    /// Average output tokens per second over all requests.
    pub fn output_tokens_per_sec(&self) -> f64 {
        tokens_per_sec(self.total_output_tokens as usize, self.total_elapsed)
    }

    /// Format as a short summary string.
    pub fn summary(&self) -> String {
        format!(
            "requests: {}, tokens: {} input + {} output = {} total, {:.1} output tokens/sec",
            self.requests,
            self.total_input_tokens,
            self.total_output_tokens,
            self.total_tokens(),
            self.output_tokens_per_sec(),
        )
    }
}

/// Throughput of a single request; zero when no time elapsed.
pub fn tokens_per_sec(tokens: usize, elapsed: Duration) -> f64 {
    let secs = elapsed.as_secs_f64();
    if secs > 0.0 {
        tokens as f64 / secs
    } else {
        0.0
    }
}
