//! Operator interaction.
//!
//! The benchmark is unattended except for one moment: when a provider call
//! fails with an error that retrying will not fix, the operator is asked to
//! acknowledge it before the run aborts. [`Acknowledge`] is the seam; the
//! binary uses [`StdinAcknowledge`] unless `--non-interactive` is passed.

use std::io::{self, BufRead, Write};

/// Blocks until the operator has seen a failure.
pub trait Acknowledge: Send + Sync {
    fn acknowledge(&self, prompt: &str);
}

/// Prints the prompt to stderr and waits for a line on stdin.
pub struct StdinAcknowledge;

impl Acknowledge for StdinAcknowledge {
    fn acknowledge(&self, prompt: &str) {
        let mut stderr = io::stderr();
        let _ = write!(stderr, "{prompt}... ");
        let _ = stderr.flush();
        let mut line = String::new();
        // EOF or a closed stdin counts as acknowledged.
        let _ = io::stdin().lock().read_line(&mut line);
    }
}

/// Acknowledges immediately. For unattended runs and tests.
pub struct AutoAcknowledge;

impl Acknowledge for AutoAcknowledge {
    fn acknowledge(&self, _prompt: &str) {}
}
