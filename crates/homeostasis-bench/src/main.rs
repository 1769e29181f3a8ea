//! Run the LLM homeostasis benchmark.
//!
//! Reads settings from a TOML config file and the provider API key from
//! `OPENAI_API_KEY` or `ANTHROPIC_API_KEY`, depending on the model. Writes
//! one TSV file per trial into the output directory.
//!
//! # Examples
//!
//! ```sh
//! # Use config.toml in the current directory
//! homeostasis-bench
//!
//! # Quick run against another model, no config file needed
//! homeostasis-bench --model claude-3-5-haiku-latest --trials 2 --steps 20
//!
//! # Unattended: do not wait for an operator on hard failures
//! homeostasis-bench --config runs/gpt4o.toml --non-interactive -v
//! ```

use std::path::PathBuf;
use std::process;

use anyhow::{Context, Result};
use clap::Parser;
use homeostasis_bench::api::CompletionGateway;
use homeostasis_bench::sim::{BenchmarkConfig, Driver, EventLog, LoggingHandler, TsvEventLog};
use homeostasis_bench::ui::AutoAcknowledge;
use tracing::info;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Run the LLM homeostasis benchmark.
#[derive(Parser)]
#[command(name = "homeostasis-bench")]
struct Cli {
    /// TOML config file
    #[arg(long, default_value = "config.toml")]
    config: PathBuf,

    /// Model to benchmark (overrides [model].name)
    #[arg(long)]
    model: Option<String>,

    /// Number of trials (overrides [simulation].num_trials)
    #[arg(long)]
    trials: Option<u32>,

    /// Steps per trial (overrides [simulation].steps_per_trial)
    #[arg(long)]
    steps: Option<u32>,

    /// Directory for the per-trial TSV logs (overrides [output].dir)
    #[arg(long)]
    output_dir: Option<PathBuf>,

    /// Do not wait for the operator to acknowledge a hard failure
    #[arg(long)]
    non_interactive: bool,

    /// Debug-level logging (RUST_LOG takes precedence)
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    if let Err(e) = run(cli).await {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}

/// Build the config from the file plus CLI overrides.
fn load_config(cli: &Cli) -> Result<BenchmarkConfig> {
    let mut config = match (&cli.model, cli.config.exists()) {
        // A model on the command line is enough without a config file.
        (Some(model), false) => BenchmarkConfig::for_model(model.as_str()),
        _ => BenchmarkConfig::load(&cli.config)?,
    };

    if let Some(model) = &cli.model {
        config.model.name = model.clone();
    }
    if let Some(trials) = cli.trials {
        config.simulation.num_trials = trials;
    }
    if let Some(steps) = cli.steps {
        config.simulation.steps_per_trial = steps;
    }
    if let Some(dir) = &cli.output_dir {
        config.output.dir = dir.clone();
    }

    config.validate().context("invalid configuration")?;
    Ok(config)
}

async fn run(cli: Cli) -> Result<()> {
    let config = load_config(&cli)?;
    info!(
        "Benchmarking {} for {} trials of {} steps, logs in {}",
        config.model.name,
        config.simulation.num_trials,
        config.simulation.steps_per_trial,
        config.output.dir.display()
    );

    let mut gateway = CompletionGateway::for_model(&config.model.name)
        .context("failed to create API client")?
        .with_retry(config.retry_config());
    info!("Using {} provider", gateway.provider_kind());
    if cli.non_interactive {
        gateway = gateway.with_acknowledge(AutoAcknowledge);
    }

    let handler = LoggingHandler;
    let summaries = {
        let mut driver = Driver::new(&config, &mut gateway, &handler);
        info!(
            "Context budget: {} tokens for {}",
            driver.budget().max_tokens(),
            driver.budget().model()
        );
        driver
            .run(|_| {
                let log = TsvEventLog::create(&config.output.dir, &config.model.name)?;
                Ok(Box::new(log) as Box<dyn EventLog>)
            })
            .await
            .context("benchmark aborted")?
    };

    for s in &summaries {
        info!(
            "Trial {}: final actual {} totals consumption={} undersatiation={} oversatiation={}",
            s.trial_no, s.final_actual, s.totals.consumption, s.totals.undersatiation, s.totals.oversatiation
        );
    }
    info!("{}", gateway.usage().summary());
    info!("Benchmark finished");
    Ok(())
}
