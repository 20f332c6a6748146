//! QueryRunner - resumable hourly remote SQL runner
//!
//! CLI entry point for running, planning and checking configured steps.

use std::sync::Arc;

use chrono::Local;
use clap::Parser;
use colored::Colorize;
use eyre::{Context, Result};
use tracing::info;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, Registry, reload};

use queryrunner::alert::{self, Alerter};
use queryrunner::cli::{Cli, Command};
use queryrunner::config::Config;
use queryrunner::coordinator::{Coordinator, StepOutcome};
use queryrunner::lock::RunLock;
use queryrunner::service::{HttpQueryService, QueryService};
use queryrunner::store::{LocalObjectStore, ObjectStore};

type FilterHandle = reload::Handle<EnvFilter, Registry>;

fn level_filter(level: Option<&str>) -> Result<EnvFilter> {
    let level: tracing::Level = level
        .unwrap_or("info")
        .parse()
        .context(format!("Invalid log level '{}'", level.unwrap_or_default()))?;
    Ok(EnvFilter::from_default_env().add_directive(level.into()))
}

fn setup_logging(level: Option<&str>) -> Result<FilterHandle> {
    let (filter, handle) = reload::Layer::new(level_filter(level)?);

    // Batch job: logs go to stderr, results to stdout
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    info!("Logging initialized (level: {})", level.unwrap_or("info"));
    Ok(handle)
}

fn build_coordinator(config: &Config) -> Result<Coordinator> {
    let service: Arc<dyn QueryService> =
        Arc::new(HttpQueryService::from_config(&config.service).context("Failed to build query service client")?);
    let store: Arc<dyn ObjectStore> = Arc::new(LocalObjectStore::new(&config.store.root));
    let alerter: Arc<dyn Alerter> = Arc::from(alert::from_config(&config.alert));
    Ok(Coordinator::new(service, store, alerter))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let filter = setup_logging(cli.log_level.as_deref()).context("Failed to setup logging")?;

    // Load configuration
    let config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;

    // --log-level wins over the config file
    if cli.log_level.is_none() && config.log_level.is_some() {
        filter
            .reload(level_filter(config.log_level.as_deref())?)
            .context("Failed to apply configured log level")?;
    }

    info!(
        "QueryRunner loaded config: steps={}, store={}",
        config.steps.len(),
        config.store.root.display()
    );

    // Dispatch command
    match cli.command {
        Command::Run { step } => cmd_run(&config, step.as_deref()).await,
        Command::Plan { step } => cmd_plan(&config, step.as_deref()).await,
        Command::Check => cmd_check(&config),
    }
}

async fn cmd_run(config: &Config, step: Option<&str>) -> Result<()> {
    config.validate().context("Invalid configuration")?;
    let steps = config.selected_steps(step)?;
    let _lock = RunLock::acquire(&config.store.root)?;
    let coordinator = build_coordinator(config)?;

    let outcomes = coordinator.run_all(&steps, Local::now().naive_local()).await?;

    let mut all_ok = true;
    for (name, outcome) in &outcomes {
        match outcome {
            StepOutcome::NothingToDo => println!("{} {}", name.bold(), "nothing to do".dimmed()),
            StepOutcome::Completed { units, report } => println!(
                "{} {} ({} units, {} cycles, {}s)",
                name.bold(),
                "completed".green(),
                units,
                report.cycles,
                report.elapsed.as_secs()
            ),
            StepOutcome::TimedOut { units, report } => {
                all_ok = false;
                println!(
                    "{} {} ({} units, {} completed, {}s)",
                    name.bold(),
                    "timed out".yellow(),
                    units,
                    report.stats.total_completed,
                    report.elapsed.as_secs()
                );
            }
        }
    }

    if !all_ok {
        std::process::exit(1);
    }
    Ok(())
}

async fn cmd_plan(config: &Config, step: Option<&str>) -> Result<()> {
    config.validate().context("Invalid configuration")?;
    let coordinator = build_coordinator(config)?;
    let now = Local::now().naive_local();

    for step in config.selected_steps(step)? {
        let plan = coordinator.plan(step, now).await?;
        println!(
            "{} ({} days, {} slots, {} succeeded, {} new)",
            step.name.bold(),
            plan.summary.days,
            plan.summary.slots,
            plan.summary.succeeded,
            plan.added
        );
        if plan.outstanding.is_empty() {
            println!("  {}", "nothing outstanding".dimmed());
        }
        for slot in &plan.outstanding {
            println!("  {}", slot.to_string().cyan());
        }
    }
    Ok(())
}

fn cmd_check(config: &Config) -> Result<()> {
    config.validate().context("Invalid configuration")?;
    println!("{} {} steps", "ok".green(), config.steps.len());
    for step in &config.steps {
        let mode = match step.control_days {
            Some(days) => format!("backfill to today{:+}", days),
            None => "current hour".to_string(),
        };
        println!(
            "  {} [{}] concurrency={} retries={} timeout={}s{}",
            step.name.bold(),
            mode,
            step.scheduler.max_concurrency,
            step.scheduler.retry_limit,
            step.scheduler.timeout_secs,
            if step.setup.is_some() { " +setup" } else { "" }
        );
    }
    Ok(())
}
