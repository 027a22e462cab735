//! Tempo CLI - timed concurrent task runner.

mod demos;
mod plan;
mod render;

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use render::Renderer;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tempo_core::{CountdownReport, GroupReport};
use tempo_execution::{CancelToken, CountdownBuilder, EngineConfig, EventGroup, TaskGroup};
use tokio::task::JoinHandle;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "tempo")]
#[command(about = "Timed concurrent task runner", long_about = None)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Print progress and reports as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Coffee timer: count down and add ingredients on the way
    Countdown {
        /// Value to count down from
        #[arg(long, default_value = "20")]
        from: u64,
        /// Milliseconds per second of demo time
        #[arg(long, default_value = "1000")]
        unit_ms: u64,
        /// Cancel the run after this many milliseconds
        #[arg(long)]
        timeout_ms: Option<u64>,
    },
    /// Coffee shop: ten preparation events firing concurrently
    Brew {
        /// Milliseconds per second of demo time
        #[arg(long, default_value = "1000")]
        unit_ms: u64,
        /// Cancel the run after this many milliseconds
        #[arg(long)]
        timeout_ms: Option<u64>,
    },
    /// Three customers ordering at the same time
    Orders {
        /// Milliseconds per second of demo time
        #[arg(long, default_value = "1000")]
        unit_ms: u64,
        /// Cancel the run after this many milliseconds
        #[arg(long)]
        timeout_ms: Option<u64>,
    },
    /// Run a JSON plan file
    Run {
        /// Plan file
        plan: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let interrupt = CancelToken::new();
    {
        let interrupt = interrupt.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("Received Ctrl-C, cancelling");
                interrupt.cancel();
            }
        });
    }

    match cli.command {
        Commands::Countdown {
            from,
            unit_ms,
            timeout_ms,
        } => {
            let unit = Duration::from_millis(unit_ms);
            let renderer = Renderer::new(cli.json, unit);
            let (builder, cup) = demos::coffee_timer(from, unit);

            if !cli.json {
                println!("=== Coffee Making Process Started ===\n");
            }
            let builder = builder.config(config(timeout_ms));
            let report = run_countdown(builder, renderer, &interrupt).await?;
            renderer.countdown_report(&report)?;
            debug!("Cup contains {:?}", cup.contents());

            check_countdown(&report)?;
            if !cli.json {
                println!("\n=== Coffee is Ready! Enjoy! ===");
            }
        }
        Commands::Brew {
            unit_ms,
            timeout_ms,
        } => {
            let unit = Duration::from_millis(unit_ms);
            let renderer = Renderer::new(cli.json, unit);
            let group = EventGroup::new(demos::coffee_shop(unit))?;

            if !cli.json {
                println!("☕ Starting coffee making process...\n");
                println!("📋 {} events scheduled.", group.events().len());
            }
            let report = run_events(group, renderer, config(timeout_ms), &interrupt).await?;
            renderer.group_report(&report)?;
            check_group(&report)?;
        }
        Commands::Orders {
            unit_ms,
            timeout_ms,
        } => {
            let unit = Duration::from_millis(unit_ms);
            let renderer = Renderer::new(cli.json, unit);
            let tasks = demos::customer_orders(unit, move |who: &str, line: &str| {
                renderer.say(who, line)
            });

            let report =
                run_tasks(TaskGroup::new(tasks)?, renderer, config(timeout_ms), &interrupt)
                    .await?;
            renderer.group_report(&report)?;
            check_group(&report)?;
        }
        Commands::Run { plan: path } => {
            let plan = plan::Plan::load(&path)?;
            let renderer = Renderer::new(cli.json, Duration::from_secs(1));
            let config = plan.config()?;

            // Validate everything before anything runs
            let countdown = plan.countdown()?;
            let events = plan.events()?;
            let tasks = plan.tasks(move |who: &str, line: &str| renderer.say(who, line))?;
            let mut failed = false;

            if let Some(builder) = countdown {
                let report = run_countdown(builder, renderer, &interrupt).await?;
                renderer.countdown_report(&report)?;
                failed |= check_countdown(&report).is_err();
            }
            if !events.is_empty() && !interrupt.is_cancelled() {
                let group = EventGroup::new(events)?;
                let report = run_events(group, renderer, config.clone(), &interrupt).await?;
                renderer.group_report(&report)?;
                failed |= check_group(&report).is_err();
            }
            if !tasks.is_empty() && !interrupt.is_cancelled() {
                let group = TaskGroup::new(tasks)?;
                let report = run_tasks(group, renderer, config, &interrupt).await?;
                renderer.group_report(&report)?;
                failed |= check_group(&report).is_err();
            }

            if failed {
                bail!("Plan did not complete successfully");
            }
        }
    }

    Ok(())
}

fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn config(timeout_ms: Option<u64>) -> EngineConfig {
    match timeout_ms {
        Some(ms) => EngineConfig::new().with_deadline(Duration::from_millis(ms)),
        None => EngineConfig::new(),
    }
}

/// Raise `target` once `interrupt` is raised.
fn forward(interrupt: &CancelToken, target: CancelToken) -> JoinHandle<()> {
    let interrupt = interrupt.clone();
    tokio::spawn(async move {
        interrupt.cancelled().await;
        target.cancel();
    })
}

async fn run_countdown(
    builder: CountdownBuilder,
    renderer: Renderer,
    interrupt: &CancelToken,
) -> Result<CountdownReport> {
    let countdown = builder.observer(Arc::new(renderer)).build()?;

    let forwarder = forward(interrupt, countdown.cancel_token());
    let report = countdown.start().await;
    forwarder.abort();
    Ok(report?)
}

async fn run_events(
    group: EventGroup,
    renderer: Renderer,
    config: EngineConfig,
    interrupt: &CancelToken,
) -> Result<GroupReport> {
    let group = group
        .with_observer(Arc::new(renderer))
        .with_config(config);

    let forwarder = forward(interrupt, group.cancel_token());
    let report = group.run_all().await;
    forwarder.abort();
    Ok(report?)
}

async fn run_tasks(
    group: TaskGroup,
    renderer: Renderer,
    config: EngineConfig,
    interrupt: &CancelToken,
) -> Result<GroupReport> {
    let group = group
        .with_observer(Arc::new(renderer))
        .with_config(config);

    let forwarder = forward(interrupt, group.cancel_token());
    let report = group.run_independent().await;
    forwarder.abort();
    Ok(report?)
}

fn check_countdown(report: &CountdownReport) -> Result<()> {
    if !report.is_complete() {
        bail!("Countdown stopped at {:?}", report.interrupted_at);
    }
    let failed = report.failed_milestones().len() + report.tick_failures.len();
    if failed > 0 {
        bail!("{} countdown action(s) failed", failed);
    }
    Ok(())
}

fn check_group(report: &GroupReport) -> Result<()> {
    if !report.is_success() {
        bail!(
            "{} failed, {} skipped",
            report.failed().len(),
            report.skipped().len()
        );
    }
    Ok(())
}
