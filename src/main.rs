//! cadence - a quota-aware interval job runner.
//!
//! Usage:
//!   cadence run <config.yaml>       Run the scheduler and liveness listener
//!   cadence validate <config.yaml>  Validate the configuration without running
//!   cadence list <config.yaml>      List the configured jobs

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

use cadence::api::{self, ApiConfig};
use cadence::config::{self, ConfigFile, JobConfig};
use cadence::{
    CommandWorker, Event, EventBus, EventHandler, HttpPinger, Scheduler, Worker,
};

/// cadence - a quota-aware interval job runner
#[derive(Parser)]
#[command(name = "cadence")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the scheduler and liveness listener
    Run {
        /// Path to the YAML configuration file
        #[arg(value_name = "CONFIG")]
        config: PathBuf,
    },

    /// Validate the configuration without running
    Validate {
        /// Path to the YAML configuration file
        #[arg(value_name = "CONFIG")]
        config: PathBuf,
    },

    /// List the configured jobs
    List {
        /// Path to the YAML configuration file
        #[arg(value_name = "CONFIG")]
        config: PathBuf,
    },
}

/// Event handler that writes lifecycle events to the log.
struct LoggingHandler;

#[async_trait::async_trait]
impl EventHandler for LoggingHandler {
    async fn handle(&self, event: &Event) {
        match event {
            Event::UnitCompleted { job_id, done_today } => {
                info!("Job '{}' completed a unit ({} today)", job_id, done_today);
            }
            Event::UnitFailed { job_id, error } => {
                warn!("Job '{}' unit failed: {}", job_id, error);
            }
            Event::BatchFinished { job_id, report } => {
                info!(
                    "Job '{}' batch finished: {} executed, {} failed, {} skipped",
                    job_id, report.executed, report.failed, report.skipped
                );
            }
            Event::RunSkipped { job_id } => {
                info!("Job '{}' tick skipped, run already in flight", job_id);
            }
            Event::CountersReset { date } => {
                info!("Daily counters reset for {}", date);
            }
            Event::PingSucceeded { .. } | Event::PingFailed { .. } => {
                // The keep-alive loop already logs these.
            }
        }
    }
}

fn build_worker(job: &JobConfig) -> Arc<dyn Worker> {
    let mut builder = CommandWorker::builder(job.command.as_str())
        .name(job.name.as_deref().unwrap_or(job.id.as_str()))
        .args(job.args.iter().cloned());

    for (key, value) in &job.env {
        builder = builder.env(key.as_str(), value.as_str());
    }
    if let Some(dir) = &job.working_dir {
        builder = builder.working_dir(dir);
    }
    if let Some(secs) = job.timeout_secs {
        builder = builder.timeout(Duration::from_secs(secs));
    }

    Arc::new(builder.build())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run { config } => run(config).await?,
        Commands::Validate { config } => validate(config)?,
        Commands::List { config } => list(config)?,
    }

    Ok(())
}

async fn run(path: PathBuf) -> Result<(), Box<dyn std::error::Error>> {
    info!("Loading configuration from: {}", path.display());
    let config = ConfigFile::load(&path)?;

    if config.jobs.is_empty() {
        warn!("No jobs configured in {}", path.display());
    }

    // Liveness listener first: hosting platforms expect the port bound
    // promptly.
    let port = config::port_from_env()?;
    let api_task = api::start_server(ApiConfig::new("0.0.0.0", port)).await?;

    let event_bus = EventBus::new();
    event_bus.register(Arc::new(LoggingHandler)).await;

    let mut scheduler = Scheduler::new()
        .with_event_bus(event_bus)
        .with_rollover_interval(Duration::from_secs(config.global.rollover_interval_secs));

    if let Some(url) = &config.global.keepalive_url {
        let pinger = HttpPinger::new(Duration::from_secs(config.global.ping_timeout_secs))?;
        scheduler = scheduler.with_keepalive(
            Arc::new(pinger),
            url.clone(),
            Duration::from_secs(config.global.keepalive_interval_secs),
        );
        info!("Keep-alive configured for {}", url);
    }

    for job in &config.jobs {
        let enabled_info = if job.enabled { "" } else { " (disabled)" };
        info!(
            "  - {} every {}s, daily limit {}{}",
            job.id, job.interval_secs, job.daily_limit, enabled_info
        );
        scheduler.register(job.to_spec(), build_worker(job))?;
    }

    info!("Starting scheduler");
    info!("Press Ctrl+C to stop");
    let handle = scheduler.start();

    tokio::signal::ctrl_c().await?;
    info!("Shutting down...");
    handle.shutdown().await;
    api_task.abort();

    info!("Goodbye!");
    Ok(())
}

fn validate(path: PathBuf) -> Result<(), Box<dyn std::error::Error>> {
    info!("Validating configuration: {}", path.display());

    match ConfigFile::load(&path) {
        Ok(config) => {
            info!("Configuration is valid: {} job(s)", config.jobs.len());
            for job in &config.jobs {
                info!("  - {}: OK", job.id);
            }
            Ok(())
        }
        Err(e) => {
            error!("Validation failed: {}", e);
            Err(e.into())
        }
    }
}

fn list(path: PathBuf) -> Result<(), Box<dyn std::error::Error>> {
    let config = ConfigFile::load(&path)?;

    if config.jobs.is_empty() {
        println!("No jobs configured in {}", path.display());
        return Ok(());
    }

    println!("Jobs in {}:", path.display());
    println!();

    for job in &config.jobs {
        println!("ID: {}", job.id);
        if let Some(name) = &job.name {
            println!("  Name: {}", name);
        }
        println!("  Command: {} {}", job.command, job.args.join(" "));
        println!("  Interval: {}s", job.interval_secs);
        println!("  Daily limit: {}", job.daily_limit);
        println!("  Units per tick: {}", job.units_per_tick);
        if job.unit_pause_secs > 0 {
            println!("  Unit pause: {}s", job.unit_pause_secs);
        }
        println!("  Enabled: {}", job.enabled);
        println!();
    }

    Ok(())
}
