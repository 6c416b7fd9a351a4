//! relance - a small time-driven job runner.
//!
//! Usage:
//!   relance run --config <file>       Run the scheduler
//!   relance validate --config <file>  Validate the configuration without running
//!   relance list --config <file>     List configured entries and built-in jobs
//!   relance trigger <job> --config <file>  Run one job now and wait for it

use clap::{Parser, Subcommand};
use relance::{Config, Event, EventBus, EventHandler, JobRegistry, Scheduler};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

/// relance - a small time-driven job runner
#[derive(Parser)]
#[command(name = "relance")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the scheduler
    Run {
        /// Path to the configuration file
        #[arg(short, long, value_name = "FILE", default_value = "relance.yaml")]
        config: PathBuf,
    },

    /// Validate the configuration without running
    Validate {
        /// Path to the configuration file
        #[arg(short, long, value_name = "FILE", default_value = "relance.yaml")]
        config: PathBuf,
    },

    /// List configured entries and their next fire times
    List {
        /// Path to the configuration file
        #[arg(short, long, value_name = "FILE", default_value = "relance.yaml")]
        config: PathBuf,

        /// How many upcoming fire times to show per entry
        #[arg(short = 'n', long, default_value = "3")]
        count: usize,
    },

    /// Trigger a job manually (one-shot execution)
    Trigger {
        /// Job name to trigger
        #[arg(value_name = "JOB")]
        job: String,

        /// Path to the configuration file
        #[arg(short, long, value_name = "FILE", default_value = "relance.yaml")]
        config: PathBuf,
    },
}

/// Simple logging event handler that prints scheduler events.
struct LoggingHandler;

#[async_trait::async_trait]
impl EventHandler for LoggingHandler {
    async fn handle(&self, event: &Event) {
        match event {
            Event::JobArmed {
                job_id, next_fire, ..
            } => {
                info!("Job '{}' armed, next fire at {}", job_id, next_fire);
            }
            Event::JobTriggered {
                job_id, run_id, ..
            } => {
                info!("Job '{}' triggered (run: {})", job_id, run_id);
            }
            Event::JobSkipped { job_id, reason, .. } => {
                warn!("Job '{}' skipped: {}", job_id, reason);
            }
            Event::AttemptStarted {
                job_id,
                attempt,
                max_attempts,
                ..
            } => {
                info!("  Job '{}' attempt {}/{}", job_id, attempt, max_attempts);
            }
            Event::AttemptFailed {
                job_id,
                attempt,
                error,
                ..
            } => {
                warn!("  Job '{}' attempt {} failed: {}", job_id, attempt, error);
            }
            Event::JobCompleted {
                job_id,
                run_id,
                success,
                attempts,
                duration,
                error,
                ..
            } => {
                if *success {
                    info!(
                        "Job '{}' completed in {:?} after {} attempt(s) (run: {})",
                        job_id, duration, attempts, run_id
                    );
                } else {
                    let reason = error.as_deref().unwrap_or("unknown");
                    error!(
                        "Job '{}' failed after {} attempt(s) in {:?}: {} (run: {})",
                        job_id, attempts, duration, reason, run_id
                    );
                }
            }
            _ => {}
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run { config } => {
            run_scheduler(config).await?;
        }
        Commands::Validate { config } => {
            validate_config(config)?;
        }
        Commands::List { config, count } => {
            list_entries(config, count)?;
        }
        Commands::Trigger { job, config } => {
            trigger_job(config, job).await?;
        }
    }

    Ok(())
}

/// Run the scheduler from a configuration file.
async fn run_scheduler(config_path: PathBuf) -> Result<(), Box<dyn std::error::Error>> {
    info!("Loading configuration from: {}", config_path.display());
    let config = Config::load(&config_path)?;

    if config.jobs.is_empty() {
        warn!("No job entries in {}", config_path.display());
        return Ok(());
    }

    let event_bus = Arc::new(EventBus::new());
    event_bus.register(Arc::new(LoggingHandler)).await;

    let registry = Arc::new(JobRegistry::builtin());
    let scheduler =
        Scheduler::from_config(&config, registry)?.with_event_bus(Arc::clone(&event_bus));

    info!(
        "Starting scheduler ({} entries, tick interval: {}s)...",
        config.jobs.len(),
        config.tick_interval_secs
    );
    info!("Press Ctrl+C to stop");

    let (handle, scheduler_task) = scheduler.start().await;

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("Shutting down...");
            handle.shutdown().await?;
        }
        _ = scheduler_task => {
            info!("Scheduler stopped");
        }
    }

    info!("Goodbye!");
    Ok(())
}

/// Validate a configuration file without running anything.
fn validate_config(config_path: PathBuf) -> Result<(), Box<dyn std::error::Error>> {
    info!("Validating: {}", config_path.display());

    match Config::load(&config_path) {
        Ok(config) => {
            let registry = JobRegistry::builtin();
            info!("Configuration is valid, {} entries:", config.jobs.len());
            for entry in &config.jobs {
                let known = if registry.contains(&entry.name) {
                    "OK"
                } else {
                    "unknown job"
                };
                info!("  - {} ({}): {}", entry.name, entry.schedule.cron(), known);
            }
            Ok(())
        }
        Err(e) => {
            error!("Validation failed: {}", e);
            Err(e.into())
        }
    }
}

/// List configured entries with their upcoming fire times.
fn list_entries(config_path: PathBuf, count: usize) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load(&config_path)?;
    let registry = JobRegistry::builtin();

    if config.jobs.is_empty() {
        println!("No job entries in {}", config_path.display());
        return Ok(());
    }

    println!("Entries in {}:", config_path.display());
    println!();

    let now = chrono::Utc::now();
    for entry in &config.jobs {
        println!("Job: {}", entry.name);
        println!("  Known: {}", registry.contains(&entry.name));
        println!("  Enabled: {}", entry.enabled);
        println!("  Overlap: {:?}", entry.overlap);

        let schedule = config.schedule_for(entry)?;
        println!(
            "  Schedule: {} ({})",
            schedule.expression(),
            schedule.timezone()
        );
        match schedule.next_n_after(now, count) {
            Ok(upcoming) => {
                for fire in upcoming {
                    println!("    next: {}", fire);
                }
            }
            Err(e) => println!("    no upcoming fires: {}", e),
        }
        println!();
    }

    println!("Built-in jobs: {}", registry.names().join(", "));
    Ok(())
}

/// Event handler that signals when a specific job completes.
struct CompletionWatcher {
    target: String,
    completed: Arc<tokio::sync::Notify>,
}

#[async_trait::async_trait]
impl EventHandler for CompletionWatcher {
    async fn handle(&self, event: &Event) {
        if let Event::JobCompleted { job_id, .. } = event {
            if job_id.as_str() == self.target {
                self.completed.notify_one();
            }
        }
    }
}

/// Trigger a specific job and wait for it to complete.
async fn trigger_job(
    config_path: PathBuf,
    job: String,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load(&config_path)?;
    let registry = Arc::new(JobRegistry::builtin());

    if !registry.contains(&job) {
        error!("Job '{}' not found", job);
        error!("Available jobs: {}", registry.names().join(", "));
        return Err(format!("Job '{}' not found", job).into());
    }

    let event_bus = Arc::new(EventBus::new());
    event_bus.register(Arc::new(LoggingHandler)).await;

    let completed = Arc::new(tokio::sync::Notify::new());
    let watcher = CompletionWatcher {
        target: job.clone(),
        completed: completed.clone(),
    };
    event_bus.register(Arc::new(watcher)).await;

    let scheduler =
        Scheduler::from_config(&config, registry)?.with_event_bus(Arc::clone(&event_bus));
    let (handle, _scheduler_task) = scheduler.start().await;

    info!("Triggering job '{}'...", job);
    match handle.trigger(job.clone()).await {
        Ok(run_id) => {
            info!("Job triggered (run: {})", run_id);

            tokio::select! {
                _ = completed.notified() => {}
                _ = tokio::time::sleep(Duration::from_secs(3600)) => {
                    warn!("Job timed out after 1 hour");
                }
            }
        }
        Err(e) => {
            error!("Failed to trigger job: {}", e);
            handle.shutdown().await?;
            return Err(e.into());
        }
    }

    handle.shutdown().await?;
    info!("Done!");
    Ok(())
}
