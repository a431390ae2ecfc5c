use chrono::Utc;
use clap::Parser;
use colored::*;
use eyre::{Context, Result};
use log::{info, warn};
use std::fs;
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;

mod cli;

use cli::Cli;
use cli::commands::Commands;
use expwatch::config::{self, ConfigResolver, ReportConfig, WatcherConfig};
use expwatch::daemon::{RecoveryAction, Watcher, list_experiments, recover_interrupted};
use expwatch::domain::{ExperimentFolder, ExperimentOutcome, LockState};
use expwatch::lock::ExperimentLock;
use expwatch::report::Reporter;
use expwatch::validator::ExperimentValidator;

fn setup_logging(verbose: bool) -> Result<()> {
    // Create log directory
    let log_dir = dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("expwatch")
        .join("logs");

    fs::create_dir_all(&log_dir).context("Failed to create log directory")?;

    let log_file = log_dir.join("expwatch.log");

    // Setup env_logger with file output
    let target = Box::new(
        fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_file)
            .context("Failed to open log file")?,
    );

    let default_level = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .target(env_logger::Target::Pipe(target))
        .init();

    info!("Logging initialized, writing to: {}", log_file.display());
    if verbose {
        println!("{} {}", "Logging to:".yellow(), log_file.display());
    }
    Ok(())
}

async fn run_application(cli: &Cli, config: &WatcherConfig) -> Result<()> {
    info!("Starting application");

    match &cli.command {
        Commands::Watch {
            folder,
            sleep,
            workers,
            once,
        } => handle_watch_command(folder.as_deref(), *sleep, *workers, *once, config).await,
        Commands::Check { experiment } => handle_check_command(experiment, config),
        Commands::Status { folder } => handle_status_command(folder.as_deref(), config),
        Commands::Release { experiment } => handle_release_command(experiment, config),
    }
}

fn resolve_root(folder: Option<&Path>, config: &WatcherConfig) -> Result<PathBuf> {
    folder
        .map(Path::to_path_buf)
        .or_else(|| config.root.clone())
        .ok_or_else(|| eyre::eyre!("No folder given and no `root` in config"))
}

/// Resolves on Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}

async fn handle_watch_command(
    folder: Option<&Path>,
    sleep: Option<u64>,
    workers: Option<usize>,
    once: bool,
    config: &WatcherConfig,
) -> Result<()> {
    let started_at = Utc::now();
    let root = resolve_root(folder, config)?;

    let mut config = config.clone();
    if let Some(sleep) = sleep {
        config.watch.sleep_us = sleep;
    }
    if let Some(workers) = workers {
        config.watch.workers = workers;
    }
    config.validate().context("Invalid watch options")?;

    println!(
        "{} {}",
        "Experiments watcher is watching folder:".cyan(),
        root.display()
    );

    let mut watcher = Watcher::new(&root, &config);

    if config.retry.reclaim_interrupted {
        let actions = recover_interrupted(watcher.root(), watcher.lock(), started_at)
            .context("Failed to recover interrupted experiments")?;
        for action in actions {
            if let RecoveryAction::Released { experiment } = action {
                println!("{} {}", "Recovered:".yellow(), experiment);
            }
        }
    }

    if once {
        let summary = watcher.run_once().await.context("Watch cycle failed")?;
        info!("Single cycle finished: {:?}", summary);
        println!(
            "{} {} discovered, {} matched, {} mismatched, {} incomplete, {} failed",
            "Cycle:".green(),
            summary.discovered,
            summary.matched,
            summary.mismatched,
            summary.incomplete,
            summary.failed
        );
        return Ok(());
    }

    let cancel = CancellationToken::new();
    let stopper = cancel.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        stopper.cancel();
    });

    watcher.run(cancel).await.context("Watcher stopped")?;
    println!("{}", "Watcher stopped".cyan());
    Ok(())
}

fn handle_check_command(experiment: &Path, config: &WatcherConfig) -> Result<()> {
    info!("Checking experiment: {}", experiment.display());
    if !experiment.is_dir() {
        eyre::bail!("Not an experiment folder: {}", experiment.display());
    }

    let folder = ExperimentFolder::new(experiment);
    let validator = ExperimentValidator::new(ConfigResolver::new(config.files.config.clone()));
    let reporter = Reporter::new(&ReportConfig {
        console: true,
        jsonl: None,
    });

    match validator.validate(&folder) {
        Ok(result) => {
            reporter.report(&ExperimentOutcome::Validated(result));
            Ok(())
        }
        Err(e) => {
            reporter.report(&ExperimentOutcome::Failed {
                experiment: folder.name().to_string(),
                error: e.to_string(),
            });
            Err(e).context(format!("Failed to validate {}", folder.name()))
        }
    }
}

fn handle_status_command(folder: Option<&Path>, config: &WatcherConfig) -> Result<()> {
    let root = resolve_root(folder, config)?;
    info!("Listing experiments in: {}", root.display());

    let lock = ExperimentLock::new(config.files.lock.clone());
    let experiments = list_experiments(&root).context("Failed to list experiments")?;
    if experiments.is_empty() {
        println!("No experiments in {}", root.display());
        return Ok(());
    }

    for folder in experiments {
        let state = lock.state(&folder)?;
        let label = match state {
            LockState::Unclaimed => state.as_str().normal(),
            LockState::Claimed => state.as_str().yellow(),
            LockState::Done => state.as_str().green(),
        };
        println!("{:<10} {}", label, folder.name());
    }
    Ok(())
}

fn handle_release_command(experiment: &Path, config: &WatcherConfig) -> Result<()> {
    info!("Releasing experiment: {}", experiment.display());
    let folder = ExperimentFolder::new(experiment);
    let lock = ExperimentLock::new(config.files.lock.clone());

    if lock.release(&folder)? {
        println!("{} {}", "Released:".green(), folder.name());
    } else {
        println!("{} {} was not claimed", "Nothing to release:".yellow(), folder.name());
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments
    let cli = Cli::parse();

    // Setup logging before loading config so config warnings are captured
    setup_logging(cli.is_verbose()).context("Failed to setup logging")?;

    // Load configuration
    let config = config::load_config(cli.config.as_ref()).context("Failed to load configuration")?;

    info!("Starting with config from: {:?}", cli.config);

    // Run the main application logic
    run_application(&cli, &config).await.context("Application failed")?;

    Ok(())
}
