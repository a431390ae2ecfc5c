//! CLI command definitions using clap.
//!
//! Defines the main CLI structure and subcommands:
//! - watch: poll a folder for new experiments
//! - check: validate one experiment folder without claiming it
//! - status: list experiments and their lock state
//! - release: drop an experiment's claim so it is processed again

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// expwatch - watches a folder for new experiments and validates their sentence files
#[derive(Parser, Debug)]
#[command(name = "expwatch")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Optional config file path
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Check if verbose mode is enabled
    pub fn is_verbose(&self) -> bool {
        self.verbose
    }
}

/// Main subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Watch a folder for new experiment subfolders
    Watch {
        /// Folder containing experiment subfolders (falls back to `root` from config)
        folder: Option<PathBuf>,

        /// Sleep between polls in microseconds
        #[arg(short, long)]
        sleep: Option<u64>,

        /// Maximum experiments validated at once
        #[arg(short, long)]
        workers: Option<usize>,

        /// Run a single cycle and exit
        #[arg(long)]
        once: bool,
    },

    /// Validate one experiment folder without claiming it
    Check {
        /// Experiment folder
        experiment: PathBuf,
    },

    /// List experiments under a folder with their lock state
    Status {
        /// Folder containing experiment subfolders (falls back to `root` from config)
        folder: Option<PathBuf>,
    },

    /// Remove an experiment's lock so the watcher processes it again
    Release {
        /// Experiment folder
        experiment: PathBuf,
    },
}
