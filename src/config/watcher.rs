//! Watcher process configuration.
//!
//! Loaded from an explicit path, ./expwatch.yml or ~/.config/expwatch/expwatch.yml

use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use super::{DEFAULT_CONFIG_FILENAME, DEFAULT_LOCK_FILENAME};

/// Process-level settings for the experiment watcher.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct WatcherConfig {
    /// Root folder to watch; the CLI argument wins when both are given.
    pub root: Option<PathBuf>,

    /// Polling cadence and worker pool.
    pub watch: WatchConfig,

    /// Fixed filenames inside each experiment folder.
    pub files: FilesConfig,

    /// What to do with folders that did not validate cleanly.
    pub retry: RetryConfig,

    /// Report sinks.
    pub report: ReportConfig,
}

/// Polling cadence and worker pool.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct WatchConfig {
    /// Sleep between polls in microseconds.
    #[serde(rename = "sleep-us")]
    pub sleep_us: u64,

    /// Maximum experiments validated at once.
    pub workers: usize,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            sleep_us: 500_000,
            workers: 4,
        }
    }
}

impl WatchConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_micros(self.sleep_us)
    }
}

/// Names of the per-experiment config document and lock artifact.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct FilesConfig {
    /// Per-experiment config document.
    pub config: String,

    /// Lock artifact created when a folder is claimed.
    pub lock: String,
}

impl Default for FilesConfig {
    fn default() -> Self {
        Self {
            config: DEFAULT_CONFIG_FILENAME.to_string(),
            lock: DEFAULT_LOCK_FILENAME.to_string(),
        }
    }
}

/// Retry policy for experiments that did not validate cleanly.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Release the claim after a config parse or read error.
    #[serde(rename = "on-error")]
    pub on_error: bool,

    /// Release the claim when a sentence file is missing.
    #[serde(rename = "on-incomplete")]
    pub on_incomplete: bool,

    /// Release claims left behind by a killed watcher at startup.
    #[serde(rename = "reclaim-interrupted")]
    pub reclaim_interrupted: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            on_error: true,
            on_incomplete: false,
            reclaim_interrupted: false,
        }
    }
}

/// Report sinks.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ReportConfig {
    /// Print one colored line per experiment to stdout.
    pub console: bool,

    /// Append one JSON object per experiment to this file.
    pub jsonl: Option<PathBuf>,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            console: true,
            jsonl: None,
        }
    }
}

impl WatcherConfig {
    /// Load configuration with fallback chain.
    ///
    /// Search order:
    /// 1. Explicit path if provided
    /// 2. ./expwatch.yml
    /// 3. ~/.config/expwatch/expwatch.yml
    /// 4. Defaults
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        // Explicit path takes precedence
        if let Some(path) = config_path {
            return Self::load_from_file(path).context(format!("Failed to load config from {}", path.display()));
        }

        let project_name = env!("CARGO_PKG_NAME");

        // Try project config
        let project_config = PathBuf::from(format!("{}.yml", project_name));
        if project_config.exists() {
            match Self::load_from_file(&project_config) {
                Ok(config) => {
                    log::info!("Loaded config from {}", project_config.display());
                    return Ok(config);
                }
                Err(e) => {
                    log::warn!("Failed to load {}: {}", project_config.display(), e);
                }
            }
        }

        // Try user config
        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join(project_name).join(format!("{}.yml", project_name));
            if user_config.exists() {
                match Self::load_from_file(&user_config) {
                    Ok(config) => {
                        log::info!("Loaded config from {}", user_config.display());
                        return Ok(config);
                    }
                    Err(e) => {
                        log::warn!("Failed to load {}: {}", user_config.display(), e);
                    }
                }
            }
        }

        log::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).context("Failed to read config file")?;
        let config: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.watch.workers == 0 {
            eyre::bail!("watch.workers must be > 0");
        }
        if self.watch.sleep_us == 0 {
            eyre::bail!("watch.sleep-us must be > 0");
        }
        if self.files.config.trim().is_empty() {
            eyre::bail!("files.config must not be empty");
        }
        if self.files.lock.trim().is_empty() {
            eyre::bail!("files.lock must not be empty");
        }
        Ok(())
    }
}
