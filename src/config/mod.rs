//! Configuration system for expwatch.
//!
//! Two layers:
//! 1. Watcher config (./expwatch.yml or ~/.config/expwatch/expwatch.yml)
//! 2. Per-experiment config document inside each experiment folder

pub use self::experiment::{ConfigResolver, ExperimentConfig};
pub use self::watcher::{FilesConfig, ReportConfig, RetryConfig, WatchConfig, WatcherConfig};

mod experiment;
mod watcher;

/// Per-experiment config document name.
pub const DEFAULT_CONFIG_FILENAME: &str = "config.neon";

/// Source sentence file used when the experiment config does not name one.
pub const DEFAULT_SOURCE_FILENAME: &str = "source.txt";

/// Reference sentence file used when the experiment config does not name one.
pub const DEFAULT_REFERENCE_FILENAME: &str = "reference.txt";

/// Lock artifact created inside a claimed experiment folder.
pub const DEFAULT_LOCK_FILENAME: &str = ".expwatch.lock";

/// Load watcher configuration from the standard search paths.
pub fn load_config(explicit_path: Option<&std::path::PathBuf>) -> eyre::Result<WatcherConfig> {
    let config = WatcherConfig::load(explicit_path)?;
    config.validate()?;
    Ok(config)
}
