//! Per-experiment configuration.
//!
//! Each experiment folder may carry a small key/value document (default
//! `config.neon`, YAML mapping syntax) naming its sentence files. Recognized
//! keys fall back to built-in defaults; anything else is kept but unused.

use std::collections::BTreeMap;
use std::fs;

use serde::Deserialize;

use super::{DEFAULT_CONFIG_FILENAME, DEFAULT_REFERENCE_FILENAME, DEFAULT_SOURCE_FILENAME};
use crate::domain::ExperimentFolder;
use crate::error::{Result, WatchError};

/// Document shape as written by the experiment producer.
#[derive(Debug, Default, Deserialize)]
struct RawExperimentConfig {
    source: Option<String>,
    reference: Option<String>,
    #[serde(flatten)]
    extra: BTreeMap<String, serde_yaml::Value>,
}

/// Effective settings for one experiment, defaults already applied.
#[derive(Debug, Clone, PartialEq)]
pub struct ExperimentConfig {
    pub source_filename: String,
    pub reference_filename: String,
    /// Unrecognized keys from the document
    pub extra: BTreeMap<String, serde_yaml::Value>,
}

impl Default for ExperimentConfig {
    fn default() -> Self {
        RawExperimentConfig::default().into()
    }
}

impl From<RawExperimentConfig> for ExperimentConfig {
    fn from(raw: RawExperimentConfig) -> Self {
        Self {
            source_filename: raw.source.unwrap_or_else(|| DEFAULT_SOURCE_FILENAME.to_string()),
            reference_filename: raw.reference.unwrap_or_else(|| DEFAULT_REFERENCE_FILENAME.to_string()),
            extra: raw.extra,
        }
    }
}

impl ExperimentConfig {
    /// Parse a config document; blank documents mean "all defaults"
    pub fn parse(content: &str) -> std::result::Result<Self, serde_yaml::Error> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        let raw: RawExperimentConfig = serde_yaml::from_str(content)?;
        Ok(raw.into())
    }
}

/// Resolves the effective config of an experiment folder.
#[derive(Debug, Clone)]
pub struct ConfigResolver {
    config_filename: String,
}

impl Default for ConfigResolver {
    fn default() -> Self {
        Self::new(DEFAULT_CONFIG_FILENAME)
    }
}

impl ConfigResolver {
    pub fn new(config_filename: impl Into<String>) -> Self {
        Self {
            config_filename: config_filename.into(),
        }
    }

    /// Load the folder's config document if present and merge it over the defaults.
    pub fn resolve(&self, folder: &ExperimentFolder) -> Result<ExperimentConfig> {
        if !folder.file_exists(&self.config_filename) {
            log::debug!("{}: no {}, using defaults", folder.name(), self.config_filename);
            return Ok(ExperimentConfig::default());
        }

        let path = folder.child_path(&self.config_filename);
        let content = fs::read_to_string(&path).map_err(|e| WatchError::Read(format!("{}: {}", path.display(), e)))?;

        let config = ExperimentConfig::parse(&content)
            .map_err(|e| WatchError::ConfigParse(format!("{}: {}", path.display(), e)))?;

        if !config.extra.is_empty() {
            log::debug!(
                "{}: ignoring config keys {:?}",
                folder.name(),
                config.extra.keys().collect::<Vec<_>>()
            );
        }
        Ok(config)
    }
}
