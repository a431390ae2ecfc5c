//! Per-experiment validation.
//!
//! Resolves the experiment config, loads both sentence files and compares
//! their counts. Reads only; never rewrites anything in the folder.

use crate::config::ConfigResolver;
use crate::domain::{ExperimentFolder, ValidationResult};
use crate::error::Result;
use crate::sentences::SentenceLoader;

/// Validates that an experiment's source and reference files line up.
#[derive(Debug, Clone, Default)]
pub struct ExperimentValidator {
    resolver: ConfigResolver,
    loader: SentenceLoader,
}

impl ExperimentValidator {
    pub fn new(resolver: ConfigResolver) -> Self {
        Self {
            resolver,
            loader: SentenceLoader::new(),
        }
    }

    pub fn validate(&self, folder: &ExperimentFolder) -> Result<ValidationResult> {
        let config = self.resolver.resolve(folder)?;
        log::info!(
            "{}: using {} as source and {} as reference sentences",
            folder.name(),
            config.source_filename,
            config.reference_filename
        );

        let source_count = self
            .loader
            .load(folder, &config.source_filename)?
            .map(|set| set.count());
        let reference_count = self
            .loader
            .load(folder, &config.reference_filename)?
            .map(|set| set.count());

        Ok(ValidationResult::new(
            folder.name(),
            config.source_filename,
            config.reference_filename,
            source_count,
            reference_count,
        ))
    }
}
