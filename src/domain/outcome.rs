//! Validation outcome types.
//!
//! A `ValidationResult` is scoped to a single experiment. Counts are `None`
//! when the file is absent, so a missing file can never be compared against
//! a count left over from another experiment.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Line-count reconciliation status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValidationStatus {
    /// Both files present with equal counts
    Match,
    /// Both files present, counts differ
    Mismatch,
    /// At least one file is missing
    Incomplete,
}

impl fmt::Display for ValidationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ValidationStatus::Match => "match",
            ValidationStatus::Mismatch => "mismatch",
            ValidationStatus::Incomplete => "incomplete",
        };
        f.write_str(s)
    }
}

/// Outcome of validating one experiment folder
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationResult {
    /// Experiment folder name
    pub experiment: String,
    /// Source sentence file in use
    pub source_filename: String,
    /// Reference sentence file in use
    pub reference_filename: String,
    pub source_present: bool,
    pub reference_present: bool,
    pub source_count: Option<usize>,
    pub reference_count: Option<usize>,
    /// True only when both files are present and their counts are equal
    pub counts_match: bool,
}

impl ValidationResult {
    /// Compose a result from the two optional counts
    pub fn new(
        experiment: impl Into<String>,
        source_filename: impl Into<String>,
        reference_filename: impl Into<String>,
        source_count: Option<usize>,
        reference_count: Option<usize>,
    ) -> Self {
        let counts_match = match (source_count, reference_count) {
            (Some(source), Some(reference)) => source == reference,
            _ => false,
        };
        Self {
            experiment: experiment.into(),
            source_filename: source_filename.into(),
            reference_filename: reference_filename.into(),
            source_present: source_count.is_some(),
            reference_present: reference_count.is_some(),
            source_count,
            reference_count,
            counts_match,
        }
    }

    pub fn status(&self) -> ValidationStatus {
        if !self.is_complete() {
            ValidationStatus::Incomplete
        } else if self.counts_match {
            ValidationStatus::Match
        } else {
            ValidationStatus::Mismatch
        }
    }

    /// Whether both sentence files were present
    pub fn is_complete(&self) -> bool {
        self.source_present && self.reference_present
    }
}

/// What happened to one claimed experiment during a cycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExperimentOutcome {
    /// Validation ran to completion
    Validated(ValidationResult),
    /// Config or sentence file could not be read
    Failed { experiment: String, error: String },
}

impl ExperimentOutcome {
    pub fn experiment(&self) -> &str {
        match self {
            ExperimentOutcome::Validated(result) => &result.experiment,
            ExperimentOutcome::Failed { experiment, .. } => experiment,
        }
    }
}
