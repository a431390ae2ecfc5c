//! Outcome reporting.
//!
//! Every processed experiment produces log records for each check, an
//! optional colored console line and an optional JSON-lines record.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use colored::*;
use serde::Serialize;

use crate::config::ReportConfig;
use crate::domain::{ExperimentOutcome, ValidationResult, ValidationStatus};
use crate::error::Result;

/// One line of the JSON-lines report
#[derive(Debug, Serialize)]
struct ReportRecord<'a> {
    timestamp: DateTime<Utc>,
    status: String,
    /// Only set for failures; validated records carry it inside `result`
    #[serde(skip_serializing_if = "Option::is_none")]
    experiment: Option<&'a str>,
    #[serde(flatten)]
    result: Option<&'a ValidationResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<&'a str>,
}

impl<'a> ReportRecord<'a> {
    fn from_outcome(outcome: &'a ExperimentOutcome) -> Self {
        match outcome {
            ExperimentOutcome::Validated(result) => Self {
                timestamp: Utc::now(),
                experiment: None,
                status: result.status().to_string(),
                result: Some(result),
                error: None,
            },
            ExperimentOutcome::Failed { experiment, error } => Self {
                timestamp: Utc::now(),
                experiment: Some(experiment.as_str()),
                status: "error".to_string(),
                result: None,
                error: Some(error.as_str()),
            },
        }
    }
}

/// Writes experiment outcomes to the log, console and report file.
#[derive(Debug, Clone, Default)]
pub struct Reporter {
    console: bool,
    jsonl_path: Option<PathBuf>,
}

impl Reporter {
    pub fn new(config: &ReportConfig) -> Self {
        Self {
            console: config.console,
            jsonl_path: config.jsonl.clone(),
        }
    }

    /// Report one experiment outcome. Report file failures are logged, never raised.
    pub fn report(&self, outcome: &ExperimentOutcome) {
        match outcome {
            ExperimentOutcome::Validated(result) => log_result(result),
            ExperimentOutcome::Failed { experiment, error } => {
                log::warn!("{} could not be validated: {}", experiment, error);
            }
        }

        if self.console {
            println!("{}", console_line(outcome));
        }

        if let Err(e) = self.append_jsonl(outcome) {
            log::error!("Failed to write report for {}: {}", outcome.experiment(), e);
        }
    }

    fn append_jsonl(&self, outcome: &ExperimentOutcome) -> Result<()> {
        let Some(path) = &self.jsonl_path else {
            return Ok(());
        };
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }

        let mut file = OpenOptions::new().create(true).append(true).open(path)?;
        writeln!(file, "{}", serde_json::to_string(&ReportRecord::from_outcome(outcome))?)?;
        Ok(())
    }
}

fn log_result(result: &ValidationResult) {
    let name = &result.experiment;

    match result.source_count {
        Some(count) => log::info!("{} has {} source sentences", name, count),
        None => log::warn!("Missing source sentences in {} ({})", name, result.source_filename),
    }
    match result.reference_count {
        Some(count) => log::info!("{} has {} reference sentences", name, count),
        None => log::warn!("Missing reference sentences in {} ({})", name, result.reference_filename),
    }

    match result.status() {
        ValidationStatus::Match => log::info!("{} source/reference sentence counts match", name),
        ValidationStatus::Mismatch => log::warn!("{} has bad number of source/reference sentences", name),
        ValidationStatus::Incomplete => log::warn!("{} is incomplete, sentence counts not compared", name),
    }
}

fn format_count(count: Option<usize>) -> String {
    count.map(|c| c.to_string()).unwrap_or_else(|| "missing".to_string())
}

fn console_line(outcome: &ExperimentOutcome) -> String {
    match outcome {
        ExperimentOutcome::Validated(result) => {
            let label = match result.status() {
                ValidationStatus::Match => "MATCH".green(),
                ValidationStatus::Mismatch => "MISMATCH".red(),
                ValidationStatus::Incomplete => "INCOMPLETE".yellow(),
            };
            format!(
                "{:<10} {}: source {} ({}), reference {} ({})",
                label,
                result.experiment.bold(),
                format_count(result.source_count),
                result.source_filename,
                format_count(result.reference_count),
                result.reference_filename
            )
        }
        ExperimentOutcome::Failed { experiment, error } => {
            format!("{:<10} {}: {}", "ERROR".red(), experiment.bold(), error)
        }
    }
}
