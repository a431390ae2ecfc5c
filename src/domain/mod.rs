//! Domain types for expwatch
//!
//! - ExperimentFolder: a watched experiment directory and its identity
//! - LockState: unclaimed / claimed / done
//! - ValidationResult: per-experiment line-count reconciliation
//! - ExperimentOutcome: what a watch cycle reports for one experiment

pub mod experiment;
pub mod outcome;

pub use experiment::{ExperimentFolder, LockState};
pub use outcome::{ExperimentOutcome, ValidationResult, ValidationStatus};
