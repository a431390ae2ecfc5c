//! Experiment folder identity and lock state.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// A directory under the watched root representing one experiment.
///
/// Identity is the path; the name is the directory basename.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ExperimentFolder {
    name: String,
    path: PathBuf,
}

impl ExperimentFolder {
    /// Wrap an experiment directory path
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Self { name, path }
    }

    /// Directory basename
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Full path of the directory
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Path of a file inside the experiment directory
    pub fn child_path(&self, filename: &str) -> PathBuf {
        self.path.join(filename)
    }

    /// Whether a regular file with this name exists inside the directory
    pub fn file_exists(&self, filename: &str) -> bool {
        self.child_path(filename).is_file()
    }
}

impl fmt::Display for ExperimentFolder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

/// Claim state of an experiment folder
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LockState {
    /// No lock artifact; eligible for the next poll
    Unclaimed,
    /// A watcher claimed it and has not finished
    Claimed,
    /// Processed; permanently skipped
    Done,
}

impl LockState {
    pub fn as_str(&self) -> &'static str {
        match self {
            LockState::Unclaimed => "unclaimed",
            LockState::Claimed => "claimed",
            LockState::Done => "done",
        }
    }
}

impl fmt::Display for LockState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
