//! Sentence file loading.
//!
//! One sentence per line. The whole file is trimmed before splitting, so
//! trailing newlines do not add sentences. An empty or whitespace-only file
//! is an empty set (count 0), not a single empty sentence.

use std::fs;
use std::io;

use crate::domain::ExperimentFolder;
use crate::error::{Result, WatchError};

/// Line-split contents of one sentence file
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SentenceSet {
    sentences: Vec<String>,
}

impl SentenceSet {
    /// Split file contents into sentences
    pub fn parse(content: &str) -> Self {
        let trimmed = content.trim();
        if trimmed.is_empty() {
            return Self::default();
        }

        let sentences = trimmed
            .split('\n')
            .map(|line| line.strip_suffix('\r').unwrap_or(line).to_string())
            .collect();
        Self { sentences }
    }

    pub fn count(&self) -> usize {
        self.sentences.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sentences.is_empty()
    }

    pub fn sentences(&self) -> &[String] {
        &self.sentences
    }
}

/// Reads sentence files out of experiment folders.
#[derive(Debug, Clone, Copy, Default)]
pub struct SentenceLoader;

impl SentenceLoader {
    pub fn new() -> Self {
        Self
    }

    /// Load a sentence file; `Ok(None)` when it has not been written yet
    pub fn load(&self, folder: &ExperimentFolder, filename: &str) -> Result<Option<SentenceSet>> {
        let path = folder.child_path(filename);
        match fs::read_to_string(&path) {
            Ok(content) => Ok(Some(SentenceSet::parse(&content))),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(WatchError::Read(format!("{}: {}", path.display(), e))),
        }
    }
}
