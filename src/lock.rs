//! Experiment claim markers.
//!
//! A folder is claimed by atomically creating a lock artifact inside it
//! (`create_new`, so exactly one claimant wins). The artifact holds a small
//! JSON record and outlives the process, so a folder claimed once is never
//! listed again unless the claim is explicitly released.

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::DEFAULT_LOCK_FILENAME;
use crate::domain::{ExperimentFolder, LockState};
use crate::error::{Result, WatchError};

/// Contents of a lock artifact
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockRecord {
    pub state: LockState,
    pub claimed_at: DateTime<Utc>,
    pub done_at: Option<DateTime<Utc>>,
    /// Process that made the claim
    pub pid: u32,
}

impl LockRecord {
    fn claimed() -> Self {
        Self {
            state: LockState::Claimed,
            claimed_at: Utc::now(),
            done_at: None,
            pid: std::process::id(),
        }
    }

    fn done(mut self) -> Self {
        self.state = LockState::Done;
        self.done_at = Some(Utc::now());
        self
    }
}

/// Claims experiment folders through a lock artifact co-located with each folder.
#[derive(Debug, Clone)]
pub struct ExperimentLock {
    lock_filename: String,
}

impl Default for ExperimentLock {
    fn default() -> Self {
        Self::new(DEFAULT_LOCK_FILENAME)
    }
}

impl ExperimentLock {
    pub fn new(lock_filename: impl Into<String>) -> Self {
        Self {
            lock_filename: lock_filename.into(),
        }
    }

    fn lock_path(&self, folder: &ExperimentFolder) -> PathBuf {
        folder.child_path(&self.lock_filename)
    }

    /// Claim a folder. Returns `false` if someone already holds or finished it.
    pub fn try_claim(&self, folder: &ExperimentFolder) -> Result<bool> {
        let path = self.lock_path(folder);
        let mut file = match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => return Ok(false),
            Err(e) => return Err(WatchError::LockPersistence(format!("{}: {}", path.display(), e))),
        };

        let record = serde_json::to_vec(&LockRecord::claimed())?;
        if let Err(e) = file.write_all(&record).and_then(|_| file.sync_all()) {
            // A claim we cannot record must not block the folder forever
            drop(file);
            let _ = fs::remove_file(&path);
            return Err(WatchError::LockPersistence(format!("{}: {}", path.display(), e)));
        }

        log::debug!("Claimed {}", folder.name());
        Ok(true)
    }

    /// Mark a claimed folder as processed
    pub fn mark_done(&self, folder: &ExperimentFolder) -> Result<()> {
        let path = self.lock_path(folder);
        let record = match self.read_record(folder)? {
            Some(record) => record.done(),
            None => LockRecord::claimed().done(),
        };

        // Write aside then rename so readers never see a half-written record
        let tmp = folder.child_path(&format!("{}.tmp", self.lock_filename));
        let persist = || -> io::Result<()> {
            fs::write(&tmp, serde_json::to_vec(&record)?)?;
            fs::rename(&tmp, &path)
        };
        persist().map_err(|e| WatchError::LockPersistence(format!("{}: {}", path.display(), e)))?;

        log::debug!("Marked {} done", folder.name());
        Ok(())
    }

    /// Whether the folder carries a lock artifact in any state
    pub fn is_claimed_or_done(&self, folder: &ExperimentFolder) -> bool {
        self.lock_path(folder).exists()
    }

    /// Current claim state. A record that cannot be parsed counts as claimed.
    pub fn state(&self, folder: &ExperimentFolder) -> Result<LockState> {
        if !self.is_claimed_or_done(folder) {
            return Ok(LockState::Unclaimed);
        }
        Ok(self.read_record(folder)?.map(|r| r.state).unwrap_or(LockState::Claimed))
    }

    /// Read the lock record, `None` when absent or unparsable
    pub fn read_record(&self, folder: &ExperimentFolder) -> Result<Option<LockRecord>> {
        let path = self.lock_path(folder);
        let content = match fs::read(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        match serde_json::from_slice(&content) {
            Ok(record) => Ok(Some(record)),
            Err(e) => {
                log::warn!("Unreadable lock record {}: {}", path.display(), e);
                Ok(None)
            }
        }
    }

    /// Remove the lock artifact so the folder is picked up again. Returns whether one existed.
    pub fn release(&self, folder: &ExperimentFolder) -> Result<bool> {
        let path = self.lock_path(folder);
        match fs::remove_file(&path) {
            Ok(()) => {
                log::debug!("Released {}", folder.name());
                Ok(true)
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(WatchError::LockPersistence(format!("{}: {}", path.display(), e))),
        }
    }
}
