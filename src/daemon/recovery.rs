//! Crash Recovery - releases experiments left claimed by a killed watcher
//!
//! A watcher killed between claim and mark-done leaves the folder in the
//! `claimed` state, which every later poll skips. When enabled, recovery runs
//! before the first cycle and releases those claims so the folders are
//! validated again. Only safe when no other watcher shares the root.

use std::path::Path;

use chrono::{DateTime, Utc};

use crate::domain::{ExperimentFolder, LockState};
use crate::error::Result;
use crate::lock::ExperimentLock;

use super::watcher::list_experiments;

/// Result of recovering a single experiment
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecoveryAction {
    /// Claim removed; the folder is picked up by the next poll
    Released { experiment: String },
    /// Claim was made after this watcher started, left alone
    Skipped { experiment: String },
}

/// Experiments whose lock artifact is still in the `claimed` state
pub fn find_interrupted(root: &Path, lock: &ExperimentLock) -> Result<Vec<ExperimentFolder>> {
    let mut interrupted = Vec::new();
    for folder in list_experiments(root)? {
        if lock.state(&folder)? == LockState::Claimed {
            interrupted.push(folder);
        }
    }
    Ok(interrupted)
}

/// Release every interrupted claim made before `started_at`.
///
/// Staleness is judged by claim time, not pid: pids repeat across restarts.
/// A record that cannot be parsed counts as stale.
pub fn recover_interrupted(root: &Path, lock: &ExperimentLock, started_at: DateTime<Utc>) -> Result<Vec<RecoveryAction>> {
    let mut actions = Vec::new();

    for folder in find_interrupted(root, lock)? {
        let experiment = folder.name().to_string();
        let live = lock.read_record(&folder)?.is_some_and(|record| record.claimed_at >= started_at);
        if live {
            actions.push(RecoveryAction::Skipped { experiment });
            continue;
        }

        lock.release(&folder)?;
        log::warn!("Released interrupted claim on {}", experiment);
        actions.push(RecoveryAction::Released { experiment });
    }

    Ok(actions)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use std::fs;
    use tempfile::TempDir;

    fn setup() -> (TempDir, ExperimentLock) {
        let temp = TempDir::new().unwrap();
        for name in ["done", "fresh", "stale"] {
            fs::create_dir(temp.path().join(name)).unwrap();
        }
        (temp, ExperimentLock::default())
    }

    fn write_claim(folder: &ExperimentFolder, claimed_at: &str, pid: u32) {
        let record = serde_json::json!({
            "state": "claimed",
            "claimed_at": claimed_at,
            "done_at": null,
            "pid": pid,
        });
        fs::write(folder.child_path(".expwatch.lock"), record.to_string()).unwrap();
    }

    #[test]
    fn test_find_interrupted() {
        let (temp, lock) = setup();
        let done = ExperimentFolder::new(temp.path().join("done"));
        lock.try_claim(&done).unwrap();
        lock.mark_done(&done).unwrap();
        write_claim(&ExperimentFolder::new(temp.path().join("stale")), "2024-01-01T00:00:00Z", u32::MAX);

        let interrupted = find_interrupted(temp.path(), &lock).unwrap();
        assert_eq!(interrupted.len(), 1);
        assert_eq!(interrupted[0].name(), "stale");
    }

    #[test]
    fn test_recover_releases_foreign_claims() {
        let (temp, lock) = setup();
        let stale = ExperimentFolder::new(temp.path().join("stale"));
        write_claim(&stale, "2024-01-01T00:00:00Z", u32::MAX);

        let actions = recover_interrupted(temp.path(), &lock, Utc::now()).unwrap();
        assert_eq!(
            actions,
            vec![RecoveryAction::Released {
                experiment: "stale".to_string()
            }]
        );
        assert_eq!(lock.state(&stale).unwrap(), LockState::Unclaimed);
    }

    #[test]
    fn test_recover_releases_old_claim_with_our_pid() {
        let (temp, lock) = setup();
        let stale = ExperimentFolder::new(temp.path().join("stale"));
        write_claim(&stale, "2020-01-01T00:00:00Z", std::process::id());

        let actions = recover_interrupted(temp.path(), &lock, Utc::now()).unwrap();
        assert_eq!(
            actions,
            vec![RecoveryAction::Released {
                experiment: "stale".to_string()
            }]
        );
        assert_eq!(lock.state(&stale).unwrap(), LockState::Unclaimed);
    }

    #[test]
    fn test_recover_skips_claims_made_after_start() {
        let (temp, lock) = setup();
        let started_at = Utc::now() - Duration::seconds(60);
        let fresh = ExperimentFolder::new(temp.path().join("fresh"));
        lock.try_claim(&fresh).unwrap();

        let actions = recover_interrupted(temp.path(), &lock, started_at).unwrap();
        assert_eq!(
            actions,
            vec![RecoveryAction::Skipped {
                experiment: "fresh".to_string()
            }]
        );
        assert_eq!(lock.state(&fresh).unwrap(), LockState::Claimed);
    }
}
