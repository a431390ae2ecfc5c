//! Watch loop - polls the root folder and drains new experiments
//!
//! Each cycle:
//! 1. Lists subfolders of the root without a lock artifact (lexical order)
//! 2. Claims and validates them on a bounded pool of blocking workers
//! 3. Reports outcomes in listing order and marks folders done or releases
//!    them for retry
//!
//! Cancellation is observed at the sleep boundary and before each worker is
//! started. Workers already started run to completion and their folders are
//! marked done or released, so a stop never leaves a folder claimed.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;

use super::tick::{CycleSummary, TickConfig, TickState};
use crate::config::{ConfigResolver, RetryConfig, WatcherConfig};
use crate::domain::{ExperimentFolder, ExperimentOutcome, ValidationResult, ValidationStatus};
use crate::error::{Result, WatchError};
use crate::lock::ExperimentLock;
use crate::report::Reporter;
use crate::validator::ExperimentValidator;

/// List experiment folders under the root, sorted by name. Hidden directories are skipped.
pub fn list_experiments(root: &Path) -> Result<Vec<ExperimentFolder>> {
    let entries = fs::read_dir(root).map_err(|e| WatchError::RootUnavailable(format!("{}: {}", root.display(), e)))?;

    let mut folders = Vec::new();
    for entry in entries {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                log::warn!("Skipping unreadable entry in {}: {}", root.display(), e);
                continue;
            }
        };
        let path = entry.path();
        if !path.is_dir() || entry.file_name().to_string_lossy().starts_with('.') {
            continue;
        }
        folders.push(ExperimentFolder::new(path));
    }

    folders.sort_by(|a, b| a.name().cmp(b.name()));
    Ok(folders)
}

/// Result of one worker's claim + validate
#[derive(Debug)]
enum WorkerResult {
    /// Someone else holds the claim
    Conflict,
    /// The lock artifact could not be written
    ClaimFailed(WatchError),
    Validated(ValidationResult),
    Failed(WatchError),
}

fn claim_and_validate(lock: &ExperimentLock, validator: &ExperimentValidator, folder: &ExperimentFolder) -> WorkerResult {
    match lock.try_claim(folder) {
        Ok(true) => {}
        Ok(false) => return WorkerResult::Conflict,
        Err(e) => return WorkerResult::ClaimFailed(e),
    }

    match validator.validate(folder) {
        Ok(result) => WorkerResult::Validated(result),
        Err(e) => WorkerResult::Failed(e),
    }
}

/// Watches a root folder for new experiments.
pub struct Watcher {
    root: PathBuf,
    tick_config: TickConfig,
    retry: RetryConfig,
    lock: Arc<ExperimentLock>,
    validator: Arc<ExperimentValidator>,
    reporter: Reporter,
    state: TickState,
}

impl Watcher {
    /// Create a watcher from the process configuration
    pub fn new(root: impl Into<PathBuf>, config: &WatcherConfig) -> Self {
        Self {
            root: root.into(),
            tick_config: TickConfig::from(&config.watch),
            retry: config.retry.clone(),
            lock: Arc::new(ExperimentLock::new(config.files.lock.clone())),
            validator: Arc::new(ExperimentValidator::new(ConfigResolver::new(config.files.config.clone()))),
            reporter: Reporter::new(&config.report),
            state: TickState::new(),
        }
    }

    /// Replace the tick config
    pub fn with_tick_config(mut self, tick_config: TickConfig) -> Self {
        self.tick_config = tick_config;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn lock(&self) -> &ExperimentLock {
        &self.lock
    }

    /// Session totals so far
    pub fn state(&self) -> &TickState {
        &self.state
    }

    /// Experiment folders that carry no lock artifact yet
    pub fn list_candidates(&self) -> Result<Vec<ExperimentFolder>> {
        Ok(list_experiments(&self.root)?
            .into_iter()
            .filter(|folder| !self.lock.is_claimed_or_done(folder))
            .collect())
    }

    /// Run cycles until the token is cancelled.
    ///
    /// Sleeps before the first poll. Returns an error only when the root
    /// folder cannot be listed.
    pub async fn run(&mut self, cancel: CancellationToken) -> Result<()> {
        log::info!("Experiments watcher is watching folder: {}", self.root.display());

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(self.tick_config.poll_interval) => {}
            }

            let summary = match self.run_cycle(&cancel).await {
                Ok(summary) => summary,
                Err(e) if e.is_recoverable() => {
                    log::warn!("Watch cycle aborted: {}", e);
                    continue;
                }
                Err(e) => return Err(e),
            };
            if !summary.is_idle() {
                log::info!(
                    "Cycle {}: {} discovered, {} claimed, {} matched, {} mismatched, {} incomplete, {} failed, {} skipped",
                    self.state.cycle_count,
                    summary.discovered,
                    summary.claimed,
                    summary.matched,
                    summary.mismatched,
                    summary.incomplete,
                    summary.failed,
                    summary.skipped
                );
            }
        }

        log::info!(
            "Watcher stopped after {} cycles: {} claimed, {} matched, {} mismatched, {} incomplete, {} failed",
            self.state.cycle_count,
            self.state.total_claimed,
            self.state.total_matched,
            self.state.total_mismatched,
            self.state.total_incomplete,
            self.state.total_failed
        );
        Ok(())
    }

    /// One poll-and-drain pass, without sleeping.
    pub async fn run_once(&mut self) -> Result<CycleSummary> {
        self.run_cycle(&CancellationToken::new()).await
    }

    /// One poll-and-drain pass that stops starting workers once `cancel` fires.
    ///
    /// Candidates not yet started are left unclaimed for the next run.
    pub async fn run_cycle(&mut self, cancel: &CancellationToken) -> Result<CycleSummary> {
        let candidates = self.list_candidates()?;
        let mut summary = CycleSummary::new(candidates.len());

        let semaphore = Arc::new(Semaphore::new(self.tick_config.max_workers));
        let mut workers = Vec::with_capacity(candidates.len());
        for folder in candidates {
            let permit = tokio::select! {
                biased;
                _ = cancel.cancelled() => None,
                permit = Arc::clone(&semaphore).acquire_owned() => {
                    Some(permit.map_err(|e| WatchError::Io(std::io::Error::other(e)))?)
                }
            };
            let Some(permit) = permit else {
                log::debug!("Cancelled, leaving {} unstarted", folder.name());
                summary.skipped += 1;
                continue;
            };

            let lock = Arc::clone(&self.lock);
            let validator = Arc::clone(&self.validator);
            let worker_folder = folder.clone();
            let handle = tokio::task::spawn_blocking(move || {
                let _permit = permit;
                claim_and_validate(&lock, &validator, &worker_folder)
            });
            workers.push((folder, handle));
        }

        // Await in listing order so reports are deterministic
        for (folder, handle) in workers {
            let result = handle
                .await
                .unwrap_or_else(|e| WorkerResult::Failed(WatchError::Read(format!("worker panicked: {}", e))));
            self.apply(&folder, result, &mut summary);
        }

        self.state.absorb(&summary);
        Ok(summary)
    }

    fn apply(&self, folder: &ExperimentFolder, result: WorkerResult, summary: &mut CycleSummary) {
        match result {
            WorkerResult::Conflict => {
                log::debug!("{} already claimed elsewhere, skipping", folder.name());
                summary.conflicts += 1;
            }
            WorkerResult::ClaimFailed(e) => {
                log::error!("Could not claim {}: {}", folder.name(), e);
                summary.failed += 1;
            }
            WorkerResult::Validated(result) => {
                log::info!("New experiment called {} was found", folder.name());
                summary.claimed += 1;
                let status = result.status();
                summary.record(status);
                self.reporter.report(&ExperimentOutcome::Validated(result));

                let retry = status == ValidationStatus::Incomplete && self.retry.on_incomplete;
                self.finish(folder, retry);
            }
            WorkerResult::Failed(e) => {
                log::info!("New experiment called {} was found", folder.name());
                summary.claimed += 1;
                summary.failed += 1;
                self.reporter.report(&ExperimentOutcome::Failed {
                    experiment: folder.name().to_string(),
                    error: e.to_string(),
                });
                self.finish(folder, self.retry.on_error);
            }
        }
    }

    /// Mark a claimed folder done, or release it so the next cycle retries it
    fn finish(&self, folder: &ExperimentFolder, retry: bool) {
        if retry {
            match self.lock.release(folder) {
                Ok(_) => log::info!("{} left unclaimed, will retry next cycle", folder.name()),
                Err(e) => log::error!("Could not release {}: {}", folder.name(), e),
            }
        } else if let Err(e) = self.lock.mark_done(folder) {
            log::error!("Could not mark {} done: {}", folder.name(), e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::LockState;
    use std::time::Duration;
    use tempfile::TempDir;

    fn lines(n: usize) -> String {
        (1..=n).map(|i| format!("line {}\n", i)).collect()
    }

    fn make_experiment(root: &Path, name: &str, source: Option<usize>, reference: Option<usize>) -> ExperimentFolder {
        let path = root.join(name);
        fs::create_dir_all(&path).unwrap();
        if let Some(n) = source {
            fs::write(path.join("source.txt"), lines(n)).unwrap();
        }
        if let Some(n) = reference {
            fs::write(path.join("reference.txt"), lines(n)).unwrap();
        }
        ExperimentFolder::new(path)
    }

    fn quiet_config() -> WatcherConfig {
        let mut config = WatcherConfig::default();
        config.report.console = false;
        config
    }

    #[test]
    fn test_list_experiments_sorted_and_filtered() {
        let temp = TempDir::new().unwrap();
        fs::create_dir(temp.path().join("b")).unwrap();
        fs::create_dir(temp.path().join("a")).unwrap();
        fs::create_dir(temp.path().join(".hidden")).unwrap();
        fs::write(temp.path().join("notes.txt"), "x").unwrap();

        let names: Vec<String> = list_experiments(temp.path())
            .unwrap()
            .iter()
            .map(|f| f.name().to_string())
            .collect();
        assert_eq!(names, vec!["a", "b"]);
    }

    #[test]
    fn test_list_experiments_missing_root() {
        let err = list_experiments(Path::new("/no/such/root/anywhere")).unwrap_err();
        assert!(matches!(err, WatchError::RootUnavailable(_)));
    }

    #[tokio::test]
    async fn test_run_once_marks_done() {
        let temp = TempDir::new().unwrap();
        let folder = make_experiment(temp.path(), "exp1", Some(10), Some(10));

        let mut watcher = Watcher::new(temp.path(), &quiet_config());
        let summary = watcher.run_once().await.unwrap();

        assert_eq!(summary.discovered, 1);
        assert_eq!(summary.claimed, 1);
        assert_eq!(summary.matched, 1);
        assert_eq!(watcher.lock().state(&folder).unwrap(), LockState::Done);

        let again = watcher.run_once().await.unwrap();
        assert!(again.is_idle());
        assert_eq!(watcher.state().cycle_count, 2);
        assert_eq!(watcher.state().total_claimed, 1);
    }

    #[tokio::test]
    async fn test_config_error_is_released_for_retry() {
        let temp = TempDir::new().unwrap();
        let folder = make_experiment(temp.path(), "broken", Some(2), Some(2));
        fs::write(folder.child_path("config.neon"), "source: [\n").unwrap();
        make_experiment(temp.path(), "fine", Some(1), Some(1));

        let mut watcher = Watcher::new(temp.path(), &quiet_config());
        let summary = watcher.run_once().await.unwrap();
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.matched, 1);
        assert_eq!(watcher.lock().state(&folder).unwrap(), LockState::Unclaimed);

        // Fixed config is picked up on the next cycle
        fs::write(folder.child_path("config.neon"), "source: source.txt\n").unwrap();
        let summary = watcher.run_once().await.unwrap();
        assert_eq!(summary.discovered, 1);
        assert_eq!(summary.matched, 1);
        assert_eq!(watcher.lock().state(&folder).unwrap(), LockState::Done);
    }

    #[tokio::test]
    async fn test_config_error_marked_done_without_retry() {
        let temp = TempDir::new().unwrap();
        let folder = make_experiment(temp.path(), "broken", Some(2), Some(2));
        fs::write(folder.child_path("config.neon"), "source: [\n").unwrap();

        let mut config = quiet_config();
        config.retry.on_error = false;
        let mut watcher = Watcher::new(temp.path(), &config);
        watcher.run_once().await.unwrap();
        assert_eq!(watcher.lock().state(&folder).unwrap(), LockState::Done);
    }

    #[tokio::test]
    async fn test_incomplete_retry_policy() {
        let temp = TempDir::new().unwrap();
        let folder = make_experiment(temp.path(), "exp2", Some(8), None);

        let mut config = quiet_config();
        config.retry.on_incomplete = true;
        let mut watcher = Watcher::new(temp.path(), &config);

        let summary = watcher.run_once().await.unwrap();
        assert_eq!(summary.incomplete, 1);
        assert_eq!(watcher.lock().state(&folder).unwrap(), LockState::Unclaimed);

        fs::write(folder.child_path("reference.txt"), lines(8)).unwrap();
        let summary = watcher.run_once().await.unwrap();
        assert_eq!(summary.matched, 1);
        assert_eq!(watcher.lock().state(&folder).unwrap(), LockState::Done);
    }

    #[tokio::test]
    async fn test_already_claimed_folder_is_not_listed() {
        let temp = TempDir::new().unwrap();
        let folder = make_experiment(temp.path(), "exp1", Some(1), Some(1));
        ExperimentLock::default().try_claim(&folder).unwrap();

        let mut watcher = Watcher::new(temp.path(), &quiet_config());
        assert!(watcher.list_candidates().unwrap().is_empty());
        assert!(watcher.run_once().await.unwrap().is_idle());
    }

    #[tokio::test]
    async fn test_lock_write_failure_leaves_folder_unclaimed() {
        let temp = TempDir::new().unwrap();
        let broken = make_experiment(temp.path(), "a-broken", Some(2), Some(2));
        let fine = make_experiment(temp.path(), "b-fine", Some(2), Some(2));
        // Only the sibling has the directory the lock artifact lives in
        fs::create_dir(fine.child_path("claims")).unwrap();

        let mut config = quiet_config();
        config.files.lock = "claims/.expwatch.lock".to_string();
        let mut watcher = Watcher::new(temp.path(), &config);

        let summary = watcher.run_once().await.unwrap();
        assert_eq!(summary.discovered, 2);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.claimed, 1);
        assert_eq!(summary.matched, 1);
        assert_eq!(watcher.lock().state(&broken).unwrap(), LockState::Unclaimed);
        assert_eq!(watcher.lock().state(&fine).unwrap(), LockState::Done);
    }

    #[tokio::test]
    async fn test_read_error_is_released_for_retry() {
        let temp = TempDir::new().unwrap();
        let unreadable = make_experiment(temp.path(), "a-unreadable", None, Some(2));
        fs::create_dir(unreadable.child_path("source.txt")).unwrap();
        let fine = make_experiment(temp.path(), "b-fine", Some(2), Some(2));

        let mut watcher = Watcher::new(temp.path(), &quiet_config());
        let summary = watcher.run_once().await.unwrap();
        assert_eq!(summary.claimed, 2);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.matched, 1);
        assert_eq!(watcher.lock().state(&unreadable).unwrap(), LockState::Unclaimed);
        assert_eq!(watcher.lock().state(&fine).unwrap(), LockState::Done);
    }

    #[tokio::test]
    async fn test_cancelled_cycle_starts_nothing() {
        let temp = TempDir::new().unwrap();
        let folders: Vec<ExperimentFolder> = (0..3)
            .map(|i| make_experiment(temp.path(), &format!("exp{}", i), Some(1), Some(1)))
            .collect();

        let mut watcher = Watcher::new(temp.path(), &quiet_config());
        let cancel = CancellationToken::new();
        cancel.cancel();

        let summary = watcher.run_cycle(&cancel).await.unwrap();
        assert_eq!(summary.discovered, 3);
        assert_eq!(summary.claimed, 0);
        assert_eq!(summary.skipped, 3);
        for folder in &folders {
            assert_eq!(watcher.lock().state(folder).unwrap(), LockState::Unclaimed);
        }

        // Left for the next run
        assert_eq!(watcher.run_once().await.unwrap().matched, 3);
    }

    #[tokio::test]
    async fn test_cancel_mid_cycle_leaves_rest_unclaimed() {
        let temp = TempDir::new().unwrap();
        let first = make_experiment(temp.path(), "exp0", Some(200_000), Some(200_000));
        let rest: Vec<ExperimentFolder> = (1..5)
            .map(|i| make_experiment(temp.path(), &format!("exp{}", i), Some(1), Some(1)))
            .collect();

        let mut watcher = Watcher::new(temp.path(), &quiet_config())
            .with_tick_config(TickConfig::new(Duration::from_millis(1), 1));
        let cancel = CancellationToken::new();
        let stopper = cancel.clone();
        // Runs once the cycle waits for the only permit, held by exp0's worker
        tokio::spawn(async move { stopper.cancel() });

        let summary = watcher.run_cycle(&cancel).await.unwrap();
        assert_eq!(summary.claimed, 1);
        assert_eq!(summary.matched, 1);
        assert_eq!(summary.skipped, 4);
        assert_eq!(watcher.lock().state(&first).unwrap(), LockState::Done);
        for folder in &rest {
            assert_eq!(watcher.lock().state(folder).unwrap(), LockState::Unclaimed);
        }
    }

    #[tokio::test]
    async fn test_run_stops_on_cancel() {
        let temp = TempDir::new().unwrap();
        let mut watcher = Watcher::new(temp.path(), &quiet_config())
            .with_tick_config(TickConfig::new(Duration::from_millis(10), 1));

        let cancel = CancellationToken::new();
        let stopper = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            stopper.cancel();
        });

        tokio::time::timeout(Duration::from_secs(5), watcher.run(cancel))
            .await
            .expect("watcher did not stop")
            .unwrap();
        assert!(watcher.state().cycle_count >= 1);
    }

    #[tokio::test]
    async fn test_run_fails_when_root_missing() {
        let temp = TempDir::new().unwrap();
        let mut watcher = Watcher::new(temp.path().join("missing"), &quiet_config())
            .with_tick_config(TickConfig::new(Duration::from_millis(1), 1));

        let err = watcher.run(CancellationToken::new()).await.unwrap_err();
        assert!(matches!(err, WatchError::RootUnavailable(_)));
    }
}
