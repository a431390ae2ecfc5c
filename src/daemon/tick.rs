//! Tick bookkeeping for the watch loop
//!
//! Each tick sleeps for the poll interval, lists unclaimed experiments and
//! drains them. `CycleSummary` describes one tick, `TickState` accumulates
//! totals for the whole session.

use std::time::Duration;

use crate::config::WatchConfig;
use crate::domain::ValidationStatus;

/// Configuration for the watch tick loop
#[derive(Debug, Clone)]
pub struct TickConfig {
    /// Sleep between polls
    pub poll_interval: Duration,
    /// Maximum experiments validated at once
    pub max_workers: usize,
}

impl Default for TickConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_micros(500_000),
            max_workers: 4,
        }
    }
}

impl TickConfig {
    /// Create a new tick config
    pub fn new(poll_interval: Duration, max_workers: usize) -> Self {
        Self {
            poll_interval,
            max_workers: max_workers.max(1),
        }
    }
}

impl From<&WatchConfig> for TickConfig {
    fn from(config: &WatchConfig) -> Self {
        Self::new(config.poll_interval(), config.workers)
    }
}

/// What happened during one watch cycle
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleSummary {
    /// Unclaimed folders found by the poll
    pub discovered: usize,
    /// Folders this cycle claimed
    pub claimed: usize,
    pub matched: usize,
    pub mismatched: usize,
    pub incomplete: usize,
    /// Config/read errors and lock persistence failures
    pub failed: usize,
    /// Folders another claimant got to first
    pub conflicts: usize,
    /// Folders left unstarted because the cycle was cancelled
    pub skipped: usize,
}

impl CycleSummary {
    pub fn new(discovered: usize) -> Self {
        Self {
            discovered,
            ..Self::default()
        }
    }

    /// Record a completed validation
    pub fn record(&mut self, status: ValidationStatus) {
        match status {
            ValidationStatus::Match => self.matched += 1,
            ValidationStatus::Mismatch => self.mismatched += 1,
            ValidationStatus::Incomplete => self.incomplete += 1,
        }
    }

    pub fn is_idle(&self) -> bool {
        self.discovered == 0
    }
}

/// Session totals across ticks
#[derive(Debug, Default)]
pub struct TickState {
    /// Number of completed cycles
    pub cycle_count: u64,
    pub total_claimed: u64,
    pub total_matched: u64,
    pub total_mismatched: u64,
    pub total_incomplete: u64,
    pub total_failed: u64,
    pub total_conflicts: u64,
}

impl TickState {
    /// Create a new tick state
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one cycle into the totals
    pub fn absorb(&mut self, summary: &CycleSummary) {
        self.cycle_count += 1;
        self.total_claimed += summary.claimed as u64;
        self.total_matched += summary.matched as u64;
        self.total_mismatched += summary.mismatched as u64;
        self.total_incomplete += summary.incomplete as u64;
        self.total_failed += summary.failed as u64;
        self.total_conflicts += summary.conflicts as u64;
    }
}
