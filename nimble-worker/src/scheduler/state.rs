//! Worker loop state and counters

use chrono::{DateTime, Utc};
use std::fmt;

/// Phase of the worker loop
///
/// The loop cycles `Preparing → Acquiring → Executing → Submitting` and
/// returns to `Preparing` after every cycle, successful or not.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WorkerState {
    /// Waiting out the poll interval before the next acquisition
    Preparing,
    /// Requesting a task from the coordinator
    Acquiring,
    /// Running the trainer
    Executing,
    /// Uploading the artifact
    Submitting,
}

impl fmt::Display for WorkerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkerState::Preparing => write!(f, "preparing"),
            WorkerState::Acquiring => write!(f, "acquiring"),
            WorkerState::Executing => write!(f, "executing"),
            WorkerState::Submitting => write!(f, "submitting"),
        }
    }
}

/// Running totals over the worker's lifetime
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorkerStats {
    pub cycles_started: u64,
    pub completed: u64,
    pub acquire_failures: u64,
    pub execution_failures: u64,
    pub submit_failures: u64,
    pub last_completed_at: Option<DateTime<Utc>>,
}

impl WorkerStats {
    /// Total number of aborted cycles
    pub fn failed(&self) -> u64 {
        self.acquire_failures + self.execution_failures + self.submit_failures
    }

    pub(crate) fn record_completion(&mut self) {
        self.completed += 1;
        self.last_completed_at = Some(Utc::now());
    }

    pub(crate) fn record_failure(&mut self, stage: WorkerState) {
        match stage {
            WorkerState::Acquiring => self.acquire_failures += 1,
            WorkerState::Executing => self.execution_failures += 1,
            WorkerState::Submitting => self.submit_failures += 1,
            WorkerState::Preparing => {}
        }
    }
}
