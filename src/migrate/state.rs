use std::collections::{HashSet, VecDeque};
use std::fmt;

use serde::Serialize;

use crate::users::PendingRecord;

/// Final classification of one record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MigrationOutcome {
    Created,
    AlreadyExists,
    /// Still rate limited after the last allowed retry.
    RateLimited,
    ValidationFailed,
    UnknownError,
}

/// Counts reported at the end of a run.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub total: usize,
    pub migrated: usize,
    pub already_exists: usize,
    pub rate_limited: usize,
    pub failed: usize,
    pub validation_failed: usize,
    pub skipped_duplicates: usize,
}

impl RunSummary {
    /// Records that ended with an entry in the error log.
    pub fn logged_failures(&self) -> usize {
        self.rate_limited + self.failed + self.validation_failed
    }

    pub fn settled(&self) -> usize {
        self.migrated + self.already_exists + self.logged_failures() + self.skipped_duplicates
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{} users migrated", self.migrated)?;
        writeln!(f, "{} users already exist", self.already_exists)?;
        if self.validation_failed > 0 {
            writeln!(f, "{} users failed validation", self.validation_failed)?;
        }
        if self.rate_limited > 0 {
            writeln!(f, "{} users still rate limited after retries", self.rate_limited)?;
        }
        if self.failed > 0 {
            writeln!(f, "{} users failed to upload", self.failed)?;
        }
        if self.skipped_duplicates > 0 {
            writeln!(f, "{} duplicate rows skipped", self.skipped_duplicates)?;
        }
        write!(f, "{} rows total", self.total)
    }
}

/// Work queue and counters of a single run. Owned by whichever task drives
/// the run; workers never touch it.
#[derive(Debug, Default)]
pub struct RunState {
    pending: VecDeque<PendingRecord>,
    in_flight: HashSet<String>,
    processed: HashSet<String>,
    summary: RunSummary,
}

impl RunState {
    pub fn new(records: Vec<PendingRecord>) -> Self {
        let summary = RunSummary {
            total: records.len(),
            ..RunSummary::default()
        };
        Self {
            pending: records.into(),
            summary,
            ..Self::default()
        }
    }

    /// Count rows rejected before they reached the queue.
    pub fn record_validation_failure(&mut self) {
        self.summary.total += 1;
        self.summary.validation_failed += 1;
    }

    /// Pop the next record that is neither processed nor in flight and claim
    /// it. Rows repeating a claimed `userId` are skipped.
    pub fn next_pending(&mut self) -> Option<PendingRecord> {
        while let Some(next) = self.pending.pop_front() {
            let id = &next.record.user_id;
            if self.processed.contains(id) || self.in_flight.contains(id) {
                self.summary.skipped_duplicates += 1;
                continue;
            }
            self.in_flight.insert(id.clone());
            return Some(next);
        }
        None
    }

    /// Release a claimed record with its final outcome.
    pub fn settle(&mut self, user_id: &str, outcome: MigrationOutcome) {
        self.in_flight.remove(user_id);
        self.processed.insert(user_id.to_string());
        match outcome {
            MigrationOutcome::Created => self.summary.migrated += 1,
            MigrationOutcome::AlreadyExists => self.summary.already_exists += 1,
            MigrationOutcome::RateLimited => self.summary.rate_limited += 1,
            MigrationOutcome::ValidationFailed => self.summary.validation_failed += 1,
            MigrationOutcome::UnknownError => self.summary.failed += 1,
        }
    }

    /// A worker died without reporting; its record is counted as failed.
    pub fn worker_lost(&mut self) {
        self.summary.failed += 1;
    }

    pub fn is_claimed(&self, user_id: &str) -> bool {
        self.in_flight.contains(user_id)
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    pub fn remaining(&self) -> usize {
        self.pending.len()
    }

    pub fn summary(&self) -> &RunSummary {
        &self.summary
    }

    pub fn into_summary(self) -> RunSummary {
        self.summary
    }
}
