//! Ordered progress reporting for a run.
//!
//! Jobs may finish out of order on the worker pool. Outcomes pass through a
//! [`ReorderBuffer`] so the caller always observes them in plan order, and
//! the [`ProgressTracker`] turns each released outcome into an event.

use std::collections::BTreeMap;
use std::time::Instant;

use serde::{Deserialize, Serialize};

use crate::model::{JobOutcome, JobStatus, RunStats};

/// Progress after one job completed or failed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressEvent {
    /// `completed / total * 100`; exactly 100 only after the last job.
    pub percent: f64,
    pub message: String,
    /// Plan index of the job this event reports.
    pub job: usize,
    pub succeeded: bool,
}

/// Events delivered by a spawned run.
#[derive(Debug, Clone, PartialEq)]
pub enum RunEvent {
    Progress(ProgressEvent),
    Completed(RunStats),
}

/// Receives progress events in plan order.
pub trait ProgressSink {
    fn on_progress(&mut self, event: ProgressEvent);
}

impl<F> ProgressSink for F
where
    F: FnMut(ProgressEvent),
{
    fn on_progress(&mut self, event: ProgressEvent) {
        self(event)
    }
}

/// Holds out-of-order results until every earlier index has been released.
#[derive(Debug)]
pub struct ReorderBuffer<T> {
    pending: BTreeMap<usize, T>,
    next: usize,
}

impl<T> Default for ReorderBuffer<T> {
    fn default() -> Self {
        Self {
            pending: BTreeMap::new(),
            next: 0,
        }
    }
}

impl<T> ReorderBuffer<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, index: usize, item: T) {
        self.pending.insert(index, item);
    }

    /// The item for the next index in sequence, if it has arrived.
    pub fn pop_ready(&mut self) -> Option<T> {
        let item = self.pending.remove(&self.next)?;
        self.next += 1;
        Some(item)
    }

    pub fn pending(&self) -> usize {
        self.pending.len()
    }
}

/// Incremental run statistics.
#[derive(Debug)]
pub struct ProgressTracker {
    total: usize,
    completed: usize,
    success: usize,
    errors: usize,
    started: Instant,
}

impl ProgressTracker {
    pub fn new(total: usize) -> Self {
        Self {
            total,
            completed: 0,
            success: 0,
            errors: 0,
            started: Instant::now(),
        }
    }

    pub fn percent(&self) -> f64 {
        if self.total == 0 {
            return 100.0;
        }
        if self.completed >= self.total {
            return 100.0;
        }
        self.completed as f64 / self.total as f64 * 100.0
    }

    /// Count `outcome` and describe it.
    pub fn record(&mut self, outcome: &JobOutcome) -> ProgressEvent {
        self.completed += 1;
        let message = match &outcome.status {
            JobStatus::Success { .. } => {
                self.success += 1;
                format!(
                    "[{}/{}] {} {} -> {}",
                    self.completed,
                    self.total,
                    outcome.language,
                    outcome.template,
                    outcome.destination.display()
                )
            }
            JobStatus::Failure { reason } => {
                self.errors += 1;
                format!(
                    "[{}/{}] {} {} failed for {}: {}",
                    self.completed,
                    self.total,
                    outcome.language,
                    outcome.template,
                    outcome.destination.display(),
                    reason
                )
            }
        };

        ProgressEvent {
            percent: self.percent(),
            message,
            job: outcome.index,
            succeeded: outcome.is_success(),
        }
    }

    pub fn finish(&self) -> RunStats {
        RunStats {
            total_files: self.total as u64,
            total_time_secs: self.started.elapsed().as_secs_f64(),
            success_count: self.success as u64,
            error_count: self.errors as u64,
        }
    }
}
