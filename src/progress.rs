//! Progress and log reporting.
//!
//! The caller observes an import through a [`Reporter`]: a percentage for
//! the file currently loading and free-form log lines. Loader workers call
//! into the reporter from their own threads, so implementations must be
//! `Sync`.
//!
//! [`ProgressAggregator`] turns per-worker row counts into a single
//! percentage. Every update happens under one lock and the reporter is
//! invoked while that lock is held, which keeps the emitted percentages
//! non-decreasing.

use log::{debug, info};
use parking_lot::Mutex;

pub trait Reporter: Sync {
    fn progress(&self, percent: u8);
    fn log_line(&self, message: &str);
}

/// Forwards everything to the `log` facade.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogReporter;

impl Reporter for LogReporter {
    fn progress(&self, percent: u8) {
        debug!("progress {percent}%");
    }

    fn log_line(&self, message: &str) {
        info!("{message}");
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProgressState {
    pub total_rows: usize,
    pub completed_rows: usize,
    pub per_worker: Vec<usize>,
    pub last_percent: u8,
}

#[derive(Debug)]
pub struct ProgressAggregator {
    state: Mutex<ProgressState>,
}

impl ProgressAggregator {
    pub fn new(total_rows: usize, workers: usize) -> Self {
        Self {
            state: Mutex::new(ProgressState {
                total_rows,
                per_worker: vec![0; workers],
                ..ProgressState::default()
            }),
        }
    }

    /// Zeroes all counters and sets a new total.
    pub fn reset(&self, total_rows: usize, workers: usize) {
        let mut state = self.state.lock();
        *state = ProgressState {
            total_rows,
            per_worker: vec![0; workers],
            ..ProgressState::default()
        };
    }

    /// Adds `rows` completed by `worker` and reports the new overall
    /// percentage. Returns the reported percentage.
    pub fn record(&self, worker: usize, rows: usize, reporter: &dyn Reporter) -> u8 {
        let mut state = self.state.lock();
        if worker >= state.per_worker.len() {
            state.per_worker.resize(worker + 1, 0);
        }
        state.per_worker[worker] += rows;
        state.completed_rows += rows;
        let percent = percent_of(state.completed_rows, state.total_rows);
        state.last_percent = state.last_percent.max(percent);
        reporter.progress(state.last_percent);
        state.last_percent
    }

    pub fn snapshot(&self) -> ProgressState {
        self.state.lock().clone()
    }

    pub fn completed_rows(&self) -> usize {
        self.state.lock().completed_rows
    }
}

/// `floor(100 * completed / total)`, clamped to 100. An empty total counts
/// as complete.
pub fn percent_of(completed: usize, total: usize) -> u8 {
    if total == 0 {
        return 100;
    }
    let percent = (completed as u128 * 100) / total as u128;
    percent.min(100) as u8
}
