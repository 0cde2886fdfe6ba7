//! Concurrent batched loading of one table.
//!
//! Rows are cut into consecutive batches, pushed through a bounded queue and
//! executed by a fixed set of scoped worker threads, each batch as a single
//! multi-row `INSERT`. A failed batch is recorded and skipped; the worker
//! moves on to its next batch. Nothing is rolled back: whatever batches
//! succeeded stay in the store.

use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
    thread,
    time::Duration,
};

use crossbeam_channel::Receiver;
use log::{debug, warn};
use parking_lot::Mutex;
use thiserror::Error;

use crate::{
    dialect::Dialect,
    progress::{ProgressAggregator, Reporter},
    schema::TableSpec,
    sql::{self, IdentifierPolicy, SqlError},
    store::{Store, StoreError},
};

pub const DEFAULT_BATCH_SIZE: usize = 1000;
pub const DEFAULT_WORKERS: usize = 4;
pub const DEFAULT_THROTTLE: Duration = Duration::from_millis(10);

#[derive(Debug, Clone)]
pub struct LoadOptions {
    pub batch_size: usize,
    pub workers: usize,
    /// Pause a worker takes after each batch to spread load on the store.
    pub throttle: Duration,
    pub identifiers: IdentifierPolicy,
    pub cancel: Option<Arc<AtomicBool>>,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            workers: DEFAULT_WORKERS,
            throttle: DEFAULT_THROTTLE,
            identifiers: IdentifierPolicy::default(),
            cancel: None,
        }
    }
}

impl LoadOptions {
    fn is_cancelled(&self) -> bool {
        self.cancel
            .as_ref()
            .is_some_and(|flag| flag.load(Ordering::Relaxed))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Batch<'a> {
    pub index: usize,
    /// 1-based data row number of `rows[0]`.
    pub first_row: usize,
    pub rows: &'a [Vec<String>],
}

#[derive(Debug, Error)]
pub enum BatchCause {
    #[error(transparent)]
    Sql(#[from] SqlError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, Error)]
#[error("worker {worker}: batch {batch} (rows {first_row}-{last_row}): {cause}")]
pub struct BatchFailure {
    pub worker: usize,
    pub batch: usize,
    pub first_row: usize,
    pub last_row: usize,
    #[source]
    pub cause: BatchCause,
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error(
        "{} of {} batch(es) failed ({} row(s) loaded): {}",
        .failures.len(),
        .total_batches,
        .rows_loaded,
        join_failures(.failures)
    )]
    BatchesFailed {
        total_batches: usize,
        rows_loaded: usize,
        failures: Vec<BatchFailure>,
    },
}

impl LoadError {
    pub fn failures(&self) -> &[BatchFailure] {
        match self {
            LoadError::BatchesFailed { failures, .. } => failures,
        }
    }

    pub fn rows_loaded(&self) -> usize {
        match self {
            LoadError::BatchesFailed { rows_loaded, .. } => *rows_loaded,
        }
    }
}

fn join_failures(failures: &[BatchFailure]) -> String {
    failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadReport {
    pub batch_size: usize,
    pub batches: usize,
    pub workers: usize,
    pub rows_loaded: usize,
    /// Batches never executed because the load was cancelled.
    pub skipped_batches: usize,
}

/// Splits `rows` into consecutive batches of `batch_size` (the last one may
/// be shorter).
pub fn partition(rows: &[Vec<String>], batch_size: usize) -> impl Iterator<Item = Batch<'_>> {
    let batch_size = batch_size.max(1);
    rows.chunks(batch_size)
        .enumerate()
        .map(move |(index, rows)| Batch {
            index,
            first_row: index * batch_size + 1,
            rows,
        })
}

pub fn batch_count(rows: usize, batch_size: usize) -> usize {
    rows.div_ceil(batch_size.max(1))
}

/// `min(configured, batches)`, but never fewer than one worker.
pub fn effective_workers(configured: usize, batches: usize) -> usize {
    configured.min(batches).max(1)
}

/// Shrinks `configured` so a batch never needs more bind parameters than
/// `dialect` allows.
pub fn effective_batch_size(configured: usize, columns: usize, dialect: Dialect) -> usize {
    let configured = configured.max(1);
    if columns == 0 {
        return configured;
    }
    configured.min(dialect.max_bind_parameters() / columns).max(1)
}

/// Loads `rows` into `table` through `store`.
pub fn load_batches(
    store: &dyn Store,
    table: &TableSpec,
    rows: &[Vec<String>],
    options: &LoadOptions,
    reporter: &dyn Reporter,
) -> Result<LoadReport, LoadError> {
    let dialect = store.dialect();
    let batch_size = effective_batch_size(options.batch_size, table.column_count(), dialect);
    if batch_size < options.batch_size {
        debug!(
            "Batch size for '{}' lowered to {batch_size} to stay within {dialect} parameter limits",
            table.name
        );
    }
    let total_batches = batch_count(rows.len(), batch_size);
    let workers = effective_workers(options.workers, total_batches);
    debug!(
        "Loading {} row(s) into '{}' as {total_batches} batch(es) across {workers} worker(s)",
        rows.len(),
        table.name
    );

    let progress = ProgressAggregator::new(rows.len(), workers);
    let failures = Mutex::new(Vec::new());
    let skipped = AtomicUsize::new(0);

    thread::scope(|scope| {
        let (sender, receiver) = crossbeam_channel::bounded::<Batch<'_>>(workers * 2);
        for id in 0..workers {
            let worker = Worker {
                id,
                store,
                table,
                dialect,
                options,
                reporter,
                progress: &progress,
                failures: &failures,
                skipped: &skipped,
            };
            let receiver = receiver.clone();
            scope.spawn(move || worker.run(receiver));
        }
        drop(receiver);

        let mut sent = 0usize;
        for batch in partition(rows, batch_size) {
            if options.is_cancelled() || sender.send(batch).is_err() {
                break;
            }
            sent += 1;
        }
        skipped.fetch_add(total_batches - sent, Ordering::Relaxed);
        drop(sender);
    });

    let mut failures = failures.into_inner();
    failures.sort_by_key(|failure| failure.batch);
    let rows_loaded = progress.completed_rows();
    if failures.is_empty() {
        Ok(LoadReport {
            batch_size,
            batches: total_batches,
            workers,
            rows_loaded,
            skipped_batches: skipped.into_inner(),
        })
    } else {
        Err(LoadError::BatchesFailed {
            total_batches,
            rows_loaded,
            failures,
        })
    }
}

struct Worker<'s> {
    id: usize,
    store: &'s dyn Store,
    table: &'s TableSpec,
    dialect: Dialect,
    options: &'s LoadOptions,
    reporter: &'s dyn Reporter,
    progress: &'s ProgressAggregator,
    failures: &'s Mutex<Vec<BatchFailure>>,
    skipped: &'s AtomicUsize,
}

impl<'s> Worker<'s> {
    fn run(self, receiver: Receiver<Batch<'s>>) {
        for batch in receiver.iter() {
            if self.options.is_cancelled() {
                self.skipped.fetch_add(1, Ordering::Relaxed);
                continue;
            }
            match self.execute(&batch) {
                Ok(rows) => {
                    let percent = self.progress.record(self.id, rows, self.reporter);
                    debug!(
                        "Worker {} loaded batch {} ({rows} row(s)) into '{}' [{percent}%]",
                        self.id + 1,
                        batch.index + 1,
                        self.table.name
                    );
                }
                Err(cause) => {
                    let failure = BatchFailure {
                        worker: self.id + 1,
                        batch: batch.index + 1,
                        first_row: batch.first_row,
                        last_row: batch.first_row + batch.rows.len().saturating_sub(1),
                        cause,
                    };
                    warn!("Loading '{}' failed on {failure}", self.table.name);
                    self.failures.lock().push(failure);
                }
            }
            if !self.options.throttle.is_zero() {
                thread::sleep(self.options.throttle);
            }
        }
    }

    fn execute(&self, batch: &Batch<'_>) -> Result<usize, BatchCause> {
        let Some(statement) = sql::bulk_insert(
            self.table,
            batch.rows,
            batch.first_row,
            self.dialect,
            self.options.identifiers,
        )?
        else {
            return Ok(0);
        };
        self.store.execute(&statement.sql, &statement.params)?;
        Ok(statement.rows)
    }
}
