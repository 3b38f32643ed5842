use super::cancel::CancelToken;
use super::progress::ProgressTracker;
use super::task::Task;
use crossbeam::select;
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;

/// Terminal state of a worker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkerExit {
    /// The input was closed and empty
    Drained,
    /// The run was canceled before the input drained
    Canceled,
}

/// What one worker did during a run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WorkerReport {
    pub id: usize,
    pub processed: usize,
    pub failed: usize,
    pub exit: WorkerExit,
}

enum Next<T> {
    Item(T),
    Drained,
    Canceled,
}

/// A single drainer of the shared input
///
/// Everything a worker needs is handed over at spawn time; it holds no
/// reference back to the pool.
pub(crate) struct Worker<T> {
    id: usize,
    task: Task<T>,
    progress: Option<Arc<ProgressTracker>>,
    cancel: CancelToken,
}

impl<T> Worker<T> {
    pub(crate) fn new(
        id: usize,
        task: Task<T>,
        progress: Option<Arc<ProgressTracker>>,
        cancel: CancelToken,
    ) -> Self {
        Self {
            id,
            task,
            progress,
            cancel,
        }
    }

    /// Take items until the input is drained or the run is canceled
    pub(crate) fn work(self) -> WorkerReport {
        tracing::debug!(worker = self.id, "Worker started");

        let mut processed = 0;
        let mut failed = 0;

        let exit = loop {
            // Cancellation is only observed between items
            if self.cancel.is_cancelled() {
                break WorkerExit::Canceled;
            }

            let next = select! {
                recv(self.task.input()) -> msg => msg.map_or(Next::Drained, Next::Item),
                recv(self.cancel.signal()) -> _ => Next::Canceled,
            };

            let item = match next {
                Next::Item(item) => item,
                Next::Drained => break WorkerExit::Drained,
                Next::Canceled => break WorkerExit::Canceled,
            };

            let started = Instant::now();
            let result = self.task.execute(item);
            let elapsed = started.elapsed();
            match result {
                Ok(()) => {
                    processed += 1;
                    if let Some(progress) = &self.progress {
                        progress.increment_timed(elapsed);
                    }
                }
                Err(e) => {
                    failed += 1;
                    tracing::warn!(worker = self.id, "Item failed: {e:#}");
                    if let Some(progress) = &self.progress {
                        progress.record_failure_timed(elapsed);
                    }
                }
            }
            tracing::trace!(
                worker = self.id,
                elapsed_us = elapsed.as_micros() as u64,
                "Item finished"
            );
        };

        tracing::debug!(worker = self.id, processed, failed, exit = ?exit, "Worker exited");

        WorkerReport {
            id: self.id,
            processed,
            failed,
            exit,
        }
    }
}
